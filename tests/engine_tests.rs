use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use gymflow_be::EngineError;
use gymflow_be::database::models::{
    Page, RequestStatus, RescheduleFilter, Sort, StaffRole, SwapType,
};

mod common;

use common::{TestEnv, engine_err, giveaway_input, swap_input};

#[tokio::test]
async fn swap_lifecycle_runs_to_completion() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();

    // Mon-style 4h shifts with no overlap between them
    let source = env.shift("Front desk", 48, 4).await.unwrap();
    let target = env.shift("Evening floor", 60, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();
    env.assign(s2.staff_id, target).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, Some(target)))
        .await
        .unwrap();
    assert_eq!(created.status, RequestStatus::Pending);
    assert_eq!(created.requester_staff_id, s1.staff_id);
    assert_eq!(created.version, 1);

    let accepted = env.engine.accept(&s2, created.id).await.unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);
    assert_eq!(accepted.accepted_by, Some(s2.staff_id));
    assert!(!accepted.conflict_detected);

    let approved = env.engine.approve(&manager, created.id).await.unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.approved_by, Some(manager.staff_id));

    // the calendar confirmed synchronously, so the stored request completed
    let stored = env.repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);

    // and the assignments actually traded hands
    let holder: Uuid =
        sqlx::query_scalar("SELECT staff_id FROM shift_assignments WHERE shift_id = ?")
            .bind(source)
            .fetch_one(env.pool())
            .await
            .unwrap();
    assert_eq!(holder, s2.staff_id);
    let holder: Uuid =
        sqlx::query_scalar("SELECT staff_id FROM shift_assignments WHERE shift_id = ?")
            .bind(target)
            .fetch_one(env.pool())
            .await
            .unwrap();
    assert_eq!(holder, s1.staff_id);
}

#[tokio::test]
async fn only_the_requester_may_cancel() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let owner = env.staff("Olive", StaffRole::Owner).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    // an owner is not the requester; ownership does not bypass this rule
    assert_eq!(
        engine_err(env.engine.cancel(&owner, created.id).await),
        EngineError::CancelOwnOnly
    );

    let cancelled = env.engine.cancel(&s1, created.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
}

#[tokio::test]
async fn double_accept_is_idempotent_in_effect() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    let accepted = env.engine.accept(&s2, created.id).await.unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);

    assert_eq!(
        engine_err(env.engine.accept(&s2, created.id).await),
        EngineError::CannotAccept
    );

    // second attempt wrote nothing
    let stored = env.repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.version, accepted.version);
    assert_eq!(stored.accepted_at, accepted.accepted_at);
}

#[tokio::test]
async fn overlapping_commitment_blocks_acceptance() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    let clashing = env.shift("Spin class", 49, 2).await.unwrap(); // inside source's window
    env.assign(s1.staff_id, source).await.unwrap();
    env.assign(s2.staff_id, clashing).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    assert_eq!(
        engine_err(env.engine.accept(&s2, created.id).await),
        EngineError::ConflictDetected
    );

    let stored = env.repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(stored.conflict_detected);
}

#[tokio::test]
async fn schedule_drift_is_recaught_at_approval() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();
    env.engine.accept(&s2, created.id).await.unwrap();

    // s2 picks up a clashing commitment between accept and approve
    let clashing = env.shift("Late cover", 50, 2).await.unwrap();
    env.assign(s2.staff_id, clashing).await.unwrap();

    assert_eq!(
        engine_err(env.engine.approve(&manager, created.id).await),
        EngineError::ConflictDetected
    );

    let stored = env.repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Accepted);
    assert!(stored.conflict_detected);
}

#[tokio::test]
async fn lapsed_request_expires_on_access() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    // plant a request whose window already lapsed; the store does not judge
    let mut input = swap_input(source, s2.staff_id, None);
    input.expires_at = Utc::now() - Duration::hours(1);
    let planted = env
        .repo
        .create(env.branch_id, s1.staff_id, &input)
        .await
        .unwrap();

    assert_eq!(
        engine_err(env.engine.accept(&s2, planted.id).await),
        EngineError::Expired
    );

    let stored = env.repo.find_by_id(planted.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Expired);
}

#[tokio::test]
async fn sweep_expires_stale_requests_proactively() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    let other = env.shift("Evening floor", 72, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let mut stale = swap_input(source, s2.staff_id, None);
    stale.expires_at = Utc::now() - Duration::minutes(5);
    let planted = env
        .repo
        .create(env.branch_id, s1.staff_id, &stale)
        .await
        .unwrap();

    // a healthy request must be left alone
    let healthy = env
        .engine
        .create(&s1, swap_input(other, s2.staff_id, None))
        .await
        .unwrap();

    let mut events = env.hub.subscribe();
    let swept = env.engine.sweep_expired().await.unwrap();
    assert_eq!(swept, 1);

    let stored = env.repo.find_by_id(planted.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Expired);
    let untouched = env.repo.find_by_id(healthy.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, RequestStatus::Pending);

    let event = events.recv().await.unwrap();
    assert_eq!(event.request_id, planted.id);
    assert_eq!(event.new_status, RequestStatus::Expired);
}

#[tokio::test]
async fn one_live_request_per_source_shift() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    env.engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    assert_eq!(
        engine_err(
            env.engine
                .create(&s1, swap_input(source, s2.staff_id, None))
                .await
        ),
        EngineError::AlreadyExists
    );
}

#[tokio::test]
async fn concurrent_approve_and_reject_have_one_winner() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let m1 = env.staff("Mira", StaffRole::Manager).await.unwrap();
    let m2 = env.staff("Max", StaffRole::Manager).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();
    env.engine.accept(&s2, created.id).await.unwrap();

    let approve_engine = env.engine.clone();
    let reject_engine = env.engine.clone();
    let id = created.id;
    let (approved, rejected) = tokio::join!(
        approve_engine.approve(&m1, id),
        reject_engine.reject(&m2, id, "Coverage already arranged"),
    );

    assert_ne!(
        approved.is_ok(),
        rejected.is_ok(),
        "exactly one transition must win"
    );

    let stored = env.repo.find_by_id(id).await.unwrap().unwrap();
    if approved.is_ok() {
        // approve won; the calendar confirmation then completed it
        assert!(matches!(
            stored.status,
            RequestStatus::Approved | RequestStatus::Completed
        ));
        let code = engine_err(rejected);
        assert!(
            matches!(code, EngineError::CannotReject | EngineError::InvalidStatus),
            "loser saw {code:?}"
        );
    } else {
        assert_eq!(stored.status, RequestStatus::Rejected);
        let code = engine_err(approved);
        assert!(
            matches!(code, EngineError::CannotApprove | EngineError::InvalidStatus),
            "loser saw {code:?}"
        );
    }
}

#[tokio::test]
async fn open_giveaway_binds_whoever_accepts() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s3 = env.staff("Noor", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, giveaway_input(source))
        .await
        .unwrap();
    assert_eq!(created.target_staff_id, None);
    assert_eq!(created.swap_type, SwapType::Giveaway);

    let accepted = env.engine.accept(&s3, created.id).await.unwrap();
    assert_eq!(accepted.target_staff_id, Some(s3.staff_id));
    assert_eq!(accepted.accepted_by, Some(s3.staff_id));
}

#[tokio::test]
async fn create_validation_codes() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    // empty reason
    let mut input = swap_input(source, s2.staff_id, None);
    input.reason = "   ".to_string();
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::ReasonRequired
    );

    // oversized reason
    let mut input = swap_input(source, s2.staff_id, None);
    input.reason = "x".repeat(501);
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::ReasonTooLong
    );

    // unknown source shift
    let input = swap_input(Uuid::new_v4(), s2.staff_id, None);
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::ShiftNotFound
    );

    // shift starting too soon
    let soon = env.shift("Morning rush", 2, 4).await.unwrap();
    let input = swap_input(soon, s2.staff_id, None);
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::AdvanceNoticeRequired
    );

    // expiry after the shift starts
    let mut input = swap_input(source, s2.staff_id, None);
    input.expires_at = Utc::now() + Duration::hours(49);
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::ExpiryInvalid
    );

    // swap without a named counterparty
    let mut input = swap_input(source, s2.staff_id, None);
    input.target_staff_id = None;
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::TargetStaffRequired
    );

    // unknown target staff
    let input = swap_input(source, Uuid::new_v4(), None);
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::TargetStaffNotFound
    );

    // unknown target shift
    let input = swap_input(source, s2.staff_id, Some(Uuid::new_v4()));
    assert_eq!(
        engine_err(env.engine.create(&s1, input).await),
        EngineError::TargetShiftNotFound
    );
}

#[tokio::test]
async fn reject_demands_a_reason() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    assert_eq!(
        engine_err(env.engine.reject(&manager, created.id, "  ").await),
        EngineError::ReasonRequired
    );

    let rejected = env
        .engine
        .reject(&manager, created.id, "Understaffed that day")
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("Understaffed that day")
    );
}

#[tokio::test]
async fn delete_only_on_terminal_requests_by_eligible_actors() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();
    let owner = env.staff("Olive", StaffRole::Owner).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    // still live: cancel is the way out, not delete
    assert_eq!(
        engine_err(env.engine.delete(&s1, created.id).await),
        EngineError::InvalidStatus
    );

    env.engine.cancel(&s1, created.id).await.unwrap();

    // managers are not in the delete set
    assert_eq!(
        engine_err(env.engine.delete(&manager, created.id).await),
        EngineError::OwnerOnly
    );

    env.engine.delete(&owner, created.id).await.unwrap();
    assert!(env.repo.find_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn fan_out_reaches_requester_target_and_approvers() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let mut events = env.hub.subscribe();
    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();

    let mut recipients = Vec::new();
    for _ in 0..3 {
        let event = events.recv().await.unwrap();
        assert_eq!(event.request_id, created.id);
        assert_eq!(event.new_status, RequestStatus::Pending);
        recipients.push(event.recipient);
    }
    assert!(recipients.contains(&s1.staff_id));
    assert!(recipients.contains(&s2.staff_id));
    assert!(recipients.contains(&manager.staff_id));
}

#[tokio::test]
async fn listings_scope_by_involvement_and_branch_role() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let s3 = env.staff("Noor", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();

    let shift_a = env.shift("Front desk", 48, 4).await.unwrap();
    let shift_b = env.shift("Evening floor", 72, 4).await.unwrap();
    env.assign(s1.staff_id, shift_a).await.unwrap();
    env.assign(s3.staff_id, shift_b).await.unwrap();

    let mine = env
        .engine
        .create(&s1, swap_input(shift_a, s2.staff_id, None))
        .await
        .unwrap();
    env.engine
        .create(&s3, swap_input(shift_b, s2.staff_id, None))
        .await
        .unwrap();

    let listed = env
        .engine
        .list_my_requests(&s1, RescheduleFilter::default(), Page::default(), &Sort::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);

    // approvers see the whole branch queue
    let queue = env
        .engine
        .list_for_approval(
            &manager,
            RescheduleFilter::default(),
            Page::default(),
            &Sort::default(),
        )
        .await
        .unwrap();
    assert_eq!(queue.len(), 2);

    // plain staff cannot open the approval queue
    assert_eq!(
        engine_err(
            env.engine
                .list_for_approval(
                    &s1,
                    RescheduleFilter::default(),
                    Page::default(),
                    &Sort::default()
                )
                .await
        ),
        EngineError::ApproverPermission
    );

    // nor can an approver read a branch they do not belong to
    let foreign = RescheduleFilter {
        branch_ids: vec![Uuid::new_v4()],
        ..Default::default()
    };
    assert_eq!(
        engine_err(
            env.engine
                .list_for_approval(&manager, foreign, Page::default(), &Sort::default())
                .await
        ),
        EngineError::ApproverBranch
    );
}

#[tokio::test]
async fn terminal_states_admit_no_further_edges() {
    let env = TestEnv::new().await.unwrap();
    let s1 = env.staff("Sam", StaffRole::Staff).await.unwrap();
    let s2 = env.staff("Tess", StaffRole::Staff).await.unwrap();
    let manager = env.staff("Mira", StaffRole::Manager).await.unwrap();

    let source = env.shift("Front desk", 48, 4).await.unwrap();
    env.assign(s1.staff_id, source).await.unwrap();

    let created = env
        .engine
        .create(&s1, swap_input(source, s2.staff_id, None))
        .await
        .unwrap();
    env.engine
        .reject(&manager, created.id, "Understaffed")
        .await
        .unwrap();

    assert_eq!(
        engine_err(env.engine.accept(&s2, created.id).await),
        EngineError::CannotAccept
    );
    assert_eq!(
        engine_err(env.engine.approve(&manager, created.id).await),
        EngineError::CannotApprove
    );
    assert_eq!(
        engine_err(env.engine.cancel(&s1, created.id).await),
        EngineError::CannotCancel
    );
    assert_eq!(
        engine_err(env.engine.reject(&manager, created.id, "Again").await),
        EngineError::CannotReject
    );

    let stored = env.repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Rejected);
}

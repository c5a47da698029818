use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::database::models::StaffMember;

/// Interface boundary to the staff/branch directory service. Resolves staff
/// records (role already normalized from job titles) and the approver set of
/// a branch for notification fan-out.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn get_staff(&self, id: Uuid) -> Result<Option<StaffMember>>;

    /// Staff ids of every owner/manager with membership in the branch.
    async fn approvers_for_branch(&self, branch_id: Uuid) -> Result<Vec<Uuid>>;
}

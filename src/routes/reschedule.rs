use crate::handlers::reschedule;
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reschedules")
            .route("", web::post().to(reschedule::create_request))
            .route("/mine", web::get().to(reschedule::list_my_requests))
            .route("/approvals", web::get().to(reschedule::list_for_approval))
            .route("/{id}", web::get().to(reschedule::get_request))
            .route("/{id}/accept", web::post().to(reschedule::accept_request))
            .route("/{id}/approve", web::post().to(reschedule::approve_request))
            .route("/{id}/reject", web::post().to(reschedule::reject_request))
            .route("/{id}/cancel", web::post().to(reschedule::cancel_request))
            .route("/{id}", web::delete().to(reschedule::delete_request)),
    );
}

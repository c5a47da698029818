use actix_web::web;

pub mod reschedule;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/v1").configure(reschedule::configure));
}

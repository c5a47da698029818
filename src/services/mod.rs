pub mod auth;
pub mod authorization;
pub mod conflict;
pub mod directory;
pub mod engine;
pub mod expiry;
pub mod notifications;
pub mod schedule;

pub use auth::Claims;
pub use conflict::ConflictDetector;
pub use directory::StaffDirectory;
pub use engine::RescheduleEngine;
pub use notifications::{NotificationHub, RescheduleEvent, RescheduleSubscription};
pub use schedule::ScheduleService;

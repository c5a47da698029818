pub mod directory;
pub mod reschedule;
pub mod schedule;

// Re-export all repositories for easy importing
pub use directory::SqliteStaffDirectory;
pub use reschedule::RescheduleRepository;
pub use schedule::SqliteScheduleService;

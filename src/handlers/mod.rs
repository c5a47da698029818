pub mod reschedule;
pub mod shared;

pub use shared::ApiResponse;

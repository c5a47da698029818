pub mod macros;
pub mod reschedule;
pub mod shift;
pub mod staff;

pub use reschedule::{
    Page, RequestPriority, RequestStatus, RescheduleFilter, RescheduleInput, RescheduleRequest,
    Sort, SortKey, SwapType, TransitionChange,
};
pub use shift::Shift;
pub use staff::{Actor, StaffMember, StaffRole};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum StaffRole {
        Owner => "owner",
        Manager => "manager",
        Staff => "staff",
    }
}

/// Directory read model for a staff member. The directory service resolves
/// managerial job titles into `StaffRole::Manager` before this struct is
/// handed out, so authorization never matches on title strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: StaffRole,
    pub job_title: Option<String>,
    pub branch_ids: Vec<Uuid>,
}

/// The acting identity for a single engine call, as supplied by the session
/// layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub staff_id: Uuid,
    pub role: StaffRole,
    pub branch_ids: Vec<Uuid>,
}

impl Actor {
    pub fn in_branch(&self, branch_id: Uuid) -> bool {
        self.branch_ids.contains(&branch_id)
    }

    pub fn has_approver_role(&self) -> bool {
        matches!(self.role, StaffRole::Owner | StaffRole::Manager)
    }
}

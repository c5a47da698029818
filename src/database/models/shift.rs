use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Calendar read model for a shift. The shift/calendar service owns the
/// authoritative record; the engine only reads times and branch scope.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Shift {
    /// Overlap with inclusive boundaries excluded: back-to-back shifts
    /// (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &Shift) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

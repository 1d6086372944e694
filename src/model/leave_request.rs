use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::Labeled;
use super::attendance::parse_column;
use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
}

impl Labeled for LeaveType {
    fn label(&self) -> &'static str {
        match self {
            LeaveType::Annual => "Annual",
            LeaveType::Sick => "Sick",
            LeaveType::Unpaid => "Unpaid",
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl Labeled for LeaveStatus {
    fn label(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "Pending",
            LeaveStatus::Approved => "Approved",
            LeaveStatus::Rejected => "Rejected",
        }
    }
}

impl LeaveStatus {
    /// Only pending requests can be decided, and only to a final state.
    pub fn can_become(self, next: LeaveStatus) -> bool {
        self == LeaveStatus::Pending && next != LeaveStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    pub status: LeaveStatus,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            start_date: row.start_date,
            end_date: row.end_date,
            leave_type: parse_column("leave_type", &row.leave_type)?,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_decided_once() {
        assert!(LeaveStatus::Pending.can_become(LeaveStatus::Approved));
        assert!(LeaveStatus::Pending.can_become(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Pending.can_become(LeaveStatus::Pending));
        assert!(!LeaveStatus::Approved.can_become(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Rejected.can_become(LeaveStatus::Approved));
    }

    #[test]
    fn leave_type_wire_values() {
        assert_eq!(LeaveType::values(), vec!["annual", "sick", "unpaid"]);
        assert_eq!(
            serde_json::to_value(LeaveStatus::Approved).unwrap(),
            serde_json::json!("approved")
        );
    }
}

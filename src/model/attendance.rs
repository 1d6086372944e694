use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::Labeled;
use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftType {
    Morning,
    Evening,
}

impl Labeled for ShiftType {
    fn label(&self) -> &'static str {
        match self {
            ShiftType::Morning => "Morning",
            ShiftType::Evening => "Evening",
        }
    }
}

/// Purpose of a submission within its shift.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceType {
    TimeIn,
    TimeOut,
}

impl Labeled for AttendanceType {
    fn label(&self) -> &'static str {
        match self {
            AttendanceType::TimeIn => "Time In",
            AttendanceType::TimeOut => "Time Out",
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkMode {
    OnSite,
    Remote,
}

impl Labeled for WorkMode {
    fn label(&self) -> &'static str {
        match self {
            WorkMode::OnSite => "On Site",
            WorkMode::Remote => "Remote",
        }
    }
}

/// The five screenshots every submission must carry.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProofKind {
    WorkstationSelfie,
    CgcChat,
    DepartmentChat,
    TeamChat,
    GroupChat,
}

impl ProofKind {
    /// Multipart field / column name carrying this proof.
    pub fn field_name(&self) -> &'static str {
        match self {
            ProofKind::WorkstationSelfie => "screenshot_workstation_selfie",
            ProofKind::CgcChat => "screenshot_cgc_chat",
            ProofKind::DepartmentChat => "screenshot_department_chat",
            ProofKind::TeamChat => "screenshot_team_chat",
            ProofKind::GroupChat => "screenshot_group_chat",
        }
    }

    /// File name stem inside the submission folder.
    pub fn stem(&self) -> &'static str {
        match self {
            ProofKind::WorkstationSelfie => "selfie",
            ProofKind::CgcChat => "cgc",
            ProofKind::DepartmentChat => "dept",
            ProofKind::TeamChat => "team",
            ProofKind::GroupChat => "group",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        name.strip_prefix("screenshot_")
            .and_then(|kind| ProofKind::from_str(kind).ok())
    }
}

impl Labeled for ProofKind {
    fn label(&self) -> &'static str {
        match self {
            ProofKind::WorkstationSelfie => "Selfie",
            ProofKind::CgcChat => "Company Group Chat",
            ProofKind::DepartmentChat => "Department Chat",
            ProofKind::TeamChat => "Team Chat",
            ProofKind::GroupChat => "Group Chat",
        }
    }
}

/// File-store paths of the five proofs of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProofPaths {
    #[schema(example = "attendance-proofs/7/2026-01-05/morning-time_in/selfie.png")]
    pub screenshot_workstation_selfie: String,
    #[schema(example = "attendance-proofs/7/2026-01-05/morning-time_in/cgc.png")]
    pub screenshot_cgc_chat: String,
    #[schema(example = "attendance-proofs/7/2026-01-05/morning-time_in/dept.png")]
    pub screenshot_department_chat: String,
    #[schema(example = "attendance-proofs/7/2026-01-05/morning-time_in/team.png")]
    pub screenshot_team_chat: String,
    #[schema(example = "attendance-proofs/7/2026-01-05/morning-time_in/group.png")]
    pub screenshot_group_chat: String,
}

impl ProofPaths {
    pub fn set(&mut self, kind: ProofKind, path: String) {
        let slot = match kind {
            ProofKind::WorkstationSelfie => &mut self.screenshot_workstation_selfie,
            ProofKind::CgcChat => &mut self.screenshot_cgc_chat,
            ProofKind::DepartmentChat => &mut self.screenshot_department_chat,
            ProofKind::TeamChat => &mut self.screenshot_team_chat,
            ProofKind::GroupChat => &mut self.screenshot_group_chat,
        };
        *slot = path;
    }
}

/// One proof-of-work submission for one employee on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 7,
    "date": "2026-01-05",
    "shift_type": "morning",
    "type": "time_in",
    "work_mode": "on_site",
    "screenshot_workstation_selfie": "attendance-proofs/7/2026-01-05/morning-time_in/selfie.png",
    "screenshot_cgc_chat": "attendance-proofs/7/2026-01-05/morning-time_in/cgc.png",
    "screenshot_department_chat": "attendance-proofs/7/2026-01-05/morning-time_in/dept.png",
    "screenshot_team_chat": "attendance-proofs/7/2026-01-05/morning-time_in/team.png",
    "screenshot_group_chat": "attendance-proofs/7/2026-01-05/morning-time_in/group.png",
    "created_at": "2026-01-05T07:12:00Z",
    "updated_at": "2026-01-05T07:12:00Z"
}))]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    #[serde(rename = "type")]
    pub attendance_type: AttendanceType,
    pub work_mode: WorkMode,
    #[serde(flatten)]
    pub proofs: ProofPaths,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to insert a record; `id` and timestamps come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub attendance_type: AttendanceType,
    pub work_mode: WorkMode,
    pub proofs: ProofPaths,
}

/// Partial update. Classification fields can be replaced, never cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceChanges {
    pub date: Option<NaiveDate>,
    pub shift_type: Option<ShiftType>,
    pub attendance_type: Option<AttendanceType>,
    pub work_mode: Option<WorkMode>,
    pub proofs: Vec<(ProofKind, String)>,
}

impl AttendanceChanges {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.shift_type.is_none()
            && self.attendance_type.is_none()
            && self.work_mode.is_none()
            && self.proofs.is_empty()
    }

    pub fn apply_to(&self, record: &mut Attendance) {
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(shift_type) = self.shift_type {
            record.shift_type = shift_type;
        }
        if let Some(attendance_type) = self.attendance_type {
            record.attendance_type = attendance_type;
        }
        if let Some(work_mode) = self.work_mode {
            record.work_mode = work_mode;
        }
        for (kind, path) in &self.proofs {
            record.proofs.set(*kind, path.clone());
        }
    }
}

/// Raw `attendances` row; enum columns hold their wire strings.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub shift_type: String,
    #[sqlx(rename = "type")]
    pub attendance_type: String,
    pub work_mode: String,
    pub screenshot_workstation_selfie: String,
    pub screenshot_cgc_chat: String,
    pub screenshot_department_chat: String,
    pub screenshot_team_chat: String,
    pub screenshot_group_chat: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, AppError> {
    T::from_str(value)
        .map_err(|_| AppError::Persistence(format!("unexpected {column} value '{value}'")))
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(Attendance {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            shift_type: parse_column("shift_type", &row.shift_type)?,
            attendance_type: parse_column("type", &row.attendance_type)?,
            work_mode: parse_column("work_mode", &row.work_mode)?,
            proofs: ProofPaths {
                screenshot_workstation_selfie: row.screenshot_workstation_selfie,
                screenshot_cgc_chat: row.screenshot_cgc_chat,
                screenshot_department_chat: row.screenshot_department_chat,
                screenshot_team_chat: row.screenshot_team_chat,
                screenshot_group_chat: row.screenshot_group_chat,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

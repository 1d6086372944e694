use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::Labeled;
use super::attendance::parse_column;
use crate::error::AppError;

/// Where an employee is right now; overwritten by the latest workflow checkpoint.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    OnLeave,
}

impl Labeled for AttendanceStatus {
    fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::OnLeave => "On Leave",
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Labeled for Gender {
    fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "employee_code": "EMP-007",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "gender": "male",
        "department": "operations",
        "department_team": "night-desk",
        "hire_date": "2024-01-01",
        "attendance_status": "present"
    })
)]
pub struct Employee {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = "EMP-007")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(nullable = true)]
    pub gender: Option<Gender>,

    #[schema(example = "operations", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "night-desk", nullable = true)]
    pub department_team: Option<String>,

    #[schema(
        example = "2024-01-01",
        value_type = String,
        format = "date"
    )]
    pub hire_date: NaiveDate,

    pub attendance_status: AttendanceStatus,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: Option<String>,
    pub department: Option<String>,
    pub department_team: Option<String>,
    pub hire_date: NaiveDate,
    pub attendance_status: String,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = AppError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        let gender = match row.gender.as_deref() {
            Some(g) => Some(parse_column("gender", g)?),
            None => None,
        };

        Ok(Employee {
            id: row.id,
            employee_code: row.employee_code,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            gender,
            department: row.department,
            department_team: row.department_team,
            hire_date: row.hire_date,
            attendance_status: parse_column("attendance_status", &row.attendance_status)?,
        })
    }
}

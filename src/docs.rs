use crate::api::attendance::{AttendanceUpdateReq, AttendanceUpload};
use crate::api::employee::{
    AttendanceStatusReq, CreateEmployee, EmployeeListResponse, UpdateEmployee,
};
use crate::api::leave_request::{CreateLeave, LeaveDecision, LeaveListResponse};
use crate::model::EnumOption;
use crate::model::attendance::{Attendance, AttendanceType, ProofKind, ProofPaths, ShiftType, WorkMode};
use crate::model::employee::{AttendanceStatus, Employee, Gender};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::role::Role;
use crate::model::user::UserSummary;
use crate::models::{CreateUserReq, LoginReqDto, RoleSwitched, SwitchRoleReq, TokenPair};
use crate::services::attendance::{AttendanceGroup, AttendancePage, CreateForm};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Attendance API",
        version = "1.0.0",
        description = r#"
## HR Attendance Service

Proof-backed attendance for an HR system: employees submit a time-in or
time-out checkpoint with five screenshots, and the service files the
screenshots, records the submission and marks the employee present.

### 🔹 Key Features
- **Attendance**
  - Shift and attendance type resolved from the server clock
  - Multipart submission with five JPEG/PNG proofs
  - Filtered, paginated and grouped listing
- **Employees**
  - Profiles and the current attendance status
- **Leave**
  - Requests and review (approve / reject)
- **Users**
  - Accounts holding one or more roles, with an active role

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token.
What a caller may do depends on the capabilities of the active role.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::switch_role,

        crate::auth::handlers::create_user,
        crate::auth::handlers::list_users,

        crate::api::attendance::list_attendance,
        crate::api::attendance::create_form,
        crate::api::attendance::submit_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::export_attendance,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::update_attendance_status,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::update_leave_status
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            SwitchRoleReq,
            RoleSwitched,
            CreateUserReq,
            UserSummary,
            Role,
            Attendance,
            AttendancePage,
            AttendanceGroup,
            AttendanceUpload,
            AttendanceUpdateReq,
            CreateForm,
            EnumOption,
            ProofPaths,
            ProofKind,
            ShiftType,
            AttendanceType,
            WorkMode,
            CreateEmployee,
            UpdateEmployee,
            AttendanceStatusReq,
            AttendanceStatus,
            Gender,
            Employee,
            EmployeeListResponse,
            CreateLeave,
            LeaveDecision,
            LeaveRequest,
            LeaveListResponse,
            LeaveStatus,
            LeaveType
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and role switching"),
        (name = "Users", description = "User account management APIs"),
        (name = "Attendance", description = "Attendance submission and records"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Leave", description = "Leave management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_attendance_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/attendance",
            "/api/attendance/create",
            "/api/attendance/export",
            "/api/attendance/{id}",
            "/api/employee/attendance-status",
            "/auth/login",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

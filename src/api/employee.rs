use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        Labeled,
        employee::{AttendanceStatus, Employee, EmployeeRow, Gender},
        role::Capability,
    },
    repository::employee::{EMPLOYEE_COLUMNS, employee_exists},
    services::{attendance::AttendanceService, submission::parse_choice},
    utils::{
        db_utils::{
            PageRequest, SqlValue, WhereBuilder, bind_query, bind_query_as, bind_query_scalar,
            build_update_sql,
        },
        employee_cache::EmployeeCache,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-007")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    pub gender: Option<Gender>,
    #[schema(example = "operations")]
    pub department: Option<String>,
    #[schema(example = "night-desk")]
    pub department_team: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    /// 1..=100, default 20
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub attendance_status: Option<String>,
    /// Matches first name, last name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub department: Option<String>,
    pub department_team: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: Option<NaiveDate>,
}

impl UpdateEmployee {
    fn columns(self) -> Vec<(&'static str, SqlValue)> {
        let mut columns: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(v) = self.employee_code {
            columns.push(("employee_code", v.into()));
        }
        if let Some(v) = self.first_name {
            columns.push(("first_name", v.into()));
        }
        if let Some(v) = self.last_name {
            columns.push(("last_name", v.into()));
        }
        if let Some(v) = self.email {
            columns.push(("email", v.into()));
        }
        if let Some(v) = self.gender {
            columns.push(("gender", v.value().into()));
        }
        if let Some(v) = self.department {
            columns.push(("department", v.into()));
        }
        if let Some(v) = self.department_team {
            columns.push(("department_team", v.into()));
        }
        if let Some(v) = self.hire_date {
            columns.push(("hire_date", v.into()));
        }
        columns
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceStatusReq {
    pub attendance_status: AttendanceStatus,
}

fn validate_new(payload: &CreateEmployee) -> AppResult<()> {
    for (field, value) in [
        ("employee_code", &payload.employee_code),
        ("first_name", &payload.first_name),
        ("last_name", &payload.last_name),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::validation(
                field,
                format!("The {} field is required.", field.replace('_', " ")),
            ));
        }
    }
    if !payload.email.contains('@') {
        return Err(AppError::validation(
            "email",
            "The email must be a valid email address.",
        ));
    }
    Ok(())
}

/// Duplicate employee code or email.
fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23000") {
            return AppError::Conflict("Employee code or email already exists".into());
        }
    }
    e.into()
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 7
        })),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Employee code or email already exists"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ManageEmployees)?;
    validate_new(&payload)?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, gender, department, department_team,
         hire_date, attendance_status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(payload.gender.map(|g| g.value()))
    .bind(payload.department.as_deref())
    .bind(payload.department_team.as_deref())
    .bind(payload.hire_date)
    .bind(AttendanceStatus::Absent.value())
    .execute(pool.get_ref())
    .await
    .map_err(map_unique_violation)?;

    let id = result.last_insert_id();
    info!(employee_id = id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 400, description = "Invalid filter value"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ManageEmployees)?;

    let query = query.into_inner();
    let page = PageRequest::new(query.page, query.per_page.unwrap_or(20).clamp(1, 100));

    // ---------- build WHERE clause ----------
    let mut builder = WhereBuilder::default();

    if let Some(department) = query.department.filter(|d| !d.trim().is_empty()) {
        builder.push("department = ?", department);
    }

    if let Some(status) = query.attendance_status.filter(|s| !s.trim().is_empty()) {
        let status = parse_choice::<AttendanceStatus>("attendance_status", &status)?;
        builder.push("attendance_status = ?", status.value());
    }

    if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        let like = SqlValue::from(format!("%{}%", search.trim()));
        builder.push_all(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)",
            [like.clone(), like.clone(), like],
        );
    }

    let (where_clause, values) = builder.finish();

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees{where_clause}");
    debug!(sql = %count_sql, values = ?values, "Counting employees");

    let total = bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees{where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page = page.page, per_page = page.per_page, "Fetching employees");

    let rows = bind_query_as(sqlx::query_as::<_, EmployeeRow>(&data_sql), &values)
        .bind(page.per_page as i64)
        .bind(page.offset() as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let data = rows
        .into_iter()
        .map(Employee::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "No fields provided"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<EmployeeCache>,
    path: web::Path<u64>,
    body: web::Json<UpdateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ManageEmployees)?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", body.into_inner().columns(), "id", employee_id)?;

    if !employee_exists(pool.get_ref(), employee_id).await? {
        return Err(AppError::NotFound("Employee".into()).into());
    }

    bind_query(sqlx::query(&update.sql), &update.values)
        .execute(pool.get_ref())
        .await
        .map_err(map_unique_violation)?;

    cache.invalidate(employee_id).await;
    info!(employee_id, "Employee updated");

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated successfully" })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<EmployeeCache>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ManageEmployees)?;
    let employee_id = path.into_inner();

    let res = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Employee".into()).into());
    }

    cache.invalidate(employee_id).await;
    info!(employee_id, "Employee deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = path.into_inner();
    if !auth.owns(employee_id) {
        auth.require(Capability::ManageEmployees)?;
    }

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    let row = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("Employee".into()))?;

    Ok(HttpResponse::Ok().json(Employee::try_from(row)?))
}

/// Overwrite the caller's own attendance status
#[utoipa::path(
    put,
    path = "/api/employee/attendance-status",
    request_body = AttendanceStatusReq,
    responses(
        (status = 200, description = "Status updated", body = Object, example = json!({
            "message": "Attendance status updated",
            "attendance_status": "present"
        })),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_attendance_status(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    body: web::Json<AttendanceStatusReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let status = body.attendance_status;

    service.update_attendance_status(employee_id, status).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance status updated",
        "attendance_status": status
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_employee(email: &str) -> CreateEmployee {
        CreateEmployee {
            employee_code: "EMP-010".into(),
            first_name: "Jane".into(),
            last_name: "Roe".into(),
            email: email.into(),
            gender: None,
            department: None,
            department_team: None,
            hire_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
    }

    #[test]
    fn new_employee_needs_a_plausible_email() {
        assert!(validate_new(&new_employee("jane@company.com")).is_ok());
        assert!(matches!(
            validate_new(&new_employee("jane")),
            Err(AppError::Validation { ref field, .. }) if field == "email"
        ));
    }

    #[test]
    fn update_only_touches_given_columns() {
        let update = UpdateEmployee {
            department: Some("finance".into()),
            gender: Some(Gender::Female),
            ..Default::default()
        };
        let columns = update.columns();
        let names: Vec<&str> = columns.iter().map(|(c, _)| *c).collect();
        assert_eq!(names, vec!["gender", "department"]);
        assert_eq!(columns[0].1, SqlValue::String("female".into()));
    }
}

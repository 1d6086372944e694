use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::debug;

use crate::error::AppResult;
use crate::model::Labeled;
use crate::model::employee::{AttendanceStatus, Employee, EmployeeRow};
use crate::utils::employee_cache::EmployeeCache;

pub const EMPLOYEE_COLUMNS: &str = r#"
    id, employee_code, first_name, last_name, email, gender,
    department, department_team, hire_date, attendance_status
"#;

/// The slice of employee persistence the attendance workflow depends on.
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn find(&self, id: u64) -> AppResult<Option<Employee>>;

    /// Unconditional overwrite. `false` when the employee does not exist.
    async fn set_attendance_status(&self, id: u64, status: AttendanceStatus) -> AppResult<bool>;
}

pub async fn employee_exists(pool: &MySqlPool, id: u64) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM employees WHERE id = ? LIMIT 1)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(exists != 0)
}

#[derive(Clone)]
pub struct MySqlEmployeeRepository {
    pool: MySqlPool,
    cache: EmployeeCache,
}

impl MySqlEmployeeRepository {
    pub fn new(pool: MySqlPool, cache: EmployeeCache) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl EmployeeRepository for MySqlEmployeeRepository {
    async fn find(&self, id: u64) -> AppResult<Option<Employee>> {
        if let Some(hit) = self.cache.get(id).await {
            return Ok(Some(hit));
        }

        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let employee = row.map(Employee::try_from).transpose()?;
        if let Some(employee) = &employee {
            self.cache.put(employee.clone()).await;
        }
        Ok(employee)
    }

    async fn set_attendance_status(&self, id: u64, status: AttendanceStatus) -> AppResult<bool> {
        // rows_affected is 0 for an unchanged value in MySQL, so probe existence separately.
        if !employee_exists(&self.pool, id).await? {
            return Ok(false);
        }

        sqlx::query("UPDATE employees SET attendance_status = ? WHERE id = ?")
            .bind(status.value())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate(id).await;
        debug!(employee_id = id, status = %status, "Attendance status updated");
        Ok(true)
    }
}

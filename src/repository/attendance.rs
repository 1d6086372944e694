use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::Labeled;
use crate::model::attendance::{
    Attendance, AttendanceChanges, AttendanceRow, AttendanceType, NewAttendance, ShiftType,
    WorkMode,
};
use crate::utils::db_utils::{
    PageRequest, SqlValue, WhereBuilder, bind_query, bind_query_as, bind_query_scalar,
    build_update_sql,
};

/// Conjunctive listing filter. `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub employee_id: Option<u64>,
    pub shift_type: Option<ShiftType>,
    pub attendance_type: Option<AttendanceType>,
    pub work_mode: Option<WorkMode>,
}

impl AttendanceFilter {
    pub fn matches(&self, record: &Attendance) -> bool {
        self.date_from.is_none_or(|from| record.date >= from)
            && self.date_to.is_none_or(|to| record.date <= to)
            && self.employee_id.is_none_or(|id| record.employee_id == id)
            && self.shift_type.is_none_or(|s| record.shift_type == s)
            && self.attendance_type.is_none_or(|t| record.attendance_type == t)
            && self.work_mode.is_none_or(|w| record.work_mode == w)
    }

    pub fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut builder = WhereBuilder::default();

        if let Some(from) = self.date_from {
            builder.push("date >= ?", from);
        }
        if let Some(to) = self.date_to {
            builder.push("date <= ?", to);
        }
        if let Some(employee_id) = self.employee_id {
            builder.push("employee_id = ?", employee_id);
        }
        if let Some(shift_type) = self.shift_type {
            builder.push("shift_type = ?", shift_type.value());
        }
        if let Some(attendance_type) = self.attendance_type {
            builder.push("`type` = ?", attendance_type.value());
        }
        if let Some(work_mode) = self.work_mode {
            builder.push("work_mode = ?", work_mode.value());
        }

        builder.finish()
    }
}

/// Dimension a listing can be grouped by.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupBy {
    Employee,
    Date,
    ShiftType,
}

impl GroupBy {
    pub fn column(self) -> &'static str {
        match self {
            GroupBy::Employee => "employee_id",
            GroupBy::Date => "date",
            GroupBy::ShiftType => "shift_type",
        }
    }

    pub fn key_of(self, record: &Attendance) -> String {
        match self {
            GroupBy::Employee => record.employee_id.to_string(),
            GroupBy::Date => record.date.to_string(),
            GroupBy::ShiftType => record.shift_type.to_string(),
        }
    }

    /// Same ordering as `ORDER BY <column> ASC` on the stored values.
    pub fn compare(self, a: &Attendance, b: &Attendance) -> Ordering {
        match self {
            GroupBy::Employee => a.employee_id.cmp(&b.employee_id),
            GroupBy::Date => a.date.cmp(&b.date),
            GroupBy::ShiftType => a.shift_type.value().cmp(b.shift_type.value()),
        }
    }
}

/// Record store for attendance rows.
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn create(&self, new: NewAttendance) -> AppResult<Attendance>;

    async fn find(&self, id: u64) -> AppResult<Option<Attendance>>;

    /// Applies `changes`; `None` when the record does not exist.
    async fn update(&self, id: u64, changes: &AttendanceChanges) -> AppResult<Option<Attendance>>;

    /// `false` when nothing was deleted.
    async fn delete(&self, id: u64) -> AppResult<bool>;

    /// One page of matching records plus the total match count. Ordered by
    /// `order_by` ascending when given, else newest date first; ties newest id first.
    async fn list(
        &self,
        filter: &AttendanceFilter,
        order_by: Option<GroupBy>,
        page: PageRequest,
    ) -> AppResult<(Vec<Attendance>, i64)>;
}

const COLUMNS: &str = r#"
    id, employee_id, date, shift_type, `type`, work_mode,
    screenshot_workstation_selfie, screenshot_cgc_chat, screenshot_department_chat,
    screenshot_team_chat, screenshot_group_chat, created_at, updated_at
"#;

#[derive(Clone)]
pub struct MySqlAttendanceRepository {
    pool: MySqlPool,
}

impl MySqlAttendanceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceRepository for MySqlAttendanceRepository {
    async fn create(&self, new: NewAttendance) -> AppResult<Attendance> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendances
                (employee_id, date, shift_type, `type`, work_mode,
                 screenshot_workstation_selfie, screenshot_cgc_chat, screenshot_department_chat,
                 screenshot_team_chat, screenshot_group_chat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.date)
        .bind(new.shift_type.value())
        .bind(new.attendance_type.value())
        .bind(new.work_mode.value())
        .bind(&new.proofs.screenshot_workstation_selfie)
        .bind(&new.proofs.screenshot_cgc_chat)
        .bind(&new.proofs.screenshot_department_chat)
        .bind(&new.proofs.screenshot_team_chat)
        .bind(&new.proofs.screenshot_group_chat)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        self.find(id)
            .await?
            .ok_or_else(|| AppError::Persistence(format!("attendance {id} vanished after insert")))
    }

    async fn find(&self, id: u64) -> AppResult<Option<Attendance>> {
        let sql = format!("SELECT {COLUMNS} FROM attendances WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Attendance::try_from).transpose()
    }

    async fn update(&self, id: u64, changes: &AttendanceChanges) -> AppResult<Option<Attendance>> {
        if self.find(id).await?.is_none() {
            return Ok(None);
        }
        if changes.is_empty() {
            return self.find(id).await;
        }

        let mut columns: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(date) = changes.date {
            columns.push(("date", date.into()));
        }
        if let Some(shift_type) = changes.shift_type {
            columns.push(("shift_type", shift_type.value().into()));
        }
        if let Some(attendance_type) = changes.attendance_type {
            columns.push(("`type`", attendance_type.value().into()));
        }
        if let Some(work_mode) = changes.work_mode {
            columns.push(("work_mode", work_mode.value().into()));
        }
        for (kind, path) in &changes.proofs {
            columns.push((kind.field_name(), path.clone().into()));
        }

        let update = build_update_sql("attendances", columns, "id", id)?;
        debug!(sql = %update.sql, attendance_id = id, "Updating attendance");
        bind_query(sqlx::query(&update.sql), &update.values)
            .execute(&self.pool)
            .await?;

        self.find(id).await
    }

    async fn delete(&self, id: u64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM attendances WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        order_by: Option<GroupBy>,
        page: PageRequest,
    ) -> AppResult<(Vec<Attendance>, i64)> {
        let (where_sql, args) = filter.where_clause();

        // ---------- total count ----------
        let count_sql = format!("SELECT COUNT(*) FROM attendances{}", where_sql);
        debug!(sql = %count_sql, bindings = ?args, "Counting attendances");

        let total = bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
            .fetch_one(&self.pool)
            .await?;

        // ---------- data query ----------
        let order = match order_by {
            Some(group) => format!("{} ASC, id DESC", group.column()),
            None => "date DESC, id DESC".to_string(),
        };
        let data_sql = format!(
            "SELECT {COLUMNS} FROM attendances{} ORDER BY {} LIMIT ? OFFSET ?",
            where_sql, order
        );
        debug!(sql = %data_sql, page = page.page, per_page = page.per_page, "Fetching attendances");

        let rows = bind_query_as(sqlx::query_as::<_, AttendanceRow>(&data_sql), &args)
            .bind(page.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .into_iter()
            .map(Attendance::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((records, total))
    }
}

use chrono::NaiveDate;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::{Query, QueryAs, QueryScalar};

use crate::error::AppError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Date(NaiveDate),
    Null,
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::String(s)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(d: NaiveDate) -> Self {
        SqlValue::Date(d)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// ===============================
/// WHERE clause builder
/// ===============================
/// Conditions are joined with AND. Column expressions are always static.
#[derive(Debug, Default)]
pub struct WhereBuilder {
    conditions: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl WhereBuilder {
    pub fn push(&mut self, condition: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        self.conditions.push(condition);
        self.values.push(value.into());
        self
    }

    /// One condition with several placeholders, e.g. a multi-column `LIKE`.
    pub fn push_all(
        &mut self,
        condition: &'static str,
        values: impl IntoIterator<Item = SqlValue>,
    ) -> &mut Self {
        self.conditions.push(condition);
        self.values.extend(values);
        self
    }

    /// Returns `" WHERE a = ? AND b = ?"` (or an empty string) plus the bind values.
    pub fn finish(self) -> (String, Vec<SqlValue>) {
        if self.conditions.is_empty() {
            return (String::new(), self.values);
        }
        (
            format!(" WHERE {}", self.conditions.join(" AND ")),
            self.values,
        )
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build UPDATE SQL from typed column changes
/// ===============================
pub fn build_update_sql(
    table: &'static str,
    columns: Vec<(&'static str, SqlValue)>,
    id_column: &'static str,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    if columns.is_empty() {
        return Err(AppError::validation("body", "No fields provided for update"));
    }

    let set_clause = columns
        .iter()
        .map(|(k, _)| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values: Vec<SqlValue> = columns.into_iter().map(|(_, v)| v).collect();
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

pub fn bind_query<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v.as_str()),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

pub fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    values: &'q [SqlValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v.as_str()),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

pub fn bind_query_scalar<'q, O>(
    mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    values: &'q [SqlValue],
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v.as_str()),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

/// ===============================
/// Pagination
/// ===============================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// 1-based page; `page` below 1 is treated as 1.
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.per_page as u64
    }
}

use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub active_role_id: u8,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "jdoe")]
    pub username: String,
    pub roles: Vec<Role>,
    pub active_role: Role,
    #[schema(example = 7, nullable = true)]
    pub employee_id: Option<u64>,
    pub is_active: bool,
}

/// Decode a stored role id list (`user_roles.role_id`), skipping unknown ids.
pub fn roles_from_ids(ids: &[u8]) -> Vec<Role> {
    let mut roles: Vec<Role> = ids.iter().filter_map(|id| Role::from_id(*id)).collect();
    roles.sort_by_key(|r| r.id());
    roles.dedup();
    roles
}

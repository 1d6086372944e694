use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserReq {
    #[schema(example = "jdoe")]
    pub username: String,
    pub password: String,
    /// Every role the user holds; must not be empty.
    pub roles: Vec<Role>,
    /// Defaults to the first entry of `roles`.
    pub active_role: Option<Role>,
    #[schema(example = 7, nullable = true)]
    pub employee_id: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchRoleReq {
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleSwitched {
    pub access_token: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    /// Every role id the user holds.
    pub roles: Vec<u8>,
    /// Active role id; always one of `roles`.
    pub role: u8,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

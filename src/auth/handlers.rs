use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{
        role::{Capability, Role},
        user::{UserRow, UserSummary, roles_from_ids},
    },
    models::{Claims, CreateUserReq, LoginReqDto, RoleSwitched, SwitchRoleReq, TokenPair, TokenType},
    repository::employee::employee_exists,
    utils::db_utils::PageRequest,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::IntoParams;

const USER_COLUMNS: &str = "id, username, password, active_role_id, employee_id, is_active";

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token encoding failed: {e}"))
}

async fn fetch_roles(pool: &MySqlPool, user_id: u64) -> AppResult<Vec<Role>> {
    let ids = sqlx::query_scalar::<_, u8>("SELECT role_id FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(roles_from_ids(&ids))
}

/// Builds the session identity; the stored active role wins when it is still held.
fn session_user(row: &UserRow, roles: Vec<Role>) -> AppResult<AuthUser> {
    let role = Role::from_id(row.active_role_id)
        .filter(|r| roles.contains(r))
        .or_else(|| roles.first().copied())
        .ok_or_else(|| AppError::Unauthorized("No role assigned".into()))?;

    Ok(AuthUser {
        user_id: row.id,
        username: row.username.clone(),
        role,
        roles,
        employee_id: row.employee_id,
    })
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenPair),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::validation("username", "Username or password required").into());
    }

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    let db_user = sqlx::query_as::<_, UserRow>(&sql)
        .bind(user.username.trim())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: user disabled");
            return Err(AppError::Unauthorized("Invalid credentials".into()).into());
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()).into());
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()).into());
    }
    debug!(user_id = db_user.id, "Password verified");

    let roles = fetch_roles(pool.get_ref(), db_user.id).await?;
    let session = session_user(&db_user, roles)?;

    let access_token =
        generate_access_token(&session, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(&session, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    store_refresh_token(pool.get_ref(), &refresh_claims).await?;

    // last_login_at is informational; a failure does not block login
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, role = %session.role, "Login successful");

    Ok(HttpResponse::Ok().json(TokenPair {
        access_token,
        refresh_token,
    }))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair; the presented refresh token is revoked", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());

    let token = bearer(&req).ok_or_else(unauthorized)?;
    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;
    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized().into());
    }

    // Revoke first; only the request that flips the row may rotate it.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0 AND expires_at > NOW()",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    if revoked.rows_affected() == 0 {
        return Err(unauthorized().into());
    }

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let db_user = sqlx::query_as::<_, UserRow>(&sql)
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?
        .filter(|u| u.is_active)
        .ok_or_else(unauthorized)?;

    let roles = fetch_roles(pool.get_ref(), db_user.id).await?;
    let session = session_user(&db_user, roles)?;

    let (new_refresh_token, new_claims) =
        generate_refresh_token(&session, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;
    store_refresh_token(pool.get_ref(), &new_claims).await?;

    let access_token =
        generate_access_token(&session, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = session.user_id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(TokenPair {
        access_token,
        refresh_token: new_refresh_token,
    }))
}

/// Revoke a refresh token. Always succeeds.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent; an unknown jti is not an error
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

/// Switch the active role to another role the caller holds
#[utoipa::path(
    put,
    path = "/api/auth/role",
    request_body = SwitchRoleReq,
    responses(
        (status = 200, description = "Fresh access token for the new role", body = RoleSwitched),
        (status = 403, description = "Role not held by the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn switch_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<SwitchRoleReq>,
) -> actix_web::Result<impl Responder> {
    let role = body.role;
    if !auth.holds(role) {
        return Err(AppError::Forbidden.into());
    }

    sqlx::query("UPDATE users SET active_role_id = ? WHERE id = ?")
        .bind(role.id())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let session = AuthUser { role, ..auth };
    let access_token =
        generate_access_token(&session, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;

    info!(user_id = session.user_id, role = %role, "Active role switched");

    Ok(HttpResponse::Ok().json(RoleSwitched { access_token, role }))
}

fn validate_new_user(req: &CreateUserReq) -> AppResult<Role> {
    if req.username.trim().is_empty() {
        return Err(AppError::validation("username", "The username field is required."));
    }
    if req.password.len() < 8 {
        return Err(AppError::validation(
            "password",
            "The password must be at least 8 characters.",
        ));
    }
    let first = req
        .roles
        .first()
        .copied()
        .ok_or_else(|| AppError::validation("roles", "At least one role is required."))?;

    let active = req.active_role.unwrap_or(first);
    if !req.roles.contains(&active) {
        return Err(AppError::validation(
            "active_role",
            "The active role must be one of the assigned roles.",
        ));
    }
    Ok(active)
}

/// Create a user with one or more roles
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Username already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateUserReq>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ManageUsers)?;

    let req = body.into_inner();
    let active_role = validate_new_user(&req)?;
    let username = req.username.trim().to_lowercase();

    if let Some(employee_id) = req.employee_id {
        if !employee_exists(pool.get_ref(), employee_id).await? {
            return Err(AppError::validation(
                "employee_id",
                "The selected employee id is invalid.",
            )
            .into());
        }
    }

    let hashed = hash_password(&req.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let mut tx = pool.begin().await.map_err(AppError::from)?;

    let inserted = sqlx::query(
        "INSERT INTO users (username, password, active_role_id, employee_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&username)
    .bind(&hashed)
    .bind(active_role.id())
    .bind(req.employee_id)
    .execute(&mut *tx)
    .await;

    let user_id = match inserted {
        Ok(res) => res.last_insert_id(),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            return Err(AppError::Conflict("Username already exists".into()).into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    let roles = roles_from_ids(&req.roles.iter().map(|r| r.id()).collect::<Vec<_>>());
    for role in &roles {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role.id())
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
    }

    tx.commit().await.map_err(AppError::from)?;

    info!(user_id, created_by = auth.user_id, "User created");

    Ok(HttpResponse::Created().json(UserSummary {
        id: user_id,
        username,
        roles,
        active_role,
        employee_id: req.employee_id,
        is_active: true,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u32>,
    /// 1..=100, default 20
    pub per_page: Option<u32>,
}

#[derive(sqlx::FromRow)]
struct UserListRow {
    id: u64,
    username: String,
    active_role_id: u8,
    employee_id: Option<u64>,
    is_active: bool,
    role_ids: Option<String>,
}

impl UserListRow {
    fn into_summary(self) -> UserSummary {
        let ids: Vec<u8> = self
            .role_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect();
        let roles = roles_from_ids(&ids);
        let active_role = Role::from_id(self.active_role_id)
            .filter(|r| roles.contains(r))
            .or_else(|| roles.first().copied())
            .unwrap_or(Role::Employee);

        UserSummary {
            id: self.id,
            username: self.username,
            roles,
            active_role,
            employee_id: self.employee_id,
            is_active: self.is_active,
        }
    }
}

/// List users with their roles
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Paginated users", body = Object, example = json!({
            "data": [{
                "id": 3,
                "username": "jdoe",
                "roles": ["employee", "team_leader"],
                "active_role": "team_leader",
                "employee_id": 7,
                "is_active": true
            }],
            "page": 1,
            "per_page": 20,
            "total": 1
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ManageUsers)?;

    let page = PageRequest::new(query.page, query.per_page.unwrap_or(20).clamp(1, 100));

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let rows = sqlx::query_as::<_, UserListRow>(
        r#"
        SELECT u.id, u.username, u.active_role_id, u.employee_id, u.is_active,
               GROUP_CONCAT(CAST(ur.role_id AS CHAR) ORDER BY ur.role_id) AS role_ids
        FROM users u
        LEFT JOIN user_roles ur ON ur.user_id = u.id
        GROUP BY u.id, u.username, u.active_role_id, u.employee_id, u.is_active
        ORDER BY u.id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(page.per_page as i64)
    .bind(page.offset() as i64)
    .fetch_all(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    let data: Vec<UserSummary> = rows.into_iter().map(UserListRow::into_summary).collect();

    Ok(HttpResponse::Ok().json(json!({
        "data": data,
        "page": page.page,
        "per_page": page.per_page,
        "total": total
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(active_role_id: u8) -> UserRow {
        UserRow {
            id: 3,
            username: "jdoe".into(),
            password: String::new(),
            active_role_id,
            employee_id: Some(7),
            is_active: true,
        }
    }

    #[test]
    fn session_falls_back_to_first_held_role() {
        let held = vec![Role::Employee, Role::TeamLeader];
        assert_eq!(session_user(&row(4), held.clone()).unwrap().role, Role::TeamLeader);
        assert_eq!(session_user(&row(1), held).unwrap().role, Role::Employee);
        assert!(matches!(
            session_user(&row(3), vec![]),
            Err(AppError::Unauthorized(_))
        ));
    }

    fn new_user(roles: Vec<Role>, active_role: Option<Role>) -> CreateUserReq {
        CreateUserReq {
            username: "new.hire".into(),
            password: "long-enough".into(),
            roles,
            active_role,
            employee_id: None,
        }
    }

    #[test]
    fn new_user_needs_roles_and_a_held_active_role() {
        assert_eq!(
            validate_new_user(&new_user(vec![Role::Hr, Role::Employee], None)).unwrap(),
            Role::Hr
        );
        assert!(matches!(
            validate_new_user(&new_user(vec![], None)),
            Err(AppError::Validation { ref field, .. }) if field == "roles"
        ));
        assert!(matches!(
            validate_new_user(&new_user(vec![Role::Employee], Some(Role::Admin))),
            Err(AppError::Validation { ref field, .. }) if field == "active_role"
        ));
    }

    #[test]
    fn grouped_role_ids_decode() {
        let summary = UserListRow {
            id: 1,
            username: "a".into(),
            active_role_id: 2,
            employee_id: None,
            is_active: true,
            role_ids: Some("2,3".into()),
        }
        .into_summary();
        assert_eq!(summary.roles, vec![Role::Hr, Role::Employee]);
        assert_eq!(summary.active_role, Role::Hr);
    }
}

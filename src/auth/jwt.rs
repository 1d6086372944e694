use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::auth::auth::AuthUser;
use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn claims_for(user: &AuthUser, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: user.user_id,
        sub: user.username.clone(),
        roles: user.roles.iter().map(|r| r.id()).collect(),
        role: user.role.id(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        employee_id: user.employee_id,
    }
}

pub fn generate_access_token(user: &AuthUser, secret: &str, ttl: usize) -> Result<String, Error> {
    let claims = claims_for(user, TokenType::Access, ttl);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_refresh_token(
    user: &AuthUser,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims_for(user, TokenType::Refresh, ttl);

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenType;

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = AppError::Unauthorized(message.to_string()).error_response();
    req.into_response(resp)
}

/// Verifies the bearer access token and stores the caller as [`AuthUser`].
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal("App config missing".into()))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => return Ok(reject(req, "Invalid Authorization header encoding")),
        },
        None => return Ok(reject(req, "Missing Authorization header")),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Ok(reject(req, "Authorization header must start with Bearer")),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, "Access token required"));
    }

    let auth_user = match AuthUser::from_claims(claims) {
        Ok(user) => user,
        Err(_) => return Ok(reject(req, "Invalid role")),
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::config::tests::test_config;
    use crate::model::role::Role;
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.username)
    }

    fn user() -> AuthUser {
        AuthUser {
            user_id: 5,
            username: "jdoe".into(),
            role: Role::Employee,
            roles: vec![Role::Employee],
            employee_id: Some(7),
        }
    }

    #[actix_web::test]
    async fn resolves_user_from_access_token() {
        let config = test_config();
        let token = generate_access_token(&user(), &config.jwt_secret, 60).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "jdoe");
    }

    #[actix_web::test]
    async fn rejects_missing_and_refresh_tokens() {
        let config = test_config();
        let (refresh, _) = generate_refresh_token(&user(), &config.jwt_secret, 60).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::error::{AppError, AppResult};
use crate::model::role::{Capability, Role};
use crate::model::user::roles_from_ids;
use crate::models::Claims;

/// The authenticated caller, resolved once per request by the auth middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    /// Active role; capability checks use this one only.
    pub role: Role,
    pub roles: Vec<Role>,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> AppResult<Self> {
        let roles = roles_from_ids(&claims.roles);
        let role = Role::from_id(claims.role)
            .filter(|r| roles.contains(r))
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            roles,
            employee_id: claims.employee_id,
        })
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, %capability, "Capability denied");
            Err(AppError::Forbidden)
        }
    }

    pub fn holds(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn owns(&self, employee_id: u64) -> bool {
        self.employee_id == Some(employee_id)
    }

    /// The linked employee id, for actions that only make sense for employees.
    pub fn employee(&self) -> AppResult<u64> {
        self.employee_id.ok_or(AppError::Forbidden)
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing token".into())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenType;

    fn claims(role: u8, roles: Vec<u8>) -> Claims {
        Claims {
            user_id: 1,
            sub: "hr.lead".into(),
            roles,
            role,
            exp: 0,
            jti: "j".into(),
            token_type: TokenType::Access,
            employee_id: None,
        }
    }

    #[test]
    fn active_role_must_be_held() {
        let user = AuthUser::from_claims(claims(2, vec![2, 3])).unwrap();
        assert_eq!(user.role, Role::Hr);
        assert!(user.holds(Role::Employee));

        assert!(matches!(
            AuthUser::from_claims(claims(1, vec![2, 3])),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn require_uses_active_role_only() {
        let user = AuthUser::from_claims(claims(3, vec![1, 3])).unwrap();
        assert!(matches!(
            user.require(Capability::ManageUsers),
            Err(AppError::Forbidden)
        ));
        assert!(user.require(Capability::SubmitAttendance).is_ok());
    }

    #[test]
    fn employee_link_is_required_for_employee_actions() {
        let user = AuthUser::from_claims(claims(1, vec![1])).unwrap();
        assert!(matches!(user.employee(), Err(AppError::Forbidden)));
        assert!(!user.owns(7));
    }
}

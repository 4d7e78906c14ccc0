use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::marker::PhantomData;

use crate::{
    models::user::UserRole,
    utils::{
        errors::AppError,
        jwt::verify_jwt,
        logger::{fields, LOGGER},
    },
    AppState,
};

const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

/// The one place roles are checked.
pub fn require_role(caller: &AuthUser, allowed: &[UserRole]) -> Result<(), AppError> {
    if allowed.contains(&caller.role) {
        return Ok(());
    }

    LOGGER.log_security_event(
        "role_denied",
        Some(caller.user_id),
        fields([
            ("role", json!(caller.role)),
            ("allowed", json!(allowed)),
        ]),
    );
    Err(AppError::Forbidden(
        "You do not have permission to perform this action".to_string(),
    ))
}

/// `Authorization: Bearer <jwt>`, falling back to the `token` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        return value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty())
}

/// Verifies the session token and loads the caller's current role, so role
/// changes and deletions take effect without waiting for token expiry.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let claims = verify_jwt(token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        role: user.role,
    });
    Ok(next.run(request).await)
}

/// A set of roles allowed through a [`Caller`] extractor.
pub trait RolePolicy: Send + Sync + 'static {
    const ALLOWED: &'static [UserRole];
}

pub struct AnyRole;
pub struct StudentOnly;
pub struct AdminOnly;
/// Instructors and admins.
pub struct Staff;

impl RolePolicy for AnyRole {
    const ALLOWED: &'static [UserRole] = &[UserRole::Student, UserRole::Instructor, UserRole::Admin];
}

impl RolePolicy for StudentOnly {
    const ALLOWED: &'static [UserRole] = &[UserRole::Student];
}

impl RolePolicy for AdminOnly {
    const ALLOWED: &'static [UserRole] = &[UserRole::Admin];
}

impl RolePolicy for Staff {
    const ALLOWED: &'static [UserRole] = &[UserRole::Instructor, UserRole::Admin];
}

/// Authenticated caller whose role satisfies `P`; rejected before the handler runs.
pub struct Caller<P: RolePolicy> {
    pub user: AuthUser,
    _policy: PhantomData<fn() -> P>,
}

impl<P: RolePolicy> Caller<P> {
    pub fn id(&self) -> i32 {
        self.user.user_id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }
}

#[async_trait]
impl<S, P> FromRequestParts<S> for Caller<P>
where
    S: Send + Sync,
    P: RolePolicy,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        require_role(&user, P::ALLOWED)?;

        Ok(Caller {
            user,
            _policy: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn caller(role: UserRole) -> AuthUser {
        AuthUser { user_id: 1, role }
    }

    #[test]
    fn require_role_checks_membership() {
        assert!(require_role(&caller(UserRole::Admin), AdminOnly::ALLOWED).is_ok());
        assert!(require_role(&caller(UserRole::Instructor), Staff::ALLOWED).is_ok());
        assert!(matches!(
            require_role(&caller(UserRole::Student), Staff::ALLOWED),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_role(&caller(UserRole::Admin), StudentOnly::ALLOWED).is_err());
    }

    #[test]
    fn bearer_header_is_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=cookie-token"));
        assert_eq!(extract_token(&headers), Some("abc.def"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=xyz; lang=en"));
        assert_eq!(extract_token(&headers), Some("xyz"));
    }

    #[test]
    fn malformed_header_yields_nothing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_token(&headers), None);
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}

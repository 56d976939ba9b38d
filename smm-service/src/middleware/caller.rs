//! Caller identity extracted from gateway headers.
//!
//! An upstream gateway authenticates the caller and sets `X-User-ID` and
//! `X-User-Role`. This service trusts those headers and performs no
//! authentication of its own.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub role: Option<String>,
}

impl CallerContext {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header")))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid X-User-ID header")))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        Ok(CallerContext { user_id, role })
    }
}

/// A caller holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminContext(pub CallerContext);

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = CallerContext::from_request_parts(parts, state).await?;
        if !caller.is_admin() {
            return Err(AppError::Forbidden(anyhow::anyhow!("Admin role required")));
        }
        Ok(AdminContext(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http;

    async fn extract(request: http::Request<()>) -> Result<AdminContext, AppError> {
        let (mut parts, _) = request.into_parts();
        AdminContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn admin_requires_role() {
        let user = Uuid::new_v4().to_string();

        let plain = http::Request::builder()
            .header(USER_ID_HEADER, &user)
            .body(())
            .unwrap();
        assert!(matches!(extract(plain).await, Err(AppError::Forbidden(_))));

        let admin = http::Request::builder()
            .header(USER_ID_HEADER, &user)
            .header(USER_ROLE_HEADER, "Admin")
            .body(())
            .unwrap();
        assert!(extract(admin).await.is_ok());
    }

    #[tokio::test]
    async fn missing_or_bad_user_id_is_unauthorized() {
        let missing = http::Request::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(AppError::Unauthorized(_))));

        let bad = http::Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(bad).await, Err(AppError::Unauthorized(_))));
    }
}

use axum::{extract::FromRequestParts, http::request::Parts};
use crate::utils::error::ApiError;

/// Role carried on an authenticated request. The core never issues or
/// verifies tokens; it trusts whatever an upstream auth collaborator has
/// already established and attached as headers (§9: "the handler receives
/// an already-authorized caller identity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?
            .to_string();

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| ApiError::Unauthorized("missing or unrecognized X-User-Role header".to_string()))?;

        Ok(AuthenticatedUser { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn extracts_user_id_and_role() {
        let request = Request::builder()
            .header("x-user-id", "u1")
            .header("x-user-role", "admin")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let user = AuthenticatedUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn rejects_missing_user_id() {
        let request = Request::builder().header("x-user-role", "user").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let result = AuthenticatedUser::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }
}

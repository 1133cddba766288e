use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use auth_core::Role;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use be_auth_core::JwtConfig;
use uuid::Uuid;

use crate::{
    AuthzError, Principal, RoleDirectory, authorize,
    rate_limit::{AuthFailureRateLimiter, new_auth_failure_rate_limiter},
    token::extract_token,
};

/// Turns request credentials into a [`Principal`]. Installed once as a
/// request extension and consulted by the [`AuthUser`] and [`AdminUser`]
/// extractors.
#[derive(Clone)]
pub struct IdentityGate {
    jwt_config: Arc<JwtConfig>,
    directory: Arc<dyn RoleDirectory>,
    rate_limiter: AuthFailureRateLimiter,
}

impl IdentityGate {
    pub fn new(jwt_config: Arc<JwtConfig>, directory: Arc<dyn RoleDirectory>) -> Self {
        Self {
            jwt_config,
            directory,
            rate_limiter: new_auth_failure_rate_limiter(),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: AuthFailureRateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        client_ip: IpAddr,
    ) -> Result<Principal, AuthzError> {
        match self.resolve(headers).await {
            Err(err) if err.is_credential_failure() => {
                if self.rate_limiter.check_key(&client_ip).is_err() {
                    tracing::warn!(ip = %client_ip, "Rate limited after repeated authentication failures");
                    return Err(AuthzError::RateLimited);
                }
                Err(err)
            }
            other => other,
        }
    }

    async fn resolve(&self, headers: &HeaderMap) -> Result<Principal, AuthzError> {
        let token = extract_token(headers).ok_or(AuthzError::MissingToken)?;

        let claims = self
            .jwt_config
            .validate_access_token(&token)
            .map_err(|e| AuthzError::InvalidToken(e.to_string()))?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthzError::InvalidToken("subject is not a user id".to_string()))?;

        let role = self
            .directory
            .role_of(user_id)
            .await?
            .ok_or(AuthzError::UnknownUser)?;

        Ok(Principal { user_id, role })
    }
}

fn client_ip(parts: &Parts) -> IpAddr {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Any authenticated caller.
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let gate = parts
            .extensions
            .get::<IdentityGate>()
            .cloned()
            .ok_or(AuthzError::NotConfigured)?;

        let principal = gate.authenticate(&parts.headers, client_ip(parts)).await?;
        Ok(AuthUser(principal))
    }
}

/// An authenticated caller whose stored role is `admin`.
pub struct AdminUser(pub Principal);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        authorize(&principal, &[Role::Admin])?;
        Ok(AdminUser(principal))
    }
}

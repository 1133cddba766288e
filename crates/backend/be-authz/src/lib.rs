mod directory;
mod error;
mod extract;
mod principal;
mod rate_limit;
mod token;

pub use be_auth_core::*;
pub use directory::RoleDirectory;
pub use error::AuthzError;
pub use extract::{AdminUser, AuthUser, IdentityGate};
pub use principal::{Principal, authorize};
pub use rate_limit::{AuthFailureRateLimiter, new_auth_failure_rate_limiter};
pub use token::extract_token;

//! `Actor` extractor: reads the identity asserted by the upstream gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use bizhub_core::error::AppError;
use bizhub_entity::ModuleType;
use bizhub_service::context::RequestContext;

use crate::error::ApiError;

/// Header carrying the acting username.
pub const USERNAME_HEADER: &str = "x-username";
/// Header carrying the numeric user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the module role.
pub const ROLE_HEADER: &str = "x-role";
/// Header carrying the originating device.
pub const DEVICE_HEADER: &str = "x-device-id";

/// Acting user context available in handlers.
#[derive(Debug, Clone)]
pub struct Actor(pub RequestContext);

impl Actor {
    /// Returns the inner `RequestContext`.
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

impl std::ops::Deref for Actor {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let username = header(parts, USERNAME_HEADER)
            .ok_or_else(|| AppError::authorization(format!("Missing {USERNAME_HEADER} header")))?;

        let role: ModuleType = header(parts, ROLE_HEADER)
            .ok_or_else(|| AppError::authorization(format!("Missing {ROLE_HEADER} header")))?
            .parse()?;

        let user_id = header(parts, USER_ID_HEADER)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| AppError::validation(format!("Invalid {USER_ID_HEADER}: '{v}'")))
            })
            .transpose()?;

        let mut ctx = RequestContext::new(username, user_id, role);
        if let Some(device_id) = header(parts, DEVICE_HEADER) {
            ctx = ctx.with_device(device_id);
        }

        Ok(Actor(ctx))
    }
}

//! CORS layer configuration.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use bizhub_core::config::ServerConfig;

use crate::extractors::actor::{DEVICE_HEADER, ROLE_HEADER, USER_ID_HEADER, USERNAME_HEADER};

/// Builds a CORS tower layer from the server configuration.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(USERNAME_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(ROLE_HEADER),
            HeaderName::from_static(DEVICE_HEADER),
        ]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

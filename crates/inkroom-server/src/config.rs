//! Server configuration loaded from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::{HeaderValue, Method};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;

/// Origin of the development web client, always allowed.
pub const DEV_CLIENT_ORIGIN: &str = "http://localhost:5173";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid PORT {0:?}")]
    InvalidPort(String),
    #[error("Invalid HOST {0:?}")]
    InvalidHost(String),
    #[error("Invalid CLIENT_URL origin {0:?}")]
    InvalidOrigin(String),
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            allowed_origins: vec![DEV_CLIENT_ORIGIN.to_string()],
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT` and `CLIENT_URL` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        if let Some(host) = lookup("HOST").filter(|v| !v.trim().is_empty()) {
            config.host = host
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHost(host.clone()))?;
        }

        if let Some(origin) = lookup("CLIENT_URL").filter(|v| !v.trim().is_empty()) {
            let origin = origin.trim().trim_end_matches('/').to_string();
            HeaderValue::from_str(&origin).map_err(|_| ConfigError::InvalidOrigin(origin.clone()))?;
            if !config.allowed_origins.contains(&origin) {
                config.allowed_origins.push(origin);
            }
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// CORS layer allowing GET and POST from the configured origins.
    pub fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        let origins = self
            .allowed_origins
            .iter()
            .map(|o| HeaderValue::from_str(o).map_err(|_| ConfigError::InvalidOrigin(o.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST]))
    }
}

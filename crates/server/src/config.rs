// crates/server/src/config.rs
//! Server configuration from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use curation_export_jobs::JobsConfig;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47893;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jobs: JobsConfig,
}

impl ServerConfig {
    /// Port from `EXPORT_SERVER_PORT`, then `PORT`; host from
    /// `EXPORT_SERVER_HOST`. Anything unparsable falls back to the default.
    pub fn from_env() -> Self {
        let port = std::env::var("EXPORT_SERVER_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let host = std::env::var("EXPORT_SERVER_HOST")
            .ok()
            .and_then(|h| h.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Self {
            host,
            port,
            jobs: JobsConfig::from_env(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            jobs: JobsConfig::default(),
        }
    }
}

//! Build and deployment information for health reporting.

use serde::{Deserialize, Serialize};

use crate::config::GateConfig;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub git_sha: String,
    pub build_timestamp: String,
}

impl BuildInfo {
    /// Build information for the running process.
    ///
    /// `GIT_SHA` and `BUILD_TIMESTAMP` are read from the environment and
    /// default to "unknown".
    pub fn current(config: &GateConfig) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: config.environment.to_string(),
            git_sha: env_or_unknown("GIT_SHA"),
            build_timestamp: env_or_unknown("BUILD_TIMESTAMP"),
        }
    }
}

fn env_or_unknown(name: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

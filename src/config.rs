//! Gate configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::oidc::{ProviderConfig, ProviderConfigJson};

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Preprod,
    Prod,
}

impl Environment {
    /// Production-like environments never accept synthetic test tokens.
    pub fn is_protected(&self) -> bool {
        matches!(self, Environment::Preprod | Environment::Prod)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Preprod => write!(f, "preprod"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "preprod" => Ok(Environment::Preprod),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("Unknown environment: '{}'", other)),
        }
    }
}

/// Top-level gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Accept `e2e-test:<subject>` tokens without verification.
    #[serde(default)]
    pub e2e_test_mode: bool,

    /// Path of the identity database.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default)]
    pub provider: ProviderConfig,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/identity-gate/identities.redb")
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            e2e_test_mode: false,
            store_path: default_store_path(),
            provider: ProviderConfig::default(),
        }
    }
}

impl GateConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.e2e_test_mode && self.environment.is_protected() {
            return Err(format!(
                "e2e_test_mode cannot be enabled in the {} environment",
                self.environment
            ));
        }

        self.provider.validate()
    }
}

/// JSON overlay for gate settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct GateConfigJson {
    pub environment: Option<Environment>,
    pub e2e_test_mode: Option<bool>,
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub provider: ProviderConfigJson,
}

impl GateConfigJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut GateConfig) {
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(enabled) = self.e2e_test_mode {
            config.e2e_test_mode = enabled;
        }
        if let Some(ref path) = self.store_path {
            config.store_path = path.clone();
        }
        self.provider.apply_to(&mut config.provider);
    }
}

//! Identity Gate CLI
//!
//! Operator front end for the authentication gate: resolves tokens to
//! identities, reports build information and seeds organization records.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use identity_gate::{
    bearer_token, AuthError, AuthGate, BuildInfo, Environment, GateConfig, GateConfigJson,
    Identity, IdentityStore, Organization, RedbIdentityStore,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "identity-gate")]
#[command(about = "Bearer-token authentication gate backed by a provider user pool")]
struct Args {
    /// JSON configuration file, applied over the other options
    #[arg(long, env = "IDENTITY_GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Deployment environment (development, preprod, prod)
    #[arg(long, default_value = "development", env = "ENVIRONMENT")]
    environment: Environment,

    /// Accept e2e-test:<subject> tokens without verification
    #[arg(long, env = "E2E_TEST_MODE")]
    e2e_test_mode: bool,

    /// Identity database path
    #[arg(
        long,
        default_value = "/var/lib/identity-gate/identities.redb",
        env = "IDENTITY_STORE_PATH"
    )]
    store_path: PathBuf,

    /// User pool identifier
    #[arg(long, env = "COGNITO_USER_POOL_ID")]
    user_pool_id: Option<String>,

    /// App client id (expected token audience)
    #[arg(long, env = "COGNITO_CLIENT_ID")]
    client_id: Option<String>,

    /// User pool region
    #[arg(long, default_value = "us-east-1", env = "COGNITO_REGION")]
    region: String,

    /// Log filter directive (e.g. info, debug, identity_gate=trace)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a token to its identity and print it as JSON
    Authenticate {
        /// Raw token or "Bearer <token>"
        #[arg(long, env = "IDENTITY_TOKEN")]
        token: Option<String>,
    },
    /// Print the identity and its organization
    Whoami {
        /// Raw token or "Bearer <token>"
        #[arg(long, env = "IDENTITY_TOKEN")]
        token: Option<String>,
    },
    /// Print build information
    Health,
    /// Create an organization, optionally assigning an existing identity to it
    SeedOrganization {
        /// Organization name
        #[arg(long)]
        name: String,

        /// Subject identifier of an identity to assign
        #[arg(long)]
        member: Option<String>,
    },
}

#[derive(Serialize)]
struct Whoami {
    identity: Identity,
    organization: Option<Organization>,
}

impl Args {
    fn gate_config(&self) -> Result<GateConfig> {
        let mut config = GateConfig {
            environment: self.environment,
            e2e_test_mode: self.e2e_test_mode,
            store_path: self.store_path.clone(),
            ..Default::default()
        };
        config.provider.user_pool_id = self.user_pool_id.clone();
        config.provider.client_id = self.client_id.clone();
        config.provider.region = self.region.clone();

        if let Some(path) = &self.config {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let overlay: GateConfigJson = serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            overlay.apply_to(&mut config);
        }

        config
            .validate()
            .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

        Ok(config)
    }
}

/// Accept either a bare token or an `Authorization` header value.
fn raw_token(arg: Option<&str>) -> Option<&str> {
    let arg = arg?.trim();
    let has_scheme = arg
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "));
    if has_scheme {
        bearer_token(Some(arg))
    } else if arg.is_empty() {
        None
    } else {
        Some(arg)
    }
}

fn rejected(err: AuthError) -> anyhow::Error {
    anyhow!("{} ({})", err.public_message(), err.status_code())
}

fn open_store(config: &GateConfig) -> Result<Arc<RedbIdentityStore>> {
    let store = RedbIdentityStore::open(config.store_path.clone())
        .with_context(|| format!("Failed to open identity store: {:?}", config.store_path))?;
    Ok(Arc::new(store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = args.gate_config()?;

    info!(
        environment = %config.environment,
        e2e_test_mode = config.e2e_test_mode,
        auth_enabled = config.provider.auth_enabled(),
        "Configuration loaded"
    );

    match args.command {
        Command::Authenticate { token } => {
            let gate = AuthGate::new(&config, open_store(&config)?).map_err(rejected)?;
            let identity = gate
                .authenticate(raw_token(token.as_deref()))
                .await
                .map_err(rejected)?;
            print_json(&identity)
        }
        Command::Whoami { token } => {
            let gate = AuthGate::new(&config, open_store(&config)?).map_err(rejected)?;
            let identity = gate
                .authenticate(raw_token(token.as_deref()))
                .await
                .map_err(rejected)?;
            let organization = gate.organization_of(&identity).await.map_err(rejected)?;
            print_json(&Whoami {
                identity,
                organization,
            })
        }
        Command::Health => print_json(&BuildInfo::current(&config)),
        Command::SeedOrganization { name, member } => {
            let store = open_store(&config)?;
            let organization = Organization::new(name);
            store
                .put_organization(organization.clone())
                .await
                .context("Failed to store organization")?;
            info!(id = %organization.id, name = %organization.name, "Organization created");

            if let Some(subject) = member {
                store
                    .assign_organization(&subject, Some(organization.id))
                    .await
                    .with_context(|| format!("Failed to assign '{}' to organization", subject))?;
                info!(sub = %subject, id = %organization.id, "Identity assigned to organization");
            }

            print_json(&organization)
        }
    }
}

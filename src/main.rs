//! KeyHub — license key issuing and activation server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyhub_core::KeyHubConfig;
use keyhub_platform::{LicenseDb, accounts, licensing};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyhub", about = "KeyHub — license key server", version)]
struct Cli {
    /// Config file (default: $KEYHUB_CONFIG or <config dir>/keyhub/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Create an operator account for the admin API
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create a license with an explicit key
    CreateLicense {
        #[arg(long)]
        key: String,
        #[arg(long, default_value_t = 1)]
        max_devices: i64,
    },
    /// Print a freshly generated license key
    GenKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(KeyHubConfig::default_path);
    let mut config = KeyHubConfig::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            keyhub_gateway::start(config).await?;
        }
        Commands::CreateAdmin { email, password } => {
            let mut db = LicenseDb::open(&config.database.path).context("open database")?;
            let id = accounts::create_admin(&mut db, &email, &password, config.auth.bcrypt_cost)?;
            println!("✅ Admin {email} created (id={id})");
        }
        Commands::CreateLicense { key, max_devices } => {
            let mut db = LicenseDb::open(&config.database.path).context("open database")?;
            licensing::create_license(&mut db, &key, max_devices)?;
            println!("✅ License {key} created (max_devices={max_devices})");
        }
        Commands::GenKey => {
            println!("{}", keyhub_core::keygen::generate_license_key());
        }
    }

    Ok(())
}

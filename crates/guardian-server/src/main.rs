//! guardian-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) and `GUARDIAN_*`
//! environment variables, opens the SQLite store and serves the HTTP API.
//!
//! # Bootstrapping an administrator
//!
//! Register through `POST /api/accounts`, then:
//!
//! ```
//! cargo run -p guardian-server -- --promote-admin you@example.com
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use guardian_core::{
  principal::normalize_email,
  profile::{AccountStatus, Role},
  store::{AccountStore, ProfileStore},
};
use guardian_server::{AppState, ServerConfig, auth::hash_password};
use guardian_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Guardian session gate server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Make the account with this email an enabled administrator and exit.
  #[arg(long, value_name = "EMAIL")]
  promote_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/guardian/guardian.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GUARDIAN"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(email) = cli.promote_admin {
    return promote_admin(&store, &email).await;
  }

  let state = AppState {
    store: Arc::new(store),
  };

  let app = guardian_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Give an existing account the admin role and an enabled status, creating
/// its profile if it has none.
async fn promote_admin(store: &SqliteStore, email: &str) -> anyhow::Result<()> {
  let email = normalize_email(email)?;
  let account = store
    .find_account(&email)
    .await?
    .with_context(|| format!("no account for {email}"))?;
  let id = account.principal.principal_id;

  store.create_profile(id).await?;
  store.set_role(id, Role::Admin).await?;
  store.set_status(id, AccountStatus::Enabled).await?;

  tracing::info!(principal = %id, %email, "promoted to administrator");
  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

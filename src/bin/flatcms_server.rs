//!
//! flatcms server binary
//! ---------------------
//! Command-line entry point for the flatcms HTTP server, plus an `add-user`
//! subcommand for seeding the credential table.

use anyhow::{Context, Result};
use std::env;

use flatcms::config::{has_flag, ServerConfig};
use flatcms::security::{normalize_username, CredentialStore};

const USAGE: &str = "flatcms Server

USAGE:
  flatcms_server [--http-port N] [--bind ADDR] [--data-dir PATH] [--users-file PATH] [--session-ttl-secs N]
  flatcms_server add-user <username> <password> [--users-file PATH]

OPTIONS:
  --http-port N           HTTP port (env: FLATCMS_HTTP_PORT, default 4567)
  --bind ADDR             Listen address (env: FLATCMS_BIND, default 0.0.0.0)
  --data-dir PATH         Document directory (env: FLATCMS_DATA_DIR, default data)
  --users-file PATH       YAML credential table (env: FLATCMS_USERS_FILE, default users.yml)
  --session-ttl-secs N    Idle session lifetime (env: FLATCMS_SESSION_TTL_SECS, default 3600)
";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let cfg = ServerConfig::from_env_and_args(&args);

    if args.get(1).map(String::as_str) == Some("add-user") {
        let (Some(username), Some(password)) = (args.get(2), args.get(3)) else {
            anyhow::bail!("add-user needs <username> <password>\n\n{}", USAGE);
        };
        let user = normalize_username(username);
        if user.is_empty() || password.is_empty() {
            anyhow::bail!("username and password must not be blank");
        }
        let store = CredentialStore::new(&cfg.users_file);
        store.initialize().with_context(|| format!("While creating {}", cfg.users_file.display()))?;
        store.register(username, password).with_context(|| format!("While adding user {:?}", username))?;
        println!("added user {} to {}", user, cfg.users_file.display());
        return Ok(());
    }

    println!("flatcms starting on {}, data_dir={}", cfg.listen_addr(), cfg.data_dir.display());
    flatcms::server::run(cfg).await
}

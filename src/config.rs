//! Server configuration: defaults, overlaid by environment variables, overlaid by
//! command-line flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const ENV_BIND: &str = "FLATCMS_BIND";
pub const ENV_HTTP_PORT: &str = "FLATCMS_HTTP_PORT";
pub const ENV_DATA_DIR: &str = "FLATCMS_DATA_DIR";
pub const ENV_USERS_FILE: &str = "FLATCMS_USERS_FILE";
pub const ENV_SESSION_TTL: &str = "FLATCMS_SESSION_TTL_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub http_port: u16,
    /// Directory holding the documents.
    pub data_dir: PathBuf,
    /// YAML credential table.
    pub users_file: PathBuf,
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            http_port: 4567,
            data_dir: PathBuf::from("data"),
            users_file: PathBuf::from("users.yml"),
            session_ttl_secs: 60 * 60,
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl ServerConfig {
    /// Layer `lookup` (normally the process environment) and then `args` over the defaults.
    /// Unparseable numbers are ignored and the lower layer's value is kept.
    pub fn resolve<F>(lookup: F, args: &[String]) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_BIND) { cfg.bind = v; }
        if let Some(p) = lookup(ENV_HTTP_PORT).and_then(|v| v.parse::<u16>().ok()) { cfg.http_port = p; }
        if let Some(v) = lookup(ENV_DATA_DIR) { cfg.data_dir = PathBuf::from(v); }
        if let Some(v) = lookup(ENV_USERS_FILE) { cfg.users_file = PathBuf::from(v); }
        if let Some(t) = lookup(ENV_SESSION_TTL).and_then(|v| v.parse::<u64>().ok()) { cfg.session_ttl_secs = t; }

        if let Some(v) = flag_value(args, "--bind") { cfg.bind = v.to_string(); }
        if let Some(p) = flag_value(args, "--http-port").and_then(|v| v.parse::<u16>().ok()) { cfg.http_port = p; }
        if let Some(v) = flag_value(args, "--data-dir") { cfg.data_dir = PathBuf::from(v); }
        if let Some(v) = flag_value(args, "--users-file") { cfg.users_file = PathBuf::from(v); }
        if let Some(t) = flag_value(args, "--session-ttl-secs").and_then(|v| v.parse::<u64>().ok()) { cfg.session_ttl_secs = t; }

        cfg
    }

    pub fn from_env_and_args(args: &[String]) -> Self {
        Self::resolve(|k| std::env::var(k).ok(), args)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.http_port)
    }
}

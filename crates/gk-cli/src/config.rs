//! Settings resolution: command line and environment over config file over defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use gk_ratelimit::RateLimitConfig;
use serde::Deserialize;

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_DB: &str = "limiter_db.txt";

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Maximum admissions per principal per window [default: 10].
    #[arg(long, global = true, env = "GATEKEEPER_MAX_REQUESTS")]
    pub max_requests: Option<u32>,

    /// Window length in seconds [default: 60].
    #[arg(long, global = true, env = "GATEKEEPER_WINDOW_SECS")]
    pub window_secs: Option<u64>,

    /// Snapshot file [default: limiter_db.txt].
    #[arg(long, global = true, env = "GATEKEEPER_DB")]
    pub db: Option<PathBuf>,

    /// Secret the snapshot key is derived from.
    #[arg(long, global = true, env = "GATEKEEPER_KEY", hide_env_values = true)]
    pub secret: Option<String>,

    /// TOML file supplying any of the options above.
    #[arg(long, global = true, env = "GATEKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter (`RUST_LOG` takes precedence).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub max_requests: Option<u32>,
    pub window_secs: Option<u64>,
    pub db: Option<PathBuf>,
    pub secret: Option<String>,
}

impl FileConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub limits: RateLimitConfig,
    pub db: PathBuf,
    pub secret: String,
}

impl Settings {
    /// Merge flags, environment, and the optional config file.
    ///
    /// A missing or empty secret is a hard error.
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: &GlobalArgs, file: FileConfig) -> Result<Self> {
        let defaults = RateLimitConfig::default();
        let limits = RateLimitConfig::new(
            args.max_requests
                .or(file.max_requests)
                .unwrap_or(defaults.max_requests),
            args.window_secs
                .or(file.window_secs)
                .unwrap_or(defaults.window_secs),
        );
        limits.validate()?;

        let Some(secret) = args.secret.clone().or(file.secret).filter(|s| !s.is_empty()) else {
            bail!("no snapshot secret configured: pass --secret or set GATEKEEPER_KEY");
        };

        Ok(Self {
            limits,
            db: args
                .db
                .clone()
                .or(file.db)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB)),
            secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_secret() -> GlobalArgs {
        GlobalArgs {
            secret: Some("s3cret".into()),
            ..GlobalArgs::default()
        }
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings = Settings::merge(&args_with_secret(), FileConfig::default()).unwrap();

        assert_eq!(settings.limits, RateLimitConfig::new(10, 60));
        assert_eq!(settings.db, PathBuf::from(DEFAULT_DB));
    }

    #[test]
    fn flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
            max_requests = 3
            window_secs = 10
            db = "/tmp/from-file.txt"
            "#,
        )
        .unwrap();
        let args = GlobalArgs {
            max_requests: Some(7),
            ..args_with_secret()
        };

        let settings = Settings::merge(&args, file).unwrap();

        assert_eq!(settings.limits, RateLimitConfig::new(7, 10));
        assert_eq!(settings.db, PathBuf::from("/tmp/from-file.txt"));
    }

    #[test]
    fn secret_may_come_from_file() {
        let file: FileConfig = toml::from_str(r#"secret = "from-file""#).unwrap();

        let settings = Settings::merge(&GlobalArgs::default(), file).unwrap();

        assert_eq!(settings.secret, "from-file");
    }

    #[test]
    fn missing_secret_fails() {
        let err = Settings::merge(&GlobalArgs::default(), FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("GATEKEEPER_KEY"));
    }

    #[test]
    fn empty_secret_fails() {
        let args = GlobalArgs {
            secret: Some(String::new()),
            ..GlobalArgs::default()
        };
        assert!(Settings::merge(&args, FileConfig::default()).is_err());
    }

    #[test]
    fn zero_window_fails() {
        let args = GlobalArgs {
            window_secs: Some(0),
            ..args_with_secret()
        };
        assert!(Settings::merge(&args, FileConfig::default()).is_err());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("max_request = 3").is_err());
    }
}

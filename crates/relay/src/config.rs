use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::{DatabaseConfig, DatabaseType};

/// Database connection flags, shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// Configuration database backend (sqlite or postgres)
    #[arg(long, env = "DATABASE_TYPE", default_value = "sqlite")]
    pub database_type: String,

    #[arg(long, env = "SQLITE_PATH", default_value = "data/alertanio.db")]
    pub sqlite_path: PathBuf,

    /// Full PostgreSQL URL; takes precedence over the DB_* flags
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, env = "DB_NAME", default_value = "alerta")]
    pub db_name: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl DatabaseArgs {
    pub fn to_config(&self) -> crate::Result<DatabaseConfig> {
        let db_type = match self.database_type.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseType::Postgres,
            "sqlite" => DatabaseType::Sqlite,
            other => {
                return Err(crate::Error::Config(format!(
                    "Unsupported DATABASE_TYPE '{}'",
                    other
                )))
            }
        };

        let connection_string = self.database_url.clone().or_else(|| {
            self.db_host.as_ref().map(|host| {
                let password = self
                    .db_password
                    .as_ref()
                    .map(|p| format!(":{}", p))
                    .unwrap_or_default();
                format!(
                    "postgres://{}{}@{}:{}/{}",
                    self.db_user, password, host, self.db_port, self.db_name
                )
            })
        });

        let config = DatabaseConfig {
            db_type,
            sqlite_path: Some(self.sqlite_path.clone()),
            connection_string,
            max_connections: self.max_connections,
        };
        config.validate().map_err(crate::Error::Config)?;
        Ok(config)
    }
}

/// Flags for the relay loop.
#[derive(Debug, Clone, Args)]
pub struct RelayArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Name of the row in the `configuration` table to run with
    #[arg(long, env = "ALERTANIO_ENVIRONMENT", default_value = "prod")]
    pub environment: String,

    /// Seconds between two polls of Alerta
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 60)]
    pub poll_interval: u64,

    /// Minutes that must pass since an alert was last received before it is relayed
    #[arg(long, env = "REPEAT_INTERVAL", default_value_t = 0)]
    pub repeat_interval: i64,

    #[arg(long, env = "CHECKPOINT_PATH", default_value = "data/last_poll")]
    pub checkpoint_path: PathBuf,

    #[arg(long, env = "ALERTA_API_KEY", hide_env_values = true)]
    pub alerta_api_key: Option<String>,

    #[arg(long, env = "ZULIP_SITE")]
    pub zulip_site: Option<String>,

    #[arg(long, env = "ZULIP_EMAIL")]
    pub zulip_email: Option<String>,

    #[arg(long, env = "ZULIP_API_KEY", hide_env_values = true)]
    pub zulip_api_key: Option<String>,

    #[arg(long, env = "ZULIP_TYPE", default_value = "stream")]
    pub zulip_type: String,

    /// Stream used when no topic route names one
    #[arg(long, env = "ZULIP_TO")]
    pub zulip_to: Option<String>,

    /// Subject used when no topic route names one; defaults to the service key
    #[arg(long, env = "ZULIP_SUBJECT")]
    pub zulip_subject: Option<String>,

    #[arg(long, env = "ZULIP_ALLOW_INSECURE")]
    pub zulip_allow_insecure: bool,

    /// Older spelling of ZULIP_ALLOW_INSECURE, still honoured
    #[arg(long, env = "ZULIP_ALLOW_UNSECURE", hide = true)]
    pub zulip_allow_unsecure: bool,

    /// Serve /health and /metrics on this address
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub environment: String,
    pub poll: PollConfig,
    pub alerta: AlertaCredentials,
    pub zulip: ZulipConfig,
    pub routing: RoutingDefaults,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval: Duration,
    pub repeat_interval_minutes: i64,
    pub checkpoint_path: PathBuf,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AlertaCredentials {
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AlertaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertaCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ZulipConfig {
    pub site: String,
    pub email: String,
    pub api_key: String,
    #[serde(default)]
    pub allow_insecure: bool,
}

impl std::fmt::Debug for ZulipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZulipConfig")
            .field("site", &self.site)
            .field("email", &self.email)
            .field("api_key", &"<redacted>")
            .field("allow_insecure", &self.allow_insecure)
            .finish()
    }
}

/// Destination used when a topic route is missing or incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDefaults {
    pub message_type: String,
    pub to: String,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

impl Config {
    pub fn from_args(args: &RelayArgs) -> crate::Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_ref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| crate::Error::Config(format!("{} must be set", name)))
        };

        if args.poll_interval == 0 {
            return Err(crate::Error::Config(
                "POLL_INTERVAL must be at least one second".to_string(),
            ));
        }
        if args.repeat_interval < 0 {
            return Err(crate::Error::Config(
                "REPEAT_INTERVAL cannot be negative".to_string(),
            ));
        }

        let config = Config {
            database: args.database.to_config()?,
            environment: args.environment.clone(),
            poll: PollConfig {
                interval: Duration::from_secs(args.poll_interval),
                repeat_interval_minutes: args.repeat_interval,
                checkpoint_path: args.checkpoint_path.clone(),
            },
            alerta: AlertaCredentials {
                api_key: args.alerta_api_key.clone(),
            },
            zulip: ZulipConfig {
                site: required(&args.zulip_site, "ZULIP_SITE")?,
                email: required(&args.zulip_email, "ZULIP_EMAIL")?,
                api_key: required(&args.zulip_api_key, "ZULIP_API_KEY")?,
                allow_insecure: args.zulip_allow_insecure || args.zulip_allow_unsecure,
            },
            routing: RoutingDefaults {
                message_type: args.zulip_type.clone(),
                to: required(&args.zulip_to, "ZULIP_TO")?,
                subject: args
                    .zulip_subject
                    .clone()
                    .filter(|s| !s.trim().is_empty()),
            },
            server: args
                .metrics_addr
                .clone()
                .map(|addr| ServerConfig { addr }),
        };

        if config.alerta.api_key.is_none() {
            tracing::warn!("ALERTA_API_KEY is not set. Requests to Alerta will be unauthenticated.");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RelayArgs,
    }

    fn parse(extra: &[&str]) -> RelayArgs {
        let mut argv = vec![
            "alertanio",
            "--zulip-site",
            "https://chat.example.com",
            "--zulip-email",
            "bot@example.com",
            "--zulip-api-key",
            "secret",
            "--zulip-to",
            "alerts",
        ];
        argv.extend_from_slice(extra);
        TestCli::parse_from(argv).args
    }

    #[test]
    fn test_config_from_args() {
        let config = Config::from_args(&parse(&["--poll-interval", "30", "--repeat-interval", "5"])).unwrap();
        assert_eq!(config.poll.interval, Duration::from_secs(30));
        assert_eq!(config.poll.repeat_interval_minutes, 5);
        assert_eq!(config.routing.to, "alerts");
        assert_eq!(config.routing.message_type, "stream");
        assert!(config.routing.subject.is_none());
    }

    #[test]
    fn test_postgres_url_from_parts() {
        let args = parse(&[
            "--database-type",
            "postgres",
            "--db-host",
            "db.local",
            "--db-password",
            "pw",
        ]);
        let database = args.database.to_config().unwrap();
        assert_eq!(database.db_type, DatabaseType::Postgres);
        assert_eq!(
            database.connection_string.as_deref(),
            Some("postgres://postgres:pw@db.local:5432/alerta")
        );
    }

    #[test]
    fn test_allow_insecure_accepts_both_spellings() {
        assert!(!Config::from_args(&parse(&[])).unwrap().zulip.allow_insecure);
        assert!(Config::from_args(&parse(&["--zulip-allow-insecure"])).unwrap().zulip.allow_insecure);
        assert!(Config::from_args(&parse(&["--zulip-allow-unsecure"])).unwrap().zulip.allow_insecure);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let result = Config::from_args(&parse(&["--poll-interval", "0"]));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_args(&parse(&[])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
    }
}

//! CLI configuration

use std::path::PathBuf;

use clap::{Args, Parser};
use jiff::Timestamp;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Rebate configuration
#[derive(Debug, Parser)]
#[command(
    name = "rebate",
    about = "Reconcile the discounts of a fixture set and print receipts",
    long_about = None
)]
pub struct Config {
    /// Directory holding the fixture kinds
    #[arg(long, env = "REBATE_FIXTURES_DIR", default_value = "./fixtures")]
    pub fixtures_dir: PathBuf,

    /// Fixture set to load from every kind
    #[arg(short, long, env = "REBATE_FIXTURE_SET", default_value = "default")]
    pub set: String,

    /// Point in time for promotion and voucher activity (RFC 3339); defaults to now
    #[arg(long)]
    pub now: Option<Timestamp>,

    /// Logging settings
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// The activity timestamp to reconcile at.
    pub fn now(&self) -> Timestamp {
        self.now.unwrap_or_else(Timestamp::now)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn arguments_override_defaults() -> TestResult {
        let config = Config::try_parse_from([
            "rebate",
            "--fixtures-dir",
            "/tmp/sets",
            "--set",
            "black-friday",
            "--now",
            "2026-11-27T09:00:00Z",
            "--log-format",
            "json",
        ])?;

        assert_eq!(config.fixtures_dir, PathBuf::from("/tmp/sets"));
        assert_eq!(config.set, "black-friday");
        assert_eq!(config.now(), "2026-11-27T09:00:00Z".parse::<Timestamp>()?);
        assert_eq!(config.logging.log_format, LogFormat::Json);

        Ok(())
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let result = Config::try_parse_from(["rebate", "--now", "yesterday"]);

        assert!(result.is_err());
    }
}

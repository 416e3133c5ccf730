//! Tracing setup for the tix binary
//!
//! Logs go to stderr so they never mix with descriptions printed on stdout.

use std::env;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const CRATES: [&str; 3] = ["tix_main", "tix_services", "tix_domain"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    /// Whether to include file and line numbers
    pub include_location: bool,
    pub json_format: bool,
    /// Filter directives taking precedence over `level`
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: Level::WARN, include_location: false, json_format: false, env_filter: None }
    }
}

impl LoggingConfig {
    /// Map the number of `-v` flags to a level: none warns, one informs, more
    /// debugs.
    pub fn from_verbosity(count: u8) -> Self {
        let level = match count {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        };
        Self { level, include_location: count > 1, ..Default::default() }
    }

    /// Apply `RUST_LOG` and `TIX_LOG_JSON` from the environment.
    pub fn with_env(mut self) -> Self {
        self.env_filter = env::var("RUST_LOG").ok().filter(|f| !f.is_empty());
        self.json_format = env::var("TIX_LOG_JSON")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.json_format);
        self
    }

    pub fn init_tracing(&self) -> Result<()> {
        let env_filter = self.build_env_filter()?;

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_location);

        let fmt_layer = if self.json_format {
            fmt_layer.json().with_current_span(true).boxed()
        } else {
            fmt_layer.without_time().boxed()
        };

        Registry::default().with(env_filter).with(fmt_layer).try_init()?;

        Ok(())
    }

    fn build_env_filter(&self) -> Result<EnvFilter> {
        if let Some(ref env_filter) = self.env_filter {
            return Ok(EnvFilter::try_new(env_filter)?);
        }

        let mut filter = EnvFilter::default().add_directive(Level::WARN.into());
        for krate in CRATES {
            filter = filter.add_directive(format!("{krate}={}", self.level).parse()?);
        }
        Ok(filter)
    }
}

//! CLI argument definitions for logflux-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use logflux_core::config::LogfluxConfig;

/// logflux access log shipping daemon.
///
/// Tails an access log, parses each appended line, and writes the
/// result to an InfluxDB sink while serving throughput statistics.
#[derive(Parser, Debug)]
#[command(name = "logflux-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logflux.toml configuration file.
    ///
    /// When omitted, built-in defaults plus environment overrides are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the tailed access log path.
    #[arg(short, long)]
    pub path: Option<String>,

    /// Override the sink descriptor (address@username@password@database@precision).
    #[arg(long)]
    pub sink_dsn: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut LogfluxConfig) {
        if let Some(path) = &self.path {
            config.pipeline.path.clone_from(path);
        }
        if let Some(dsn) = &self.sink_dsn {
            config.sink.dsn.clone_from(dsn);
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }

    /// Resolve the final configuration.
    ///
    /// Order: defaults, then the config file (if given), then `LOGFLUX_*`
    /// environment variables, then CLI flags. The result is validated.
    pub async fn resolve_config(&self) -> anyhow::Result<LogfluxConfig> {
        let mut config = match &self.config {
            Some(path) => LogfluxConfig::from_file(path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
            None => LogfluxConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let cli = DaemonCli::parse_from([
            "logflux-daemon",
            "--config",
            "/etc/logflux/logflux.toml",
            "--path",
            "/var/log/nginx/access.log",
            "--sink-dsn",
            "http://influx:8086@u@p@db@ms",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/etc/logflux/logflux.toml"))
        );
        assert_eq!(cli.path.as_deref(), Some("/var/log/nginx/access.log"));
        assert_eq!(cli.sink_dsn.as_deref(), Some("http://influx:8086@u@p@db@ms"));
        assert!(cli.validate);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let cli = DaemonCli::parse_from(["logflux-daemon", "-p", "/tmp/a.log", "--log-level", "warn"]);
        let mut config = LogfluxConfig::default();
        let original_dsn = config.sink.dsn.clone();

        cli.apply_overrides(&mut config);

        assert_eq!(config.pipeline.path, "/tmp/a.log");
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.sink.dsn, original_dsn);
        assert_eq!(config.general.log_format, "json");
    }
}

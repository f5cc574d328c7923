//! Command-line flags and environment overrides.

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{Endpoint, MigrateConfig, RetryPolicy};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 6379;

/// Command-line arguments of the `keyshift` binary.
///
/// Connection flags left at their default value can be overridden by the
/// matching environment variable (`SOURCE_HOST`, `DESTINATION_PORT`, ...).
#[derive(Parser, Debug, Clone)]
#[command(name = "keyshift")]
#[command(about = "Copy every key from one Redis server to another with DUMP/RESTORE", long_about = None)]
#[command(version)]
pub struct Args {
    /// Source host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub source_host: String,

    /// Source port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub source_port: u16,

    /// Source username
    #[arg(long, default_value = "")]
    pub source_username: String,

    /// Source password
    #[arg(long, default_value = "")]
    pub source_password: String,

    /// Source database
    #[arg(long, default_value_t = 0)]
    pub source_database: i64,

    /// Destination host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub destination_host: String,

    /// Destination port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub destination_port: u16,

    /// Destination username
    #[arg(long, default_value = "")]
    pub destination_username: String,

    /// Destination password
    #[arg(long, default_value = "")]
    pub destination_password: String,

    /// Destination database
    #[arg(long, default_value_t = 0)]
    pub destination_database: i64,

    /// Record every key read from the source to this snapshot file
    #[arg(long = "dump-to-file")]
    pub dump_to_file: Option<PathBuf>,

    /// Skip the first N keys of the source enumeration (resume a stopped run)
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Retries for each TTL or dump fetch before giving up
    #[arg(long, default_value_t = 3)]
    pub retries: usize,

    /// Pause between retries (e.g. "250ms", "2s"; "0s" retries immediately)
    #[arg(long, default_value = "250ms", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,

    /// Upper bound on a single store command
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Write a JSON summary of the finished run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Flag values for one endpoint before environment overrides.
struct EndpointArgs {
    prefix: &'static str,
    host: String,
    port: u16,
    username: String,
    password: String,
    database: i64,
}

impl EndpointArgs {
    fn resolve<F>(self, env: &F, timeout: Duration) -> Result<Endpoint, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |suffix: &str| {
            let var = format!("{}_{}", self.prefix, suffix);
            env(&var).filter(|v| !v.is_empty()).map(|v| (var, v))
        };

        let mut host = self.host;
        if host == DEFAULT_HOST {
            if let Some((_, v)) = lookup("HOST") {
                host = v;
            }
        }
        let mut port = self.port;
        if port == DEFAULT_PORT {
            if let Some((var, v)) = lookup("PORT") {
                port = parse_env(&var, &v)?;
            }
        }
        let mut username = self.username;
        if username.is_empty() {
            if let Some((_, v)) = lookup("USERNAME") {
                username = v;
            }
        }
        let mut password = self.password;
        if password.is_empty() {
            if let Some((_, v)) = lookup("PASSWORD") {
                password = v;
            }
        }
        let mut database = self.database;
        if database == 0 {
            if let Some((var, v)) = lookup("DATABASE") {
                database = parse_env(&var, &v)?;
            }
        }

        Ok(Endpoint {
            host,
            port,
            username: Some(username).filter(|s| !s.is_empty()),
            password: Some(password).filter(|s| !s.is_empty()),
            database,
            timeout,
        })
    }
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl Args {
    /// Builds the run configuration using the process environment.
    pub fn into_config(self) -> Result<MigrateConfig, ConfigError> {
        self.into_config_with_env(|name| std::env::var(name).ok())
    }

    /// Builds the run configuration, looking environment variables up through `env`.
    pub fn into_config_with_env<F>(self, env: F) -> Result<MigrateConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = EndpointArgs {
            prefix: "SOURCE",
            host: self.source_host,
            port: self.source_port,
            username: self.source_username,
            password: self.source_password,
            database: self.source_database,
        }
        .resolve(&env, self.timeout)?;
        let destination = EndpointArgs {
            prefix: "DESTINATION",
            host: self.destination_host,
            port: self.destination_port,
            username: self.destination_username,
            password: self.destination_password,
            database: self.destination_database,
        }
        .resolve(&env, self.timeout)?;

        Ok(MigrateConfig {
            source,
            destination,
            snapshot_path: self.dump_to_file.filter(|p| !p.as_os_str().is_empty()),
            resume_offset: self.skip,
            retry: RetryPolicy {
                max_retries: self.retries,
                delay: self.retry_delay,
            },
            report_path: self.report,
        })
    }
}

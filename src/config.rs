//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::sampler::BaselinePolicy;

pub const DEFAULT_LS_URL: &str = "http://127.0.0.1:9600";
pub const DEFAULT_INTERVAL: &str = "10s";

fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(interval)
}

/// Report the rate of events leaving a Logstash pipeline to DogStatsD.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Args {
    /// Host:Port of the DogStatsD agent
    #[arg(long, env = "STATSD_ADDR")]
    pub statsd: String,

    /// Logstash HTTP API endpoint
    #[arg(long, env = "LS_URL", default_value = DEFAULT_LS_URL)]
    pub lsurl: Url,

    /// Gap between metric probes (e.g. "10s", "1m 30s")
    #[arg(long, env = "PROBE_INTERVAL", default_value = DEFAULT_INTERVAL, value_parser = parse_interval)]
    pub interval: Duration,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Treat a zero counter as "no baseline yet" instead of a valid first sample
    #[arg(long)]
    pub zero_is_unset: bool,
}
impl Args {
    pub fn baseline_policy(&self) -> BaselinePolicy {
        if self.zero_is_unset {
            BaselinePolicy::ZeroIsUnset
        } else {
            BaselinePolicy::Explicit
        }
    }
}

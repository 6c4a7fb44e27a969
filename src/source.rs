use std::{future::Future, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::Sample;

pub const STATS_PATH: [&str; 3] = ["_node", "stats", "pipeline"];

/// Something that can be asked for the current value of a monotonic counter.
pub trait CounterSource {
    fn fetch(&mut self) -> impl Future<Output = anyhow::Result<Sample>> + Send;
}

#[derive(Debug, Deserialize)]
struct NodeStats {
    pipeline: PipelineStats,
}

#[derive(Debug, Deserialize)]
struct PipelineStats {
    events: EventCounts,
}

#[derive(Debug, Deserialize)]
struct EventCounts {
    out: f64,
}

/// Reads `pipeline.events.out` from a Logstash node stats API.
#[derive(Debug, Clone)]
pub struct HttpCounterSource {
    client: ureq::Agent,
    url: Url,
}
impl HttpCounterSource {
    pub fn new(base: &Url, timeout: Duration) -> anyhow::Result<Self> {
        let url = stats_url(base)?;
        let client = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Blocking I/O
    pub fn fetch_blocking(&self) -> anyhow::Result<Sample> {
        debug!(url = %self.url, "Pulling node stats.");
        let resp = self
            .client
            .get(self.url.as_str())
            .call()
            .with_context(|| format!("GET {} failed", self.url))?;
        let value = parse_events_out(resp.into_reader())?;
        Ok(Sample::now(value))
    }
}
impl CounterSource for HttpCounterSource {
    async fn fetch(&mut self) -> anyhow::Result<Sample> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.fetch_blocking())
            .await
            .context("node stats request did not complete")?
    }
}

/// Appends [`STATS_PATH`] to the path of `base`, with or without a trailing slash.
pub fn stats_url(base: &Url) -> anyhow::Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("`{base}` cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(STATS_PATH);
    Ok(url)
}

fn parse_events_out(body: impl std::io::Read) -> anyhow::Result<f64> {
    let stats: NodeStats =
        serde_json::from_reader(body).context("malformed node stats response")?;
    Ok(stats.pipeline.events.out)
}

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use tokio::{
    net::UdpSocket,
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::codec::{encode_gauge, SAMPLE_RATE_ALWAYS};

/// Largest datagram the flusher builds, matching the usual DogStatsD client default.
pub const MAX_PAYLOAD: usize = 1432;
pub const QUEUE_SIZE: usize = 10240;
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Fire-and-forget gauge emission.
pub trait MetricSink {
    fn gauge(&mut self, name: &str, value: f64, tags: &[String], sample_rate: f64);
}

/// Buffered DogStatsD client.
///
/// Lines are queued to a background task that packs them into datagrams and flushes every
/// [`FLUSH_INTERVAL`], whenever a datagram is full, and on [`StatsdExporter::shutdown`].
#[derive(Debug)]
pub struct StatsdExporter {
    namespace: String,
    tx: mpsc::Sender<String>,
    flusher: JoinHandle<()>,
}
impl StatsdExporter {
    pub async fn connect(addr: &str, namespace: impl Into<String>) -> anyhow::Result<Self> {
        let peer = tokio::net::lookup_host(addr)
            .await
            .with_context(|| format!("failed to resolve `{addr}`"))?
            .next()
            .with_context(|| format!("`{addr}` resolved to no addresses"))?;
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket
            .connect(peer)
            .await
            .with_context(|| format!("failed to connect to {peer}"))?;
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let flusher = tokio::spawn(flush_loop(socket, rx));
        let namespace = namespace.into();
        Ok(Self {
            namespace,
            tx,
            flusher,
        })
    }

    /// Flushes everything queued so far and stops the background task.
    pub async fn shutdown(self) {
        let Self { tx, flusher, .. } = self;
        drop(tx);
        if let Err(e) = flusher.await {
            warn!(error = %e, "Statsd flusher task failed.");
        }
    }
}
impl MetricSink for StatsdExporter {
    fn gauge(&mut self, name: &str, value: f64, tags: &[String], sample_rate: f64) {
        if !should_sample(sample_rate) {
            return;
        }
        let mut line = String::new();
        encode_gauge(&mut line, &self.namespace, name, value, tags, sample_rate);
        if let Err(e) = self.tx.try_send(line) {
            debug!(error = %e, "Dropping metric.");
        }
    }
}

fn should_sample(sample_rate: f64) -> bool {
    sample_rate >= SAMPLE_RATE_ALWAYS || rand::random::<f64>() < sample_rate
}

async fn flush_loop(socket: UdpSocket, mut rx: mpsc::Receiver<String>) {
    let mut buf = Vec::with_capacity(MAX_PAYLOAD);
    let mut ticker = interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            line = rx.recv() => {
                let Some(line) = line else {
                    flush(&socket, &mut buf).await;
                    return;
                };
                if !buf.is_empty() && buf.len() + 1 + line.len() > MAX_PAYLOAD {
                    flush(&socket, &mut buf).await;
                }
                if !buf.is_empty() {
                    buf.push(b'\n');
                }
                buf.extend_from_slice(line.as_bytes());
            }
            _ = ticker.tick() => flush(&socket, &mut buf).await,
        }
    }
}

async fn flush(socket: &UdpSocket, buf: &mut Vec<u8>) {
    if buf.is_empty() {
        return;
    }
    if let Err(e) = socket.send(buf).await {
        warn!(error = %e, bytes = buf.len(), "Failed to send metrics datagram.");
    }
    buf.clear();
}

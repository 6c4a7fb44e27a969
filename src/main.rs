use anyhow::Context;
use clap::Parser;
use logstash_rate::{
    config::Args,
    exporter::StatsdExporter,
    logging::init_logging,
    sampler::{RateSampler, NAMESPACE},
    source::HttpCounterSource,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);
    if let Err(e) = run(args).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let hostname = hostname::get().context("could not get hostname")?;
    let tags = vec![format!("nodename:{}", hostname.to_string_lossy())];

    info!(addr = %args.statsd, "Starting a buffered statsd client.");
    let exporter = StatsdExporter::connect(&args.statsd, NAMESPACE)
        .await
        .context("error starting statsd client")?;
    let source = HttpCounterSource::new(&args.lsurl, args.interval)?;
    info!(
        url = %source.url(),
        interval = %humantime::format_duration(args.interval),
        "Sampling pipeline events."
    );

    let mut sampler = RateSampler::new(source, exporter, args.interval, tags)?
        .with_baseline_policy(args.baseline_policy());
    sampler.run_until(shutdown_signal()).await;
    sampler.into_sink().shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, running until killed.");
        std::future::pending::<()>().await;
    }
}

//! Host telemetry reporting agent
//!
//! Two periodic tasks share an accumulator guarded by a mutex: the
//! poll task samples host statistics into a gauge map and bumps the
//! poll counter, the report task submits everything as one gzipped
//! JSON batch. A failed report is logged and retried on the next tick;
//! samples are never dropped, the next batch simply carries the
//! freshest values.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use crate::MetricPayload;
use crate::config::AgentConfig;

/// Counter metric name reported alongside the gauges.
const POLL_COUNT: &str = "PollCount";

/// Run the poll and report loops until the task is cancelled.
pub async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let gauges = Arc::new(Mutex::new(HashMap::new()));
    let poll_count = Arc::new(AtomicI64::new(0));

    let poll_gauges = Arc::clone(&gauges);
    let poll_counter = Arc::clone(&poll_count);
    let poll_interval = Duration::from_secs(config.poll_interval.max(1));
    tokio::spawn(async move {
        let mut sys = System::new_all();
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sys.refresh_all();

            let sample = sample_host_gauges(&sys);
            poll_counter.fetch_add(1, Ordering::SeqCst);

            let mut gauges = poll_gauges.lock().await;
            gauges.extend(sample);
        }
    });

    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.report_interval.max(1)));
    ticker.tick().await;
    loop {
        ticker.tick().await;

        let batch = {
            let gauges = gauges.lock().await;
            build_batch(&gauges, poll_count.load(Ordering::SeqCst))
        };

        if let Err(e) = send_batch(&client, &config.address, &batch).await {
            error!("failed to send metrics batch: {e}");
        }
    }
}

/// Sample the host statistics reported as gauges.
///
/// The collector treats the names as opaque; this set mirrors what the
/// deployment's dashboards expect.
pub fn sample_host_gauges(sys: &System) -> HashMap<String, f64> {
    let cpus = sys.cpus();
    let cpu_average = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64
    };

    HashMap::from([
        ("MemoryTotal".to_string(), sys.total_memory() as f64),
        ("MemoryUsed".to_string(), sys.used_memory() as f64),
        ("SwapTotal".to_string(), sys.total_swap() as f64),
        ("SwapUsed".to_string(), sys.used_swap() as f64),
        ("CpuCount".to_string(), cpus.len() as f64),
        ("CpuAverage".to_string(), cpu_average),
    ])
}

/// Assemble a report batch from the accumulated gauges plus the poll
/// counter.
pub fn build_batch(gauges: &HashMap<String, f64>, poll_count: i64) -> Vec<MetricPayload> {
    let mut batch: Vec<MetricPayload> = gauges
        .iter()
        .map(|(name, value)| MetricPayload::gauge(name.clone(), *value))
        .collect();
    batch.push(MetricPayload::counter(POLL_COUNT, poll_count));
    batch
}

/// Submit a batch to the collector as gzipped JSON.
///
/// An empty batch is skipped without a request.
#[instrument(skip(client, batch), fields(count = batch.len()))]
pub async fn send_batch(
    client: &reqwest::Client,
    server: &str,
    batch: &[MetricPayload],
) -> anyhow::Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let body = serde_json::to_vec(batch).context("serializing metrics batch")?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&body)
        .context("compressing metrics batch")?;
    let compressed = encoder.finish().context("finishing gzip stream")?;

    let response = client
        .post(format!("http://{server}/updates"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(reqwest::header::CONTENT_ENCODING, "gzip")
        .body(compressed)
        .send()
        .await
        .context("sending metrics batch")?;

    if !response.status().is_success() {
        bail!("collector returned {} for batch", response.status());
    }

    debug!("batch accepted");
    Ok(())
}

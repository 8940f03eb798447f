use std::path::Path;
use std::sync::Arc;

use grassroots_core::config::CaptureConfig;
use grassroots_core::delivery::{spawn_probe, Connectivity, DeliveryWorker, PassReport};
use grassroots_core::services::Outbox;

use crate::commands::common::{http_sink, open_outbox};
use crate::error::CliError;

pub async fn run_sync(
    config: &CaptureConfig,
    config_path: &Path,
    db_path: &Path,
) -> Result<(), CliError> {
    let sink = Arc::new(http_sink(config, config_path)?);
    let outbox = open_outbox(db_path).await?;
    let report = worker(&outbox, sink, config).run_pass().await?;

    let pending = outbox.pending_count().await?;
    println!("{}", format_pass_report(&report, pending));
    Ok(())
}

/// Deliver in the foreground, probing the endpoint for connectivity, until Ctrl-C.
pub async fn run_watch(
    assume_online: bool,
    config: &CaptureConfig,
    config_path: &Path,
    db_path: &Path,
) -> Result<(), CliError> {
    let sink = Arc::new(http_sink(config, config_path)?);
    let endpoint = sink.endpoint().to_string();
    let outbox = open_outbox(db_path).await?;

    let connectivity = Connectivity::new(assume_online);
    let probe = (!assume_online)
        .then(|| spawn_probe(Arc::clone(&sink), connectivity.clone(), config.poll_interval()));
    let handle = worker(&outbox, sink, config)
        .with_poll_interval(config.poll_interval())
        .spawn(connectivity.subscribe());

    println!("Delivering to {endpoint}. Press Ctrl-C to stop.");
    let mut reports = handle.reports();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                if let Some(report) = report {
                    let pending = outbox.pending_count().await?;
                    println!("{}", format_pass_report(&report, pending));
                }
            }
        }
    }

    if let Some(probe) = probe {
        probe.abort();
    }
    handle.shutdown().await;
    println!("Stopped. {} events pending.", outbox.pending_count().await?);
    Ok(())
}

fn worker<S>(outbox: &Outbox, sink: Arc<S>, config: &CaptureConfig) -> DeliveryWorker<S>
where
    S: grassroots_core::delivery::EventSink,
{
    DeliveryWorker::new(outbox.clone(), sink)
        .with_batch_size(config.batch_size)
        .with_retention(config.retention)
}

pub fn format_pass_report(report: &PassReport, pending: usize) -> String {
    let mut line = match (&report.stalled_on, report.delivered) {
        (Some(id), delivered) => format!(
            "Delivered {delivered}, stalled on entry {id}: {}",
            report.last_error.as_deref().unwrap_or("unknown error")
        ),
        (None, 0) if pending == 0 => "Nothing to deliver".to_string(),
        (None, delivered) => format!("Delivered {delivered}"),
    };
    line.push_str(&format!("; {pending} pending"));
    if report.pruned > 0 {
        line.push_str(&format!("; pruned {}", report.pruned));
    }
    line
}

//! Wires a transfer session to the simulated receiver and runs one file
//! through it.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use bandbridge_ebook::{CancelOrigin, SourceFile, TransferEvent, TransferSession, TransferState};
use bandbridge_host::inbound_channel;

use crate::config::Config;
use crate::receiver::SimulatedReceiver;

/// Sends `file` to the simulated receiver and returns the final state.
///
/// Ctrl-C cancels the running transfer.
pub async fn run(config: Config, file: &Path) -> anyhow::Result<TransferState> {
    let source = SourceFile::load(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let (inbound_tx, inbound_rx) = inbound_channel();
    let receiver = Arc::new(SimulatedReceiver::new(
        config.session.app_id.clone(),
        config.receiver.clone(),
        inbound_tx,
    ));
    let session = Arc::new(TransferSession::new(
        receiver.clone(),
        config.device.clone(),
        config.session.clone(),
    ));
    let mut events = session.take_events().context("event stream already taken")?;

    let driver_session = Arc::clone(&session);
    let driver = tokio::spawn(async move { driver_session.run(inbound_rx).await });

    tracing::info!(
        session = session.id(),
        file = source.name(),
        size = source.size(),
        "sending file"
    );

    if let Err(e) = session.send_file(&source).await {
        session.close();
        let _ = driver.await;
        return Err(e).context("transfer did not start");
    }

    let state = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break session.state();
                };
                log_event(&event);
                if event.is_terminal() {
                    break session.state();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupt received, cancelling transfer");
                if let Err(e) = session.cancel().await {
                    tracing::warn!(error = %e, "cancel failed");
                }
            }
        }
    };

    session.close();
    let _ = driver.await;

    if state == TransferState::Completed {
        let received = receiver.received();
        anyhow::ensure!(
            received == *source.content(),
            "receiver content differs from source ({} vs {} bytes)",
            received.len(),
            source.content().len()
        );
        tracing::info!(bytes = received.len(), "receiver content verified");
    }

    Ok(state)
}

fn log_event(event: &TransferEvent) {
    match event {
        TransferEvent::Progress(report) => match &report.throughput {
            Some(sample) => tracing::info!(
                percent = report.percent(),
                "{} ({})",
                report.status,
                sample.describe()
            ),
            None => tracing::info!(percent = report.percent(), "{}", report.status),
        },
        TransferEvent::Completed { message, count } => {
            tracing::info!(count, %message, "transfer completed")
        }
        TransferEvent::Cancelled { origin, message } => {
            let by = match origin {
                CancelOrigin::Local => "local",
                CancelOrigin::Remote => "receiver",
            };
            tracing::warn!(by, %message, "transfer cancelled")
        }
        TransferEvent::Failed { error, count } => {
            tracing::error!(count, error = %error, "transfer failed")
        }
        TransferEvent::StorageReport { usage, ceiling } => {
            tracing::info!(usage, ceiling, "receiver storage")
        }
    }
}

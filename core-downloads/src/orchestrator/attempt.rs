//! A single transfer attempt, run on its own task.
//!
//! The task resolves the destination, drives the transfer client and reports
//! coalesced progress plus a terminal outcome back to the queue actor. It
//! never touches the record map or the catalog.

use bridge_traits::{
    FileSystemAccess, MediaKind, MediaTypeSniffer, TransferClient, TransferRequest,
};
use core_runtime::logging::{redact_url, strip_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{AttemptId, AttemptOutcome, Command};
use crate::progress::ProgressCoalescer;

/// Everything an attempt task needs; moved into the task.
pub(crate) struct AttemptContext {
    pub id: String,
    pub attempt: AttemptId,
    pub url: String,
    /// Wait before touching the network (retry backoff)
    pub delay: Duration,
    /// Previous attempt for the same id; awaited so two tasks never share a
    /// destination path
    pub previous: Option<JoinHandle<()>>,
    pub token: CancellationToken,
    pub downloads_directory: Option<PathBuf>,
    pub progress_threshold: f64,
    pub transfer_client: Arc<dyn TransferClient>,
    pub media_sniffer: Arc<dyn MediaTypeSniffer>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub commands: UnboundedSender<Command>,
}

/// `<directory>/<id>.<ext>`
pub(crate) fn destination_for(directory: &Path, id: &str, kind: MediaKind) -> PathBuf {
    directory.join(format!("{}.{}", id, kind.extension()))
}

pub(crate) fn spawn_attempt(ctx: AttemptContext) -> JoinHandle<()> {
    tokio::spawn(run_attempt(ctx))
}

#[instrument(skip(ctx), fields(id = %ctx.id, attempt = ctx.attempt))]
async fn run_attempt(mut ctx: AttemptContext) {
    if let Some(previous) = ctx.previous.take() {
        // A panicked predecessor has nothing left to clean up.
        let _ = previous.await;
    }

    let token = ctx.token.clone();
    let request = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("Attempt cancelled before the transfer started");
            return;
        }
        prepared = prepare(&ctx) => prepared,
    };

    let request = match request {
        Ok(request) => request,
        Err(message) => {
            report(&ctx, AttemptOutcome::Failed(message));
            return;
        }
    };

    let outcome = transfer(&ctx, request).await;
    if let Some(outcome) = outcome {
        report(&ctx, outcome);
    }
}

/// Backoff, media kind detection and destination directory.
async fn prepare(ctx: &AttemptContext) -> Result<TransferRequest, String> {
    if !ctx.delay.is_zero() {
        debug!(delay_ms = ctx.delay.as_millis() as u64, "Waiting before retry");
        tokio::time::sleep(ctx.delay).await;
    }

    let kind = match ctx.media_sniffer.classify(&ctx.url).await {
        Ok(kind) => kind,
        Err(e) => {
            warn!(
                error = %e,
                source_url = %redact_url(&ctx.url),
                "Media type detection failed, assuming audio"
            );
            MediaKind::Audio
        }
    };

    let directory = match &ctx.downloads_directory {
        Some(dir) => dir.clone(),
        None => ctx
            .file_system
            .get_documents_directory()
            .await
            .map_err(|e| format!("documents directory unavailable: {}", e))?,
    };

    ctx.file_system
        .create_dir_all(&directory)
        .await
        .map_err(|e| format!("cannot create downloads directory: {}", e))?;

    Ok(TransferRequest::new(
        ctx.url.clone(),
        destination_for(&directory, &ctx.id, kind),
    ))
}

/// Drive the transfer. Returns `None` when the attempt was cancelled.
async fn transfer(ctx: &AttemptContext, request: TransferRequest) -> Option<AttemptOutcome> {
    let destination = request.destination.clone();
    let partial = request.partial_path();

    info!(
        source_url = %redact_url(&request.url),
        file = %strip_path(&destination.to_string_lossy()),
        "Starting transfer"
    );

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<f64>();
    let mut coalescer = ProgressCoalescer::new(ctx.progress_threshold);

    let transfer = ctx.transfer_client.transfer(request, progress_tx);
    tokio::pin!(transfer);

    let result = loop {
        tokio::select! {
            biased;
            _ = ctx.token.cancelled() => {
                debug!("Attempt cancelled, discarding partial data");
                remove_quietly(ctx, &partial).await;
                remove_quietly(ctx, &destination).await;
                return None;
            }
            Some(fraction) = progress_rx.recv() => {
                if let Some(progress) = coalescer.offer(fraction) {
                    let _ = ctx.commands.send(Command::Progress {
                        id: ctx.id.clone(),
                        attempt: ctx.attempt,
                        progress,
                    });
                }
            }
            result = &mut transfer => break result,
        }
    };

    match result {
        Ok(path) => {
            info!(file = %strip_path(&path.to_string_lossy()), "Transfer completed");
            Some(AttemptOutcome::Completed(path))
        }
        Err(e) => {
            warn!(error = %e, "Transfer failed");
            remove_quietly(ctx, &partial).await;
            Some(AttemptOutcome::Failed(e.to_string()))
        }
    }
}

fn report(ctx: &AttemptContext, outcome: AttemptOutcome) {
    let sent = ctx.commands.send(Command::Finished {
        id: ctx.id.clone(),
        attempt: ctx.attempt,
        outcome,
    });
    if sent.is_err() {
        debug!("Download queue stopped before the attempt finished");
    }
}

async fn remove_quietly(ctx: &AttemptContext, path: &Path) {
    if let Err(e) = ctx.file_system.remove_file_if_exists(path).await {
        warn!(
            error = %e,
            file = %strip_path(&path.to_string_lossy()),
            "Failed to remove file of cancelled download"
        );
    }
}

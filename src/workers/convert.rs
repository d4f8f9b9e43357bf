//! Conversion worker: H.264 → MP4
//!
//! Claims events whose H.264 upload has completed, rewraps the elementary
//! stream into a fast-start MP4 (container copy, no re-encode), stamps the
//! duration, and advances the MP4 sub-state to `complete`. The H.264 source
//! is deleted only once a non-empty MP4 exists.

use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::artifact_store::mp4_path_for;
use crate::error::Result;
use crate::media::Transcoder;
use crate::models::{Event, LogLevel};
use crate::workers::{
    idle_sleep, shutdown_requested, Backoff, WorkerContext, STALE_CHECK_INTERVAL,
};

/// Run the conversion loop until shutdown.
pub async fn run(ctx: WorkerContext, mut shutdown: watch::Receiver<bool>) {
    let transcoder = Transcoder::new();

    match Transcoder::check_ffmpeg().await {
        Ok(version) => tracing::info!(ffmpeg = %version, "Conversion worker starting"),
        Err(e) => {
            tracing::warn!(error = %e, "ffmpeg unavailable; conversions will fail until it appears")
        }
    }

    // Recover anything a dead predecessor left mid-flight before polling.
    match ctx
        .store
        .events()
        .recover_stale_conversions(ctx.reclaim_horizon_secs())
        .await
    {
        Ok(0) => {}
        Ok(n) => {
            tracing::info!(recovered = n, "Reset stale conversion claims at startup");
            ctx.log(
                LogLevel::Warning,
                format!("MP4 converter recovered {} stale claim(s) at startup", n),
            )
            .await;
        }
        Err(e) => tracing::error!(error = %e, "Startup stale-claim recovery failed"),
    }

    let mut backoff = Backoff::new(ctx.config.poll_idle);
    let mut last_stale_check = Instant::now();

    loop {
        if shutdown_requested(&shutdown) {
            break;
        }

        if last_stale_check.elapsed() >= STALE_CHECK_INTERVAL {
            last_stale_check = Instant::now();
            match ctx
                .store
                .events()
                .recover_stale_conversions(ctx.reclaim_horizon_secs())
                .await
            {
                Ok(n) if n > 0 => {
                    tracing::info!(recovered = n, "Reset stale conversion claims")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Stale-claim recovery failed"),
            }
        }

        let claimed = match ctx
            .store
            .events()
            .claim_for_conversion(&ctx.worker_id, ctx.config.batch_size)
            .await
        {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!(error = %e, "Claim query failed; backing off");
                if !idle_sleep(&mut shutdown, backoff.next_delay()).await {
                    break;
                }
                continue;
            }
        };

        if claimed.is_empty() {
            if !idle_sleep(&mut shutdown, backoff.next_delay()).await {
                break;
            }
            continue;
        }

        backoff.reset();

        // Transcodes are CPU/I/O heavy and independent per event, so the
        // whole claimed batch runs concurrently. Shutdown is honored at the
        // batch boundary: in-flight conversions finish and commit first.
        let mut jobs = JoinSet::new();
        for event in claimed {
            let ctx = ctx.clone();
            let transcoder = transcoder.clone();
            jobs.spawn(async move {
                let event_id = event.id;
                if let Err(e) = process_event(&ctx, &transcoder, event).await {
                    tracing::error!(event_id = event_id, error = %e, "Conversion failed");
                    ctx.log(
                        LogLevel::Error,
                        format!("Event {}: MP4 conversion failed: {}", event_id, e),
                    )
                    .await;
                    if let Err(e) = ctx
                        .store
                        .events()
                        .fail_conversion(event_id, &ctx.worker_id)
                        .await
                    {
                        tracing::error!(event_id = event_id, error = %e, "Failed to latch conversion failure");
                    }
                }
            });
        }
        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Conversion task panicked");
            }
        }
    }

    tracing::info!("Conversion worker stopped");
}

/// Convert one claimed event. Returning an error latches the sub-state to
/// `failed`; guard misses release the claim instead.
async fn process_event(ctx: &WorkerContext, transcoder: &Transcoder, event: Event) -> Result<()> {
    let Some(h264_rel) = event.video_h264_path.clone() else {
        // Claim predicate requires the path, but the row may have been
        // rewritten between claim and fetch; give the claim back.
        ctx.store
            .events()
            .release_conversion_claim(event.id, &ctx.worker_id)
            .await?;
        return Ok(());
    };

    // Guard: the flag can be set before the file is fully visible on shared
    // storage. A missing file inside the horizon just releases the claim;
    // one that never appears is a failure.
    if !ctx.artifacts.exists(&h264_rel).await? {
        let age = chrono::Utc::now() - event.updated_at;
        let horizon = chrono::Duration::seconds(ctx.reclaim_horizon_secs() as i64);
        if age > horizon {
            tracing::warn!(
                event_id = event.id,
                path = %h264_rel,
                "H.264 source never appeared; marking conversion failed"
            );
            ctx.log(
                LogLevel::Error,
                format!(
                    "Event {}: H.264 source {} never appeared on storage",
                    event.id, h264_rel
                ),
            )
            .await;
            ctx.store
                .events()
                .fail_conversion(event.id, &ctx.worker_id)
                .await?;
        } else {
            tracing::debug!(
                event_id = event.id,
                path = %h264_rel,
                "H.264 source not on storage yet; releasing claim"
            );
            ctx.store
                .events()
                .release_conversion_claim(event.id, &ctx.worker_id)
                .await?;
        }
        return Ok(());
    }

    if !ctx
        .artifacts
        .is_quiescent(&h264_rel, ctx.config.quiescence)
        .await?
    {
        tracing::debug!(
            event_id = event.id,
            path = %h264_rel,
            "H.264 source still settling; releasing claim"
        );
        ctx.store
            .events()
            .release_conversion_claim(event.id, &ctx.worker_id)
            .await?;
        return Ok(());
    }

    let mp4_rel = mp4_path_for(&h264_rel);
    let input = ctx.artifacts.resolve(&h264_rel)?;
    let output = ctx.artifacts.resolve(&mp4_rel)?;

    tracing::info!(
        event_id = event.id,
        camera_id = %event.camera_id,
        input = %h264_rel,
        output = %mp4_rel,
        "Converting H.264 to MP4"
    );

    transcoder
        .remux_to_mp4(&input, &output, ctx.config.per_event_timeout)
        .await?;

    // Duration: probe the produced MP4, fall back to the camera-supplied
    // figure, then to a fixed default.
    let duration = match transcoder.probe_duration(&output).await? {
        Some(d) if d > 0.0 => d,
        _ => event.video_duration.unwrap_or(60.0),
    };

    let committed = ctx
        .store
        .events()
        .complete_conversion(event.id, &ctx.worker_id, &mp4_rel, duration)
        .await?;

    if !committed {
        // Claim was reclaimed while we worked; the thief owns the commit.
        tracing::warn!(
            event_id = event.id,
            "Conversion commit skipped: claim no longer held"
        );
        return Ok(());
    }

    tracing::info!(
        event_id = event.id,
        duration_secs = duration,
        "Conversion complete"
    );
    ctx.log(
        LogLevel::Info,
        format!(
            "Event {}: converted {} -> {} ({}s)",
            event.id, h264_rel, mp4_rel, duration as i64
        ),
    )
    .await;

    // Delete the source only when the MP4 has content and the source is
    // actually deletable; otherwise retain it.
    let mp4_size = ctx.artifacts.file_size(&mp4_rel).await?.unwrap_or(0);
    if mp4_size > 0 && ctx.artifacts.is_writable(&h264_rel).await? {
        if let Err(e) = ctx.artifacts.delete(&h264_rel).await {
            tracing::warn!(event_id = event.id, error = %e, "Could not delete H.264 source");
        } else {
            tracing::debug!(event_id = event.id, path = %h264_rel, "Deleted H.264 source");
        }
    } else if mp4_size == 0 {
        tracing::warn!(event_id = event.id, "Produced MP4 is empty; keeping H.264 source");
    }

    Ok(())
}

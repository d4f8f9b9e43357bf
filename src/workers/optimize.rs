//! Optimization worker: MP4 re-encode
//!
//! Claims converted events and re-encodes their MP4 to a smaller libx264
//! profile, swapping the file in place when the result is actually smaller.
//! Either way the sub-state advances to `optimized`, so an event passes
//! through here exactly once.

use std::time::Instant;

use tokio::sync::watch;

use crate::error::Result;
use crate::media::Transcoder;
use crate::models::{Event, LogLevel};
use crate::workers::{
    idle_sleep, shutdown_requested, Backoff, WorkerContext, STALE_CHECK_INTERVAL,
};

/// Run the optimization loop until shutdown.
pub async fn run(ctx: WorkerContext, mut shutdown: watch::Receiver<bool>) {
    let transcoder = Transcoder::new();

    tracing::info!("Optimization worker starting");

    match ctx
        .store
        .events()
        .recover_stale_optimizations(ctx.reclaim_horizon_secs())
        .await
    {
        Ok(0) => {}
        Ok(n) => tracing::info!(recovered = n, "Cleared stale optimization claims at startup"),
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
                .recover_stale_optimizations(ctx.reclaim_horizon_secs())
                .await
            {
                Ok(n) if n > 0 => {
                    tracing::info!(recovered = n, "Cleared stale optimization claims")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Stale-claim recovery failed"),
            }
        }

        let claimed = match ctx
            .store
            .events()
            .claim_for_optimization(&ctx.worker_id, ctx.config.batch_size)
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

        for event in claimed {
            let event_id = event.id;
            if let Err(e) = process_event(&ctx, &transcoder, event).await {
                tracing::error!(event_id = event_id, error = %e, "Optimization failed");
                ctx.log(
                    LogLevel::Error,
                    format!("Event {}: MP4 optimization failed: {}", event_id, e),
                )
                .await;
                if let Err(e) = ctx
                    .store
                    .events()
                    .fail_optimization(event_id, &ctx.worker_id)
                    .await
                {
                    tracing::error!(event_id = event_id, error = %e, "Failed to latch optimization failure");
                }
            }
            if shutdown_requested(&shutdown) {
                break;
            }
        }
    }

    tracing::info!("Optimization worker stopped");
}

/// Optimize one claimed event's MP4 in place.
async fn process_event(ctx: &WorkerContext, transcoder: &Transcoder, event: Event) -> Result<()> {
    let Some(mp4_rel) = event.video_mp4_path.clone() else {
        ctx.store
            .events()
            .release_optimization_claim(event.id, &ctx.worker_id)
            .await?;
        return Ok(());
    };

    // The converter produced this file; if it is gone the loss is permanent.
    if !ctx.artifacts.exists(&mp4_rel).await? {
        tracing::warn!(
            event_id = event.id,
            path = %mp4_rel,
            "Converted MP4 missing from storage; marking optimization failed"
        );
        ctx.log(
            LogLevel::Error,
            format!("Event {}: MP4 {} missing before optimization", event.id, mp4_rel),
        )
        .await;
        ctx.store
            .events()
            .fail_optimization(event.id, &ctx.worker_id)
            .await?;
        return Ok(());
    }

    if !ctx
        .artifacts
        .is_quiescent(&mp4_rel, ctx.config.quiescence)
        .await?
    {
        tracing::debug!(
            event_id = event.id,
            path = %mp4_rel,
            "MP4 not settled on storage yet; releasing claim"
        );
        ctx.store
            .events()
            .release_optimization_claim(event.id, &ctx.worker_id)
            .await?;
        return Ok(());
    }

    // Temp file lives next to the original so the final swap is a rename on
    // the same filesystem.
    let tmp_rel = format!("{}.opt.tmp.mp4", mp4_rel);
    let input = ctx.artifacts.resolve(&mp4_rel)?;
    let tmp = ctx.artifacts.resolve(&tmp_rel)?;

    tracing::info!(
        event_id = event.id,
        camera_id = %event.camera_id,
        path = %mp4_rel,
        "Optimizing MP4"
    );

    let encode = transcoder
        .reencode_smaller(&input, &tmp, ctx.config.per_event_timeout)
        .await;
    if let Err(e) = encode {
        let _ = ctx.artifacts.delete(&tmp_rel).await;
        return Err(e);
    }

    let old_size = ctx.artifacts.file_size(&mp4_rel).await?.unwrap_or(0);
    let new_size = ctx.artifacts.file_size(&tmp_rel).await?.unwrap_or(0);

    if new_size > 0 && new_size < old_size {
        tokio::fs::rename(&tmp, &input).await?;
        tracing::info!(
            event_id = event.id,
            old_bytes = old_size,
            new_bytes = new_size,
            "MP4 optimized"
        );
        ctx.log(
            LogLevel::Info,
            format!(
                "Event {}: optimized {} ({} -> {} bytes)",
                event.id, mp4_rel, old_size, new_size
            ),
        )
        .await;
    } else {
        // Output not smaller; keep the original bytes and still advance.
        let _ = ctx.artifacts.delete(&tmp_rel).await;
        tracing::info!(
            event_id = event.id,
            old_bytes = old_size,
            new_bytes = new_size,
            "Optimized output not smaller; keeping original"
        );
    }

    let committed = ctx
        .store
        .events()
        .complete_optimization(event.id, &ctx.worker_id, &mp4_rel)
        .await?;

    if !committed {
        tracing::warn!(
            event_id = event.id,
            "Optimization commit skipped: claim no longer held"
        );
    }

    Ok(())
}

//! AI analysis worker
//!
//! Claims events whose two still images have both arrived, asks the vision
//! model what changed between them, condenses that into an alert phrase via
//! the text model, and latches all AI columns in one write. Transport
//! failures are retried within the iteration up to a budget; an exhausted
//! budget latches `ai_processed` with an error so the event is never
//! reselected.

use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::ai_client::AiClient;
use crate::error::{Error, Result};
use crate::models::{Event, LogLevel};
use crate::store::AiOutcome;
use crate::workers::{
    idle_sleep, shutdown_requested, Backoff, WorkerContext, STALE_CHECK_INTERVAL,
};

/// Run the analysis loop until shutdown.
pub async fn run(ctx: WorkerContext, mut shutdown: watch::Receiver<bool>) {
    let client = AiClient::new(
        ctx.config.ai_endpoint_url.clone(),
        ctx.config.ai_vision_model.clone(),
        ctx.config.ai_text_model.clone(),
        ctx.config.ai_timeout,
    );

    match client.health_check().await {
        Ok(true) => tracing::info!(endpoint = %ctx.config.ai_endpoint_url, "AI worker starting"),
        _ => tracing::warn!(
            endpoint = %ctx.config.ai_endpoint_url,
            "Model host unreachable at startup; analyses will retry"
        ),
    }

    match ctx
        .store
        .events()
        .recover_stale_analyses(ctx.reclaim_horizon_secs())
        .await
    {
        Ok(0) => {}
        Ok(n) => tracing::info!(recovered = n, "Cleared stale analysis claims at startup"),
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
                .recover_stale_analyses(ctx.reclaim_horizon_secs())
                .await
            {
                Ok(n) if n > 0 => tracing::info!(recovered = n, "Cleared stale analysis claims"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Stale-claim recovery failed"),
            }
        }

        let claimed = match ctx
            .store
            .events()
            .claim_for_analysis(&ctx.worker_id, ctx.config.batch_size)
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
            process_event(&ctx, &client, event).await;
            if shutdown_requested(&shutdown) {
                break;
            }
        }
    }

    tracing::info!("AI worker stopped");
}

/// Analyze one claimed event end to end, including the retry budget and the
/// terminal error latch.
async fn process_event(ctx: &WorkerContext, client: &AiClient, event: Event) {
    let event_id = event.id;
    let started = Instant::now();

    match analyze_with_retries(ctx, client, &event).await {
        Ok(Some(outcome)) => {
            match ctx
                .store
                .events()
                .complete_analysis(event_id, &ctx.worker_id, &outcome)
                .await
            {
                Ok(true) => {
                    tracing::info!(
                        event_id = event_id,
                        elapsed_secs = started.elapsed().as_secs(),
                        person_detected = ?outcome.person_detected,
                        "AI analysis complete"
                    );
                    ctx.log(
                        LogLevel::Info,
                        format!(
                            "Event {}: AI analysis complete: {}",
                            event_id,
                            outcome.phrase.as_deref().unwrap_or("(no phrase)")
                        ),
                    )
                    .await;
                }
                Ok(false) => tracing::warn!(
                    event_id = event_id,
                    "Analysis commit skipped: claim no longer held"
                ),
                Err(e) => tracing::error!(event_id = event_id, error = %e, "Analysis commit failed"),
            }
        }
        Ok(None) => {
            // Guard miss: artifacts not trustworthy yet, claim released.
        }
        Err(e) => {
            // Retry budget exhausted: latch processed with the error so the
            // event is not reattempted by every future iteration.
            let reason = e.to_string();
            tracing::error!(event_id = event_id, error = %reason, "AI analysis failed; latching");
            ctx.log(
                LogLevel::Error,
                format!("Event {}: AI analysis failed: {}", event_id, reason),
            )
            .await;
            match ctx
                .store
                .events()
                .fail_analysis(event_id, &ctx.worker_id, &reason)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    event_id = event_id,
                    "Failure latch skipped: claim no longer held"
                ),
                Err(e) => {
                    tracing::error!(event_id = event_id, error = %e, "Failed to latch analysis failure")
                }
            }
        }
    }
}

/// Guard the images, then run the two model calls with a bounded retry
/// budget for transport failures. `Ok(None)` means the claim was released
/// because the artifacts were not ready.
async fn analyze_with_retries(
    ctx: &WorkerContext,
    client: &AiClient,
    event: &Event,
) -> Result<Option<AiOutcome>> {
    let (Some(image_a_rel), Some(image_b_rel)) =
        (event.image_a_path.clone(), event.image_b_path.clone())
    else {
        ctx.store
            .events()
            .release_analysis_claim(event.id, &ctx.worker_id)
            .await?;
        return Ok(None);
    };

    for rel in [&image_a_rel, &image_b_rel] {
        if !ctx.artifacts.is_quiescent(rel, ctx.config.quiescence).await? {
            tracing::debug!(
                event_id = event.id,
                path = %rel,
                "Image not settled on storage yet; releasing claim"
            );
            ctx.store
                .events()
                .release_analysis_claim(event.id, &ctx.worker_id)
                .await?;
            return Ok(None);
        }
    }

    let image_a = tokio::fs::read(ctx.artifacts.resolve(&image_a_rel)?).await?;
    let image_b = tokio::fs::read(ctx.artifacts.resolve(&image_b_rel)?).await?;

    let mut last_error: Option<Error> = None;

    for attempt in 0..=ctx.config.ai_retry_budget {
        if attempt > 0 {
            let delay = Duration::from_millis(500 * 2u64.pow(attempt.min(6)));
            tracing::info!(
                event_id = event.id,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying AI analysis"
            );
            tokio::time::sleep(delay).await;
        }

        let vision = match client.analyze_images(&image_a, &image_b).await {
            Ok(vision) => vision,
            Err(e) if e.is_retriable() => {
                last_error = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let phrase = match client.extract_phrase(&vision.summary).await {
            Ok(phrase) => phrase,
            Err(e) if e.is_retriable() => {
                last_error = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let objects = match vision.objects {
            Some(ref objects) if !objects.is_empty() => {
                Some(serde_json::to_string(objects)?)
            }
            _ => None,
        };

        return Ok(Some(AiOutcome {
            person_detected: vision.person_detected,
            confidence: vision.confidence,
            objects,
            description: Some(vision.summary),
            phrase: Some(phrase),
        }));
    }

    Err(last_error.unwrap_or_else(|| Error::Unavailable("model host unreachable".to_string())))
}

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::metrics;
use crate::server::AppState;

/// Header carrying the channel identifier we generated at registration.
pub const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";

/// Header carrying the kind of change the remote store observed.
pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";

/// Mutation states that warrant an invalidation. Everything else
/// (including the initial `sync` confirmation) is acknowledged and
/// dropped.
const RECOGNIZED_STATES: [&str; 4] = ["add", "remove", "update", "change"];

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Darkroom Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats();
    metrics::set_cache_entries("L1", stats.l1_entries);
    let body = json!({
        "status": "ready",
        "cache": { "mode": stats.mode, "l1Entries": stats.l1_entries },
        "pendingInvalidations": state.debouncer.pending_len(),
    });
    (StatusCode::OK, Json(body))
}

pub async fn prometheus_metrics() -> Response {
    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

/// Webhook invoked by the remote store when watched content changes.
///
/// Always acknowledges with `200 {"ok": true}`: the remote store retries on
/// failure and disables the channel on repeated failure, and there is
/// nothing it could do differently for events we choose to drop. The
/// response goes out as soon as the event is filtered, resolved, or
/// scheduled; invalidation itself runs after the debounce quiet period,
/// off the request path.
pub async fn drive_webhook(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ack = (StatusCode::OK, Json(json!({"ok": true})));

    let channel_id = headers
        .get(CHANNEL_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    let resource_state = headers
        .get(RESOURCE_STATE_HEADER)
        .and_then(|v| v.to_str().ok());

    // FILTERED: drop incomplete or non-mutation events before touching the
    // registry. The initial sync confirmation lands here by design.
    let (Some(channel_id), Some(resource_state)) = (channel_id, resource_state) else {
        tracing::debug!("webhook event missing channel or resource-state header");
        metrics::record_webhook_event("missing_headers");
        return ack;
    };
    if resource_state == "sync" {
        tracing::debug!(channel_id = %channel_id, "webhook sync confirmation acknowledged");
        metrics::record_webhook_event("sync");
        return ack;
    }
    if !RECOGNIZED_STATES.contains(&resource_state) {
        tracing::debug!(
            channel_id = %channel_id,
            resource_state = %resource_state,
            "webhook event with unrecognized resource-state dropped"
        );
        metrics::record_webhook_event("unknown_state");
        return ack;
    }

    // RESOLVED: map the channel to a folder/gallery. A stale or superseded
    // channel is normal after re-registration, not an error.
    let subscription = match state.registry.find_by_channel(channel_id).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            tracing::debug!(channel_id = %channel_id, "webhook event for unknown channel dropped");
            metrics::record_webhook_event("unknown_channel");
            return ack;
        }
        Err(e) => {
            // The remote store will redeliver; the registry being briefly
            // unreachable must not escalate into a disabled channel.
            tracing::warn!(channel_id = %channel_id, error = %e, "webhook channel lookup failed");
            metrics::record_webhook_event("lookup_failed");
            return ack;
        }
    };

    // DEBOUNCED: one pending invalidation per folder, restarted on every
    // event, so a 50-photo upload burst collapses into a single eviction.
    tracing::debug!(
        channel_id = %channel_id,
        folder_id = %subscription.folder_id,
        resource_state = %resource_state,
        "webhook event scheduled for invalidation"
    );
    let invalidator = state.invalidator.clone();
    let folder_id = subscription.folder_id.clone();
    let gallery_id = subscription.gallery_id;
    state.debouncer.schedule(&subscription.folder_id, move || async move {
        invalidator.invalidate_folder(&folder_id, gallery_id).await;
        Ok(())
    });
    metrics::record_webhook_event("scheduled");

    ack
}

/// Renewal sweep trigger, hit by an external scheduler and authenticated by
/// a shared bearer secret. Served on both GET and POST: cron-style pingers
/// commonly only speak GET.
pub async fn renew_watches(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.config.watch.renew_secret);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid or missing bearer token"})),
        )
            .into_response();
    }

    match state.renewer.renew_expiring().await {
        Ok(summary) => {
            let failures: Vec<_> = summary
                .failures
                .iter()
                .map(|f| json!({"folderId": f.folder_id, "reason": f.reason}))
                .collect();
            (
                StatusCode::OK,
                Json(json!({
                    "renewed": summary.renewed,
                    "failures": failures,
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "renewal sweep could not run");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::notify::{format, InteractionFollowUp, SummaryLabel};
use crate::runner::{Pipeline, RunOptions, RunReport};

const INTERACTION_PING: u8 = 1;
const INTERACTION_COMMAND: u8 = 2;
const RESPONSE_PONG: u8 = 1;
const RESPONSE_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED: u8 = 5;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/run", get(run).post(run))
        .route("/interactions", post(interactions))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct RunQuery {
    force: Option<String>,
    limit: Option<String>,
    summary: Option<String>,
}

/// Manual trigger: `/run?force=1&limit=5` or `/run?summary=1`.
async fn run(State(state): State<AppState>, Query(q): Query<RunQuery>) -> Json<RunReport> {
    let limit = q.limit.as_deref().and_then(|v| v.trim().parse::<usize>().ok());
    let res = if q.summary.as_deref() == Some("1") {
        state.pipeline.run_summary(SummaryLabel::Manual, limit).await
    } else {
        let opts = RunOptions {
            force: q.force.as_deref() == Some("1"),
            limit,
        };
        state.pipeline.run(opts).await
    };
    Json(RunReport::from(&res))
}

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    application_id: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    data: Option<InteractionData>,
}

#[derive(Debug, Deserialize)]
struct InteractionData {
    #[serde(default)]
    name: String,
}

/// Ed25519 check of `timestamp + body` against the application's public key.
pub fn verify_signature(public_key_hex: &str, signature_hex: &str, message: &[u8]) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex.trim()) else {
        return false;
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

async fn interactions(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let cfg = state.pipeline.config();
    let Some(public_key) = cfg.discord_public_key.as_deref() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Missing DISCORD_PUBLIC_KEY").into_response();
    };

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(signature), Some(timestamp)) =
        (header("x-signature-ed25519"), header("x-signature-timestamp"))
    else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };
    let signed = format!("{timestamp}{body}");
    if !verify_signature(public_key, signature, signed.as_bytes()) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let interaction: Interaction = match serde_json::from_str(&body) {
        Ok(i) => i,
        Err(e) => {
            tracing::debug!(target: "api", "bad interaction body: {e}");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    if interaction.kind == INTERACTION_PING {
        return Json(json!({ "type": RESPONSE_PONG })).into_response();
    }

    let is_our_command = interaction.kind == INTERACTION_COMMAND
        && interaction
            .data
            .as_ref()
            .is_some_and(|d| d.name == cfg.discord_command_name);
    if !is_our_command {
        return Json(json!({
            "type": RESPONSE_MESSAGE,
            "data": { "content": "Unknown command.", "allowed_mentions": { "parse": [] } }
        }))
        .into_response();
    }

    let (Some(app_id), Some(token)) = (interaction.application_id, interaction.token) else {
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    };

    // Acknowledge now; the list goes out through the follow-up webhook.
    let follow_up = InteractionFollowUp::new(&cfg.discord_api_base, &app_id, &token);
    tokio::spawn(send_command_follow_up(state.pipeline.clone(), follow_up));

    Json(json!({ "type": RESPONSE_DEFERRED })).into_response()
}

async fn send_command_follow_up(pipeline: Arc<Pipeline>, follow_up: InteractionFollowUp) {
    let result: anyhow::Result<()> = async {
        let deals = pipeline.command_deals().await?;
        if deals.is_empty() {
            return follow_up.send(&format::text_message("No items found.")).await;
        }
        for msg in format::command_messages(&deals) {
            follow_up.send(&msg).await?;
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(target: "api", "command follow-up failed: {e:#}");
        let reply = format::text_message(format!("Error: {e:#}"));
        if let Err(e) = follow_up.send(&reply).await {
            tracing::warn!(target: "api", "error follow-up failed: {e:#}");
        }
    }
}

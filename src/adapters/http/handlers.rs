use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;

use crate::application::{
    MigrationOrchestrator, MigrationReport, OrchestratorError, PoolReadError, PoolStateCache,
    RECHECK_HINT,
};
use crate::domain::{lamports_to_sol_f64, PoolProgress, RejectReason};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<MigrationOrchestrator>,
    pub progress: Arc<PoolStateCache>,
}

#[derive(Debug, Deserialize)]
pub struct MigrateRequest {
    #[serde(rename = "mintAddress")]
    pub mint_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateResponse {
    pub success: bool,
    pub signatures: Vec<String>,
    pub damm_pool_address: String,
    pub pre_claim_signature: Option<String>,
    pub pre_claim_sol: f64,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_migrated: bool,
}

impl From<MigrationReport> for MigrateResponse {
    fn from(report: MigrationReport) -> Self {
        Self {
            success: true,
            signatures: report.signatures.iter().map(ToString::to_string).collect(),
            damm_pool_address: report.permanent_pool_address.to_string(),
            pre_claim_signature: report.pre_claim_signature.map(|s| s.to_string()),
            pre_claim_sol: lamports_to_sol_f64(report.pre_claim_lamports),
            message: report.message,
            already_migrated: report.already_migrated,
        }
    }
}

fn bad_request(error: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": error.into() }))).into_response()
}

fn rejection_response(reason: &RejectReason) -> Response {
    let body = match reason {
        RejectReason::BelowThreshold {
            current_quote_lamports,
            required_quote_lamports,
        } => json!({
            "error": "Pool has not reached the graduation threshold",
            "currentQuote": lamports_to_sol_f64(*current_quote_lamports),
            "requiredQuote": lamports_to_sol_f64(*required_quote_lamports),
        }),
        RejectReason::TokenNotFound { mint } => json!({
            "error": "Token not found",
            "mintAddress": mint.to_string(),
        }),
        RejectReason::PoolNotFound { pool } => json!({
            "error": "Bonding curve pool not found",
            "poolAddress": pool.to_string(),
        }),
        RejectReason::InvalidAddress(address) => json!({
            "error": "Invalid address",
            "address": address,
        }),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Map an orchestrator error to its HTTP status and body
pub fn error_response(err: &OrchestratorError) -> Response {
    match err {
        OrchestratorError::Rejected(reason) => rejection_response(reason),
        OrchestratorError::InProgress(pool) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Migration already in progress for this pool",
                "poolAddress": pool.to_string(),
            })),
        )
            .into_response(),
        OrchestratorError::Failed { reason, claim } => {
            let pre_claim_signature = claim
                .as_ref()
                .and_then(|c| c.signature())
                .map(|s| s.to_string());
            let pre_claim_sol = claim
                .as_ref()
                .map(|c| lamports_to_sol_f64(c.claimed_lamports()))
                .unwrap_or(0.0);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": reason,
                    "preClaimSignature": pre_claim_signature,
                    "preClaimSol": pre_claim_sol,
                    "hint": RECHECK_HINT,
                })),
            )
                .into_response()
        }
        OrchestratorError::Store(_) | OrchestratorError::Transition(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": err.to_string(),
                "hint": RECHECK_HINT,
            })),
        )
            .into_response(),
    }
}

pub async fn migrate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MigrateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let mint = match Pubkey::from_str(request.mint_address.trim()) {
        Ok(mint) => mint,
        Err(_) => {
            return rejection_response(&RejectReason::InvalidAddress(request.mint_address));
        }
    };

    tracing::info!("Migration requested for mint {}", mint);
    match state.orchestrator.migrate_by_mint(&mint).await {
        Ok(report) => (StatusCode::OK, Json(MigrateResponse::from(report))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn pool_progress(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Response {
    let pool = match Pubkey::from_str(address.trim()) {
        Ok(pool) => pool,
        Err(_) => return rejection_response(&RejectReason::InvalidAddress(address)),
    };

    match state.progress.get(&pool).await {
        Ok(snapshot) => (StatusCode::OK, Json(PoolProgress::from(&snapshot))).into_response(),
        Err(PoolReadError::PoolNotFound(pool)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Bonding curve pool not found",
                "poolAddress": pool.to_string(),
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!("Progress read for {} failed: {}", pool, err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

//! `POST /transactions` — the external submission endpoint.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::codec::decode_exact;
use chain::Transaction;

use crate::state::SharedState;

/// Request body for `POST /transactions`: a hex-encoded, canonically
/// encoded [`Transaction`].
#[derive(Debug, Deserialize)]
pub struct SubmitTransactionRequest {
    pub transaction_hex: String,
}

/// Response body for `POST /transactions`.
#[derive(Debug, Serialize)]
pub struct SubmitTransactionResponse {
    pub status: &'static str,
    pub hash: String,
}

/// Decodes the posted transaction with the chain's canonical codec and
/// forwards it on the server's local-transaction channel.
pub async fn submit_transaction(
    State(state): State<SharedState>,
    Json(body): Json<SubmitTransactionRequest>,
) -> Result<(StatusCode, Json<SubmitTransactionResponse>), (StatusCode, String)> {
    let bytes = hex::decode(&body.transaction_hex)
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid hex encoding".to_string()))?;

    let tx: Transaction = decode_exact(&bytes)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("malformed transaction: {e}")))?;

    if !tx.verify() {
        return Err((StatusCode::BAD_REQUEST, "bad transaction signature".to_string()));
    }

    let hash = tx.hash().to_string();

    state
        .tx_sender
        .send(tx)
        .map_err(|_| (StatusCode::SERVICE_UNAVAILABLE, "node is shutting down".to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTransactionResponse {
            status: "submitted",
            hash,
        }),
    ))
}

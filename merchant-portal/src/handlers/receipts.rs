use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use portal_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::models::Receipt;
use crate::services::receipt_printer::{render_text, DEFAULT_WIDTH};
use crate::AppState;

const MIN_WIDTH: usize = 24;
const MAX_WIDTH: usize = 48;

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub computed_total: i64,
    pub totals_consistent: bool,
    pub change_due: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PrintQuery {
    pub width: Option<usize>,
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ReceiptResponse>, AppError> {
    let receipt = state.backend.receipt(&token).await?;

    Ok(Json(ReceiptResponse {
        computed_total: receipt.computed_total(),
        totals_consistent: receipt.order.totals_consistent(),
        change_due: receipt.change_due(),
        receipt,
    }))
}

pub async fn print_receipt(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<PrintQuery>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state.backend.receipt(&token).await?;
    let width = query
        .width
        .unwrap_or(DEFAULT_WIDTH)
        .clamp(MIN_WIDTH, MAX_WIDTH);

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_text(&receipt, width),
    ))
}

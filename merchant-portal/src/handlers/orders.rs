use axum::{
    extract::{Path, State},
    Json,
};
use portal_core::error::AppError;

use crate::models::OrderStatusView;
use crate::AppState;

/// Public order tracker.
pub async fn order_status(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderStatusView>, AppError> {
    let order = state.backend.order_status(&order_number).await?;

    if !order.totals_consistent() {
        tracing::warn!(
            order_number = %order.order_number,
            total = order.total,
            computed = order.computed_total(),
            "Order totals do not add up"
        );
    }

    Ok(Json(OrderStatusView::from(order)))
}

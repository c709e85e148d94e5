//! Auction handlers: snapshot, start, bid, and bid history.
//!
//! These mirror the WebSocket commands for operators and scripts. They run
//! the same service code, so a REST bid and a WebSocket bid are
//! indistinguishable to the store and to viewers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{BidDto, BidHistoryResponse, BidResponse, PaginationMeta, PaginationParams};
use crate::app_state::AppState;
use crate::domain::{AuctionState, BidRequest, StartRequest};
use crate::error::{AuctionError, ErrorResponse};

/// `GET /auction`: Current auction snapshot.
///
/// # Errors
///
/// Returns [`AuctionError::StoreUnavailable`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/auction",
    tag = "Auction",
    summary = "Get the current auction",
    description = "Reads the shared auction record directly from the store.",
    responses(
        (status = 200, description = "Current snapshot", body = AuctionState),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn get_auction(State(state): State<AppState>) -> Result<impl IntoResponse, AuctionError> {
    Ok(Json(state.service.snapshot().await?))
}

/// `POST /auction/start`: Reset the auction with a new item.
///
/// # Errors
///
/// Returns [`AuctionError::InvalidRequest`] for a blank item or negative
/// price, and [`AuctionError::StoreUnavailable`] if the reset fails.
#[utoipa::path(
    post,
    path = "/api/v1/auction/start",
    tag = "Auction",
    summary = "Start an auction",
    description = "Starts a new run with a fresh countdown, replacing any running auction. Every viewer receives the opening snapshot.",
    request_body = StartRequest,
    responses(
        (status = 201, description = "Auction started", body = AuctionState),
        (status = 400, description = "Invalid item or price", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn start_auction(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<impl IntoResponse, AuctionError> {
    let snapshot = state
        .service
        .start_auction(&req.item_name, req.opening_price)
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// `POST /auction/bids`: Place a bid.
///
/// A rejected bid is a normal outcome: `200` with `accepted: false`.
///
/// # Errors
///
/// Returns [`AuctionError::InvalidBid`] for a blank bidder name and
/// [`AuctionError::StoreUnavailable`] if the bid could not be evaluated.
#[utoipa::path(
    post,
    path = "/api/v1/auction/bids",
    tag = "Auction",
    summary = "Place a bid",
    description = "Runs the atomic bid protocol. Accepted bids are broadcast to every viewer and queued for the bid log.",
    request_body = BidRequest,
    responses(
        (status = 200, description = "Bid evaluated", body = BidResponse),
        (status = 400, description = "Malformed bid", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn submit_bid(
    State(state): State<AppState>,
    Json(bid): Json<BidRequest>,
) -> Result<impl IntoResponse, AuctionError> {
    let outcome = state.service.submit_bid(bid).await?;
    Ok(Json(BidResponse::from(outcome)))
}

/// `GET /auction/bids`: Paginated bid history, newest first.
///
/// # Errors
///
/// Returns [`AuctionError::PersistenceFailure`] if the bid log cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/auction/bids",
    tag = "Auction",
    summary = "List accepted bids",
    description = "Returns accepted bids from the write-behind bid log. Empty when persistence is disabled.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated bid history", body = BidHistoryResponse),
        (status = 500, description = "Bid log unavailable", body = ErrorResponse),
    )
)]
pub async fn list_bids(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AuctionError> {
    let params = params.clamped();
    let (rows, total) = state
        .service
        .recorder()
        .history(params.per_page, params.offset())
        .await?;

    Ok(Json(BidHistoryResponse {
        data: rows.into_iter().map(BidDto::from).collect(),
        pagination: PaginationMeta::new(&params, total),
    }))
}

/// Auction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auction", get(get_auction))
        .route("/auction/start", post(start_auction))
        .route("/auction/bids", post(submit_bid).get(list_bids))
}

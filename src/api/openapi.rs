//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{BidDto, BidHistoryResponse, BidResponse, PaginationMeta};
use super::handlers::{auction, system};
use crate::domain::{AuctionState, BidRequest, RejectReason, StartRequest};
use crate::error::{ErrorBody, ErrorResponse};

/// Path the document is served at.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Generated OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "auction-relay",
        description = "Replicated live-auction server. Viewers use the WebSocket at /ws; these endpoints serve operators and scripts."
    ),
    paths(
        system::health_handler,
        auction::get_auction,
        auction::start_auction,
        auction::submit_bid,
        auction::list_bids,
    ),
    components(schemas(
        AuctionState,
        StartRequest,
        BidRequest,
        BidResponse,
        RejectReason,
        BidDto,
        BidHistoryResponse,
        PaginationMeta,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Replica health"),
        (name = "Auction", description = "Auction commands and bid history"),
    )
)]
pub struct ApiDoc;

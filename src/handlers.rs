// region:    --- Imports
use crate::bidding::commands::{handle_close_auction as command_handle_close_auction, CloseOutcome};
use crate::broadcast::SubscriptionRouter;
use crate::gateway;
use crate::registry::AuctionRegistry;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

// endregion: --- Imports

/// 공유 상태: 레지스트리와 구독 라우터
pub type AppState = (Arc<AuctionRegistry>, Arc<SubscriptionRouter>);

// region:    --- Router

/// 전체 라우터 구성
/// 관리/조회용 HTTP와 실시간 입찰용 WebSocket(/ws)을 묶는다.
pub fn app(registry: Arc<AuctionRegistry>, router: Arc<SubscriptionRouter>) -> Router {
    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(gateway::ws_handler))
        .route(
            "/auctions",
            post(handle_create_auction).get(handle_get_auctions),
        )
        .route("/auctions/:id", get(handle_get_auction))
        .route("/auctions/:id/bids", get(handle_get_bid_history))
        .route("/auctions/:id/highest-bid", get(handle_get_highest_bid))
        .route("/auctions/:id/close", post(handle_close_auction))
        .layer(cors)
        .with_state((registry, router))
}

// endregion: --- Router

// region:    --- Command Handlers

/// 경매 생성 요청
#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    pub title: String,
    #[serde(default)]
    pub seller: String,
    pub floor: i64,
    pub min_increment: Option<i64>,
    pub ends_at: DateTime<Utc>,
}

// 기본 최소 증가분
const DEFAULT_MIN_INCREMENT: i64 = 25;

/// 경매 생성 요청 처리 (관리용)
pub async fn handle_create_auction(
    State((registry, _)): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 생성 요청: {:?}", "Command", req);

    let min_increment = req.min_increment.unwrap_or(DEFAULT_MIN_INCREMENT);
    if req.floor < 0 || min_increment < 1 {
        return (
            axum::http::StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "시작가는 0 이상, 최소 증가분은 1 이상이어야 합니다.",
                "code": "INVALID_PARAMS"
            })),
        )
            .into_response();
    }

    let auction =
        registry.create_auction(req.title, req.seller, req.floor, min_increment, req.ends_at);
    (axum::http::StatusCode::CREATED, Json(auction)).into_response()
}

/// 경매 종료 요청 처리 (관리용 명시적 종료)
pub async fn handle_close_auction(
    State((registry, router)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 종료 요청 id: {}", "Command", auction_id);

    match command_handle_close_auction(auction_id, router.as_ref(), &registry).await {
        CloseOutcome::Closed(final_bid) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "message": "경매가 종료되었습니다.",
                "final_bid": final_bid
            })),
        )
            .into_response(),
        CloseOutcome::AlreadyClosed => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({"message": "이미 종료된 경매입니다."})),
        )
            .into_response(),
        CloseOutcome::Missing => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "경매를 찾을 수 없습니다.", "code": "NOT_FOUND"})),
        )
            .into_response(),
        CloseOutcome::Corrupt => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "경매 상태가 오염되어 종료할 수 없습니다.",
                "code": "STATE_CORRUPT"
            })),
        )
            .into_response(),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 모든 경매 조회
pub async fn handle_get_auctions(State((registry, _)): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 모든 경매 조회", "HandlerQuery");
    Json(registry.snapshots().await)
}

/// 경매 조회
pub async fn handle_get_auction(
    State((registry, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 조회 id: {}", "HandlerQuery", auction_id);
    match registry.snapshot(auction_id).await {
        Some(auction) => Json(auction).into_response(),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "경매를 찾을 수 없습니다.", "code": "NOT_FOUND"})),
        )
            .into_response(),
    }
}

/// 입찰 이력 조회 (최신순)
pub async fn handle_get_bid_history(
    State((registry, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "HandlerQuery", auction_id);
    match registry.snapshot(auction_id).await {
        Some(auction) => Json(auction.bid_history).into_response(),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "경매를 찾을 수 없습니다.", "code": "NOT_FOUND"})),
        )
            .into_response(),
    }
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State((registry, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 최고 입찰가 조회 id: {}",
        "HandlerQuery", auction_id
    );
    match registry.snapshot(auction_id).await {
        Some(auction) => Json(serde_json::json!({
            "highest_bid": auction.highest_bid().map(|b| b.amount)
        }))
        .into_response(),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "경매를 찾을 수 없습니다.", "code": "NOT_FOUND"})),
        )
            .into_response(),
    }
}

// endregion: --- Query Handlers

// region:    --- Imports
use live_auction_service::broadcast::SubscriptionRouter;
use live_auction_service::handlers;
use live_auction_service::registry::AuctionRegistry;
use live_auction_service::scheduler::AuctionScheduler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 경매 레지스트리 생성 (메모리 내 권위 상태, 재시작 시 소실)
    let registry = Arc::new(AuctionRegistry::new());
    info!("{:<12} --> 경매 레지스트리 초기화 성공", "Main");

    // 구독 라우터 생성
    let router = Arc::new(SubscriptionRouter::new());

    // 경매 수명주기 시계 시작 (1초 간격 스캔)
    let scheduler = AuctionScheduler::new(Arc::clone(&registry), Arc::clone(&router));
    scheduler.start().await;
    info!("{:<12} --> 수명주기 스케줄러 시작", "Main");

    // 라우터 설정 (관리/조회 HTTP + /ws 실시간 입찰)
    let routes_all = handlers::app(registry, router);

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main

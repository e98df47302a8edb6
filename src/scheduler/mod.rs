/// 경매 수명주기 시계
/// 1초 간격으로 열린 경매를 훑어 마감 시각이 지난 것을 CLOSED로 전이시키고
/// auctionClosed 이벤트를 브로드캐스트한다. 이미 종료된 경매 재스캔은 무시된다.
/// OPEN -> CLOSED 전이를 쓰는 것은 이 시계와 관리용 명시적 종료뿐이다.
// region:    --- Imports
use crate::bidding::commands::{handle_close_auction, CloseOutcome};
use crate::bidding::model::AuctionStatus;
use crate::broadcast::SubscriptionRouter;
use crate::registry::AuctionRegistry;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Scheduler
/// 경매 수명주기 스케줄러
pub struct AuctionScheduler {
    registry: Arc<AuctionRegistry>,
    router: Arc<SubscriptionRouter>,
}

impl AuctionScheduler {
    pub fn new(registry: Arc<AuctionRegistry>, router: Arc<SubscriptionRouter>) -> Self {
        Self { registry, router }
    }

    /// 수명주기 스케줄러 시작
    pub async fn start(&self) {
        let registry = Arc::clone(&self.registry);
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
            loop {
                interval.tick().await;
                Self::sweep(&registry, &router).await;
            }
        });
    }

    /// 마감 시각이 지난 열린 경매를 종료 상태로 전이
    async fn sweep(registry: &AuctionRegistry, router: &SubscriptionRouter) {
        let now = Utc::now();
        for cell in registry.cells() {
            // 상태 판정도 셀 잠금 아래에서만 한다
            let auction_id = {
                let auction = cell.state.lock().await;
                if auction.status != AuctionStatus::Open || auction.ends_at > now {
                    continue;
                }
                auction.id
            };

            match handle_close_auction(auction_id, router, registry).await {
                CloseOutcome::Closed(_) => {
                    debug!(
                        "{:<12} --> 마감 경매 종료 처리 id: {}",
                        "Scheduler", auction_id
                    );
                }
                // 같은 틱 안에서 관리용 종료와 경쟁했을 수 있다
                CloseOutcome::AlreadyClosed | CloseOutcome::Missing => {}
                CloseOutcome::Corrupt => {
                    error!(
                        "{:<12} --> 오염된 경매 상태, 종료 보류 id: {}",
                        "Scheduler", auction_id
                    );
                }
            }
        }
    }
}
// endregion: --- Auction Scheduler

// endregion: --- Tests

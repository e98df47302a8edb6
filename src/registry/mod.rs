/// 경매 레지스트리
/// 활성 경매 집합과 각 경매의 권위 있는 입찰 상태를 메모리에서 단독 소유한다.
/// 영속성은 범위 밖: 프로세스가 재시작되면 상태는 사라진다.
// region:    --- Imports
use crate::bidding::model::{Auction, AuctionStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::info;

// endregion: --- Imports

// region:    --- Auction Cell
/// 경매별 직렬화 단위
/// 상태 변경(입찰 커밋, 종료 전이)은 반드시 이 잠금 아래에서만 일어난다.
/// 경매마다 별도의 잠금이므로 서로 다른 경매는 경합하지 않는다.
pub struct AuctionCell {
    pub(crate) state: Mutex<Auction>,
}

// endregion: --- Auction Cell

// region:    --- Auction Registry
pub struct AuctionRegistry {
    auctions: RwLock<HashMap<i64, Arc<AuctionCell>>>,
    next_id: AtomicI64,
}

impl AuctionRegistry {
    /// 경매 레지스트리 생성
    pub fn new() -> Self {
        Self {
            auctions: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// 경매 생성 (관리용 동작)
    pub fn create_auction(
        &self,
        title: String,
        seller: String,
        floor: i64,
        min_increment: i64,
        ends_at: DateTime<Utc>,
    ) -> Auction {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let auction = Auction {
            id,
            title,
            seller,
            floor,
            min_increment,
            current_bid: floor,
            bid_history: Vec::new(),
            ends_at,
            status: AuctionStatus::Open,
            created_at: Utc::now(),
            bid_seq: 0,
        };
        let cell = Arc::new(AuctionCell {
            state: Mutex::new(auction.clone()),
        });
        self.auctions
            .write()
            .expect("auctions 잠금 오염")
            .insert(id, cell);
        info!(
            "{:<12} --> 경매 생성 id: {}, 시작가: {}, 마감: {}",
            "Registry", id, floor, ends_at
        );
        auction
    }

    /// 경매 셀 조회
    /// 커밋 경로는 셀 잠금을 통해서만 열린다 (Arbiter와 스케줄러 전용).
    pub(crate) fn cell(&self, auction_id: i64) -> Option<Arc<AuctionCell>> {
        self.auctions
            .read()
            .expect("auctions 잠금 오염")
            .get(&auction_id)
            .map(Arc::clone)
    }

    /// 모든 경매 셀 (스케줄러 스캔용)
    pub(crate) fn cells(&self) -> Vec<Arc<AuctionCell>> {
        self.auctions
            .read()
            .expect("auctions 잠금 오염")
            .values()
            .map(Arc::clone)
            .collect()
    }

    /// 경매 스냅샷 조회
    pub async fn snapshot(&self, auction_id: i64) -> Option<Auction> {
        let cell = self.cell(auction_id)?;
        let auction = cell.state.lock().await.clone();
        Some(auction)
    }

    /// 모든 경매 스냅샷 조회 (생성 역순)
    pub async fn snapshots(&self) -> Vec<Auction> {
        let cells = self.cells();
        let mut all = Vec::with_capacity(cells.len());
        for cell in cells {
            all.push(cell.state.lock().await.clone());
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }
}

impl Default for AuctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// endregion: --- Auction Registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 상태 (OPEN -> CLOSED 단방향 전이)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Open,
    Closed,
}

// 경매 모델
#[derive(Debug, Clone, Serialize)]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub seller: String,
    pub floor: i64,
    pub min_increment: i64,
    pub current_bid: i64,
    pub bid_history: Vec<Bid>, // 최신순
    pub ends_at: DateTime<Utc>,
    pub status: AuctionStatus,
    pub created_at: DateTime<Utc>,
    // 경매별 입찰 id 시퀀스 (셀 잠금 하에서만 증가)
    #[serde(skip)]
    pub(crate) bid_seq: i64,
}

impl Auction {
    /// 다음 입찰이 넘어야 하는 최소 금액
    /// i64 상한 부근에서는 포화한다. 감긴 음수 하한은 시작가 미만 입찰을 통과시킨다.
    pub fn minimum_required(&self) -> i64 {
        self.current_bid.saturating_add(self.min_increment)
    }

    /// 최고(최신) 입찰
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.bid_history.first()
    }
}

// 입찰 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder: String,
    pub amount: i64,
    pub submitted_at: DateTime<Utc>,
}

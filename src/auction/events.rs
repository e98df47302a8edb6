use crate::bidding::model::Bid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 입찰 승인 이벤트
    BidAdmitted {
        auction_id: i64,
        current_bid: i64,
        bid: Bid,
    },
    // 경매 종료 이벤트
    AuctionClosed {
        auction_id: i64,
        final_bid: Option<Bid>,
    },
}

impl AuctionEvent {
    /// 이벤트가 속한 경매 id
    pub fn auction_id(&self) -> i64 {
        match self {
            AuctionEvent::BidAdmitted { auction_id, .. } => *auction_id,
            AuctionEvent::AuctionClosed { auction_id, .. } => *auction_id,
        }
    }
}

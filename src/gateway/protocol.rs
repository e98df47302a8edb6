/// WebSocket 프로토콜 메시지 타입
/// 태그된 JSON 직렬화: {"type": "...", ...}
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::bidding::commands::BidRejection;
use crate::bidding::model::Bid;
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Client -> Server

/// 클라이언트가 보내는 메시지
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// 경매 시청 시작 (멱등: 두 번 참가해도 한 번과 같다)
    JoinAuction { auction_id: i64 },
    /// 경매 시청 종료
    LeaveAuction { auction_id: i64 },
    /// 입찰 제출 (입찰자 식별자는 연결의 세션 신원에서 온다)
    SubmitBid { auction_id: i64, amount: i64 },
}

// endregion: --- Client -> Server

// region:    --- Server -> Client

/// 서버가 보내는 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// 입찰 승인 (제출 연결에 직접 응답)
    BidAccepted { bid: Bid },
    /// 입찰 거부 (제출 연결에 직접 응답)
    BidRejected {
        auction_id: i64,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum_required: Option<i64>,
    },
    /// 권위 상태 변경 브로드캐스트 (제출자 포함 모든 구독자에게 동일 채널로)
    AuctionUpdated {
        auction_id: i64,
        current_bid: i64,
        bid_history_head: Bid,
    },
    /// 경매 종료 브로드캐스트
    AuctionClosed {
        auction_id: i64,
        final_bid: Option<Bid>,
    },
}

impl ServerMessage {
    /// 도메인 이벤트를 브로드캐스트 메시지로 변환
    pub fn from_event(event: AuctionEvent) -> Self {
        match event {
            AuctionEvent::BidAdmitted {
                auction_id,
                current_bid,
                bid,
            } => ServerMessage::AuctionUpdated {
                auction_id,
                current_bid,
                bid_history_head: bid,
            },
            AuctionEvent::AuctionClosed {
                auction_id,
                final_bid,
            } => ServerMessage::AuctionClosed {
                auction_id,
                final_bid,
            },
        }
    }

    /// 거부 사유를 직접 응답 메시지로 변환
    pub fn bid_rejected(auction_id: i64, rejection: &BidRejection) -> Self {
        ServerMessage::BidRejected {
            auction_id,
            reason: rejection.code().to_string(),
            minimum_required: rejection.minimum_required(),
        }
    }
}

// endregion: --- Server -> Client

// endregion: --- Tests

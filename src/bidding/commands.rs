/// 입찰 심사(Arbiter) 커맨드 처리
/// 1. 입찰 제출
/// 2. 경매 종료 (수명주기 시계와 관리용 종료가 공유)
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::bidding::model::{AuctionStatus, Bid};
use crate::broadcast::EventPublisher;
use crate::registry::AuctionRegistry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Commands

/// 입찰 제출 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubmitBidCommand {
    pub auction_id: i64,
    pub bidder: String,
    pub amount: i64,
}

// 입찰 이력 보관 상한 (메모리 제한을 위한 보존 정책)
const MAX_BID_HISTORY: usize = 100;

/// 입찰 거부 사유
/// 모든 거부는 회복 가능하며 제출 연결에만 보고된다. 경매 상태는 바뀌지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidRejection {
    #[error("경매가 없거나 이미 종료되었습니다")]
    AuctionClosedOrMissing,
    #[error("입찰 금액이 너무 낮습니다 (최소 {minimum_required})")]
    BidTooLow { minimum_required: i64 },
    #[error("입찰자 식별자가 비어 있습니다")]
    InvalidBidder,
}

impl BidRejection {
    /// 프로토콜로 나가는 사유 코드
    pub fn code(&self) -> &'static str {
        match self {
            BidRejection::AuctionClosedOrMissing => "AUCTION_CLOSED_OR_MISSING",
            BidRejection::BidTooLow { .. } => "BID_TOO_LOW",
            BidRejection::InvalidBidder => "INVALID_BIDDER",
        }
    }

    /// 금액 미달 거부에 동봉되는 요구 최소 금액
    pub fn minimum_required(&self) -> Option<i64> {
        match self {
            BidRejection::BidTooLow { minimum_required } => Some(*minimum_required),
            _ => None,
        }
    }
}

/// 경매 종료 결과
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// 이번 호출로 종료됨 (종료 이벤트가 정확히 한 번 발행됨)
    Closed(Option<Bid>),
    /// 이미 종료되어 있음 (무시)
    AlreadyClosed,
    /// 경매 없음
    Missing,
    /// 불변식 위반 감지: 종료를 거부하고 보고만 함
    Corrupt,
}

/// 1. 입찰 제출
/// 경매별 셀 잠금 아래에서 검증과 커밋, 이벤트 발행까지 마친다.
/// 같은 경매의 두 제출은 반드시 이전 커밋이 반영된 상태를 보고 차례로 심사되고
/// (lost update 차단), 브로드캐스트도 커밋 순서대로 나간다.
pub async fn handle_submit_bid(
    cmd: SubmitBidCommand,
    publisher: &impl EventPublisher,
    registry: &AuctionRegistry,
) -> Result<Bid, BidRejection> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    let cell = registry
        .cell(cmd.auction_id)
        .ok_or(BidRejection::AuctionClosedOrMissing)?;

    let mut auction = cell.state.lock().await;
    let now = Utc::now();

    // 1. 경매가 열려 있어야 한다
    //    마감 시각이 지났으면 시계의 전이가 아직이어도 거부한다 (전이 자체는 쓰지 않는다)
    if auction.status != AuctionStatus::Open || now >= auction.ends_at {
        info!(
            "{:<12} --> 입찰 거부(종료/마감) 경매 id: {}",
            "Command", cmd.auction_id
        );
        return Err(BidRejection::AuctionClosedOrMissing);
    }

    // 2. 금액은 현재가 + 최소 증가분 이상이어야 한다
    let minimum_required = auction.minimum_required();
    if cmd.amount < minimum_required {
        warn!(
            "{:<12} --> 입찰 거부(금액 미달): {} < {}",
            "Command", cmd.amount, minimum_required
        );
        return Err(BidRejection::BidTooLow { minimum_required });
    }

    // 3. 입찰자 식별자가 비어 있으면 안 된다
    if cmd.bidder.trim().is_empty() {
        warn!("{:<12} --> 입찰 거부(입찰자 없음)", "Command");
        return Err(BidRejection::InvalidBidder);
    }

    // 커밋: id와 시각은 서버가 부여한다 (클라이언트 시계는 신뢰하지 않는다)
    auction.bid_seq += 1;
    let bid = Bid {
        id: auction.bid_seq,
        auction_id: auction.id,
        bidder: cmd.bidder,
        amount: cmd.amount,
        submitted_at: now,
    };
    auction.bid_history.insert(0, bid.clone());
    auction.bid_history.truncate(MAX_BID_HISTORY);
    auction.current_bid = bid.amount;

    info!(
        "{:<12} --> 입찰 승인 경매 id: {}, 입찰 id: {}, 금액: {}",
        "Command", auction.id, bid.id, bid.amount
    );

    // 잠금을 쥔 채 발행: 브로드캐스트 순서 == 커밋 순서
    publisher
        .publish(AuctionEvent::BidAdmitted {
            auction_id: auction.id,
            current_bid: auction.current_bid,
            bid: bid.clone(),
        })
        .await;

    Ok(bid)
}

/// 2. 경매 종료 (멱등)
/// 수명주기 시계의 스캔과 관리용 명시적 종료가 공유하는 유일한 전이 경로.
pub async fn handle_close_auction(
    auction_id: i64,
    publisher: &impl EventPublisher,
    registry: &AuctionRegistry,
) -> CloseOutcome {
    let Some(cell) = registry.cell(auction_id) else {
        return CloseOutcome::Missing;
    };

    let mut auction = cell.state.lock().await;
    if auction.status == AuctionStatus::Closed {
        return CloseOutcome::AlreadyClosed;
    }

    // 불변식 점검: 현재가와 이력 머리가 어긋난 경매는 종료하지 않고 보고만 한다
    if let Some(head) = auction.bid_history.first() {
        if head.amount != auction.current_bid {
            error!(
                "{:<12} --> 불변식 위반 감지 경매 id: {}, 현재가: {}, 이력 머리: {}",
                "Command", auction.id, auction.current_bid, head.amount
            );
            return CloseOutcome::Corrupt;
        }
    }

    auction.status = AuctionStatus::Closed;
    let final_bid = auction.highest_bid().cloned();
    info!(
        "{:<12} --> 경매 종료 id: {}, 최종 입찰: {:?}",
        "Command",
        auction.id,
        final_bid.as_ref().map(|b| b.amount)
    );

    publisher
        .publish(AuctionEvent::AuctionClosed {
            auction_id: auction.id,
            final_bid: final_bid.clone(),
        })
        .await;

    CloseOutcome::Closed(final_bid)
}

// endregion: --- Commands

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    /// 발행 이벤트를 기록하는 테스트용 발행자
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<AuctionEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: AuctionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingPublisher {
        fn events(&self) -> Vec<AuctionEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    fn open_auction(registry: &AuctionRegistry, floor: i64, min_increment: i64) -> i64 {
        registry
            .create_auction(
                "테스트 그림".to_string(),
                "TestSeller".to_string(),
                floor,
                min_increment,
                Utc::now() + Duration::seconds(60),
            )
            .id
    }

    fn bid_cmd(auction_id: i64, bidder: &str, amount: i64) -> SubmitBidCommand {
        SubmitBidCommand {
            auction_id,
            bidder: bidder.to_string(),
            amount,
        }
    }

    /// 시작가와 같은 첫 입찰은 거부된다 (시작가 + 증가분 이상이어야 승인)
    #[tokio::test]
    async fn test_first_bid_must_clear_floor_plus_increment() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 100, 25);

        let result = handle_submit_bid(bid_cmd(id, "alice", 100), &publisher, &registry).await;
        assert_eq!(
            result,
            Err(BidRejection::BidTooLow {
                minimum_required: 125
            })
        );

        // 거부는 상태를 바꾸지 않는다
        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.current_bid, 100);
        assert!(snapshot.bid_history.is_empty());
        assert!(publisher.events().is_empty());
    }

    /// i64 상한 부근 시작가에서도 최소 요구액이 음수로 감기지 않는다
    #[tokio::test]
    async fn test_minimum_required_saturates_near_i64_max() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, i64::MAX, 25);

        // 감긴 하한이라면 1도 통과했을 것이다
        for amount in [1, 100, i64::MAX - 1] {
            let result =
                handle_submit_bid(bid_cmd(id, "alice", amount), &publisher, &registry).await;
            assert_eq!(
                result,
                Err(BidRejection::BidTooLow {
                    minimum_required: i64::MAX
                })
            );
        }

        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.current_bid, i64::MAX);
        assert!(snapshot.bid_history.is_empty());
        assert!(publisher.events().is_empty());
    }

    /// 증가분 사다리 시나리오: 150 승인, 160 거부(최소 175), 200 승인
    #[tokio::test]
    async fn test_increment_ladder() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 100, 25);

        let bid = handle_submit_bid(bid_cmd(id, "alice", 150), &publisher, &registry)
            .await
            .unwrap();
        assert_eq!(bid.amount, 150);

        let result = handle_submit_bid(bid_cmd(id, "bob", 160), &publisher, &registry).await;
        assert_eq!(
            result,
            Err(BidRejection::BidTooLow {
                minimum_required: 175
            })
        );

        let bid = handle_submit_bid(bid_cmd(id, "bob", 200), &publisher, &registry)
            .await
            .unwrap();
        assert_eq!(bid.amount, 200);

        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.current_bid, 200);
        // 이력은 최신순이고 현재가는 이력 머리와 일치한다
        let amounts: Vec<i64> = snapshot.bid_history.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![200, 150]);
        assert_eq!(snapshot.highest_bid().unwrap().amount, snapshot.current_bid);
        assert_eq!(publisher.events().len(), 2);
    }

    /// 입찰자 식별자가 비면 거부된다
    #[tokio::test]
    async fn test_empty_bidder_rejected() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 100, 25);

        for bidder in ["", "   "] {
            let result = handle_submit_bid(bid_cmd(id, bidder, 500), &publisher, &registry).await;
            assert_eq!(result, Err(BidRejection::InvalidBidder));
        }
        assert!(publisher.events().is_empty());
    }

    /// 없는 경매와 종료된 경매는 금액과 무관하게 거부된다
    #[tokio::test]
    async fn test_missing_and_closed_rejected() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();

        let result = handle_submit_bid(bid_cmd(999, "alice", 500), &publisher, &registry).await;
        assert_eq!(result, Err(BidRejection::AuctionClosedOrMissing));

        let id = open_auction(&registry, 100, 25);
        let outcome = handle_close_auction(id, &publisher, &registry).await;
        assert_eq!(outcome, CloseOutcome::Closed(None));

        let result = handle_submit_bid(bid_cmd(id, "alice", 1_000_000), &publisher, &registry).await;
        assert_eq!(result, Err(BidRejection::AuctionClosedOrMissing));
    }

    /// 마감 시각이 지난 경매는 시계 전이 전이라도 거부된다 (전이는 쓰지 않는다)
    #[tokio::test]
    async fn test_expired_auction_rejected_before_sweep() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = registry
            .create_auction(
                "지난 경매".to_string(),
                "TestSeller".to_string(),
                100,
                25,
                Utc::now() - Duration::seconds(1),
            )
            .id;

        let result = handle_submit_bid(bid_cmd(id, "alice", 500), &publisher, &registry).await;
        assert_eq!(result, Err(BidRejection::AuctionClosedOrMissing));

        // 상태 전이는 수명주기 시계의 몫으로 남는다
        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.status, AuctionStatus::Open);
    }

    /// 같은 금액의 두 제출은 직렬화되어 먼저 커밋된 쪽만 승인된다
    #[tokio::test]
    async fn test_equal_amount_first_committed_wins() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 100, 25);

        let first = handle_submit_bid(bid_cmd(id, "alice", 150), &publisher, &registry).await;
        let second = handle_submit_bid(bid_cmd(id, "bob", 150), &publisher, &registry).await;

        assert!(first.is_ok());
        assert_eq!(
            second,
            Err(BidRejection::BidTooLow {
                minimum_required: 175
            })
        );
    }

    /// 동시 제출 50건: 개별로는 유효한 입찰도 직렬 심사 후에는
    /// 일부만 승인되고, 승인 금액 열은 증가분 이상씩 단조 증가한다
    #[tokio::test]
    async fn test_concurrent_submissions_serialized() {
        let registry = Arc::new(AuctionRegistry::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let id = open_auction(&registry, 100, 25);

        let mut handles = vec![];
        for i in 1..=50i64 {
            let registry = Arc::clone(&registry);
            let publisher = Arc::clone(&publisher);
            handles.push(tokio::spawn(async move {
                handle_submit_bid(
                    bid_cmd(id, &format!("bidder{}", i), 100 + i * 25),
                    &*publisher,
                    &registry,
                )
                .await
            }));
        }

        let mut admitted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(BidRejection::BidTooLow { .. }) => rejected += 1,
                Err(other) => panic!("예상 밖의 거부: {:?}", other),
            }
        }
        assert_eq!(admitted + rejected, 50);
        assert!(admitted >= 1);

        // 최고 제출액(100 + 50*25)은 어떤 순서로 심사돼도 승인된다
        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.current_bid, 100 + 50 * 25);
        assert_eq!(snapshot.bid_history.len(), admitted);

        // 승인 열은 최신순 이력에서 역순으로 증가분 이상씩 단조 증가
        let amounts: Vec<i64> = snapshot.bid_history.iter().rev().map(|b| b.amount).collect();
        let mut previous = snapshot.floor;
        for amount in amounts {
            assert!(amount >= previous + snapshot.min_increment);
            previous = amount;
        }
        assert_eq!(publisher.events().len(), admitted);
    }

    /// 종료는 멱등이고 종료 이벤트는 정확히 한 번 발행된다
    #[tokio::test]
    async fn test_close_idempotent_single_event() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 100, 25);

        handle_submit_bid(bid_cmd(id, "alice", 150), &publisher, &registry)
            .await
            .unwrap();

        let outcome = handle_close_auction(id, &publisher, &registry).await;
        match outcome {
            CloseOutcome::Closed(Some(final_bid)) => assert_eq!(final_bid.amount, 150),
            other => panic!("예상 밖의 종료 결과: {:?}", other),
        }
        assert_eq!(
            handle_close_auction(id, &publisher, &registry).await,
            CloseOutcome::AlreadyClosed
        );

        let closed_events = publisher
            .events()
            .iter()
            .filter(|e| matches!(e, AuctionEvent::AuctionClosed { .. }))
            .count();
        assert_eq!(closed_events, 1);
    }

    /// 현재가와 이력 머리가 어긋난 경매는 종료를 거부한다
    #[tokio::test]
    async fn test_close_refuses_corrupt_state() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 100, 25);

        handle_submit_bid(bid_cmd(id, "alice", 150), &publisher, &registry)
            .await
            .unwrap();

        // 상태를 억지로 어긋나게 만든다
        {
            let cell = registry.cell(id).unwrap();
            cell.state.lock().await.current_bid = 9_999;
        }

        assert_eq!(
            handle_close_auction(id, &publisher, &registry).await,
            CloseOutcome::Corrupt
        );
        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.status, AuctionStatus::Open);
    }

    /// 이력은 보관 상한까지만 유지된다 (절단은 보존 정책일 뿐 현재가는 유지)
    #[tokio::test]
    async fn test_history_retention_cap() {
        let registry = AuctionRegistry::new();
        let publisher = RecordingPublisher::default();
        let id = open_auction(&registry, 0, 1);

        for i in 1..=(MAX_BID_HISTORY as i64 + 5) {
            handle_submit_bid(bid_cmd(id, "alice", i), &publisher, &registry)
                .await
                .unwrap();
        }

        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.bid_history.len(), MAX_BID_HISTORY);
        assert_eq!(snapshot.current_bid, MAX_BID_HISTORY as i64 + 5);
        assert_eq!(snapshot.highest_bid().unwrap().amount, snapshot.current_bid);
    }
}
// endregion: --- Tests

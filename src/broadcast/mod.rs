/// 구독 라우터
/// (연결, 경매) 구독 관계를 소유하고 상태 변경을 구독자 전원에게 최선형으로 전달한다.
/// 전달은 연결별 유한 버퍼에 대한 비차단 전송이다: 느린 연결은 메시지를 잃을 뿐
/// 라우터나 다른 연결을 막지 못한다.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::gateway::protocol::ServerMessage;
use async_trait::async_trait;
use axum::extract::ws::Message;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// endregion: --- Imports

/// 연결 식별자
pub type ConnectionId = Uuid;

/// 연결별 발신 버퍼 크기
/// 가득 차면 해당 연결로 가는 메시지를 버린다.
pub const CONNECTION_BUFFER_SIZE: usize = 64;

// region:    --- Event Publisher Trait
/// 이벤트 발행 트레이트
/// Arbiter와 스케줄러는 이 경계를 통해서만 상태 변경을 알린다.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: AuctionEvent);
}

// endregion: --- Event Publisher Trait

// region:    --- Subscription Router

#[derive(Default)]
struct RouterInner {
    // 연결 -> 발신 채널 (끊긴 연결은 항목 자체가 없다)
    connections: HashMap<ConnectionId, mpsc::Sender<Message>>,
    // 경매 -> 구독 연결
    subscribers: HashMap<i64, HashSet<ConnectionId>>,
    // 연결 -> 구독 경매 (종료 시 역방향 정리용)
    watched: HashMap<ConnectionId, HashSet<i64>>,
}

pub struct SubscriptionRouter {
    inner: RwLock<RouterInner>,
}

impl SubscriptionRouter {
    /// 구독 라우터 생성
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RouterInner::default()),
        }
    }

    /// 연결 등록 (게이트웨이가 연결 수립 시 호출)
    pub fn register(&self, connection_id: ConnectionId, tx: mpsc::Sender<Message>) {
        let mut inner = self.inner.write().expect("router 잠금 오염");
        inner.connections.insert(connection_id, tx);
        info!("{:<12} --> 연결 등록: {}", "Router", connection_id);
    }

    /// 경매 구독 (멱등)
    /// 이미 끊긴 연결의 구독 요청은 무시한다 -- 끊김이 이긴다.
    pub fn subscribe(&self, connection_id: ConnectionId, auction_id: i64) {
        let mut inner = self.inner.write().expect("router 잠금 오염");
        if !inner.connections.contains_key(&connection_id) {
            debug!(
                "{:<12} --> 끊긴 연결의 구독 요청 무시: {}",
                "Router", connection_id
            );
            return;
        }
        inner
            .subscribers
            .entry(auction_id)
            .or_default()
            .insert(connection_id);
        inner
            .watched
            .entry(connection_id)
            .or_default()
            .insert(auction_id);
        debug!(
            "{:<12} --> 구독: {} -> 경매 {}",
            "Router", connection_id, auction_id
        );
    }

    /// 경매 구독 해제
    pub fn unsubscribe(&self, connection_id: ConnectionId, auction_id: i64) {
        let mut inner = self.inner.write().expect("router 잠금 오염");
        if let Some(subs) = inner.subscribers.get_mut(&auction_id) {
            subs.remove(&connection_id);
        }
        if let Some(auctions) = inner.watched.get_mut(&connection_id) {
            auctions.remove(&auction_id);
        }
        debug!(
            "{:<12} --> 구독 해제: {} -> 경매 {}",
            "Router", connection_id, auction_id
        );
    }

    /// 연결 종료 처리: 모든 구독과 발신 채널을 제거한다.
    /// 이후의 어떤 broadcast도 이 연결에 닿지 않는다 (동시 구독 요청과의
    /// 경쟁에서도 끊김이 이긴다).
    pub fn unsubscribe_all(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write().expect("router 잠금 오염");
        inner.connections.remove(&connection_id);
        if let Some(auctions) = inner.watched.remove(&connection_id) {
            for auction_id in auctions {
                if let Some(subs) = inner.subscribers.get_mut(&auction_id) {
                    subs.remove(&connection_id);
                }
            }
        }
        info!("{:<12} --> 연결 제거: {}", "Router", connection_id);
    }

    /// 제출 연결에 직접 응답 전송 (승인/거부 ack)
    /// 연결이 이미 사라졌으면 조용히 버린다.
    pub fn send_to(&self, connection_id: ConnectionId, msg: &ServerMessage) {
        let json = match serde_json::to_string(msg) {
            Ok(j) => j,
            Err(e) => {
                warn!("{:<12} --> 응답 직렬화 실패: {:?}", "Router", e);
                return;
            }
        };
        let inner = self.inner.read().expect("router 잠금 오염");
        if let Some(tx) = inner.connections.get(&connection_id) {
            if tx.try_send(Message::Text(json)).is_err() {
                debug!(
                    "{:<12} --> 버퍼 포화로 응답 폐기: {}",
                    "Router", connection_id
                );
            }
        }
    }

    /// 경매 구독자 전원에게 브로드캐스트 (최선형, 비차단)
    pub fn broadcast(&self, auction_id: i64, msg: &ServerMessage) {
        let json = match serde_json::to_string(msg) {
            Ok(j) => j,
            Err(e) => {
                warn!("{:<12} --> 브로드캐스트 직렬화 실패: {:?}", "Router", e);
                return;
            }
        };
        let inner = self.inner.read().expect("router 잠금 오염");
        let Some(subs) = inner.subscribers.get(&auction_id) else {
            return;
        };
        for connection_id in subs {
            if let Some(tx) = inner.connections.get(connection_id) {
                if tx.try_send(Message::Text(json.clone())).is_err() {
                    debug!(
                        "{:<12} --> 느린 연결로의 전송 폐기: {}",
                        "Router", connection_id
                    );
                }
            }
        }
    }

    /// 현재 연결 수
    pub fn connection_count(&self) -> usize {
        self.inner.read().expect("router 잠금 오염").connections.len()
    }
}

impl Default for SubscriptionRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// 라우터를 통한 이벤트 발행: 해당 경매 구독자 전원에게 팬아웃
#[async_trait]
impl EventPublisher for SubscriptionRouter {
    async fn publish(&self, event: AuctionEvent) {
        let auction_id = event.auction_id();
        self.broadcast(auction_id, &ServerMessage::from_event(event));
    }
}

// endregion: --- Subscription Router

// endregion: --- Tests

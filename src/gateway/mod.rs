/// 세션 게이트웨이
/// 연결별 수명주기: 접속 -> (경매 참가)* -> 종료
/// 입찰 제출은 Arbiter로 전달하고 결과를 제출 연결에 직접 ack한다.
/// 승인 브로드캐스트는 제출자를 포함한 모든 구독자에게 같은 채널로 나간다.
// region:    --- Imports
use crate::bidding::commands::{handle_submit_bid, SubmitBidCommand};
use crate::broadcast::{ConnectionId, SubscriptionRouter, CONNECTION_BUFFER_SIZE};
use crate::gateway::protocol::{ClientMessage, ServerMessage};
use crate::registry::AuctionRegistry;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

// endregion: --- Imports

pub mod protocol;

// region:    --- WebSocket Handler

/// 연결 수립 파라미터: 세션 신원은 업그레이드 쿼리에서 온다
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub bidder: Option<String>,
}

/// WebSocket 업그레이드 처리
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State((registry, router)): State<(Arc<AuctionRegistry>, Arc<SubscriptionRouter>)>,
) -> impl IntoResponse {
    let bidder = params.bidder.unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, bidder, registry, router))
}

/// 연결 하나의 전체 수명주기 처리
async fn handle_socket(
    socket: WebSocket,
    bidder: String,
    registry: Arc<AuctionRegistry>,
    router: Arc<SubscriptionRouter>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let connection_id: ConnectionId = Uuid::new_v4();

    // 라우터가 채우는 연결별 유한 발신 버퍼
    let (tx, mut rx) = mpsc::channel::<Message>(CONNECTION_BUFFER_SIZE);
    router.register(connection_id, tx.clone());

    info!(
        "{:<12} --> 연결 수립 id: {}, 입찰자: {:?}",
        "Gateway", connection_id, bidder
    );

    // 발신 버퍼 -> 소켓 전달 태스크 (네트워크 쓰기는 잠금 밖에서만 일어난다)
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // keepalive 핑 주기
    let mut ping_interval = interval(Duration::from_secs(30));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            // 끊김이 심사를 취소하지 않는다: select 분기 본문은
                            // 완료까지 실행된 뒤에야 다음 소켓 이벤트를 본다
                            Ok(client_msg) => {
                                handle_client_message(
                                    &registry,
                                    &router,
                                    connection_id,
                                    &bidder,
                                    client_msg,
                                )
                                .await
                            }
                            // 잘못된 메시지는 기록만 하고 무시한다 (연결은 유지)
                            Err(e) => warn!(
                                "{:<12} --> 해석 불가 메시지 무시 id: {}, 오류: {}",
                                "Gateway", connection_id, e
                            ),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // ping/pong은 하위 계층이 응답하고, 바이너리는 받지 않는다
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(
                            "{:<12} --> 소켓 오류 id: {}, 오류: {:?}",
                            "Gateway", connection_id, e
                        );
                        break;
                    }
                }
            }
            _ = ping_interval.tick() => {
                // 버퍼가 잠시 가득하면 이번 핑만 건너뛴다. 연결 종료는 채널이 닫혔을 때뿐이다
                match tx.try_send(Message::Ping(Vec::new())) {
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                    _ => {}
                }
            }
        }
    }

    // 정리: 연결 상태를 버리기 전에 반드시 모든 구독을 해제한다
    router.unsubscribe_all(connection_id);
    send_task.abort();
    info!("{:<12} --> 연결 종료 id: {}", "Gateway", connection_id);
}

/// 해석된 클라이언트 메시지 하나 처리
async fn handle_client_message(
    registry: &Arc<AuctionRegistry>,
    router: &Arc<SubscriptionRouter>,
    connection_id: ConnectionId,
    bidder: &str,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::JoinAuction { auction_id } => {
            debug!(
                "{:<12} --> 경매 참가 id: {}, 경매: {}",
                "Gateway", connection_id, auction_id
            );
            router.subscribe(connection_id, auction_id);
        }
        ClientMessage::LeaveAuction { auction_id } => {
            debug!(
                "{:<12} --> 경매 이탈 id: {}, 경매: {}",
                "Gateway", connection_id, auction_id
            );
            router.unsubscribe(connection_id, auction_id);
        }
        ClientMessage::SubmitBid { auction_id, amount } => {
            let cmd = SubmitBidCommand {
                auction_id,
                bidder: bidder.to_string(),
                amount,
            };
            // 승인 브로드캐스트는 Arbiter가 발행하고, 여기서는 제출자에게만 ack한다
            match handle_submit_bid(cmd, router.as_ref(), registry).await {
                Ok(bid) => router.send_to(connection_id, &ServerMessage::BidAccepted { bid }),
                Err(rejection) => router.send_to(
                    connection_id,
                    &ServerMessage::bid_rejected(auction_id, &rejection),
                ),
            }
        }
    }
}

// endregion: --- WebSocket Handler

// ============================================================================
// WebSocket Server
// Accept loop, health route and per-connection sessions
// ============================================================================

use chrono::Utc;
use crossbeam::channel::RecvTimeoutError;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace, warn};

use super::config::TransportConfig;
use super::hub::{BroadcastHub, Frame};
use super::wire::{self, OutboundMessage};
use crate::engine::MatchingEngine;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Bytes peeked to find the request line
const REQUEST_PEEK_BYTES: usize = 512;

/// Plain HTTP requests with larger heads are cut off
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Direct replies (rejections) buffered per connection
const REPLY_CAPACITY: usize = 16;

const BRIDGE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    WebSocket,
    NotFound,
}

/// Accept connections until `shutdown` resolves.
///
/// Sessions already running keep going after this returns; they end when
/// their clients disconnect or the runtime shuts down.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<MatchingEngine>,
    hub: Arc<BroadcastHub>,
    config: Arc<TransportConfig>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, no longer accepting connections");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let engine = Arc::clone(&engine);
                    let hub = Arc::clone(&hub);
                    let config = Arc::clone(&config);
                    tokio::spawn(async move {
                        handle_connection(stream, peer, engine, hub, config).await;
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<MatchingEngine>,
    hub: Arc<BroadcastHub>,
    config: Arc<TransportConfig>,
) {
    let route = match timeout(config.read_timeout, route(&stream, &config)).await {
        Ok(Ok(route)) => route,
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "failed to read request");
            return;
        }
        Err(_) => {
            debug!(%peer, "no request before read deadline");
            return;
        }
    };

    match route {
        Route::Health => {
            discard_request(&mut stream, config.read_timeout).await;
            write_plain(&mut stream, "200 OK", "OK").await;
        }
        Route::NotFound => {
            discard_request(&mut stream, config.read_timeout).await;
            write_plain(&mut stream, "404 Not Found", "not found").await;
        }
        Route::WebSocket => match tokio_tungstenite::accept_async_with_config(
            stream,
            Some(websocket_config(&config)),
        )
        .await
        {
            Ok(ws) => {
                info!(%peer, "session opened");
                run_session(ws, peer, engine, hub, config).await;
                info!(%peer, "session closed");
            }
            Err(e) => warn!(%peer, error = %e, "websocket upgrade failed"),
        },
    }
}

/// Frames and messages over `max_message_bytes` fail the read before they
/// are buffered in full.
fn websocket_config(config: &TransportConfig) -> WebSocketConfig {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_bytes);
    ws_config.max_frame_size = Some(config.max_message_bytes);
    ws_config
}

async fn route(stream: &TcpStream, config: &TransportConfig) -> std::io::Result<Route> {
    let mut buf = [0u8; REQUEST_PEEK_BYTES];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(Route::NotFound);
        }
        let head = &buf[..n];
        if head.contains(&b'\n') || n == buf.len() {
            let head = String::from_utf8_lossy(head);
            return Ok(match request_path(&head) {
                Some(path) if path == config.health_path => Route::Health,
                Some(path) if path == config.ws_path => Route::WebSocket,
                _ => Route::NotFound,
            });
        }
        // Request line not complete yet
        sleep(Duration::from_millis(5)).await;
    }
}

/// Path of an HTTP request line, without the query string.
fn request_path(head: &str) -> Option<&str> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    target.split('?').next()
}

/// Read up to the end of the request headers so closing the socket does
/// not reset the connection under an unread request.
async fn discard_request(stream: &mut TcpStream, deadline: Duration) {
    let mut head = Vec::with_capacity(REQUEST_PEEK_BYTES);
    let mut buf = [0u8; REQUEST_PEEK_BYTES];
    let read_headers = async {
        while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => head.extend_from_slice(&buf[..n]),
            }
        }
    };
    let _ = timeout(deadline, read_headers).await;
}

async fn write_plain(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "failed to write plain response");
    }
    let _ = stream.shutdown().await;
}

// ============================================================================
// Session
// ============================================================================

async fn run_session(
    ws: WebSocketStream<TcpStream>,
    peer: SocketAddr,
    engine: Arc<MatchingEngine>,
    hub: Arc<BroadcastHub>,
    config: Arc<TransportConfig>,
) {
    let subscription = hub.subscribe();
    let subscriber = subscription.id;
    let (sink, mut stream) = ws.split();

    let (feed_tx, feed_rx) = mpsc::channel::<Frame>(config.hub.subscriber_capacity);
    let (reply_tx, reply_rx) = mpsc::channel::<String>(REPLY_CAPACITY);

    // Hub feeds are crossbeam channels; move them onto the runtime here.
    let receiver = subscription.receiver;
    let bridge = tokio::task::spawn_blocking(move || loop {
        match receiver.recv_timeout(BRIDGE_POLL) {
            Ok(frame) => {
                if feed_tx.blocking_send(frame).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if feed_tx.is_closed() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    });

    let writer = tokio::spawn(write_loop(sink, feed_rx, reply_rx, Arc::clone(&config)));

    read_loop(&mut stream, peer, &engine, &reply_tx, &config).await;

    hub.unsubscribe(subscriber);
    drop(reply_tx);
    if let Err(e) = bridge.await {
        error!(%peer, error = %e, "feed bridge failed");
    }
    if let Err(e) = writer.await {
        error!(%peer, error = %e, "writer task failed");
    }
}

async fn read_loop(
    stream: &mut WsStream,
    peer: SocketAddr,
    engine: &MatchingEngine,
    replies: &mpsc::Sender<String>,
    config: &TransportConfig,
) {
    loop {
        let next = tokio::select! {
            _ = replies.closed() => {
                debug!(%peer, "writer stopped, closing session");
                return;
            }
            next = timeout(config.read_timeout, stream.next()) => next,
        };

        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(WsError::Capacity(e)))) => {
                warn!(%peer, error = %e, limit = config.max_message_bytes, "message too large");
                return;
            }
            Ok(Some(Err(e))) => {
                debug!(%peer, error = %e, "read failed");
                return;
            }
            Ok(None) => return,
            Err(_) => {
                info!(%peer, "read deadline exceeded");
                return;
            }
        };

        match message {
            Message::Text(text) => {
                if text.len() > config.max_message_bytes {
                    warn!(%peer, len = text.len(), limit = config.max_message_bytes, "message too large");
                    return;
                }
                handle_text(&text, peer, engine, replies);
            }
            Message::Close(_) => return,
            Message::Binary(_) => debug!(%peer, "ignoring binary frame"),
            _ => {}
        }
    }
}

fn handle_text(text: &str, peer: SocketAddr, engine: &MatchingEngine, replies: &mpsc::Sender<String>) {
    let mut order = match wire::decode_inbound(text) {
        Ok(Some(order)) => order,
        Ok(None) => {
            trace!(%peer, "ignoring message type");
            return;
        }
        Err(e) => {
            warn!(%peer, error = %e, "invalid message format");
            return;
        }
    };

    order.timestamp = Some(Utc::now());
    let order_id = order.id.clone();

    match engine.submit(order) {
        Ok(report) => debug!(
            %peer,
            order_id = %order_id,
            status = ?report.status(),
            matches = report.matches.len(),
            "order submitted"
        ),
        Err(reason) => match wire::encode(&OutboundMessage::rejected(order_id, &reason)) {
            Ok(json) => {
                if replies.try_send(json).is_err() {
                    debug!(%peer, "rejection reply dropped");
                }
            }
            Err(e) => error!(%peer, error = %e, "failed to encode rejection"),
        },
    }
}

async fn write_loop(
    mut sink: WsSink,
    mut feed: mpsc::Receiver<Frame>,
    mut replies: mpsc::Receiver<String>,
    config: Arc<TransportConfig>,
) {
    let mut ping = interval(config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ping.tick().await;

    loop {
        let message = tokio::select! {
            frame = feed.recv() => match frame {
                Some(frame) => Message::Text(frame.to_string()),
                None => {
                    send(&mut sink, Message::Close(None), config.write_timeout).await;
                    return;
                }
            },
            Some(reply) = replies.recv() => Message::Text(reply),
            _ = ping.tick() => Message::Ping(Vec::new()),
        };

        if !send(&mut sink, message, config.write_timeout).await {
            return;
        }
    }
}

async fn send(sink: &mut WsSink, message: Message, deadline: Duration) -> bool {
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "write failed");
            false
        }
        Err(_) => {
            debug!("write deadline exceeded");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookConfig, NewOrder, Side};
    use crate::transport::wire::InboundMessage;
    use rust_decimal::Decimal;
    use serde_json::Value;

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("GET /ws HTTP/1.1\r\nHost: x\r\n"), Some("/ws"));
        assert_eq!(request_path("GET /healthz?probe=1 HTTP/1.1\r\n"), Some("/healthz"));
        assert_eq!(request_path("garbage"), None);
        assert_eq!(request_path(""), None);
    }

    #[test]
    fn test_websocket_limits_follow_config() {
        let config = TransportConfig {
            max_message_bytes: 1024,
            ..TransportConfig::default()
        };
        let ws_config = websocket_config(&config);
        assert_eq!(ws_config.max_message_size, Some(1024));
        assert_eq!(ws_config.max_frame_size, Some(1024));
    }

    async fn start() -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let (hub, _worker) = BroadcastHub::start(&Default::default()).unwrap();
        let engine = Arc::new(MatchingEngine::new(BookConfig::new("TEST"), hub.clone()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let config = Arc::new(TransportConfig::default());
        tokio::spawn(serve(listener, engine, hub, config, async move {
            let _ = stop_rx.await;
        }));
        (addr, stop_tx)
    }

    #[tokio::test]
    async fn test_health_route() {
        let (addr, _stop) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("OK"));
    }

    #[tokio::test]
    async fn test_orders_over_websocket() {
        let (addr, _stop) = start().await;
        let url = format!("ws://{addr}/ws");
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let submit = |order: NewOrder| {
            let message = InboundMessage::new_order(&order).unwrap();
            Message::Text(serde_json::to_string(&message).unwrap())
        };

        ws.send(submit(NewOrder::limit("s1", Side::Sell, Decimal::from(100), Decimal::ONE)))
            .await
            .unwrap();
        ws.send(submit(NewOrder::limit("b1", Side::Buy, Decimal::from(105), Decimal::ONE)))
            .await
            .unwrap();
        ws.send(submit(NewOrder::new("", "limit", "buy", Decimal::ONE, Decimal::ONE)))
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while kinds.len() < 3 {
            let frame = timeout(Duration::from_secs(5), ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(&text).unwrap();
                kinds.push(value["type"].as_str().unwrap().to_string());
            }
        }
        // Rejections bypass the hub, so only broadcast order is fixed
        let broadcast: Vec<&str> = kinds
            .iter()
            .map(String::as_str)
            .filter(|kind| *kind != "order_rejected")
            .collect();
        assert_eq!(broadcast, vec!["order_added", "match"]);
        assert!(kinds.iter().any(|kind| kind == "order_rejected"));
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_session() {
        let (addr, _stop) = start().await;
        let url = format!("ws://{addr}/ws");
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let limit = TransportConfig::default().max_message_bytes;
        let oversized = format!(
            r#"{{"type":"new_order","payload":{{"ID":"{}"}}}}"#,
            "x".repeat(limit * 4)
        );
        // The server may already be gone by the time the write completes
        let _ = ws.send(Message::Text(oversized)).await;

        let closed = timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(matches!(closed, Ok(true)), "session stayed open");
    }
}

//! WebSocket connection lifecycle with linear reconnect backoff.
//!
//! A [`Link`] owns one background task running the
//! `Connecting → Open → Closing → Closed` state machine. Inbound text
//! frames and open/closed edges are delivered as [`LinkEvent`]s over an
//! mpsc channel; outbound messages are transmitted only while `Open`
//! (fire-and-drop, no queue).
//!
//! Reconnect policy: after a close or transport error the task waits
//! `(1 + attempt)` seconds, incrementing `attempt` per failed cycle up to
//! 299 (so the delay caps at 300s). `attempt` resets to 0 only on a
//! successful open. Clean and abnormal closure take the same path.
//!
//! Visibility gating: the embedder supplies a `watch::Receiver<bool>`
//! (true = surface visible). A transition to hidden while connecting or
//! open closes the socket with a normal-closure frame and parks the task;
//! while hidden, no reconnect is scheduled. A transition back to visible
//! while closed reconnects immediately.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::LinkError;
use crate::message::ClientMessage;

/// Reconnect attempts increment up to this ceiling, capping the delay
/// at 300s.
pub const MAX_RECONNECT_ATTEMPT: u32 = 299;

/// Interval of the `last_seen` poll while connected.
pub const LAST_SEEN_POLL: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Public surface ───────────────────────────────────────────────────

/// Connection state, observable through a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events delivered to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection opened. The `last_seen` poll has already been issued.
    Opened,
    /// The connection closed (clean or not).
    Closed,
    /// An inbound text frame.
    Frame(String),
}

/// Handle to a running connection task.
pub struct Link {
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
    state_rx: watch::Receiver<LinkState>,
    cancel: CancellationToken,
}

impl Link {
    /// Spawn the connection task. Returns the handle and the inbound
    /// event receiver.
    pub fn spawn(
        ws_url: Url,
        visibility: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);

        tokio::spawn(link_loop(
            ws_url,
            event_tx,
            outbound_rx,
            state_tx,
            visibility,
            cancel.clone(),
        ));

        (
            Self {
                outbound_tx,
                state_rx,
                cancel,
            },
            event_rx,
        )
    }

    /// Transmit a message if the connection is `Open`, otherwise drop it.
    /// Fire-and-drop is the documented contract: there is no outbound queue.
    pub fn send(&self, msg: ClientMessage) {
        if *self.state_rx.borrow() == LinkState::Open {
            let _ = self.outbound_tx.send(msg);
        } else {
            trace!("dropping outbound message while not open");
        }
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Delay before reconnect attempt number `attempt` (0-based): 1s, 2s, ...
/// capped at 300s.
pub fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 + u64::from(attempt.min(MAX_RECONNECT_ATTEMPT)))
}

// ── Background loop ──────────────────────────────────────────────────

enum OpenOutcome {
    /// Shutdown requested.
    Cancelled,
    /// Closed because the surface went hidden; park, no backoff.
    Hidden,
    /// Connection dropped (close frame, stream end, or error).
    Dropped,
}

async fn link_loop(
    url: Url,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    state_tx: watch::Sender<LinkState>,
    mut visibility: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        // Park while hidden: no connection attempts, no scheduled reconnect.
        if !*visibility.borrow() {
            let _ = state_tx.send(LinkState::Closed);
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = visibility.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        let _ = state_tx.send(LinkState::Connecting);
        info!(url = %url, "connecting");

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect(&url) => result,
        };

        match connected {
            Ok(ws) => {
                attempt = 0;
                drain_stale(&mut outbound_rx);
                let _ = state_tx.send(LinkState::Open);
                let _ = event_tx.send(LinkEvent::Opened);
                info!("connected");

                let outcome = drive_open(
                    ws,
                    &event_tx,
                    &mut outbound_rx,
                    &state_tx,
                    &mut visibility,
                    &cancel,
                )
                .await;

                let _ = state_tx.send(LinkState::Closed);
                let _ = event_tx.send(LinkEvent::Closed);

                match outcome {
                    OpenOutcome::Cancelled => break,
                    OpenOutcome::Hidden => continue,
                    OpenOutcome::Dropped => {}
                }
            }
            Err(e) => {
                warn!(error = %e, attempt, "connect failed");
                let _ = state_tx.send(LinkState::Closed);
            }
        }

        // Backoff path, shared by connect failures and drops.
        if !*visibility.borrow() {
            continue;
        }
        let delay = reconnect_delay(attempt);
        debug!(delay_secs = delay.as_secs(), attempt, "waiting before reconnect");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            // A visibility flip cancels the scheduled reconnect; the loop
            // top either parks (hidden) or connects immediately (visible).
            changed = visibility.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            () = tokio::time::sleep(delay) => {}
        }
        attempt = (attempt + 1).min(MAX_RECONNECT_ATTEMPT);
    }

    debug!("link loop exiting");
}

async fn connect(url: &Url) -> Result<WsStream, LinkError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    Ok(ws)
}

/// Drive one open connection until it drops, is closed by a hidden
/// transition, or shutdown is requested.
async fn drive_open(
    mut ws: WsStream,
    event_tx: &mpsc::UnboundedSender<LinkEvent>,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    state_tx: &watch::Sender<LinkState>,
    visibility: &mut watch::Receiver<bool>,
    cancel: &CancellationToken,
) -> OpenOutcome {
    // First tick fires immediately: the poll request goes out on open,
    // then every 30s. Dropping the interval on close cancels the poll.
    let mut poll = tokio::time::interval(LAST_SEEN_POLL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut outbound_open = true;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = state_tx.send(LinkState::Closing);
                let _ = ws.close(None).await;
                return OpenOutcome::Cancelled;
            }
            changed = visibility.changed() => {
                if changed.is_err() || !*visibility.borrow() {
                    debug!("surface hidden, closing connection");
                    let _ = state_tx.send(LinkState::Closing);
                    // Normal closure; no reconnect until visible again.
                    let _ = ws.close(None).await;
                    return OpenOutcome::Hidden;
                }
            }
            _ = poll.tick() => {
                send_frame(&mut ws, &ClientMessage::LastSeen {}).await;
            }
            msg = outbound_rx.recv(), if outbound_open => {
                match msg {
                    Some(msg) => send_frame(&mut ws, &msg).await,
                    // All senders gone; stop polling this arm.
                    None => outbound_open = false,
                }
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(LinkEvent::Frame(text.to_string()));
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite replies with pong automatically
                        trace!("ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            debug!(code = %cf.code, reason = %cf.reason, "close frame");
                        }
                        return OpenOutcome::Dropped;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "transport error");
                        return OpenOutcome::Dropped;
                    }
                    None => {
                        debug!("stream ended");
                        return OpenOutcome::Dropped;
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

async fn send_frame(ws: &mut WsStream, msg: &ClientMessage) {
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "outbound serialization failed");
            return;
        }
    };
    if let Err(e) = ws.send(Message::Text(text.into())).await {
        // The read side of the select will observe the failure and
        // route into the backoff path.
        warn!(error = %e, "send failed");
    }
}

/// Discard messages enqueued while the connection was not open, honoring
/// the fire-and-drop contract across reconnects.
fn drain_stale(outbound_rx: &mut mpsc::UnboundedReceiver<ClientMessage>) {
    let mut dropped = 0usize;
    while outbound_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "discarded stale outbound messages on reconnect");
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_is_linear_from_one_second() {
        assert_eq!(reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(reconnect_delay(2), Duration::from_secs(3));
        assert_eq!(reconnect_delay(59), Duration::from_secs(60));
    }

    #[test]
    fn reconnect_delay_caps_at_five_minutes() {
        assert_eq!(reconnect_delay(299), Duration::from_secs(300));
        assert_eq!(reconnect_delay(300), Duration::from_secs(300));
        assert_eq!(reconnect_delay(u32::MAX), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn drain_discards_everything_queued() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ClientMessage::GetTimers {}).unwrap();
        tx.send(ClientMessage::LastSeen {}).unwrap();
        drain_stale(&mut rx);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_failure_surfaces_transport_error() {
        // Port 9 (discard) is not listening; the attempt is refused.
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let err = connect(&url).await.unwrap_err();
        assert!(matches!(err, LinkError::Connect(_)));
    }

    #[tokio::test]
    async fn send_drops_while_not_open() {
        let (_vis_tx, vis_rx) = watch::channel(true);
        let cancel = CancellationToken::new();
        // Port 9 (discard) is not listening; the link stays in
        // Connecting/Closed and must drop sends on the floor.
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let (link, _events) = Link::spawn(url, vis_rx, cancel.clone());

        assert_ne!(*link.state().borrow(), LinkState::Open);
        link.send(ClientMessage::GetTimers {});
        link.shutdown();
    }
}

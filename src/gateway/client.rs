use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::payload::{event, id_field, opcode, ConnectionProperties, GatewayPayload, Identify, MediaJoin};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<AsyncMutex<SplitSink<WsStream, Message>>>;
type WsSource = SplitStream<WsStream>;

/// Control-plane session state. Transitions are strictly ordered; the only
/// shortcut is `disconnect()`, which returns to `Disconnected` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    AwaitingHello,
    Identifying,
    AwaitingReady,
    NegotiatingMedia,
    Connected,
}

/// Media-transport parameters negotiated over the control plane.
#[derive(Debug, Clone)]
pub struct MediaParams {
    pub endpoint: String,
    pub secret: String,
}

/// The live voice session owned by a `GatewayClient`.
#[derive(Debug)]
pub struct VoiceSession {
    pub server_id: u64,
    pub channel_id: u64,
    pub state: SessionState,
    pub last_sequence: Option<u64>,
    pub media: Option<MediaParams>,
}

/// Lifecycle notifications delivered to the owner. The owner decides what
/// to do about a disconnect; the client never reconnects on its own.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The platform confirmed this client's own voice state; media is live.
    Connected,
    /// The platform assigned (or moved) the media endpoint.
    MediaUpdate(MediaParams),
    /// The control connection is gone, or this client left voice.
    Disconnected { reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
    pub server_id: u64,
    pub channel_id: u64,
    pub self_mute: bool,
    pub self_deaf: bool,
}

/// Client for the voice platform's control-plane protocol: handshake,
/// heartbeats, and voice session negotiation. Owns its `VoiceSession` and
/// both background tasks exclusively.
pub struct GatewayClient {
    config: GatewayConfig,
    session: Arc<Mutex<VoiceSession>>,
    sink: Option<WsSink>,
    heartbeat_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<GatewayEvent>,
    user_id: Option<u64>,
}

fn lock(session: &Mutex<VoiceSession>) -> MutexGuard<'_, VoiceSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// First heartbeat is delayed by a uniform draw from `[0, interval)` so a
/// fleet of clients reconnecting together doesn't beat in lockstep.
pub(crate) fn first_heartbeat_delay(interval: Duration) -> Duration {
    interval.mul_f64(rand::random::<f64>())
}

impl GatewayClient {
    /// Create a client and the receiving end of its lifecycle events.
    pub fn new(config: GatewayConfig) -> (Self, mpsc::Receiver<GatewayEvent>) {
        let (events_tx, events_rx) = mpsc::channel(32);
        let session = Arc::new(Mutex::new(VoiceSession {
            server_id: config.server_id,
            channel_id: config.channel_id,
            state: SessionState::Disconnected,
            last_sequence: None,
            media: None,
        }));

        let client = Self {
            config,
            session,
            sink: None,
            heartbeat_task: None,
            event_task: None,
            events_tx,
            user_id: None,
        };

        (client, events_rx)
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state
    }

    pub fn last_sequence(&self) -> Option<u64> {
        lock(&self.session).last_sequence
    }

    /// Media endpoint/secret once `VOICE_SERVER_UPDATE` has arrived.
    pub fn media_params(&self) -> Result<MediaParams> {
        lock(&self.session).media.clone().ok_or_else(|| {
            Error::Precondition("media parameters have not been negotiated yet".into())
        })
    }

    /// Open the control socket and drive the handshake:
    /// Hello -> heartbeats -> Identify -> Ready -> event task -> media join.
    ///
    /// Any message out of that order is a fatal protocol error and no
    /// partial session is left behind. On success the session is in
    /// `NegotiatingMedia`; the `Connected` transition arrives via events.
    pub async fn connect(&mut self) -> Result<()> {
        {
            let mut session = lock(&self.session);
            if session.state != SessionState::Disconnected {
                return Err(Error::Precondition(format!(
                    "connect() called in state {:?}",
                    session.state
                )));
            }
            session.state = SessionState::AwaitingHello;
        }

        info!("Connecting to gateway at {}", self.config.url);

        let (ws, _) = match connect_async(self.config.url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                lock(&self.session).state = SessionState::Disconnected;
                return Err(e.into());
            }
        };
        let (sink, mut source) = ws.split();
        let sink: WsSink = Arc::new(AsyncMutex::new(sink));
        self.sink = Some(Arc::clone(&sink));

        // The very first message must be Hello
        let hello = match next_payload(&mut source).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.fail_handshake(e).await),
        };
        if hello.op != opcode::HELLO {
            return Err(self
                .fail_handshake(Error::Protocol(format!(
                    "expected hello (op {}), got op {}",
                    opcode::HELLO,
                    hello.op
                )))
                .await);
        }
        let heartbeat_interval = match hello.d.get("heartbeat_interval").and_then(|v| v.as_u64()) {
            Some(ms) => Duration::from_millis(ms),
            None => {
                return Err(self
                    .fail_handshake(Error::Protocol(
                        "hello payload is missing heartbeat_interval".into(),
                    ))
                    .await)
            }
        };
        debug!("Hello received, heartbeat interval {:?}", heartbeat_interval);

        self.heartbeat_task = Some(tokio::spawn(heartbeat_loop(
            Arc::clone(&sink),
            Arc::clone(&self.session),
            heartbeat_interval,
        )));

        lock(&self.session).state = SessionState::Identifying;
        let identify = Identify {
            token: self.config.token.clone(),
            intents: self.config.intents,
            properties: self.config.properties.clone(),
        };
        if let Err(e) = send_payload(&sink, &GatewayPayload::identify(&identify)?).await {
            return Err(self.fail_handshake(e).await);
        }

        lock(&self.session).state = SessionState::AwaitingReady;
        let ready = match next_payload(&mut source).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.fail_handshake(e).await),
        };
        if ready.op != opcode::DISPATCH || ready.t.as_deref() != Some(event::READY) {
            return Err(self
                .fail_handshake(Error::Protocol(format!(
                    "expected ready dispatch, got op {} ({:?})",
                    ready.op, ready.t
                )))
                .await);
        }
        if let Some(seq) = ready.s {
            lock(&self.session).last_sequence = Some(seq);
        }
        self.user_id = ready
            .d
            .get("user")
            .and_then(|user| id_field(user, "id"));
        info!("Gateway session ready (user {:?})", self.user_id);

        // Ready consumed; the event task owns the read half from here on
        self.event_task = Some(tokio::spawn(event_loop(
            source,
            Arc::clone(&sink),
            Arc::clone(&self.session),
            self.user_id,
            self.events_tx.clone(),
        )));

        lock(&self.session).state = SessionState::NegotiatingMedia;
        let join = MediaJoin {
            server_id: self.config.server_id,
            channel_id: self.config.channel_id,
            self_mute: self.config.self_mute,
            self_deaf: self.config.self_deaf,
        };
        if let Err(e) = send_payload(&sink, &GatewayPayload::media_join(&join)?).await {
            return Err(self.fail_handshake(e).await);
        }

        info!(
            "Media join requested for server {} channel {}",
            self.config.server_id, self.config.channel_id
        );

        Ok(())
    }

    /// Tear down a half-open handshake so no partial session stays usable.
    async fn fail_handshake(&mut self, cause: Error) -> Error {
        warn!("Handshake failed: {}", cause);
        // forced: the heartbeat task and socket may already exist
        let _ = self.disconnect(true).await;
        cause
    }

    /// Cancel both background tasks, close the control socket and return to
    /// `Disconnected`. No-op when already disconnected unless `force` is
    /// set. Safe to call repeatedly and on a partially-initialized client.
    pub async fn disconnect(&mut self, force: bool) -> Result<()> {
        if !force && self.state() == SessionState::Disconnected {
            return Ok(());
        }

        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
        if let Some(task) = self.event_task.take() {
            task.abort();
        }

        if let Some(sink) = self.sink.take() {
            // best-effort close frame; the socket may already be gone
            let _ = sink.lock().await.send(Message::Close(None)).await;
        }

        let mut session = lock(&self.session);
        session.state = SessionState::Disconnected;
        session.media = None;

        info!("Gateway client disconnected");
        Ok(())
    }
}

async fn send_payload(sink: &WsSink, payload: &GatewayPayload) -> Result<()> {
    let json = payload.to_json()?;
    sink.lock().await.send(Message::Text(json)).await?;
    Ok(())
}

/// Read the next JSON payload during the handshake, when message order is
/// load-bearing. Non-text frames are skipped; a closed socket is fatal.
async fn next_payload(source: &mut WsSource) -> Result<GatewayPayload> {
    while let Some(msg) = source.next().await {
        match msg? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => {
                return Err(Error::Protocol(
                    "gateway closed the connection during handshake".into(),
                ))
            }
            _ => continue,
        }
    }
    Err(Error::Protocol(
        "gateway stream ended during handshake".into(),
    ))
}

/// Send one heartbeat after a jittered delay, then one every `interval`.
/// Failures are logged and never escalated; a dead socket surfaces through
/// the event task instead.
async fn heartbeat_loop(sink: WsSink, session: Arc<Mutex<VoiceSession>>, interval: Duration) {
    tokio::time::sleep(first_heartbeat_delay(interval)).await;

    loop {
        let payload = GatewayPayload::heartbeat(lock(&session).last_sequence);
        if let Err(e) = send_payload(&sink, &payload).await {
            warn!("Heartbeat send failed: {}", e);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Parse incoming messages by opcode and route dispatch events. Only this
/// client's own voice-state changes affect the session lifecycle.
async fn event_loop(
    mut source: WsSource,
    sink: WsSink,
    session: Arc<Mutex<VoiceSession>>,
    user_id: Option<u64>,
    events: mpsc::Sender<GatewayEvent>,
) {
    while let Some(msg) = source.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                let _ = events
                    .send(GatewayEvent::Disconnected { reason: e.to_string() })
                    .await;
                return;
            }
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => {
                let _ = events
                    .send(GatewayEvent::Disconnected {
                        reason: "gateway closed the connection".into(),
                    })
                    .await;
                return;
            }
            _ => continue,
        };

        let payload: GatewayPayload = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Discarding unparseable gateway message: {}", e);
                continue;
            }
        };

        match payload.op {
            opcode::DISPATCH => {
                if let Some(seq) = payload.s {
                    lock(&session).last_sequence = Some(seq);
                }
                match payload.t.as_deref() {
                    Some(event::GUILD_CREATE) => {
                        let name = payload.d.get("name").and_then(|v| v.as_str());
                        info!("Joined server '{}'", name.unwrap_or("?"));
                    }
                    Some(event::VOICE_STATE_UPDATE) => {
                        // other participants' voice states never drive our lifecycle
                        if user_id.is_none() || id_field(&payload.d, "user_id") != user_id {
                            debug!("Ignoring voice state update for another participant");
                            continue;
                        }
                        let in_channel = payload
                            .d
                            .get("channel_id")
                            .map(|v| !v.is_null())
                            .unwrap_or(false);
                        if in_channel {
                            lock(&session).state = SessionState::Connected;
                            info!("Voice state confirmed; session connected");
                            let _ = events.send(GatewayEvent::Connected).await;
                        } else {
                            let _ = events
                                .send(GatewayEvent::Disconnected {
                                    reason: "client left the voice channel".into(),
                                })
                                .await;
                            return;
                        }
                    }
                    Some(event::VOICE_SERVER_UPDATE) => {
                        let endpoint = payload.d.get("endpoint").and_then(|v| v.as_str());
                        let secret = payload.d.get("token").and_then(|v| v.as_str());
                        if let (Some(endpoint), Some(secret)) = (endpoint, secret) {
                            let params = MediaParams {
                                endpoint: endpoint.to_string(),
                                secret: secret.to_string(),
                            };
                            lock(&session).media = Some(params.clone());
                            info!("Media endpoint assigned: {}", params.endpoint);
                            let _ = events.send(GatewayEvent::MediaUpdate(params)).await;
                        } else {
                            warn!("Voice server update missing endpoint or token");
                        }
                    }
                    other => debug!("Unhandled dispatch event {:?}", other),
                }
            }
            // the platform asked for an immediate beat
            opcode::HEARTBEAT => {
                let payload = GatewayPayload::heartbeat(lock(&session).last_sequence);
                if let Err(e) = send_payload(&sink, &payload).await {
                    warn!("Requested heartbeat send failed: {}", e);
                }
            }
            opcode::HEARTBEAT_ACK => {
                // logged only; acks never drive staleness detection
                debug!("Heartbeat ack received");
            }
            other => debug!("Unhandled gateway opcode {}", other),
        }
    }

    let _ = events
        .send(GatewayEvent::Disconnected {
            reason: "gateway stream ended".into(),
        })
        .await;
}

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SensorError, ServerError};
use crate::input::{AccelerationSample, SharedInput};
use crate::physics::PlaneAnchor;
use crate::sensor;
use crate::sim::{WorldEvent, WorldSender};
use crate::spawn::CameraPose;
use crate::state::{ServerMessage, SharedGameState};

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Accel { x: f32, y: f32 },
    AccelError { message: String },
    SensorUnavailable,
    TouchBegin { count: u32 },
    TouchEnd,
    Spawn { camera: CameraPose },
    PlaneAdded { id: String, center: [f32; 3], extent: [f32; 2] },
    PlaneUpdated { id: String, center: [f32; 3], extent: [f32; 2] },
    PlaneRemoved { id: String },
    Ping,
}

impl ClientMessage {
    pub fn from_json(txt: &str) -> Result<Self, ServerError> {
        Ok(serde_json::from_str(txt)?)
    }
}

/// Everything a connection task needs to reach the rest of the server.
#[derive(Clone)]
pub struct Hub {
    pub state: Arc<Mutex<SharedGameState>>,
    pub input: SharedInput,
    pub world: WorldSender,
    pub sensor_hz: u32,
}

impl Hub {
    /// Route one parsed frame. Returns an immediate reply, if any.
    pub async fn handle(&self, client: Uuid, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Accel { x, y } => {
                let mut input = self.input.lock().await;
                sensor::deliver(&mut input, Ok(AccelerationSample { x, y }));
            }
            ClientMessage::AccelError { message } => {
                let mut input = self.input.lock().await;
                sensor::deliver(&mut input, Err(SensorError::Callback(message)));
            }
            ClientMessage::SensorUnavailable => {
                let mut input = self.input.lock().await;
                sensor::deliver(&mut input, Err(SensorError::Unavailable));
            }
            ClientMessage::TouchBegin { count } => {
                self.input.lock().await.on_touch_begin(count);
            }
            ClientMessage::TouchEnd => {
                self.input.lock().await.on_touch_end();
            }
            ClientMessage::Spawn { camera } => {
                self.send_world(WorldEvent::Spawn { client, camera });
            }
            ClientMessage::PlaneAdded { id, center, extent } => {
                let anchor = PlaneAnchor { center, extent };
                self.send_world(WorldEvent::PlaneAdded { id, anchor });
            }
            ClientMessage::PlaneUpdated { id, center, extent } => {
                let anchor = PlaneAnchor { center, extent };
                self.send_world(WorldEvent::PlaneUpdated { id, anchor });
            }
            ClientMessage::PlaneRemoved { id } => {
                self.send_world(WorldEvent::PlaneRemoved { id });
            }
            ClientMessage::Ping => return Some(ServerMessage::Pong),
        }
        None
    }

    pub fn welcome(&self, client: Uuid) -> ServerMessage {
        ServerMessage::Welcome { client_id: client, sensor_hz: self.sensor_hz }
    }

    /// Forget the client. Its fingers are gone too.
    pub async fn disconnect(&self, client: Uuid) {
        info!("client disconnected: {}", client);
        self.state.lock().await.remove_client(&client);
        self.input.lock().await.on_touch_end();
    }

    fn send_world(&self, event: WorldEvent) {
        if self.world.send(event).is_err() {
            warn!("tick loop has stopped; dropping world event");
        }
    }
}

pub async fn start_websocket_server(bind: &str, hub: Hub) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind).await.map_err(|source| ServerError::Bind {
        addr: bind.to_string(),
        source,
    })?;

    info!("websocket listening on ws://{}", bind);

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };
        let hub = hub.clone();

        tokio::spawn(async move {
            if let Err(err) = serve_client(raw, hub).await {
                warn!("connection from {} ended: {err}", peer);
            }
        });
    }
}

async fn serve_client(raw: TcpStream, hub: Hub) -> Result<(), ServerError> {
    let ws = accept_async(raw).await?;
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client = Uuid::new_v4();
    hub.state.lock().await.register_client(client, tx.clone());

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    info!("client connected: {}", client);
    if let Some(welcome) = hub.welcome(client).to_json() {
        let _ = tx.send(welcome);
    }

    // -------------------------------
    // 2) Main receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else { continue };

        let parsed = match ClientMessage::from_json(text) {
            Ok(v) => v,
            Err(err) => {
                debug!("{}: {err}", client);
                continue;
            }
        };

        if let Some(reply) = hub.handle(client, parsed).await {
            if let Some(json) = reply.to_json() {
                let _ = tx.send(json);
            }
        }
    }

    hub.disconnect(client).await;
    Ok(())
}

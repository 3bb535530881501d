use std::collections::HashMap;

use rapier3d::prelude::RigidBodySet;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use uuid::Uuid;

use crate::controller::VehicleRig;
use crate::input::ControlSnapshot;
use crate::sim::SpawnReport;
use crate::vehicle::WheelRole;

#[derive(Debug, Serialize)]
pub struct WheelSnapshot {
    pub role: WheelRole,
    pub steering: f32,
    pub engine_force: f32,
    pub brake: f32,
}

#[derive(Debug, Serialize)]
pub struct VehicleSnapshot {
    pub id: u64,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion x, y, z, w
    pub wheels: Vec<WheelSnapshot>,
}

impl VehicleSnapshot {
    pub fn capture(rig: &VehicleRig, bodies: &RigidBodySet) -> Option<Self> {
        let body = bodies.get(rig.chassis())?;
        let pos = body.translation();
        let rot = body.rotation().coords;

        let wheels = rig
            .vehicle
            .wheels()
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                Some(WheelSnapshot {
                    role: WheelRole::from_index(i)?,
                    steering: w.steering,
                    engine_force: w.engine_force,
                    brake: w.brake,
                })
            })
            .collect();

        Some(Self {
            id: rig.id,
            position: [pos.x, pos.y, pos.z],
            rotation: [rot.x, rot.y, rot.z, rot.w],
            wheels,
        })
    }
}

/// Server → client frames.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { client_id: Uuid, sensor_hz: u32 }, // accelerometer rate the client should stream at
    Pong,
    SpawnFailed { reason: String },
    Snapshot {
        tick: u64,
        controls: ControlSnapshot,
        vehicle: Option<VehicleSnapshot>,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!("failed to encode {:?}: {err}", self);
                None
            }
        }
    }
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, id: Uuid, tx: UnboundedSender<String>) {
        self.clients.insert(id, tx);
    }

    pub fn remove_client(&mut self, id: &Uuid) {
        self.clients.remove(id);
    }

    pub fn send_to(&self, id: &Uuid, msg: &ServerMessage) {
        if let (Some(tx), Some(json)) = (self.clients.get(id), msg.to_json()) {
            let _ = tx.send(json);
        }
    }

    /// Failed spawns go back to the client that asked, nobody else.
    pub fn deliver_reports(&self, reports: Vec<SpawnReport>) {
        for report in reports {
            if let Err(err) = report.result {
                let msg = ServerMessage::SpawnFailed { reason: err.to_string() };
                self.send_to(&report.client, &msg);
            }
        }
    }

    /// Build and send a snapshot of the controlled vehicle to all clients.
    pub fn broadcast_snapshot(
        &self,
        controls: ControlSnapshot,
        rig: Option<&VehicleRig>,
        bodies: &RigidBodySet,
    ) {
        let msg = ServerMessage::Snapshot {
            tick: self.tick,
            controls,
            vehicle: rig.and_then(|rig| VehicleSnapshot::capture(rig, bodies)),
        };
        let Some(json) = msg.to_json() else { return };

        for tx in self.clients.values() {
            let _ = tx.send(json.clone());
        }
    }
}

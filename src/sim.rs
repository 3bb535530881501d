// ==============================================================================
// sim.rs — THE TICK-OWNED WORLD
// ------------------------------------------------------------------------------
// Simulation is the single owner of the physics world and the vehicle
// controller. Connection tasks never touch it; they send WorldEvents over a
// channel and the tick loop applies them between steps.
//
// One tick:
//   1) apply queued world events (planes, spawns)
//   2) step physics (ray-cast vehicle update + solver)
//   3) controller.on_physics_tick() with the input snapshot
// ==============================================================================

use rapier3d::prelude::Real;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

use crate::controller::VehicleController;
use crate::error::SpawnError;
use crate::input::ControlSnapshot;
use crate::physics::{PhysicsWorld, PlaneAnchor};
use crate::spawn::{CameraPose, in_front_of};

#[derive(Debug, Clone)]
pub enum WorldEvent {
    PlaneAdded { id: String, anchor: PlaneAnchor },
    PlaneUpdated { id: String, anchor: PlaneAnchor },
    PlaneRemoved { id: String },
    Spawn { client: Uuid, camera: CameraPose },
}

/// Outcome of a spawn request, routed back to the client that asked.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnReport {
    pub client: Uuid,
    pub result: Result<u64, SpawnError>,
}

pub type WorldSender = UnboundedSender<WorldEvent>;
pub type WorldReceiver = UnboundedReceiver<WorldEvent>;

pub struct Simulation {
    pub physics: PhysicsWorld,
    pub controller: VehicleController,
    pub dt: Real,
}

impl Simulation {
    pub fn new(controller: VehicleController, dt: Real) -> Self {
        Self {
            physics: PhysicsWorld::new(),
            controller,
            dt,
        }
    }

    pub fn apply(&mut self, event: WorldEvent) -> Option<SpawnReport> {
        match event {
            WorldEvent::PlaneAdded { id, anchor } | WorldEvent::PlaneUpdated { id, anchor } => {
                self.physics.upsert_plane(&id, &anchor);
                None
            }
            WorldEvent::PlaneRemoved { id } => {
                if !self.physics.remove_plane(&id) {
                    debug!("ignoring removal of unknown plane {}", id);
                }
                None
            }
            WorldEvent::Spawn { client, camera } => {
                let pose = in_front_of(&camera);
                let result = self.controller.spawn_vehicle(&mut self.physics, &pose);
                Some(SpawnReport { client, result })
            }
        }
    }

    /// Drains everything queued since the last tick.
    pub fn drain(&mut self, events: &mut WorldReceiver) -> Vec<SpawnReport> {
        let mut reports = Vec::new();
        while let Ok(event) = events.try_recv() {
            reports.extend(self.apply(event));
        }
        reports
    }

    pub fn tick(&mut self, controls: &ControlSnapshot) {
        let vehicle = self.controller.active_mut().map(|rig| &mut rig.vehicle);
        self.physics.step(self.dt, vehicle);
        self.controller.on_physics_tick(controls);
    }
}

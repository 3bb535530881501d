// ==============================================================================
// controller.rs — VEHICLE LIFECYCLE + PER-TICK COMMANDS
// ------------------------------------------------------------------------------
// VehicleController owns the one controllable rig:
// - spawn_vehicle(): resolve the template, build chassis + 4 ray-cast wheels
//   in attachment order [RL, RR, FR, FL], register with the world, and retire
//   the previous rig only once the new one is known to be buildable
// - on_physics_tick(): push the fused input into the rig as exactly six
//   commands (steer 2,3 / engine 0,1 / brake 0,1)
//
// Wheel indices come from WheelRole; front wheels steer, rear wheels drive.
// ==============================================================================

use rapier3d::control::DynamicRayCastVehicleController;
use rapier3d::prelude::*;
use tracing::{error, info};

use crate::error::SpawnError;
use crate::input::ControlSnapshot;
use crate::physics::PhysicsWorld;
use crate::spawn::SpawnPose;
use crate::vehicle::{VehicleConfig, VehicleTemplate, WheelRole};

/// Per-wheel command surface of a four-wheel vehicle.
pub trait VehicleCommands {
    fn set_steering_angle(&mut self, angle: f32, wheel: usize);
    fn apply_engine_force(&mut self, force: f32, wheel: usize);
    fn apply_braking_force(&mut self, force: f32, wheel: usize);
}

fn steered() -> impl Iterator<Item = WheelRole> {
    WheelRole::ATTACHMENT_ORDER.into_iter().filter(|r| r.steers())
}

fn driven() -> impl Iterator<Item = WheelRole> {
    WheelRole::ATTACHMENT_ORDER.into_iter().filter(|r| r.driven())
}

/// Issue one tick's worth of commands.
pub fn drive<V: VehicleCommands + ?Sized>(vehicle: &mut V, controls: &ControlSnapshot) {
    let angle = -controls.steering_bias;
    for role in steered() {
        vehicle.set_steering_angle(angle, role.index());
    }

    let engine_force = controls.command.engine_force();
    let braking_force = controls.command.braking_force();

    for role in driven() {
        vehicle.apply_engine_force(engine_force, role.index());
    }
    for role in driven() {
        vehicle.apply_braking_force(braking_force, role.index());
    }
}

pub struct VehicleRig {
    pub id: u64,
    pub vehicle: DynamicRayCastVehicleController,
}

impl VehicleRig {
    pub fn chassis(&self) -> RigidBodyHandle {
        self.vehicle.chassis
    }
}

impl VehicleCommands for VehicleRig {
    fn set_steering_angle(&mut self, angle: f32, wheel: usize) {
        if let Some(w) = self.vehicle.wheels_mut().get_mut(wheel) {
            w.steering = angle;
        }
    }

    fn apply_engine_force(&mut self, force: f32, wheel: usize) {
        if let Some(w) = self.vehicle.wheels_mut().get_mut(wheel) {
            w.engine_force = force;
        }
    }

    fn apply_braking_force(&mut self, force: f32, wheel: usize) {
        if let Some(w) = self.vehicle.wheels_mut().get_mut(wheel) {
            w.brake = force;
        }
    }
}

pub struct VehicleController {
    config: VehicleConfig,
    template: VehicleTemplate,
    active: Option<VehicleRig>,
    spawned: u64,
}

impl VehicleController {
    pub fn new(config: VehicleConfig, template: VehicleTemplate) -> Self {
        Self {
            config,
            template,
            active: None,
            spawned: 0,
        }
    }

    pub fn active(&self) -> Option<&VehicleRig> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut VehicleRig> {
        self.active.as_mut()
    }

    #[cfg(test)]
    pub fn template_mut(&mut self) -> &mut VehicleTemplate {
        &mut self.template
    }

    /// Builds a new rig at `pose` and makes it the controlled one.
    ///
    /// A template with missing parts fails here, before anything touches the
    /// world, so the current rig keeps driving.
    pub fn spawn_vehicle(
        &mut self,
        world: &mut PhysicsWorld,
        pose: &SpawnPose,
    ) -> Result<u64, SpawnError> {
        let resolved = match self.template.resolve() {
            Ok(r) => r,
            Err(err) => {
                error!("spawn aborted: {err}");
                return Err(err);
            }
        };

        if let Some(old) = self.active.take() {
            world.remove_body(old.chassis());
            info!("removed vehicle #{}", old.id);
        }

        let chassis = world.insert_chassis(pose, resolved.chassis_half_extents, &self.config);

        let tuning = self.config.wheel_tuning();
        let mut vehicle = DynamicRayCastVehicleController::new(chassis);
        for wheel in resolved.wheels {
            let [x, y, z] = wheel.connection;
            vehicle.add_wheel(
                point![x, y, z],
                -Vector::y(),
                Vector::z(),
                self.config.suspension_rest,
                wheel.radius,
                &tuning,
            );
        }

        self.spawned += 1;
        let id = self.spawned;
        self.active = Some(VehicleRig { id, vehicle });

        info!("spawned vehicle #{} at {:?} (body = {:?})", id, pose.position, chassis);
        Ok(id)
    }

    /// Returns false when there is nothing to drive yet.
    pub fn on_physics_tick(&mut self, controls: &ControlSnapshot) -> bool {
        match self.active.as_mut() {
            Some(rig) => {
                drive(rig, controls);
                true
            }
            None => false,
        }
    }
}

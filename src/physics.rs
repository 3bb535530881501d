// src/physics.rs

use std::collections::HashMap;

use rapier3d::control::DynamicRayCastVehicleController;
use rapier3d::prelude::*;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::spawn::SpawnPose;
use crate::vehicle::VehicleConfig;

pub const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
pub const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

const PLANE_HALF_THICKNESS: f32 = 0.01;

/// Anything this far from the origin has blown up.
const WORLD_LIMIT: f32 = 1_000.0;

/// Horizontal plane reported by the AR session, world space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlaneAnchor {
    pub center: [f32; 3],
    pub extent: [f32; 2], // x, z
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,                // gravity vector
    pub pipeline: PhysicsPipeline,            // physics pipeline
    pub island_manager: IslandManager,        // manages islands of bodies
    pub broad_phase: DefaultBroadPhase,       // broad-phase collision detection
    pub narrow_phase: NarrowPhase,            // collision detection
    pub bodies: RigidBodySet,                 // for rigid bodies
    pub colliders: ColliderSet,               // for collision shapes
    pub joints: ImpulseJointSet,              // for constraints
    pub multibody_joints: MultibodyJointSet,  // for articulated bodies
    pub ccd: CCDSolver,                       // continuous collision detection
    pub query_pipeline: QueryPipeline,        // wheel raycasts
    pub planes: HashMap<String, ColliderHandle>, // anchor id → ground collider
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.81, 0.0],
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            planes: HashMap::new(),
        }
    }

    // --------------------------------------------------
    // Ground planes
    // --------------------------------------------------

    fn plane_collider(anchor: &PlaneAnchor) -> Collider {
        let [cx, cy, cz] = anchor.center;
        let [ex, ez] = anchor.extent;

        // top face sits on the detected plane
        ColliderBuilder::cuboid(ex * 0.5, PLANE_HALF_THICKNESS, ez * 0.5)
            .translation(vector![cx, cy - PLANE_HALF_THICKNESS, cz])
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.0)
            .restitution(0.0)
            .build()
    }

    /// Adds the plane, or replaces it if the id is already known.
    pub fn upsert_plane(&mut self, id: &str, anchor: &PlaneAnchor) {
        self.remove_plane(id);
        let handle = self.colliders.insert(Self::plane_collider(anchor));
        self.planes.insert(id.to_string(), handle);
        debug!("plane {} at {:?} extent {:?}", id, anchor.center, anchor.extent);
    }

    pub fn remove_plane(&mut self, id: &str) -> bool {
        let Some(handle) = self.planes.remove(id) else {
            return false;
        };
        self.colliders
            .remove(handle, &mut self.island_manager, &mut self.bodies, true);
        true
    }

    // --------------------------------------------------
    // Chassis bodies
    // --------------------------------------------------

    pub fn insert_chassis(
        &mut self,
        pose: &SpawnPose,
        half_extents: [f32; 3],
        config: &VehicleConfig,
    ) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::dynamic()
            .position(pose.isometry())
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .ccd_enabled(true)
            .build();

        let [hx, hy, hz] = half_extents;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .mass(config.chassis_mass)
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn step(&mut self, dt: Real, vehicle: Option<&mut DynamicRayCastVehicleController>) {
        let hooks = ();
        let events = ();

        // 1) Wheel raycasts + suspension/friction impulses on the chassis
        if let Some(vehicle) = vehicle {
            // the vehicle controller does not wake a parked chassis on its own
            let driving = vehicle.wheels().iter().any(|w| w.engine_force != 0.0);
            if driving {
                if let Some(body) = self.bodies.get_mut(vehicle.chassis) {
                    body.wake_up(true);
                }
            }

            let filter = QueryFilter::exclude_dynamic().exclude_rigid_body(vehicle.chassis);
            vehicle.update_vehicle(
                dt,
                &mut self.bodies,
                &self.colliders,
                &self.query_pipeline,
                filter,
            );
        }

        // 2) Step physics.
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &hooks,
            &events,
        );

        // 3) Safety: a car that fell off every plane or exploded comes back above the origin
        for (handle, body) in self.bodies.iter_mut() {
            let pos = *body.translation();

            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.x.abs() > WORLD_LIMIT
                || pos.y.abs() > WORLD_LIMIT
                || pos.z.abs() > WORLD_LIMIT;

            if bad {
                body.set_position(Isometry::translation(0.0, 1.0, 0.0), true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);

                warn!("reset runaway body {:?} from {:?}", handle, pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::TOY_CAR;

    fn floor() -> PlaneAnchor {
        PlaneAnchor { center: [0.0, 0.0, 0.0], extent: [4.0, 4.0] }
    }

    #[test]
    fn planes_are_added_replaced_and_removed() {
        let mut world = PhysicsWorld::new();

        world.upsert_plane("a", &floor());
        assert_eq!(world.colliders.len(), 1);

        world.upsert_plane("a", &PlaneAnchor { center: [0.0, 0.1, 0.0], extent: [8.0, 2.0] });
        assert_eq!(world.colliders.len(), 1);
        let handle = world.planes["a"];
        let top = world.colliders[handle].translation().y + PLANE_HALF_THICKNESS;
        assert!((top - 0.1).abs() < 1e-6);

        assert!(world.remove_plane("a"));
        assert!(!world.remove_plane("a"));
        assert_eq!(world.colliders.len(), 0);
    }

    #[test]
    fn chassis_gets_configured_mass() {
        let mut world = PhysicsWorld::new();
        let pose = SpawnPose { position: [0.0, 0.5, 0.0], yaw: 0.0 };
        let handle = world.insert_chassis(&pose, [0.35, 0.08, 0.18], &TOY_CAR);
        world.step(1.0 / 60.0, None);

        let mass = world.bodies[handle].mass();
        assert!((mass - TOY_CAR.chassis_mass).abs() < 1e-4, "mass = {mass}");

        world.remove_body(handle);
        assert_eq!(world.bodies.len(), 0);
        assert_eq!(world.colliders.len(), 0);
    }

    #[test]
    fn chassis_without_ground_falls() {
        let mut world = PhysicsWorld::new();
        let pose = SpawnPose { position: [0.0, 0.5, 0.0], yaw: 0.0 };
        let handle = world.insert_chassis(&pose, [0.35, 0.08, 0.18], &TOY_CAR);

        for _ in 0..30 {
            world.step(1.0 / 60.0, None);
        }
        assert!(world.bodies[handle].translation().y < 0.5);
    }

    #[test]
    fn chassis_rests_on_a_plane() {
        let mut world = PhysicsWorld::new();
        world.upsert_plane("floor", &floor());
        let pose = SpawnPose { position: [0.0, 0.3, 0.0], yaw: 0.0 };
        let handle = world.insert_chassis(&pose, [0.35, 0.08, 0.18], &TOY_CAR);

        for _ in 0..240 {
            world.step(1.0 / 60.0, None);
        }
        let y = world.bodies[handle].translation().y;
        assert!(y > 0.0 && y < 0.3, "y = {y}");
    }

    #[test]
    fn runaway_bodies_are_reset() {
        let mut world = PhysicsWorld::new();
        let pose = SpawnPose { position: [0.0, -2_000.0, 0.0], yaw: 0.0 };
        let handle = world.insert_chassis(&pose, [0.35, 0.08, 0.18], &TOY_CAR);

        world.step(1.0 / 60.0, None);
        let pos = world.bodies[handle].translation();
        assert!(pos.y.abs() < WORLD_LIMIT);
    }
}

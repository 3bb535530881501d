// ---------------------------------------------
// SPAWN PLACEMENT
// ---------------------------------------------
use rapier3d::prelude::*;
use serde::Deserialize;

/// Camera pose as reported by the AR client, world space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub forward: [f32; 3], // view direction, any length
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPose {
    pub position: [f32; 3],
    pub yaw: f32, // radians about +Y
}

impl SpawnPose {
    pub fn isometry(&self) -> Isometry<Real> {
        let [x, y, z] = self.position;
        Isometry::new(vector![x, y, z], vector![0.0, self.yaw, 0.0])
    }
}

/// One unit in front of the camera, chassis +X turned towards where the
/// camera looks.
pub fn in_front_of(camera: &CameraPose) -> SpawnPose {
    let [px, py, pz] = camera.position;
    let [fx, fy, fz] = camera.forward;

    // degenerate forward: drop the car on the camera
    let len = (fx * fx + fy * fy + fz * fz).sqrt();
    let [fx, fy, fz] = if len > 1e-4 {
        [fx / len, fy / len, fz / len]
    } else {
        [0.0; 3]
    };

    // looking straight up/down: no usable heading
    let horizontal = (fx * fx + fz * fz).sqrt();
    let yaw = if horizontal > 1e-4 { (-fz).atan2(fx) } else { 0.0 };

    SpawnPose {
        position: [px + fx, py + fy, pz + fz],
        yaw,
    }
}

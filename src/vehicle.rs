use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use rapier3d::control::WheelTuning;
use serde::{Deserialize, Serialize};

use crate::error::{SpawnError, TemplateError};

pub struct VehicleConfig {
    pub chassis_mass: f32,       // mass units
    pub linear_damping: f32,     // drag
    pub angular_damping: f32,    // rotational drag
    pub suspension_rest: f32,    // meters
    pub suspension_stiffness: f32,
    pub suspension_damping: f32, // applied to compression and relaxation
    pub friction_slip: f32,
}

pub const TOY_CAR: VehicleConfig = VehicleConfig {
    chassis_mass: 5.0,
    linear_damping: 0.1,
    angular_damping: 0.5,
    suspension_rest: 0.12,
    suspension_stiffness: 30.0,
    suspension_damping: 2.3,
    friction_slip: 10.5,
};

impl VehicleConfig {
    pub fn wheel_tuning(&self) -> WheelTuning {
        WheelTuning {
            suspension_stiffness: self.suspension_stiffness,
            suspension_compression: self.suspension_damping,
            suspension_damping: self.suspension_damping,
            friction_slip: self.friction_slip,
            ..WheelTuning::default()
        }
    }
}

/// Position of a wheel in the rig. Discriminants are the wheel indices the
/// controller addresses, so the declaration order is load-bearing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelRole {
    RearLeft = 0,
    RearRight = 1,
    FrontRight = 2,
    FrontLeft = 3,
}

impl WheelRole {
    pub const ATTACHMENT_ORDER: [WheelRole; 4] = [
        WheelRole::RearLeft,
        WheelRole::RearRight,
        WheelRole::FrontRight,
        WheelRole::FrontLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ATTACHMENT_ORDER.get(index).copied()
    }

    /// Name of the template part this wheel hangs from.
    pub fn part_name(self) -> &'static str {
        match self {
            WheelRole::RearLeft => "rearLeftParent",
            WheelRole::RearRight => "rearRightParent",
            WheelRole::FrontRight => "frontRightParent",
            WheelRole::FrontLeft => "frontLeftParent",
        }
    }

    pub fn steers(self) -> bool {
        matches!(self, WheelRole::FrontRight | WheelRole::FrontLeft)
    }

    pub fn driven(self) -> bool {
        !self.steers()
    }
}

impl fmt::Display for WheelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WheelRole::RearLeft => "RL",
            WheelRole::RearRight => "RR",
            WheelRole::FrontRight => "FR",
            WheelRole::FrontLeft => "FL",
        };
        write!(f, "{s}")
    }
}

pub const CHASSIS_PART: &str = "chassis";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePart {
    pub name: String,
    pub offset: [f32; 3],       // chassis local space; chassis part is ignored
    #[serde(default)]
    pub radius: Option<f32>,    // wheels only
    #[serde(default)]
    pub half_extents: Option<[f32; 3]>, // chassis only
}

/// The car asset reduced to what physics needs: named parts with offsets.
/// Chassis forward is +X, up is +Y, right is +Z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTemplate {
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWheel {
    pub role: WheelRole,
    pub connection: [f32; 3],
    pub radius: f32,
}

/// A template whose every required part was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub chassis_half_extents: [f32; 3],
    pub wheels: [ResolvedWheel; 4], // attachment order
}

const DEFAULT_WHEEL_RADIUS: f32 = 0.08;
const DEFAULT_CHASSIS_HALF_EXTENTS: [f32; 3] = [0.35, 0.08, 0.18];

impl Default for VehicleTemplate {
    fn default() -> Self {
        let wheel = |name: &str, offset: [f32; 3]| TemplatePart {
            name: name.to_string(),
            offset,
            radius: Some(DEFAULT_WHEEL_RADIUS),
            half_extents: None,
        };
        Self {
            parts: vec![
                TemplatePart {
                    name: CHASSIS_PART.to_string(),
                    offset: [0.0, 0.0, 0.0],
                    radius: None,
                    half_extents: Some(DEFAULT_CHASSIS_HALF_EXTENTS),
                },
                wheel("frontLeftParent", [0.25, -0.05, -0.17]),
                wheel("frontRightParent", [0.25, -0.05, 0.17]),
                wheel("rearLeftParent", [-0.25, -0.05, -0.17]),
                wheel("rearRightParent", [-0.25, -0.05, 0.17]),
            ],
        }
    }
}

impl VehicleTemplate {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TemplateError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn part(&self, name: &str) -> Result<&TemplatePart, SpawnError> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SpawnError::MissingPart { name: name.to_string() })
    }

    /// Look up the chassis and the four wheel parts by name.
    pub fn resolve(&self) -> Result<ResolvedTemplate, SpawnError> {
        let mut seen = HashSet::new();
        for part in &self.parts {
            if !seen.insert(part.name.as_str()) {
                return Err(SpawnError::DuplicatePart { name: part.name.clone() });
            }
        }

        let chassis = self.part(CHASSIS_PART)?;
        let chassis_half_extents = chassis.half_extents.unwrap_or(DEFAULT_CHASSIS_HALF_EXTENTS);

        let mut wheels = [ResolvedWheel {
            role: WheelRole::RearLeft,
            connection: [0.0; 3],
            radius: DEFAULT_WHEEL_RADIUS,
        }; 4];

        for role in WheelRole::ATTACHMENT_ORDER {
            let part = self.part(role.part_name())?;
            wheels[role.index()] = ResolvedWheel {
                role,
                connection: part.offset,
                radius: part.radius.unwrap_or(DEFAULT_WHEEL_RADIUS),
            };
        }

        Ok(ResolvedTemplate { chassis_half_extents, wheels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_order_maps_indices_to_roles() {
        assert_eq!(WheelRole::from_index(0), Some(WheelRole::RearLeft));
        assert_eq!(WheelRole::from_index(1), Some(WheelRole::RearRight));
        assert_eq!(WheelRole::from_index(2), Some(WheelRole::FrontRight));
        assert_eq!(WheelRole::from_index(3), Some(WheelRole::FrontLeft));
        assert_eq!(WheelRole::from_index(4), None);

        for (i, role) in WheelRole::ATTACHMENT_ORDER.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn front_wheels_steer_rear_wheels_drive() {
        for role in WheelRole::ATTACHMENT_ORDER {
            assert_ne!(role.steers(), role.driven(), "{role}");
        }
        assert!(WheelRole::FrontLeft.steers());
        assert!(WheelRole::FrontRight.steers());
        assert!(WheelRole::RearLeft.driven());
        assert!(WheelRole::RearRight.driven());
    }

    #[test]
    fn default_template_resolves_in_attachment_order() {
        let resolved = VehicleTemplate::default().resolve().unwrap();
        let roles: Vec<_> = resolved.wheels.iter().map(|w| w.role).collect();
        assert_eq!(roles, WheelRole::ATTACHMENT_ORDER.to_vec());

        // rear wheels sit behind the chassis center, front wheels ahead
        assert!(resolved.wheels[0].connection[0] < 0.0);
        assert!(resolved.wheels[1].connection[0] < 0.0);
        assert!(resolved.wheels[2].connection[0] > 0.0);
        assert!(resolved.wheels[3].connection[0] > 0.0);
        // left is -Z
        assert!(resolved.wheels[0].connection[2] < 0.0);
        assert!(resolved.wheels[3].connection[2] < 0.0);
    }

    #[test]
    fn missing_wheel_part_is_reported_by_name() {
        let mut template = VehicleTemplate::default();
        template.parts.retain(|p| p.name != "frontRightParent");

        assert_eq!(
            template.resolve(),
            Err(SpawnError::MissingPart { name: "frontRightParent".into() })
        );
    }

    #[test]
    fn missing_chassis_is_reported() {
        let mut template = VehicleTemplate::default();
        template.parts.retain(|p| p.name != CHASSIS_PART);

        assert_eq!(
            template.resolve(),
            Err(SpawnError::MissingPart { name: CHASSIS_PART.into() })
        );
    }

    #[test]
    fn duplicate_parts_are_rejected() {
        let mut template = VehicleTemplate::default();
        let dup = template.parts[1].clone();
        template.parts.push(dup);

        assert!(matches!(template.resolve(), Err(SpawnError::DuplicatePart { .. })));
    }

    #[test]
    fn template_parses_from_json() {
        let json = r#"{
            "parts": [
                { "name": "chassis", "offset": [0, 0, 0], "half_extents": [0.5, 0.1, 0.25] },
                { "name": "rearLeftParent",   "offset": [-0.3, -0.05, -0.2], "radius": 0.1 },
                { "name": "rearRightParent",  "offset": [-0.3, -0.05,  0.2] },
                { "name": "frontRightParent", "offset": [ 0.3, -0.05,  0.2] },
                { "name": "frontLeftParent",  "offset": [ 0.3, -0.05, -0.2] }
            ]
        }"#;
        let template: VehicleTemplate = serde_json::from_str(json).unwrap();
        let resolved = template.resolve().unwrap();

        assert_eq!(resolved.chassis_half_extents, [0.5, 0.1, 0.25]);
        assert_eq!(resolved.wheels[0].radius, 0.1);
        assert_eq!(resolved.wheels[1].radius, DEFAULT_WHEEL_RADIUS);
    }

    #[test]
    fn loading_a_missing_file_is_a_read_error() {
        let err = VehicleTemplate::load(Path::new("/nonexistent/car.json")).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }
}

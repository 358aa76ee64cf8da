// src/manipulation/profile.rs
// Pick profiles: the fixed joint choreography used to take an item out of one shelf
// slot and drop it on the robot's tray. Reach differs per slot because the shelves sit
// at different heights; everything after the grip is shared except the drop pose and
// the release settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::Joint;

// Shared choreography constants.
const GRIPPER_OPEN_HOLD: f64 = 2.0;
const GRIP_CLOSED: f64 = 0.0;
const GRIP_HOLD: f64 = 2.5;
const LIFT_POSITION: f64 = 0.75;
const CLEARANCE_POSITION: f64 = 0.90;
const MOVE_HOLD: f64 = 2.0;
const GRIPPER_REST: f64 = 0.02;

/// A single joint setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointTarget {
    /// Joint to move
    pub joint: Joint,
    /// Target position (radians, or metres for the fingers)
    pub position: f64,
}

/// A slot-specific lowering stage: one joint move followed by a hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Joint to move
    pub joint: Joint,
    /// Target position
    pub position: f64,
    /// Seconds to hold before the next stage; zero still lets one tick pass
    #[serde(default)]
    pub hold: f64,
}

/// How to pick from one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickProfile {
    /// Human-readable name for logs
    pub label: String,
    /// Finger opening before the approach
    pub gripper_open: f64,
    /// Arm lowering stages, in order
    pub lowering: Vec<Stage>,
    /// Base joint angle facing the drop tray
    pub base_rotate: f64,
    /// Shoulder angle for the drop
    pub drop: f64,
    /// Elbow angle for the drop, when the slot needs one
    #[serde(default)]
    pub secondary_drop: Option<f64>,
    /// Finger opening used to release the item
    pub gripper_release: f64,
    /// Seconds to hold the release
    pub release_hold: f64,
}

/// One step of a compiled choreography.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    /// What the phase does, for logs
    pub name: String,
    /// Setpoints issued together at the start of the phase
    pub targets: Vec<JointTarget>,
    /// Seconds to hold afterwards
    pub hold: f64,
}

impl Phase {
    fn new(name: impl Into<String>, targets: Vec<JointTarget>, hold: f64) -> Self {
        Phase { name: name.into(), targets, hold }
    }

    fn single(name: impl Into<String>, joint: Joint, position: f64, hold: f64) -> Self {
        Self::new(name, vec![JointTarget { joint, position }], hold)
    }

    fn gripper(name: impl Into<String>, opening: f64, hold: f64) -> Self {
        let targets = Joint::FINGERS
            .into_iter()
            .map(|joint| JointTarget { joint, position: opening })
            .collect();
        Self::new(name, targets, hold)
    }
}

impl PickProfile {
    /// Full ordered choreography: open, lower, grip, lift, turn to the tray, drop,
    /// release, then return to neutral.
    pub fn choreography(&self) -> Vec<Phase> {
        let mut phases = vec![Phase::gripper("open gripper", self.gripper_open, GRIPPER_OPEN_HOLD)];

        phases.extend(self.lowering.iter().map(|stage| {
            Phase::single(format!("lower {:?}", stage.joint), stage.joint, stage.position, stage.hold)
        }));

        phases.push(Phase::gripper("close gripper", GRIP_CLOSED, GRIP_HOLD));
        phases.push(Phase::single("raise arm", Joint::Arm2, LIFT_POSITION, MOVE_HOLD));
        phases.push(Phase::single("turn to tray", Joint::Arm1, self.base_rotate, MOVE_HOLD));
        phases.push(Phase::single("lower to tray", Joint::Arm2, self.drop, MOVE_HOLD));
        if let Some(elbow) = self.secondary_drop {
            phases.push(Phase::single("lower elbow to tray", Joint::Arm3, elbow, MOVE_HOLD));
        }
        phases.push(Phase::gripper("release", self.gripper_release, self.release_hold));

        phases.push(Phase::single("lift clear", Joint::Arm2, CLEARANCE_POSITION, MOVE_HOLD));
        for joint in [Joint::Arm1, Joint::Arm3, Joint::Arm4, Joint::Arm2] {
            phases.push(Phase::single(format!("reset {joint:?}"), joint, 0.0, MOVE_HOLD));
        }
        phases.push(Phase::gripper("rest gripper", GRIPPER_REST, MOVE_HOLD));
        phases
    }

    /// Nominal duration of the choreography in seconds.
    pub fn duration(&self) -> f64 {
        self.choreography().iter().map(|phase| phase.hold).sum()
    }
}

/// Built-in profiles keyed by slot id. Slots 1 and 3 have no choreography yet.
pub fn default_profiles() -> BTreeMap<u32, PickProfile> {
    let lower_shelf = PickProfile {
        label: "lower shelf".to_string(),
        gripper_open: 0.025,
        lowering: vec![
            Stage { joint: Joint::Arm2, position: -0.80, hold: 1.5 },
            Stage { joint: Joint::Arm3, position: 0.0, hold: 2.5 },
            Stage { joint: Joint::Arm4, position: -0.82, hold: 0.0 },
            Stage { joint: Joint::Arm4, position: -1.72, hold: 2.5 },
        ],
        base_rotate: -2.94,
        drop: -0.52,
        secondary_drop: Some(-0.84),
        gripper_release: 0.02,
        release_hold: 2.0,
    };

    let upper_shelf = PickProfile {
        label: "upper shelf".to_string(),
        gripper_open: 0.025,
        lowering: vec![
            Stage { joint: Joint::Arm4, position: 1.45, hold: 2.5 },
            Stage { joint: Joint::Arm3, position: -1.15, hold: 2.5 },
            Stage { joint: Joint::Arm2, position: -0.92, hold: 1.5 },
            Stage { joint: Joint::Arm4, position: -0.30, hold: 0.0 },
            Stage { joint: Joint::Arm4, position: -1.32, hold: 2.5 },
        ],
        base_rotate: -2.94,
        drop: -0.32,
        secondary_drop: None,
        gripper_release: 0.02,
        release_hold: 2.0,
    };

    BTreeMap::from([(2, lower_shelf), (4, upper_shelf)])
}

//! Device layer for Shelfbot
//!
//! The controller never talks to the physics simulator directly. Everything it needs
//! from the robot body (the simulation clock, the position sensor, the four wheel
//! motors, the five arm joints, the two gripper fingers and the orientation field)
//! goes through the [`Robot`] trait.

pub mod sim;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sim::SimRobot;

/// Position-controlled joints on the manipulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    /// Base yaw joint; turns the whole arm towards the drop tray.
    Arm1,
    /// Shoulder.
    Arm2,
    /// Elbow.
    Arm3,
    /// Wrist pitch.
    Arm4,
    /// Wrist roll.
    Arm5,
    /// Left gripper finger.
    FingerLeft,
    /// Right gripper finger.
    FingerRight,
}

impl Joint {
    /// Arm joints in base-to-tip order.
    pub const ARM: [Joint; 5] = [Joint::Arm1, Joint::Arm2, Joint::Arm3, Joint::Arm4, Joint::Arm5];
    /// Both gripper fingers.
    pub const FINGERS: [Joint; 2] = [Joint::FingerLeft, Joint::FingerRight];

    /// Every joint, arm first.
    pub fn all() -> impl Iterator<Item = Joint> {
        Self::ARM.into_iter().chain(Self::FINGERS)
    }
}

/// Device layer errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device or field is not reachable on this robot
    #[error("device unavailable: {0}")]
    Unavailable(String),
    /// The device refused the command
    #[error("{device} rejected command: {reason}")]
    Rejected {
        /// Device name
        device: String,
        /// Why it was refused
        reason: String,
    },
}

/// Handle to the simulated robot body.
///
/// `step` is the only way simulation time moves forward. Wheel and joint commands are
/// setpoints and may be reissued every tick.
pub trait Robot {
    /// Advance the simulation by one fixed time step. Returns `false` once the simulator
    /// has shut down.
    fn step(&mut self) -> bool;

    /// Current simulation time in seconds.
    fn time(&self) -> f64;

    /// Position sensor reading (ground plane x, y).
    fn position(&self) -> Vector2<f64>;

    /// Set the velocity of the four drive wheels, in wheel order 1..4.
    fn set_wheel_velocities(&mut self, velocities: [f64; 4]);

    /// Command a joint to a target position.
    fn set_joint_position(&mut self, joint: Joint, position: f64) -> Result<(), DeviceError>;

    /// Overwrite the body orientation with an axis-angle rotation.
    fn set_rotation(&mut self, axis: Vector3<f64>, angle: f64) -> Result<(), DeviceError>;
}

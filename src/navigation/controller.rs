// src/navigation/controller.rs
// Motion primitives over the four-wheel differential base, plus the blocking wait that
// keeps stepping the simulation clock while a choreography holds a pose.

use log::warn;

use super::{MoveDirection, TurnDirection};
use crate::NavigationConfig;
use crate::device::Robot;

/// Drive and turn commands at fixed speeds. Every command is a velocity setpoint, so
/// reissuing it each tick is harmless.
#[derive(Debug, Clone)]
pub struct MotionController {
    drive_speed: f64,
    rotate_speed: f64,
}

impl MotionController {
    /// Creates a controller with the configured drive and turn speeds.
    pub fn new(config: &NavigationConfig) -> Self {
        MotionController {
            drive_speed: config.drive_speed,
            rotate_speed: config.rotate_speed,
        }
    }

    /// Drive straight at constant speed.
    pub fn drive<R: Robot + ?Sized>(&self, robot: &mut R, direction: MoveDirection) {
        let speed = match direction {
            MoveDirection::Forward => self.drive_speed,
            MoveDirection::Backward => -self.drive_speed,
        };
        robot.set_wheel_velocities([speed; 4]);
    }

    /// Turn in place at constant speed.
    pub fn rotate<R: Robot + ?Sized>(&self, robot: &mut R, direction: TurnDirection) {
        let s = self.rotate_speed;
        let velocities = match direction {
            TurnDirection::Left => [-s, s, s, -s],
            TurnDirection::Right => [s, -s, -s, s],
        };
        robot.set_wheel_velocities(velocities);
    }

    /// Zero every wheel.
    pub fn stop<R: Robot + ?Sized>(&self, robot: &mut R) {
        robot.set_wheel_velocities([0.0; 4]);
    }
}

/// Blocks for `seconds` of simulation time, stepping the clock the whole way.
///
/// Always takes at least one step, so a zero hold still lets the simulation advance.
/// A negative or non-finite hold is treated as zero. Returns `false` if the simulator
/// shut down before the time elapsed.
pub fn wait<R: Robot + ?Sized>(robot: &mut R, seconds: f64) -> bool {
    let seconds = if seconds.is_finite() && seconds >= 0.0 {
        seconds
    } else {
        warn!("Ignoring invalid hold of {} seconds", seconds);
        0.0
    };
    let start = robot.time();
    loop {
        if !robot.step() {
            warn!("Simulation ended during a {:.1}s wait", seconds);
            return false;
        }
        if robot.time() - start >= seconds {
            return true;
        }
    }
}

// src/device/sim.rs
// Kinematic stand-in for the physics simulator. Integrates the four wheel velocities as a
// skid-steer base, stores joint setpoints, and records every command so tests can check
// what the controller actually asked the hardware to do.

use std::collections::{BTreeMap, HashSet, VecDeque};

use log::debug;
use nalgebra::{Unit, UnitQuaternion, Vector2, Vector3};

use super::{DeviceError, Joint, Robot};

/// Commands kept in the log before the oldest are dropped.
pub const COMMAND_LOG_LIMIT: usize = 4096;

/// A command the controller issued to the stand-in robot.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Wheel velocities set
    Wheels([f64; 4]),
    /// Joint setpoint issued
    Joint(Joint, f64),
    /// Orientation overwritten (axis, angle)
    Rotation(Vector3<f64>, f64),
}

/// Simple skid-steer robot with a fixed-step clock.
pub struct SimRobot {
    time: f64,
    time_step: f64,
    end_time: Option<f64>,
    position: Vector2<f64>,
    orientation: UnitQuaternion<f64>,
    wheels: [f64; 4],
    wheel_radius: f64,
    track_width: f64,
    joints: BTreeMap<Joint, f64>,
    commands: VecDeque<(f64, Command)>,
    command_log_limit: usize,
    joint_commands: usize,
    rotation_field_enabled: bool,
    failing_joints: HashSet<Joint>,
}

impl SimRobot {
    /// Creates a robot at the origin facing +x with the given tick length in milliseconds.
    pub fn new(time_step_ms: u64) -> Self {
        SimRobot {
            time: 0.0,
            time_step: time_step_ms as f64 / 1000.0,
            end_time: None,
            position: Vector2::zeros(),
            orientation: UnitQuaternion::identity(),
            wheels: [0.0; 4],
            wheel_radius: 0.05,
            track_width: 0.3,
            joints: Joint::all().map(|joint| (joint, 0.0)).collect(),
            commands: VecDeque::new(),
            command_log_limit: COMMAND_LOG_LIMIT,
            joint_commands: 0,
            rotation_field_enabled: true,
            failing_joints: HashSet::new(),
        }
    }

    /// Places the robot at `position` with the given heading (radians about +z).
    pub fn with_pose(mut self, position: Vector2<f64>, heading: f64) -> Self {
        self.position = position;
        self.orientation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading);
        self
    }

    /// Simulation stops stepping once `end_time` seconds have elapsed.
    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Makes the orientation field unreachable.
    pub fn without_rotation_field(mut self) -> Self {
        self.rotation_field_enabled = false;
        self
    }

    /// Keeps at most `limit` commands in the log.
    pub fn with_command_log_limit(mut self, limit: usize) -> Self {
        self.command_log_limit = limit;
        self
    }

    /// Makes commands to `joint` fail.
    pub fn with_failing_joint(mut self, joint: Joint) -> Self {
        self.failing_joints.insert(joint);
        self
    }

    /// Heading about +z in radians.
    pub fn heading(&self) -> f64 {
        let (_, _, yaw) = self.orientation.euler_angles();
        yaw
    }

    /// Current wheel velocity setpoints.
    pub fn wheels(&self) -> [f64; 4] {
        self.wheels
    }

    /// Last setpoint of `joint`.
    pub fn joint(&self, joint: Joint) -> f64 {
        self.joints.get(&joint).copied().unwrap_or(0.0)
    }

    /// The most recent commands, oldest first, stamped with simulation time.
    pub fn commands(&self) -> impl Iterator<Item = &(f64, Command)> {
        self.commands.iter()
    }

    /// Number of joint commands issued so far, including any dropped from the log.
    pub fn joint_command_count(&self) -> usize {
        self.joint_commands
    }

    fn record(&mut self, command: Command) {
        if self.command_log_limit == 0 {
            return;
        }
        if self.commands.len() == self.command_log_limit {
            self.commands.pop_front();
        }
        self.commands.push_back((self.time, command));
    }

    fn integrate(&mut self) {
        let radius = self.wheel_radius;
        // Wheels 1 and 4 form the left side, 2 and 3 the right side.
        let left = (self.wheels[0] + self.wheels[3]) / 2.0 * radius;
        let right = (self.wheels[1] + self.wheels[2]) / 2.0 * radius;
        let linear = (left + right) / 2.0;
        let angular = (right - left) / self.track_width;

        let heading = self.heading();
        self.position += Vector2::new(heading.cos(), heading.sin()) * linear * self.time_step;
        if angular != 0.0 {
            let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angular * self.time_step);
            self.orientation = turn * self.orientation;
        }
    }
}

impl Robot for SimRobot {
    fn step(&mut self) -> bool {
        if let Some(end) = self.end_time {
            if self.time >= end {
                return false;
            }
        }
        self.integrate();
        self.time += self.time_step;
        true
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn position(&self) -> Vector2<f64> {
        self.position
    }

    fn set_wheel_velocities(&mut self, velocities: [f64; 4]) {
        if self.wheels != velocities {
            self.record(Command::Wheels(velocities));
        }
        self.wheels = velocities;
    }

    fn set_joint_position(&mut self, joint: Joint, position: f64) -> Result<(), DeviceError> {
        if self.failing_joints.contains(&joint) {
            return Err(DeviceError::Rejected {
                device: format!("{joint:?}"),
                reason: "motor fault".to_string(),
            });
        }
        self.joint_commands += 1;
        self.record(Command::Joint(joint, position));
        self.joints.insert(joint, position);
        Ok(())
    }

    fn set_rotation(&mut self, axis: Vector3<f64>, angle: f64) -> Result<(), DeviceError> {
        if !self.rotation_field_enabled {
            return Err(DeviceError::Unavailable("rotation field".to_string()));
        }
        let axis = Unit::try_new(axis, 1.0e-9)
            .ok_or_else(|| DeviceError::Unavailable("degenerate rotation axis".to_string()))?;
        self.orientation = UnitQuaternion::from_axis_angle(&axis, angle);
        self.record(Command::Rotation(axis.into_inner(), angle));
        debug!("Orientation set, heading now {:.2} rad", self.heading());
        Ok(())
    }
}

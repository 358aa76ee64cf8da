//! Navigation system for Shelfbot
//!
//! This module holds the plan model (typed waypoint steps) and the waypoint
//! interpreter, the state machine that consumes a plan one step at a time from the
//! control loop. Moves and one-shot rotations resolve within a tick, timed turns span
//! many ticks, and pick batches block the interpreter for the whole choreography.

pub mod controller;
pub mod planner;

use log::{debug, info, warn};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub use controller::{MotionController, wait};
pub use planner::{RoutePlanner, RouteStep};

use crate::NavigationConfig;
use crate::backend::{Backend, RobotActivity};
use crate::core::{JobManager, RobotRuntimeState, RotationState, SlotInventory};
use crate::device::Robot;
use crate::manipulation::PickSequencer;

/// Straight-line drive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    /// Wheels forward
    Forward,
    /// Wheels backward
    Backward,
}

/// In-place turn direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    /// Counter-clockwise
    Left,
    /// Clockwise
    Right,
}

/// One unit of a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaypointStep {
    /// Drive until within tolerance of the target point
    Move {
        /// Target x
        target_x: f64,
        /// Target y
        target_y: f64,
        /// Drive direction
        direction: MoveDirection,
    },
    /// Turn in place for `duration` seconds of simulation time
    TimedTurn {
        /// Turn direction, fixed for the whole step
        direction: TurnDirection,
        /// Seconds
        duration: f64,
    },
    /// Overwrite the body orientation with an axis-angle rotation
    AbsoluteRotate {
        /// Axis x
        axis_x: f64,
        /// Axis y
        axis_y: f64,
        /// Axis z
        axis_z: f64,
        /// Radians
        angle: f64,
    },
    /// Run the pick sequencer for `quantity` items
    PickBatch {
        /// Requested item count
        quantity: i64,
    },
}

impl WaypointStep {
    /// Checks that the step can be executed at all. A step that fails here is skipped.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            WaypointStep::Move { target_x, target_y, .. } => {
                if target_x.is_finite() && target_y.is_finite() {
                    Ok(())
                } else {
                    Err(format!("non-finite move target ({target_x}, {target_y})"))
                }
            }
            WaypointStep::TimedTurn { duration, .. } => {
                if duration.is_finite() && duration >= 0.0 {
                    Ok(())
                } else {
                    Err(format!("invalid turn duration {duration}"))
                }
            }
            WaypointStep::AbsoluteRotate { axis_x, axis_y, axis_z, angle } => {
                let axis = Vector3::new(axis_x, axis_y, axis_z);
                if !axis.iter().all(|c| c.is_finite()) || !angle.is_finite() {
                    Err("non-finite rotation".to_string())
                } else if axis.norm() == 0.0 {
                    Err("zero rotation axis".to_string())
                } else {
                    Ok(())
                }
            }
            WaypointStep::PickBatch { .. } => Ok(()),
        }
    }
}

/// Ordered, immutable list of steps for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    steps: Vec<WaypointStep>,
}

impl Plan {
    /// Wraps a list of steps.
    pub fn new(steps: Vec<WaypointStep>) -> Self {
        Plan { steps }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`.
    pub fn get(&self, index: usize) -> Option<&WaypointStep> {
        self.steps.get(index)
    }

    /// All steps in order.
    pub fn steps(&self) -> &[WaypointStep] {
        &self.steps
    }
}

/// What a single tick of the interpreter did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// No plan is active
    Idle,
    /// Driving towards the current move target
    Driving,
    /// Move target reached; carries the index of the finished step
    WaypointReached(usize),
    /// A timed turn is in progress
    Turning,
    /// A timed turn finished
    TurnCompleted,
    /// An absolute rotation was applied (`true`) or failed (`false`)
    Rotated(bool),
    /// A pick batch ran; carries the number of items picked
    Picked(usize),
    /// The step was malformed and skipped
    Skipped,
    /// The plan was fully consumed and completion was reported
    PlanCompleted,
}

/// Waypoint state machine.
pub struct WaypointInterpreter {
    motion: MotionController,
    sequencer: PickSequencer,
    goal_tolerance: f64,
}

impl WaypointInterpreter {
    /// Creates an interpreter driving with `config` and picking with `sequencer`.
    pub fn new(config: &NavigationConfig, sequencer: PickSequencer) -> Self {
        WaypointInterpreter {
            motion: MotionController::new(config),
            sequencer,
            goal_tolerance: config.goal_tolerance,
        }
    }

    /// Processes at most one step of the active plan.
    pub fn tick<R, B>(
        &self,
        robot: &mut R,
        backend: &B,
        jobs: &JobManager,
        state: &mut RobotRuntimeState,
        inventory: &mut SlotInventory,
    ) -> StepOutcome
    where
        R: Robot + ?Sized,
        B: Backend + ?Sized,
    {
        let position = robot.position();
        state.set_position(position);

        let cursor = state.cursor();
        let step = match state.plan() {
            None => return StepOutcome::Idle,
            Some(plan) => plan.get(cursor).copied(),
        };

        let Some(step) = step else {
            return self.complete_plan(robot, backend, jobs, state, position);
        };

        if let RotationState::Rotating { direction, start_time, duration } = state.rotation() {
            return self.continue_turn(robot, state, direction, start_time, duration);
        }

        if let Err(reason) = step.validate() {
            warn!("Invalid or unrecognized waypoint at index {}: {} ({:?})", cursor, reason, step);
            self.motion.stop(robot);
            state.advance_cursor();
            return StepOutcome::Skipped;
        }

        match step {
            WaypointStep::Move { target_x, target_y, direction } => {
                let target = Vector2::new(target_x, target_y);
                let distance = (target - position).norm();
                if distance < self.goal_tolerance {
                    self.motion.stop(robot);
                    state.advance_cursor();
                    info!(
                        "Reached waypoint {}: ({:.2}, {:.2}), position ({:.2}, {:.2})",
                        cursor + 1,
                        target_x,
                        target_y,
                        position.x,
                        position.y
                    );
                    jobs.log_activity(backend, state, RobotActivity::Working, "Reached Waypoint");
                    StepOutcome::WaypointReached(cursor)
                } else {
                    self.motion.drive(robot, direction);
                    StepOutcome::Driving
                }
            }
            WaypointStep::TimedTurn { direction, duration } => {
                info!("Starting {:?} turn for {:.1} seconds", direction, duration);
                self.motion.rotate(robot, direction);
                state.set_rotation(RotationState::Rotating {
                    direction,
                    start_time: robot.time(),
                    duration,
                });
                StepOutcome::Turning
            }
            WaypointStep::AbsoluteRotate { axis_x, axis_y, axis_z, angle } => {
                self.motion.stop(robot);
                let applied = match robot.set_rotation(Vector3::new(axis_x, axis_y, axis_z), angle) {
                    Ok(()) => {
                        info!(
                            "Rotation waypoint {} applied: axis=({}, {}, {}), angle={:.2} rad",
                            cursor + 1,
                            axis_x,
                            axis_y,
                            axis_z,
                            angle
                        );
                        true
                    }
                    Err(e) => {
                        warn!("Rotation waypoint {} failed: {}", cursor + 1, e);
                        false
                    }
                };
                state.advance_cursor();
                StepOutcome::Rotated(applied)
            }
            WaypointStep::PickBatch { quantity } => {
                self.motion.stop(robot);
                let item = jobs.item_name();
                jobs.log_activity(backend, state, RobotActivity::Working, &format!("Beginning to pick {item}"));
                let picked = match self.sequencer.pick_batch(robot, backend, inventory, quantity) {
                    Ok(picked) => {
                        jobs.log_activity(
                            backend,
                            state,
                            RobotActivity::Working,
                            &format!("Completed picking {picked} {item}(s)"),
                        );
                        picked
                    }
                    Err(e) => {
                        warn!("Pick batch at waypoint {} not run: {}", cursor + 1, e);
                        0
                    }
                };
                state.advance_cursor();
                StepOutcome::Picked(picked)
            }
        }
    }

    fn continue_turn<R: Robot + ?Sized>(
        &self,
        robot: &mut R,
        state: &mut RobotRuntimeState,
        direction: TurnDirection,
        start_time: f64,
        duration: f64,
    ) -> StepOutcome {
        let elapsed = robot.time() - start_time;
        if elapsed >= duration {
            self.motion.stop(robot);
            state.set_rotation(RotationState::Idle);
            state.advance_cursor();
            info!("{:?} turn completed after {:.1} seconds", direction, elapsed);
            StepOutcome::TurnCompleted
        } else {
            self.motion.rotate(robot, direction);
            debug!("Turning {:?}... {:.1}s / {:.1}s", direction, elapsed, duration);
            StepOutcome::Turning
        }
    }

    fn complete_plan<R, B>(
        &self,
        robot: &mut R,
        backend: &B,
        jobs: &JobManager,
        state: &mut RobotRuntimeState,
        position: Vector2<f64>,
    ) -> StepOutcome
    where
        R: Robot + ?Sized,
        B: Backend + ?Sized,
    {
        self.motion.stop(robot);
        info!("Final position: ({:.2}, {:.2})", position.x, position.y);
        match state.job().cloned() {
            Some(mut job) => jobs.report_completion(backend, state, &mut job, position),
            None => warn!("Plan finished without an active job; nothing to report"),
        }
        state.finish_job();
        info!("Robot ready for next job");
        StepOutcome::PlanCompleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShelfbotConfig;
    use crate::backend::MockBackend;
    use crate::core::{Job, JobItem};
    use crate::device::SimRobot;

    struct Rig {
        interpreter: WaypointInterpreter,
        jobs: JobManager,
        state: RobotRuntimeState,
        inventory: SlotInventory,
        robot: SimRobot,
        backend: MockBackend,
    }

    fn rig(steps: Vec<WaypointStep>) -> Rig {
        let config = ShelfbotConfig::default();
        let mut backend = MockBackend::new();
        backend.expect_add_robot_log().returning(|_| Ok(()));
        let mut state = RobotRuntimeState::new(100.0, 0.0);
        state.begin_job(Job::new("job-1", vec![JobItem::new("Can", 1)]), Plan::new(steps));
        Rig {
            interpreter: WaypointInterpreter::new(&config.navigation, PickSequencer::new(&config)),
            jobs: JobManager::new(&config),
            state,
            inventory: SlotInventory::new(),
            robot: SimRobot::new(32),
            backend,
        }
    }

    impl Rig {
        fn tick(&mut self) -> StepOutcome {
            let outcome = self.interpreter.tick(
                &mut self.robot,
                &self.backend,
                &self.jobs,
                &mut self.state,
                &mut self.inventory,
            );
            self.robot.step();
            outcome
        }
    }

    #[test]
    fn idle_without_plan() {
        let mut rig = rig(vec![]);
        rig.state.finish_job();
        assert_eq!(rig.tick(), StepOutcome::Idle);
    }

    #[test]
    fn move_within_tolerance_advances_once() {
        let mut rig = rig(vec![
            WaypointStep::Move { target_x: 0.05, target_y: 0.0, direction: MoveDirection::Forward },
            WaypointStep::Move { target_x: 1.0, target_y: 0.0, direction: MoveDirection::Forward },
        ]);
        assert_eq!(rig.tick(), StepOutcome::WaypointReached(0));
        assert_eq!(rig.state.cursor(), 1);
        assert_eq!(rig.robot.wheels(), [0.0; 4]);
        assert_eq!(rig.tick(), StepOutcome::Driving);
        assert_eq!(rig.state.cursor(), 1);
    }

    #[test]
    fn move_drives_until_reached() {
        let mut rig = rig(vec![WaypointStep::Move {
            target_x: 0.5,
            target_y: 0.0,
            direction: MoveDirection::Forward,
        }]);
        rig.backend.expect_update_job_time().returning(|_, _, _| Ok(()));
        rig.backend.expect_update_job_status().returning(|_, _| Ok(()));
        rig.backend.expect_update_robot_availability().returning(|_, _| Ok(()));
        rig.backend.expect_update_battery_level().returning(|_, _| Ok(()));

        let mut reached = 0;
        for _ in 0..500 {
            match rig.tick() {
                StepOutcome::WaypointReached(_) => reached += 1,
                StepOutcome::PlanCompleted => break,
                _ => {}
            }
        }
        assert_eq!(reached, 1);
        assert!((rig.robot.position() - Vector2::new(0.5, 0.0)).norm() < 0.1);
    }

    #[test]
    fn timed_turn_keeps_direction_and_lasts_its_duration() {
        let mut rig = rig(vec![WaypointStep::TimedTurn { direction: TurnDirection::Right, duration: 1.0 }]);
        let start = rig.robot.time();
        assert_eq!(rig.tick(), StepOutcome::Turning);
        loop {
            match rig.tick() {
                StepOutcome::Turning => assert_eq!(rig.robot.wheels(), [8.0, -8.0, -8.0, 8.0]),
                StepOutcome::TurnCompleted => break,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert!(rig.robot.time() - start >= 1.0);
        assert_eq!(rig.state.rotation(), RotationState::Idle);
        assert_eq!(rig.state.cursor(), 1);
        assert_eq!(rig.robot.wheels(), [0.0; 4]);
    }

    #[test]
    fn absolute_rotation_is_single_tick() {
        let mut rig = rig(vec![WaypointStep::AbsoluteRotate {
            axis_x: 0.0,
            axis_y: 0.0,
            axis_z: 1.0,
            angle: 1.0,
        }]);
        let before = rig.robot.time();
        assert_eq!(rig.tick(), StepOutcome::Rotated(true));
        assert_eq!(rig.state.cursor(), 1);
        assert!((rig.robot.heading() - 1.0).abs() < 1e-9);
        assert!(rig.robot.time() - before < 0.033);
    }

    #[test]
    fn failed_rotation_still_advances() {
        let mut rig = rig(vec![WaypointStep::AbsoluteRotate {
            axis_x: 0.0,
            axis_y: 0.0,
            axis_z: 1.0,
            angle: 1.0,
        }]);
        rig.robot = SimRobot::new(32).without_rotation_field();
        assert_eq!(rig.tick(), StepOutcome::Rotated(false));
        assert_eq!(rig.state.cursor(), 1);
    }

    #[test]
    fn malformed_steps_are_skipped() {
        let mut rig = rig(vec![
            WaypointStep::TimedTurn { direction: TurnDirection::Left, duration: f64::NAN },
            WaypointStep::AbsoluteRotate { axis_x: 0.0, axis_y: 0.0, axis_z: 0.0, angle: 1.0 },
            WaypointStep::Move { target_x: f64::INFINITY, target_y: 0.0, direction: MoveDirection::Forward },
        ]);
        assert_eq!(rig.tick(), StepOutcome::Skipped);
        assert_eq!(rig.tick(), StepOutcome::Skipped);
        assert_eq!(rig.tick(), StepOutcome::Skipped);
        assert_eq!(rig.state.cursor(), 3);
    }

    #[test]
    fn invalid_pick_quantity_moves_no_joints() {
        let mut rig = rig(vec![WaypointStep::PickBatch { quantity: 0 }]);
        assert_eq!(rig.tick(), StepOutcome::Picked(0));
        assert_eq!(rig.robot.joint_command_count(), 0);
        assert_eq!(rig.state.cursor(), 1);
    }

    #[test]
    fn finished_plan_reports_and_clears_gate() {
        let mut rig = rig(vec![]);
        rig.backend.expect_update_job_time().times(1).returning(|_, _, _| Ok(()));
        rig.backend.expect_update_job_status().times(1).returning(|_, _| Ok(()));
        rig.backend.expect_update_robot_availability().times(1).returning(|_, _| Ok(()));
        rig.backend.expect_update_battery_level().times(1).returning(|_, _| Ok(()));

        assert_eq!(rig.tick(), StepOutcome::PlanCompleted);
        assert!(!rig.state.job_in_progress());
        assert!(rig.state.plan().is_none());
        assert_eq!(rig.state.cursor(), 0);
        assert_eq!(rig.state.battery(), 95.0);
        assert_eq!(rig.tick(), StepOutcome::Idle);
    }
}

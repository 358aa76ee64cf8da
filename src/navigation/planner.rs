// src/navigation/planner.rs
// Builds the plan for a job from the scripted route. Routes are fixed per warehouse
// layout; the only job-dependent part is the quantity handed to the pick step.

use serde::{Deserialize, Serialize};

use super::{MoveDirection, Plan, TurnDirection, WaypointStep};

/// One step of a route template. Identical to [`WaypointStep`] except that the pick
/// step carries no quantity; the job fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteStep {
    /// Drive straight to a point
    Move {
        /// Target x
        x: f64,
        /// Target y
        y: f64,
        /// Drive direction
        direction: MoveDirection,
    },
    /// Turn in place for a fixed time
    Turn {
        /// Turn direction
        direction: TurnDirection,
        /// Seconds of turning
        duration: f64,
    },
    /// Set the body orientation directly
    Rotate {
        /// Rotation axis (x, y, z)
        axis: [f64; 3],
        /// Angle in radians
        angle: f64,
    },
    /// Pick the job's items at the current spot
    Pick,
}

/// The warehouse route: back out of the dock, turn towards the can shelf, approach
/// it, pick, back away, turn, square up and return to the dock.
pub fn default_route() -> Vec<RouteStep> {
    vec![
        RouteStep::Move { x: 1.68, y: -3.06, direction: MoveDirection::Backward },
        RouteStep::Turn { direction: TurnDirection::Right, duration: 11.0 },
        RouteStep::Move { x: 1.93, y: -0.59, direction: MoveDirection::Forward },
        RouteStep::Pick,
        RouteStep::Move { x: 1.83, y: -3.20, direction: MoveDirection::Backward },
        RouteStep::Turn { direction: TurnDirection::Left, duration: 3.0 },
        RouteStep::Rotate { axis: [0.0, 0.0, 1.0], angle: 0.0 },
        RouteStep::Move { x: 0.70, y: -3.06, direction: MoveDirection::Backward },
        RouteStep::Move { x: 3.019, y: -3.06, direction: MoveDirection::Forward },
    ]
}

/// Turns a route template into a concrete plan.
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    route: Vec<RouteStep>,
}

impl RoutePlanner {
    /// Planner over the given route template.
    pub fn new(route: Vec<RouteStep>) -> Self {
        RoutePlanner { route }
    }

    /// Plan for a job requesting `quantity` items.
    pub fn build(&self, quantity: i64) -> Plan {
        let steps = self
            .route
            .iter()
            .map(|step| match *step {
                RouteStep::Move { x, y, direction } => WaypointStep::Move { target_x: x, target_y: y, direction },
                RouteStep::Turn { direction, duration } => WaypointStep::TimedTurn { direction, duration },
                RouteStep::Rotate { axis, angle } => WaypointStep::AbsoluteRotate {
                    axis_x: axis[0],
                    axis_y: axis[1],
                    axis_z: axis[2],
                    angle,
                },
                RouteStep::Pick => WaypointStep::PickBatch { quantity },
            })
            .collect();
        Plan::new(steps)
    }
}

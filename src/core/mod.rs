// core/mod.rs

// Bookkeeping side of the robot: runtime state, the job lifecycle and the slot
// inventory. Motion and manipulation live in `navigation` and `manipulation`.

pub mod inventory;
pub mod jobs;
pub mod state;

pub use inventory::{Shelf, Slot, SlotInventory};
pub use jobs::{Job, JobItem, JobManager, JobStatus};
pub use state::{RobotRuntimeState, RotationState};

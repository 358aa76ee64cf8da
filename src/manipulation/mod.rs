//! Manipulation for Shelfbot
//!
//! The pick sequencer runs the fixed per-slot choreographies. A choreography blocks
//! the control loop until it finishes but keeps stepping the simulation clock through
//! every hold, so sensors and timers stay valid.

pub mod profile;

use std::collections::BTreeMap;

use log::{info, warn};
use thiserror::Error;

pub use profile::{JointTarget, Phase, PickProfile, Stage};

use crate::ShelfbotConfig;
use crate::backend::Backend;
use crate::core::SlotInventory;
use crate::device::{Joint, Robot};
use crate::navigation::wait;

/// Pick failures that are reported instead of executed
#[derive(Debug, Error, PartialEq)]
pub enum PickError {
    /// Quantity was zero or negative
    #[error("invalid pick quantity {0} (must be a positive integer)")]
    InvalidQuantity(i64),
    /// No choreography is defined for the slot
    #[error("no pick choreography defined for slot {0}")]
    NoChoreography(u32),
}

/// Runs pick batches against one shelf.
pub struct PickSequencer {
    shelf_name: String,
    profiles: BTreeMap<u32, PickProfile>,
    reset_hold: f64,
}

impl PickSequencer {
    /// Sequencer for the configured shelf and profile table.
    pub fn new(config: &ShelfbotConfig) -> Self {
        PickSequencer {
            shelf_name: config.jobs.shelf_name.clone(),
            profiles: config.manipulation.profiles.clone(),
            reset_hold: config.manipulation.reset_hold_secs,
        }
    }

    /// Picks up to `quantity` items from the available slots in ascending order and
    /// returns how many were actually picked. Asking for more than is available clamps
    /// to what is available.
    pub fn pick_batch<R, B>(
        &self,
        robot: &mut R,
        backend: &B,
        inventory: &mut SlotInventory,
        quantity: i64,
    ) -> Result<usize, PickError>
    where
        R: Robot + ?Sized,
        B: Backend + ?Sized,
    {
        if quantity <= 0 {
            return Err(PickError::InvalidQuantity(quantity));
        }

        let available = inventory.list_available(&self.shelf_name);
        info!("Starting pick sequence for {} item(s); available slots {:?}", quantity, available);

        let mut count = usize::try_from(quantity).unwrap_or(usize::MAX);
        if available.len() < count {
            warn!("Only {} slots available, but {} requested", available.len(), quantity);
            count = available.len();
        }

        let mut picked = 0;
        for i in 0..count {
            let Some(&slot_id) = available.get(i) else {
                warn!("No more available slots for item #{}", i + 1);
                break;
            };
            info!("Picking item #{} from slot {}", i + 1, slot_id);
            match self.pick_slot(robot, slot_id) {
                Ok(()) => {
                    picked += 1;
                    if !inventory.mark_unavailable(backend, &self.shelf_name, slot_id) {
                        warn!("Slot {} stays available locally until the backend confirms", slot_id);
                    }
                }
                Err(e) => warn!("Slot {} skipped: {}", slot_id, e),
            }
        }

        info!("Completed pick sequence: {} of {} picked", picked, quantity);
        Ok(picked)
    }

    /// Runs the choreography for one slot. Fails before any joint moves when the slot
    /// has no profile.
    pub fn pick_slot<R: Robot + ?Sized>(&self, robot: &mut R, slot_id: u32) -> Result<(), PickError> {
        let profile = self.profiles.get(&slot_id).ok_or(PickError::NoChoreography(slot_id))?;
        info!("=== Picking from slot {} ({}) ===", slot_id, profile.label);

        for joint in Joint::all() {
            if let Err(e) = robot.set_joint_position(joint, 0.0) {
                warn!("Could not reset {:?}: {}", joint, e);
            }
        }
        wait(robot, self.reset_hold);

        for phase in profile.choreography() {
            run_phase(robot, &phase);
        }

        info!("Pick and place complete for slot {}", slot_id);
        Ok(())
    }
}

fn run_phase<R: Robot + ?Sized>(robot: &mut R, phase: &Phase) {
    info!(" -> {}", phase.name);
    for target in &phase.targets {
        if let Err(e) = robot.set_joint_position(target.joint, target.position) {
            warn!("{}: {:?} did not accept {:.2}: {}", phase.name, target.joint, target.position, e);
        }
    }
    wait(robot, phase.hold);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockBackend};
    use crate::core::{Shelf, Slot};
    use crate::device::SimRobot;
    use crate::device::sim::Command;
    use rstest::rstest;

    fn inventory(available: &[u32]) -> SlotInventory {
        SlotInventory::from_shelves(vec![Shelf {
            name: "can_shelf".to_string(),
            slots: (1..=4)
                .map(|id| Slot { id, available: available.contains(&id) })
                .collect(),
        }])
    }

    fn sequencer() -> PickSequencer {
        PickSequencer::new(&ShelfbotConfig::default())
    }

    fn accepting_backend() -> MockBackend {
        let mut backend = MockBackend::new();
        backend.expect_update_slot_availability().returning(|_, _, _| Ok(()));
        backend
    }

    #[rstest]
    #[case(0)]
    #[case(-2)]
    fn non_positive_quantity_is_rejected_without_motion(#[case] quantity: i64) {
        let mut robot = SimRobot::new(32);
        let mut backend = MockBackend::new();
        backend.expect_update_slot_availability().never();
        let mut inventory = inventory(&[2, 4]);

        let result = sequencer().pick_batch(&mut robot, &backend, &mut inventory, quantity);
        assert_eq!(result, Err(PickError::InvalidQuantity(quantity)));
        assert_eq!(robot.joint_command_count(), 0);
        assert_eq!(robot.time(), 0.0);
    }

    #[test]
    fn picks_requested_slots_and_marks_them() {
        let mut robot = SimRobot::new(32);
        let mut inventory = inventory(&[2, 4]);

        let picked = sequencer()
            .pick_batch(&mut robot, &accepting_backend(), &mut inventory, 2)
            .unwrap();
        assert_eq!(picked, 2);
        assert!(inventory.list_available("can_shelf").is_empty());
    }

    #[test]
    fn clamps_to_available_slots() {
        let mut robot = SimRobot::new(32);
        let mut inventory = inventory(&[4]);

        let picked = sequencer()
            .pick_batch(&mut robot, &accepting_backend(), &mut inventory, 3)
            .unwrap();
        assert_eq!(picked, 1);
        assert_eq!(inventory.is_available("can_shelf", 4), Some(false));
    }

    #[test]
    fn unimplemented_slot_issues_no_joint_commands() {
        let mut robot = SimRobot::new(32);
        let mut backend = MockBackend::new();
        backend.expect_update_slot_availability().never();
        let mut inventory = inventory(&[1]);

        let picked = sequencer().pick_batch(&mut robot, &backend, &mut inventory, 1).unwrap();
        assert_eq!(picked, 0);
        assert_eq!(robot.joint_command_count(), 0);
        assert_eq!(inventory.is_available("can_shelf", 1), Some(true));
    }

    #[test]
    fn unimplemented_slot_does_not_borrow_another_slot() {
        let mut robot = SimRobot::new(32);
        let mut inventory = inventory(&[1, 2]);

        let picked = sequencer()
            .pick_batch(&mut robot, &accepting_backend(), &mut inventory, 1)
            .unwrap();
        assert_eq!(picked, 0);
        assert_eq!(inventory.list_available("can_shelf"), vec![1, 2]);
    }

    #[test]
    fn backend_failure_keeps_slot_available_but_counts_pick() {
        let mut robot = SimRobot::new(32);
        let mut backend = MockBackend::new();
        backend
            .expect_update_slot_availability()
            .times(1)
            .returning(|_, _, _| Err(BackendError::Malformed("timeout".to_string())));
        let mut inventory = inventory(&[2]);

        let picked = sequencer().pick_batch(&mut robot, &backend, &mut inventory, 1).unwrap();
        assert_eq!(picked, 1);
        assert_eq!(inventory.is_available("can_shelf", 2), Some(true));
    }

    #[test]
    fn every_phase_advances_the_clock() {
        let mut robot = SimRobot::new(32);
        sequencer().pick_slot(&mut robot, 2).unwrap();

        let phases = default_profile_phase_count(2);
        let mut stamps: Vec<f64> = robot
            .commands()
            .filter(|(_, command)| matches!(command, Command::Joint(..)))
            .map(|(time, _)| *time)
            .collect();
        stamps.dedup();
        // One batch of setpoints for the reset plus one per phase, each at a new time.
        assert_eq!(stamps.len(), phases + 1);
        assert!(robot.time() >= profile::default_profiles()[&2].duration() + 2.0);
    }

    #[test]
    fn motor_fault_does_not_abort_choreography() {
        let mut robot = SimRobot::new(32).with_failing_joint(Joint::Arm5);
        assert!(sequencer().pick_slot(&mut robot, 4).is_ok());
        assert_eq!(robot.joint(Joint::FingerLeft), 0.02);
        assert_eq!(robot.joint(Joint::Arm2), 0.0);
    }

    fn default_profile_phase_count(slot: u32) -> usize {
        profile::default_profiles()[&slot].choreography().len()
    }
}

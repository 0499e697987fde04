//! Action Registry
//!
//! This module owns the fixed catalog of vehicle actions the reasoning service
//! may select, and the guard state that makes the door actions idempotent.
//! The registry is the only code path that performs vehicle effects.

use crate::error::UnknownAction;
use crate::vehicle::{Door, DrivingMode, Effect, VehicleEffects, VehicleState};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Every action the assistant can perform on the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleAction {
    OpenDoor(Door),
    CloseDoor(Door),
    OpenAllDoors,
    CloseAllDoors,
    StartEngine,
    StopEngine,
    SetMode(DrivingMode),
    OpenAirConditioner,
    CloseAirConditioner,
}

impl VehicleAction {
    /// The catalog, in the order it is advertised to the reasoning service.
    pub const ALL: [VehicleAction; 17] = [
        VehicleAction::OpenDoor(Door::FrontLeft),
        VehicleAction::OpenDoor(Door::FrontRight),
        VehicleAction::OpenDoor(Door::RearLeft),
        VehicleAction::OpenDoor(Door::RearRight),
        VehicleAction::CloseDoor(Door::FrontLeft),
        VehicleAction::CloseDoor(Door::FrontRight),
        VehicleAction::CloseDoor(Door::RearLeft),
        VehicleAction::CloseDoor(Door::RearRight),
        VehicleAction::OpenAllDoors,
        VehicleAction::CloseAllDoors,
        VehicleAction::StartEngine,
        VehicleAction::StopEngine,
        VehicleAction::SetMode(DrivingMode::Drift),
        VehicleAction::SetMode(DrivingMode::Normal),
        VehicleAction::SetMode(DrivingMode::Race),
        VehicleAction::OpenAirConditioner,
        VehicleAction::CloseAirConditioner,
    ];

    /// The stable identifier used in tool calls.
    pub fn name(self) -> &'static str {
        match self {
            VehicleAction::OpenDoor(Door::FrontLeft) => "open_front_left_door",
            VehicleAction::OpenDoor(Door::FrontRight) => "open_front_right_door",
            VehicleAction::OpenDoor(Door::RearLeft) => "open_rear_left_door",
            VehicleAction::OpenDoor(Door::RearRight) => "open_rear_right_door",
            VehicleAction::CloseDoor(Door::FrontLeft) => "close_front_left_door",
            VehicleAction::CloseDoor(Door::FrontRight) => "close_front_right_door",
            VehicleAction::CloseDoor(Door::RearLeft) => "close_rear_left_door",
            VehicleAction::CloseDoor(Door::RearRight) => "close_rear_right_door",
            VehicleAction::OpenAllDoors => "open_all_doors",
            VehicleAction::CloseAllDoors => "close_all_doors",
            VehicleAction::StartEngine => "start_engine",
            VehicleAction::StopEngine => "stop_engine",
            VehicleAction::SetMode(DrivingMode::Drift) => "set_drift_mode",
            VehicleAction::SetMode(DrivingMode::Normal) => "set_normal_mode",
            VehicleAction::SetMode(DrivingMode::Race) => "set_race_mode",
            VehicleAction::OpenAirConditioner => "open_air_conditioner",
            VehicleAction::CloseAirConditioner => "close_air_conditioner",
        }
    }

    /// The description the reasoning service uses to pick the action.
    pub fn description(self) -> &'static str {
        match self {
            VehicleAction::OpenDoor(Door::FrontLeft) => "Opens the front left door specifically",
            VehicleAction::OpenDoor(Door::FrontRight) => "Opens the front right door specifically",
            VehicleAction::OpenDoor(Door::RearLeft) => "Opens the rear left door specifically",
            VehicleAction::OpenDoor(Door::RearRight) => "Opens the rear right door specifically",
            VehicleAction::CloseDoor(Door::FrontLeft) => "Closes the front left door specifically",
            VehicleAction::CloseDoor(Door::FrontRight) => {
                "Closes the front right door specifically"
            }
            VehicleAction::CloseDoor(Door::RearLeft) => "Closes the rear left door specifically",
            VehicleAction::CloseDoor(Door::RearRight) => "Closes the rear right door specifically",
            VehicleAction::OpenAllDoors => "Opens every door of the car",
            VehicleAction::CloseAllDoors => "Closes every door of the car",
            VehicleAction::StartEngine => "Starts the car engine",
            VehicleAction::StopEngine => "Stops the car engine",
            VehicleAction::SetMode(DrivingMode::Drift) => {
                "Changes the car driving mode to drift mode for enhanced drifting capabilities"
            }
            VehicleAction::SetMode(DrivingMode::Normal) => {
                "Changes the car driving mode to normal mode for regular driving"
            }
            VehicleAction::SetMode(DrivingMode::Race) => {
                "Changes the car driving mode to race mode for maximum performance"
            }
            VehicleAction::OpenAirConditioner => "Turns on the air conditioning system",
            VehicleAction::CloseAirConditioner => "Turns off the air conditioning system",
        }
    }

    /// Short status line shown to the driver once the action runs.
    pub fn status_message(self) -> &'static str {
        match self {
            VehicleAction::OpenDoor(Door::FrontLeft) => "Front left door opening...",
            VehicleAction::OpenDoor(Door::FrontRight) => "Front right door opening...",
            VehicleAction::OpenDoor(Door::RearLeft) => "Rear left door opening...",
            VehicleAction::OpenDoor(Door::RearRight) => "Rear right door opening...",
            VehicleAction::CloseDoor(Door::FrontLeft) => "Front left door closing...",
            VehicleAction::CloseDoor(Door::FrontRight) => "Front right door closing...",
            VehicleAction::CloseDoor(Door::RearLeft) => "Rear left door closing...",
            VehicleAction::CloseDoor(Door::RearRight) => "Rear right door closing...",
            VehicleAction::OpenAllDoors => "All doors opening...",
            VehicleAction::CloseAllDoors => "All doors closing...",
            VehicleAction::StartEngine => "Engine starting...",
            VehicleAction::StopEngine => "Engine stopping...",
            VehicleAction::SetMode(DrivingMode::Drift) => "Switching to DRIFT mode...",
            VehicleAction::SetMode(DrivingMode::Normal) => "Switching to NORMAL driving mode...",
            VehicleAction::SetMode(DrivingMode::Race) => "Switching to RACE mode...",
            VehicleAction::OpenAirConditioner => "Air conditioner turned ON...",
            VehicleAction::CloseAirConditioner => "Air conditioner turned OFF...",
        }
    }

    pub fn descriptor(self) -> ActionDescriptor {
        ActionDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }
}

impl fmt::Display for VehicleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VehicleAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleAction::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// How an action is advertised to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments. Every vehicle action takes none.
    pub parameters: serde_json::Value,
}

/// What executing a known action did to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// At least one effect was performed.
    Applied,
    /// The guard state already matched, so nothing was performed.
    AlreadyInState,
}

/// Owns the vehicle guard state and the effect sink.
pub struct ActionRegistry<E> {
    state: VehicleState,
    effects: E,
}

impl<E: VehicleEffects> ActionRegistry<E> {
    pub fn new(effects: E) -> Self {
        Self {
            state: VehicleState::default(),
            effects,
        }
    }

    /// The actions the reasoning service may choose from.
    pub fn catalog(&self) -> Vec<ActionDescriptor> {
        VehicleAction::ALL.into_iter().map(VehicleAction::descriptor).collect()
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    /// Executes the action named `identifier`.
    ///
    /// Unknown identifiers are logged and reported without touching any state,
    /// so a caller running a batch can skip them and carry on.
    pub fn execute(&mut self, identifier: &str) -> Result<ActionOutcome, UnknownAction> {
        let action = match identifier.parse::<VehicleAction>() {
            Ok(action) => action,
            Err(err) => {
                warn!(action = %identifier, "Ignoring unknown action");
                return Err(err);
            }
        };
        let outcome = self.perform(action);
        info!(%action, ?outcome, "Executed vehicle action");
        Ok(outcome)
    }

    fn perform(&mut self, action: VehicleAction) -> ActionOutcome {
        match action {
            VehicleAction::OpenDoor(door) => self.set_door(door, true),
            VehicleAction::CloseDoor(door) => self.set_door(door, false),
            VehicleAction::OpenAllDoors | VehicleAction::CloseAllDoors => {
                let open = action == VehicleAction::OpenAllDoors;
                let mut outcome = ActionOutcome::AlreadyInState;
                for door in Door::ALL {
                    if self.set_door(door, open) == ActionOutcome::Applied {
                        outcome = ActionOutcome::Applied;
                    }
                }
                outcome
            }
            VehicleAction::StartEngine => {
                self.effects.apply(&Effect::EngineSound);
                self.effects.apply(&Effect::Engine { on: true });
                self.state.engine_on = true;
                ActionOutcome::Applied
            }
            VehicleAction::StopEngine => {
                self.effects.apply(&Effect::Engine { on: false });
                self.state.engine_on = false;
                ActionOutcome::Applied
            }
            VehicleAction::SetMode(mode) => {
                let tuning = mode.tuning();
                self.effects.apply(&Effect::Tuning(tuning));
                self.state.mode = mode;
                self.state.tuning = tuning;
                ActionOutcome::Applied
            }
            VehicleAction::OpenAirConditioner | VehicleAction::CloseAirConditioner => {
                let running = action == VehicleAction::OpenAirConditioner;
                self.effects.apply(&Effect::Vents { running });
                self.state.vents_on = running;
                ActionOutcome::Applied
            }
        }
    }

    fn set_door(&mut self, door: Door, open: bool) -> ActionOutcome {
        if self.state.doors.is_open(door) == open {
            debug!(?door, open, "Door already in requested state");
            return ActionOutcome::AlreadyInState;
        }
        self.effects.apply(&Effect::DoorAnimation {
            door,
            opening: open,
        });
        self.state.doors.set(door, open);
        ActionOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{MockVehicleEffects, SimulatedVehicle};
    use mockall::predicate::eq;

    fn door_effect(door: Door, opening: bool) -> Effect {
        Effect::DoorAnimation { door, opening }
    }

    #[test]
    fn test_catalog_names_are_unique_and_parse_back() {
        let registry = ActionRegistry::new(SimulatedVehicle::default());
        let catalog = registry.catalog();
        assert_eq!(catalog.len(), VehicleAction::ALL.len());

        let mut names: Vec<&str> = catalog.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), catalog.len());

        for action in VehicleAction::ALL {
            assert_eq!(action.name().parse::<VehicleAction>(), Ok(action));
        }
    }

    #[test]
    fn test_actions_are_distinct_set_members() {
        let set: std::collections::HashSet<VehicleAction> =
            VehicleAction::ALL.into_iter().collect();
        assert_eq!(set.len(), VehicleAction::ALL.len());
        assert!(set.contains(&VehicleAction::SetMode(DrivingMode::Drift)));
        assert!(set.contains(&VehicleAction::CloseDoor(Door::RearLeft)));
    }

    #[test]
    fn test_descriptor_has_empty_parameter_schema() {
        let descriptor = VehicleAction::StartEngine.descriptor();
        assert_eq!(descriptor.name, "start_engine");
        assert_eq!(descriptor.description, "Starts the car engine");
        assert_eq!(descriptor.parameters["type"], "object");
        assert_eq!(descriptor.parameters["properties"], serde_json::json!({}));
        assert_eq!(descriptor.parameters["required"], serde_json::json!([]));
    }

    #[test]
    fn test_open_twice_fires_effect_once() {
        for door in Door::ALL {
            let mut effects = MockVehicleEffects::new();
            effects
                .expect_apply()
                .with(eq(door_effect(door, true)))
                .times(1)
                .return_const(());
            let mut registry = ActionRegistry::new(effects);
            let name = VehicleAction::OpenDoor(door).name();

            assert_eq!(registry.execute(name), Ok(ActionOutcome::Applied));
            assert_eq!(registry.execute(name), Ok(ActionOutcome::AlreadyInState));
            assert!(registry.state().doors.is_open(door));
        }
    }

    #[test]
    fn test_close_without_open_is_noop() {
        for door in Door::ALL {
            let mut effects = MockVehicleEffects::new();
            effects.expect_apply().never();
            let mut registry = ActionRegistry::new(effects);

            let outcome = registry.execute(VehicleAction::CloseDoor(door).name());
            assert_eq!(outcome, Ok(ActionOutcome::AlreadyInState));
            assert!(!registry.state().doors.is_open(door));
        }
    }

    #[test]
    fn test_open_then_close_fires_both_animations() {
        let mut effects = MockVehicleEffects::new();
        let mut seq = mockall::Sequence::new();
        effects
            .expect_apply()
            .with(eq(door_effect(Door::RearLeft, true)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        effects
            .expect_apply()
            .with(eq(door_effect(Door::RearLeft, false)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let mut registry = ActionRegistry::new(effects);

        registry.execute("open_rear_left_door").unwrap();
        registry.execute("close_rear_left_door").unwrap();
        assert!(!registry.state().doors.is_open(Door::RearLeft));
    }

    #[test]
    fn test_unknown_action_leaves_state_unchanged() {
        let mut effects = MockVehicleEffects::new();
        effects.expect_apply().never();
        let mut registry = ActionRegistry::new(effects);
        let before = registry.state().clone();

        let err = registry.execute("launch_rockets").unwrap_err();
        assert_eq!(err, UnknownAction("launch_rockets".to_string()));
        assert_eq!(registry.state(), &before);
    }

    #[test]
    fn test_mode_is_reapplied_unconditionally() {
        let drift = DrivingMode::Drift.tuning();
        let mut effects = MockVehicleEffects::new();
        effects
            .expect_apply()
            .with(eq(Effect::Tuning(drift)))
            .times(2)
            .return_const(());
        let mut registry = ActionRegistry::new(effects);

        assert_eq!(registry.execute("set_drift_mode"), Ok(ActionOutcome::Applied));
        assert_eq!(registry.execute("set_drift_mode"), Ok(ActionOutcome::Applied));
        assert_eq!(registry.state().mode, DrivingMode::Drift);
        assert_eq!(registry.state().tuning, drift);
    }

    #[test]
    fn test_engine_start_plays_sound_every_time() {
        let mut registry = ActionRegistry::new(SimulatedVehicle::default());
        registry.execute("start_engine").unwrap();
        registry.execute("start_engine").unwrap();
        assert!(registry.state().engine_on);
        assert_eq!(registry.effects().telemetry().engine_sound_plays, 2);

        registry.execute("stop_engine").unwrap();
        assert!(!registry.state().engine_on);
        assert!(!registry.effects().telemetry().engine_on);
    }

    #[test]
    fn test_air_conditioner_toggles_vents() {
        let mut registry = ActionRegistry::new(SimulatedVehicle::default());
        registry.execute("open_air_conditioner").unwrap();
        assert!(registry.state().vents_on);
        assert!(registry.effects().telemetry().vents_running);
        registry.execute("close_air_conditioner").unwrap();
        assert!(!registry.state().vents_on);
    }

    #[test]
    fn test_all_doors_only_animates_doors_that_change() {
        let mut effects = MockVehicleEffects::new();
        let mut seq = mockall::Sequence::new();
        effects
            .expect_apply()
            .with(eq(door_effect(Door::FrontLeft, true)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        for door in [Door::RearRight, Door::RearLeft] {
            effects
                .expect_apply()
                .with(eq(door_effect(door, true)))
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }
        effects
            .expect_apply()
            .with(eq(door_effect(Door::FrontRight, true)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let mut registry = ActionRegistry::new(effects);

        registry.execute("open_front_left_door").unwrap();
        assert_eq!(registry.execute("open_all_doors"), Ok(ActionOutcome::Applied));
        assert_eq!(
            registry.execute("open_all_doors"),
            Ok(ActionOutcome::AlreadyInState)
        );
        for door in Door::ALL {
            assert!(registry.state().doors.is_open(door));
        }
    }
}

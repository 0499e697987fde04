//! Vehicle Model
//!
//! This module describes the physical side of the car as seen by the action
//! registry: the doors, the driving-mode tuning presets, the guard state the
//! registry keeps, and the opaque effects it hands to the vehicle subsystem.

use serde::{Deserialize, Serialize};
use tracing::info;

/// One of the four doors of the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Door {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Door {
    /// Order in which the "all doors" actions visit the doors.
    pub const ALL: [Door; 4] = [
        Door::FrontLeft,
        Door::RearRight,
        Door::RearLeft,
        Door::FrontRight,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Door::FrontLeft => "fl",
            Door::FrontRight => "fr",
            Door::RearLeft => "rl",
            Door::RearRight => "rr",
        }
    }

    /// Name of the animator trigger that plays the open or close animation.
    pub fn animation_trigger(self, opening: bool) -> String {
        let verb = if opening { "opendoor" } else { "closedoor" };
        format!("{}_{}", verb, self.suffix())
    }
}

/// Numeric tuning parameters of the arcade vehicle controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    pub acceleration: f32,
    pub turn: f32,
    pub downforce: f32,
    pub max_speed: f32,
    pub kart_like: bool,
}

/// The driving modes the assistant can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingMode {
    Normal,
    Drift,
    Race,
}

impl DrivingMode {
    /// The tuning preset applied when this mode is selected.
    pub fn tuning(self) -> TuningParams {
        match self {
            DrivingMode::Normal => TuningParams {
                acceleration: 3.0,
                turn: 4.0,
                downforce: 5.0,
                max_speed: 100.0,
                kart_like: false,
            },
            DrivingMode::Drift => TuningParams {
                acceleration: 7.0,
                turn: 12.0,
                downforce: 5.0,
                max_speed: 110.0,
                kart_like: true,
            },
            DrivingMode::Race => TuningParams {
                acceleration: 5.0,
                turn: 5.0,
                downforce: 15.0,
                max_speed: 250.0,
                kart_like: false,
            },
        }
    }
}

/// Open/closed flag for each door. These are the registry's guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorStates {
    pub front_left: bool,
    pub front_right: bool,
    pub rear_left: bool,
    pub rear_right: bool,
}

impl DoorStates {
    pub fn is_open(&self, door: Door) -> bool {
        match door {
            Door::FrontLeft => self.front_left,
            Door::FrontRight => self.front_right,
            Door::RearLeft => self.rear_left,
            Door::RearRight => self.rear_right,
        }
    }

    pub fn set(&mut self, door: Door, open: bool) {
        let flag = match door {
            Door::FrontLeft => &mut self.front_left,
            Door::FrontRight => &mut self.front_right,
            Door::RearLeft => &mut self.rear_left,
            Door::RearRight => &mut self.rear_right,
        };
        *flag = open;
    }
}

/// State owned by the action registry.
///
/// Door flags guard the open/close actions. The remaining fields record the
/// last value written by the unguarded actions so observers can display it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub doors: DoorStates,
    pub engine_on: bool,
    pub vents_on: bool,
    pub mode: DrivingMode,
    pub tuning: TuningParams,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            doors: DoorStates::default(),
            engine_on: false,
            vents_on: false,
            mode: DrivingMode::Normal,
            tuning: DrivingMode::Normal.tuning(),
        }
    }
}

/// A side effect performed on the vehicle subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Play the open or close animation of a door.
    DoorAnimation { door: Door, opening: bool },
    /// Overwrite the controller's tuning parameters.
    Tuning(TuningParams),
    /// Start or stop the air vent particles.
    Vents { running: bool },
    /// Play the engine start sound.
    EngineSound,
    /// Switch the engine on or off.
    Engine { on: bool },
}

/// The vehicle/animation subsystem, consumed by the action registry.
///
/// Effects are infallible: the subsystem is expected to accept every effect
/// the registry decides to perform.
#[cfg_attr(test, mockall::automock)]
pub trait VehicleEffects: Send {
    fn apply(&mut self, effect: &Effect);
}

/// Live values of the simulated vehicle controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub tuning: TuningParams,
    pub engine_on: bool,
    pub engine_sound_plays: u32,
    pub vents_running: bool,
    pub last_animation: Option<String>,
}

/// An in-memory stand-in for the game engine's vehicle controller.
///
/// It records what a real controller would show and logs each effect.
#[derive(Debug, Clone)]
pub struct SimulatedVehicle {
    telemetry: Telemetry,
}

impl Default for SimulatedVehicle {
    fn default() -> Self {
        Self {
            telemetry: Telemetry {
                tuning: DrivingMode::Normal.tuning(),
                engine_on: false,
                engine_sound_plays: 0,
                vents_running: false,
                last_animation: None,
            },
        }
    }
}

impl SimulatedVehicle {
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

impl VehicleEffects for SimulatedVehicle {
    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::DoorAnimation { door, opening } => {
                let trigger = door.animation_trigger(*opening);
                info!(%trigger, "Triggering door animation");
                self.telemetry.last_animation = Some(trigger);
            }
            Effect::Tuning(params) => {
                info!(
                    acceleration = params.acceleration,
                    turn = params.turn,
                    downforce = params.downforce,
                    max_speed = params.max_speed,
                    kart_like = params.kart_like,
                    "Applying tuning"
                );
                self.telemetry.tuning = *params;
            }
            Effect::Vents { running } => {
                info!(running, "Setting air vents");
                self.telemetry.vents_running = *running;
            }
            Effect::EngineSound => {
                info!("Playing engine sound");
                self.telemetry.engine_sound_plays += 1;
            }
            Effect::Engine { on } => {
                info!(on, "Setting engine");
                self.telemetry.engine_on = *on;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_triggers() {
        assert_eq!(Door::FrontLeft.animation_trigger(true), "opendoor_fl");
        assert_eq!(Door::RearRight.animation_trigger(false), "closedoor_rr");
        assert_eq!(Door::FrontRight.animation_trigger(false), "closedoor_fr");
        assert_eq!(Door::RearLeft.animation_trigger(true), "opendoor_rl");
    }

    #[test]
    fn test_mode_presets() {
        let drift = DrivingMode::Drift.tuning();
        assert_eq!(drift.acceleration, 7.0);
        assert_eq!(drift.turn, 12.0);
        assert_eq!(drift.downforce, 5.0);
        assert_eq!(drift.max_speed, 110.0);
        assert!(drift.kart_like);

        let race = DrivingMode::Race.tuning();
        assert_eq!(race.downforce, 15.0);
        assert_eq!(race.max_speed, 250.0);
        assert!(!race.kart_like);

        assert_eq!(VehicleState::default().tuning, DrivingMode::Normal.tuning());
    }

    #[test]
    fn test_door_states_set_and_read() {
        let mut doors = DoorStates::default();
        for door in Door::ALL {
            assert!(!doors.is_open(door));
        }
        doors.set(Door::RearLeft, true);
        assert!(doors.is_open(Door::RearLeft));
        assert!(!doors.is_open(Door::FrontLeft));
    }

    #[test]
    fn test_simulated_vehicle_records_effects() {
        let mut vehicle = SimulatedVehicle::default();
        vehicle.apply(&Effect::EngineSound);
        vehicle.apply(&Effect::Engine { on: true });
        vehicle.apply(&Effect::Tuning(DrivingMode::Race.tuning()));
        vehicle.apply(&Effect::DoorAnimation {
            door: Door::FrontLeft,
            opening: true,
        });

        let telemetry = vehicle.telemetry();
        assert!(telemetry.engine_on);
        assert_eq!(telemetry.engine_sound_plays, 1);
        assert_eq!(telemetry.tuning.max_speed, 250.0);
        assert_eq!(telemetry.last_animation.as_deref(), Some("opendoor_fl"));
    }

    #[test]
    fn test_vehicle_state_serializes_mode_in_snake_case() {
        let json = serde_json::to_value(VehicleState::default()).unwrap();
        assert_eq!(json["mode"], "normal");
        assert_eq!(json["doors"]["front_left"], false);
    }
}

pub mod actions;
pub mod audio;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod speech;
pub mod vehicle;

pub use actions::{ActionDescriptor, ActionOutcome, ActionRegistry, VehicleAction};
pub use dispatcher::{
    CommandDispatcher, DispatchEvent, DispatchOutcome, DispatcherConfig, DispatcherState,
};
pub use error::{SessionError, TransportError, UnknownAction};
pub use provider::Provider;
pub use session::{SessionHandle, SessionSnapshot};
pub use vehicle::{SimulatedVehicle, VehicleEffects, VehicleState};

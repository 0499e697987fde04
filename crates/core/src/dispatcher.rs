//! Command Dispatcher
//!
//! Turns one recognized utterance into vehicle actions: the utterance is added
//! to the transcript, the transcript and action catalog are sent to the
//! reasoning service, and every action it selects is executed through the
//! action registry and acknowledged in the transcript.

use crate::{
    actions::{ActionOutcome, ActionRegistry, VehicleAction},
    conversation::{ActionCall, ConversationTurn, Transcript},
    error::TransportError,
    reasoning::{DispatchRequest, DispatchResult, ReasoningClient, ToolChoice},
    vehicle::{VehicleEffects, VehicleState},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

/// Upper bound on one reasoning-service round trip unless configured otherwise.
pub const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the dispatcher is in processing an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    #[default]
    Idle,
    AwaitingReasoning,
    Dispatching,
}

/// What happened to one action the reasoning service selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Applied,
    AlreadyInState,
    Unknown,
}

impl From<ActionOutcome> for ExecutionStatus {
    fn from(outcome: ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Applied => ExecutionStatus::Applied,
            ActionOutcome::AlreadyInState => ExecutionStatus::AlreadyInState,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedAction {
    pub action: String,
    pub call_id: String,
    pub status: ExecutionStatus,
}

/// The result of handling one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub executed: Vec<ExecutedAction>,
    pub reply: Option<String>,
    /// Text for the driver's display: the reply if there is one, otherwise
    /// the status line of the last action that ran.
    pub display_message: Option<String>,
}

/// Notifications published while utterances are processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    StateChanged { state: DispatcherState },
    UserTurn { text: String },
    ActionExecuted(ExecutedAction),
    AssistantReply { text: String },
    DisplayMessage { text: String },
    VehicleUpdated { vehicle: VehicleState },
    Error { message: String },
}

/// Knobs for a dispatcher, usually filled from service configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub model: String,
    pub system_prompt: String,
    pub timeout: Duration,
    /// Sliding window over user exchanges; `None` keeps everything.
    pub history_window: Option<usize>,
}

impl DispatcherConfig {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            timeout: DEFAULT_REASONING_TIMEOUT,
            history_window: None,
        }
    }
}

pub struct CommandDispatcher<E> {
    registry: ActionRegistry<E>,
    transcript: Transcript,
    client: Arc<dyn ReasoningClient>,
    model: String,
    timeout: Duration,
    state: DispatcherState,
    events_tx: broadcast::Sender<DispatchEvent>,
}

impl<E: VehicleEffects> CommandDispatcher<E> {
    pub fn new(
        config: DispatcherConfig,
        registry: ActionRegistry<E>,
        client: Arc<dyn ReasoningClient>,
    ) -> Self {
        let mut transcript = Transcript::new(config.system_prompt);
        if let Some(window) = config.history_window {
            transcript = transcript.with_window(window);
        }
        let (events_tx, _) = broadcast::channel(128);
        Self {
            registry,
            transcript,
            client,
            model: config.model,
            timeout: config.timeout,
            state: DispatcherState::Idle,
            events_tx,
        }
    }

    /// Registers a new observer. Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<DispatchEvent> {
        self.events_tx.clone()
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn registry(&self) -> &ActionRegistry<E> {
        &self.registry
    }

    /// Processes one utterance to completion.
    ///
    /// Returns `Ok(None)` for an empty utterance, which is ignored outright.
    /// On a transport failure the user turn stays in the transcript, nothing
    /// else is added, and the dispatcher is idle again.
    #[instrument(skip(self), fields(model = %self.model))]
    pub async fn handle(
        &mut self,
        utterance: &str,
    ) -> Result<Option<DispatchOutcome>, TransportError> {
        let text = utterance.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.transcript.push(ConversationTurn::user(text));
        self.emit(DispatchEvent::UserTurn {
            text: text.to_string(),
        });
        self.transition(DispatcherState::AwaitingReasoning);

        let request = self.request();
        let client = Arc::clone(&self.client);
        let timeout = self.timeout;
        let result = match tokio::time::timeout(timeout, client.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Reasoning request failed");
                self.emit(DispatchEvent::Error {
                    message: e.to_string(),
                });
                self.transition(DispatcherState::Idle);
                return Err(e);
            }
        };

        self.transition(DispatcherState::Dispatching);
        let outcome = self.dispatch(result);
        self.transition(DispatcherState::Idle);
        Ok(Some(outcome))
    }

    fn request(&self) -> DispatchRequest {
        DispatchRequest {
            model: self.model.clone(),
            turns: self.transcript.turns().to_vec(),
            actions: self.registry.catalog(),
            tool_choice: ToolChoice::Auto,
        }
    }

    fn dispatch(&mut self, result: DispatchResult) -> DispatchOutcome {
        if result.is_empty() {
            info!("Reasoning service returned neither text nor actions");
            return DispatchOutcome::default();
        }

        let DispatchResult { reply, calls } = result;
        let reply = reply.filter(|text| !text.is_empty());
        self.transcript.push(ConversationTurn::assistant(
            reply.clone().unwrap_or_default(),
            calls.clone(),
        ));

        let mut outcome = DispatchOutcome::default();
        for call in &calls {
            let executed = self.execute(call);
            if let Ok(action) = call.action.parse::<VehicleAction>() {
                outcome.display_message = Some(action.status_message().to_string());
            }
            self.transcript.push(ConversationTurn::tool_result(call));
            self.emit(DispatchEvent::ActionExecuted(executed.clone()));
            outcome.executed.push(executed);
        }

        if !calls.is_empty() {
            self.emit(DispatchEvent::VehicleUpdated {
                vehicle: self.registry.state().clone(),
            });
        }
        if let Some(text) = &reply {
            info!(reply = %text, "Assistant replied");
            self.emit(DispatchEvent::AssistantReply { text: text.clone() });
            outcome.display_message = Some(text.clone());
        }
        if let Some(text) = &outcome.display_message {
            self.emit(DispatchEvent::DisplayMessage { text: text.clone() });
        }
        outcome.reply = reply;
        outcome
    }

    fn execute(&mut self, call: &ActionCall) -> ExecutedAction {
        let status = match self.registry.execute(&call.action) {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                warn!(call_id = %call.call_id, error = %e, "Skipping action");
                ExecutionStatus::Unknown
            }
        };
        ExecutedAction {
            action: call.action.clone(),
            call_id: call.call_id.clone(),
            status,
        }
    }

    fn transition(&mut self, state: DispatcherState) {
        self.state = state;
        self.emit(DispatchEvent::StateChanged { state });
    }

    fn emit(&self, event: DispatchEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events_tx.send(event);
    }
}

//! Dispatcher Session
//!
//! Runs a `CommandDispatcher` on its own task so that utterances arriving from
//! several inputs (HTTP, WebSocket, console) are processed strictly one at a
//! time. The inbox holds a single pending utterance; anything submitted while
//! one is processing and one is waiting is rejected as busy.

use crate::{
    conversation::ConversationTurn,
    dispatcher::{CommandDispatcher, DispatchEvent, DispatchOutcome, DispatcherState},
    error::{SessionError, TransportError},
    vehicle::{VehicleEffects, VehicleState},
};
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

/// A point-in-time view of a session for observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: DispatcherState,
    pub vehicle: VehicleState,
    pub transcript: Vec<ConversationTurn>,
}

impl SessionSnapshot {
    fn of<E: VehicleEffects>(dispatcher: &CommandDispatcher<E>) -> Self {
        Self {
            state: dispatcher.state(),
            vehicle: dispatcher.registry().state().clone(),
            transcript: dispatcher.transcript().turns().to_vec(),
        }
    }
}

type Reply = oneshot::Sender<Result<Option<DispatchOutcome>, TransportError>>;

struct Submission {
    utterance: String,
    reply: Reply,
}

/// Clonable handle to a running dispatcher session.
#[derive(Clone)]
pub struct SessionHandle {
    submit_tx: mpsc::Sender<Submission>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events_tx: broadcast::Sender<DispatchEvent>,
}

/// Moves `dispatcher` onto a new task and returns a handle to it.
///
/// The task ends once every handle has been dropped.
pub fn spawn<E>(mut dispatcher: CommandDispatcher<E>) -> (SessionHandle, JoinHandle<()>)
where
    E: VehicleEffects + 'static,
{
    let (submit_tx, mut submit_rx) = mpsc::channel::<Submission>(1);
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::of(&dispatcher));
    let events_tx = dispatcher.event_sender();

    let task = tokio::spawn(async move {
        while let Some(Submission { utterance, reply }) = submit_rx.recv().await {
            snapshot_tx.send_modify(|snapshot| {
                snapshot.state = DispatcherState::AwaitingReasoning;
            });
            let result = dispatcher.handle(&utterance).await;
            snapshot_tx.send_replace(SessionSnapshot::of(&dispatcher));
            if reply.send(result).is_err() {
                debug!("Submitter went away before the result was ready");
            }
        }
        info!("Dispatcher session closed");
    });

    (
        SessionHandle {
            submit_tx,
            snapshot_rx,
            events_tx,
        },
        task,
    )
}

impl SessionHandle {
    /// Queues an utterance and waits for it to be processed.
    ///
    /// Empty utterances are ignored without touching the queue.
    pub async fn submit(
        &self,
        utterance: impl Into<String>,
    ) -> Result<Option<DispatchOutcome>, SessionError> {
        let utterance = utterance.into();
        if utterance.trim().is_empty() {
            return Ok(None);
        }

        let (reply, result_rx) = oneshot::channel();
        self.submit_tx
            .try_send(Submission { utterance, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SessionError::Busy,
                mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
            })?;

        let result = result_rx.await.map_err(|_| SessionError::Closed)?;
        Ok(result?)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Waits until the snapshot changes and returns the new value.
    pub async fn changed(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.snapshot_rx
            .changed()
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(self.snapshot_rx.borrow_and_update().clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events_tx.subscribe()
    }
}

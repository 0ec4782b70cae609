//! Translation engine pump built on a statum typestate machine.
//!
//! The pump cycles Waiting -> Processing -> Updating at a fixed interval:
//! collect every queued controller event, run each through the session state
//! machine in timestamp order, then publish the produced OS actions and a
//! state snapshot. [`EngineHandle`] owns the spawned task and the shutdown
//! token.

use statum::{machine, state, transition};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::actions::Action;
use crate::controller::types::RawControllerEvent;
use crate::engine::calibration::CalibrationStep;
use crate::engine::error::EngineError;
use crate::engine::session::{Overlay, PrimaryMode, SessionState};

// Event batch carried into the processing state
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<RawControllerEvent>,
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Pump interval. Cursor motion is latency sensitive, so this is far
    /// shorter than a typical input-polling interval.
    pub processing_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            processing_interval_ms: 10,
        }
    }
}

/// Engine state broadcast to anything that wants to render it.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSnapshot {
    pub controller_on: bool,
    pub primary: PrimaryMode,
    pub overlay: Option<Overlay>,
    pub calibration_step: CalibrationStep,
    pub cursor: (i32, i32),
}

impl EngineSnapshot {
    fn of(session: &SessionState) -> Self {
        Self {
            controller_on: session.is_on(),
            primary: session.primary(),
            overlay: session.overlay(),
            calibration_step: session.calibration_step(),
            cursor: session.cursor(),
        }
    }
}

// Pump states
#[state]
#[derive(Debug, Clone)]
pub enum PumpState {
    Waiting,
    Processing(EventBatch),
    Updating,
}

#[machine]
pub struct TranslationEngine<PumpState> {
    // Receiver for raw controller events
    event_receiver: mpsc::Receiver<RawControllerEvent>,

    // Pump settings
    settings: EngineSettings,

    // The per-controller session state machine
    session: SessionState,

    // Actions produced in this cycle, flushed in the updating state
    pending_actions: Vec<Action>,

    // Outgoing action queue towards the platform executor
    action_sender: mpsc::Sender<Action>,

    // Watch channel for state snapshots
    snapshot_sender: watch::Sender<EngineSnapshot>,
}

impl<S: PumpStateTrait> TranslationEngine<S> {
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_sender.subscribe()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

impl TranslationEngine<Waiting> {
    pub fn create(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        session: SessionState,
        settings: Option<EngineSettings>,
        action_sender: mpsc::Sender<Action>,
    ) -> Result<Self, EngineError> {
        let settings = settings.unwrap_or_default();
        info!("Creating translation engine with settings: {:?}", settings);

        let (snapshot_sender, _) = watch::channel(EngineSnapshot::of(&session));
        debug!("Created watch channel for engine snapshots");

        Ok(Self::builder()
            .event_receiver(event_receiver)
            .settings(settings)
            .session(session)
            .pending_actions(Vec::new())
            .action_sender(action_sender)
            .snapshot_sender(snapshot_sender)
            .build())
    }
}

#[transition]
impl TranslationEngine<Waiting> {
    /// Drains every queued event and transitions to Processing.
    pub fn collect(mut self) -> ::core::result::Result<TranslationEngine<Processing>, EngineError> {
        let mut events = Vec::new();
        loop {
            match self.event_receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    error!("Controller event channel disconnected!");
                    return Err(EngineError::EventReceiveError(
                        "Controller event channel disconnected".to_string(),
                    ));
                }
            }
        }

        if !events.is_empty() {
            debug!("Collected batch of {} controller events", events.len());
        }

        Ok(self.transition_with(EventBatch { events }))
    }
}

#[transition]
impl TranslationEngine<Processing> {
    /// Runs the batch through the session in timestamp order and transitions
    /// to Updating with the produced actions queued.
    pub fn apply_events(mut self) -> ::core::result::Result<TranslationEngine<Updating>, EngineError> {
        let mut events = self.state_data.events.clone();

        // Device backends can interleave button and pose events; the session
        // depends on seeing them in wall order.
        events.sort_by_key(|event| event.timestamp());

        for event in &events {
            let actions = self.session.on_event(event);
            if !actions.is_empty() {
                debug!("Event {:?} produced {} actions", event, actions.len());
                self.pending_actions.extend(actions);
            }
        }

        Ok(self.transition())
    }
}

#[transition]
impl TranslationEngine<Updating> {
    /// Flushes queued actions and the snapshot, then returns to Waiting.
    pub async fn publish(mut self) -> ::core::result::Result<TranslationEngine<Waiting>, EngineError> {
        for action in self.pending_actions.drain(..) {
            debug!("Dispatching {}", action);
            if let Err(e) = self.action_sender.send(action).await {
                error!("Failed to dispatch action: {}", e);
                return Err(EngineError::StateUpdateError(format!(
                    "Action channel closed: {}",
                    e
                )));
            }
        }

        let snapshot = EngineSnapshot::of(&self.session);
        if let Err(e) = self.snapshot_sender.send(snapshot) {
            error!("Failed to broadcast engine snapshot: {}", e);
            return Err(EngineError::StateUpdateError(format!(
                "Snapshot channel closed: {}",
                e
            )));
        }

        Ok(self.transition())
    }
}

/// Owner of the spawned engine task.
pub struct EngineHandle {
    snapshot_receiver: watch::Receiver<EngineSnapshot>,
    shutdown: CancellationToken,
}

impl EngineHandle {
    pub fn spawn(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        session: SessionState,
        settings: Option<EngineSettings>,
        action_sender: mpsc::Sender<Action>,
    ) -> Result<Self, EngineError> {
        let engine = TranslationEngine::create(event_receiver, session, settings, action_sender)?;
        let snapshot_receiver = engine.subscribe();
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        info!("Spawning translation engine task");
        tokio::spawn(async move {
            if let Err(e) = run_engine_loop(engine, token).await {
                error!("Translation engine terminated with error: {}", e);
            } else {
                info!("Translation engine finished");
            }
        });

        Ok(Self {
            snapshot_receiver,
            shutdown,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_receiver.clone()
    }

    /// Requests the engine task to stop after the current cycle.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn run_engine_loop(
    mut engine: TranslationEngine<Waiting>,
    shutdown: CancellationToken,
) -> Result<(), EngineError> {
    let interval_ms = engine.settings().processing_interval_ms;
    let mut interval_timer =
        tokio::time::interval(tokio::time::Duration::from_millis(interval_ms));
    info!("Entering engine loop with {}ms interval", interval_ms);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Engine loop shutting down");
                return Ok(());
            }
            _ = interval_timer.tick() => {}
        }

        let processing = engine.collect()?;
        let updating = processing.apply_events()?;
        engine = updating.publish().await?;
    }
}

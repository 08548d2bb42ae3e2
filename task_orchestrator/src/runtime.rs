//! Event plumbing between the voice intake, the orchestrator loop, and
//! spoken goal feedback.

use crate::feedback;
use crate::orchestrator::Orchestrator;
use crate::speech::Speaker;
use automation_lib::{Intent, SpeechTranscription, VoiceConfig};
use command_parser::{strip_wake_word, CommandInterpreter, Unrecognized};
use navigation_executor::{GoalOutcome, NavigationExecutor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    Intent(Intent),
    Unrecognized(String),
    Shutdown,
}

/// An event plus the emergency stop count at the time it was queued
#[derive(Debug)]
struct Stamped {
    stops: u64,
    event: RuntimeEvent,
}

/// Sending side used by speech intakes. Interprets utterances itself so an
/// emergency stop can halt the base without waiting for the orchestrator.
#[derive(Clone)]
pub struct RuntimeHandle {
    events: mpsc::Sender<Stamped>,
    stops: Arc<AtomicU64>,
    executor: NavigationExecutor,
    interpreter: CommandInterpreter,
    voice: VoiceConfig,
}

/// Receiving side of the runtime channel. Intents queued before the most
/// recent emergency stop are dropped on the way out; safety stops always
/// pass.
pub struct EventQueue {
    rx: mpsc::Receiver<Stamped>,
    stops: Arc<AtomicU64>,
}

pub fn channel(executor: NavigationExecutor, voice: VoiceConfig) -> (RuntimeHandle, EventQueue) {
    let (events, rx) = mpsc::channel(EVENT_CAPACITY);
    let stops = Arc::new(AtomicU64::new(0));
    let handle = RuntimeHandle {
        events,
        stops: stops.clone(),
        executor,
        interpreter: CommandInterpreter::new(),
        voice,
    };
    (handle, EventQueue { rx, stops })
}

impl RuntimeHandle {
    /// Filter, interpret and post one utterance. Returns `false` once the
    /// orchestrator loop has gone away.
    pub async fn submit_utterance(&self, heard: SpeechTranscription) -> bool {
        if heard.is_empty() {
            return true;
        }
        if !heard.is_confident(self.voice.min_confidence) {
            tracing::debug!(
                confidence = heard.confidence,
                "Ignoring low-confidence utterance '{}'",
                heard.text
            );
            return true;
        }

        let interpreted = if self.voice.require_wake_word {
            match self
                .interpreter
                .interpret_after_wake_word(&heard.text, &self.voice.wake_word)
            {
                Some(result) => result,
                None => {
                    tracing::debug!("No wake word in '{}'", heard.text);
                    return true;
                }
            }
        } else {
            let command = strip_wake_word(&heard.text, &self.voice.wake_word)
                .unwrap_or_else(|| heard.text.clone());
            self.interpreter.interpret(&command)
        };

        let event = match interpreted {
            Ok(Intent::EmergencyStop) => {
                tracing::warn!("Emergency stop heard, halting");
                // Everything queued so far is now stale
                self.stops.fetch_add(1, Ordering::SeqCst);
                self.executor.emergency_stop().await;
                RuntimeEvent::Intent(Intent::EmergencyStop)
            }
            Ok(intent) => RuntimeEvent::Intent(intent),
            Err(Unrecognized(text)) => RuntimeEvent::Unrecognized(text),
        };
        self.post(event).await
    }

    pub async fn end_of_input(&self) {
        let _ = self.post(RuntimeEvent::Shutdown).await;
    }

    async fn post(&self, event: RuntimeEvent) -> bool {
        let stamped = Stamped {
            stops: self.stops.load(Ordering::SeqCst),
            event,
        };
        self.events.send(stamped).await.is_ok()
    }
}

impl EventQueue {
    /// Next event worth dispatching, or `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<RuntimeEvent> {
        loop {
            let stamped = self.rx.recv().await?;
            if let Some(event) = self.admit(stamped) {
                return Some(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<RuntimeEvent, TryRecvError> {
        loop {
            let stamped = self.rx.try_recv()?;
            if let Some(event) = self.admit(stamped) {
                return Ok(event);
            }
        }
    }

    fn admit(&self, stamped: Stamped) -> Option<RuntimeEvent> {
        let current = self.stops.load(Ordering::SeqCst);
        match stamped.event {
            RuntimeEvent::Intent(intent) if stamped.stops < current && !intent.is_safety_stop() => {
                tracing::warn!(%intent, "Dropping command queued before emergency stop");
                None
            }
            event => Some(event),
        }
    }
}

/// Orchestrator event loop. Returns on shutdown signal, a `Shutdown` event,
/// or when every sender is gone.
pub async fn run(
    orchestrator: &mut Orchestrator,
    mut events: EventQueue,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(RuntimeEvent::Intent(intent)) => {
                    let _ = orchestrator.handle_intent(intent).await;
                }
                Some(RuntimeEvent::Unrecognized(text)) => orchestrator.handle_unrecognized(&text),
                Some(RuntimeEvent::Shutdown) | None => break,
            }
        }
    }
    tracing::info!("Orchestrator loop finished");
}

/// Speak terminal goal outcomes as they arrive
pub fn spawn_outcome_feedback(
    mut outcomes: broadcast::Receiver<GoalOutcome>,
    speaker: Arc<dyn Speaker>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                outcome = outcomes.recv() => {
                    let outcome = match outcome {
                        Ok(outcome) => outcome,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Goal outcome stream lagged");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    tracing::info!(
                        goal = %outcome.id,
                        "Goal finished {} ({}/{} legs)",
                        outcome.state,
                        outcome.completed_legs,
                        outcome.total_legs
                    );
                    if let Some(spoken) = feedback::goal_outcome(&outcome) {
                        speaker.speak(spoken);
                    }
                }
            }
        }
    })
}

//! Sales training simulator session.
//!
//! Wraps a training-channel [`Conversation`] with a preset and an evaluation
//! phase:
//! - Active -> Active (manager/client exchanges)
//! - Active -> Evaluated (scoring succeeded, log has at least two turns)
//! - Evaluated -> Evaluated (re-scoring replaces the evaluation)
//! - any -> Active (preset selected or new session started; everything cleared)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use autoimport_core::{AutoImportConfig, Channel, ConversationEvent, Evaluation, Preset};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::conversation::{Conversation, ConversationSettings, SendOutcome};
use crate::error::ChatError;
use crate::lifecycle::Race;
use crate::transport::{ExchangeBackend, FailureKind, TrainingBackend};

/// Scoring needs at least one manager line and one client line.
pub const MIN_TURNS_FOR_EVALUATION: usize = 2;

/// Catalog used until (or unless) the backend provides its own.
pub fn builtin_presets() -> Vec<Preset> {
    [
        ("easy", "🟢 Лёгкий клиент", "Вежливый, готов к покупке, мало возражений", 1),
        ("medium", "🟡 Средний клиент", "Сомневается, есть скрытые возражения", 2),
        ("hard", "🔴 Сложный клиент", "Скептик, много возражений, требует доказательств", 3),
        ("nightmare", "💀 Кошмарный клиент", "Хам, не собирается покупать, провоцирует", 4),
    ]
    .into_iter()
    .map(|(id, name, description, difficulty)| Preset {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        difficulty,
    })
    .collect()
}

// =============================================================================
// State
// =============================================================================

/// Phase of a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorState {
    /// Practicing; turns are accepted.
    Active,
    /// Scored; turns are ignored until a new session starts.
    Evaluated,
}

impl fmt::Display for SimulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorState::Active => write!(f, "Active"),
            SimulatorState::Evaluated => write!(f, "Evaluated"),
        }
    }
}

impl SimulatorState {
    pub fn accepts_turns(&self) -> bool {
        matches!(self, SimulatorState::Active)
    }
}

/// What `request_evaluation` did.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Ready(Evaluation),
    /// Too few turns, or an exchange is in flight.
    Ignored,
    /// A new session started while scoring was in flight.
    Superseded,
}

struct Phase {
    preset: Preset,
    state: SimulatorState,
    evaluation: Option<Evaluation>,
}

// =============================================================================
// TrainingSession
// =============================================================================

/// One trainee's simulator session. Independent of any customer conversation:
/// its own session identifier, failure counter and fallback script.
pub struct TrainingSession {
    conversation: Conversation,
    backend: Arc<dyn TrainingBackend>,
    catalog: Mutex<Vec<Preset>>,
    phase: Mutex<Phase>,
}

impl TrainingSession {
    /// Start an active session on `config.simulator.default_preset`, or on the
    /// first built-in preset if that id is unknown.
    pub fn new<B>(backend: Arc<B>, config: &AutoImportConfig) -> Result<Self, ChatError>
    where
        B: TrainingBackend + 'static,
    {
        let catalog = builtin_presets();
        let preset = catalog
            .iter()
            .find(|p| p.id == config.simulator.default_preset)
            .or_else(|| catalog.first())
            .cloned()
            .ok_or_else(|| ChatError::UnknownPreset(config.simulator.default_preset.clone()))?;

        let exchange: Arc<dyn ExchangeBackend> = backend.clone();
        let conversation = Conversation::new(
            Channel::Training,
            exchange,
            ConversationSettings::training(config),
        );
        conversation.restart(Some(preset.id.clone()))?;

        Ok(Self {
            conversation,
            backend,
            catalog: Mutex::new(catalog),
            phase: Mutex::new(Phase {
                preset,
                state: SimulatorState::Active,
                evaluation: None,
            }),
        })
    }

    /// Fetch the preset catalog. Keeps the current catalog if the backend is
    /// unavailable or returns nothing.
    pub async fn load_presets(&self) -> Result<Vec<Preset>, ChatError> {
        let fetched = match self.conversation.controller().race(self.backend.presets()).await {
            Race::Settled(result) => result,
            Race::TimedOut => Err(FailureKind::Timeout),
            Race::Aborted => return self.presets(),
        };

        let mut catalog = self.lock_catalog()?;
        match fetched {
            Ok(presets) if !presets.is_empty() => {
                tracing::info!(count = presets.len(), "Loaded simulator presets");
                *catalog = presets;
            }
            Ok(_) => tracing::warn!("Backend returned no presets, keeping built-in catalog"),
            Err(e) => tracing::warn!(error = %e, "Failed to load presets, keeping built-in catalog"),
        }
        Ok(catalog.clone())
    }

    pub fn presets(&self) -> Result<Vec<Preset>, ChatError> {
        Ok(self.lock_catalog()?.clone())
    }

    pub fn current_preset(&self) -> Result<Preset, ChatError> {
        Ok(self.lock_phase()?.preset.clone())
    }

    pub fn state(&self) -> Result<SimulatorState, ChatError> {
        Ok(self.lock_phase()?.state)
    }

    pub fn evaluation(&self) -> Result<Option<Evaluation>, ChatError> {
        Ok(self.lock_phase()?.evaluation.clone())
    }

    /// The underlying conversation, for transcript snapshots and events.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.conversation.subscribe()
    }

    /// Switch to preset `id` and start a fresh session on it.
    pub fn select_preset(&self, id: &str) -> Result<Preset, ChatError> {
        let preset = self
            .lock_catalog()?
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownPreset(id.to_string()))?;

        let mut phase = self.lock_phase()?;
        self.conversation.restart(Some(preset.id.clone()))?;
        *phase = Phase {
            preset: preset.clone(),
            state: SimulatorState::Active,
            evaluation: None,
        };
        tracing::info!(preset = %preset.id, difficulty = preset.difficulty, "Preset selected");
        self.conversation.emit(ConversationEvent::PresetSelected {
            preset_id: preset.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(preset)
    }

    /// Start over on the current preset.
    pub fn new_session(&self) -> Result<(), ChatError> {
        let mut phase = self.lock_phase()?;
        self.conversation.restart(Some(phase.preset.id.clone()))?;
        phase.state = SimulatorState::Active;
        phase.evaluation = None;
        Ok(())
    }

    /// Send a manager line. Ignored once the session has been evaluated.
    pub async fn send_turn(&self, text: &str) -> Result<SendOutcome, ChatError> {
        if !self.state()?.accepts_turns() {
            tracing::debug!("Session already evaluated, turn ignored");
            return Ok(SendOutcome::Ignored);
        }
        self.conversation.send_turn(text).await
    }

    pub async fn retry_last_turn(&self) -> Result<SendOutcome, ChatError> {
        if !self.state()?.accepts_turns() {
            return Ok(SendOutcome::Ignored);
        }
        self.conversation.retry_last_turn().await
    }

    /// Score the transcript so far.
    ///
    /// Ignored with fewer than [`MIN_TURNS_FOR_EVALUATION`] turns or while an
    /// exchange is in flight. A failed or out-of-range evaluation leaves the
    /// session as it was and returns `ChatError::EvaluationUnavailable`.
    pub async fn request_evaluation(&self) -> Result<EvaluationOutcome, ChatError> {
        let Some(_busy) = self.conversation.begin() else {
            return Ok(EvaluationOutcome::Ignored);
        };
        let preset_id = self.lock_phase()?.preset.id.clone();
        let (epoch, turn_count, history) = self.conversation.transcript_snapshot()?;
        if turn_count < MIN_TURNS_FOR_EVALUATION {
            tracing::debug!(turn_count, "Not enough turns to evaluate");
            return Ok(EvaluationOutcome::Ignored);
        }

        tracing::info!(preset = %preset_id, turn_count, "Requesting evaluation");
        let result = match self
            .conversation
            .controller()
            .race(self.backend.evaluate(&preset_id, history))
            .await
        {
            Race::Settled(Ok(evaluation)) => evaluation.validate().map(|()| evaluation),
            Race::Settled(Err(failure)) => Err(failure.to_string()),
            Race::TimedOut => Err(FailureKind::Timeout.to_string()),
            Race::Aborted => return Ok(EvaluationOutcome::Superseded),
        };

        let mut phase = self.lock_phase()?;
        if self.conversation.epoch()? != epoch {
            return Ok(EvaluationOutcome::Superseded);
        }
        match result {
            Ok(evaluation) => {
                tracing::info!(
                    preset = %preset_id,
                    overall_score = evaluation.overall_score,
                    "Evaluation ready"
                );
                phase.state = SimulatorState::Evaluated;
                phase.evaluation = Some(evaluation.clone());
                self.conversation.emit(ConversationEvent::EvaluationReady {
                    overall_score: evaluation.overall_score,
                    timestamp: Utc::now(),
                });
                Ok(EvaluationOutcome::Ready(evaluation))
            }
            Err(reason) => {
                tracing::warn!(preset = %preset_id, reason = %reason, "Evaluation failed");
                self.conversation.emit(ConversationEvent::EvaluationFailed {
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                Err(ChatError::EvaluationUnavailable(reason))
            }
        }
    }

    fn lock_phase(&self) -> Result<MutexGuard<'_, Phase>, ChatError> {
        self.phase
            .lock()
            .map_err(|e| ChatError::StatePoisoned(format!("simulator lock poisoned: {}", e)))
    }

    fn lock_catalog(&self) -> Result<MutexGuard<'_, Vec<Preset>>, ChatError> {
        self.catalog
            .lock()
            .map_err(|e| ChatError::StatePoisoned(format!("preset catalog lock poisoned: {}", e)))
    }
}

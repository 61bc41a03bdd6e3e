//! The execution saga: apply a resolved pipeline, remember how to undo it.
//!
//! Setup applies the plan in order and persists a compensation for every
//! effect that changed shared state. A failing effect stops setup; what was
//! already applied stays applied and stays recorded. Teardown replays the
//! recorded compensations newest first, best-effort, and forgets only the
//! ones that succeeded, so running it again retries the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::action::{ActionValue, AudioRouting, DisplayConfig};
use crate::config::SagaConfig;
use crate::error::{CollaboratorError, DeckError, EffectError, Result};
use crate::reify::ResolvedPipeline;
use crate::types::{ActionId, ContextId, Target};

// ---------------------------------------------------------------------------
// Compensation / TeardownAction
// ---------------------------------------------------------------------------

/// What an effect overwrote, captured so it can be put back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Compensation {
    RestoreDisplay {
        previous: DisplayConfig,
    },
    RestoreAudio {
        previous: AudioRouting,
    },
    /// An emulator settings file edited for the session. `None` means the
    /// file did not exist and should be removed.
    RestoreSettingsFile {
        path: PathBuf,
        previous_contents: Option<String>,
    },
    RestoreLaunchOptions {
        app_id: String,
        previous: String,
    },
    CloseSecondaryApp {
        window_id: String,
    },
}

impl Compensation {
    pub fn kind(&self) -> &'static str {
        match self {
            Compensation::RestoreDisplay { .. } => "restore_display",
            Compensation::RestoreAudio { .. } => "restore_audio",
            Compensation::RestoreSettingsFile { .. } => "restore_settings_file",
            Compensation::RestoreLaunchOptions { .. } => "restore_launch_options",
            Compensation::CloseSecondaryApp { .. } => "close_secondary_app",
        }
    }
}

/// A persisted compensation. Lives until teardown undoes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeardownAction {
    pub id: Uuid,
    /// The node whose effect this undoes.
    pub action_id: ActionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_context: Option<ContextId>,
    pub compensation: Compensation,
    pub recorded_at: DateTime<Utc>,
}

impl TeardownAction {
    pub fn new(
        action_id: ActionId,
        owning_context: Option<ContextId>,
        compensation: Compensation,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id,
            owning_context,
            compensation,
            recorded_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Performs OS-level effects. Only success or failure matters here.
pub trait EffectHost {
    /// Apply `value`. Returns how to undo it when it changed shared state.
    fn apply(
        &self,
        action_id: &ActionId,
        value: &ActionValue,
    ) -> std::result::Result<Option<Compensation>, CollaboratorError>;

    fn compensate(&self, compensation: &Compensation) -> std::result::Result<(), CollaboratorError>;
}

/// The append-only compensation log shared across processes.
pub trait TeardownLog {
    fn append(&self, action: &TeardownAction) -> Result<()>;

    /// Entries in persistence order; all of them when `context` is `None`.
    fn list(&self, context: Option<&ContextId>) -> Result<Vec<TeardownAction>>;

    /// Drop the given entries in one step.
    fn remove(&self, ids: &[Uuid]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Saga
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SetupReport {
    pub applied: usize,
    pub recorded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeardownReport {
    pub undone: Vec<Uuid>,
    /// Left in the log for the next pass.
    pub failed: Vec<Uuid>,
}

pub struct Saga<'a> {
    host: &'a dyn EffectHost,
    log: &'a dyn TeardownLog,
    settle_delay: Duration,
}

impl<'a> Saga<'a> {
    pub fn new(host: &'a dyn EffectHost, log: &'a dyn TeardownLog, cfg: &SagaConfig) -> Self {
        Self {
            host,
            log,
            settle_delay: cfg.settle_delay(),
        }
    }

    /// Apply `pipeline` for `target`, recording compensations under
    /// `context`. Returns after the settle delay once every step succeeded.
    pub fn setup(
        &self,
        context: Option<&ContextId>,
        pipeline: &ResolvedPipeline,
        target: Target,
    ) -> Result<SetupReport> {
        if pipeline.target != target {
            return Err(DeckError::TargetMismatch {
                resolved: pipeline.target.to_string(),
                requested: target.to_string(),
            });
        }

        let mut report = SetupReport::default();
        for step in pipeline.plan() {
            tracing::info!(action = %step.action_id, kind = %step.value.kind(), "applying");
            let compensation = self.host.apply(&step.action_id, &step.value).map_err(|e| {
                tracing::error!(action = %step.action_id, error = %e, "effect failed");
                EffectError {
                    action_id: step.action_id.clone(),
                    message: e.to_string(),
                }
            })?;
            report.applied += 1;

            if let Some(compensation) = compensation {
                let entry =
                    TeardownAction::new(step.action_id.clone(), context.cloned(), compensation);
                if let Err(e) = self.log.append(&entry) {
                    tracing::error!(
                        action = %step.action_id,
                        error = %e,
                        "effect applied but its compensation was not recorded; it cannot be undone"
                    );
                    return Err(e);
                }
                report.recorded += 1;
            }
        }

        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
        tracing::info!(%target, applied = report.applied, "setup complete");
        Ok(report)
    }

    /// Undo recorded effects newest first. Failures are logged, skipped and
    /// kept for the next pass.
    pub fn teardown(&self, context: Option<&ContextId>) -> Result<TeardownReport> {
        let entries = self.log.list(context)?;
        let mut report = TeardownReport::default();

        for entry in entries.iter().rev() {
            match self.host.compensate(&entry.compensation) {
                Ok(()) => {
                    tracing::info!(
                        action = %entry.action_id,
                        kind = entry.compensation.kind(),
                        "undone"
                    );
                    report.undone.push(entry.id);
                }
                Err(e) => {
                    tracing::warn!(
                        action = %entry.action_id,
                        error = %e,
                        "compensation failed, keeping it for the next teardown"
                    );
                    report.failed.push(entry.id);
                }
            }
        }

        if !report.undone.is_empty() {
            self.log.remove(&report.undone)?;
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

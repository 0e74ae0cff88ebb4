//! Debounced autosave of the ledger into the study store.
//!
//! A single worker task owns the debounce timer and performs every save, so
//! saves never overlap. Ledger changes that land while a save is running are
//! picked up by the watch channel once the save returns and schedule exactly
//! one follow-up save.
//!
//! Phases: `Disabled → Debouncing → Saving → Saved | Error`, back to
//! `Debouncing` on the next change. A reset returns to `Disabled` at once;
//! the outcome of a save that straddles a reset is discarded.

use crate::config::AutosaveConfig;
use crate::consolidate::consolidate;
use crate::ledger::{LedgerSnapshot, ResultsLedger};
use crate::session::{GateState, SessionGate};
use crate::store::StudyStore;
use crate::types::{CalcType, ConsolidatedSnapshotRow, WorkshopSessionContext};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant};

/// Where the pipeline currently is
#[derive(Clone, Debug, PartialEq, Default)]
pub enum AutosavePhase {
    #[default]
    Disabled,
    /// Enabled with nothing pending
    Idle,
    Debouncing,
    Saving,
    /// Last save succeeded; carries the row's `updated_at_millis`
    Saved(i64),
    Error(String),
}

/// Observable autosave state for the UI
#[derive(Clone, Debug, PartialEq, Default)]
pub struct AutosaveStatus {
    pub enabled: bool,
    pub is_saving: bool,
    pub last_saved_at_millis: Option<i64>,
    pub last_error: Option<String>,
    pub phase: AutosavePhase,
    /// Successful saves since the pipeline started or was last reset
    ///
    /// A reset publishes the default status, which zeroes this counter.
    pub saves_completed: u64,
}

enum Command {
    Flush(oneshot::Sender<Result<Option<ConsolidatedSnapshotRow>>>),
    Reset,
    Shutdown,
}

struct Shared {
    /// Bumped by every reset
    epoch: AtomicU64,
    status: watch::Sender<AutosaveStatus>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn update(&self, f: impl FnOnce(&mut AutosaveStatus)) {
        self.status.send_modify(f);
    }

    fn set_idle(&self, enabled: bool) {
        self.update(|s| {
            s.enabled = enabled;
            s.is_saving = false;
            s.phase = if enabled {
                AutosavePhase::Idle
            } else {
                AutosavePhase::Disabled
            };
        });
    }
}

/// Handle to the autosave worker
///
/// Cheap to clone; all clones drive the same worker.
#[derive(Clone)]
pub struct AutosavePipeline {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl AutosavePipeline {
    /// Start the worker for `ledger`
    ///
    /// Must be called from within a tokio runtime. Entries already in the
    /// ledger do not count as a change.
    pub fn spawn(
        ledger: &ResultsLedger,
        gate: Arc<SessionGate>,
        store: Arc<dyn StudyStore>,
        config: &AutosaveConfig,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let enabled = gate.is_autosave_enabled();
        let (status, _) = watch::channel(AutosaveStatus {
            enabled,
            phase: if enabled {
                AutosavePhase::Idle
            } else {
                AutosavePhase::Disabled
            },
            ..Default::default()
        });
        let shared = Arc::new(Shared {
            epoch: AtomicU64::new(0),
            status,
            worker: Mutex::new(None),
        });

        let worker = Worker {
            ledger: ledger.subscribe(),
            gate_rx: gate.subscribe(),
            gate,
            store,
            shared: Arc::clone(&shared),
            commands: command_rx,
            debounce: config.debounce(),
        };
        let handle = tokio::spawn(worker.run());
        if let Ok(mut slot) = shared.worker.lock() {
            *slot = Some(handle);
        }

        tracing::debug!(debounce_ms = config.debounce_ms, "Autosave worker started");
        Self { commands, shared }
    }

    pub fn status(&self) -> AutosaveStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.shared.status.subscribe()
    }

    /// Cancel any pending debounce and save now
    ///
    /// Returns the persisted row, or `None` when autosave is not enabled, the
    /// ledger is empty, or a reset overtook the save.
    pub async fn flush_now(&self) -> Result<Option<ConsolidatedSnapshotRow>> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Flush(reply))
            .map_err(|_| Error::Autosave("autosave worker has stopped".into()))?;
        outcome
            .await
            .map_err(|_| Error::Autosave("autosave worker dropped the flush".into()))?
    }

    /// Return to `Disabled` immediately and cancel pending work
    pub fn reset(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.update(|s| *s = AutosaveStatus::default());
        // A stopped worker has nothing left to cancel.
        let _ = self.commands.send(Command::Reset);
        tracing::debug!(epoch = self.shared.epoch(), "Autosave reset");
    }

    /// Stop the worker and wait for it to exit
    ///
    /// A save already running finishes first.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let handle = self.shared.worker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Autosave worker ended abnormally: {}", e);
            }
        }
    }
}

struct Worker {
    ledger: watch::Receiver<LedgerSnapshot>,
    gate_rx: watch::Receiver<GateState>,
    gate: Arc<SessionGate>,
    store: Arc<dyn StudyStore>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    debounce: Duration,
}

/// A scheduled save and the reset epoch it was scheduled under
#[derive(Clone, Copy)]
struct Deadline {
    at: Instant,
    epoch: u64,
}

impl Worker {
    async fn run(mut self) {
        let mut deadline: Option<Deadline> = None;

        loop {
            let timer = async move {
                match deadline {
                    Some(d) => time::sleep_until(d.at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Flush(reply)) => {
                        deadline = None;
                        let outcome = self.save().await;
                        let _ = reply.send(outcome);
                    }
                    // Pending ledger changes stay unseen; the ledger arm
                    // sorts out whether they belong to the new study.
                    Some(Command::Reset) => deadline = None,
                    Some(Command::Shutdown) | None => break,
                },

                changed = self.gate_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.gate_rx.borrow_and_update();
                    if self.gate.is_autosave_enabled() {
                        // A context switch while already enabled keeps the current phase.
                        if self.shared.status.borrow().enabled {
                            continue;
                        }
                        if !self.ledger.borrow().is_empty() {
                            deadline = Some(Deadline {
                                at: Instant::now() + self.debounce,
                                epoch: self.shared.epoch(),
                            });
                            self.shared.update(|s| {
                                s.enabled = true;
                                s.phase = AutosavePhase::Debouncing;
                            });
                        } else {
                            self.shared.set_idle(true);
                        }
                    } else {
                        deadline = None;
                        self.shared.set_idle(false);
                    }
                }

                changed = self.ledger.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let empty = self.ledger.borrow_and_update().is_empty();
                    let enabled = self.gate.is_autosave_enabled();
                    if empty {
                        deadline = None;
                        self.shared.set_idle(enabled);
                    } else if enabled {
                        deadline = Some(Deadline {
                            at: Instant::now() + self.debounce,
                            epoch: self.shared.epoch(),
                        });
                        self.shared.update(|s| {
                            s.enabled = true;
                            s.phase = AutosavePhase::Debouncing;
                        });
                    }
                }

                () = timer => {
                    let fired = deadline.take();
                    if fired.is_some_and(|d| d.epoch == self.shared.epoch()) {
                        // Outcome is reported through the status channel.
                        let _ = self.save().await;
                    }
                }
            }
        }

        tracing::debug!("Autosave worker stopped");
    }

    async fn save(&mut self) -> Result<Option<ConsolidatedSnapshotRow>> {
        let epoch = self.shared.epoch();
        let context = self.gate.context();
        let Some(study_id) = context.autosave_study_id().map(str::to_string) else {
            self.shared.set_idle(false);
            return Ok(None);
        };

        let snapshot = self.ledger.borrow_and_update().clone();
        if snapshot.is_empty() {
            return Ok(None);
        }

        self.shared.update(|s| {
            s.enabled = true;
            s.is_saving = true;
            s.phase = AutosavePhase::Saving;
        });

        let store = Arc::clone(&self.store);
        let required = self.gate.required().clone();
        let outcome = task::spawn_blocking(move || {
            persist(store.as_ref(), &snapshot, &context, &study_id, &required)
        })
        .await
        .map_err(|e| Error::Autosave(format!("save task failed: {}", e)))
        .and_then(|saved| saved);

        if self.shared.epoch() != epoch {
            tracing::debug!("Discarding save outcome overtaken by reset");
            return outcome.map(|_| None);
        }

        match &outcome {
            Ok(row) => {
                let saved_at = row.updated_at_millis;
                self.shared.update(|s| {
                    s.is_saving = false;
                    s.last_saved_at_millis = Some(saved_at);
                    s.last_error = None;
                    s.phase = AutosavePhase::Saved(saved_at);
                    s.saves_completed += 1;
                });
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Autosave failed: {}", message);
                self.shared.update(|s| {
                    s.is_saving = false;
                    s.last_error = Some(message.clone());
                    s.phase = AutosavePhase::Error(message);
                });
            }
        }

        outcome.map(Some)
    }
}

/// Read-before-write consolidation for one study
fn persist(
    store: &dyn StudyStore,
    snapshot: &LedgerSnapshot,
    context: &WorkshopSessionContext,
    study_id: &str,
    required: &BTreeSet<CalcType>,
) -> Result<ConsolidatedSnapshotRow> {
    let existing = store.get_by_study_id(study_id)?;
    let now = Utc::now().timestamp_millis();
    let row = consolidate(snapshot, context, study_id, required, existing.as_ref(), now);
    store.upsert_by_study_id(&row)?;

    tracing::info!(
        study_id,
        revision = snapshot.revision(),
        updated_at = row.updated_at_millis,
        "Autosaved study"
    );
    Ok(row)
}

//! Run controller.
//!
//! Sequences one invocation:
//!
//! ```text
//! Idle → Fetching → Selecting ─┬─► EarlyExit
//!                              └─► Notifying → Committing → Done
//!                                      │            │
//!                                      └──► Failed ◄┘
//! ```
//!
//! The ledger is mutated and persisted only after the notifier reports
//! success.  A failed send leaves the ledger untouched so the same items are
//! selected again next time (at-least-once).  A failed persist after a
//! successful send is reported as [`RunError::CommitAfterSend`]: the digest
//! already went out and will be sent again on the next run.

use std::fmt;
use std::path::PathBuf;

use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::aggregate::Aggregator;
use crate::error::RunError;
use crate::ledger::Ledger;
use crate::notify::Notifier;
use crate::order::DigestBatch;
use crate::select::select;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Selecting,
    EarlyExit,
    Notifying,
    Committing,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Selecting => "selecting",
            Self::EarlyExit => "early-exit",
            Self::Notifying => "notifying",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing new; no mail sent, ledger untouched.
    NothingNew,
    /// A digest with this many items was sent and recorded.
    Delivered(usize),
}

/// Everything one run needs, passed in explicitly.
pub struct Runner {
    aggregator: Aggregator,
    notifier: Box<dyn Notifier>,
    ledger_path: PathBuf,
    rng: StdRng,
    state: RunState,
}

impl Runner {
    pub fn new(
        aggregator: Aggregator,
        notifier: Box<dyn Notifier>,
        ledger_path: impl Into<PathBuf>,
        rng: StdRng,
    ) -> Self {
        Self {
            aggregator,
            notifier,
            ledger_path: ledger_path.into(),
            rng,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute the run.  On error the runner ends in [`RunState::Failed`].
    pub async fn run(&mut self) -> Result<RunOutcome, RunError> {
        let result = self.drive().await;
        if result.is_err() {
            self.transition(RunState::Failed);
        }
        result
    }

    async fn drive(&mut self) -> Result<RunOutcome, RunError> {
        self.transition(RunState::Fetching);
        let mut ledger = Ledger::load(&self.ledger_path).map_err(RunError::Load)?;
        if ledger.is_empty() {
            info!(
                ledger = %ledger.path().display(),
                "ledger is empty, every fetched item counts as new"
            );
        }
        let candidates = self.aggregator.collect().await;

        self.transition(RunState::Selecting);
        let fetched = candidates.len();
        let delta = select(candidates, &ledger);
        if delta.is_empty() {
            self.transition(RunState::EarlyExit);
            info!(fetched, known = ledger.len(), "no new items");
            return Ok(RunOutcome::NothingNew);
        }
        info!(fetched, new = delta.len(), "found new items");

        self.transition(RunState::Notifying);
        let batch = DigestBatch::shuffled(delta, &mut self.rng);
        self.notifier.send(&batch).await?;

        self.transition(RunState::Committing);
        ledger.merge(batch.ids());
        ledger
            .persist()
            .map_err(|source| RunError::CommitAfterSend {
                delivered: batch.len(),
                source,
            })?;

        self.transition(RunState::Done);
        info!(
            delivered = batch.len(),
            ledger = %ledger.path().display(),
            "digest delivered and recorded"
        );
        Ok(RunOutcome::Delivered(batch.len()))
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Scheduler loop driving the robot
//!
//! This module handles:
//! - Claiming the next eligible task from the frontier
//! - Running one fetch at a time and persisting its outcome
//! - The politeness delay between requests and the idle poll
//! - Prompt shutdown on cancellation, releasing an abandoned task

use crate::config::CrawlerConfig;
use crate::crawler::clock::Clock;
use crate::crawler::fetcher::Fetcher;
use crate::state::LoopState;
use crate::storage::{FrontierTask, Storage};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Sleep after every fetch attempt
    pub delay: Duration,

    /// Sleep when no task is eligible
    pub idle_poll: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            delay: config.delay(),
            idle_poll: config.idle_poll(),
        }
    }
}

/// What the loop should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Interrupted,
}

/// Counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Fetches whose outcome was persisted
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Errors raised by the store while the loop was running
    pub store_errors: u64,
}

/// Single-worker scheduler
///
/// The scheduler owns the store, the fetcher and the clock for the lifetime of
/// the loop. It alternates between two states:
/// - `Idle`: try to claim a task; sleep `idle_poll` when none is eligible
/// - `Active`: fetch the claimed task, persist exactly one reschedule, then
///   sleep the politeness delay
pub struct Scheduler<S, C> {
    storage: S,
    fetcher: Fetcher,
    clock: C,
    settings: SchedulerSettings,
    token: CancellationToken,
    state: LoopState,
    summary: RunSummary,
}

impl<S, C> Scheduler<S, C>
where
    S: Storage,
    C: Clock,
{
    pub fn new(
        storage: S,
        fetcher: Fetcher,
        clock: C,
        settings: SchedulerSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            storage,
            fetcher,
            clock,
            settings,
            token,
            state: LoopState::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Runs steps until the cancellation token fires
    ///
    /// A task claimed but not yet fetched when the token fires is returned to
    /// the pending pool.
    pub async fn run(&mut self) -> RunSummary {
        tracing::info!(
            "Scheduler started (delay: {:?}, idle poll: {:?})",
            self.settings.delay,
            self.settings.idle_poll
        );

        loop {
            if self.token.is_cancelled() {
                self.abandon_active();
                break;
            }

            if self.step().await == StepResult::Interrupted {
                break;
            }
        }

        tracing::info!(
            "Scheduler stopped after {} attempts ({} ok, {} failed)",
            self.summary.attempts,
            self.summary.successes,
            self.summary.failures
        );

        self.summary
    }

    /// Advances the state machine by one transition
    pub async fn step(&mut self) -> StepResult {
        match std::mem::replace(&mut self.state, LoopState::Idle) {
            LoopState::Idle => self.step_idle().await,
            LoopState::Active(task) => self.step_active(task).await,
        }
    }

    async fn step_idle(&mut self) -> StepResult {
        match self.storage.claim_next(self.clock.now()) {
            Ok(Some(task)) => {
                tracing::debug!("Claimed {} (tries: {})", task.raw_url, task.tries);
                self.state = LoopState::Active(task);
                StepResult::Continue
            }
            Ok(None) => {
                tracing::debug!("No eligible task, polling again in {:?}", self.settings.idle_poll);
                self.pause(self.settings.idle_poll).await
            }
            Err(e) => {
                tracing::error!("Failed to claim next task: {}", e);
                self.summary.store_errors += 1;
                self.pause(self.settings.idle_poll).await
            }
        }
    }

    async fn step_active(&mut self, task: FrontierTask) -> StepResult {
        let fetched = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = self.fetcher.fetch(&self.storage, &task, &self.clock) => Some(result),
        };

        let outcome = match fetched {
            Some(Ok(outcome)) => outcome,
            Some(Err(e)) => {
                tracing::error!("Failed to look up {}: {}", task.normalized_url, e);
                self.summary.store_errors += 1;
                self.release(&task);
                return self.pause(self.settings.idle_poll).await;
            }
            None => {
                tracing::info!("Interrupted while fetching {}", task.raw_url);
                self.release(&task);
                return StepResult::Interrupted;
            }
        };

        let success = outcome.is_success();
        match self
            .fetcher
            .apply(&mut self.storage, &task, outcome, &self.clock)
        {
            Ok(()) => {
                self.summary.attempts += 1;
                if success {
                    self.summary.successes += 1;
                } else {
                    self.summary.failures += 1;
                }
            }
            Err(e) => {
                tracing::error!("Failed to record outcome for {}: {}", task.raw_url, e);
                self.summary.store_errors += 1;
                self.release(&task);
                return self.pause(self.settings.idle_poll).await;
            }
        }

        self.pause(self.settings.delay).await
    }

    /// Sleeps unless cancelled first
    async fn pause(&self, duration: Duration) -> StepResult {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => StepResult::Interrupted,
            _ = self.clock.sleep(duration) => StepResult::Continue,
        }
    }

    fn abandon_active(&mut self) {
        if let LoopState::Active(task) = std::mem::replace(&mut self.state, LoopState::Idle) {
            self.release(&task);
        }
    }

    fn release(&mut self, task: &FrontierTask) {
        if let Err(e) = self.storage.release(task) {
            tracing::error!("Failed to release {}: {}", task.raw_url, e);
            self.summary.store_errors += 1;
        }
    }
}

//! Transaction orchestrator implementation.
//!
//! One actor task owns the [`TransactionState`]. Operator commands and the
//! results of background tasks arrive on two queues and are applied one at a
//! time, so no lock guards the state. Only handles hold the command sender:
//! once the last handle is dropped the actor tears down and stops every task. Background work (resolution,
//! context and artifact fetches, solving, relay polling, issuance and
//! submission) runs in spawned tasks that only report back through the
//! queue. Every report carries the epoch it was started in, plus the round,
//! serial or relay generation where those apply, and reports from superseded
//! work are dropped on arrival.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backoff::BackoffPolicy;
use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::catalog::{CatalogEntry, CatalogSource};
use crate::challenge::{
    ChallengeArtifact, ChallengeConfig, ChallengeError, ChallengeSolverChain, SolvedChallenge,
    SolvingCapability,
};
use crate::config::{validate_config, Config, ConfigError};
use crate::events::{EventBroadcaster, Severity, StatusEnvelope, StatusEvent};
use crate::gateway::{GatewayError, SubmissionReceipt, TransactionContext, TransactionGateway};
use crate::metrics;
use crate::relay::{CodeIssuer, CodeRelay, CodeRelayPoller, IssuanceOutcome, OneTimeCode};
use crate::resolver::{CandidateResolver, ResolveOutcome};
use crate::settings::SettingsStore;
use crate::textmatch::{normalize, ScoredEntry};

use super::config::OrchestratorConfig;
use super::state::{FillSource, TransactionState};
use super::types::{OrchestratorError, TransactionError, TransactionPhase, TransactionSnapshot};

const COMMAND_QUEUE_CAPACITY: usize = 64;
const TASK_QUEUE_CAPACITY: usize = 64;
const SUBMISSION_TASK: &str = "submission";

/// External services the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogSource>,
    pub gateway: Arc<dyn TransactionGateway>,
    pub relay: Arc<dyn CodeRelay>,
    /// Every solving capability available; ordered by `challenge.capability_order`.
    pub capabilities: Vec<Arc<dyn SolvingCapability>>,
    pub settings: Arc<dyn SettingsStore>,
}

type Reply<T> = oneshot::Sender<Result<T, OrchestratorError>>;

enum Command {
    Start { query: String, reply: Reply<Uuid> },
    Reset { reply: Reply<()> },
    SupplyAnswer { serial: u64, answer: String, reply: Reply<()> },
    SupplyCode { code: String, reply: Reply<()> },
    ConfirmSubmit { reply: Reply<()> },
    RequestCode { reply: Reply<IssuanceOutcome> },
    RefreshChallenge { reply: Reply<()> },
    Snapshot { reply: oneshot::Sender<TransactionSnapshot> },
    Shutdown { reply: oneshot::Sender<()> },
}

enum TaskEvent {
    Resolved {
        epoch: u64,
        outcome: ResolveOutcome,
    },
    ContextFetched {
        epoch: u64,
        result: Result<TransactionContext, GatewayError>,
    },
    ArtifactFetched {
        epoch: u64,
        round: u64,
        result: Result<ChallengeArtifact, GatewayError>,
    },
    ChallengeSolved {
        epoch: u64,
        serial: u64,
        result: Result<SolvedChallenge, ChallengeError>,
    },
    CodeIssued {
        epoch: u64,
        result: Result<IssuanceOutcome, String>,
    },
    CodeReceived {
        epoch: u64,
        generation: u64,
        code: OneTimeCode,
    },
    SubmissionFinished {
        epoch: u64,
        result: Result<SubmissionReceipt, GatewayError>,
    },
    RetryRound {
        epoch: u64,
    },
    Fault {
        epoch: u64,
        task: &'static str,
        reason: String,
    },
}

/// Drives a single transaction from query to completed submission.
///
/// Build it with [`TransactionOrchestrator::new`], then call
/// [`TransactionOrchestrator::spawn`] to start the actor and get a handle.
pub struct TransactionOrchestrator {
    config: OrchestratorConfig,
    challenge: ChallengeConfig,
    resolver_interval: Duration,
    recipient_id: String,
    resolver: Arc<CandidateResolver>,
    chain: ChallengeSolverChain,
    issuer: Arc<CodeIssuer>,
    poller: Arc<CodeRelayPoller>,
    gateway: Arc<dyn TransactionGateway>,
    events: EventBroadcaster,
}

impl TransactionOrchestrator {
    /// Create a new orchestrator from a configuration that passes
    /// [`validate_config`].
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self, ConfigError> {
        validate_config(config)?;

        let Collaborators {
            catalog,
            gateway,
            relay,
            capabilities,
            settings,
        } = collaborators;

        let resolver = CandidateResolver::new(catalog, config.matching.ensemble())
            .with_min_score(config.resolver.min_score);
        let chain = ChallengeSolverChain::from_registry(
            &config.challenge.capability_order,
            capabilities,
            Duration::from_millis(config.challenge.capability_timeout_ms),
        );
        let issuer = CodeIssuer::new(
            Arc::clone(&gateway),
            settings,
            Duration::from_secs(config.relay.issuance_cooldown_secs),
        );
        let poller = CodeRelayPoller::new(
            relay,
            config.relay.recipient_id.clone(),
            Duration::from_millis(config.relay.poll_interval_ms),
        );

        Ok(Self {
            config: config.orchestrator.clone(),
            challenge: config.challenge.clone(),
            resolver_interval: Duration::from_millis(config.resolver.poll_interval_ms),
            recipient_id: config.relay.recipient_id.clone(),
            resolver: Arc::new(resolver),
            chain,
            issuer: Arc::new(issuer),
            poller: Arc::new(poller),
            gateway,
            events: EventBroadcaster::new(config.orchestrator.event_capacity),
        })
    }

    /// Event broadcaster shared with every handle.
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Start the actor task.
    pub fn spawn(self) -> OrchestratorHandle {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (task_tx, task_events) = mpsc::channel(TASK_QUEUE_CAPACITY);
        let (phase_tx, phase_rx) = watch::channel(TransactionPhase::Idle);

        let handle = OrchestratorHandle {
            tx,
            phase_rx,
            events: self.events.clone(),
            issuer: Arc::clone(&self.issuer),
        };

        info!(
            capabilities = ?self.chain.capability_names(),
            gateway = %self.gateway.name(),
            "Starting transaction orchestrator"
        );

        let actor = Actor {
            task_tx,
            phase_tx,
            phase: TransactionPhase::Idle,
            epoch: 0,
            round: 0,
            relay_generation: 0,
            transaction_id: None,
            query: None,
            state: None,
            completed: None,
            tasks: Tasks::default(),
            pending_reset: false,
            submit_failures: 0,
            faults: 0,
            inner: self,
        };
        tokio::spawn(actor.run(commands, task_events));

        handle
    }
}

/// Cloneable handle to a running orchestrator.
///
/// Dropping the last handle without calling `shutdown` also stops it.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Command>,
    phase_rx: watch::Receiver<TransactionPhase>,
    events: EventBroadcaster,
    issuer: Arc<CodeIssuer>,
}

impl OrchestratorHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| OrchestratorError::NotRunning)?;
        rx.await.map_err(|_| OrchestratorError::NotRunning)?
    }

    /// Begin resolving `query`. Returns the new transaction id.
    pub async fn start(&self, query: impl Into<String>) -> Result<Uuid, OrchestratorError> {
        let query = query.into();
        self.call(|reply| Command::Start { query, reply }).await
    }

    /// Cancel all work and return to idle.
    ///
    /// While a submission is in flight the reset is deferred until its
    /// result arrives.
    pub async fn reset(&self) -> Result<(), OrchestratorError> {
        self.call(|reply| Command::Reset { reply }).await
    }

    /// Answer the challenge artifact with the given serial.
    pub async fn supply_answer(
        &self,
        serial: u64,
        answer: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        let answer = answer.into();
        self.call(|reply| Command::SupplyAnswer {
            serial,
            answer,
            reply,
        })
        .await
    }

    /// Enter the one-time code by hand. Replaces any code already held.
    pub async fn supply_code(&self, code: impl Into<String>) -> Result<(), OrchestratorError> {
        let code = code.into();
        self.call(|reply| Command::SupplyCode { code, reply }).await
    }

    /// Submit a transaction waiting in `ReadyToSubmit`.
    pub async fn confirm_submit(&self) -> Result<(), OrchestratorError> {
        self.call(|reply| Command::ConfirmSubmit { reply }).await
    }

    /// Ask upstream to issue a one-time code, subject to the cooldown.
    pub async fn request_code(&self) -> Result<IssuanceOutcome, OrchestratorError> {
        self.call(|reply| Command::RequestCode { reply }).await
    }

    /// Drop the held challenge and fetch a new one. The code is kept.
    pub async fn refresh_challenge(&self) -> Result<(), OrchestratorError> {
        self.call(|reply| Command::RefreshChallenge { reply }).await
    }

    pub async fn snapshot(&self) -> Result<TransactionSnapshot, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| OrchestratorError::NotRunning)?;
        rx.await.map_err(|_| OrchestratorError::NotRunning)
    }

    /// Current phase.
    pub fn phase(&self) -> TransactionPhase {
        *self.phase_rx.borrow()
    }

    /// Receiver that observes every phase change.
    pub fn subscribe_phase(&self) -> watch::Receiver<TransactionPhase> {
        self.phase_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StatusEnvelope> {
        self.events.subscribe()
    }

    /// Time left before another code may be requested.
    pub fn code_cooldown_remaining(&self) -> Result<Option<Duration>, OrchestratorError> {
        self.issuer
            .remaining_cooldown()
            .map_err(|e| OrchestratorError::CodeRequest(e.to_string()))
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Stop all work and end the actor task.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// Cancellation handles of the running background tasks.
#[derive(Default)]
struct Tasks {
    resolver: Option<CancelHandle>,
    context: Option<CancelHandle>,
    artifact: Option<CancelHandle>,
    solver: Option<CancelHandle>,
    relay: Option<CancelHandle>,
    timer: Option<CancelHandle>,
}

fn stop(slot: &mut Option<CancelHandle>) {
    if let Some(handle) = slot.take() {
        handle.cancel();
    }
}

impl Tasks {
    fn stop_all(&mut self) {
        stop(&mut self.resolver);
        stop(&mut self.context);
        stop(&mut self.artifact);
        stop(&mut self.solver);
        stop(&mut self.relay);
        stop(&mut self.timer);
    }
}

/// Sleep for `delay` unless cancelled first. Returns false when cancelled.
async fn pause(token: &mut CancelToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// What remains visible after a transaction completed.
struct CompletedTransaction {
    entry: CatalogEntry,
    redirect_token: String,
    submission_attempts: u32,
}

struct Actor {
    inner: TransactionOrchestrator,
    task_tx: mpsc::Sender<TaskEvent>,
    phase_tx: watch::Sender<TransactionPhase>,
    phase: TransactionPhase,

    epoch: u64,
    round: u64,
    relay_generation: u64,

    transaction_id: Option<Uuid>,
    query: Option<String>,
    state: Option<TransactionState>,
    completed: Option<CompletedTransaction>,

    tasks: Tasks,
    pending_reset: bool,
    submit_failures: u32,
    faults: u32,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut task_events: mpsc::Receiver<TaskEvent>,
    ) {
        info!("Transaction orchestrator started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All orchestrator handles dropped");
                        self.teardown();
                        break;
                    }
                },
                // The actor holds a task sender, so this never yields None.
                Some(event) = task_events.recv() => self.handle_task_event(event),
            }
        }

        self.tasks.stop_all();
        info!("Transaction orchestrator stopped");
    }

    fn sender(&self) -> mpsc::Sender<TaskEvent> {
        self.task_tx.clone()
    }

    fn events(&self) -> &EventBroadcaster {
        &self.inner.events
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { query, reply } => {
                let _ = reply.send(self.start(query));
            }
            Command::Reset { reply } => {
                self.reset();
                let _ = reply.send(Ok(()));
            }
            Command::SupplyAnswer {
                serial,
                answer,
                reply,
            } => {
                let _ = reply.send(self.supply_answer(serial, answer));
            }
            Command::SupplyCode { code, reply } => {
                let _ = reply.send(self.supply_code(code));
            }
            Command::ConfirmSubmit { reply } => {
                let _ = reply.send(self.confirm_submit());
            }
            Command::RequestCode { reply } => self.request_code(reply),
            Command::RefreshChallenge { reply } => {
                let _ = reply.send(self.refresh_challenge());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                // Handled by the run loop.
                let _ = reply.send(());
            }
        }
    }

    fn start(&mut self, query: String) -> Result<Uuid, OrchestratorError> {
        if !self.phase.is_terminal() {
            return Err(OrchestratorError::InvalidPhase {
                expected: "idle or completed".to_string(),
                actual: self.phase,
            });
        }

        let query = query.trim().to_string();
        if normalize(&query).is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }

        self.clear();
        let transaction_id = Uuid::new_v4();
        self.transaction_id = Some(transaction_id);
        self.query = Some(query.clone());

        info!(transaction_id = %transaction_id, query = %query, "Transaction started");
        self.begin_resolving(Duration::ZERO);
        Ok(transaction_id)
    }

    fn reset(&mut self) {
        if self
            .state
            .as_ref()
            .is_some_and(|s| s.submission_in_flight())
        {
            self.pending_reset = true;
            self.events().message(
                Severity::Info,
                "Reset requested, applying once the submission finishes",
            );
            return;
        }

        self.teardown();
        self.events().message(Severity::Info, "Transaction reset");
    }

    /// Check that a value can be supplied in the current phase.
    fn require_input_phase(&self) -> Result<(), OrchestratorError> {
        match self.phase {
            TransactionPhase::AcquiringArtifacts | TransactionPhase::ReadyToSubmit => Ok(()),
            TransactionPhase::Submitting => Err(OrchestratorError::SubmissionInFlight),
            actual => Err(OrchestratorError::InvalidPhase {
                expected: "acquiring_artifacts or ready_to_submit".to_string(),
                actual,
            }),
        }
    }

    fn supply_answer(&mut self, serial: u64, answer: String) -> Result<(), OrchestratorError> {
        self.require_input_phase()?;

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(OrchestratorError::EmptyValue("challenge answer"));
        }

        let state = self
            .state
            .as_mut()
            .ok_or(OrchestratorError::NoActiveTransaction)?;
        if !state.accept_answer(serial, answer, FillSource::Manual) {
            return Err(OrchestratorError::StaleArtifact {
                supplied: serial,
                current: state.current_serial(),
            });
        }

        debug!(serial, "Manual challenge answer accepted");
        self.check_ready();
        Ok(())
    }

    fn supply_code(&mut self, code: String) -> Result<(), OrchestratorError> {
        self.require_input_phase()?;

        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(OrchestratorError::EmptyValue("code"));
        }

        let state = self
            .state
            .as_mut()
            .ok_or(OrchestratorError::NoActiveTransaction)?;
        if !state.accept_code(code, FillSource::Manual) {
            return Err(OrchestratorError::SubmissionInFlight);
        }

        debug!("Manual code accepted");
        self.check_ready();
        Ok(())
    }

    fn confirm_submit(&mut self) -> Result<(), OrchestratorError> {
        match self.phase {
            TransactionPhase::ReadyToSubmit => {
                self.begin_submission();
                Ok(())
            }
            TransactionPhase::Submitting => Err(OrchestratorError::SubmissionInFlight),
            actual => Err(OrchestratorError::InvalidPhase {
                expected: "ready_to_submit".to_string(),
                actual,
            }),
        }
    }

    fn request_code(&mut self, reply: Reply<IssuanceOutcome>) {
        if self.state.is_none() {
            let _ = reply.send(Err(OrchestratorError::NoActiveTransaction));
            return;
        }
        self.spawn_issuance(Some(reply));
    }

    fn refresh_challenge(&mut self) -> Result<(), OrchestratorError> {
        self.require_input_phase()?;

        let state = self
            .state
            .as_mut()
            .ok_or(OrchestratorError::NoActiveTransaction)?;
        state.discard_challenge();

        self.set_phase(TransactionPhase::AcquiringArtifacts);
        self.events()
            .message(Severity::Info, "Fetching a new challenge");
        self.start_artifact_round();
        Ok(())
    }

    fn snapshot(&self) -> TransactionSnapshot {
        let mut snapshot = TransactionSnapshot {
            phase: self.phase,
            transaction_id: self.transaction_id,
            query: self.query.clone(),
            ..Default::default()
        };

        if let Some(state) = &self.state {
            snapshot.entry = Some(state.entry().clone());
            snapshot.artifact_serial = state.current_serial();
            snapshot.challenge_answer = state.answer().map(str::to_string);
            snapshot.code = state.code().map(str::to_string);
            snapshot.has_context = state.context().is_some();
            snapshot.code_requested = state.code_requested();
            snapshot.submission_in_flight = state.submission_in_flight();
            snapshot.submission_attempts = state.submission_attempts();
        }

        if let Some(done) = &self.completed {
            snapshot.entry = Some(done.entry.clone());
            snapshot.redirect_token = Some(done.redirect_token.clone());
            snapshot.submission_attempts = done.submission_attempts;
        }

        snapshot
    }

    // =========================================================================
    // Task results
    // =========================================================================

    fn handle_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Resolved { epoch, outcome } => {
                if epoch != self.epoch || self.phase != TransactionPhase::Resolving {
                    debug!(outcome = outcome.label(), "Dropping stale resolution result");
                    return;
                }
                self.on_resolved(outcome);
            }
            TaskEvent::ContextFetched { epoch, result } => {
                if epoch != self.epoch {
                    return;
                }
                self.on_context(result);
            }
            TaskEvent::ArtifactFetched {
                epoch,
                round,
                result,
            } => {
                if epoch != self.epoch || round != self.round {
                    debug!(round, "Dropping artifact from a superseded round");
                    return;
                }
                self.on_artifact(result);
            }
            TaskEvent::ChallengeSolved {
                epoch,
                serial,
                result,
            } => {
                if epoch != self.epoch {
                    return;
                }
                self.on_solved(serial, result);
            }
            TaskEvent::CodeIssued { epoch, result } => {
                if epoch != self.epoch {
                    return;
                }
                self.on_code_issued(result);
            }
            TaskEvent::CodeReceived {
                epoch,
                generation,
                code,
            } => {
                if epoch != self.epoch || generation != self.relay_generation {
                    debug!("Dropping code from a stopped relay poller");
                    return;
                }
                self.on_code_received(code);
            }
            TaskEvent::SubmissionFinished { epoch, result } => {
                if epoch != self.epoch {
                    warn!("Dropping submission result from a previous transaction");
                    return;
                }
                self.on_submission_finished(result);
            }
            TaskEvent::RetryRound { epoch } => {
                if epoch != self.epoch || self.phase != TransactionPhase::SubmissionFailed {
                    return;
                }
                self.resume_after_failure();
            }
            TaskEvent::Fault {
                epoch,
                task,
                reason,
            } => {
                if epoch != self.epoch {
                    debug!(task, "Ignoring fault from a previous transaction");
                    return;
                }
                self.on_fault(task, reason);
            }
        }
    }

    fn on_resolved(&mut self, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Found(best) => self.on_candidate(best),
            ResolveOutcome::NotFound => {
                let query = self.query.clone().unwrap_or_default();
                debug!(query = %query, "No candidate matched");
                self.events()
                    .emit(StatusEvent::CandidateNotFound { query });
            }
            ResolveOutcome::NotYet(reason) => {
                debug!(reason = %reason, "Catalog not ready yet");
            }
        }
    }

    fn on_candidate(&mut self, best: ScoredEntry) {
        stop(&mut self.tasks.resolver);
        let ScoredEntry { entry, score } = best;
        let transaction_id = *self.transaction_id.get_or_insert_with(Uuid::new_v4);

        info!(
            transaction_id = %transaction_id,
            entry_id = %entry.entry_id,
            score = score.blended,
            "Candidate resolved"
        );
        self.events().emit(StatusEvent::CandidateResolved {
            transaction_id,
            entry: entry.clone(),
            score: score.clone(),
        });
        self.events().message(
            Severity::Success,
            format!("Selected {}", entry.display_label()),
        );

        self.state = Some(TransactionState::new(entry, score));
        self.set_phase(TransactionPhase::AcquiringArtifacts);

        self.spawn_context_fetch();
        self.start_relay_poller();
        self.start_artifact_round();
        if self.state.as_ref().is_some_and(|s| !s.code_requested()) {
            self.spawn_issuance(None);
        }
    }

    fn on_context(&mut self, result: Result<TransactionContext, GatewayError>) {
        match result {
            Ok(context) => {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                debug!(partner_id = %context.partner_id, "Transaction context cached");
                state.set_context(context);
                stop(&mut self.tasks.context);
                self.check_ready();
            }
            Err(e) => self.events().report(TransactionError::TransientFetchError {
                reason: format!("transaction context: {}", e),
            }),
        }
    }

    fn on_artifact(&mut self, result: Result<ChallengeArtifact, GatewayError>) {
        if !matches!(
            self.phase,
            TransactionPhase::AcquiringArtifacts | TransactionPhase::ReadyToSubmit
        ) {
            return;
        }

        match result {
            Ok(artifact) => {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                let serial = state.install_artifact(artifact.clone());
                stop(&mut self.tasks.artifact);

                info!(serial, token = %artifact.token, "Challenge artifact issued");
                self.events().emit(StatusEvent::ChallengeIssued {
                    serial,
                    artifact: artifact.clone(),
                });
                // Any previous answer is void now.
                self.set_phase(TransactionPhase::AcquiringArtifacts);
                self.spawn_solver(serial, artifact);
            }
            Err(e) => self.events().report(TransactionError::TransientFetchError {
                reason: format!("challenge artifact: {}", e),
            }),
        }
    }

    fn on_solved(&mut self, serial: u64, result: Result<SolvedChallenge, ChallengeError>) {
        let current = self.state.as_ref().and_then(|s| s.current_serial());
        if current != Some(serial) {
            debug!(serial, ?current, "Discarding result for a superseded challenge");
            return;
        }

        match result {
            Ok(solved) => {
                if !matches!(
                    self.phase,
                    TransactionPhase::AcquiringArtifacts | TransactionPhase::ReadyToSubmit
                ) {
                    return;
                }
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                if !state.accept_answer(serial, solved.answer, FillSource::Auto) {
                    debug!(serial, "Challenge already answered, keeping existing answer");
                    return;
                }
                self.events().emit(StatusEvent::ChallengeSolved {
                    serial,
                    capability: solved.capability,
                });
                self.check_ready();
            }
            Err(e) => self
                .events()
                .report(TransactionError::ChallengeAcquisitionFailed {
                    reason: e.to_string(),
                }),
        }
    }

    fn on_code_issued(&mut self, result: Result<IssuanceOutcome, String>) {
        match result {
            Ok(IssuanceOutcome::Accepted) => {
                if let Some(state) = self.state.as_mut() {
                    state.mark_code_requested();
                }
                self.events()
                    .message(Severity::Success, "One-time code requested");
            }
            Ok(outcome @ IssuanceOutcome::Cooldown { .. }) => {
                self.events().report(TransactionError::CodeCooldownActive {
                    remaining_secs: outcome.remaining_secs(),
                });
            }
            Err(reason) => self
                .events()
                .message(Severity::Error, format!("Code request failed: {}", reason)),
        }
    }

    fn on_code_received(&mut self, code: OneTimeCode) {
        if !matches!(
            self.phase,
            TransactionPhase::AcquiringArtifacts | TransactionPhase::ReadyToSubmit
        ) {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if !state.accept_code(code.code.clone(), FillSource::Auto) {
            debug!("Relay code already held or already submitted, ignoring");
            return;
        }

        info!(recipient = %code.recipient, "One-time code received");
        self.events()
            .emit(StatusEvent::CodeReceived { code: code.code });
        self.check_ready();
    }

    fn on_submission_finished(&mut self, result: Result<SubmissionReceipt, GatewayError>) {
        if let Some(state) = self.state.as_mut() {
            state.end_submission();
        }

        let outcome = match result {
            Ok(receipt) => match receipt.success_token() {
                Some(token) => Ok(token.to_string()),
                None => Err(receipt
                    .message
                    .unwrap_or_else(|| "no redirect token in response".to_string())),
            },
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(redirect_token) => self.complete(redirect_token),
            Err(reason) => self.submission_rejected(reason),
        }
    }

    fn on_fault(&mut self, task: &'static str, reason: String) {
        if task == SUBMISSION_TASK {
            self.on_submission_finished(Err(GatewayError::Request(reason)));
            return;
        }

        if self
            .state
            .as_ref()
            .is_some_and(|s| s.submission_in_flight())
        {
            error!(task, reason = %reason, "Task failed while a submission is in flight");
            return;
        }
        if self.phase.is_terminal() {
            return;
        }

        self.faults += 1;
        metrics::FAULT_RESTARTS.inc();
        let delay = self.inner.config.fault_restart_policy().delay(self.faults);
        self.events().message(
            Severity::Error,
            format!(
                "Internal fault in {} task ({}), restarting from resolution",
                task, reason
            ),
        );
        info!(delay_ms = delay.as_millis() as u64, "Restarting transaction");

        self.epoch += 1;
        self.tasks.stop_all();
        self.state = None;
        self.pending_reset = false;
        self.begin_resolving(delay);
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn set_phase(&mut self, to: TransactionPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        self.phase_tx.send_replace(to);
        info!(from = %from, to = %to, "Transaction phase changed");
        self.events()
            .emit(StatusEvent::PhaseChanged { from, to });
    }

    /// Drop the transaction without touching the phase.
    fn clear(&mut self) {
        self.epoch += 1;
        self.tasks.stop_all();
        self.state = None;
        self.query = None;
        self.transaction_id = None;
        self.completed = None;
        self.pending_reset = false;
        self.submit_failures = 0;
        self.faults = 0;
    }

    fn teardown(&mut self) {
        self.clear();
        self.set_phase(TransactionPhase::Idle);
    }

    /// Move to `ReadyToSubmit` once every value is present, and submit
    /// straight away when both values were filled automatically.
    fn check_ready(&mut self) {
        if !matches!(
            self.phase,
            TransactionPhase::AcquiringArtifacts | TransactionPhase::ReadyToSubmit
        ) {
            return;
        }
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if !state.is_ready() {
            return;
        }

        let auto = state.auto_ready();
        let was_ready = self.phase == TransactionPhase::ReadyToSubmit;
        self.set_phase(TransactionPhase::ReadyToSubmit);

        if auto {
            self.begin_submission();
        } else if !was_ready {
            self.events()
                .message(Severity::Info, "Ready to submit, waiting for confirmation");
        }
    }

    fn begin_resolving(&mut self, initial_delay: Duration) {
        let Some(query) = self.query.clone() else {
            return;
        };
        let tx = self.sender();

        stop(&mut self.tasks.resolver);
        let (handle, token) = cancel_pair();
        let epoch = self.epoch;
        let join = Arc::clone(&self.inner.resolver).spawn_polling(
            query,
            self.inner.resolver_interval,
            initial_delay,
            token,
            tx,
            move |outcome| TaskEvent::Resolved { epoch, outcome },
        );
        self.watch_task("resolver", join);
        self.tasks.resolver = Some(handle);

        self.set_phase(TransactionPhase::Resolving);
    }

    fn start_relay_poller(&mut self) {
        let tx = self.sender();

        stop(&mut self.tasks.relay);
        self.relay_generation += 1;
        let generation = self.relay_generation;
        let epoch = self.epoch;

        let (handle, token) = cancel_pair();
        let join = Arc::clone(&self.inner.poller).spawn(token, tx, move |code| {
            TaskEvent::CodeReceived {
                epoch,
                generation,
                code,
            }
        });
        self.watch_task("code-relay", join);
        self.tasks.relay = Some(handle);
    }

    fn spawn_context_fetch(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if state.context().is_some() {
            return;
        }
        let tx = self.sender();

        let entry = state.entry().clone();
        let gateway = Arc::clone(&self.inner.gateway);
        let policy = self.inner.config.retry_policy();
        let epoch = self.epoch;
        let (handle, mut token) = cancel_pair();

        self.spawn_guarded("context-fetch", async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    result = gateway.fetch_transaction_context(&entry) => result,
                };
                if token.is_cancelled() {
                    return;
                }

                let done = result.is_ok();
                let message = TaskEvent::ContextFetched { epoch, result };
                if tx.send(message).await.is_err() || done {
                    return;
                }
                if !pause(&mut token, policy.delay(attempt)).await {
                    return;
                }
            }
        });
        stop(&mut self.tasks.context);
        self.tasks.context = Some(handle);
    }

    /// Start a fresh artifact round, superseding any fetch or solve underway.
    fn start_artifact_round(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let tx = self.sender();

        self.round += 1;
        let round = self.round;
        let epoch = self.epoch;
        let entry_id = state.entry().entry_id.clone();
        let continuation = state.continuation().map(str::to_string);
        let gateway = Arc::clone(&self.inner.gateway);
        let request_delay = self.inner.config.request_delay;
        let policy = self.inner.config.retry_policy();

        stop(&mut self.tasks.artifact);
        stop(&mut self.tasks.solver);
        let (handle, mut token) = cancel_pair();

        self.spawn_guarded("artifact-fetch", async move {
            if !pause(&mut token, request_delay.sample()).await {
                return;
            }

            let mut attempt = 0;
            loop {
                attempt += 1;
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    result = gateway.fetch_challenge_artifact(&entry_id, continuation.as_deref()) => result,
                };
                if token.is_cancelled() {
                    return;
                }

                let done = result.is_ok();
                let message = TaskEvent::ArtifactFetched {
                    epoch,
                    round,
                    result,
                };
                if tx.send(message).await.is_err() || done {
                    return;
                }
                if !pause(&mut token, policy.delay(attempt)).await {
                    return;
                }
            }
        });
        self.tasks.artifact = Some(handle);
    }

    fn spawn_solver(&mut self, serial: u64, artifact: ChallengeArtifact) {
        if !self.inner.challenge.auto_solve {
            self.events().message(
                Severity::Info,
                "Automatic solving disabled, waiting for a manual answer",
            );
            return;
        }
        if self.inner.chain.is_empty() {
            self.events().message(
                Severity::Warn,
                "No solving capability available, waiting for a manual answer",
            );
            return;
        }
        let tx = self.sender();

        let chain = self.inner.chain.clone();
        let max_attempts = self.inner.challenge.max_attempts;
        let backoff = BackoffPolicy::flat(self.inner.challenge.retry_delay);
        let epoch = self.epoch;

        stop(&mut self.tasks.solver);
        let (handle, mut token) = cancel_pair();

        self.spawn_guarded("challenge-solver", async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = chain.solve_with_retries(&artifact, max_attempts, &backoff) => result,
            };
            if token.is_cancelled() {
                return;
            }
            let _ = tx
                .send(TaskEvent::ChallengeSolved {
                    epoch,
                    serial,
                    result,
                })
                .await;
        });
        self.tasks.solver = Some(handle);
    }

    fn spawn_issuance(&mut self, reply: Option<Reply<IssuanceOutcome>>) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let tx = self.sender();

        let issuer = Arc::clone(&self.inner.issuer);
        let recipient_id = self.inner.recipient_id.clone();
        let entry_id = state.entry().entry_id.clone();
        let epoch = self.epoch;

        self.spawn_guarded("code-issuance", async move {
            let result = issuer
                .request_issuance(&recipient_id, &entry_id)
                .await
                .map_err(|e| e.to_string());
            if let Some(reply) = reply {
                let _ = reply.send(result.clone().map_err(OrchestratorError::CodeRequest));
            }
            let _ = tx
                .send(TaskEvent::CodeIssued { epoch, result })
                .await;
        });
    }

    fn begin_submission(&mut self) {
        let tx = self.sender();

        let payload = match self
            .state
            .as_ref()
            .map(|s| s.submission_payload(Uuid::new_v4()))
        {
            Some(Ok(payload)) => payload,
            // Not reached while check_ready gates submission on is_ready();
            // a state that loses a field anyway is dropped, never submitted.
            Some(Err(err)) => {
                metrics::SUBMISSIONS
                    .with_label_values(&["incomplete"])
                    .inc();
                self.events().report(err);
                self.teardown();
                return;
            }
            None => return,
        };

        let attempt = match self.state.as_mut() {
            Some(state) => {
                state.begin_submission();
                state.submission_attempts()
            }
            None => return,
        };

        // The relay and artifact loops stay down until the result is known.
        stop(&mut self.tasks.relay);
        stop(&mut self.tasks.artifact);
        stop(&mut self.tasks.solver);
        stop(&mut self.tasks.timer);
        self.set_phase(TransactionPhase::Submitting);

        info!(
            request_id = %payload.request_id,
            entry_id = %payload.entry_id,
            attempt,
            "Submitting transaction"
        );

        let gateway = Arc::clone(&self.inner.gateway);
        let delay = self.inner.config.request_delay.sample();
        let epoch = self.epoch;

        // Not cancellable: once started, the result is always awaited.
        self.spawn_guarded(SUBMISSION_TASK, async move {
            tokio::time::sleep(delay).await;
            let result = gateway.submit_transaction(&payload).await;
            let _ = tx
                .send(TaskEvent::SubmissionFinished { epoch, result })
                .await;
        });
    }

    fn complete(&mut self, redirect_token: String) {
        metrics::SUBMISSIONS
            .with_label_values(&["completed"])
            .inc();

        let Some(state) = self.state.take() else {
            return;
        };
        info!(
            entry_id = %state.entry().entry_id,
            attempts = state.submission_attempts(),
            "Transaction completed"
        );
        self.events().message(
            Severity::Success,
            format!("Transaction completed for {}", state.entry().display_label()),
        );

        self.tasks.stop_all();
        self.pending_reset = false;
        self.completed = Some(CompletedTransaction {
            entry: state.entry().clone(),
            redirect_token,
            submission_attempts: state.submission_attempts(),
        });
        self.set_phase(TransactionPhase::Completed);
    }

    fn submission_rejected(&mut self, reason: String) {
        metrics::SUBMISSIONS
            .with_label_values(&["rejected"])
            .inc();
        self.events()
            .report(TransactionError::SubmissionRejected { reason });

        if self.pending_reset {
            self.teardown();
            self.events()
                .message(Severity::Info, "Deferred reset applied");
            return;
        }

        let tx = self.sender();
        if let Some(state) = self.state.as_mut() {
            state.discard_artifacts();
        }
        self.submit_failures += 1;
        self.set_phase(TransactionPhase::SubmissionFailed);

        let delay = self
            .inner
            .config
            .submit_failed_policy()
            .delay(self.submit_failures);
        info!(
            delay_ms = delay.as_millis() as u64,
            failures = self.submit_failures,
            "Retrying with a fresh challenge after backoff"
        );

        let epoch = self.epoch;
        stop(&mut self.tasks.timer);
        let (handle, mut token) = cancel_pair();
        self.spawn_guarded("retry-timer", async move {
            if pause(&mut token, delay).await {
                let _ = tx
                    .send(TaskEvent::RetryRound { epoch })
                    .await;
            }
        });
        self.tasks.timer = Some(handle);
    }

    fn resume_after_failure(&mut self) {
        stop(&mut self.tasks.timer);
        self.set_phase(TransactionPhase::AcquiringArtifacts);
        self.start_relay_poller();
        self.start_artifact_round();
    }

    // =========================================================================
    // Task supervision
    // =========================================================================

    fn spawn_guarded<F>(&self, task: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join = tokio::spawn(future);
        self.watch_task(task, join);
    }

    /// Report a panic in `join` back to the actor as a fault.
    fn watch_task(&self, task: &'static str, join: JoinHandle<()>) {
        let tx = self.sender();
        let epoch = self.epoch;

        tokio::spawn(async move {
            if let Err(e) = join.await {
                if e.is_panic() {
                    error!(task, "Background task panicked");
                    let _ = tx
                        .send(TaskEvent::Fault {
                            epoch,
                            task,
                            reason: format!("{} task panicked", task),
                        })
                        .await;
                }
            }
        });
    }
}

//! The mutable record of one transaction.
//!
//! Owned by the orchestrator actor and never shared, so none of these
//! methods need synchronisation. Every challenge artifact gets a serial;
//! answers are accepted only for the serial currently held.

use uuid::Uuid;

use crate::catalog::CatalogEntry;
use crate::challenge::ChallengeArtifact;
use crate::gateway::{SubmissionPayload, TransactionContext};
use crate::textmatch::ScoreBreakdown;

use super::types::TransactionError;

/// Where a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSource {
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Filled {
    value: String,
    source: FillSource,
}

#[derive(Debug, Clone)]
struct HeldArtifact {
    serial: u64,
    artifact: ChallengeArtifact,
}

/// State of the active transaction.
#[derive(Debug, Clone)]
pub struct TransactionState {
    entry: CatalogEntry,
    score: ScoreBreakdown,
    context: Option<TransactionContext>,
    artifact: Option<HeldArtifact>,
    last_serial: u64,
    continuation: Option<String>,
    answer: Option<Filled>,
    code: Option<Filled>,
    /// Code of the last submission; the relay may keep serving it.
    spent_code: Option<String>,
    code_requested: bool,
    submission_in_flight: bool,
    submission_attempts: u32,
}

impl TransactionState {
    pub fn new(entry: CatalogEntry, score: ScoreBreakdown) -> Self {
        Self {
            entry,
            score,
            context: None,
            artifact: None,
            last_serial: 0,
            continuation: None,
            answer: None,
            code: None,
            spent_code: None,
            code_requested: false,
            submission_in_flight: false,
            submission_attempts: 0,
        }
    }

    pub fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    pub fn score(&self) -> &ScoreBreakdown {
        &self.score
    }

    pub fn context(&self) -> Option<&TransactionContext> {
        self.context.as_ref()
    }

    /// Cache the context; it is fetched once per transaction.
    pub fn set_context(&mut self, context: TransactionContext) {
        self.context = Some(context);
    }

    /// Hold a new artifact and return its serial.
    ///
    /// Any answer for the previous artifact is dropped.
    pub fn install_artifact(&mut self, artifact: ChallengeArtifact) -> u64 {
        self.last_serial += 1;
        self.continuation = Some(artifact.token.clone());
        self.artifact = Some(HeldArtifact {
            serial: self.last_serial,
            artifact,
        });
        self.answer = None;
        self.last_serial
    }

    /// Serial of the artifact currently held.
    pub fn current_serial(&self) -> Option<u64> {
        self.artifact.as_ref().map(|a| a.serial)
    }

    pub fn current_artifact(&self) -> Option<&ChallengeArtifact> {
        self.artifact.as_ref().map(|a| &a.artifact)
    }

    /// Token of the most recent artifact, kept across discards so the next
    /// fetch can pass it upstream.
    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Accept an answer produced for artifact `serial`.
    ///
    /// Returns false (and changes nothing) when `serial` is not the artifact
    /// currently held or a submission is in flight. An automatic answer never
    /// replaces one already present.
    pub fn accept_answer(&mut self, serial: u64, answer: String, source: FillSource) -> bool {
        if self.submission_in_flight || self.current_serial() != Some(serial) {
            return false;
        }
        if source == FillSource::Auto && self.answer.is_some() {
            return false;
        }
        self.answer = Some(Filled {
            value: answer,
            source,
        });
        true
    }

    /// Accept a one-time code.
    ///
    /// An automatic code never replaces one already present and is refused
    /// when it equals the code already submitted; a manual code always
    /// replaces. Nothing changes while a submission is in flight.
    pub fn accept_code(&mut self, code: String, source: FillSource) -> bool {
        if self.submission_in_flight {
            return false;
        }
        if source == FillSource::Auto
            && (self.code.is_some() || self.spent_code.as_deref() == Some(code.as_str()))
        {
            return false;
        }
        self.code = Some(Filled {
            value: code,
            source,
        });
        true
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_ref().map(|f| f.value.as_str())
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_ref().map(|f| f.value.as_str())
    }

    /// Everything needed for a submission is present.
    pub fn is_ready(&self) -> bool {
        self.context.is_some()
            && self.artifact.is_some()
            && self.answer.is_some()
            && self.code.is_some()
    }

    /// Ready, and both values were filled automatically.
    pub fn auto_ready(&self) -> bool {
        self.is_ready()
            && self.answer.as_ref().map(|f| f.source) == Some(FillSource::Auto)
            && self.code.as_ref().map(|f| f.source) == Some(FillSource::Auto)
    }

    /// Drop the held artifact, its answer and the code.
    pub fn discard_artifacts(&mut self) {
        self.artifact = None;
        self.answer = None;
        self.code = None;
    }

    /// Drop the held artifact and its answer, keeping the code.
    pub fn discard_challenge(&mut self) {
        self.artifact = None;
        self.answer = None;
    }

    pub fn code_requested(&self) -> bool {
        self.code_requested
    }

    pub fn mark_code_requested(&mut self) {
        self.code_requested = true;
    }

    pub fn submission_in_flight(&self) -> bool {
        self.submission_in_flight
    }

    pub fn submission_attempts(&self) -> u32 {
        self.submission_attempts
    }

    pub fn begin_submission(&mut self) {
        self.spent_code = self.code.as_ref().map(|f| f.value.clone());
        self.submission_in_flight = true;
        self.submission_attempts += 1;
    }

    pub fn end_submission(&mut self) {
        self.submission_in_flight = false;
    }

    /// Build the submission payload from the held values.
    pub fn submission_payload(&self, request_id: Uuid) -> Result<SubmissionPayload, TransactionError> {
        let missing = |what: &str| TransactionError::IncompleteTransactionState {
            missing: what.to_string(),
        };

        let context = self.context.as_ref().ok_or_else(|| missing("transaction context"))?;
        let artifact = self.artifact.as_ref().ok_or_else(|| missing("challenge artifact"))?;
        let answer = self.answer.as_ref().ok_or_else(|| missing("challenge answer"))?;
        let code = self.code.as_ref().ok_or_else(|| missing("one-time code"))?;

        Ok(SubmissionPayload {
            request_id,
            entry_id: self.entry.entry_id.clone(),
            color_id: context.color_id.clone(),
            usage_id: context.usage_id.clone(),
            partner_id: context.partner_id.clone(),
            partner_record: context.partner_record.clone(),
            code: code.value.clone(),
            challenge_answer: answer.value.clone(),
            challenge_token: artifact.artifact.token.clone(),
            quantity: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::textmatch::SimilarityEnsemble;

    fn state() -> TransactionState {
        let entry = fixtures::catalog_entry("1", "Model X", "Deluxe");
        let score = SimilarityEnsemble::new().score("model x deluxe", &entry.combined_label());
        TransactionState::new(entry, score)
    }

    fn ready_state(answer_source: FillSource, code_source: FillSource) -> TransactionState {
        let mut state = state();
        state.set_context(fixtures::transaction_context());
        let serial = state.install_artifact(fixtures::artifact("tok-1"));
        assert!(state.accept_answer(serial, "ab12".to_string(), answer_source));
        assert!(state.accept_code("48213".to_string(), code_source));
        state
    }

    #[test]
    fn test_serials_increase() {
        let mut state = state();
        assert_eq!(state.current_serial(), None);
        assert_eq!(state.install_artifact(fixtures::artifact("a")), 1);
        assert_eq!(state.install_artifact(fixtures::artifact("b")), 2);
        assert_eq!(state.current_serial(), Some(2));
        assert_eq!(state.continuation(), Some("b"));
    }

    #[test]
    fn test_stale_answer_rejected() {
        let mut state = state();
        let old = state.install_artifact(fixtures::artifact("a"));
        let new = state.install_artifact(fixtures::artifact("b"));

        assert!(!state.accept_answer(old, "stale".to_string(), FillSource::Auto));
        assert!(state.answer().is_none());

        assert!(state.accept_answer(new, "fresh".to_string(), FillSource::Auto));
        assert_eq!(state.answer(), Some("fresh"));
    }

    #[test]
    fn test_new_artifact_voids_answer() {
        let mut state = state();
        let serial = state.install_artifact(fixtures::artifact("a"));
        state.accept_answer(serial, "ab".to_string(), FillSource::Manual);
        state.install_artifact(fixtures::artifact("b"));
        assert!(state.answer().is_none());
    }

    #[test]
    fn test_auto_answer_keeps_manual() {
        let mut state = state();
        let serial = state.install_artifact(fixtures::artifact("a"));
        assert!(state.accept_answer(serial, "typed".to_string(), FillSource::Manual));
        assert!(!state.accept_answer(serial, "solved".to_string(), FillSource::Auto));
        assert_eq!(state.answer(), Some("typed"));
    }

    #[test]
    fn test_auto_code_does_not_replace() {
        let mut state = state();
        assert!(state.accept_code("1111".to_string(), FillSource::Auto));
        assert!(!state.accept_code("2222".to_string(), FillSource::Auto));
        assert_eq!(state.code(), Some("1111"));
        assert!(state.accept_code("3333".to_string(), FillSource::Manual));
        assert_eq!(state.code(), Some("3333"));
    }

    #[test]
    fn test_spent_code_not_refilled_by_relay() {
        let mut state = ready_state(FillSource::Auto, FillSource::Auto);
        state.begin_submission();
        state.end_submission();
        state.discard_artifacts();

        assert!(!state.accept_code("48213".to_string(), FillSource::Auto));
        assert_eq!(state.code(), None);
        assert!(state.accept_code("55555".to_string(), FillSource::Auto));

        // The operator may still enter the same code by hand.
        state.discard_artifacts();
        assert!(state.accept_code("48213".to_string(), FillSource::Manual));
    }

    #[test]
    fn test_ready_requires_context() {
        let mut state = state();
        let serial = state.install_artifact(fixtures::artifact("a"));
        state.accept_answer(serial, "ab".to_string(), FillSource::Auto);
        state.accept_code("1".to_string(), FillSource::Auto);
        assert!(!state.is_ready());

        state.set_context(fixtures::transaction_context());
        assert!(state.is_ready());
        assert!(state.auto_ready());
    }

    #[test]
    fn test_manual_value_blocks_auto_ready() {
        let state = ready_state(FillSource::Auto, FillSource::Manual);
        assert!(state.is_ready());
        assert!(!state.auto_ready());

        let state = ready_state(FillSource::Manual, FillSource::Auto);
        assert!(!state.auto_ready());
    }

    #[test]
    fn test_in_flight_freezes_values() {
        let mut state = ready_state(FillSource::Auto, FillSource::Auto);
        state.begin_submission();
        let serial = state.current_serial().unwrap();
        assert!(!state.accept_answer(serial, "zz".to_string(), FillSource::Manual));
        assert!(!state.accept_code("9".to_string(), FillSource::Manual));
        assert_eq!(state.submission_attempts(), 1);

        state.end_submission();
        assert!(!state.submission_in_flight());
    }

    #[test]
    fn test_discard_keeps_continuation() {
        let mut state = ready_state(FillSource::Auto, FillSource::Auto);
        state.discard_artifacts();
        assert!(state.answer().is_none());
        assert!(state.code().is_none());
        assert!(state.current_serial().is_none());
        assert_eq!(state.continuation(), Some("tok-1"));
        assert!(state.context().is_some());
    }

    #[test]
    fn test_discard_challenge_keeps_code() {
        let mut state = ready_state(FillSource::Auto, FillSource::Auto);
        state.discard_challenge();
        assert!(state.answer().is_none());
        assert_eq!(state.code(), Some("48213"));
    }

    #[test]
    fn test_submission_payload() {
        let state = ready_state(FillSource::Auto, FillSource::Auto);
        let id = Uuid::new_v4();
        let payload = state.submission_payload(id).unwrap();
        assert_eq!(payload.request_id, id);
        assert_eq!(payload.entry_id, "1");
        assert_eq!(payload.partner_id, "1024");
        assert_eq!(payload.challenge_token, "tok-1");
        assert_eq!(payload.challenge_answer, "ab12");
        assert_eq!(payload.code, "48213");
        assert_eq!(payload.quantity, 1);
    }

    #[test]
    fn test_submission_payload_missing_context() {
        let mut state = state();
        let serial = state.install_artifact(fixtures::artifact("a"));
        state.accept_answer(serial, "ab".to_string(), FillSource::Auto);
        state.accept_code("1".to_string(), FillSource::Auto);

        let err = state.submission_payload(Uuid::new_v4()).unwrap_err();
        assert_eq!(
            err,
            TransactionError::IncompleteTransactionState {
                missing: "transaction context".to_string()
            }
        );
        assert!(!err.is_retryable());
    }
}

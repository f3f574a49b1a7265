//! The uniqueness checker: idempotent, transactional orchestration of
//! [`ConflictDetector`] over a [`BackingStore`].
//!
//! Per submission, inside one store transaction per chunk:
//!
//! 1. a transaction id with a recorded result gets that result back,
//!    unchanged, and nothing is written
//! 2. otherwise the request is decided against the transaction's view of
//!    its states
//! 3. a success consumes the inputs and creates the outputs
//! 4. the result, success or failure, is recorded for the id
//!
//! The checker holds no state between calls. Everything that must survive
//! a call lives in the store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use notary_core::{
    CheckError, CheckRequest, CheckRequestMessage, CheckResponse, CheckResult, HoldingIdentity,
    RequestError, SecureHash,
};
use notary_storage::{BackingStore, StorageError, TransactionDetails, TransactionOps};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CheckerConfig;
use crate::detector::ConflictDetector;
use crate::error::CheckerError;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::signing::{respond, ResultSigner};

pub struct UniquenessChecker<S: BackingStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    config: CheckerConfig,
}

/// One unit of work: a parsed request, or a wire message that failed to
/// parse but whose transaction id did.
enum Submission {
    Request(CheckRequest),
    Rejected {
        tx_id: SecureHash,
        holding_identity: HoldingIdentity,
        digest: SecureHash,
        error: RequestError,
    },
}

impl Submission {
    fn tx_id(&self) -> &SecureHash {
        match self {
            Submission::Request(request) => &request.tx_id,
            Submission::Rejected { tx_id, .. } => tx_id,
        }
    }

    fn holding_identity(&self) -> &HoldingIdentity {
        match self {
            Submission::Request(request) => &request.holding_identity,
            Submission::Rejected {
                holding_identity, ..
            } => holding_identity,
        }
    }

    fn digest(&self) -> SecureHash {
        match self {
            Submission::Request(request) => request.digest(),
            Submission::Rejected { digest, .. } => *digest,
        }
    }
}

fn outcome(result: &CheckResult) -> &'static str {
    result.error().map_or("success", CheckError::kind)
}

impl<S: BackingStore> UniquenessChecker<S> {
    /// A checker on the system clock with no metrics.
    pub fn new(store: Arc<S>, config: CheckerConfig) -> Self {
        UniquenessChecker {
            store,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(NoopMetrics),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check one request. A batch of one.
    pub async fn process(&self, request: CheckRequest) -> Result<CheckResult, CheckerError> {
        let tx_id = request.tx_id;
        self.process_batch(vec![request])
            .await?
            .pop()
            .ok_or_else(|| CheckerError::InvariantViolation {
                tx_id,
                reason: "batch of one produced no result".to_string(),
            })
    }

    /// Check `requests`, returning results in request order.
    ///
    /// Requests are grouped by holding identity and each group is handled
    /// in chunks of at most `max_batch_size`, one store transaction per
    /// chunk. Later requests see what earlier ones in the same call
    /// consumed and created; a transaction id that repeats within the call
    /// gets the first occurrence's result.
    ///
    /// On `Err`, chunks that had already committed stay committed.
    /// Resubmitting the whole batch is safe: those ids replay.
    pub async fn process_batch(
        &self,
        requests: Vec<CheckRequest>,
    ) -> Result<Vec<CheckResult>, CheckerError> {
        self.run(requests.into_iter().map(Submission::Request).collect())
            .await
    }

    /// Check a wire message. See [`UniquenessChecker::process_messages`].
    pub async fn process_message(
        &self,
        message: &CheckRequestMessage,
    ) -> Result<CheckResult, CheckerError> {
        let results = self.process_messages(std::slice::from_ref(message)).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| CheckerError::InvariantViolation {
                tx_id: SecureHash::sha256(message.tx_id.as_bytes()),
                reason: "batch of one produced no result".to_string(),
            })
    }

    /// Check wire messages, returning results in message order.
    ///
    /// A message that fails to parse becomes `MalformedRequest`. When its
    /// transaction id parsed, that failure is recorded like any other
    /// result; otherwise there is nothing to record it under and it is
    /// returned uncached.
    pub async fn process_messages(
        &self,
        messages: &[CheckRequestMessage],
    ) -> Result<Vec<CheckResult>, CheckerError> {
        let mut results: Vec<Option<CheckResult>> = vec![None; messages.len()];
        let mut submissions = Vec::with_capacity(messages.len());
        let mut positions = Vec::with_capacity(messages.len());

        for (i, message) in messages.iter().enumerate() {
            let error = match message.parse() {
                Ok(request) => {
                    submissions.push(Submission::Request(request));
                    positions.push(i);
                    continue;
                }
                Err(error) => error,
            };
            match message.tx_id.parse::<SecureHash>() {
                Ok(tx_id) => {
                    submissions.push(Submission::Rejected {
                        tx_id,
                        holding_identity: message.holding_identity.clone(),
                        digest: message.digest(),
                        error,
                    });
                    positions.push(i);
                }
                Err(_) => {
                    debug!(
                        holding_identity = %message.holding_identity.short_hash(),
                        tx_id = %message.tx_id,
                        error = %error,
                        "rejecting message without a usable transaction id"
                    );
                    let result = CheckResult::failure(
                        self.clock.now(),
                        CheckError::MalformedRequest {
                            error_text: error.to_string(),
                        },
                    );
                    self.metrics
                        .record_result(&message.holding_identity, &result);
                    results[i] = Some(result);
                }
            }
        }

        let decided = self.run(submissions).await?;
        for (i, result) in positions.into_iter().zip(decided) {
            results[i] = Some(result);
        }
        Ok(results.into_iter().flatten().collect())
    }

    /// [`process`](Self::process), then wrap the result in a response
    /// signed by `signer` when it is a success.
    pub async fn process_and_sign(
        &self,
        request: CheckRequest,
        signer: &dyn ResultSigner,
    ) -> Result<CheckResponse, CheckerError> {
        let tx_id = request.tx_id;
        let result = self.process(request).await?;
        Ok(respond(signer, &tx_id, result)?)
    }

    async fn run(&self, submissions: Vec<Submission>) -> Result<Vec<CheckResult>, CheckerError> {
        if submissions.is_empty() {
            return Ok(Vec::new());
        }
        self.metrics.record_batch(submissions.len());
        let started = Instant::now();

        // Holding identities in first-seen order, each with its positions.
        let mut groups: Vec<(HoldingIdentity, Vec<usize>)> = Vec::new();
        let mut group_of: HashMap<&HoldingIdentity, usize> = HashMap::new();
        for (i, submission) in submissions.iter().enumerate() {
            let g = *group_of
                .entry(submission.holding_identity())
                .or_insert_with(|| {
                    groups.push((submission.holding_identity().clone(), Vec::new()));
                    groups.len() - 1
                });
            groups[g].1.push(i);
        }

        let mut results: Vec<Option<CheckResult>> = vec![None; submissions.len()];
        for (holding_identity, positions) in &groups {
            for chunk in positions.chunks(self.config.checker.max_batch_size.max(1)) {
                let items: Vec<&Submission> = chunk.iter().map(|&i| &submissions[i]).collect();
                let items = items.as_slice();
                let decided = self
                    .with_retry(holding_identity, move || {
                        self.process_chunk(holding_identity, items)
                    })
                    .await?;
                for (&i, result) in chunk.iter().zip(decided) {
                    results[i] = Some(result);
                }
            }
        }

        let results: Vec<CheckResult> = results.into_iter().flatten().collect();
        let successes = results.iter().filter(|r| r.is_success()).count();
        info!(
            batch_size = results.len(),
            tenants = groups.len(),
            successes,
            failures = results.len() - successes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch processed"
        );
        Ok(results)
    }

    /// Run `op`, retrying transient store failures with linear backoff.
    async fn with_retry<T, F, Fut>(
        &self,
        holding_identity: &HoldingIdentity,
        mut op: F,
    ) -> Result<T, CheckerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CheckerError>>,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(CheckerError::Storage(e)) => {
                    self.metrics.record_store_error(&e);
                    if !e.is_transient() || attempt >= max_attempts {
                        return Err(CheckerError::Storage(e));
                    }
                    warn!(
                        holding_identity = %holding_identity.short_hash(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "transient store failure, retrying"
                    );
                    self.metrics.record_retry(attempt);
                    tokio::time::sleep(self.config.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn process_chunk(
        &self,
        holding_identity: &HoldingIdentity,
        items: &[&Submission],
    ) -> Result<Vec<CheckResult>, CheckerError> {
        let session = self.store.session(holding_identity);
        let tx_ids: Vec<SecureHash> = items.iter().map(|s| *s.tx_id()).collect();

        // Fast path outside the transaction. A miss here is only a hint;
        // the lookup is repeated under the transaction.
        let cached = session.get_transaction_details(&tx_ids).await?;
        if items.iter().all(|s| cached.contains_key(s.tx_id())) {
            return Ok(items
                .iter()
                .filter_map(|s| cached.get(s.tx_id()).map(|d| self.replay(s, d)))
                .collect());
        }

        let opened = Instant::now();
        let mut txn = session.begin_transaction().await?;
        let committed = txn.get_transaction_details(&tx_ids).await?;

        let mut decided: HashMap<SecureHash, (SecureHash, CheckResult)> = HashMap::new();
        let mut pairs: Vec<(CheckRequest, CheckResult)> = Vec::new();
        let mut rejected: Vec<TransactionDetails> = Vec::new();
        let mut results = Vec::with_capacity(items.len());

        for item in items {
            let tx_id = *item.tx_id();
            if let Some(details) = committed.get(&tx_id) {
                results.push(self.replay(item, details));
                continue;
            }
            if let Some((digest, result)) = decided.get(&tx_id) {
                if *digest != item.digest() {
                    warn!(
                        holding_identity = %holding_identity.short_hash(),
                        tx_id = %tx_id,
                        "transaction id repeated in batch with a different request; using the first"
                    );
                }
                self.metrics.record_replay(holding_identity);
                results.push(result.clone());
                continue;
            }

            let now = self.clock.now();
            let result = match item {
                Submission::Rejected { error, digest, .. } => {
                    let result = CheckResult::failure(
                        now,
                        CheckError::MalformedRequest {
                            error_text: error.to_string(),
                        },
                    );
                    rejected.push(TransactionDetails {
                        tx_id,
                        request_digest: *digest,
                        result: result.clone(),
                    });
                    result
                }
                Submission::Request(request) => {
                    let result = match request
                        .check_output_count(self.config.checker.max_output_states)
                    {
                        Err(error) => CheckResult::failure(
                            now,
                            CheckError::MalformedRequest {
                                error_text: error.to_string(),
                            },
                        ),
                        Ok(()) => {
                            let states = txn.get_state_details(&request.all_state_refs()).await?;
                            let result = ConflictDetector::check(request, now, &states);
                            if result.is_success() {
                                self.apply_success(&mut txn, request).await?;
                            }
                            result
                        }
                    };
                    pairs.push((request.clone(), result.clone()));
                    result
                }
            };

            debug!(
                holding_identity = %holding_identity.short_hash(),
                tx_id = %tx_id,
                outcome = outcome(&result),
                "request decided"
            );
            decided.insert(tx_id, (item.digest(), result.clone()));
            results.push(result);
        }

        txn.commit_transactions(&pairs).await?;
        txn.record_transactions(rejected.clone()).await?;
        txn.commit().await?;
        self.metrics
            .record_transaction(holding_identity, opened.elapsed());

        for (_, result) in &pairs {
            self.metrics.record_result(holding_identity, result);
        }
        for details in &rejected {
            self.metrics.record_result(holding_identity, &details.result);
        }
        Ok(results)
    }

    /// Consume the inputs and create the outputs of an accepted request.
    async fn apply_success(
        &self,
        txn: &mut TransactionOps<'_, S>,
        request: &CheckRequest,
    ) -> Result<(), CheckerError> {
        let written = match txn
            .consume_states(&request.tx_id, &request.input_states)
            .await
        {
            Ok(()) => {
                txn.create_unconsumed_states(&request.output_state_refs())
                    .await
            }
            Err(e) => Err(e),
        };
        written.map_err(|e| self.commit_error(request, e))
    }

    /// The detector just approved this request under the same transaction,
    /// so a store refusing its writes means the store and the decision
    /// disagree.
    fn commit_error(&self, request: &CheckRequest, e: StorageError) -> CheckerError {
        match e {
            StorageError::StateNotFound { .. }
            | StorageError::StateAlreadyConsumed { .. }
            | StorageError::StateAlreadyExists { .. } => {
                error!(
                    holding_identity = %request.holding_identity.short_hash(),
                    tx_id = %request.tx_id,
                    error = %e,
                    "store refused writes of an accepted request"
                );
                CheckerError::InvariantViolation {
                    tx_id: request.tx_id,
                    reason: e.to_string(),
                }
            }
            other => CheckerError::Storage(other),
        }
    }

    fn replay(&self, item: &Submission, details: &TransactionDetails) -> CheckResult {
        let holding_identity = item.holding_identity();
        if details.request_digest != item.digest() {
            warn!(
                holding_identity = %holding_identity.short_hash(),
                tx_id = %details.tx_id,
                "resubmitted transaction differs from the recorded request; returning the recorded result"
            );
        } else {
            debug!(
                holding_identity = %holding_identity.short_hash(),
                tx_id = %details.tx_id,
                outcome = outcome(&details.result),
                "returning recorded result"
            );
        }
        self.metrics.record_replay(holding_identity);
        details.result.clone()
    }
}

//! Signing, broadcasting and tracking contract calls to a terminal state.
//!
//! ```text
//! Unsent -> Broadcast -> PendingReceipt -> Mined(success)
//!    |          |              |        \-> Mined(reverted) -> Failed
//!    \----------+--------------+----------> Failed
//! ```
//!
//! Once a signed transaction has an identifier it is only ever tracked by
//! polling for its receipt. It is never re-signed or re-sent, since a second
//! transaction from the same nonce would conflict with the first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::common::{hex_encode, Address, Hash};
use crate::error::{LedgerError, SubmitError};
use crate::ledger::{Ledger, Receipt};
use crate::tx::{Credential, GasOptions, LegacyTransaction, DEFAULT_CHAIN_ID};

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of polls after which a pending transaction is reported as
/// slow. Polling continues afterwards.
pub const DEFAULT_CONFIRMATION_BLOCKS: u64 = 50;

/// Longest single sleep between cancellation checks.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterConfig {
    pub chain_id: u64,
    pub gas: GasOptions,
    pub poll_interval: Duration,
    pub confirmation_blocks: u64,
    /// Upper bound on the receipt wait. `None` waits until cancelled.
    pub max_wait: Option<Duration>,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            gas: GasOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_blocks: DEFAULT_CONFIRMATION_BLOCKS,
            max_wait: None,
        }
    }
}

/// Stop signal for a receipt wait, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A contract call ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxState {
    Unsent,
    Broadcast { tx_hash: Hash },
    PendingReceipt { tx_hash: Hash },
    Mined { receipt: Receipt, success: bool },
    Failed { tx_hash: Option<Hash>, reason: String },
}

impl TxState {
    pub fn tx_hash(&self) -> Option<Hash> {
        match self {
            TxState::Unsent => None,
            TxState::Broadcast { tx_hash } | TxState::PendingReceipt { tx_hash } => Some(*tx_hash),
            TxState::Mined { receipt, .. } => Some(receipt.transaction_hash),
            TxState::Failed { tx_hash, .. } => *tx_hash,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxState::Mined { success: true, .. } | TxState::Failed { .. }
        )
    }
}

/// Submits calls for one sender, one at a time.
///
/// The sender's nonce is read right before signing, so submissions through
/// the same submitter are serialized.
pub struct TransactionSubmitter<L: Ledger> {
    ledger: Arc<L>,
    credential: Credential,
    config: SubmitterConfig,
    in_flight: Mutex<()>,
    state: Mutex<TxState>,
}

impl<L: Ledger> TransactionSubmitter<L> {
    pub fn new(ledger: Arc<L>, credential: Credential, config: SubmitterConfig) -> Self {
        Self {
            ledger,
            credential,
            config,
            in_flight: Mutex::new(()),
            state: Mutex::new(TxState::Unsent),
        }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn sender(&self) -> Address {
        self.credential.address()
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// State of the most recent submission.
    pub fn state(&self) -> TxState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transition(&self, next: TxState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, "transaction state");
        *state = next;
    }

    fn fail(&self, tx_hash: Option<Hash>, error: SubmitError) -> SubmitError {
        self.transition(TxState::Failed {
            tx_hash,
            reason: error.to_string(),
        });
        error
    }

    /// Signs, broadcasts and waits for the receipt of `call`.
    ///
    /// # Errors
    /// - [`SubmitError::Signing`] or [`SubmitError::Network`] if the call
    ///   cannot be signed or the node rejects it outright.
    /// - [`SubmitError::TransactionReverted`] if it is mined with a failure
    ///   status.
    /// - [`SubmitError::TransactionNotMined`] if `cancel` fires or the
    ///   configured deadline elapses first. The state keeps the identifier
    ///   so the wait can be resumed with [`TransactionSubmitter::await_receipt`].
    pub fn submit(&self, call: &PreparedCall, cancel: &CancelToken) -> Result<Receipt, SubmitError> {
        let _serial = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.transition(TxState::Unsent);

        let sender = self.sender();
        let nonce = self
            .ledger
            .transaction_count(&sender)
            .map_err(|e| self.fail(None, e.into()))?;

        let tx = LegacyTransaction {
            nonce,
            gas_price: self.config.gas.price,
            gas_limit: self.config.gas.limit,
            to: call.to,
            value: call.value,
            data: call.data.clone(),
        };
        let signed = tx
            .sign(&self.credential, self.config.chain_id)
            .map_err(|e| self.fail(None, e))?;
        let tx_hash = signed.hash;
        self.transition(TxState::Broadcast { tx_hash });

        match self.ledger.send_raw_transaction(&signed.raw) {
            Ok(reported) => {
                if reported != tx_hash {
                    warn!(
                        local = %hex_encode(tx_hash),
                        reported = %hex_encode(reported),
                        "node reported a different transaction hash; tracking the local one"
                    );
                }
                info!(
                    tx_hash = %hex_encode(tx_hash),
                    from = %hex_encode(sender),
                    to = %hex_encode(call.to),
                    nonce,
                    "transaction broadcast"
                );
            }
            Err(LedgerError::NotMined { blocks }) => {
                warn!(
                    tx_hash = %hex_encode(tx_hash),
                    blocks,
                    "transaction not mined yet; polling for its receipt"
                );
            }
            Err(e) => return Err(self.fail(Some(tx_hash), e.into())),
        }

        self.wait_for_receipt(tx_hash, cancel)
    }

    /// Polls for the receipt of an already broadcast transaction until it is
    /// mined, `cancel` fires or the configured deadline elapses. Waits for
    /// any submission in progress to finish first.
    ///
    /// # Errors
    /// See [`TransactionSubmitter::submit`].
    pub fn await_receipt(&self, tx_hash: &Hash, cancel: &CancelToken) -> Result<Receipt, SubmitError> {
        let _serial = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.wait_for_receipt(*tx_hash, cancel)
    }

    fn wait_for_receipt(&self, tx_hash: Hash, cancel: &CancelToken) -> Result<Receipt, SubmitError> {
        self.transition(TxState::PendingReceipt { tx_hash });
        let deadline = self.config.max_wait.map(|wait| Instant::now() + wait);
        let mut attempts: u64 = 0;

        loop {
            match self.ledger.transaction_receipt(&tx_hash) {
                Ok(Some(receipt)) if receipt.is_mined() => return self.finish(receipt),
                Ok(_) => {}
                Err(e) => warn!(
                    tx_hash = %hex_encode(tx_hash),
                    error = %e,
                    "receipt poll failed; retrying"
                ),
            }

            attempts += 1;
            if attempts == self.config.confirmation_blocks {
                warn!(
                    tx_hash = %hex_encode(tx_hash),
                    attempts,
                    "transaction still not mined; continuing to poll"
                );
            }

            if !sleep_unless_stopped(self.config.poll_interval, cancel, deadline) {
                info!(
                    tx_hash = %hex_encode(tx_hash),
                    attempts,
                    "stopped waiting for receipt"
                );
                return Err(SubmitError::TransactionNotMined { tx_hash });
            }
        }
    }

    fn finish(&self, receipt: Receipt) -> Result<Receipt, SubmitError> {
        let success = receipt.succeeded();
        let tx_hash = receipt.transaction_hash;
        self.transition(TxState::Mined {
            receipt: receipt.clone(),
            success,
        });

        if success {
            info!(
                tx_hash = %hex_encode(tx_hash),
                block = receipt.block_number,
                "transaction mined"
            );
            Ok(receipt)
        } else {
            warn!(tx_hash = %hex_encode(tx_hash), "transaction reverted");
            Err(self.fail(
                Some(tx_hash),
                SubmitError::TransactionReverted { tx_hash },
            ))
        }
    }
}

/// Sleeps for `interval` in short slices. Returns `false` as soon as `cancel`
/// fires or `deadline` passes.
fn sleep_unless_stopped(interval: Duration, cancel: &CancelToken, deadline: Option<Instant>) -> bool {
    let wake_at = Instant::now() + interval;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            return false;
        }
        if now >= wake_at {
            return true;
        }
        std::thread::sleep((wake_at - now).min(CANCEL_CHECK_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keccak256;
    use crate::ledger::mock::{mined, MockLedger};

    fn fast_config() -> SubmitterConfig {
        SubmitterConfig {
            poll_interval: Duration::from_millis(1),
            confirmation_blocks: 3,
            ..SubmitterConfig::default()
        }
    }

    fn submitter(ledger: &Arc<MockLedger>, config: SubmitterConfig) -> TransactionSubmitter<MockLedger> {
        let credential = Credential::from_hex(&"46".repeat(32)).unwrap();
        TransactionSubmitter::new(Arc::clone(ledger), credential, config)
    }

    fn call() -> PreparedCall {
        PreparedCall {
            to: [0x35u8; 20],
            value: 0,
            data: crate::abi::encode_call(crate::abi::PAUSE, &[]),
        }
    }

    #[test]
    fn test_mined_on_first_poll() {
        let ledger = Arc::new(MockLedger::default());
        ledger.push_receipt(Ok(Some(mined(true))));
        let submitter = submitter(&ledger, fast_config());

        let receipt = submitter.submit(&call(), &CancelToken::new()).unwrap();
        let sent = ledger.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(receipt.transaction_hash, keccak256(&sent[0]));
        assert!(matches!(submitter.state(), TxState::Mined { success: true, .. }));
        assert!(submitter.state().is_terminal());
    }

    #[test]
    fn test_not_mined_recovers_without_resending() {
        let ledger = Arc::new(MockLedger::default());
        ledger
            .send_errors
            .lock()
            .unwrap()
            .push_back(LedgerError::NotMined { blocks: 50 });
        ledger.push_receipt(Ok(Some(mined(true))));
        let submitter = submitter(&ledger, fast_config());

        let receipt = submitter.submit(&call(), &CancelToken::new()).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(ledger.sent_count(), 1);
        assert_eq!(ledger.nonces.lock().unwrap().len(), 1);

        let expected = keccak256(&ledger.sent.lock().unwrap()[0]);
        let polled = ledger.polled.lock().unwrap().clone();
        assert!(!polled.is_empty());
        assert!(polled.iter().all(|hash| *hash == expected));
        assert_eq!(submitter.state().tx_hash(), Some(expected));
        assert!(matches!(submitter.state(), TxState::Mined { success: true, .. }));
    }

    #[test]
    fn test_polls_until_mined() {
        let ledger = Arc::new(MockLedger::default());
        ledger.push_receipt(Ok(None));
        ledger.push_receipt(Err(LedgerError::Transport("connection reset".to_string())));
        ledger.push_receipt(Ok(Some(Receipt {
            block_number: Some(0),
            ..mined(true)
        })));
        ledger.push_receipt(Ok(None));
        ledger.push_receipt(Ok(Some(mined(true))));
        let submitter = submitter(&ledger, fast_config());

        submitter.submit(&call(), &CancelToken::new()).unwrap();
        assert_eq!(ledger.polled.lock().unwrap().len(), 5);
        assert_eq!(ledger.sent_count(), 1);
    }

    #[test]
    fn test_reverted_receipt_fails() {
        let ledger = Arc::new(MockLedger::default());
        ledger.push_receipt(Ok(Some(mined(false))));
        let submitter = submitter(&ledger, fast_config());

        let result = submitter.submit(&call(), &CancelToken::new());
        assert!(matches!(result, Err(SubmitError::TransactionReverted { .. })));
        assert!(matches!(submitter.state(), TxState::Failed { tx_hash: Some(_), .. }));
    }

    #[test]
    fn test_rejected_broadcast_fails_without_polling() {
        let ledger = Arc::new(MockLedger::default());
        ledger
            .send_errors
            .lock()
            .unwrap()
            .push_back(LedgerError::Rejected("insufficient funds".to_string()));
        let submitter = submitter(&ledger, fast_config());

        let result = submitter.submit(&call(), &CancelToken::new());
        assert!(matches!(
            result,
            Err(SubmitError::Network(LedgerError::Rejected(_)))
        ));
        assert!(ledger.polled.lock().unwrap().is_empty());
        assert!(matches!(submitter.state(), TxState::Failed { .. }));
    }

    #[test]
    fn test_cancel_stops_wait_and_keeps_identifier() {
        let ledger = Arc::new(MockLedger::default());
        let submitter = submitter(&ledger, fast_config());
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = submitter.submit(&call(), &cancel);
        assert_eq!(ledger.sent_count(), 1);
        let expected = keccak256(&ledger.sent.lock().unwrap()[0]);
        match result {
            Err(SubmitError::TransactionNotMined { tx_hash }) => assert_eq!(tx_hash, expected),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(
            submitter.state(),
            TxState::PendingReceipt { tx_hash: expected }
        );

        // Resuming tracks the same identifier without a new broadcast.
        ledger.push_receipt(Ok(Some(mined(true))));
        let receipt = submitter.await_receipt(&expected, &CancelToken::new()).unwrap();
        assert_eq!(receipt.transaction_hash, expected);
        assert_eq!(ledger.sent_count(), 1);
    }

    #[test]
    fn test_resume_waits_for_submission_in_progress() {
        let ledger = Arc::new(MockLedger::default());
        ledger.push_receipt(Ok(Some(mined(true))));
        let submitter = Arc::new(submitter(&ledger, fast_config()));
        let tx_hash = [0x42u8; 32];

        let serial = submitter.in_flight.lock().unwrap();
        let resumed = {
            let submitter = Arc::clone(&submitter);
            std::thread::spawn(move || submitter.await_receipt(&tx_hash, &CancelToken::new()))
        };
        std::thread::sleep(Duration::from_millis(30));
        assert!(ledger.polled.lock().unwrap().is_empty());
        assert_eq!(submitter.state(), TxState::Unsent);

        drop(serial);
        let receipt = resumed.join().unwrap().unwrap();
        assert_eq!(receipt.transaction_hash, tx_hash);
        assert_eq!(submitter.state().tx_hash(), Some(tx_hash));
    }

    #[test]
    fn test_deadline_stops_wait() {
        let ledger = Arc::new(MockLedger::default());
        let config = SubmitterConfig {
            max_wait: Some(Duration::from_millis(20)),
            ..fast_config()
        };
        let submitter = submitter(&ledger, config);

        let started = Instant::now();
        let result = submitter.submit(&call(), &CancelToken::new());
        assert!(matches!(result, Err(SubmitError::TransactionNotMined { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ledger.polled.lock().unwrap().len() > 1);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let ledger = Arc::new(MockLedger::default());
        let submitter = submitter(&ledger, fast_config());
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let result = submitter.submit(&call(), &cancel);
        handle.join().unwrap();
        assert!(matches!(result, Err(SubmitError::TransactionNotMined { .. })));
    }

    #[test]
    fn test_concurrent_submissions_get_distinct_nonces() {
        let ledger = Arc::new(MockLedger::default());
        for _ in 0..4 {
            ledger.push_receipt(Ok(Some(mined(true))));
        }
        let submitter = Arc::new(submitter(&ledger, fast_config()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let submitter = Arc::clone(&submitter);
                std::thread::spawn(move || submitter.submit(&call(), &CancelToken::new()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let mut nonces = ledger.nonces.lock().unwrap().clone();
        nonces.sort_unstable();
        assert_eq!(nonces, vec![0, 1, 2, 3]);
        let mut hashes: Vec<Hash> = ledger
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|raw| keccak256(raw))
            .collect();
        hashes.sort_unstable();
        hashes.dedup();
        assert_eq!(hashes.len(), 4);
    }

    #[test]
    fn test_sleep_unless_stopped() {
        let cancel = CancelToken::new();
        assert!(sleep_unless_stopped(Duration::from_millis(1), &cancel, None));
        assert!(!sleep_unless_stopped(
            Duration::from_secs(60),
            &cancel,
            Some(Instant::now())
        ));
        cancel.cancel();
        assert!(!sleep_unless_stopped(Duration::from_secs(60), &cancel, None));
    }
}

//! Two-phase payment submission sequencer.
//!
//! Scheduling an escrowed payment takes two independent on-chain
//! transactions that cannot be merged: an ERC-20 `approve` granting the
//! escrow factory spending rights, then the factory's `mint` that actually
//! creates the escrow. The sequencer's job is ordering: phase two never
//! fires before phase one is confirmed, and no phase is ever dispatched
//! twice for the same request.
//!
//! State lives in an explicit [`SubmissionState`] value passed into and
//! returned from [`PaymentSequencer::submit`]. Collaborator failures become
//! a terminal [`SubmissionState::Failed`] carrying a short human-readable
//! reason; nothing panics across this boundary.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;

use crate::network::EscrowConfig;
use crate::provider::{TokenDirectory, WalletProvider};
use crate::timestamp::UnixTimestamp;
use crate::types::{
    ContractWrite, EscrowPayment, EvmAddress, PaymentRequest, TokenAmount, TransactionHash,
    approveCall, mintCall,
};

/// Seconds between mint broadcast and the escrow's first release window.
///
/// Gives the transaction time to land before the schedule starts ticking.
pub const EXECUTION_GRACE_SECS: u64 = 120;

/// Phase of the current payment request.
///
/// `AwaitingApproval` and `AwaitingExecution` are what a caller holds while
/// a `submit` future is pending; the sequencer itself only ever returns the
/// other four. Exactly one request is in flight per sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SubmissionState {
    /// Nothing submitted yet.
    Idle,
    /// The approval call has been dispatched and is unconfirmed.
    AwaitingApproval,
    /// The token approval is confirmed; the mint may be dispatched.
    ApprovalGranted,
    /// The mint call has been dispatched and is unconfirmed.
    AwaitingExecution,
    /// The escrow was created.
    Completed,
    /// A phase failed; `reason` is short and human-readable.
    Failed { reason: String },
}

impl SubmissionState {
    /// Terminal states: the flow either finished or must be restarted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Completed | SubmissionState::Failed { .. }
        )
    }

    /// States with a collaborator call outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionState::AwaitingApproval | SubmissionState::AwaitingExecution
        )
    }
}

/// Errors surfaced by the sequencer, all of which terminate in a
/// [`SubmissionState::Failed`] whose reason is the display form below.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Token decimals unavailable; the unit conversion cannot proceed.
    #[error("No metadata for token {0}")]
    MissingTokenMetadata(EvmAddress),
    /// The wallet/provider call failed or was declined by the user.
    /// Carries the already-truncated provider message.
    #[error("{0}")]
    CollaboratorRejected(String),
    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PaymentError {
    fn into_failed(self) -> SubmissionState {
        SubmissionState::Failed {
            reason: self.to_string(),
        }
    }
}

/// Cut a provider error message at the first `" ("`.
///
/// Node providers append a parenthesized diagnostics blob to revert messages
/// (`execution reverted: insufficient balance (action=..., code=...)`); the
/// UI historically shows only the part before it. Messages without a
/// parenthesis pass through whole. Kept as a single named function so it can
/// be swapped for structured error codes if the provider ever exposes them.
pub fn strip_provider_suffix(message: &str) -> &str {
    match message.split_once(" (") {
        Some((head, _)) => head,
        None => message,
    }
}

/// Drives one payment request through approve-then-mint.
///
/// Generic over the wallet and token-metadata collaborators; the network
/// configuration is fixed at construction.
#[derive(Debug)]
pub struct PaymentSequencer<W, T> {
    wallet: W,
    tokens: T,
    config: EscrowConfig,
    /// Guards the suspend point: set while a collaborator call is pending.
    busy: AtomicBool,
}

impl<W, T> PaymentSequencer<W, T>
where
    W: WalletProvider,
    T: TokenDirectory,
{
    pub fn new(wallet: W, tokens: T, config: EscrowConfig) -> Self {
        PaymentSequencer {
            wallet,
            tokens,
            config,
            busy: AtomicBool::new(false),
        }
    }

    /// Advance `request` by one phase.
    ///
    /// From `Idle` or `Failed`, dispatches the token approval and returns
    /// [`SubmissionState::ApprovalGranted`] on success. From
    /// `ApprovalGranted`, dispatches the escrow mint and returns
    /// [`SubmissionState::Completed`]. Collaborator failures return
    /// [`SubmissionState::Failed`] with the truncated provider message.
    ///
    /// Calling while a phase is pending, or with an in-flight or completed
    /// state, performs no network call and returns the state unchanged.
    #[instrument(skip_all, fields(network = %self.wallet.network(), state = ?state))]
    pub async fn submit(
        &self,
        request: &PaymentRequest,
        state: SubmissionState,
    ) -> SubmissionState {
        if state.is_in_flight() {
            tracing::warn!("submission already in flight, ignoring");
            return state;
        }
        if state == SubmissionState::Completed {
            tracing::warn!("request already completed, ignoring");
            return state;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("concurrent submit while a phase is pending, ignoring");
            return state;
        }
        let next = match state {
            SubmissionState::Idle | SubmissionState::Failed { .. } => {
                match self.request_approval(request).await {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::warn!(error = %e, "approval failed");
                        e.into_failed()
                    }
                }
            }
            SubmissionState::ApprovalGranted => match self.execute(request).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(error = %e, "escrow mint failed");
                    e.into_failed()
                }
            },
            // Rejected above before the busy flag was taken.
            SubmissionState::AwaitingApproval
            | SubmissionState::AwaitingExecution
            | SubmissionState::Completed => state,
        };
        self.busy.store(false, Ordering::Release);
        next
    }

    /// Phase one: authorize the escrow factory to move the payment amount.
    async fn request_approval(
        &self,
        request: &PaymentRequest,
    ) -> Result<SubmissionState, PaymentError> {
        validate(request)?;
        let amount = self.base_amount(request).await?;
        let spender = self.config.get(self.wallet.network()).escrow_factory_address;
        let call = approveCall {
            spender: spender.into(),
            value: amount,
        };
        let write = ContractWrite {
            to: request.token_address,
            function: "approve",
            input: call.abi_encode().into(),
        };
        let tx = self.dispatch(write).await?;
        tracing::info!(tx = %tx, spender = %spender, "approval confirmed");
        Ok(SubmissionState::ApprovalGranted)
    }

    /// Phase two: mint the escrow with the previously approved funds.
    async fn execute(&self, request: &PaymentRequest) -> Result<SubmissionState, PaymentError> {
        validate(request)?;
        let amount = self.base_amount(request).await?;
        let factory = self.config.get(self.wallet.network()).escrow_factory_address;
        let start_time = UnixTimestamp::now() + EXECUTION_GRACE_SECS;
        let payment = EscrowPayment {
            sender: self.wallet.account().into(),
            receiver: request.receiver.into(),
            tokenAddress: request.token_address.into(),
            totalAmount: amount,
            startTime: U256::from(start_time.as_secs()),
            periodDuration: U256::from(request.period_duration_seconds),
            periods: U256::from(request.period_count),
            yieldStrategyId: U256::from(request.yield_strategy_id),
            // The factory assigns the real escrow address during minting.
            escrowAddress: Address::ZERO,
        };
        let call = mintCall { payment };
        let write = ContractWrite {
            to: factory,
            function: "mint",
            input: call.abi_encode().into(),
        };
        let tx = self.dispatch(write).await?;
        tracing::info!(tx = %tx, factory = %factory, start_time = %start_time, "escrow mint confirmed");
        Ok(SubmissionState::Completed)
    }

    async fn dispatch(&self, write: ContractWrite) -> Result<TransactionHash, PaymentError> {
        let function = write.function;
        self.wallet.write_contract(write).await.map_err(|e| {
            let message = e.to_string();
            tracing::warn!(function, error = %message, "wallet rejected contract write");
            PaymentError::CollaboratorRejected(strip_provider_suffix(&message).to_string())
        })
    }

    /// Resolve the request amount to base units via the token's declared
    /// decimals. Exact conversion; absent metadata is terminal.
    async fn base_amount(&self, request: &PaymentRequest) -> Result<TokenAmount, PaymentError> {
        let metadata = self
            .tokens
            .token_metadata(request.token_address)
            .await
            .ok_or(PaymentError::MissingTokenMetadata(request.token_address))?;
        request
            .amount
            .as_token_amount(metadata.decimals as u32)
            .map_err(|e| PaymentError::InvalidRequest(e.to_string()))
    }
}

fn validate(request: &PaymentRequest) -> Result<(), PaymentError> {
    if request.period_count == 0 {
        return Err(PaymentError::InvalidRequest(
            "period count must be positive".to_string(),
        ));
    }
    if request.period_duration_seconds == 0 {
        return Err(PaymentError::InvalidRequest(
            "period duration must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::schedule::resolve_period_name;
    use crate::types::{DisplayAmount, TokenMetadata};
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn request() -> PaymentRequest {
        PaymentRequest {
            receiver: "0x0000000000000000000000000000000000000001"
                .parse()
                .unwrap(),
            token_address: "0x0000000000000000000000000000000000000002"
                .parse()
                .unwrap(),
            amount: DisplayAmount::parse("100").unwrap(),
            period_count: 12,
            period_duration_seconds: 2_592_000,
            yield_strategy_id: 1,
        }
    }

    fn usdc_metadata() -> TokenMetadata {
        TokenMetadata {
            symbol: "USDC".to_string(),
            decimals: 6,
        }
    }

    /// Token directory returning a fixed answer for every address.
    struct StaticTokens(Option<TokenMetadata>);

    impl TokenDirectory for StaticTokens {
        fn token_metadata(
            &self,
            _token: EvmAddress,
        ) -> impl Future<Output = Option<TokenMetadata>> + Send {
            let metadata = self.0.clone();
            async move { metadata }
        }
    }

    /// Wallet that records every write and succeeds immediately.
    struct RecordingWallet {
        writes: Mutex<Vec<ContractWrite>>,
    }

    impl RecordingWallet {
        fn new() -> Self {
            RecordingWallet {
                writes: Mutex::new(Vec::new()),
            }
        }

        fn writes(&self) -> Vec<ContractWrite> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl WalletProvider for RecordingWallet {
        type Error = String;

        fn account(&self) -> EvmAddress {
            "0x00000000000000000000000000000000000000aa".parse().unwrap()
        }

        fn network(&self) -> Network {
            Network::Testnet
        }

        fn write_contract(
            &self,
            call: ContractWrite,
        ) -> impl Future<Output = Result<TransactionHash, Self::Error>> + Send {
            self.writes.lock().unwrap().push(call);
            async move { Ok(TransactionHash([0u8; 32])) }
        }
    }

    /// Wallet that fails every write with a fixed provider-style message.
    struct FailingWallet(&'static str);

    impl WalletProvider for FailingWallet {
        type Error = String;

        fn account(&self) -> EvmAddress {
            "0x00000000000000000000000000000000000000aa".parse().unwrap()
        }

        fn network(&self) -> Network {
            Network::Local
        }

        fn write_contract(
            &self,
            _call: ContractWrite,
        ) -> impl Future<Output = Result<TransactionHash, Self::Error>> + Send {
            let message = self.0.to_string();
            async move { Err(message) }
        }
    }

    /// Wallet whose writes block until released, for re-entrancy tests.
    struct GatedWallet {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    impl GatedWallet {
        fn new() -> Self {
            GatedWallet {
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    impl WalletProvider for GatedWallet {
        type Error = String;

        fn account(&self) -> EvmAddress {
            "0x00000000000000000000000000000000000000aa".parse().unwrap()
        }

        fn network(&self) -> Network {
            Network::Local
        }

        fn write_contract(
            &self,
            _call: ContractWrite,
        ) -> impl Future<Output = Result<TransactionHash, Self::Error>> + Send {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.entered.notify_one();
                self.release.notified().await;
                Ok(TransactionHash([0u8; 32]))
            }
        }
    }

    #[test]
    fn strips_provider_suffix_at_first_parenthesis() {
        assert_eq!(
            strip_provider_suffix(
                "execution reverted: insufficient balance (action=\"sendTransaction\", code=CALL_EXCEPTION)"
            ),
            "execution reverted: insufficient balance"
        );
        // No parenthesis: the whole message is the reason.
        assert_eq!(
            strip_provider_suffix("user rejected the request"),
            "user rejected the request"
        );
        assert_eq!(strip_provider_suffix(""), "");
    }

    #[tokio::test]
    async fn approve_then_mint_flow() {
        let wallet = Arc::new(RecordingWallet::new());
        let sequencer = PaymentSequencer::new(
            wallet.clone(),
            StaticTokens(Some(usdc_metadata())),
            EscrowConfig::known(),
        );
        let request = request();

        let state = sequencer.submit(&request, SubmissionState::Idle).await;
        assert_eq!(state, SubmissionState::ApprovalGranted);

        let state = sequencer.submit(&request, state).await;
        assert_eq!(state, SubmissionState::Completed);

        let writes = wallet.writes();
        assert_eq!(writes.len(), 2);

        // Phase one approves the testnet factory for the base-unit amount.
        assert_eq!(writes[0].function, "approve");
        assert_eq!(writes[0].to, request.token_address);
        let approve = approveCall::abi_decode(&writes[0].input).unwrap();
        let factory = EscrowConfig::known()
            .get(Network::Testnet)
            .escrow_factory_address;
        assert_eq!(approve.spender, factory.0);
        assert_eq!(approve.value, U256::from(100_000_000u64));

        // Phase two mints with the same amount and the schedule parameters.
        assert_eq!(writes[1].function, "mint");
        assert_eq!(writes[1].to, factory);
        let mint = mintCall::abi_decode(&writes[1].input).unwrap();
        assert_eq!(mint.payment.totalAmount, U256::from(100_000_000u64));
        assert_eq!(mint.payment.periods, U256::from(12u64));
        assert_eq!(mint.payment.periodDuration, U256::from(2_592_000u64));
        assert_eq!(mint.payment.yieldStrategyId, U256::from(1u64));
        assert_eq!(mint.payment.escrowAddress, Address::ZERO);
        assert_eq!(mint.payment.sender, wallet.account().0);
        assert_eq!(mint.payment.receiver, request.receiver.0);
        assert!(mint.payment.startTime >= U256::from(EXECUTION_GRACE_SECS));
        assert_eq!(
            resolve_period_name(request.period_duration_seconds),
            "months"
        );
    }

    #[tokio::test]
    async fn approval_failure_truncates_reason() {
        let sequencer = PaymentSequencer::new(
            FailingWallet(
                "execution reverted: insufficient balance (action=\"estimateGas\", code=CALL_EXCEPTION)",
            ),
            StaticTokens(Some(usdc_metadata())),
            EscrowConfig::known(),
        );

        let state = sequencer.submit(&request(), SubmissionState::Idle).await;
        assert_eq!(
            state,
            SubmissionState::Failed {
                reason: "execution reverted: insufficient balance".to_string()
            }
        );
        // A failed request may be resubmitted; it fails the same way.
        let state = sequencer.submit(&request(), state).await;
        assert!(matches!(state, SubmissionState::Failed { .. }));
    }

    #[tokio::test]
    async fn missing_token_metadata_is_terminal() {
        let sequencer = PaymentSequencer::new(
            Arc::new(RecordingWallet::new()),
            StaticTokens(None),
            EscrowConfig::known(),
        );

        let state = sequencer.submit(&request(), SubmissionState::Idle).await;
        match state {
            SubmissionState::Failed { reason } => {
                assert!(reason.starts_with("No metadata for token"), "{reason}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_locally() {
        let wallet = Arc::new(RecordingWallet::new());
        let sequencer = PaymentSequencer::new(
            wallet.clone(),
            StaticTokens(Some(usdc_metadata())),
            EscrowConfig::known(),
        );
        let mut request = request();
        request.period_count = 0;

        let state = sequencer.submit(&request, SubmissionState::Idle).await;
        assert_eq!(
            state,
            SubmissionState::Failed {
                reason: "Invalid request: period count must be positive".to_string()
            }
        );
        assert!(wallet.writes().is_empty());
    }

    #[tokio::test]
    async fn in_flight_states_are_ignored() {
        let wallet = Arc::new(RecordingWallet::new());
        let sequencer = PaymentSequencer::new(
            wallet.clone(),
            StaticTokens(Some(usdc_metadata())),
            EscrowConfig::known(),
        );

        let state = sequencer
            .submit(&request(), SubmissionState::AwaitingApproval)
            .await;
        assert_eq!(state, SubmissionState::AwaitingApproval);
        let state = sequencer
            .submit(&request(), SubmissionState::AwaitingExecution)
            .await;
        assert_eq!(state, SubmissionState::AwaitingExecution);
        let state = sequencer
            .submit(&request(), SubmissionState::Completed)
            .await;
        assert_eq!(state, SubmissionState::Completed);
        assert!(wallet.writes().is_empty());
    }

    #[tokio::test]
    async fn concurrent_submit_invokes_collaborator_once() {
        let wallet = Arc::new(GatedWallet::new());
        let sequencer = Arc::new(PaymentSequencer::new(
            wallet.clone(),
            StaticTokens(Some(usdc_metadata())),
            EscrowConfig::known(),
        ));

        let first = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.submit(&request(), SubmissionState::Idle).await }
        });

        // Wait until the first submission is suspended inside the wallet.
        wallet.entered.notified().await;

        let second = sequencer.submit(&request(), SubmissionState::Idle).await;
        assert_eq!(second, SubmissionState::Idle);

        wallet.release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first, SubmissionState::ApprovalGranted);
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 1);
    }
}

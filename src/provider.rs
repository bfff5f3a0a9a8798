//! Collaborator seams for the payment flow.
//!
//! The sequencer never talks to a wallet or a node directly. It prepares
//! ABI-encoded calls and hands them to a [`WalletProvider`], and resolves
//! token decimals through a [`TokenDirectory`]. Connection handling, signing,
//! broadcast, timeouts, and retries all belong to the implementors.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::network::Network;
use crate::types::{ContractWrite, EvmAddress, TokenMetadata, TransactionHash};

/// A connected wallet able to sign and broadcast contract calls.
///
/// Both flow phases use [`WalletProvider::write_contract`] identically:
/// the approval and the escrow mint are just two different payloads.
pub trait WalletProvider {
    /// The error type returned by this wallet.
    type Error: Debug + Display;

    /// The currently connected account.
    fn account(&self) -> EvmAddress;

    /// The network the wallet is currently connected to.
    fn network(&self) -> Network;

    /// Sign and broadcast one contract call, resolving once the wallet
    /// considers it confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when the user declines or the provider fails;
    /// its display form is what ends up, truncated, in a `Failed` state.
    fn write_contract(
        &self,
        call: ContractWrite,
    ) -> impl Future<Output = Result<TransactionHash, Self::Error>> + Send;
}

impl<T: WalletProvider> WalletProvider for Arc<T> {
    type Error = T::Error;

    fn account(&self) -> EvmAddress {
        self.as_ref().account()
    }

    fn network(&self) -> Network {
        self.as_ref().network()
    }

    fn write_contract(
        &self,
        call: ContractWrite,
    ) -> impl Future<Output = Result<TransactionHash, Self::Error>> + Send {
        self.as_ref().write_contract(call)
    }
}

/// Token metadata lookup.
///
/// Returns `None` for tokens the directory does not recognize; the sequencer
/// turns that into a terminal `MissingTokenMetadata` failure rather than
/// guessing a precision.
pub trait TokenDirectory {
    fn token_metadata(
        &self,
        token: EvmAddress,
    ) -> impl Future<Output = Option<TokenMetadata>> + Send;
}

impl<T: TokenDirectory> TokenDirectory for Arc<T> {
    fn token_metadata(
        &self,
        token: EvmAddress,
    ) -> impl Future<Output = Option<TokenMetadata>> + Send {
        self.as_ref().token_metadata(token)
    }
}

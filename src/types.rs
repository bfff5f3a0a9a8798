//! Type definitions for the Capaz payment flow.
//!
//! The key objects are [`PaymentRequest`], the user's intent to schedule an
//! escrowed payment, and [`ContractWrite`], a prepared on-chain invocation
//! handed to the wallet collaborator. Amounts exist in two representations:
//! [`DisplayAmount`] (decimal, as entered in the UI) and [`TokenAmount`]
//! (integer base units, as the contracts expect), with exact fixed-point
//! conversion between them.

use alloy_primitives::{Bytes, U256, hex};
use alloy_sol_types::sol;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::ops::Mul;
use std::str::FromStr;

/// Represents an EVM address.
///
/// Wrapper around `alloy_primitives::Address`, providing display/serialization support.
/// Used throughout the flow for typed Ethereum address handling.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct EvmAddress(pub alloy_primitives::Address);

impl Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to decode EVM address")]
pub struct EvmAddressDecodingError;

impl FromStr for EvmAddress {
    type Err = EvmAddressDecodingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address =
            alloy_primitives::Address::from_str(s).map_err(|_| EvmAddressDecodingError)?;
        Ok(Self(address))
    }
}

impl TryFrom<&str> for EvmAddress {
    type Error = EvmAddressDecodingError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl From<EvmAddress> for alloy_primitives::Address {
    fn from(address: EvmAddress) -> Self {
        address.0
    }
}

impl From<alloy_primitives::Address> for EvmAddress {
    fn from(address: alloy_primitives::Address) -> Self {
        EvmAddress(address)
    }
}

/// A precise on-chain token amount in base units (e.g., USDC with 6 decimals).
pub type TokenAmount = U256;

/// A 32-byte EVM transaction hash, encoded as 0x-prefixed hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHash(pub [u8; 32]);

impl<'de> Deserialize<'de> for TransactionHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        static TX_HASH_REGEX: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("invalid regex"));

        if !TX_HASH_REGEX.is_match(&s) {
            return Err(serde::de::Error::custom("Invalid transaction hash format"));
        }

        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|_| serde::de::Error::custom("Invalid hex in transaction hash"))?;

        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Transaction hash must be exactly 32 bytes"))?;

        Ok(TransactionHash(array))
    }
}

impl Serialize for TransactionHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hex_string = format!("0x{}", hex::encode(self.0));
        serializer.serialize_str(&hex_string)
    }
}

impl Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Token metadata returned by the token-metadata collaborator.
///
/// `decimals` drives the display-to-base-unit conversion; `symbol` is
/// display-only. A token the collaborator does not recognize yields no
/// metadata at all, which the sequencer treats as a terminal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
}

/// Represents a payment quantity in the token's human-readable display units.
/// Accepts strings like "$0.01", "1,000", "€20", or raw numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayAmount(pub Decimal);

impl DisplayAmount {
    /// Returns the number of digits after the decimal point in the original input.
    ///
    /// This is useful for checking precision constraints when converting
    /// human-readable amounts (e.g., `0.01`) to on-chain token values.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Returns the absolute mantissa of the decimal value as an unsigned integer.
    ///
    /// For example, the mantissa of `12.34` is `1234`.
    /// Used when scaling values to match token decimal places.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts the [`DisplayAmount`] into a raw on-chain [`TokenAmount`] by scaling
    /// the mantissa to match a given token's decimal precision.
    ///
    /// For example, `0.01` becomes `10000` when targeting a token with 6 decimals.
    ///
    /// Returns an error if the precision of the entered amount exceeds the token's
    /// declared precision, to prevent unintentional truncation or rounding.
    pub fn as_token_amount(
        &self,
        token_decimals: u32,
    ) -> Result<TokenAmount, DisplayAmountError> {
        let entered_decimals = self.scale();
        if entered_decimals > token_decimals {
            return Err(DisplayAmountError::WrongPrecision {
                entered: entered_decimals,
                token: token_decimals,
            });
        }
        let scale_diff = token_decimals - entered_decimals;
        let multiplier = U256::from(10).pow(U256::from(scale_diff));
        let digits = self.mantissa();
        let value = U256::from(digits).mul(multiplier);
        Ok(value)
    }

    /// Converts a raw on-chain [`TokenAmount`] back into display units.
    ///
    /// Inverse of [`DisplayAmount::as_token_amount`]: for any amount produced by
    /// that conversion, this recovers the original display value exactly.
    pub fn from_token_amount(
        amount: TokenAmount,
        token_decimals: u32,
    ) -> Result<Self, DisplayAmountError> {
        let digits: u128 =
            u128::try_from(amount).map_err(|_| DisplayAmountError::TooLarge)?;
        let digits: i128 =
            i128::try_from(digits).map_err(|_| DisplayAmountError::TooLarge)?;
        let decimal = Decimal::try_from_i128_with_scale(digits, token_decimals)
            .map_err(|_| DisplayAmountError::TooLarge)?;
        Ok(DisplayAmount(decimal.normalize()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayAmountError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        display_amount::MIN_STR,
        display_amount::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    #[error("Amount is too large to represent in display units")]
    TooLarge,
    #[error("Amount has {entered} decimal places but the token only supports {token}")]
    WrongPrecision { entered: u32, token: u32 },
}

mod display_amount {
    use super::*;

    pub const MIN_STR: &str = "0.000000000000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: Lazy<Decimal> =
        Lazy::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: Lazy<Decimal> =
        Lazy::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));

    pub static CLEANUP: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^\d\.\-]+").expect("valid cleanup regex"));
}

impl DisplayAmount {
    pub fn parse(input: &str) -> Result<Self, DisplayAmountError> {
        // Remove anything that isn't digit, dot, minus
        let cleaned = display_amount::CLEANUP.replace_all(input, "").to_string();

        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| DisplayAmountError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(DisplayAmountError::Negative);
        }

        if parsed < *display_amount::MIN || parsed > *display_amount::MAX {
            return Err(DisplayAmountError::OutOfRange);
        }

        Ok(DisplayAmount(parsed))
    }
}

impl FromStr for DisplayAmount {
    type Err = DisplayAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplayAmount::parse(s)
    }
}

impl TryFrom<&str> for DisplayAmount {
    type Error = DisplayAmountError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        DisplayAmount::from_str(value)
    }
}

impl TryFrom<f64> for DisplayAmount {
    type Error = DisplayAmountError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::from_f64(value).ok_or(DisplayAmountError::OutOfRange)?;
        if decimal.is_sign_negative() {
            return Err(DisplayAmountError::Negative);
        }
        if decimal < *display_amount::MIN || decimal > *display_amount::MAX {
            return Err(DisplayAmountError::OutOfRange);
        }
        Ok(DisplayAmount(decimal))
    }
}

impl Display for DisplayAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for DisplayAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DisplayAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DisplayAmount::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// The user's intent to schedule a recurring escrowed payment.
///
/// Created from form input at submission time and treated as immutable once
/// handed to the sequencer. The escrow start time is not part of the request:
/// the sequencer stamps it when the mint call is dispatched, so the grace
/// window stays relative to broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Recipient of the scheduled payments.
    pub receiver: EvmAddress,
    /// ERC-20 token the payments are denominated in.
    pub token_address: EvmAddress,
    /// Total amount across all periods, in display units.
    pub amount: DisplayAmount,
    /// Number of release periods.
    pub period_count: u64,
    /// Length of one release period, in seconds.
    pub period_duration_seconds: u64,
    /// Yield strategy escrowed funds are deposited into while locked.
    pub yield_strategy_id: u64,
}

sol! {
    /// Scheduled escrow payment as the factory's `mint` entry point expects it.
    ///
    /// `escrowAddress` is a placeholder on the way in; the factory assigns the
    /// real escrow contract address during minting.
    #[derive(Debug, PartialEq, Eq)]
    struct EscrowPayment {
        address sender;
        address receiver;
        address tokenAddress;
        uint256 totalAmount;
        uint256 startTime;
        uint256 periodDuration;
        uint256 periods;
        uint256 yieldStrategyId;
        address escrowAddress;
    }

    /// ERC-20 spending authorization granted to the escrow factory.
    function approve(address spender, uint256 value) external returns (bool);

    /// Escrow creation entry point on the factory contract.
    function mint(EscrowPayment payment) external returns (uint256 tokenId);
}

/// One prepared contract invocation: target address plus ABI-encoded calldata.
///
/// Both phases of the flow go through this shape, so the wallet collaborator
/// signs and broadcasts approvals and mints identically.
#[derive(Debug, Clone)]
pub struct ContractWrite {
    /// Contract to call.
    pub to: EvmAddress,
    /// Function name, for logging only; the selector lives in `input`.
    pub function: &'static str,
    /// ABI-encoded calldata, selector included.
    pub input: Bytes,
}

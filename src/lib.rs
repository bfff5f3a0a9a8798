//! Client-side payment flow for the Capaz escrowed-payment protocol.
//!
//! Capaz lets a payer stream a token amount to a receiver over a schedule:
//! funds are locked in an escrow contract, optionally deposited into a yield
//! strategy, and released period by period. Creating such a payment from a
//! wallet takes two on-chain transactions: an ERC-20 `approve` granting the
//! escrow factory spending rights, then the factory's `mint` that creates
//! the escrow. This crate sequences that flow and resolves its parameters;
//! wallet connection, signing, and broadcast stay behind collaborator traits.
//!
//! # Modules
//!
//! - [`network`] — Supported networks, known escrow factory deployments, and startup configuration.
//! - [`provider`] — Collaborator traits for the wallet and token metadata lookup.
//! - [`schedule`] — Period-unit and yield-strategy tables with display-name resolution.
//! - [`sequencer`] — The two-phase submission state machine.
//! - [`timestamp`] — Unix timestamp type for escrow start times.
//! - [`types`] — Addresses, amounts, requests, and ABI-encoded contract writes.

pub mod network;
pub mod provider;
pub mod schedule;
pub mod sequencer;
pub mod timestamp;
pub mod types;

// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Zora indexer integration for first-minted artwork lookups
//!
//! This crate implements the resilient half of the "what did this wallet first
//! mint?" pipeline: it asks the Zora universal GraphQL API for the first
//! collected item of a wallet and hands back a single downloadable media URI,
//! or `None` when the wallet never collected anything.
//!
//! # Architecture
//!
//! - **Client**: [`zora::ZoraClient`] - issues the GraphQL call and drives a
//!   bounded retry loop with error-specific backoff
//! - **Request Budget**: [`budget::RequestBudget`] - sliding-window local rate
//!   limiter gating every outbound attempt, shareable across clients
//! - **Validation**: [`address::WalletAddress`] - rejects empty addresses
//!   before any budget or network work happens
//!
//! # Failure Handling
//!
//! Upstream failures are classified before retrying: 429 responses honor the
//! server's wait hints, 403 is treated as soft rate limiting with a heavier
//! backoff, 5xx/timeouts/connection failures back off exponentially, and
//! everything else terminates the loop immediately. Callers only ever observe
//! the final outcome.

pub mod address;
pub mod budget;
pub mod zora;

mod query;

pub use address::WalletAddress;
pub use budget::RequestBudget;
pub use zora::{ZoraClient, ZoraConfig, ZoraError};

// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Wallet address validation
//!
//! The indexer accepts both hex addresses and ENS-style names, so no format
//! beyond "non-empty" is enforced here. [`WalletAddress`] makes the empty and
//! whitespace-only cases unrepresentable by construction, which is the only
//! input validation the fetch path needs before spending budget or network
//! work on a request.

use core::fmt;
use std::str::FromStr;

/// A validated, non-empty wallet address or identifier
///
/// Immutable after construction; uses `Box<str>` internally.
///
/// # Examples
///
/// ```rust
/// use zora_api::WalletAddress;
///
/// let address = WalletAddress::new("vitalik.eth").unwrap();
/// assert_eq!(address.as_str(), "vitalik.eth");
///
/// assert!(WalletAddress::new("").is_err());
/// assert!(WalletAddress::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAddress(Box<str>);

impl WalletAddress {
    /// Create a new `WalletAddress` from any string-like input
    ///
    /// # Errors
    ///
    /// Returns a descriptive message when the input is empty or contains only
    /// whitespace.
    pub fn new(address: impl Into<String>) -> Result<Self, String> {
        let address = address.into();
        if address.trim().is_empty() {
            Err("wallet address cannot be empty".to_string())
        } else {
            Ok(WalletAddress(address.into_boxed_str()))
        }
    }

    /// Get a string slice of the contained address
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Common data types for artwork fetch results

use serde::{Deserialize, Serialize};

/// The first item a wallet minted or collected, reduced to what the
/// compositing layer needs: a fetchable media location plus the wallet it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedArtwork {
    /// Preview media URI returned by the indexer (often `ipfs://...`)
    pub downloadable_uri: String,
    /// The wallet address the lookup was performed for
    pub address: String,
}

impl MintedArtwork {
    /// Create a new artwork record
    pub fn new(downloadable_uri: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            downloadable_uri: downloadable_uri.into(),
            address: address.into(),
        }
    }
}

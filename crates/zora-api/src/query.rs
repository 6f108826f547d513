// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! GraphQL request payload and response envelope for the first-collected query
//!
//! The query text is a static constant; the wallet address is the sole bound
//! variable. The response envelope is deliberately all-optional: any missing
//! link in the `data -> profile -> collectedCollectionsOrTokens -> edges ->
//! node -> media -> previewImage -> previewImage -> downloadableUri` chain
//! means "no data", never a structural error.

use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;

/// Query for the collected-tokens connection of a profile. The shape is
/// requested without a page size argument; only the first edge is consumed.
pub(crate) const FIRST_COLLECTED_QUERY: &str = r"
query FirstCollected($address: String!) {
  profile(identifier: $address) {
    collectedCollectionsOrTokens {
      edges {
        node {
          media {
            previewImage {
              previewImage {
                downloadableUri
              }
            }
          }
        }
      }
    }
  }
}
";

/// Outbound GraphQL request body: `{query, variables: {address}}`
#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
struct Variables<'a> {
    address: &'a str,
}

impl<'a> GraphQlRequest<'a> {
    /// Build the first-collected request for a validated wallet address
    pub(crate) fn first_collected(address: &'a WalletAddress) -> Self {
        Self {
            query: FIRST_COLLECTED_QUERY,
            variables: Variables {
                address: address.as_str(),
            },
        }
    }
}

/// Top-level GraphQL response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlEnvelope {
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(rename = "collectedCollectionsOrTokens")]
    collected_collections_or_tokens: Option<Connection>,
}

#[derive(Debug, Deserialize)]
struct Connection {
    edges: Option<Vec<Edge>>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Option<Node>,
}

#[derive(Debug, Deserialize)]
struct Node {
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(rename = "previewImage")]
    preview_image: Option<PreviewImagePair>,
}

// The indexer nests previewImage twice: an outer media wrapper and the inner
// image record that actually carries the URI.
#[derive(Debug, Deserialize)]
struct PreviewImagePair {
    #[serde(rename = "previewImage")]
    preview_image: Option<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    #[serde(rename = "downloadableUri")]
    downloadable_uri: Option<String>,
}

impl GraphQlEnvelope {
    /// Extract the downloadable URI of the FIRST collected edge, if any
    ///
    /// Later edges are never consulted; a first edge without media means the
    /// wallet's first mint has no preview artwork, which is `None` as well.
    pub(crate) fn first_downloadable_uri(self) -> Option<String> {
        self.data?
            .profile?
            .collected_collections_or_tokens?
            .edges?
            .into_iter()
            .next()?
            .node?
            .media?
            .preview_image?
            .preview_image?
            .downloadable_uri
    }
}

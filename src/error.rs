// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::types::Href;

/// DAV client errors.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DavError {
    /// HTTP layer error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// XML parsing/writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// The response body did not have the expected shape.
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// A collection query failed at the HTTP layer with no multistatus body.
    #[error("Collection query failed: {status} {status_text}")]
    QueryFailed {
        /// HTTP status code.
        status: u16,
        /// HTTP reason phrase.
        status_text: String,
    },

    /// A time-range bound was not valid ISO-8601.
    #[error("Invalid time range bound: {0}")]
    InvalidTimeRange(String),

    /// A required account field was absent before a network call.
    #[error("Missing required account field: {0}")]
    MissingAccountField(&'static str),

    /// The collection was not present in the server's response.
    #[error("Collection does not exist on server: {0}")]
    CollectionNotFound(Href),

    /// Precondition failed (etag mismatch on a conditional request).
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for DavError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<quick_xml::Error> for DavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<std::io::Error> for DavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}

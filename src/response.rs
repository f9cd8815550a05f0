// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Multistatus response normalization.
//!
//! One [`DavResponse`] is produced per `<response>` element of a decoded
//! multistatus document, with the per-resource status extracted from the
//! DAV status line and all propstat blocks flattened into one property map.

use serde_json::{Map, Value};

use crate::error::DavError;
use crate::types::Href;
use crate::xml::{ensure_array, value_to_string};

/// Transport-level fields of the outer HTTP response, used as the fallback
/// when a response element carries no status of its own.
#[derive(Debug, Clone)]
pub(crate) struct TransportStatus {
    pub href: String,
    pub status: u16,
    pub status_text: String,
    pub ok: bool,
}

/// Undecoded response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
    /// The full decoded multistatus document; present on every element
    /// produced from a parsed body.
    Document(Value),
    /// The literal body text of a response that was not decoded (transport
    /// failure, non-XML content type, or parsing disabled).
    Text(String),
}

/// One normalized `<response>` element of a multistatus body.
///
/// Built once by the protocol layer and passed up the call chain as
/// immutable data.
#[derive(Debug, Clone)]
pub struct DavResponse {
    /// Resource URL, possibly relative.
    pub href: Href,
    /// Numeric status from the DAV status line, or the outer HTTP status.
    pub status: u16,
    /// Reason phrase matching `status`.
    pub status_text: String,
    /// True iff no `<error>` element is present. A 404 inside a multistatus
    /// without an error block is still "ok" at this level; callers interpret
    /// 404 semantically where needed.
    pub ok: bool,
    /// Structured error, when the server sent an `<error>` element.
    pub error: Option<Value>,
    /// Properties merged across all propstat blocks in document order,
    /// later blocks overwriting earlier keys.
    pub props: Option<Map<String, Value>>,
    /// The undecoded payload, absent when the body was empty.
    pub raw: Option<RawBody>,
}

impl DavResponse {
    /// Whether this element carries a decoded multistatus document.
    #[must_use]
    pub fn has_document(&self) -> bool {
        matches!(self.raw, Some(RawBody::Document(_)))
    }

    /// An element carrying only transport-level fields plus the body text.
    pub(crate) fn from_transport(outer: &TransportStatus, body: String) -> Self {
        Self {
            href: Href::from(outer.href.clone()),
            status: outer.status,
            status_text: outer.status_text.clone(),
            ok: outer.ok,
            error: None,
            props: None,
            raw: Some(RawBody::Text(body)),
        }
    }

    /// An element synthesized from the outer response, with no payload.
    pub(crate) fn synthesized(outer: &TransportStatus) -> Self {
        Self {
            href: Href::from(outer.href.clone()),
            status: outer.status,
            status_text: outer.status_text.clone(),
            ok: outer.ok,
            error: None,
            props: None,
            raw: None,
        }
    }
}

/// Normalizes a decoded multistatus document into response records.
///
/// The `response` node may be a single object or an array; both normalize
/// to an ordered list. Elements with no body at all fall back to the outer
/// response's status fields.
pub(crate) fn parse_multistatus(
    doc: &Value,
    outer: &TransportStatus,
) -> Result<Vec<DavResponse>, DavError> {
    let multistatus = doc
        .get("multistatus")
        .ok_or_else(|| DavError::InvalidResponse("missing multistatus root".to_string()))?;

    let Some(response_node) = multistatus.get("response") else {
        return Ok(Vec::new());
    };

    let mut responses = Vec::new();
    for item in ensure_array(response_node) {
        let Some(element) = item.as_object() else {
            responses.push(DavResponse::synthesized(outer));
            continue;
        };
        if element.is_empty() {
            responses.push(DavResponse::synthesized(outer));
            continue;
        }

        let href = element.get("href").map(value_to_string).unwrap_or_default();
        let (status, status_text) = element
            .get("status")
            .map(value_to_string)
            .as_deref()
            .and_then(parse_status_line)
            .unwrap_or_else(|| (outer.status, outer.status_text.clone()));
        let error = element.get("error").cloned();
        let props = element.get("propstat").map(flatten_propstats);

        responses.push(DavResponse {
            href: Href::from(href),
            status,
            status_text,
            ok: error.is_none(),
            error,
            props,
            raw: Some(RawBody::Document(doc.clone())),
        });
    }
    Ok(responses)
}

/// Matches a DAV status line of the form `<protocol> <3-digit-code> <reason>`.
fn parse_status_line(line: &str) -> Option<(u16, String)> {
    let mut parts = line.trim().splitn(3, ' ');
    let protocol = parts.next()?;
    if protocol.is_empty() {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let reason = parts.next().filter(|r| !r.is_empty())?;
    Some((code.parse().ok()?, reason.to_string()))
}

/// Flattens every propstat/prop block in document order, later keys
/// overwriting earlier ones.
fn flatten_propstats(propstat_node: &Value) -> Map<String, Value> {
    let mut merged = Map::new();
    for propstat in ensure_array(propstat_node) {
        if let Some(prop) = propstat.get("prop").and_then(Value::as_object) {
            for (key, value) in prop {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

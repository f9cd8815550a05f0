// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Client library for `WebDAV`, `CalDAV` (RFC 4791) and `CardDAV` (RFC 6352)
//! servers: XML codec, protocol requests, collection queries, and cached
//! collection reconciliation via ctags or sync tokens (RFC 6578).

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::option_option,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool
)]

mod client;
mod config;
mod error;
mod http;
mod request;
mod response;
mod sync;
mod types;
mod xml;

pub use crate::client::{DavClient, DavRequest, RequestBody, SyncCollectionReply};
pub use crate::config::{AuthMethod, DavConfig};
pub use crate::error::DavError;
pub use crate::request::{
    AddressbookMultigetRequest, AddressbookQueryRequest, CalendarMultigetRequest,
    CalendarQueryRequest, Filter, FreeBusyQueryRequest, MkcalendarRequest, MkcolRequest,
    PropfindRequest, SyncCollectionRequest, TimeRange,
};
pub use crate::response::{DavResponse, RawBody};
pub use crate::sync::{SyncChanges, SyncMethod, SyncOutcome, url_equals};
pub use crate::types::{Account, AccountType, DavCollection, DavObject, Depth, ETag, Href};
pub use crate::xml::{
    Content, Element, ElementName, Ns, decode, encode, ensure_array, value_to_string,
};

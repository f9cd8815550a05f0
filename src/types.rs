// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::error::DavError;

/// Resource href (path or absolute URL).
///
/// An `Href` identifies a resource on a DAV server, either relative
/// (`/calendars/user/event1.ics`) or absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Href(String);

impl Href {
    /// Creates a new `Href` from a string.
    #[must_use]
    pub const fn new(href: String) -> Self {
        Self(href)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Href {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Href {
    fn from(href: String) -> Self {
        Self(href)
    }
}

impl From<&str> for Href {
    fn from(href: &str) -> Self {
        Self(href.to_string())
    }
}

/// Entity tag for change detection.
///
/// An `ETag` is an opaque per-object change token. It is never parsed, only
/// compared for exact string equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag(String);

impl ETag {
    /// Creates a new `ETag` from a string.
    #[must_use]
    pub const fn new(etag: String) -> Self {
        Self(etag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ETag {
    fn from(etag: String) -> Self {
        Self(etag)
    }
}

impl From<&str> for ETag {
    fn from(etag: &str) -> Self {
        Self(etag.to_string())
    }
}

/// The protocol flavor of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Calendar collections (RFC 4791), objects are `.ics` resources.
    CalDav,
    /// Address book collections (RFC 6352), objects are `.vcf` resources.
    CardDav,
}

impl AccountType {
    /// File extension of member objects in collections of this type.
    #[must_use]
    pub const fn object_extension(self) -> &'static str {
        match self {
            Self::CalDav => ".ics",
            Self::CardDav => ".vcf",
        }
    }
}

/// A bootstrapped account.
///
/// Service discovery and principal resolution happen outside this crate;
/// the resolved URLs are handed in here. Operations that need a URL that
/// was not resolved fail fast with [`DavError::MissingAccountField`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Account {
    /// Protocol flavor of the account.
    pub account_type: AccountType,
    /// Root/principal URL, if resolved.
    #[serde(default)]
    pub root_url: Option<String>,
    /// Home set URL (calendar-home-set / addressbook-home-set), if resolved.
    #[serde(default)]
    pub home_url: Option<String>,
}

impl Account {
    /// Creates an account with no resolved URLs.
    #[must_use]
    pub const fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            root_url: None,
            home_url: None,
        }
    }

    /// Returns the home URL or fails naming the missing field.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::MissingAccountField`] if the home URL is absent.
    pub fn require_home_url(&self) -> Result<&str, DavError> {
        self.home_url
            .as_deref()
            .ok_or(DavError::MissingAccountField("home_url"))
    }

    /// Returns the root URL or fails naming the missing field.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::MissingAccountField`] if the root URL is absent.
    pub fn require_root_url(&self) -> Result<&str, DavError> {
        self.root_url
            .as_deref()
            .ok_or(DavError::MissingAccountField("root_url"))
    }
}

/// Depth header value for PROPFIND and REPORT requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The resource itself.
    Zero,
    /// The resource and its immediate members.
    One,
    /// The whole subtree.
    Infinity,
}

impl Depth {
    /// The wire form of the header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Infinity => "infinity",
        }
    }
}

/// A member object of a collection (calendar object or vCard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavObject {
    /// Absolute URL of the object.
    pub url: Href,
    /// Opaque change token, compared by exact string equality.
    pub etag: Option<ETag>,
    /// Raw iCalendar/vCard text body.
    pub data: Option<String>,
}

impl DavObject {
    /// Creates an object with no etag or body.
    #[must_use]
    pub const fn new(url: Href) -> Self {
        Self {
            url,
            etag: None,
            data: None,
        }
    }
}

/// A calendar or address book collection.
///
/// Collections are constructed fresh on every fetch or reconciliation call;
/// the caller owns persistence of the snapshot that is fed back in as the
/// cached side of a sync.
#[derive(Debug, Clone, Default)]
pub struct DavCollection {
    /// URL of the collection.
    pub url: Href,
    /// Display name, if the server advertised one.
    pub display_name: Option<String>,
    /// Opaque collection change token (CalendarServer extension).
    pub ctag: Option<String>,
    /// Opaque WebDAV sync token for incremental sync-collection REPORTs.
    pub sync_token: Option<String>,
    /// Supported REPORT names in decoded form, e.g. `syncCollection`.
    pub reports: Vec<String>,
    /// Member objects, each with a URL distinct under URL equivalence.
    pub objects: Vec<DavObject>,
}

impl DavCollection {
    /// Creates an empty collection at the given URL.
    #[must_use]
    pub fn new(url: Href) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }
}

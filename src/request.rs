// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request body builders for DAV operations.
//!
//! Every builder produces an [`Element`] tree with an unprefixed root; the
//! query layer supplies the default namespace when encoding, so the same
//! builder output serializes as `d:propfind`, `c:calendar-query` or
//! `card:addressbook-query` depending on the call site.

use jiff::civil;

use crate::error::DavError;
use crate::types::Href;
use crate::xml::{Element, ElementName, Ns};

/// A validated, protocol-form time range.
///
/// Bounds are accepted in ISO-8601 (full timestamp, offset-less datetime,
/// or date-only) and rewritten into the compact `YYYYMMDDTHHMMSSZ` form the
/// time-range filter syntax requires, truncated to whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    start: String,
    end: String,
}

impl TimeRange {
    /// Validates both bounds and compiles them to protocol form.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::InvalidTimeRange`] if either bound is not
    /// ISO-8601. No network call is made with an invalid range.
    pub fn new(start: &str, end: &str) -> Result<Self, DavError> {
        Ok(Self {
            start: to_utc_basic(start)?,
            end: to_utc_basic(end)?,
        })
    }

    /// The compiled start bound, e.g. `20210501T000000Z`.
    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// The compiled end bound.
    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    fn to_element(&self, ns: Ns) -> Element {
        Element::new(ElementName::new(ns, "time-range"))
            .attribute("start", &self.start)
            .attribute("end", &self.end)
    }
}

/// Rewrites an ISO-8601 bound into compact UTC form.
///
/// Offset-less datetimes and bare dates are interpreted as UTC.
fn to_utc_basic(bound: &str) -> Result<String, DavError> {
    let bound = bound.trim();
    let dt: civil::DateTime = if let Ok(ts) = bound.parse::<jiff::Timestamp>() {
        ts.to_zoned(jiff::tz::TimeZone::UTC).datetime()
    } else if let Ok(dt) = bound.parse::<civil::DateTime>() {
        dt
    } else if let Ok(date) = bound.parse::<civil::Date>() {
        date.at(0, 0, 0, 0)
    } else {
        return Err(DavError::InvalidTimeRange(bound.to_string()));
    };
    Ok(format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    ))
}

/// A recursive filter node for REPORT queries.
///
/// Covers `comp-filter`, `prop-filter`, `param-filter`, `text-match` and
/// `time-range` uniformly: a name, string attributes, optional children and
/// optional text value, lowered to elements at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Filter element name, e.g. `comp-filter`.
    pub name: String,
    /// String attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Nested filters.
    pub children: Vec<Filter>,
    /// Text content, used by `text-match`.
    pub value: Option<String>,
}

impl Filter {
    /// Creates a filter node with the given element name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            value: None,
        }
    }

    /// A `comp-filter` for the named component (VCALENDAR, VEVENT, ...).
    #[must_use]
    pub fn comp(component: &str) -> Self {
        Self::new("comp-filter").attribute("name", component)
    }

    /// A `prop-filter` for the named property (FN, UID, ...).
    #[must_use]
    pub fn prop(property: &str) -> Self {
        Self::new("prop-filter").attribute("name", property)
    }

    /// A `time-range` filter from a validated range.
    #[must_use]
    pub fn time_range(range: &TimeRange) -> Self {
        Self::new("time-range")
            .attribute("start", range.start())
            .attribute("end", range.end())
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Adds a nested filter.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn to_element(&self, ns: Ns) -> Element {
        let mut element = match (&self.value, self.children.is_empty()) {
            (Some(text), _) => Element::text(ElementName::new(ns, self.name.clone()), text),
            (None, false) => Element::with_children(
                ElementName::new(ns, self.name.clone()),
                self.children.iter().map(|c| c.to_element(ns)).collect(),
            ),
            (None, true) => Element::new(ElementName::new(ns, self.name.clone())),
        };
        for (key, value) in &self.attributes {
            element = element.attribute(key, value);
        }
        element
    }
}

fn prop_block(props: &[ElementName]) -> Element {
    Element::with_children(
        ElementName::dav("prop"),
        props.iter().map(|p| Element::new(p.clone())).collect(),
    )
}

fn href_leaf(href: &Href) -> Element {
    Element::text(ElementName::dav("href"), href.as_str())
}

/// PROPFIND request builder.
#[derive(Debug, Default)]
pub struct PropfindRequest {
    props: Vec<ElementName>,
}

impl PropfindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to request.
    pub fn prop(&mut self, name: ElementName) -> &mut Self {
        self.props.push(name);
        self
    }

    /// Builds the body tree. The root serializes under the default
    /// namespace, which the protocol layer fixes to `DAV:`.
    #[must_use]
    pub fn build(&self) -> Element {
        Element::with_children(
            ElementName::unqualified("propfind"),
            vec![prop_block(&self.props)],
        )
    }
}

/// calendar-query REPORT builder.
#[derive(Debug, Default)]
pub struct CalendarQueryRequest {
    props: Vec<ElementName>,
    filters: Vec<Filter>,
    timezone: Option<String>,
}

impl CalendarQueryRequest {
    /// Creates a query requesting etag and calendar data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            props: vec![
                ElementName::dav("getetag"),
                ElementName::caldav("calendar-data"),
            ],
            filters: Vec::new(),
            timezone: None,
        }
    }

    /// Replaces the requested properties.
    #[must_use]
    pub fn props(mut self, props: Vec<ElementName>) -> Self {
        self.props = props;
        self
    }

    /// Adds a filter. Without any, the query matches the whole VCALENDAR.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the timezone for time-range evaluation.
    #[must_use]
    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut children = vec![prop_block(&self.props)];
        let filters = if self.filters.is_empty() {
            vec![Filter::comp("VCALENDAR")]
        } else {
            self.filters.clone()
        };
        children.push(Element::with_children(
            ElementName::caldav("filter"),
            filters.iter().map(|f| f.to_element(Ns::CalDav)).collect(),
        ));
        if let Some(tz) = &self.timezone {
            children.push(Element::text(ElementName::caldav("timezone"), tz));
        }
        Element::with_children(ElementName::unqualified("calendar-query"), children)
    }
}

/// calendar-multiget REPORT builder.
#[derive(Debug, Default)]
pub struct CalendarMultigetRequest {
    props: Vec<ElementName>,
    hrefs: Vec<Href>,
}

impl CalendarMultigetRequest {
    /// Creates a multiget requesting etag and calendar data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            props: vec![
                ElementName::dav("getetag"),
                ElementName::caldav("calendar-data"),
            ],
            hrefs: Vec::new(),
        }
    }

    /// Adds an object href to fetch.
    pub fn href(&mut self, href: Href) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut children = vec![prop_block(&self.props)];
        children.extend(self.hrefs.iter().map(href_leaf));
        Element::with_children(ElementName::unqualified("calendar-multiget"), children)
    }
}

/// addressbook-query REPORT builder.
#[derive(Debug, Default)]
pub struct AddressbookQueryRequest {
    props: Vec<ElementName>,
    filters: Vec<Filter>,
}

impl AddressbookQueryRequest {
    /// Creates a query requesting etag and address data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            props: vec![
                ElementName::dav("getetag"),
                ElementName::carddav("address-data"),
            ],
            filters: Vec::new(),
        }
    }

    /// Adds a filter. Without any, a match-all FN prop-filter is used.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        let filters = if self.filters.is_empty() {
            vec![Filter::prop("FN")]
        } else {
            self.filters.clone()
        };
        Element::with_children(
            ElementName::unqualified("addressbook-query"),
            vec![
                prop_block(&self.props),
                Element::with_children(
                    ElementName::carddav("filter"),
                    filters.iter().map(|f| f.to_element(Ns::CardDav)).collect(),
                ),
            ],
        )
    }
}

/// addressbook-multiget REPORT builder.
#[derive(Debug, Default)]
pub struct AddressbookMultigetRequest {
    props: Vec<ElementName>,
    hrefs: Vec<Href>,
}

impl AddressbookMultigetRequest {
    /// Creates a multiget requesting etag and address data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            props: vec![
                ElementName::dav("getetag"),
                ElementName::carddav("address-data"),
            ],
            hrefs: Vec::new(),
        }
    }

    /// Adds an object href to fetch.
    pub fn href(&mut self, href: Href) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut children = vec![prop_block(&self.props)];
        children.extend(self.hrefs.iter().map(href_leaf));
        Element::with_children(ElementName::unqualified("addressbook-multiget"), children)
    }
}

/// free-busy-query REPORT builder.
#[derive(Debug)]
pub struct FreeBusyQueryRequest {
    range: TimeRange,
}

impl FreeBusyQueryRequest {
    /// Creates a free-busy query over a validated range.
    #[must_use]
    pub const fn new(range: TimeRange) -> Self {
        Self { range }
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        Element::with_children(
            ElementName::unqualified("free-busy-query"),
            vec![self.range.to_element(Ns::CalDav)],
        )
    }
}

/// sync-collection REPORT builder (RFC 6578).
#[derive(Debug, Default)]
pub struct SyncCollectionRequest {
    sync_token: Option<String>,
    props: Vec<ElementName>,
}

impl SyncCollectionRequest {
    /// Creates a request; an absent token asks for a full initial sync.
    #[must_use]
    pub fn new(sync_token: Option<&str>) -> Self {
        Self {
            sync_token: sync_token.map(str::to_string),
            props: vec![ElementName::dav("getetag")],
        }
    }

    /// Builds the body tree with `sync-level` 1.
    #[must_use]
    pub fn build(&self) -> Element {
        let token = match &self.sync_token {
            Some(token) => Element::text(ElementName::dav("sync-token"), token),
            None => Element::new(ElementName::dav("sync-token")),
        };
        Element::with_children(
            ElementName::unqualified("sync-collection"),
            vec![
                token,
                Element::text(ElementName::dav("sync-level"), "1"),
                prop_block(&self.props),
            ],
        )
    }
}

/// MKCALENDAR request builder.
#[derive(Debug, Default)]
pub struct MkcalendarRequest {
    display_name: Option<String>,
    description: Option<String>,
    timezone: Option<String>,
}

impl MkcalendarRequest {
    /// Creates an empty MKCALENDAR request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name of the new calendar.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the calendar description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the calendar timezone (iCalendar VTIMEZONE text).
    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut props = Vec::new();
        if let Some(name) = &self.display_name {
            props.push(Element::text(ElementName::dav("displayname"), name));
        }
        if let Some(description) = &self.description {
            props.push(Element::text(
                ElementName::caldav("calendar-description"),
                description,
            ));
        }
        if let Some(timezone) = &self.timezone {
            props.push(Element::text(
                ElementName::caldav("calendar-timezone"),
                timezone,
            ));
        }
        Element::with_children(
            ElementName::unqualified("mkcalendar"),
            vec![Element::with_children(
                ElementName::dav("set"),
                vec![Element::with_children(ElementName::dav("prop"), props)],
            )],
        )
    }
}

/// Extended MKCOL request builder (used for address book collections).
#[derive(Debug)]
pub struct MkcolRequest {
    display_name: Option<String>,
    resource_types: Vec<ElementName>,
}

impl MkcolRequest {
    /// Creates a request for a plain collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            display_name: None,
            resource_types: vec![ElementName::dav("collection")],
        }
    }

    /// Creates a request for an address book collection.
    #[must_use]
    pub fn addressbook() -> Self {
        Self {
            display_name: None,
            resource_types: vec![
                ElementName::dav("collection"),
                ElementName::carddav("addressbook"),
            ],
        }
    }

    /// Sets the display name of the new collection.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Builds the body tree.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut props = vec![Element::with_children(
            ElementName::dav("resourcetype"),
            self.resource_types
                .iter()
                .map(|name| Element::new(name.clone()))
                .collect(),
        )];
        if let Some(name) = &self.display_name {
            props.push(Element::text(ElementName::dav("displayname"), name));
        }
        Element::with_children(
            ElementName::unqualified("mkcol"),
            vec![Element::with_children(
                ElementName::dav("set"),
                vec![Element::with_children(ElementName::dav("prop"), props)],
            )],
        )
    }
}

impl Default for MkcolRequest {
    fn default() -> Self {
        Self::new()
    }
}

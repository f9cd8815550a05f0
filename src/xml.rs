// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML codec for WebDAV/CalDAV/CardDAV request and response bodies.
//!
//! Requests are modelled as an explicit [`Element`] tree and serialized with
//! `quick-xml`. Responses are decoded into a compact [`serde_json::Value`]
//! tree keyed by prefix-stripped, camel-cased element names, with leaf text
//! coerced to native scalars.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Value};

use crate::error::DavError;

/// XML namespaces used by the protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ns {
    /// `DAV:` (WebDAV).
    Dav,
    /// `urn:ietf:params:xml:ns:caldav`.
    CalDav,
    /// `urn:ietf:params:xml:ns:carddav`.
    CardDav,
    /// `http://calendarserver.org/ns/` (ctag extension).
    CalendarServer,
    /// `http://apple.com/ns/ical/` (Apple calendar extensions).
    AppleCal,
}

impl Ns {
    /// All namespaces in their canonical declaration order.
    pub const ALL: [Self; 5] = [
        Self::Dav,
        Self::CalDav,
        Self::CardDav,
        Self::CalendarServer,
        Self::AppleCal,
    ];

    /// The short prefix used when serializing element names.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Dav => "d",
            Self::CalDav => "c",
            Self::CardDav => "card",
            Self::CalendarServer => "cs",
            Self::AppleCal => "ca",
        }
    }

    /// The namespace URI declared for the prefix.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Dav => "DAV:",
            Self::CalDav => "urn:ietf:params:xml:ns:caldav",
            Self::CardDav => "urn:ietf:params:xml:ns:carddav",
            Self::CalendarServer => "http://calendarserver.org/ns/",
            Self::AppleCal => "http://apple.com/ns/ical/",
        }
    }
}

/// A namespaced element name.
///
/// A name with `ns: None` picks up the encoder's default namespace; a name
/// with an explicit namespace is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementName {
    /// Namespace of the element, if fixed by the builder.
    pub ns: Option<Ns>,
    /// Local part of the name, e.g. `calendar-data`.
    pub local: String,
}

impl ElementName {
    /// Creates a name in an explicit namespace.
    #[must_use]
    pub fn new(ns: Ns, local: impl Into<String>) -> Self {
        Self {
            ns: Some(ns),
            local: local.into(),
        }
    }

    /// Creates a name that takes the encoder's default namespace.
    #[must_use]
    pub fn unqualified(local: impl Into<String>) -> Self {
        Self {
            ns: None,
            local: local.into(),
        }
    }

    /// Shorthand for a `DAV:` name.
    #[must_use]
    pub fn dav(local: impl Into<String>) -> Self {
        Self::new(Ns::Dav, local)
    }

    /// Shorthand for a CalDAV name.
    #[must_use]
    pub fn caldav(local: impl Into<String>) -> Self {
        Self::new(Ns::CalDav, local)
    }

    /// Shorthand for a CardDAV name.
    #[must_use]
    pub fn carddav(local: impl Into<String>) -> Self {
        Self::new(Ns::CardDav, local)
    }

    /// Shorthand for a CalendarServer-extension name.
    #[must_use]
    pub fn calendar_server(local: impl Into<String>) -> Self {
        Self::new(Ns::CalendarServer, local)
    }

    fn qualified(&self, default_ns: Option<Ns>) -> String {
        match self.ns.or(default_ns) {
            Some(ns) => format!("{}:{}", ns.prefix(), self.local),
            None => self.local.clone(),
        }
    }
}

/// Content of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// An empty element, e.g. a property request like `<d:getetag/>`.
    Empty,
    /// A text leaf.
    Text(String),
    /// Nested child elements, serialized in insertion order.
    Children(Vec<Element>),
}

/// A node of a request body tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// The element name.
    pub name: ElementName,
    /// Plain (non-namespace) attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    /// The element content.
    pub content: Content,
}

impl Element {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: ElementName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            content: Content::Empty,
        }
    }

    /// Creates a text leaf.
    #[must_use]
    pub fn text(name: ElementName, text: impl Into<String>) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            content: Content::Text(text.into()),
        }
    }

    /// Creates an element with nested children.
    #[must_use]
    pub fn with_children(name: ElementName, children: Vec<Self>) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            content: Content::Children(children),
        }
    }

    /// Adds an attribute, keeping insertion order.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Appends a child, converting other content kinds to children first.
    pub fn push(&mut self, child: Self) {
        match &mut self.content {
            Content::Children(children) => children.push(child),
            Content::Empty => self.content = Content::Children(vec![child]),
            Content::Text(_) => {
                let text = std::mem::replace(&mut self.content, Content::Empty);
                if let Content::Text(t) = text {
                    let leaf = Self::text(self.name.clone(), t);
                    self.content = Content::Children(vec![leaf, child]);
                }
            }
        }
    }

    fn collect_namespaces(&self, used: &mut [bool; 5]) {
        if let Some(ns) = self.name.ns {
            if let Some(idx) = Ns::ALL.iter().position(|n| *n == ns) {
                used[idx] = true;
            }
        }
        if let Content::Children(children) = &self.content {
            for child in children {
                child.collect_namespaces(used);
            }
        }
    }
}

/// Serializes an element tree to an XML document.
///
/// The document starts with `<?xml version="1.0" encoding="utf-8"?>`. Every
/// namespace referenced anywhere in the tree, plus the default namespace, is
/// declared on the root element in the fixed `d, c, card, cs, ca` order.
/// Elements without an explicit namespace are serialized in `default_ns`
/// when one is supplied, and bare otherwise.
///
/// # Errors
///
/// Returns an error if XML writing fails.
pub fn encode(root: &Element, default_ns: Option<Ns>) -> Result<String, DavError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut used = [false; 5];
    root.collect_namespaces(&mut used);
    if let Some(ns) = default_ns {
        if let Some(idx) = Ns::ALL.iter().position(|n| *n == ns) {
            used[idx] = true;
        }
    }
    let declarations: Vec<(String, &'static str)> = Ns::ALL
        .iter()
        .zip(used)
        .filter(|(_, used)| *used)
        .map(|(ns, _)| (format!("xmlns:{}", ns.prefix()), ns.uri()))
        .collect();

    write_element(&mut writer, root, default_ns, &declarations)?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| DavError::Xml(format!("UTF-8 error: {e}")))
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &Element,
    default_ns: Option<Ns>,
    declarations: &[(String, &'static str)],
) -> Result<(), DavError> {
    let tag = element.name.qualified(default_ns);
    let mut start = BytesStart::new(tag.clone());
    for (key, uri) in declarations {
        start.push_attribute((key.as_str(), *uri));
    }
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    match &element.content {
        Content::Empty => {
            writer.write_event(Event::Empty(start))?;
        }
        Content::Text(text) => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        Content::Children(children) => {
            writer.write_event(Event::Start(start))?;
            for child in children {
                write_element(writer, child, default_ns, &[])?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
    }
    Ok(())
}

/// Decodes an XML document into a compact tree.
///
/// Element names are stripped of their namespace prefix and camel-cased
/// (`cs:getctag` becomes `getctag`, `sync-token` becomes `syncToken`).
/// Attributes land under an `_attributes` key with `xmlns*` entries removed.
/// Text-only leaves are coerced to native scalars; CDATA content is kept
/// verbatim under `_cdata`. Repeated sibling elements become an array in
/// document order.
///
/// # Errors
///
/// Returns an error if the document is not well formed.
pub fn decode(xml: &str) -> Result<Value, DavError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = true;

    let mut root = Map::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let key = camel_case_local(&name_of(&e));
                let attrs = decode_attributes(&e)?;
                let value = decode_element(&mut reader, attrs)?;
                insert_child(&mut root, key, value);
            }
            Event::Empty(e) => {
                let key = camel_case_local(&name_of(&e));
                let attrs = decode_attributes(&e)?;
                insert_child(&mut root, key, empty_value(attrs));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(Value::Object(root))
}

fn decode_element(
    reader: &mut quick_xml::Reader<&[u8]>,
    attrs: Map<String, Value>,
) -> Result<Value, DavError> {
    let mut map = Map::new();
    if !attrs.is_empty() {
        map.insert("_attributes".to_string(), Value::Object(attrs));
    }
    let mut text: Option<String> = None;
    let mut cdata: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let key = camel_case_local(&name_of(&e));
                let child_attrs = decode_attributes(&e)?;
                let value = decode_element(reader, child_attrs)?;
                insert_child(&mut map, key, value);
            }
            Event::Empty(e) => {
                let key = camel_case_local(&name_of(&e));
                let child_attrs = decode_attributes(&e)?;
                insert_child(&mut map, key, empty_value(child_attrs));
            }
            Event::Text(t) => {
                let fragment = t
                    .xml_content()
                    .map_err(|e| DavError::Xml(format!("text decode error: {e}")))?;
                if !fragment.is_empty() {
                    text.get_or_insert_with(String::new).push_str(&fragment);
                }
            }
            Event::CData(t) => {
                let fragment = String::from_utf8_lossy(&t).into_owned();
                cdata.get_or_insert_with(String::new).push_str(&fragment);
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(DavError::Xml("unexpected end of document".to_string()));
            }
            _ => {}
        }
    }

    if let Some(raw) = cdata {
        map.insert("_cdata".to_string(), Value::String(raw));
    }
    if let Some(t) = text {
        if map.is_empty() {
            return Ok(coerce_scalar(&t));
        }
        map.insert("_text".to_string(), coerce_scalar(&t));
    }
    Ok(Value::Object(map))
}

fn name_of(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn decode_attributes(e: &BytesStart<'_>) -> Result<Map<String, Value>, DavError> {
    let mut attrs = Map::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| DavError::Xml(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| DavError::Xml(format!("bad attribute value: {e}")))?;
        attrs.insert(key, Value::String(value.into_owned()));
    }
    Ok(attrs)
}

fn empty_value(attrs: Map<String, Value>) -> Value {
    if attrs.is_empty() {
        Value::Object(Map::new())
    } else {
        let mut map = Map::new();
        map.insert("_attributes".to_string(), Value::Object(attrs));
        Value::Object(map)
    }
}

fn insert_child(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Strips a namespace prefix and camel-cases the local name.
fn camel_case_local(name: &str) -> String {
    let local = name.rsplit(':').next().unwrap_or(name);
    let mut out = String::with_capacity(local.len());
    let mut upper_next = false;
    for ch in local.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Coerces leaf text to a native scalar.
///
/// Integers and floats become numbers, case-insensitive `true`/`false`
/// become booleans, everything else stays a string. Non-finite float parses
/// (e.g. `inf`) are kept as strings since JSON cannot carry them.
fn coerce_scalar(text: &str) -> Value {
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = text.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(text.to_string())
}

/// Normalizes a decoded node to a sequence.
///
/// Single occurrences of a repeatable element decode to a scalar; callers
/// use this to treat them uniformly as a one-element sequence.
#[must_use]
pub fn ensure_array(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Extracts the textual content of a decoded scalar-ish node.
///
/// Handles coerced numbers and booleans, plain strings, and objects carrying
/// `_cdata` or `_text` keys.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => map
            .get("_cdata")
            .or_else(|| map.get("_text"))
            .map(value_to_string)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

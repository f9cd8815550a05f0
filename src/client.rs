// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! DAV client: the protocol request layer and the collection query layer.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::config::DavConfig;
use crate::error::DavError;
use crate::http::HttpClient;
use crate::request::{
    AddressbookMultigetRequest, AddressbookQueryRequest, CalendarMultigetRequest,
    CalendarQueryRequest, Filter, FreeBusyQueryRequest, MkcalendarRequest, MkcolRequest,
    PropfindRequest, SyncCollectionRequest, TimeRange,
};
use crate::response::{DavResponse, TransportStatus, parse_multistatus};
use crate::types::{Account, AccountType, DavCollection, DavObject, Depth, ETag, Href};
use crate::xml::{self, Element, ElementName, Ns, ensure_array, value_to_string};

/// Body of a protocol request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body.
    None,
    /// An element tree, encoded with the request's default namespace.
    Tree(Element),
    /// A pre-formed XML string, sent verbatim.
    Raw(String),
}

/// A single protocol request, one HTTP round trip.
#[derive(Debug)]
pub struct DavRequest {
    method: String,
    namespace: Option<Ns>,
    body: RequestBody,
    headers: Vec<(String, String)>,
    parse_response: bool,
}

impl DavRequest {
    /// Creates a request with the given HTTP method.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            namespace: None,
            body: RequestBody::None,
            headers: Vec::new(),
            parse_response: true,
        }
    }

    /// Sets the default namespace applied to unprefixed body elements.
    #[must_use]
    pub const fn namespace(mut self, ns: Ns) -> Self {
        self.namespace = Some(ns);
        self
    }

    /// Sets an element-tree body.
    #[must_use]
    pub fn body(mut self, element: Element) -> Self {
        self.body = RequestBody::Tree(element);
        self
    }

    /// Sets a pre-formed XML body, bypassing the encoder.
    #[must_use]
    pub fn raw_body(mut self, xml: impl Into<String>) -> Self {
        self.body = RequestBody::Raw(xml.into());
        self
    }

    /// Adds a header. Caller headers win over the defaults on conflict.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Disables response body decoding.
    #[must_use]
    pub const fn no_parse(mut self) -> Self {
        self.parse_response = false;
        self
    }
}

/// Reply of a sync-collection REPORT.
#[derive(Debug, Clone)]
pub struct SyncCollectionReply {
    /// One element per changed or deleted member.
    pub responses: Vec<DavResponse>,
    /// The sync token from the multistatus envelope, present even when no
    /// member changed.
    pub sync_token: Option<String>,
}

/// Client for WebDAV/CalDAV/CardDAV servers.
///
/// # Example
///
/// ```ignore
/// use davsync::{AuthMethod, DavClient, DavConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DavConfig {
///     server_url: "https://dav.example.com".to_string(),
///     auth: AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     ..Default::default()
/// };
///
/// let client = DavClient::new(config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DavClient {
    http: Arc<HttpClient>,
    config: DavConfig,
}

impl DavClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: DavConfig) -> Result<Self, DavError> {
        let http = HttpClient::new(config.clone())?;
        Ok(Self {
            http: Arc::new(http),
            config,
        })
    }

    /// Issues one protocol request and normalizes the response.
    ///
    /// An element-tree body is encoded with the request's default namespace;
    /// the `Content-Type: text/xml;charset=UTF-8` header is merged with
    /// caller headers, caller headers winning. A non-success status, a
    /// non-XML content type, or `no_parse` yields a single element carrying
    /// only transport-level fields; otherwise the body is decoded as a
    /// multistatus document and normalized per `<response>` element.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the body is XML
    /// that fails to decode or lacks a multistatus root.
    pub async fn dav_request(
        &self,
        url: &str,
        request: DavRequest,
    ) -> Result<Vec<DavResponse>, DavError> {
        Ok(self.dav_request_with_document(url, request).await?.0)
    }

    /// Like [`Self::dav_request`], but also returns the decoded multistatus
    /// document when the body was parsed. The envelope carries data that
    /// lives outside the `<response>` elements, e.g. the rotated sync token
    /// of a sync-collection reply with no member changes.
    async fn dav_request_with_document(
        &self,
        url: &str,
        request: DavRequest,
    ) -> Result<(Vec<DavResponse>, Option<Value>), DavError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| DavError::Http(format!("Invalid method: {e}")))?;

        let body = match request.body {
            RequestBody::Tree(element) => Some(xml::encode(&element, request.namespace)?),
            RequestBody::Raw(text) => Some(text),
            RequestBody::None => None,
        };

        // insert() replaces, so caller headers win over the default without
        // leaving a second value behind.
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/xml;charset=UTF-8"),
        );
        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| DavError::Http(format!("Invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| DavError::Http(format!("Invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let mut req = self.http.build_request(method, url).headers(headers);
        if let Some(body) = body {
            req = req.body(body);
        }

        debug!(method = %request.method, url, "issuing dav request");
        let resp = self.http.send(req).await?;

        let outer = TransportStatus {
            href: resp.url().to_string(),
            status: resp.status().as_u16(),
            status_text: resp
                .status()
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            ok: resp.status().is_success(),
        };
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = resp.text().await?;

        if !outer.ok || !content_type.contains("xml") || !request.parse_response {
            return Ok((vec![DavResponse::from_transport(&outer, text)], None));
        }
        if text.trim().is_empty() {
            return Ok((vec![DavResponse::synthesized(&outer)], None));
        }

        let doc = xml::decode(&text)?;
        let responses = parse_multistatus(&doc, &outer)?;
        Ok((responses, Some(doc)))
    }

    /// Issues a REPORT against a collection.
    ///
    /// A reply with exactly one element and no decoded document means the
    /// collection matched nothing, and comes back as an empty list; the
    /// same shape with a failure status is raised as
    /// [`DavError::QueryFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, undecodable bodies, or an
    /// HTTP failure status without a multistatus body.
    pub async fn collection_query(
        &self,
        url: &str,
        body: Element,
        namespace: Ns,
        depth: Option<Depth>,
    ) -> Result<Vec<DavResponse>, DavError> {
        let mut request = DavRequest::new("REPORT").namespace(namespace).body(body);
        if let Some(depth) = depth {
            request = request.header("Depth", depth.as_str());
        }
        let responses = self.dav_request(url, request).await?;
        Self::translate_query_result(responses)
    }

    fn translate_query_result(responses: Vec<DavResponse>) -> Result<Vec<DavResponse>, DavError> {
        if let [only] = responses.as_slice() {
            if !only.has_document() {
                if only.status >= 400 {
                    return Err(DavError::QueryFailed {
                        status: only.status,
                        status_text: only.status_text.clone(),
                    });
                }
                return Ok(Vec::new());
            }
        }
        Ok(responses)
    }

    /// Issues a depth-aware PROPFIND.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or response decoding fails.
    pub async fn propfind(
        &self,
        url: &str,
        request: PropfindRequest,
        depth: Depth,
    ) -> Result<Vec<DavResponse>, DavError> {
        self.dav_request(
            url,
            DavRequest::new("PROPFIND")
                .namespace(Ns::Dav)
                .body(request.build())
                .header("Depth", depth.as_str()),
        )
        .await
    }

    /// Creates a collection via extended MKCOL.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the creation.
    pub async fn mkcol(&self, url: &str, request: MkcolRequest) -> Result<(), DavError> {
        let responses = self
            .dav_request(
                url,
                DavRequest::new("MKCOL")
                    .namespace(Ns::Dav)
                    .body(request.build())
                    .no_parse(),
            )
            .await?;
        Self::expect_success(&responses, "MKCOL")
    }

    /// Creates a calendar collection via MKCALENDAR.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the creation.
    pub async fn mkcalendar(&self, url: &str, request: MkcalendarRequest) -> Result<(), DavError> {
        let responses = self
            .dav_request(
                url,
                DavRequest::new("MKCALENDAR")
                    .namespace(Ns::CalDav)
                    .body(request.build())
                    .no_parse(),
            )
            .await?;
        Self::expect_success(&responses, "MKCALENDAR")
    }

    fn expect_success(responses: &[DavResponse], operation: &str) -> Result<(), DavError> {
        match responses.first() {
            Some(first) if first.ok => Ok(()),
            Some(first) => Err(DavError::Http(format!(
                "{operation} failed: {} {}",
                first.status, first.status_text
            ))),
            None => Err(DavError::InvalidResponse(format!(
                "{operation} returned no response"
            ))),
        }
    }

    /// Runs a calendar-query REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn calendar_query(
        &self,
        url: &str,
        request: &CalendarQueryRequest,
    ) -> Result<Vec<DavResponse>, DavError> {
        self.collection_query(url, request.build(), Ns::CalDav, Some(Depth::One))
            .await
    }

    /// Runs a calendar-multiget REPORT for an explicit href list.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn calendar_multiget(
        &self,
        url: &str,
        hrefs: &[Href],
    ) -> Result<Vec<DavResponse>, DavError> {
        let mut request = CalendarMultigetRequest::new();
        for href in hrefs {
            request.href(href.clone());
        }
        self.collection_query(url, request.build(), Ns::CalDav, Some(Depth::One))
            .await
    }

    /// Runs an addressbook-query REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn addressbook_query(
        &self,
        url: &str,
        request: &AddressbookQueryRequest,
    ) -> Result<Vec<DavResponse>, DavError> {
        self.collection_query(url, request.build(), Ns::CardDav, Some(Depth::One))
            .await
    }

    /// Runs an addressbook-multiget REPORT for an explicit href list.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn addressbook_multiget(
        &self,
        url: &str,
        hrefs: &[Href],
    ) -> Result<Vec<DavResponse>, DavError> {
        let mut request = AddressbookMultigetRequest::new();
        for href in hrefs {
            request.href(href.clone());
        }
        self.collection_query(url, request.build(), Ns::CardDav, Some(Depth::One))
            .await
    }

    /// Runs a free-busy-query REPORT over a validated time range.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn free_busy_query(
        &self,
        url: &str,
        range: TimeRange,
    ) -> Result<Option<DavResponse>, DavError> {
        let request = FreeBusyQueryRequest::new(range);
        let responses = self
            .collection_query(url, request.build(), Ns::CalDav, Some(Depth::Zero))
            .await?;
        Ok(responses.into_iter().next())
    }

    /// Runs a sync-collection REPORT (RFC 6578) with `sync-level` 1.
    ///
    /// An absent token requests a full initial sync. The returned reply
    /// carries the envelope's sync token separately from the member
    /// responses, since a server may rotate the token even when no member
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn sync_collection(
        &self,
        url: &str,
        sync_token: Option<&str>,
    ) -> Result<SyncCollectionReply, DavError> {
        let body = SyncCollectionRequest::new(sync_token).build();
        let request = DavRequest::new("REPORT")
            .namespace(Ns::Dav)
            .body(body)
            .header("Depth", Depth::One.as_str());
        let (responses, doc) = self.dav_request_with_document(url, request).await?;
        let responses = Self::translate_query_result(responses)?;

        let sync_token = doc
            .as_ref()
            .and_then(|d| d.get("multistatus"))
            .and_then(|ms| ms.get("syncToken"))
            .map(value_to_string)
            .filter(|token| !token.is_empty());
        Ok(SyncCollectionReply {
            responses,
            sync_token,
        })
    }

    /// Resolves the account's home set URL from its root/principal URL.
    ///
    /// The result feeds `Account::home_url`; it is not stored on the client.
    ///
    /// # Errors
    ///
    /// Fails fast with [`DavError::MissingAccountField`] if the root URL was
    /// never resolved; returns [`DavError::InvalidResponse`] when the server
    /// advertises no home set.
    pub async fn fetch_home_url(&self, account: &Account) -> Result<String, DavError> {
        let root_url = account.require_root_url()?;
        let (prop, key) = match account.account_type {
            AccountType::CalDav => (ElementName::caldav("calendar-home-set"), "calendarHomeSet"),
            AccountType::CardDav => (
                ElementName::carddav("addressbook-home-set"),
                "addressbookHomeSet",
            ),
        };
        let mut propfind = PropfindRequest::new();
        propfind.prop(prop);

        let responses = self
            .propfind(&self.full_url(root_url), propfind, Depth::Zero)
            .await?;
        let home = responses.iter().find_map(|response| {
            let set = response.props.as_ref()?.get(key)?;
            let hrefs = ensure_array(set.get("href")?);
            hrefs
                .first()
                .copied()
                .map(value_to_string)
                .filter(|href| !href.is_empty())
        });
        home.map(|href| self.full_url(&href))
            .ok_or_else(|| DavError::InvalidResponse("no home set in response".to_string()))
    }

    /// Lists calendar collections under the account's home set.
    ///
    /// # Errors
    ///
    /// Fails fast if the home URL was never resolved, otherwise propagates
    /// query failures.
    pub async fn fetch_calendars(&self, account: &Account) -> Result<Vec<DavCollection>, DavError> {
        self.fetch_collections(account, "calendar").await
    }

    /// Lists address book collections under the account's home set.
    ///
    /// # Errors
    ///
    /// Fails fast if the home URL was never resolved, otherwise propagates
    /// query failures.
    pub async fn fetch_address_books(
        &self,
        account: &Account,
    ) -> Result<Vec<DavCollection>, DavError> {
        self.fetch_collections(account, "addressbook").await
    }

    async fn fetch_collections(
        &self,
        account: &Account,
        resource_type: &str,
    ) -> Result<Vec<DavCollection>, DavError> {
        let home_url = account.require_home_url()?;
        let url = self.full_url(home_url);

        let mut propfind = PropfindRequest::new();
        propfind
            .prop(ElementName::dav("displayname"))
            .prop(ElementName::dav("resourcetype"))
            .prop(ElementName::dav("sync-token"))
            .prop(ElementName::dav("supported-report-set"))
            .prop(ElementName::calendar_server("getctag"));

        let responses = self.propfind(&url, propfind, Depth::One).await?;

        let mut collections = Vec::new();
        for response in responses {
            let Some(props) = &response.props else {
                continue;
            };
            let is_wanted = props
                .get("resourcetype")
                .and_then(Value::as_object)
                .is_some_and(|types| types.contains_key(resource_type));
            if !is_wanted {
                continue;
            }
            collections.push(DavCollection {
                url: Href::from(self.full_url(response.href.as_str())),
                display_name: props.get("displayname").map(value_to_string),
                ctag: props.get("getctag").map(value_to_string),
                sync_token: props.get("syncToken").map(value_to_string),
                reports: supported_reports(props),
                objects: Vec::new(),
            });
        }
        debug!(count = collections.len(), "fetched collections");
        Ok(collections)
    }

    /// Fetches calendar objects from a collection, optionally constrained
    /// to a time range.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn fetch_calendar_objects(
        &self,
        collection_url: &str,
        time_range: Option<&TimeRange>,
    ) -> Result<Vec<DavObject>, DavError> {
        let mut query = CalendarQueryRequest::new();
        if let Some(range) = time_range {
            query = query.filter(
                Filter::comp("VCALENDAR")
                    .child(Filter::comp("VEVENT").child(Filter::time_range(range))),
            );
        }
        let responses = self
            .calendar_query(&self.full_url(collection_url), &query)
            .await?;
        Ok(self.objects_from_responses(&responses, "calendarData"))
    }

    /// Fetches vCards from an address book collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn fetch_vcards(&self, collection_url: &str) -> Result<Vec<DavObject>, DavError> {
        let query = AddressbookQueryRequest::new();
        let responses = self
            .addressbook_query(&self.full_url(collection_url), &query)
            .await?;
        Ok(self.objects_from_responses(&responses, "addressData"))
    }

    pub(crate) fn objects_from_responses(
        &self,
        responses: &[DavResponse],
        data_key: &str,
    ) -> Vec<DavObject> {
        responses
            .iter()
            .filter(|r| r.ok && r.status != 404)
            .filter_map(|r| {
                let props = r.props.as_ref()?;
                Some(DavObject {
                    url: Href::from(self.full_url(r.href.as_str())),
                    etag: props
                        .get("getetag")
                        .map(value_to_string)
                        .filter(|etag| !etag.is_empty())
                        .map(ETag::new),
                    data: props
                        .get(data_key)
                        .map(value_to_string)
                        .filter(|data| !data.is_empty()),
                })
            })
            .collect()
    }

    /// Creates an object via PUT.
    ///
    /// Returns the new etag when the server sends one.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn create_object(
        &self,
        href: &Href,
        data: &str,
        content_type: &str,
    ) -> Result<Option<ETag>, DavError> {
        let url = self.full_url(href.as_str());
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(Method::PUT, &url)
                    .header("Content-Type", content_type)
                    .body(data.to_string()),
            )
            .await?;
        Ok(HttpClient::extract_etag(&resp))
    }

    /// Updates an object via conditional PUT (`If-Match`).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails or the etag no longer matches.
    pub async fn update_object(
        &self,
        href: &Href,
        etag: &ETag,
        data: &str,
        content_type: &str,
    ) -> Result<Option<ETag>, DavError> {
        let url = self.full_url(href.as_str());
        let resp = self
            .http
            .execute(HttpClient::if_match(
                self.http
                    .build_request(Method::PUT, &url)
                    .header("Content-Type", content_type)
                    .body(data.to_string()),
                etag,
            ))
            .await?;
        Ok(HttpClient::extract_etag(&resp))
    }

    /// Deletes an object, conditionally when an etag is supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub async fn delete_object(&self, href: &Href, etag: Option<&ETag>) -> Result<(), DavError> {
        let url = self.full_url(href.as_str());
        let mut req = self.http.build_request(Method::DELETE, &url);
        if let Some(etag) = etag {
            req = HttpClient::if_match(req, etag);
        }
        self.http.execute(req).await?;
        Ok(())
    }

    /// Builds an absolute URL from an href.
    pub(crate) fn full_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.config.server_url.trim_end_matches('/'), href)
        }
    }
}

/// Decodes the supported REPORT names out of a property map.
fn supported_reports(props: &serde_json::Map<String, Value>) -> Vec<String> {
    let Some(set) = props
        .get("supportedReportSet")
        .and_then(|set| set.get("supportedReport"))
    else {
        return Vec::new();
    };
    ensure_array(set)
        .into_iter()
        .filter_map(|supported| supported.get("report"))
        .filter_map(Value::as_object)
        .filter_map(|report| report.keys().next().cloned())
        .collect()
}

/// The decoded name of the sync-collection REPORT as it appears in a
/// collection's `reports` set.
pub(crate) const SYNC_COLLECTION_REPORT: &str = "syncCollection";

/// Account types' data property key inside decoded props.
pub(crate) const fn data_key(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::CalDav => "calendarData",
        AccountType::CardDav => "addressData",
    }
}

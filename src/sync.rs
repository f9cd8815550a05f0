// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Collection reconciliation against a DAV server.
//!
//! A previously cached [`DavCollection`] is compared with live server state
//! using one of two methods: a ctag probe followed by a full re-list
//! ("basic"), or an incremental sync-collection REPORT plus a batched
//! multiget for the changed objects ("webdav").

use tracing::debug;

use crate::client::{DavClient, SYNC_COLLECTION_REPORT, data_key};
use crate::error::DavError;
use crate::request::PropfindRequest;
use crate::types::{Account, AccountType, DavCollection, DavObject, Depth, Href};
use crate::xml::{ElementName, value_to_string};

/// Reconciliation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMethod {
    /// Compare ctags, re-list everything on change.
    Basic,
    /// Incremental sync-collection REPORT with a sync token.
    WebDav,
}

/// The diff computed by a reconciliation.
#[derive(Debug, Clone, Default)]
pub struct SyncChanges {
    /// Server objects with no cached equivalent.
    pub created: Vec<DavObject>,
    /// Objects whose etag changed; carries the new server state.
    pub updated: Vec<DavObject>,
    /// Cached objects gone from the server.
    pub deleted: Vec<DavObject>,
}

impl SyncChanges {
    /// Whether the reconciliation found no difference.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Result of a reconciliation: the fresh collection snapshot (its `objects`
/// being the flattened `unchanged + created + updated` projection) together
/// with the detailed diff. Both are projections of the same underlying
/// comparison.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// New collection snapshot with the adopted ctag/sync token.
    pub collection: DavCollection,
    /// Created/updated/deleted detail.
    pub changes: SyncChanges,
}

/// Compares two URLs for resource identity.
///
/// Both sides are trimmed and stripped of a single trailing slash, then
/// checked for substring containment either way. This tolerates
/// relative-vs-absolute and trailing-slash variance across servers; it is
/// not full URL normalization, and a path that is a prefix of another
/// (`/cal/1` vs `/cal/10`) can falsely match. The loose rule is kept for
/// cross-server compatibility.
#[must_use]
pub fn url_equals(a: &str, b: &str) -> bool {
    let a = a.trim().trim_end_matches('/');
    let b = b.trim().trim_end_matches('/');
    if a.is_empty() && b.is_empty() {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

fn find_equivalent<'a>(objects: &'a [DavObject], url: &str) -> Option<&'a DavObject> {
    objects.iter().find(|o| url_equals(o.url.as_str(), url))
}

/// Diffs a remote object listing against the cached one.
///
/// Created objects have no cached equivalent; updated objects have an
/// equivalent whose etag is present on both sides and differs; everything
/// else is unchanged. Deletions are cached objects without a remote
/// equivalent.
fn diff_objects(cached: &[DavObject], remote: &[DavObject]) -> SyncChanges {
    let mut changes = SyncChanges::default();
    for object in remote {
        match find_equivalent(cached, object.url.as_str()) {
            None => changes.created.push(object.clone()),
            Some(old) => {
                let modified = match (&old.etag, &object.etag) {
                    (Some(old_etag), Some(new_etag)) => old_etag != new_etag,
                    _ => false,
                };
                if modified {
                    changes.updated.push(object.clone());
                }
            }
        }
    }
    for object in cached {
        if find_equivalent(remote, object.url.as_str()).is_none() {
            changes.deleted.push(object.clone());
        }
    }
    changes
}

impl DavClient {
    /// Probes a collection's ctag without fetching members.
    ///
    /// Returns whether the ctag differs from the cached one, plus the
    /// server's current value.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::CollectionNotFound`] when no response element
    /// matches the collection URL; a missing collection is a hard failure,
    /// not a zero-object deletion.
    pub async fn is_collection_dirty(
        &self,
        collection: &DavCollection,
    ) -> Result<(bool, Option<String>), DavError> {
        let mut propfind = PropfindRequest::new();
        propfind.prop(ElementName::calendar_server("getctag"));

        let url = self.full_url(collection.url.as_str());
        let responses = self.propfind(&url, propfind, Depth::Zero).await?;

        let matched = responses
            .iter()
            .find(|r| url_equals(collection.url.as_str(), r.href.as_str()))
            .ok_or_else(|| DavError::CollectionNotFound(collection.url.clone()))?;

        let new_ctag = matched
            .props
            .as_ref()
            .and_then(|props| props.get("getctag"))
            .map(value_to_string)
            .filter(|ctag| !ctag.is_empty());
        Ok((collection.ctag != new_ctag, new_ctag))
    }

    /// Reconciles a cached collection against the server.
    ///
    /// The method is the caller's explicit choice when given; otherwise
    /// `webdav` is used when the collection advertises the sync-collection
    /// REPORT, and `basic` as the fallback.
    ///
    /// # Errors
    ///
    /// Fails fast with [`DavError::MissingAccountField`] before any network
    /// call when the account lacks a home URL; any failing step aborts the
    /// whole reconciliation.
    pub async fn smart_collection_sync(
        &self,
        account: &Account,
        collection: DavCollection,
        method: Option<SyncMethod>,
    ) -> Result<SyncOutcome, DavError> {
        account.require_home_url()?;

        let method = method.unwrap_or_else(|| {
            if collection
                .reports
                .iter()
                .any(|r| r == SYNC_COLLECTION_REPORT)
            {
                SyncMethod::WebDav
            } else {
                SyncMethod::Basic
            }
        });
        debug!(url = %collection.url, ?method, "reconciling collection");

        match method {
            SyncMethod::Basic => self.basic_sync(account, collection).await,
            SyncMethod::WebDav => self.webdav_sync(account, collection).await,
        }
    }

    /// Ctag-probe sync: on any change the full member list is re-fetched
    /// and diffed. O(collection size) per sync regardless of delta size; no
    /// partial path exists in this method.
    async fn basic_sync(
        &self,
        account: &Account,
        mut collection: DavCollection,
    ) -> Result<SyncOutcome, DavError> {
        let (dirty, new_ctag) = self.is_collection_dirty(&collection).await?;
        if !dirty {
            debug!(url = %collection.url, "ctag unchanged, nothing to do");
            return Ok(SyncOutcome {
                collection,
                changes: SyncChanges::default(),
            });
        }

        let remote = match account.account_type {
            AccountType::CalDav => {
                self.fetch_calendar_objects(collection.url.as_str(), None)
                    .await?
            }
            AccountType::CardDav => self.fetch_vcards(collection.url.as_str()).await?,
        };

        let changes = diff_objects(&collection.objects, &remote);
        debug!(
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "basic sync diff"
        );

        // The re-listed server state is exactly unchanged + created + updated.
        collection.objects = remote;
        collection.ctag = new_ctag;
        Ok(SyncOutcome {
            collection,
            changes,
        })
    }

    /// Incremental sync: partition the sync-collection reply into changed
    /// and deleted hrefs, then batch-fetch changed bodies in one multiget.
    async fn webdav_sync(
        &self,
        account: &Account,
        mut collection: DavCollection,
    ) -> Result<SyncOutcome, DavError> {
        let url = self.full_url(collection.url.as_str());
        let reply = self
            .sync_collection(&url, collection.sync_token.as_deref())
            .await?;

        // Collection-level metadata entries share the multistatus with
        // member objects; only member hrefs are of interest.
        let extension = account.account_type.object_extension();
        let mut changed_hrefs: Vec<Href> = Vec::new();
        let mut deleted_hrefs: Vec<Href> = Vec::new();
        for response in &reply.responses {
            if !response
                .href
                .as_str()
                .trim_end_matches('/')
                .ends_with(extension)
            {
                continue;
            }
            // Status 404 marks a deletion per the sync-collection contract.
            if response.status == 404 {
                deleted_hrefs.push(response.href.clone());
            } else {
                changed_hrefs.push(response.href.clone());
            }
        }

        let fetched = if changed_hrefs.is_empty() {
            Vec::new()
        } else {
            let multiget_responses = match account.account_type {
                AccountType::CalDav => self.calendar_multiget(&url, &changed_hrefs).await?,
                AccountType::CardDav => self.addressbook_multiget(&url, &changed_hrefs).await?,
            };
            self.objects_from_responses(&multiget_responses, data_key(account.account_type))
        };

        let mut changes = diff_objects(&collection.objects, &fetched);
        // The multiget only covers changed objects, so absence there says
        // nothing about deletion; deletions come from the 404 hrefs alone.
        changes.deleted = deleted_hrefs
            .iter()
            .map(|href| {
                find_equivalent(&collection.objects, href.as_str())
                    .cloned()
                    .unwrap_or_else(|| DavObject::new(Href::from(self.full_url(href.as_str()))))
            })
            .collect();
        debug!(
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "webdav sync diff"
        );

        let mut objects = Vec::with_capacity(collection.objects.len() + changes.created.len());
        for old in &collection.objects {
            if deleted_hrefs
                .iter()
                .any(|href| url_equals(old.url.as_str(), href.as_str()))
            {
                continue;
            }
            match find_equivalent(&fetched, old.url.as_str()) {
                Some(new) => objects.push(new.clone()),
                None => objects.push(old.clone()),
            }
        }
        objects.extend(changes.created.iter().cloned());

        collection.objects = objects;
        if let Some(token) = reply.sync_token {
            collection.sync_token = Some(token);
        }
        Ok(SyncOutcome {
            collection,
            changes,
        })
    }
}

use crate::domain::{
    entities::{NewSnapshot, Snapshot},
    page_key::PageKey,
    value_objects::{PageId, SiteId, SnapshotId},
    DomainResult,
};
use chrono::{DateTime, Utc};

/// Criteria for finding the snapshot that currently serves a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    /// Site scope; `None` searches every site (used by id lookups)
    pub site_id: Option<SiteId>,
    pub key: PageKey,
    /// Point in time the publication window is evaluated at
    pub at: DateTime<Utc>,
}

impl SnapshotQuery {
    pub fn new(site_id: Option<SiteId>, key: PageKey) -> Self {
        Self {
            site_id,
            key,
            at: Utc::now(),
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Repository trait for serialized page snapshots.
///
/// Snapshots are append-only: they are created, published, and eventually
/// removed by retention, but their content never changes.
pub trait SnapshotRepository {
    /// Persists a new snapshot and returns it with its assigned id.
    ///
    /// Ids increase with creation order.
    fn save_snapshot(&mut self, snapshot: NewSnapshot) -> DomainResult<Snapshot>;

    /// Opens the publication window of each snapshot at `at`.
    ///
    /// Any other snapshot of the same page whose window is still open is
    /// closed at `at`. Fails with `NotFound` if an id is unknown.
    fn publish_snapshots(&mut self, ids: &[SnapshotId], at: DateTime<Utc>) -> DomainResult<()>;

    /// Returns the newest snapshot that is live at `query.at` and matches the query.
    ///
    /// Newest means latest publication start, then highest id.
    fn find_enabled_snapshot(&self, query: &SnapshotQuery) -> DomainResult<Option<Snapshot>>;

    /// Returns every snapshot of a page, newest first.
    fn find_snapshots_by_page(&self, page_id: &PageId) -> DomainResult<Vec<Snapshot>>;

    /// Deletes all but the `keep` most recently created snapshots of a page.
    ///
    /// The snapshot currently serving the page is never deleted, even when it
    /// falls outside the keep window. Returns the number of deleted snapshots.
    fn cleanup(&mut self, page_id: &PageId, keep: usize) -> DomainResult<usize>;
}

/// Snapshot retention: trims old snapshots of every page of a site
use crate::application::repositories::{PageRepository, SnapshotRepository, UnitOfWork};
use crate::domain::base::{DomainError, Entity};
use crate::domain::entities::Site;
use crate::domain::value_objects::{PageId, SiteId};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Cleanup of page {page_id} on site {site_id} failed, nothing was deleted: {source}")]
    PageFailed {
        site_id: SiteId,
        page_id: PageId,
        source: DomainError,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] DomainError),
}

pub type CleanupResult<T> = Result<T, CleanupError>;

/// Callback type for cleanup events
pub type CleanupCallback = Arc<dyn Fn(CleanupEvent) + Send + Sync>;

/// Cleanup event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupEvent {
    Started { site_id: SiteId, pages: usize },
    /// Sent once the whole batch is committed
    PageTrimmed { page_id: PageId, deleted: usize },
    Completed { site_id: SiteId, pages: usize, deleted: usize },
    RolledBack { site_id: SiteId, page_id: PageId, error: String },
}

/// Summary of a cleanup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub site_id: SiteId,
    pub pages_processed: usize,
    pub snapshots_deleted: usize,
    pub duration_ms: u64,
}

/// Service applying the snapshot retention policy one site at a time.
///
/// A run is all-or-nothing: every page of the site is trimmed inside one
/// unit of work. Runs sharing a store are serialized by its lock.
pub struct CleanupService<R> {
    store: Arc<Mutex<R>>,
}

impl<R> CleanupService<R>
where
    R: PageRepository + SnapshotRepository + UnitOfWork + Send,
{
    pub fn new(store: R) -> Self {
        Self::with_shared_store(Arc::new(Mutex::new(store)))
    }

    /// Use a store that other services also hold
    pub fn with_shared_store(store: Arc<Mutex<R>>) -> Self {
        CleanupService { store }
    }

    pub fn store(&self) -> Arc<Mutex<R>> {
        Arc::clone(&self.store)
    }

    /// Keep the `keep` newest snapshots of every page of `site`, plus the one
    /// currently served
    pub async fn cleanup_by_site(
        &self,
        site: &Site,
        keep: usize,
        callback: Option<CleanupCallback>,
    ) -> CleanupResult<CleanupSummary> {
        let start_time = Instant::now();
        let site_id = *site.id();
        let mut store = self.store.lock().await;

        let page_ids: Vec<PageId> = store
            .find_by_site(&site_id)?
            .iter()
            .map(|page| *page.id())
            .collect();

        tracing::debug!("Cleaning up {} pages of site {}", page_ids.len(), site_id);
        if let Some(ref cb) = callback {
            cb(CleanupEvent::Started {
                site_id,
                pages: page_ids.len(),
            });
        }

        store.begin()?;

        let mut trimmed = Vec::with_capacity(page_ids.len());
        for page_id in page_ids {
            match store.cleanup(&page_id, keep) {
                Ok(deleted) => trimmed.push((page_id, deleted)),
                Err(source) => {
                    if let Err(e) = store.rollback() {
                        tracing::error!("Rollback of cleanup for site {} failed: {}", site_id, e);
                    }
                    tracing::warn!(
                        "Cleanup of site {} rolled back at page {}: {}",
                        site_id,
                        page_id,
                        source
                    );

                    if let Some(ref cb) = callback {
                        cb(CleanupEvent::RolledBack {
                            site_id,
                            page_id,
                            error: source.to_string(),
                        });
                    }

                    return Err(CleanupError::PageFailed {
                        site_id,
                        page_id,
                        source,
                    });
                }
            }
        }

        if let Err(e) = store.commit() {
            if let Err(rollback_error) = store.rollback() {
                tracing::error!("Rollback of cleanup for site {} failed: {}", site_id, rollback_error);
            }
            return Err(e.into());
        }
        drop(store);

        let snapshots_deleted = trimmed.iter().map(|(_, deleted)| deleted).sum();
        if let Some(ref cb) = callback {
            for (page_id, deleted) in &trimmed {
                cb(CleanupEvent::PageTrimmed {
                    page_id: *page_id,
                    deleted: *deleted,
                });
            }
            cb(CleanupEvent::Completed {
                site_id,
                pages: trimmed.len(),
                deleted: snapshots_deleted,
            });
        }

        let summary = CleanupSummary {
            site_id,
            pages_processed: trimmed.len(),
            snapshots_deleted,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Cleanup of site {} complete: {} snapshots deleted across {} pages in {}ms",
            site_id,
            summary.snapshots_deleted,
            summary.pages_processed,
            summary.duration_ms
        );

        Ok(summary)
    }
}

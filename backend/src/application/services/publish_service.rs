/// Snapshot creation: captures live pages and publishes the captures
use crate::application::repositories::{PageRepository, SnapshotRepository, UnitOfWork};
use crate::domain::aggregates::Page;
use crate::domain::base::{DomainError, Entity};
use crate::domain::entities::Site;
use crate::domain::value_objects::{PageId, SnapshotId};
use crate::infrastructure::transformer::{TransformError, Transformer};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Repository error: {0}")]
    Repository(#[from] DomainError),
}

pub type PublishResult<T> = Result<T, PublishError>;

/// Summary of a publish run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub snapshot_ids: Vec<SnapshotId>,
    pub duration_ms: u64,
}

/// Service turning the live state of pages into published snapshots
pub struct PublishService<R> {
    store: Arc<Mutex<R>>,
    transformer: Transformer,
}

impl<R> PublishService<R>
where
    R: PageRepository + SnapshotRepository + UnitOfWork + Send,
{
    pub fn new(store: R) -> Self {
        Self::with_shared_store(Arc::new(Mutex::new(store)))
    }

    /// Use a store that other services also hold
    pub fn with_shared_store(store: Arc<Mutex<R>>) -> Self {
        PublishService {
            store,
            transformer: Transformer::new(),
        }
    }

    pub fn store(&self) -> Arc<Mutex<R>> {
        Arc::clone(&self.store)
    }

    /// Snapshot and publish every page of a site
    pub async fn create_by_site(&self, site: &Site) -> PublishResult<PublishSummary> {
        let start_time = Instant::now();
        let mut store = self.store.lock().await;

        let pages = store.find_by_site(site.id())?;
        let snapshot_ids = self.publish_pages(&mut *store, pages)?;

        tracing::info!(
            "Published {} snapshots for site {}",
            snapshot_ids.len(),
            site.id()
        );

        Ok(PublishSummary {
            snapshot_ids,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Snapshot and publish one page
    pub async fn create_by_page(&self, page_id: &PageId) -> PublishResult<PublishSummary> {
        let start_time = Instant::now();
        let mut store = self.store.lock().await;

        let page = store
            .find_by_id(page_id)?
            .ok_or(PublishError::PageNotFound(*page_id))?;
        let snapshot_ids = self.publish_pages(&mut *store, vec![page])?;

        tracing::info!("Published snapshot of page {}", page_id);

        Ok(PublishSummary {
            snapshot_ids,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Run the whole batch in one unit of work, rolling back on any failure
    fn publish_pages(&self, store: &mut R, pages: Vec<Page>) -> PublishResult<Vec<SnapshotId>> {
        store.begin()?;

        match self.snapshot_pages(store, pages) {
            Ok(ids) => {
                store.commit()?;
                Ok(ids)
            }
            Err(e) => {
                if let Err(rollback_error) = store.rollback() {
                    tracing::error!("Rollback of publish failed: {}", rollback_error);
                }
                tracing::warn!("Publish rolled back: {}", e);
                Err(e)
            }
        }
    }

    fn snapshot_pages(&self, store: &mut R, pages: Vec<Page>) -> PublishResult<Vec<SnapshotId>> {
        let mut ids = Vec::with_capacity(pages.len());

        for mut page in pages {
            page.meta_mut().set_edited(false);
            let snapshot = self.transformer.create(&page)?;
            let saved = store.save_snapshot(snapshot)?;
            ids.push(*saved.id());
            store.save(page)?;
        }

        store.publish_snapshots(&ids, Utc::now())?;
        Ok(ids)
    }
}

/// Snapshot-backed page resolution, used for public traffic
use super::{
    describe_lookup, site_id_of, CmsError, CmsManager, CmsResult, PageProxy, ResolutionContext,
    SourceKind,
};
use crate::application::repositories::{SnapshotQuery, SnapshotRepository};
use crate::domain::base::Entity;
use crate::domain::entities::Site;
use crate::domain::page_key::PageKey;
use crate::domain::value_objects::BlockId;
use crate::infrastructure::transformer::{TransformError, Transformer};
use std::sync::Arc;
use tracing::debug;

/// Serves pages from their latest published snapshot.
///
/// Never writes: a container missing from a snapshot stays missing.
pub struct CmsSnapshotManager<'a, R: SnapshotRepository> {
    repository: &'a R,
    transformer: Transformer,
}

impl<'a, R: SnapshotRepository> CmsSnapshotManager<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self {
            repository,
            transformer: Transformer::new(),
        }
    }
}

impl<'a, R: SnapshotRepository> CmsManager for CmsSnapshotManager<'a, R> {
    fn resolve_page(
        &self,
        ctx: &mut ResolutionContext,
        site: Option<&Site>,
        key: PageKey,
    ) -> CmsResult<PageProxy> {
        ctx.bind_source(SourceKind::Snapshot)?;
        let site_id = site_id_of(site);

        if let Some(page) = ctx.cached_page(site_id.as_ref(), &key) {
            debug!(request_id = %ctx.request_id(), page_id = %page.id(), "Page cache hit for {}", key);
            return Ok(page.clone());
        }

        let query = SnapshotQuery::new(site_id, key.clone());
        let snapshot = match self.repository.find_enabled_snapshot(&query)? {
            Some(snapshot) => snapshot,
            None => {
                debug!(request_id = %ctx.request_id(), "No enabled snapshot for {}", key);
                return Err(CmsError::PageNotFound(describe_lookup(site_id.as_ref(), &key)));
            }
        };

        let snapshot_id = *snapshot.id();
        let expected = *snapshot.page_id();
        let snapshot_site = *snapshot.site_id();

        let loaded = self
            .transformer
            .load(snapshot_site, Arc::new(snapshot.into_content()))?;
        if loaded.meta.id() != &expected {
            return Err(TransformError::PageMismatch {
                expected,
                found: *loaded.meta.id(),
            }
            .into());
        }

        let page = ctx.register_snapshot_page(site_id, key, snapshot_id, loaded)?;
        debug!(
            request_id = %ctx.request_id(),
            page_id = %page.id(),
            snapshot_id = %snapshot_id,
            "Resolved page from snapshot"
        );

        Ok(page)
    }

    fn find_container(
        &self,
        ctx: &mut ResolutionContext,
        name: &str,
        page: &PageProxy,
        parent: Option<&BlockId>,
    ) -> CmsResult<Option<BlockId>> {
        ctx.bind_source(SourceKind::Snapshot)?;
        Ok(ctx.find_container(page, name, parent)?)
    }
}

/// Live page resolution, used for previews and editing
use super::{
    describe_lookup, site_id_of, BlockInteractor, CmsError, CmsManager, CmsResult,
    ContainerOptions, PageProxy, ResolutionContext, SourceKind,
};
use crate::application::repositories::PageRepository;
use crate::domain::entities::Site;
use crate::domain::page_key::PageKey;
use crate::domain::value_objects::BlockId;
use std::cell::RefCell;
use tracing::{debug, info};

/// Serves pages straight from the editable store.
///
/// Unlike the snapshot manager it creates a container on demand when a
/// template asks for one the page does not have yet. The store and the
/// interactor sit behind `RefCell`s so that this write stays behind the same
/// `&self` interface as every read.
pub struct CmsPageManager<'a, R: PageRepository, I: BlockInteractor> {
    repository: RefCell<&'a mut R>,
    interactor: RefCell<I>,
}

impl<'a, R: PageRepository, I: BlockInteractor> CmsPageManager<'a, R, I> {
    pub fn new(repository: &'a mut R, interactor: I) -> Self {
        Self {
            repository: RefCell::new(repository),
            interactor: RefCell::new(interactor),
        }
    }
}

impl<'a, R: PageRepository, I: BlockInteractor> CmsManager for CmsPageManager<'a, R, I> {
    fn resolve_page(
        &self,
        ctx: &mut ResolutionContext,
        site: Option<&Site>,
        key: PageKey,
    ) -> CmsResult<PageProxy> {
        ctx.bind_source(SourceKind::Live)?;
        let site_id = site_id_of(site);

        if let Some(page) = ctx.cached_page(site_id.as_ref(), &key) {
            debug!(request_id = %ctx.request_id(), page_id = %page.id(), "Page cache hit for {}", key);
            return Ok(page.clone());
        }

        let page = self
            .repository
            .borrow()
            .find_one_by(site_id.as_ref(), &key)?
            .filter(|page| page.meta().is_enabled())
            .ok_or_else(|| CmsError::PageNotFound(describe_lookup(site_id.as_ref(), &key)))?;

        debug!(
            request_id = %ctx.request_id(),
            page_id = %page.meta().id(),
            blocks = page.block_count(),
            "Resolved live page"
        );

        Ok(ctx.register_live_page(site_id, key, &page))
    }

    fn find_container(
        &self,
        ctx: &mut ResolutionContext,
        name: &str,
        page: &PageProxy,
        parent: Option<&BlockId>,
    ) -> CmsResult<Option<BlockId>> {
        ctx.bind_source(SourceKind::Live)?;
        if let Some(found) = ctx.find_container(page, name, parent)? {
            return Ok(Some(found));
        }

        if let Some(parent_id) = parent {
            if ctx.block(parent_id)?.is_none() {
                return Err(CmsError::BlockNotFound(*parent_id));
            }
        }

        let mut repository = self.repository.borrow_mut();
        let mut stored = repository
            .find_by_id(page.id())?
            .ok_or_else(|| CmsError::PageNotFound(describe_lookup(None, &PageKey::Id(*page.id()))))?;

        let block = self.interactor.borrow_mut().create_new_container(ContainerOptions {
            page_id: *page.id(),
            code: name.to_string(),
            parent_id: parent.copied(),
        })?;
        let block_id = *block.id();

        stored.add_block(block.clone())?;
        repository.save(stored)?;
        drop(repository);
        ctx.attach_block(block)?;

        info!(
            request_id = %ctx.request_id(),
            page_id = %page.id(),
            block_id = %block_id,
            "Created container '{}'",
            name
        );

        Ok(Some(block_id))
    }
}

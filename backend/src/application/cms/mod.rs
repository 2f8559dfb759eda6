/// Page resolution: turning a page key into a page and its block tree
pub mod block_index;
pub mod block_interactor;
pub mod context;
pub mod page_manager;
pub mod selector;
pub mod snapshot_manager;

pub use block_index::BlockIndex;
pub use block_interactor::{BlockInteractor, ContainerOptions, SequentialBlockInteractor};
pub use context::{PageProxy, PageSource, ResolutionContext, SourceKind};
pub use page_manager::CmsPageManager;
pub use selector::{CmsManagerSelector, ServingMode};
pub use snapshot_manager::CmsSnapshotManager;

use crate::domain::base::{DomainError, Entity};
use crate::domain::entities::{Block, Site};
use crate::domain::page_key::PageKey;
use crate::domain::value_objects::{BlockId, PageAlias, PageId, PageUrl, RouteName, SiteId};
use crate::infrastructure::transformer::TransformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Invalid page key: {0}")]
    InvalidKey(DomainError),

    #[error("Context already holds {bound} pages, cannot serve {requested} pages")]
    SourceMismatch {
        bound: SourceKind,
        requested: SourceKind,
    },

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Repository error: {0}")]
    Repository(#[from] DomainError),
}

pub type CmsResult<T> = Result<T, CmsError>;

/// Describe a failed lookup for error messages
pub(crate) fn describe_lookup(site: Option<&SiteId>, key: &PageKey) -> String {
    match site {
        Some(site_id) => format!("{} on site {}", key, site_id),
        None => key.to_string(),
    }
}

/// Resolves pages and their blocks for one request.
///
/// Implementations differ in where pages come from: published snapshots for
/// public traffic, the editable store for previews. All per-request state is
/// kept in the [`ResolutionContext`] passed to each call.
pub trait CmsManager {
    /// Find the page answering `key`, restricted to `site` when given
    fn resolve_page(
        &self,
        ctx: &mut ResolutionContext,
        site: Option<&Site>,
        key: PageKey,
    ) -> CmsResult<PageProxy>;

    /// Find the container block whose code is `name`.
    ///
    /// Searches the whole page, or only the direct children of `parent`.
    fn find_container(
        &self,
        ctx: &mut ResolutionContext,
        name: &str,
        page: &PageProxy,
        parent: Option<&BlockId>,
    ) -> CmsResult<Option<BlockId>>;

    /// Resolve any key; ids are looked up without a site
    fn get_page(&self, ctx: &mut ResolutionContext, site: Option<&Site>, key: PageKey) -> CmsResult<PageProxy> {
        match key {
            PageKey::Id(id) => self.get_page_by_id(ctx, id),
            key => self.resolve_page(ctx, site, key),
        }
    }

    fn get_page_by_url(&self, ctx: &mut ResolutionContext, site: Option<&Site>, url: &str) -> CmsResult<PageProxy> {
        let url = PageUrl::new(url).map_err(CmsError::InvalidKey)?;
        self.resolve_page(ctx, site, PageKey::Url(url))
    }

    fn get_page_by_route_name(
        &self,
        ctx: &mut ResolutionContext,
        site: Option<&Site>,
        route_name: &str,
    ) -> CmsResult<PageProxy> {
        let route = RouteName::new(route_name).map_err(CmsError::InvalidKey)?;
        self.resolve_page(ctx, site, PageKey::RouteName(route))
    }

    /// Look up by alias; a bare alias gets the `_page_alias_` prefix
    fn get_page_by_page_alias(
        &self,
        ctx: &mut ResolutionContext,
        site: Option<&Site>,
        alias: &str,
    ) -> CmsResult<PageProxy> {
        let alias = PageAlias::new(alias).map_err(CmsError::InvalidKey)?;
        self.resolve_page(ctx, site, PageKey::Alias(alias))
    }

    /// Look up an internal page by its short route name (`footer` for `_page_internal_footer`)
    fn get_internal_route(&self, ctx: &mut ResolutionContext, site: Option<&Site>, name: &str) -> CmsResult<PageProxy> {
        let route = RouteName::internal(name).map_err(CmsError::InvalidKey)?;
        self.resolve_page(ctx, site, PageKey::InternalRoute(route))
    }

    fn get_page_by_name(&self, ctx: &mut ResolutionContext, site: Option<&Site>, name: &str) -> CmsResult<PageProxy> {
        if name.trim().is_empty() {
            return Err(CmsError::InvalidKey(DomainError::InvalidValue(
                "Page name cannot be empty".to_string(),
            )));
        }
        self.resolve_page(ctx, site, PageKey::Name(name.to_string()))
    }

    /// Ids are unique across sites, so no site is needed
    fn get_page_by_id(&self, ctx: &mut ResolutionContext, id: PageId) -> CmsResult<PageProxy> {
        self.resolve_page(ctx, None, PageKey::Id(id))
    }

    /// A block discovered in this resolution; `None` if it was never seen
    fn get_block<'c>(&self, ctx: &'c mut ResolutionContext, id: &BlockId) -> CmsResult<Option<&'c Block>> {
        Ok(ctx.block(id)?)
    }

    fn get_blocks<'c>(&self, ctx: &'c mut ResolutionContext) -> CmsResult<Vec<&'c Block>> {
        Ok(ctx.blocks()?)
    }

    fn get_current_page<'c>(&self, ctx: &'c ResolutionContext) -> Option<&'c PageProxy> {
        ctx.current_page()
    }

    fn set_current_page(&self, ctx: &mut ResolutionContext, page: PageProxy) {
        ctx.set_current_page(page);
    }
}

/// Site id of an optional site
pub(crate) fn site_id_of(site: Option<&Site>) -> Option<SiteId> {
    site.map(|site| *site.id())
}

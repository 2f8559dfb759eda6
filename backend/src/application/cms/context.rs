use super::block_index::BlockIndex;
use super::{CmsError, CmsResult};
use crate::domain::aggregates::{Page, PageMeta};
use crate::domain::entities::Block;
use crate::domain::page_key::PageKey;
use crate::domain::value_objects::{BlockId, PageId, SiteId, SnapshotId};
use crate::infrastructure::transformer::{LoadedPage, TransformError, TransformResult};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Kind of store a resolution reads its pages from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Snapshot,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Live => write!(f, "live"),
            SourceKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Where a resolved page was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Live,
    Snapshot(SnapshotId),
}

impl PageSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            PageSource::Live => SourceKind::Live,
            PageSource::Snapshot(_) => SourceKind::Snapshot,
        }
    }
}

/// Read-only view of a resolved page.
///
/// Blocks are not held here; they live in the [`ResolutionContext`] that
/// resolved the page and are reached by id.
#[derive(Debug, Clone, PartialEq)]
pub struct PageProxy {
    meta: PageMeta,
    root_block_ids: Vec<BlockId>,
    source: PageSource,
}

impl PageProxy {
    pub fn new(meta: PageMeta, root_block_ids: Vec<BlockId>, source: PageSource) -> Self {
        PageProxy {
            meta,
            root_block_ids,
            source,
        }
    }

    pub fn id(&self) -> &PageId {
        self.meta.id()
    }

    pub fn meta(&self) -> &PageMeta {
        &self.meta
    }

    pub fn root_block_ids(&self) -> &[BlockId] {
        &self.root_block_ids
    }

    pub fn source(&self) -> PageSource {
        self.source
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.source, PageSource::Snapshot(_))
    }
}

/// State of one page resolution: resolved pages, the block index and the
/// current page.
///
/// Create one per request and drop it afterwards. Nothing here is shared
/// between requests. A context only ever holds pages of one [`SourceKind`],
/// fixed by the first manager that uses it.
#[derive(Debug)]
pub struct ResolutionContext {
    request_id: Uuid,
    source_kind: Option<SourceKind>,
    current_page: Option<PageProxy>,
    pages: HashMap<PageId, PageProxy>,
    page_references: HashMap<(Option<SiteId>, PageKey), PageId>,
    blocks: BlockIndex,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionContext {
    pub fn new() -> Self {
        ResolutionContext {
            request_id: Uuid::new_v4(),
            source_kind: None,
            current_page: None,
            pages: HashMap::new(),
            page_references: HashMap::new(),
            blocks: BlockIndex::new(),
        }
    }

    /// Identifier of this resolution, for correlating log lines
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source_kind
    }

    /// Tie this context to `kind`, or fail if it already serves the other kind
    pub fn bind_source(&mut self, kind: SourceKind) -> CmsResult<()> {
        match *self.source_kind.get_or_insert(kind) {
            bound if bound == kind => Ok(()),
            bound => Err(CmsError::SourceMismatch {
                bound,
                requested: kind,
            }),
        }
    }

    pub fn current_page(&self) -> Option<&PageProxy> {
        self.current_page.as_ref()
    }

    pub fn set_current_page(&mut self, page: PageProxy) {
        self.current_page = Some(page);
    }

    pub fn page(&self, id: &PageId) -> Option<&PageProxy> {
        self.pages.get(id)
    }

    pub fn block_index(&self) -> &BlockIndex {
        &self.blocks
    }

    /// A page already resolved under this key in this context
    pub fn cached_page(&self, site_id: Option<&SiteId>, key: &PageKey) -> Option<&PageProxy> {
        if let PageKey::Id(id) = key {
            let page = self.pages.get(id)?;
            return site_id
                .map_or(true, |site| page.meta().site_id() == site)
                .then_some(page);
        }

        self.page_references
            .get(&(site_id.copied(), key.clone()))
            .and_then(|id| self.pages.get(id))
    }

    /// Record a page decoded from a snapshot. Its root blocks become pending
    /// slots of the block index.
    ///
    /// A page already known to this context is kept as is and only gains the
    /// new key.
    pub fn register_snapshot_page(
        &mut self,
        site_id: Option<SiteId>,
        key: PageKey,
        snapshot_id: SnapshotId,
        loaded: LoadedPage,
    ) -> TransformResult<PageProxy> {
        self.source_kind.get_or_insert(SourceKind::Snapshot);
        let page_id = *loaded.meta.id();
        if let Some(existing) = self.pages.get(&page_id) {
            let existing = existing.clone();
            self.page_references.insert((site_id, key), page_id);
            return Ok(existing);
        }

        let root_block_ids: Vec<BlockId> = loaded.roots.iter().map(|root| *root.id()).collect();
        for root in loaded.roots {
            self.blocks.insert_pending(root)?;
        }

        let proxy = PageProxy::new(loaded.meta, root_block_ids, PageSource::Snapshot(snapshot_id));
        self.pages.insert(page_id, proxy.clone());
        self.page_references.insert((site_id, key), page_id);
        Ok(proxy)
    }

    /// Record a page read from the live store. Its blocks are indexed as
    /// decoded, in tree order.
    pub fn register_live_page(&mut self, site_id: Option<SiteId>, key: PageKey, page: &Page) -> PageProxy {
        self.source_kind.get_or_insert(SourceKind::Live);
        let page_id = *page.meta().id();
        if let Some(existing) = self.pages.get(&page_id) {
            let existing = existing.clone();
            self.page_references.insert((site_id, key), page_id);
            return existing;
        }

        for root in page.root_blocks() {
            self.blocks.insert_decoded(root.clone());
            for descendant in page.get_descendants(root.id()) {
                self.blocks.insert_decoded(descendant.clone());
            }
        }

        let proxy = PageProxy::new(
            page.meta().clone(),
            page.root_block_ids().to_vec(),
            PageSource::Live,
        );
        self.pages.insert(page_id, proxy.clone());
        self.page_references.insert((site_id, key), page_id);
        proxy
    }

    /// Add a block created during this resolution under its parent, or as a
    /// new root of its page.
    pub fn attach_block(&mut self, block: Block) -> TransformResult<()> {
        let block_id = *block.id();
        if self.blocks.contains(&block_id) {
            return Err(TransformError::DuplicateBlock(block_id));
        }

        match block.parent_id().copied() {
            Some(parent_id) => {
                self.blocks.decode(&parent_id)?;
                let parent = self.blocks.decoded_mut(&parent_id).ok_or_else(|| {
                    TransformError::InvalidPayload {
                        pointer: format!("block {}", block_id),
                        message: format!("parent block {} is not part of this resolution", parent_id),
                    }
                })?;
                parent.add_child(block_id);
            }
            None => {
                let page_id = *block.page_id();
                if let Some(page) = self.pages.get_mut(&page_id) {
                    page.root_block_ids.push(block_id);
                }
                if let Some(current) = self.current_page.as_mut().filter(|page| page.id() == &page_id) {
                    current.root_block_ids.push(block_id);
                }
            }
        }

        self.blocks.insert_decoded(block);
        Ok(())
    }

    /// Look a block up, decoding it from its payload if needed
    pub fn block(&mut self, id: &BlockId) -> TransformResult<Option<&Block>> {
        self.blocks.resolve(id)
    }

    /// Children of a block, in display order
    pub fn children(&mut self, id: &BlockId) -> TransformResult<Vec<&Block>> {
        let child_ids = match self.blocks.resolve(id)? {
            Some(block) => block.child_ids().to_vec(),
            None => return Ok(Vec::new()),
        };
        self.decode_all(&child_ids)
    }

    /// Root blocks of a resolved page, in display order
    pub fn root_blocks(&mut self, page_id: &PageId) -> TransformResult<Vec<&Block>> {
        let root_ids = self
            .pages
            .get(page_id)
            .map(|page| page.root_block_ids.clone())
            .unwrap_or_default();
        self.decode_all(&root_ids)
    }

    /// Every block discovered so far, in discovery order
    pub fn blocks(&mut self) -> TransformResult<Vec<&Block>> {
        self.blocks.decoded_blocks()
    }

    /// Find a block whose code is `code`.
    ///
    /// Without a parent the whole page tree is searched depth first, roots in
    /// order. With a parent only its direct children are checked. Blocks are
    /// decoded along the way and no further than the match.
    pub fn find_container(
        &mut self,
        page: &PageProxy,
        code: &str,
        parent: Option<&BlockId>,
    ) -> TransformResult<Option<BlockId>> {
        if let Some(parent_id) = parent {
            let child_ids = match self.blocks.resolve(parent_id)? {
                Some(block) => block.child_ids().to_vec(),
                None => return Ok(None),
            };
            for child_id in child_ids {
                if let Some(block) = self.blocks.resolve(&child_id)? {
                    if block.code() == Some(code) {
                        return Ok(Some(child_id));
                    }
                }
            }
            return Ok(None);
        }

        let roots = self
            .pages
            .get(page.id())
            .map_or_else(|| page.root_block_ids(), |known| known.root_block_ids());
        let mut stack: Vec<BlockId> = roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let Some(block) = self.blocks.resolve(&id)? else {
                continue;
            };
            if block.code() == Some(code) {
                return Ok(Some(id));
            }
            stack.extend(block.child_ids().iter().rev().copied());
        }

        Ok(None)
    }

    fn decode_all(&mut self, ids: &[BlockId]) -> TransformResult<Vec<&Block>> {
        for id in ids {
            self.blocks.decode(id)?;
        }
        Ok(ids.iter().filter_map(|id| self.blocks.decoded(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{BlockType, PageUrl};
    use crate::infrastructure::transformer::Transformer;
    use std::sync::Arc;

    fn bid(id: i64) -> BlockId {
        BlockId::new(id).unwrap()
    }

    fn page_id() -> PageId {
        PageId::new(3).unwrap()
    }

    fn site_id() -> SiteId {
        SiteId::new(1).unwrap()
    }

    fn url_key() -> PageKey {
        PageKey::Url(PageUrl::new("/news").unwrap())
    }

    /// header(1) -> [menu(2)], content(3) -> [text(4) -> [sidebar(5)]]
    fn page() -> Page {
        let text = BlockType::new("cms.block.text").unwrap();
        let meta = PageMeta::new(page_id(), site_id(), "News").with_url(PageUrl::new("/news").unwrap());
        let mut page = Page::new(meta);
        page.add_block(Block::new_container(bid(1), page_id(), "header", None))
            .unwrap();
        page.add_block(Block::new_container(bid(2), page_id(), "menu", Some(bid(1))))
            .unwrap();
        page.add_block(Block::new_container(bid(3), page_id(), "content", None))
            .unwrap();
        page.add_block(Block::new_child(bid(4), page_id(), bid(3), text))
            .unwrap();
        page.add_block(Block::new_container(bid(5), page_id(), "sidebar", Some(bid(4))))
            .unwrap();
        page
    }

    fn snapshot_context() -> (ResolutionContext, PageProxy) {
        let transformer = Transformer::new();
        let payload = Arc::new(transformer.dump(&page()).unwrap());
        let loaded = transformer.load(site_id(), payload).unwrap();

        let mut ctx = ResolutionContext::new();
        let proxy = ctx
            .register_snapshot_page(Some(site_id()), url_key(), SnapshotId::new(9).unwrap(), loaded)
            .unwrap();
        (ctx, proxy)
    }

    #[test]
    fn test_register_snapshot_page() {
        let (ctx, proxy) = snapshot_context();

        assert_eq!(proxy.source(), PageSource::Snapshot(SnapshotId::new(9).unwrap()));
        assert_eq!(proxy.root_block_ids(), &[bid(1), bid(3)]);
        assert_eq!(ctx.block_index().len(), 2);
        assert_eq!(ctx.cached_page(Some(&site_id()), &url_key()), Some(&proxy));
        assert_eq!(ctx.cached_page(None, &PageKey::Id(page_id())), Some(&proxy));
        assert!(ctx.cached_page(None, &url_key()).is_none());
        assert!(ctx
            .cached_page(Some(&SiteId::new(2).unwrap()), &PageKey::Id(page_id()))
            .is_none());
    }

    #[test]
    fn test_register_same_page_twice_keeps_first() {
        let (mut ctx, proxy) = snapshot_context();
        let transformer = Transformer::new();
        let loaded = transformer
            .load(site_id(), Arc::new(transformer.dump(&page()).unwrap()))
            .unwrap();

        let alias = PageKey::Name("News".to_string());
        let again = ctx
            .register_snapshot_page(Some(site_id()), alias.clone(), SnapshotId::new(10).unwrap(), loaded)
            .unwrap();

        assert_eq!(again, proxy);
        assert_eq!(ctx.cached_page(Some(&site_id()), &alias), Some(&proxy));
    }

    #[test]
    fn test_children_and_roots() {
        let (mut ctx, _) = snapshot_context();

        let roots: Vec<BlockId> = ctx
            .root_blocks(&page_id())
            .unwrap()
            .iter()
            .map(|block| *block.id())
            .collect();
        assert_eq!(roots, vec![bid(1), bid(3)]);

        let children = ctx.children(&bid(3)).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].parent_id(), Some(&bid(3)));
    }

    #[test]
    fn test_find_container_searches_depth_first() {
        let (mut ctx, proxy) = snapshot_context();

        assert_eq!(ctx.find_container(&proxy, "menu", None).unwrap(), Some(bid(2)));
        // the content subtree has not been visited yet
        assert!(!ctx.block_index().contains(&bid(4)));

        assert_eq!(ctx.find_container(&proxy, "sidebar", None).unwrap(), Some(bid(5)));
        assert_eq!(ctx.find_container(&proxy, "missing", None).unwrap(), None);
    }

    #[test]
    fn test_find_container_under_parent_checks_direct_children() {
        let (mut ctx, proxy) = snapshot_context();

        assert_eq!(
            ctx.find_container(&proxy, "sidebar", Some(&bid(4))).unwrap(),
            None
        );
        ctx.block(&bid(3)).unwrap();
        assert_eq!(
            ctx.find_container(&proxy, "sidebar", Some(&bid(4))).unwrap(),
            Some(bid(5))
        );
        assert_eq!(
            ctx.find_container(&proxy, "sidebar", Some(&bid(3))).unwrap(),
            None
        );
    }

    #[test]
    fn test_register_live_page_indexes_everything() {
        let mut ctx = ResolutionContext::new();
        let proxy = ctx.register_live_page(Some(site_id()), url_key(), &page());

        assert_eq!(proxy.source(), PageSource::Live);
        assert!(!proxy.is_snapshot());
        assert_eq!(ctx.block_index().len(), 5);
        assert!(ctx.block_index().is_decoded(&bid(5)));

        let ids: Vec<BlockId> = ctx.blocks().unwrap().iter().map(|b| *b.id()).collect();
        assert_eq!(ids, vec![bid(1), bid(2), bid(3), bid(4), bid(5)]);
    }

    #[test]
    fn test_attach_block() {
        let mut ctx = ResolutionContext::new();
        let proxy = ctx.register_live_page(Some(site_id()), url_key(), &page());
        ctx.set_current_page(proxy.clone());

        ctx.attach_block(Block::new_container(bid(6), page_id(), "footer", None))
            .unwrap();
        ctx.attach_block(Block::new_container(bid(7), page_id(), "links", Some(bid(6))))
            .unwrap();

        assert_eq!(ctx.page(&page_id()).unwrap().root_block_ids(), &[bid(1), bid(3), bid(6)]);
        assert_eq!(ctx.current_page().unwrap().root_block_ids().len(), 3);
        assert_eq!(ctx.block(&bid(6)).unwrap().unwrap().child_ids(), &[bid(7)]);
        assert_eq!(ctx.find_container(&proxy, "links", None).unwrap(), Some(bid(7)));

        let err = ctx
            .attach_block(Block::new_container(bid(6), page_id(), "again", None))
            .unwrap_err();
        assert!(matches!(err, TransformError::DuplicateBlock(_)));

        let err = ctx
            .attach_block(Block::new_container(bid(8), page_id(), "orphan", Some(bid(99))))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidPayload { .. }));
    }

    #[test]
    fn test_context_keeps_its_first_source() {
        let mut ctx = ResolutionContext::new();
        assert_eq!(ctx.source_kind(), None);

        ctx.bind_source(SourceKind::Live).unwrap();
        ctx.bind_source(SourceKind::Live).unwrap();

        let err = ctx.bind_source(SourceKind::Snapshot).unwrap_err();
        assert!(matches!(
            err,
            CmsError::SourceMismatch { bound: SourceKind::Live, requested: SourceKind::Snapshot }
        ));
        assert_eq!(ctx.source_kind(), Some(SourceKind::Live));
    }

    #[test]
    fn test_registering_binds_the_source() {
        let (mut ctx, proxy) = snapshot_context();

        assert_eq!(ctx.source_kind(), Some(proxy.source().kind()));
        assert!(ctx.bind_source(SourceKind::Live).is_err());
    }

    #[test]
    fn test_request_ids_differ() {
        assert_ne!(ResolutionContext::new().request_id(), ResolutionContext::new().request_id());
    }
}

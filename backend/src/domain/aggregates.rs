/// Domain aggregates
use super::base::{DomainError, DomainResult, Entity};
use super::entities::Block;
use super::page_key::PageKey;
use super::value_objects::{BlockId, PageAlias, PageId, PageUrl, RouteName, SiteId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The attributes of a page, without its blocks
#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    id: PageId,
    site_id: SiteId,
    parent_id: Option<PageId>,
    name: String,
    title: Option<String>,
    slug: Option<String>,
    url: Option<PageUrl>,
    route_name: Option<RouteName>,
    page_alias: Option<PageAlias>,
    template_code: String,
    request_method: Option<String>,
    enabled: bool,
    edited: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PageMeta {
    pub fn new(id: PageId, site_id: SiteId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        PageMeta {
            id,
            site_id,
            parent_id: None,
            name: name.into(),
            title: None,
            slug: None,
            url: None,
            route_name: None,
            page_alias: None,
            template_code: "default".to_string(),
            request_method: None,
            enabled: true,
            edited: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parent(mut self, parent_id: PageId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_url(mut self, url: PageUrl) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_route_name(mut self, route_name: RouteName) -> Self {
        self.route_name = Some(route_name);
        self
    }

    pub fn with_page_alias(mut self, page_alias: PageAlias) -> Self {
        self.page_alias = Some(page_alias);
        self
    }

    pub fn with_template_code(mut self, template_code: impl Into<String>) -> Self {
        self.template_code = template_code.into();
        self
    }

    pub fn with_request_method(mut self, request_method: impl Into<String>) -> Self {
        self.request_method = Some(request_method.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_edited(mut self, edited: bool) -> Self {
        self.edited = edited;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    pub fn parent_id(&self) -> Option<&PageId> {
        self.parent_id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn url(&self) -> Option<&PageUrl> {
        self.url.as_ref()
    }

    pub fn route_name(&self) -> Option<&RouteName> {
        self.route_name.as_ref()
    }

    pub fn page_alias(&self) -> Option<&PageAlias> {
        self.page_alias.as_ref()
    }

    pub fn template_code(&self) -> &str {
        &self.template_code
    }

    pub fn request_method(&self) -> Option<&str> {
        self.request_method.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_edited(&self) -> bool {
        self.edited
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Internal pages are only reachable through their reserved route name
    pub fn is_internal(&self) -> bool {
        self.route_name.as_ref().is_some_and(RouteName::is_internal)
    }

    pub fn set_edited(&mut self, edited: bool) {
        self.edited = edited;
        self.updated_at = Utc::now();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.updated_at = Utc::now();
    }

    /// Whether this page answers a lookup by `key`, optionally limited to one site
    pub fn matches(&self, site_id: Option<&SiteId>, key: &PageKey) -> bool {
        if site_id.is_some_and(|site| site != &self.site_id) {
            return false;
        }

        match key {
            PageKey::Id(id) => &self.id == id,
            PageKey::Url(url) => self.url.as_ref() == Some(url),
            PageKey::RouteName(route) | PageKey::InternalRoute(route) => {
                self.route_name.as_ref() == Some(route)
            }
            PageKey::Alias(alias) => self.page_alias.as_ref() == Some(alias),
            PageKey::Name(name) => &self.name == name,
        }
    }
}

/// A Page is an aggregate root that represents an editable document
/// It contains a tree of blocks and manages the relationships between them
#[derive(Debug, Clone)]
pub struct Page {
    meta: PageMeta,
    blocks: HashMap<BlockId, Block>,
    root_block_ids: Vec<BlockId>,
}

impl Page {
    /// Create a new page without blocks
    pub fn new(meta: PageMeta) -> Self {
        Page {
            meta,
            blocks: HashMap::new(),
            root_block_ids: Vec::new(),
        }
    }

    pub fn meta(&self) -> &PageMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut PageMeta {
        &mut self.meta
    }

    /// Add a block to the page
    ///
    /// A child is appended after its existing siblings; its parent must already be on the page.
    pub fn add_block(&mut self, block: Block) -> DomainResult<()> {
        let block_id = *block.id();
        let parent_id = block.parent_id().copied();

        if block.page_id() != self.meta.id() {
            return Err(DomainError::InvalidOperation(format!(
                "Block {} belongs to page {}, not {}",
                block_id,
                block.page_id(),
                self.meta.id()
            )));
        }

        if self.blocks.contains_key(&block_id) {
            return Err(DomainError::InvalidOperation(format!(
                "Block {} is already on page {}",
                block_id,
                self.meta.id()
            )));
        }

        // If block has a parent, verify the parent exists
        if let Some(ref pid) = parent_id {
            if !self.blocks.contains_key(pid) {
                return Err(DomainError::InvalidOperation(format!(
                    "Parent block {} does not exist",
                    pid
                )));
            }
        }

        self.blocks.insert(block_id, block);

        if let Some(pid) = parent_id {
            if let Some(parent) = self.blocks.get_mut(&pid) {
                parent.add_child(block_id);
            }
        } else if !self.root_block_ids.contains(&block_id) {
            self.root_block_ids.push(block_id);
        }

        Ok(())
    }

    /// Get a block by ID
    pub fn get_block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Get a mutable reference to a block by ID
    pub fn get_block_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    /// Remove a block and its whole subtree from the page
    pub fn remove_block(&mut self, id: &BlockId) -> DomainResult<()> {
        let block = self
            .blocks
            .get(id)
            .ok_or_else(|| DomainError::NotFound(format!("Block {} not found", id)))?;

        let parent_id = block.parent_id().copied();
        let subtree: Vec<BlockId> = self
            .get_descendants(id)
            .into_iter()
            .map(|block| *block.id())
            .collect();

        if let Some(parent_id) = parent_id {
            if let Some(parent) = self.blocks.get_mut(&parent_id) {
                parent.remove_child(id);
            }
        } else {
            self.root_block_ids.retain(|bid| bid != id);
        }

        for child_id in subtree {
            self.blocks.remove(&child_id);
        }
        self.blocks.remove(id);
        Ok(())
    }

    pub fn root_block_ids(&self) -> &[BlockId] {
        &self.root_block_ids
    }

    /// Get all root-level blocks, in display order
    pub fn root_blocks(&self) -> Vec<&Block> {
        self.root_block_ids
            .iter()
            .filter_map(|id| self.blocks.get(id))
            .collect()
    }

    /// Get the children of a block, in display order
    pub fn children(&self, id: &BlockId) -> Vec<&Block> {
        self.blocks
            .get(id)
            .map(|block| {
                block
                    .child_ids()
                    .iter()
                    .filter_map(|child_id| self.blocks.get(child_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get all blocks in the page, in no particular order
    pub fn all_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Get all ancestor blocks for a given block (from parent to root)
    pub fn get_ancestors(&self, block_id: &BlockId) -> Vec<&Block> {
        let mut ancestors = Vec::new();
        let mut current = self.blocks.get(block_id);

        while let Some(parent) = current
            .and_then(|block| block.parent_id())
            .and_then(|parent_id| self.blocks.get(parent_id))
        {
            ancestors.push(parent);
            current = Some(parent);
        }

        ancestors
    }

    /// Get all descendant blocks for a given block, depth first
    pub fn get_descendants(&self, block_id: &BlockId) -> Vec<&Block> {
        let mut descendants = Vec::new();
        let mut stack: Vec<&Block> = self.children(block_id).into_iter().rev().collect();

        while let Some(block) = stack.pop() {
            descendants.push(block);
            stack.extend(self.children(block.id()).into_iter().rev());
        }

        descendants
    }

    /// Find a container by code, anywhere on the page or among the direct children of `parent`
    pub fn find_container(&self, code: &str, parent: Option<&BlockId>) -> Option<&Block> {
        match parent {
            Some(parent_id) => self
                .children(parent_id)
                .into_iter()
                .find(|block| block.code() == Some(code)),
            None => {
                let mut stack: Vec<&Block> = self.root_blocks().into_iter().rev().collect();
                while let Some(block) = stack.pop() {
                    if block.code() == Some(code) {
                        return Some(block);
                    }
                    stack.extend(self.children(block.id()).into_iter().rev());
                }
                None
            }
        }
    }
}

impl Entity for Page {
    type Id = PageId;

    fn id(&self) -> &Self::Id {
        self.meta.id()
    }
}

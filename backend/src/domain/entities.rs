/// Domain entities
use super::base::Entity;
use super::page_key::PageKey;
use super::value_objects::{
    BlockId, BlockType, PageAlias, PageId, PageUrl, RouteName, SiteId, SnapshotId,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// A Block is a content unit placed on a page
/// Blocks form a tree: each block can have a parent and an ordered list of children
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    id: BlockId,
    page_id: PageId,
    parent_id: Option<BlockId>,
    child_ids: Vec<BlockId>,
    block_type: BlockType,
    name: Option<String>,
    code: Option<String>,
    settings: BTreeMap<String, Value>,
    enabled: bool,
    position: u32,
}

impl Block {
    /// Create a new root-level block
    pub fn new_root(id: BlockId, page_id: PageId, block_type: BlockType) -> Self {
        Block {
            id,
            page_id,
            parent_id: None,
            child_ids: Vec::new(),
            block_type,
            name: None,
            code: None,
            settings: BTreeMap::new(),
            enabled: true,
            position: 0,
        }
    }

    /// Create a new child block
    pub fn new_child(id: BlockId, page_id: PageId, parent_id: BlockId, block_type: BlockType) -> Self {
        Block {
            parent_id: Some(parent_id),
            ..Block::new_root(id, page_id, block_type)
        }
    }

    /// Create a named container block, optionally nested under `parent_id`
    pub fn new_container(
        id: BlockId,
        page_id: PageId,
        code: impl Into<String>,
        parent_id: Option<BlockId>,
    ) -> Self {
        let code = code.into();
        Block {
            parent_id,
            name: Some(code.clone()),
            code: Some(code),
            ..Block::new_root(id, page_id, BlockType::container())
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_settings(mut self, settings: BTreeMap<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    /// Get the block's ID
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Get the page this block belongs to
    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// Get the parent block ID, if any
    pub fn parent_id(&self) -> Option<&BlockId> {
        self.parent_id.as_ref()
    }

    /// Get the child block IDs, in display order
    pub fn child_ids(&self) -> &[BlockId] {
        &self.child_ids
    }

    pub fn block_type(&self) -> &BlockType {
        &self.block_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the container code, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    /// Check if this is a root-level block
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this block has children
    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }

    pub fn is_container(&self) -> bool {
        self.block_type.is_container()
    }

    /// Add a child block ID
    pub fn add_child(&mut self, child_id: BlockId) {
        if !self.child_ids.contains(&child_id) {
            self.child_ids.push(child_id);
        }
    }

    /// Remove a child block ID
    pub fn remove_child(&mut self, child_id: &BlockId) {
        self.child_ids.retain(|id| id != child_id);
    }

    /// Set the parent block ID
    pub fn set_parent(&mut self, parent_id: Option<BlockId>) {
        self.parent_id = parent_id;
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Entity for Block {
    type Id = BlockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A Site is a publishing scope; pages and snapshots belong to exactly one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    id: SiteId,
    name: String,
    host: String,
    relative_path: Option<String>,
    locale: Option<String>,
    enabled: bool,
    is_default: bool,
}

impl Site {
    pub fn new(id: SiteId, name: impl Into<String>, host: impl Into<String>) -> Self {
        Site {
            id,
            name: name.into(),
            host: host.into(),
            relative_path: None,
            locale: None,
            enabled: true,
            is_default: false,
        }
    }

    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn relative_path(&self) -> Option<&str> {
        self.relative_path.as_deref()
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

impl Entity for Site {
    type Id = SiteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A snapshot that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub page_id: PageId,
    pub site_id: SiteId,
    pub name: String,
    pub url: Option<PageUrl>,
    pub route_name: Option<RouteName>,
    pub page_alias: Option<PageAlias>,
    pub enabled: bool,
    pub publication_date_start: Option<DateTime<Utc>>,
    pub publication_date_end: Option<DateTime<Utc>>,
    pub content: Value,
    pub created_at: DateTime<Utc>,
}

/// An immutable, serialized capture of one page at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    id: SnapshotId,
    page_id: PageId,
    site_id: SiteId,
    name: String,
    url: Option<PageUrl>,
    route_name: Option<RouteName>,
    page_alias: Option<PageAlias>,
    enabled: bool,
    publication_date_start: Option<DateTime<Utc>>,
    publication_date_end: Option<DateTime<Utc>>,
    content: Value,
    created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Attach the storage-assigned id to a new snapshot
    pub fn from_new(id: SnapshotId, snapshot: NewSnapshot) -> Self {
        Snapshot {
            id,
            page_id: snapshot.page_id,
            site_id: snapshot.site_id,
            name: snapshot.name,
            url: snapshot.url,
            route_name: snapshot.route_name,
            page_alias: snapshot.page_alias,
            enabled: snapshot.enabled,
            publication_date_start: snapshot.publication_date_start,
            publication_date_end: snapshot.publication_date_end,
            content: snapshot.content,
            created_at: snapshot.created_at,
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn publication_date_start(&self) -> Option<DateTime<Utc>> {
        self.publication_date_start
    }

    pub fn publication_date_end(&self) -> Option<DateTime<Utc>> {
        self.publication_date_end
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn into_content(self) -> Value {
        self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether this snapshot is the servable version at `at`
    ///
    /// A snapshot that was never published (no start date) is never live.
    pub fn is_live_at(&self, at: DateTime<Utc>) -> bool {
        let started = self.publication_date_start.is_some_and(|start| start <= at);
        let not_ended = self.publication_date_end.map_or(true, |end| end >= at);
        self.enabled && started && not_ended
    }

    /// Whether this snapshot answers a lookup by `key`, optionally limited to one site
    pub fn matches(&self, site_id: Option<&SiteId>, key: &PageKey) -> bool {
        if site_id.is_some_and(|site| site != &self.site_id) {
            return false;
        }

        match key {
            PageKey::Id(id) => &self.page_id == id,
            PageKey::Url(url) => self.url.as_ref() == Some(url),
            PageKey::RouteName(route) | PageKey::InternalRoute(route) => {
                self.route_name.as_ref() == Some(route)
            }
            PageKey::Alias(alias) => self.page_alias.as_ref() == Some(alias),
            PageKey::Name(name) => &self.name == name,
        }
    }
}

impl Entity for Snapshot {
    type Id = SnapshotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

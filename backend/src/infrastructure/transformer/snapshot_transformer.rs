/// Snapshot transformer - turns pages into snapshot payloads and back
use super::payload::{BlockPayload, PagePayload};
use crate::domain::aggregates::{Page, PageMeta};
use crate::domain::base::DomainError;
use crate::domain::entities::{Block, NewSnapshot};
use crate::domain::value_objects::{
    BlockId, BlockType, PageAlias, PageId, PageUrl, RouteName, SiteId,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field '{field}' at {pointer}")]
    MissingField { field: &'static str, pointer: String },

    #[error("Invalid payload at {pointer}: {message}")]
    InvalidPayload { pointer: String, message: String },

    #[error("Block {0} appears more than once")]
    DuplicateBlock(BlockId),

    #[error("Block {block_id} references missing child {child_id}")]
    DanglingChild { block_id: BlockId, child_id: BlockId },

    #[error("Snapshot of page {expected} contains page {found}")]
    PageMismatch { expected: PageId, found: PageId },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

pub type TransformResult<T> = Result<T, TransformError>;

/// A block slice of a loaded payload that has not been decoded yet.
///
/// The payload is shared, so discovering a block only costs a pointer string.
#[derive(Debug, Clone)]
pub struct PendingBlock {
    id: BlockId,
    page_id: PageId,
    parent_id: Option<BlockId>,
    payload: Arc<Value>,
    pointer: String,
}

impl PendingBlock {
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn parent_id(&self) -> Option<&BlockId> {
        self.parent_id.as_ref()
    }

    /// JSON pointer of the block object inside the payload
    pub fn pointer(&self) -> &str {
        &self.pointer
    }
}

/// Result of loading a payload: the page header plus its undecoded roots
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub meta: PageMeta,
    pub roots: Vec<PendingBlock>,
}

/// Converts between live pages and serialized snapshot content
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Transformer
    }

    /// Serialize a page and its whole block tree.
    ///
    /// The tree is walked without recursion, so depth is bounded by memory
    /// only. Nodes are built children first and moved into their parent.
    pub fn dump(&self, page: &Page) -> TransformResult<Value> {
        let meta = page.meta();

        // Pre-order list of every block reachable from the roots
        let mut order: Vec<&Block> = Vec::with_capacity(page.block_count());
        let mut seen: HashSet<BlockId> = HashSet::with_capacity(page.block_count());
        let mut stack: Vec<(BlockId, Option<BlockId>)> = page
            .root_block_ids()
            .iter()
            .rev()
            .map(|id| (*id, None))
            .collect();

        while let Some((id, parent_id)) = stack.pop() {
            let block = page.get_block(&id).ok_or_else(|| match parent_id {
                Some(block_id) => TransformError::DanglingChild {
                    block_id,
                    child_id: id,
                },
                None => TransformError::InvalidPayload {
                    pointer: "/blocks".to_string(),
                    message: format!("root block {} is not on the page", id),
                },
            })?;
            if !seen.insert(id) {
                return Err(TransformError::DuplicateBlock(id));
            }
            order.push(block);
            stack.extend(block.child_ids().iter().rev().map(|child_id| (*child_id, Some(id))));
        }

        let mut built: HashMap<BlockId, Value> = HashMap::with_capacity(order.len());
        for block in order.into_iter().rev() {
            let children = Self::take_nodes(&mut built, block.child_ids());
            let node = Self::with_children(serde_json::to_value(Self::block_header(block))?, children);
            built.insert(*block.id(), node);
        }

        let header = PagePayload {
            id: meta.id().value(),
            parent_id: meta.parent_id().map(PageId::value),
            name: meta.name().to_string(),
            title: meta.title().map(str::to_string),
            slug: meta.slug().map(str::to_string),
            url: meta.url().map(|url| url.as_str().to_string()),
            route_name: meta.route_name().map(|route| route.as_str().to_string()),
            page_alias: meta.page_alias().map(|alias| alias.as_str().to_string()),
            template_code: meta.template_code().to_string(),
            request_method: meta.request_method().map(str::to_string),
            enabled: meta.is_enabled(),
            edited: meta.is_edited(),
            created_at: meta.created_at(),
            updated_at: meta.updated_at(),
        };
        let roots = Self::take_nodes(&mut built, page.root_block_ids());

        Ok(Self::with_children(serde_json::to_value(header)?, roots))
    }

    fn block_header(block: &Block) -> BlockPayload {
        BlockPayload {
            id: block.id().value(),
            name: block.name().map(str::to_string),
            block_type: block.block_type().as_str().to_string(),
            code: block.code().map(str::to_string),
            settings: block.settings().clone(),
            enabled: block.is_enabled(),
            position: block.position(),
        }
    }

    /// Remove already built nodes, in the given order
    fn take_nodes(built: &mut HashMap<BlockId, Value>, ids: &[BlockId]) -> Vec<Value> {
        ids.iter().filter_map(|id| built.remove(id)).collect()
    }

    fn with_children(mut node: Value, children: Vec<Value>) -> Value {
        if let Value::Object(fields) = &mut node {
            fields.insert("blocks".to_string(), Value::Array(children));
        }
        node
    }

    /// Build an unpublished snapshot of the page as it is now
    pub fn create(&self, page: &Page) -> TransformResult<NewSnapshot> {
        let content = self.dump(page)?;
        let meta = page.meta();

        Ok(NewSnapshot {
            page_id: *meta.id(),
            site_id: *meta.site_id(),
            name: meta.name().to_string(),
            url: meta.url().cloned(),
            route_name: meta.route_name().cloned(),
            page_alias: meta.page_alias().cloned(),
            enabled: meta.is_enabled(),
            publication_date_start: None,
            publication_date_end: None,
            content,
            created_at: Utc::now(),
        })
    }

    /// Decode the page header and list its root blocks without decoding them
    pub fn load(&self, site_id: SiteId, payload: Arc<Value>) -> TransformResult<LoadedPage> {
        let header = PagePayload::deserialize(payload.as_ref())?;
        let meta = Self::page_meta(site_id, header)?;
        let roots = Self::pending_children(&payload, "", *meta.id(), None)?;

        Ok(LoadedPage { meta, roots })
    }

    /// Decode one pending block, returning it with its children still pending
    pub fn decode_block(pending: &PendingBlock) -> TransformResult<(Block, Vec<PendingBlock>)> {
        let node = pending
            .payload
            .pointer(&pending.pointer)
            .ok_or_else(|| TransformError::InvalidPayload {
                pointer: pending.pointer.clone(),
                message: "block is no longer in the payload".to_string(),
            })?;

        let header = BlockPayload::deserialize(node)?;
        let block_type = BlockType::new(header.block_type)?;

        let mut block = match pending.parent_id {
            Some(parent_id) => Block::new_child(pending.id, pending.page_id, parent_id, block_type),
            None => Block::new_root(pending.id, pending.page_id, block_type),
        }
        .with_settings(header.settings)
        .with_enabled(header.enabled)
        .with_position(header.position);

        if let Some(name) = header.name {
            block = block.with_name(name);
        }
        if let Some(code) = header.code {
            block = block.with_code(code);
        }

        let children = Self::pending_children(
            &pending.payload,
            &pending.pointer,
            pending.page_id,
            Some(pending.id),
        )?;
        for child in &children {
            block.add_child(child.id);
        }

        Ok((block, children))
    }

    /// Decode a whole payload at once
    pub fn load_page(&self, site_id: SiteId, payload: &Value) -> TransformResult<Page> {
        let loaded = self.load(site_id, Arc::new(payload.clone()))?;
        let mut page = Page::new(loaded.meta);

        let mut queue: VecDeque<PendingBlock> = loaded.roots.into();
        while let Some(pending) = queue.pop_front() {
            if page.get_block(&pending.id).is_some() {
                return Err(TransformError::DuplicateBlock(pending.id));
            }
            let (block, children) = Self::decode_block(&pending)?;
            page.add_block(block)?;
            queue.extend(children);
        }

        Ok(page)
    }

    fn page_meta(site_id: SiteId, header: PagePayload) -> TransformResult<PageMeta> {
        let mut meta = PageMeta::new(PageId::new(header.id)?, site_id, header.name)
            .with_template_code(header.template_code)
            .with_enabled(header.enabled)
            .with_edited(header.edited)
            .with_timestamps(header.created_at, header.updated_at);

        if let Some(parent_id) = header.parent_id {
            meta = meta.with_parent(PageId::new(parent_id)?);
        }
        if let Some(title) = header.title {
            meta = meta.with_title(title);
        }
        if let Some(slug) = header.slug {
            meta = meta.with_slug(slug);
        }
        if let Some(url) = header.url {
            meta = meta.with_url(PageUrl::new(url)?);
        }
        if let Some(route_name) = header.route_name {
            meta = meta.with_route_name(RouteName::new(route_name)?);
        }
        if let Some(alias) = header.page_alias {
            meta = meta.with_page_alias(PageAlias::new(alias)?);
        }
        if let Some(method) = header.request_method {
            meta = meta.with_request_method(method);
        }

        Ok(meta)
    }

    /// List the children of the node at `pointer` as pending blocks
    fn pending_children(
        payload: &Arc<Value>,
        pointer: &str,
        page_id: PageId,
        parent_id: Option<BlockId>,
    ) -> TransformResult<Vec<PendingBlock>> {
        let location = if pointer.is_empty() { "/" } else { pointer };

        let node = payload
            .pointer(pointer)
            .ok_or_else(|| TransformError::InvalidPayload {
                pointer: location.to_string(),
                message: "node is missing".to_string(),
            })?;

        let items = node
            .get("blocks")
            .ok_or_else(|| TransformError::MissingField {
                field: "blocks",
                pointer: location.to_string(),
            })?
            .as_array()
            .ok_or_else(|| TransformError::InvalidPayload {
                pointer: location.to_string(),
                message: "'blocks' must be an array".to_string(),
            })?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let child_pointer = format!("{}/blocks/{}", pointer, index);
                let raw_id = item
                    .get("id")
                    .ok_or_else(|| TransformError::MissingField {
                        field: "id",
                        pointer: child_pointer.clone(),
                    })?
                    .as_i64()
                    .ok_or_else(|| TransformError::InvalidPayload {
                        pointer: child_pointer.clone(),
                        message: "'id' must be an integer".to_string(),
                    })?;

                Ok(PendingBlock {
                    id: BlockId::new(raw_id)?,
                    page_id,
                    parent_id,
                    payload: Arc::clone(payload),
                    pointer: child_pointer,
                })
            })
            .collect()
    }
}

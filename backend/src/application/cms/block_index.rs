/// Per-resolution arena of blocks, decoded on first access
use crate::domain::entities::Block;
use crate::domain::value_objects::BlockId;
use crate::infrastructure::transformer::{PendingBlock, TransformError, TransformResult, Transformer};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum BlockSlot {
    Pending(PendingBlock),
    Decoded(Block),
}

/// Blocks known to one resolution, keyed by id.
///
/// A slot starts pending (a pointer into a loaded payload) and is decoded at
/// most once. Decoding a block registers its children as new pending slots.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    order: Vec<BlockId>,
    slots: HashMap<BlockId, BlockSlot>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn is_decoded(&self, id: &BlockId) -> bool {
        matches!(self.slots.get(id), Some(BlockSlot::Decoded(_)))
    }

    /// Register a block discovered in a payload
    pub fn insert_pending(&mut self, pending: PendingBlock) -> TransformResult<()> {
        let id = *pending.id();
        if self.slots.contains_key(&id) {
            return Err(TransformError::DuplicateBlock(id));
        }

        self.order.push(id);
        self.slots.insert(id, BlockSlot::Pending(pending));
        Ok(())
    }

    /// Register an already built block. Returns false and keeps the existing
    /// slot when the id is known.
    pub fn insert_decoded(&mut self, block: Block) -> bool {
        let id = *block.id();
        if self.slots.contains_key(&id) {
            return false;
        }

        self.order.push(id);
        self.slots.insert(id, BlockSlot::Decoded(block));
        true
    }

    /// Make sure the block is decoded. Returns false for an unknown id.
    pub fn decode(&mut self, id: &BlockId) -> TransformResult<bool> {
        let (block, children) = match self.slots.get(id) {
            None => return Ok(false),
            Some(BlockSlot::Decoded(_)) => return Ok(true),
            Some(BlockSlot::Pending(pending)) => Transformer::decode_block(pending)?,
        };

        // All children are checked before any is registered, so a failed
        // decode leaves the index as it was
        let mut fresh = HashSet::with_capacity(children.len());
        for child in &children {
            let child_id = *child.id();
            if child_id == *id || self.slots.contains_key(&child_id) || !fresh.insert(child_id) {
                return Err(TransformError::DuplicateBlock(child_id));
            }
        }

        for child in children {
            self.insert_pending(child)?;
        }
        self.slots.insert(*id, BlockSlot::Decoded(block));
        Ok(true)
    }

    /// Look a block up, decoding it if needed
    pub fn resolve(&mut self, id: &BlockId) -> TransformResult<Option<&Block>> {
        if !self.decode(id)? {
            return Ok(None);
        }
        Ok(self.decoded(id))
    }

    pub fn decoded(&self, id: &BlockId) -> Option<&Block> {
        match self.slots.get(id) {
            Some(BlockSlot::Decoded(block)) => Some(block),
            _ => None,
        }
    }

    pub(crate) fn decoded_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        match self.slots.get_mut(id) {
            Some(BlockSlot::Decoded(block)) => Some(block),
            _ => None,
        }
    }

    /// Decode every block discovered so far and return them in discovery order.
    ///
    /// Children found while decoding are registered but stay pending.
    pub fn decoded_blocks(&mut self) -> TransformResult<Vec<&Block>> {
        let discovered: Vec<BlockId> = self.order.clone();
        for id in &discovered {
            self.decode(id)?;
        }

        Ok(discovered
            .iter()
            .filter_map(|id| self.decoded(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Page, PageMeta};
    use crate::domain::value_objects::{BlockType, PageId, SiteId};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    fn bid(id: i64) -> BlockId {
        BlockId::new(id).unwrap()
    }

    /// root(1) -> [child(2) -> [grandchild(3)]], plus root(4)
    fn loaded_roots() -> Vec<PendingBlock> {
        let page_id = PageId::new(7).unwrap();
        let text = BlockType::new("cms.block.text").unwrap();
        let mut page = Page::new(PageMeta::new(page_id, SiteId::new(1).unwrap(), "Index"));
        page.add_block(Block::new_root(bid(1), page_id, text.clone())).unwrap();
        page.add_block(Block::new_child(bid(2), page_id, bid(1), text.clone()))
            .unwrap();
        page.add_block(Block::new_child(bid(3), page_id, bid(2), text.clone()))
            .unwrap();
        page.add_block(Block::new_root(bid(4), page_id, text)).unwrap();

        let transformer = Transformer::new();
        let payload = Arc::new(transformer.dump(&page).unwrap());
        transformer
            .load(SiteId::new(1).unwrap(), payload)
            .unwrap()
            .roots
    }

    fn index() -> BlockIndex {
        let mut index = BlockIndex::new();
        for root in loaded_roots() {
            index.insert_pending(root).unwrap();
        }
        index
    }

    #[test]
    fn test_decoding_discovers_children() {
        let mut index = index();
        assert_eq!(index.len(), 2);
        assert!(!index.contains(&bid(2)));

        let root = index.resolve(&bid(1)).unwrap().unwrap();
        assert_eq!(root.child_ids(), &[bid(2)]);

        assert!(index.contains(&bid(2)));
        assert!(!index.is_decoded(&bid(2)));
        assert!(!index.contains(&bid(3)));
    }

    #[test]
    fn test_decode_happens_once() {
        let mut index = index();
        index.decode(&bid(1)).unwrap();
        index.decode(&bid(1)).unwrap();

        // decoding twice would have registered block 2 twice and failed
        assert_eq!(index.len(), 3);
        assert!(index.resolve(&bid(2)).unwrap().is_some());
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_unknown_block_is_none() {
        let mut index = index();
        assert!(index.resolve(&bid(3)).unwrap().is_none());
        assert!(index.resolve(&bid(99)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_pending_fails() {
        let mut index = index();
        let again = loaded_roots().remove(0);

        let err = index.insert_pending(again).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateBlock(id) if id == bid(1)));
    }

    #[test]
    fn test_insert_decoded_keeps_existing() {
        let mut index = index();
        let page_id = PageId::new(7).unwrap();
        let replacement = Block::new_container(bid(1), page_id, "other", None);

        assert!(!index.insert_decoded(replacement));
        assert_eq!(index.resolve(&bid(1)).unwrap().unwrap().code(), None);

        assert!(index.insert_decoded(Block::new_container(bid(50), page_id, "new", None)));
        assert!(index.is_decoded(&bid(50)));
    }

    #[test]
    fn test_decoded_blocks_in_discovery_order() {
        let mut index = index();

        let ids: Vec<BlockId> = index
            .decoded_blocks()
            .unwrap()
            .iter()
            .map(|block| *block.id())
            .collect();
        assert_eq!(ids, vec![bid(1), bid(4)]);

        let ids: Vec<BlockId> = index
            .decoded_blocks()
            .unwrap()
            .iter()
            .map(|block| *block.id())
            .collect();
        assert_eq!(ids, vec![bid(1), bid(4), bid(2)]);
    }

    #[test]
    fn test_failed_decode_registers_no_children() {
        let now = Utc::now();
        let leaf = |id: i64| json!({ "id": id, "type": "cms.block.text", "enabled": true, "position": 0, "blocks": [] });
        let payload = Arc::new(json!({
            "id": 7,
            "name": "Index",
            "template_code": "default",
            "enabled": true,
            "created_at": now,
            "updated_at": now,
            "blocks": [
                { "id": 1, "type": "cms.block.text", "enabled": true, "position": 0, "blocks": [leaf(5), leaf(4)] },
                leaf(4),
            ],
        }));
        let roots = Transformer::new()
            .load(SiteId::new(1).unwrap(), payload)
            .unwrap()
            .roots;

        let mut index = BlockIndex::new();
        for root in roots {
            index.insert_pending(root).unwrap();
        }

        let err = index.decode(&bid(1)).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateBlock(id) if id == bid(4)));
        assert!(!index.contains(&bid(5)));
        assert!(!index.is_decoded(&bid(1)));
        assert_eq!(index.len(), 2);

        // the slot is still pending, so a retry reports the same problem
        let err = index.decode(&bid(1)).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateBlock(id) if id == bid(4)));
    }
}

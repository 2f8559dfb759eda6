use crate::domain::base::DomainResult;
use crate::domain::entities::Block;
use crate::domain::value_objects::{BlockId, PageId};

/// What a new container needs: its page, its code and an optional parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOptions {
    pub page_id: PageId,
    pub code: String,
    pub parent_id: Option<BlockId>,
}

/// Creates blocks on behalf of the live manager
pub trait BlockInteractor {
    /// Build a new container block with a fresh id
    fn create_new_container(&mut self, options: ContainerOptions) -> DomainResult<Block>;
}

/// Hands out block ids from an increasing counter.
///
/// Start it after the highest block id already stored.
#[derive(Debug, Clone)]
pub struct SequentialBlockInteractor {
    next_id: i64,
}

impl SequentialBlockInteractor {
    pub fn starting_after(last: Option<BlockId>) -> Self {
        SequentialBlockInteractor {
            next_id: last.map_or(1, |id| id.value() + 1),
        }
    }
}

impl BlockInteractor for SequentialBlockInteractor {
    fn create_new_container(&mut self, options: ContainerOptions) -> DomainResult<Block> {
        let id = BlockId::new(self.next_id)?;
        self.next_id += 1;

        Ok(Block::new_container(
            id,
            options.page_id,
            options.code,
            options.parent_id,
        ))
    }
}

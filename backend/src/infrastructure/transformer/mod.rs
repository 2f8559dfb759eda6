/// Conversion between live pages and serialized snapshot payloads
mod payload;
mod snapshot_transformer;

pub use snapshot_transformer::{
    LoadedPage, PendingBlock, TransformError, TransformResult, Transformer,
};

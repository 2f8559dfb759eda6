// Domain layer module
pub mod aggregates;
pub mod base;
pub mod entities;
pub mod page_key;
pub mod value_objects;

pub use aggregates::*;
pub use base::*;
pub use entities::*;
pub use page_key::*;
pub use value_objects::*;

pub mod cleanup_service;
pub mod publish_service;

pub use cleanup_service::{
    CleanupCallback, CleanupError, CleanupEvent, CleanupResult, CleanupService, CleanupSummary,
};
pub use publish_service::{PublishError, PublishResult, PublishService, PublishSummary};

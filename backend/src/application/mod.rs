pub mod cms;
pub mod repositories;
pub mod services;

// Re-export key types to avoid naming conflicts
pub use cms::{
    CmsError, CmsManager, CmsManagerSelector, CmsPageManager, CmsResult, CmsSnapshotManager,
    PageProxy, PageSource, ResolutionContext, ServingMode,
};
pub use repositories::{PageRepository, SiteRepository, SnapshotRepository, UnitOfWork};
pub use services::{
    CleanupCallback, CleanupError, CleanupEvent, CleanupService, CleanupSummary, PublishError,
    PublishService, PublishSummary,
};

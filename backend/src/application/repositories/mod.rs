pub mod page_repository;
pub mod site_repository;
pub mod snapshot_repository;
pub mod unit_of_work;

pub use page_repository::PageRepository;
pub use site_repository::SiteRepository;
pub use snapshot_repository::{SnapshotQuery, SnapshotRepository};
pub use unit_of_work::UnitOfWork;

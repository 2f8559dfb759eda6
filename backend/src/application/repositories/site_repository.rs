use crate::domain::{entities::Site, value_objects::SiteId, DomainResult};

/// Repository trait for sites, the publishing scopes pages live in.
pub trait SiteRepository {
    /// Inserts or updates a site.
    fn save_site(&mut self, site: Site) -> DomainResult<()>;

    fn find_site(&self, id: &SiteId) -> DomainResult<Option<Site>>;

    fn find_all_sites(&self) -> DomainResult<Vec<Site>>;
}

use crate::domain::{
    aggregates::Page,
    page_key::PageKey,
    value_objects::{BlockId, PageId, SiteId},
    DomainResult,
};

/// Repository trait for managing live Page aggregates.
///
/// This trait defines the contract for persisting and retrieving editable pages
/// together with their block trees. Implementations can be backed by different
/// storage mechanisms (in-memory, database, etc.).
pub trait PageRepository {
    /// Saves a page and its full block tree.
    ///
    /// If a page with the same ID already exists, it is replaced, blocks included.
    fn save(&mut self, page: Page) -> DomainResult<()>;

    /// Finds a page by its unique identifier.
    ///
    /// Returns `Ok(Some(page))` if found, `Ok(None)` if not found,
    /// or an error if the operation fails.
    fn find_by_id(&self, id: &PageId) -> DomainResult<Option<Page>>;

    /// Finds the page answering `key`, limited to `site_id` when given.
    ///
    /// The enabled flag is not filtered here; callers decide what to serve.
    fn find_one_by(&self, site_id: Option<&SiteId>, key: &PageKey) -> DomainResult<Option<Page>>;

    /// Returns every page of a site.
    fn find_by_site(&self, site_id: &SiteId) -> DomainResult<Vec<Page>>;

    /// Deletes a page by its unique identifier.
    ///
    /// Returns `Ok(true)` if the page was deleted, `Ok(false)` if the page
    /// was not found, or an error if the operation fails.
    fn delete(&mut self, id: &PageId) -> DomainResult<bool>;

    /// Highest block id stored across all pages, if any block exists.
    fn last_block_id(&self) -> DomainResult<Option<BlockId>>;
}

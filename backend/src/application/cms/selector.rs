use super::CmsManager;

/// Which audience a request is served for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServingMode {
    /// Visitors see published snapshots only
    #[default]
    Public,
    /// Editors see the live, unpublished state of their pages
    Preview,
}

/// Picks the manager for a request: snapshots for the public, live pages for previews
pub struct CmsManagerSelector<'a> {
    snapshot_manager: Box<dyn CmsManager + 'a>,
    page_manager: Box<dyn CmsManager + 'a>,
}

impl<'a> CmsManagerSelector<'a> {
    pub fn new(snapshot_manager: Box<dyn CmsManager + 'a>, page_manager: Box<dyn CmsManager + 'a>) -> Self {
        Self {
            snapshot_manager,
            page_manager,
        }
    }

    pub fn retrieve(&self, mode: ServingMode) -> &(dyn CmsManager + 'a) {
        match mode {
            ServingMode::Public => self.snapshot_manager.as_ref(),
            ServingMode::Preview => self.page_manager.as_ref(),
        }
    }
}

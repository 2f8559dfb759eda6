/// Value objects for the domain layer
use super::base::{DomainError, DomainResult, ValueObject};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Prefix carried by every stored page alias
pub const PAGE_ALIAS_PREFIX: &str = "_page_alias_";

/// Prefix of route names reserved for internal (non-addressable) pages
pub const INTERNAL_ROUTE_PREFIX: &str = "_page_internal_";

/// Block type used for named containers
pub const CONTAINER_BLOCK_TYPE: &str = "cms.block.container";

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(i64);

        impl $name {
            pub fn new(id: i64) -> DomainResult<Self> {
                if id <= 0 {
                    return Err(DomainError::InvalidValue(format!(
                        "{} must be positive, got {}",
                        $label, id
                    )));
                }
                Ok($name(id))
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl ValueObject for $name {}

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Unique identifier for a Site
    SiteId,
    "SiteId"
);

numeric_id!(
    /// Unique identifier for a Page
    PageId,
    "PageId"
);

numeric_id!(
    /// Unique identifier for a Block
    BlockId,
    "BlockId"
);

numeric_id!(
    /// Unique identifier for a Snapshot, increasing in creation order
    SnapshotId,
    "SnapshotId"
);

fn route_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("route name pattern is valid"))
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/[^\s?#]*$").expect("url pattern is valid"))
}

/// The public path a page is served under, relative to its site (e.g. `/about/team`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageUrl {
    value: String,
}

impl PageUrl {
    pub fn new(url: impl Into<String>) -> DomainResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(DomainError::InvalidValue("URL cannot be empty".to_string()));
        }

        if !url_pattern().is_match(&url) {
            return Err(DomainError::InvalidValue(format!(
                "URL must be an absolute path without query or fragment: {}",
                url
            )));
        }

        Ok(PageUrl { value: url })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_root(&self) -> bool {
        self.value == "/"
    }
}

impl ValueObject for PageUrl {}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A named route a page is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteName {
    value: String,
}

impl RouteName {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidValue("Route name cannot be empty".to_string()));
        }

        if !route_name_pattern().is_match(&name) {
            return Err(DomainError::InvalidValue(format!(
                "Route name contains invalid characters: {}",
                name
            )));
        }

        Ok(RouteName { value: name })
    }

    /// Build the reserved route name of an internal page (`footer` -> `_page_internal_footer`)
    pub fn internal(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidValue(
                "Internal route name cannot be empty".to_string(),
            ));
        }

        if name.starts_with(INTERNAL_ROUTE_PREFIX) {
            return RouteName::new(name);
        }

        RouteName::new(format!("{}{}", INTERNAL_ROUTE_PREFIX, name))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_internal(&self) -> bool {
        self.value.starts_with(INTERNAL_ROUTE_PREFIX)
    }
}

impl ValueObject for RouteName {}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A stable alias for a page, always stored with the `_page_alias_` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageAlias {
    value: String,
}

impl PageAlias {
    /// Create an alias, adding the prefix when the caller passed a bare name
    pub fn new(alias: impl Into<String>) -> DomainResult<Self> {
        let alias = alias.into();
        let value = if alias.starts_with(PAGE_ALIAS_PREFIX) {
            alias
        } else {
            format!("{}{}", PAGE_ALIAS_PREFIX, alias)
        };

        if value.len() == PAGE_ALIAS_PREFIX.len() {
            return Err(DomainError::InvalidValue("Page alias cannot be empty".to_string()));
        }

        if value.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidValue(format!(
                "Page alias cannot contain whitespace: {}",
                value
            )));
        }

        Ok(PageAlias { value })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The alias without its prefix
    pub fn short_name(&self) -> &str {
        &self.value[PAGE_ALIAS_PREFIX.len()..]
    }
}

impl ValueObject for PageAlias {}

impl fmt::Display for PageAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// The type identifier of a block (which service renders it)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockType {
    value: String,
}

impl BlockType {
    pub fn new(block_type: impl Into<String>) -> DomainResult<Self> {
        let value = block_type.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidValue("Block type cannot be empty".to_string()));
        }
        Ok(BlockType { value })
    }

    pub fn container() -> Self {
        BlockType {
            value: CONTAINER_BLOCK_TYPE.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_container(&self) -> bool {
        self.value == CONTAINER_BLOCK_TYPE
    }
}

impl ValueObject for BlockType {}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

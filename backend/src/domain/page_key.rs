/// Typed lookup keys for page resolution
use super::base::{DomainResult, ValueObject};
use super::value_objects::{
    PageAlias, PageId, PageUrl, RouteName, INTERNAL_ROUTE_PREFIX, PAGE_ALIAS_PREFIX,
};
use std::fmt;

/// The different ways a caller can ask for a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageKey {
    Id(PageId),
    Url(PageUrl),
    RouteName(RouteName),
    Alias(PageAlias),
    /// Route name of an internal page, already carrying the internal prefix
    InternalRoute(RouteName),
    Name(String),
}

impl PageKey {
    /// Build a key from an untyped value.
    ///
    /// Precedence, first match wins:
    /// 1. a leading `/` is a URL
    /// 2. the `_page_alias_` prefix is an alias
    /// 3. the `_page_internal_` prefix is an internal route
    /// 4. a string made only of ASCII digits is a page id
    /// 5. anything else is a route name
    ///
    /// Use the variants directly to look up a route name that is only digits.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.starts_with('/') {
            return Ok(PageKey::Url(PageUrl::new(raw)?));
        }

        if raw.starts_with(PAGE_ALIAS_PREFIX) {
            return Ok(PageKey::Alias(PageAlias::new(raw)?));
        }

        if raw.starts_with(INTERNAL_ROUTE_PREFIX) {
            return Ok(PageKey::InternalRoute(RouteName::internal(raw)?));
        }

        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<i64>() {
                return Ok(PageKey::Id(PageId::new(id)?));
            }
        }

        Ok(PageKey::RouteName(RouteName::new(raw)?))
    }

    /// Short label of the key kind, used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            PageKey::Id(_) => "id",
            PageKey::Url(_) => "url",
            PageKey::RouteName(_) => "route",
            PageKey::Alias(_) => "alias",
            PageKey::InternalRoute(_) => "internal route",
            PageKey::Name(_) => "name",
        }
    }
}

impl ValueObject for PageKey {}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Id(id) => write!(f, "{} {}", self.kind(), id),
            PageKey::Url(url) => write!(f, "{} {}", self.kind(), url),
            PageKey::RouteName(route) | PageKey::InternalRoute(route) => {
                write!(f, "{} {}", self.kind(), route)
            }
            PageKey::Alias(alias) => write!(f, "{} {}", self.kind(), alias),
            PageKey::Name(name) => write!(f, "{} {}", self.kind(), name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        let key = PageKey::parse("/contact").unwrap();
        assert_eq!(key, PageKey::Url(PageUrl::new("/contact").unwrap()));
        assert_eq!(key.kind(), "url");
    }

    #[test]
    fn test_parse_numeric_is_id() {
        let key = PageKey::parse("12").unwrap();
        assert_eq!(key, PageKey::Id(PageId::new(12).unwrap()));
    }

    #[test]
    fn test_parse_prefixed_values() {
        let alias = PageKey::parse("_page_alias_42").unwrap();
        assert_eq!(alias, PageKey::Alias(PageAlias::new("42").unwrap()));

        let internal = PageKey::parse("_page_internal_footer").unwrap();
        assert_eq!(
            internal,
            PageKey::InternalRoute(RouteName::internal("footer").unwrap())
        );
    }

    #[test]
    fn test_parse_falls_back_to_route_name() {
        let key = PageKey::parse("homepage").unwrap();
        assert_eq!(key, PageKey::RouteName(RouteName::new("homepage").unwrap()));

        assert!(PageKey::parse("").is_err());
        assert!(PageKey::parse("0").is_err());
    }

    #[test]
    fn test_display() {
        let key = PageKey::Name("Team".to_string());
        assert_eq!(key.to_string(), "name Team");
    }
}

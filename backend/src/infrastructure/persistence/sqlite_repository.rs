use crate::application::repositories::{SiteRepository, UnitOfWork};
use crate::domain::base::{DomainError, Entity};
use crate::domain::entities::Site;
use crate::domain::value_objects::SiteId;
use crate::domain::DomainResult;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

/// SQLite-backed store for sites, pages and snapshots.
///
/// One connection serves every repository trait, so writes made through
/// different traits between `begin` and `commit` share one transaction.
pub struct SqliteRepository {
    pub(super) conn: Connection,
}

impl SqliteRepository {
    /// Create a new SQLite repository with the given connection
    pub fn new(conn: Connection) -> SqliteResult<Self> {
        super::schema::initialize_database(&conn)?;
        Ok(SqliteRepository { conn })
    }

    /// Create a new in-memory SQLite repository (useful for testing)
    pub fn new_in_memory() -> SqliteResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Create a new file-based SQLite repository
    pub fn new_with_path(path: impl AsRef<std::path::Path>) -> SqliteResult<Self> {
        Self::new(Connection::open(path)?)
    }

    /// Whether a unit of work is currently open
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

pub(super) fn db_error(e: rusqlite::Error) -> DomainError {
    DomainError::InvalidOperation(format!("Database error: {}", e))
}

/// Wrap a domain validation failure raised while mapping a row
pub(super) fn conversion_error(e: DomainError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

pub(super) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(super) fn from_millis(millis: i64) -> SqliteResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        conversion_error(DomainError::InvalidValue(format!(
            "Timestamp out of range: {}",
            millis
        )))
    })
}

impl UnitOfWork for SqliteRepository {
    fn begin(&mut self) -> DomainResult<()> {
        if self.in_transaction() {
            return Err(DomainError::InvalidOperation(
                "A unit of work is already open".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(db_error)
    }

    fn commit(&mut self) -> DomainResult<()> {
        self.conn.execute_batch("COMMIT").map_err(db_error)
    }

    fn rollback(&mut self) -> DomainResult<()> {
        self.conn.execute_batch("ROLLBACK").map_err(db_error)
    }
}

fn site_from_row(row: &Row) -> SqliteResult<Site> {
    let id = SiteId::new(row.get(0)?).map_err(conversion_error)?;
    let mut site = Site::new(id, row.get::<_, String>(1)?, row.get::<_, String>(2)?)
        .with_enabled(row.get(5)?)
        .with_default(row.get(6)?);

    if let Some(relative_path) = row.get::<_, Option<String>>(3)? {
        site = site.with_relative_path(relative_path);
    }
    if let Some(locale) = row.get::<_, Option<String>>(4)? {
        site = site.with_locale(locale);
    }

    Ok(site)
}

impl SiteRepository for SqliteRepository {
    fn save_site(&mut self, site: Site) -> DomainResult<()> {
        self.conn
            .execute(
                "INSERT INTO sites (id, name, host, relative_path, locale, enabled, is_default)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    host = excluded.host,
                    relative_path = excluded.relative_path,
                    locale = excluded.locale,
                    enabled = excluded.enabled,
                    is_default = excluded.is_default",
                params![
                    site.id().value(),
                    site.name(),
                    site.host(),
                    site.relative_path(),
                    site.locale(),
                    site.is_enabled(),
                    site.is_default(),
                ],
            )
            .map_err(db_error)?;

        Ok(())
    }

    fn find_site(&self, id: &SiteId) -> DomainResult<Option<Site>> {
        self.conn
            .query_row(
                "SELECT id, name, host, relative_path, locale, enabled, is_default
                 FROM sites WHERE id = ?1",
                params![id.value()],
                site_from_row,
            )
            .optional()
            .map_err(db_error)
    }

    fn find_all_sites(&self) -> DomainResult<Vec<Site>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, host, relative_path, locale, enabled, is_default
                 FROM sites ORDER BY id",
            )
            .map_err(db_error)?;

        let sites = stmt
            .query_map([], site_from_row)
            .map_err(db_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(db_error)?;

        Ok(sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site(id: i64) -> Site {
        Site::new(SiteId::new(id).unwrap(), format!("Site {}", id), "example.org")
    }

    #[test]
    fn test_save_and_find_site() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        let site = site(1).with_locale("en").with_default(true);

        repo.save_site(site.clone()).unwrap();

        let loaded = repo.find_site(&SiteId::new(1).unwrap()).unwrap().unwrap();
        assert_eq!(loaded, site);
        assert!(repo.find_site(&SiteId::new(2).unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_save_site_updates_in_place() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        repo.save_site(site(1)).unwrap();
        repo.save_site(site(2)).unwrap();
        repo.save_site(site(1).with_enabled(false)).unwrap();

        let sites = repo.find_all_sites().unwrap();
        assert_eq!(sites.len(), 2);
        assert!(!sites[0].is_enabled());
        assert!(sites[1].is_enabled());
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();

        repo.begin().unwrap();
        assert!(repo.in_transaction());
        repo.save_site(site(1)).unwrap();
        repo.rollback().unwrap();

        assert!(!repo.in_transaction());
        assert!(repo.find_all_sites().unwrap().is_empty());

        repo.begin().unwrap();
        repo.save_site(site(1)).unwrap();
        repo.commit().unwrap();
        assert_eq!(repo.find_all_sites().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_begin_fails() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        repo.begin().unwrap();

        assert!(repo.begin().is_err());
        repo.rollback().unwrap();
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cms.sqlite");

        {
            let mut repo = SqliteRepository::new_with_path(&path).unwrap();
            repo.save_site(site(3)).unwrap();
        }

        let repo = SqliteRepository::new_with_path(&path).unwrap();
        let loaded = repo.find_site(&SiteId::new(3).unwrap()).unwrap().unwrap();
        assert_eq!(loaded.name(), "Site 3");
    }

    #[test]
    fn test_millis_round_trip() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(from_millis(to_millis(at)).unwrap(), at);
    }
}

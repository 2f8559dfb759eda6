use super::sqlite_repository::{conversion_error, db_error, from_millis, to_millis, SqliteRepository};
use crate::application::repositories::{SnapshotQuery, SnapshotRepository};
use crate::domain::base::DomainError;
use crate::domain::entities::{NewSnapshot, Snapshot};
use crate::domain::page_key::PageKey;
use crate::domain::value_objects::{
    PageAlias, PageId, PageUrl, RouteName, SiteId, SnapshotId,
};
use crate::domain::DomainResult;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const SNAPSHOT_COLUMNS: &str = "id, page_id, site_id, name, url, route_name, page_alias, enabled,
    publication_date_start, publication_date_end, content, created_at";

/// Condition shared by every query selecting the live snapshot at ?1
const LIVE_AT: &str = "enabled = 1
    AND publication_date_start IS NOT NULL
    AND publication_date_start <= ?1
    AND (publication_date_end IS NULL OR publication_date_end >= ?1)";

/// Column and bound value answering a snapshot lookup
fn snapshot_key_filter(key: &PageKey) -> (&'static str, SqlValue) {
    match key {
        PageKey::Id(id) => ("page_id", id.value().into()),
        PageKey::Url(url) => ("url", url.as_str().to_string().into()),
        PageKey::RouteName(route) | PageKey::InternalRoute(route) => {
            ("route_name", route.as_str().to_string().into())
        }
        PageKey::Alias(alias) => ("page_alias", alias.as_str().to_string().into()),
        PageKey::Name(name) => ("name", name.clone().into()),
    }
}

/// Parse a stored payload.
///
/// Every block level nests two JSON containers, so serde_json's default
/// recursion limit would reject pages a few dozen blocks deep. The limit is
/// lifted and the stack grows on demand instead.
fn decode_content(text: &str) -> serde_json::Result<Value> {
    let mut json = serde_json::Deserializer::from_str(text);
    json.disable_recursion_limit();

    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(value)
}

fn encode_content(content: &Value) -> SqliteResult<String> {
    serde_json::to_string(content).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn snapshot_from_row(row: &Row) -> SqliteResult<Snapshot> {
    let id = SnapshotId::new(row.get(0)?).map_err(conversion_error)?;

    let new = NewSnapshot {
        page_id: PageId::new(row.get(1)?).map_err(conversion_error)?,
        site_id: SiteId::new(row.get(2)?).map_err(conversion_error)?,
        name: row.get(3)?,
        url: row
            .get::<_, Option<String>>(4)?
            .map(PageUrl::new)
            .transpose()
            .map_err(conversion_error)?,
        route_name: row
            .get::<_, Option<String>>(5)?
            .map(RouteName::new)
            .transpose()
            .map_err(conversion_error)?,
        page_alias: row
            .get::<_, Option<String>>(6)?
            .map(PageAlias::new)
            .transpose()
            .map_err(conversion_error)?,
        enabled: row.get(7)?,
        publication_date_start: row
            .get::<_, Option<i64>>(8)?
            .map(from_millis)
            .transpose()?,
        publication_date_end: row
            .get::<_, Option<i64>>(9)?
            .map(from_millis)
            .transpose()?,
        content: decode_content(&row.get::<_, String>(10)?)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?,
        created_at: from_millis(row.get(11)?)?,
    };

    Ok(Snapshot::from_new(id, new))
}

impl SqliteRepository {
    /// Id of the snapshot serving the page at `at`, if any
    fn live_snapshot_id(&self, page_id: &PageId, at: DateTime<Utc>) -> SqliteResult<Option<i64>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT id FROM snapshots WHERE {} AND page_id = ?2
                     ORDER BY publication_date_start DESC, id DESC LIMIT 1",
                    LIVE_AT
                ),
                params![to_millis(at), page_id.value()],
                |row| row.get(0),
            )
            .optional()
    }

    fn publish_in_savepoint(&mut self, ids: &[SnapshotId], at: DateTime<Utc>) -> DomainResult<()> {
        let at = to_millis(at);
        let sp = self.conn.savepoint().map_err(db_error)?;

        for id in ids {
            let page_id: i64 = sp
                .query_row(
                    "SELECT page_id FROM snapshots WHERE id = ?1",
                    params![id.value()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)?
                .ok_or_else(|| DomainError::NotFound(format!("Snapshot {}", id)))?;

            // Close the window of whatever else is currently open for the page
            sp.execute(
                "UPDATE snapshots SET publication_date_end = ?1
                 WHERE page_id = ?2 AND id != ?3
                   AND publication_date_start IS NOT NULL
                   AND (publication_date_end IS NULL OR publication_date_end > ?1)",
                params![at, page_id, id.value()],
            )
            .map_err(db_error)?;

            sp.execute(
                "UPDATE snapshots SET publication_date_start = ?1, publication_date_end = NULL
                 WHERE id = ?2",
                params![at, id.value()],
            )
            .map_err(db_error)?;
        }

        sp.commit().map_err(db_error)
    }
}

impl SnapshotRepository for SqliteRepository {
    fn save_snapshot(&mut self, snapshot: NewSnapshot) -> DomainResult<Snapshot> {
        let content = encode_content(&snapshot.content).map_err(db_error)?;
        self.conn
            .execute(
                "INSERT INTO snapshots (page_id, site_id, name, url, route_name, page_alias, enabled,
                    publication_date_start, publication_date_end, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    snapshot.page_id.value(),
                    snapshot.site_id.value(),
                    snapshot.name,
                    snapshot.url.as_ref().map(PageUrl::as_str),
                    snapshot.route_name.as_ref().map(RouteName::as_str),
                    snapshot.page_alias.as_ref().map(PageAlias::as_str),
                    snapshot.enabled,
                    snapshot.publication_date_start.map(to_millis),
                    snapshot.publication_date_end.map(to_millis),
                    content,
                    to_millis(snapshot.created_at),
                ],
            )
            .map_err(db_error)?;

        let id = SnapshotId::new(self.conn.last_insert_rowid())?;
        debug!(snapshot_id = %id, page_id = %snapshot.page_id, "Saved snapshot");

        Ok(Snapshot::from_new(id, snapshot))
    }

    fn publish_snapshots(&mut self, ids: &[SnapshotId], at: DateTime<Utc>) -> DomainResult<()> {
        self.publish_in_savepoint(ids, at)
    }

    fn find_enabled_snapshot(&self, query: &SnapshotQuery) -> DomainResult<Option<Snapshot>> {
        let (column, value) = snapshot_key_filter(&query.key);
        let sql = format!(
            "SELECT {} FROM snapshots
             WHERE {} AND {} = ?2 AND (?3 IS NULL OR site_id = ?3)
             ORDER BY publication_date_start DESC, id DESC
             LIMIT 1",
            SNAPSHOT_COLUMNS, LIVE_AT, column
        );

        self.conn
            .query_row(
                &sql,
                params![to_millis(query.at), value, query.site_id.map(|id| id.value())],
                snapshot_from_row,
            )
            .optional()
            .map_err(db_error)
    }

    fn find_snapshots_by_page(&self, page_id: &PageId) -> DomainResult<Vec<Snapshot>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM snapshots WHERE page_id = ?1 ORDER BY id DESC",
                SNAPSHOT_COLUMNS
            ))
            .map_err(db_error)?;

        let snapshots = stmt
            .query_map(params![page_id.value()], snapshot_from_row)
            .map_err(db_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(db_error)?;

        Ok(snapshots)
    }

    fn cleanup(&mut self, page_id: &PageId, keep: usize) -> DomainResult<usize> {
        let active = self
            .live_snapshot_id(page_id, Utc::now())
            .map_err(db_error)?
            .unwrap_or(0);
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);

        let deleted = self
            .conn
            .execute(
                "DELETE FROM snapshots
                 WHERE page_id = ?1
                   AND id != ?3
                   AND id NOT IN (
                       SELECT id FROM snapshots WHERE page_id = ?1 ORDER BY id DESC LIMIT ?2
                   )",
                params![page_id.value(), keep, active],
            )
            .map_err(db_error)?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::base::Entity;
    use chrono::Duration;
    use serde_json::json;

    fn site_id() -> SiteId {
        SiteId::new(1).unwrap()
    }

    fn page_id() -> PageId {
        PageId::new(4).unwrap()
    }

    fn new_snapshot(page: PageId, url: &str) -> NewSnapshot {
        NewSnapshot {
            page_id: page,
            site_id: site_id(),
            name: "Blog".to_string(),
            url: Some(PageUrl::new(url).unwrap()),
            route_name: Some(RouteName::new("blog").unwrap()),
            page_alias: None,
            enabled: true,
            publication_date_start: None,
            publication_date_end: None,
            content: json!({ "id": page.value(), "blocks": [] }),
            created_at: Utc::now(),
        }
    }

    fn url_query(url: &str) -> SnapshotQuery {
        SnapshotQuery::new(Some(site_id()), PageKey::Url(PageUrl::new(url).unwrap()))
    }

    fn ids(snapshots: &[Snapshot]) -> Vec<i64> {
        snapshots.iter().map(|snapshot| snapshot.id().value()).collect()
    }

    #[test]
    fn test_save_assigns_increasing_ids() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();

        let first = repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        let second = repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();

        assert!(second.id() > first.id());
        assert_eq!(second.content(), &json!({ "id": 4, "blocks": [] }));
        assert_eq!(ids(&repo.find_snapshots_by_page(&page_id()).unwrap()), vec![2, 1]);
    }

    #[test]
    fn test_unpublished_snapshot_is_not_served() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();

        assert!(repo.find_enabled_snapshot(&url_query("/blog")).unwrap().is_none());
    }

    #[test]
    fn test_publish_serves_newest() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        let now = Utc::now();

        let first = repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        repo.publish_snapshots(&[*first.id()], now - Duration::hours(2))
            .unwrap();

        let second = repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        repo.publish_snapshots(&[*second.id()], now - Duration::hours(1))
            .unwrap();

        let found = repo.find_enabled_snapshot(&url_query("/blog")).unwrap().unwrap();
        assert_eq!(found.id(), second.id());

        // the first one is closed, but was live before the second was published
        let earlier = url_query("/blog").at(now - Duration::minutes(90));
        let found = repo.find_enabled_snapshot(&earlier).unwrap().unwrap();
        assert_eq!(found.id(), first.id());
        assert!(found.publication_date_end().is_some());
    }

    #[test]
    fn test_publish_unknown_snapshot_fails() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        let err = repo
            .publish_snapshots(&[SnapshotId::new(99).unwrap()], Utc::now())
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn test_find_respects_key_site_and_enabled() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        let at = Utc::now() - Duration::minutes(5);

        let blog = repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        let mut hidden = new_snapshot(PageId::new(5).unwrap(), "/hidden");
        hidden.enabled = false;
        let hidden = repo.save_snapshot(hidden).unwrap();
        repo.publish_snapshots(&[*blog.id(), *hidden.id()], at).unwrap();

        let by_route = SnapshotQuery::new(
            Some(site_id()),
            PageKey::RouteName(RouteName::new("blog").unwrap()),
        );
        assert!(repo.find_enabled_snapshot(&by_route).unwrap().is_some());

        let by_id = SnapshotQuery::new(None, PageKey::Id(page_id()));
        assert_eq!(
            repo.find_enabled_snapshot(&by_id).unwrap().unwrap().id(),
            blog.id()
        );

        let other_site = SnapshotQuery::new(
            Some(SiteId::new(2).unwrap()),
            PageKey::Url(PageUrl::new("/blog").unwrap()),
        );
        assert!(repo.find_enabled_snapshot(&other_site).unwrap().is_none());
        assert!(repo.find_enabled_snapshot(&url_query("/hidden")).unwrap().is_none());
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        for _ in 0..5 {
            repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        }
        repo.save_snapshot(new_snapshot(PageId::new(8).unwrap(), "/other"))
            .unwrap();

        assert_eq!(repo.cleanup(&page_id(), 2).unwrap(), 3);
        assert_eq!(ids(&repo.find_snapshots_by_page(&page_id()).unwrap()), vec![5, 4]);

        // idempotent, and other pages are untouched
        assert_eq!(repo.cleanup(&page_id(), 2).unwrap(), 0);
        assert_eq!(repo.find_snapshots_by_page(&PageId::new(8).unwrap()).unwrap().len(), 1);

        assert_eq!(repo.cleanup(&page_id(), 10).unwrap(), 0);
        assert_eq!(repo.cleanup(&page_id(), 0).unwrap(), 2);
    }

    #[test]
    fn test_cleanup_keeps_active_snapshot() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();
        let active = repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        repo.publish_snapshots(&[*active.id()], Utc::now() - Duration::hours(1))
            .unwrap();
        for _ in 0..3 {
            repo.save_snapshot(new_snapshot(page_id(), "/blog")).unwrap();
        }

        assert_eq!(repo.cleanup(&page_id(), 1).unwrap(), 2);
        assert_eq!(ids(&repo.find_snapshots_by_page(&page_id()).unwrap()), vec![4, 1]);

        assert_eq!(repo.cleanup(&page_id(), 0).unwrap(), 1);
        assert_eq!(ids(&repo.find_snapshots_by_page(&page_id()).unwrap()), vec![1]);
    }

    #[test]
    fn test_deep_content_survives_storage() {
        let mut repo = SqliteRepository::new_in_memory().unwrap();

        // 200 nested blocks is 400 nested JSON containers
        let mut node = json!({ "id": 200, "blocks": [] });
        for id in (1..200).rev() {
            let mut parent = serde_json::Map::new();
            parent.insert("id".to_string(), json!(id));
            parent.insert("blocks".to_string(), Value::Array(vec![node]));
            node = Value::Object(parent);
        }

        let mut snapshot = new_snapshot(page_id(), "/blog");
        snapshot.content = node.clone();
        let saved = repo.save_snapshot(snapshot).unwrap();
        repo.publish_snapshots(&[*saved.id()], Utc::now() - Duration::minutes(1))
            .unwrap();

        let found = repo.find_enabled_snapshot(&url_query("/blog")).unwrap().unwrap();
        assert_eq!(found.content(), &node);
    }

    #[test]
    fn test_decode_content_rejects_trailing_data() {
        assert!(decode_content(r#"{"id": 1, "blocks": []}"#).is_ok());
        assert!(decode_content(r#"{"id": 1, "blocks": []} {}"#).is_err());
        assert!(decode_content("{").is_err());
    }
}

use super::sqlite_repository::{conversion_error, db_error, from_millis, to_millis, SqliteRepository};
use crate::application::repositories::PageRepository;
use crate::domain::aggregates::{Page, PageMeta};
use crate::domain::entities::Block;
use crate::domain::page_key::PageKey;
use crate::domain::value_objects::{
    BlockId, BlockType, PageAlias, PageId, PageUrl, RouteName, SiteId,
};
use crate::domain::DomainResult;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};

const PAGE_COLUMNS: &str = "id, site_id, parent_id, name, title, slug, url, route_name, page_alias,
    template_code, request_method, enabled, edited, created_at, updated_at";

/// Column and bound value answering a page lookup
fn page_key_filter(key: &PageKey) -> (&'static str, rusqlite::types::Value) {
    match key {
        PageKey::Id(id) => ("id", id.value().into()),
        PageKey::Url(url) => ("url", url.as_str().to_string().into()),
        PageKey::RouteName(route) | PageKey::InternalRoute(route) => {
            ("route_name", route.as_str().to_string().into())
        }
        PageKey::Alias(alias) => ("page_alias", alias.as_str().to_string().into()),
        PageKey::Name(name) => ("name", name.clone().into()),
    }
}

fn page_meta_from_row(row: &Row) -> SqliteResult<PageMeta> {
    let id = PageId::new(row.get(0)?).map_err(conversion_error)?;
    let site_id = SiteId::new(row.get(1)?).map_err(conversion_error)?;

    let mut meta = PageMeta::new(id, site_id, row.get::<_, String>(3)?)
        .with_template_code(row.get::<_, String>(9)?)
        .with_enabled(row.get(11)?)
        .with_edited(row.get(12)?)
        .with_timestamps(from_millis(row.get(13)?)?, from_millis(row.get(14)?)?);

    if let Some(parent_id) = row.get::<_, Option<i64>>(2)? {
        meta = meta.with_parent(PageId::new(parent_id).map_err(conversion_error)?);
    }
    if let Some(title) = row.get::<_, Option<String>>(4)? {
        meta = meta.with_title(title);
    }
    if let Some(slug) = row.get::<_, Option<String>>(5)? {
        meta = meta.with_slug(slug);
    }
    if let Some(url) = row.get::<_, Option<String>>(6)? {
        meta = meta.with_url(PageUrl::new(url).map_err(conversion_error)?);
    }
    if let Some(route_name) = row.get::<_, Option<String>>(7)? {
        meta = meta.with_route_name(RouteName::new(route_name).map_err(conversion_error)?);
    }
    if let Some(alias) = row.get::<_, Option<String>>(8)? {
        meta = meta.with_page_alias(PageAlias::new(alias).map_err(conversion_error)?);
    }
    if let Some(method) = row.get::<_, Option<String>>(10)? {
        meta = meta.with_request_method(method);
    }

    Ok(meta)
}

fn block_from_row(page_id: PageId, row: &Row) -> SqliteResult<Block> {
    let id = BlockId::new(row.get(0)?).map_err(conversion_error)?;
    let block_type = BlockType::new(row.get::<_, String>(2)?).map_err(conversion_error)?;
    let settings_json: String = row.get(5)?;
    let settings: BTreeMap<String, Value> = serde_json::from_str(&settings_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;

    let mut block = match row.get::<_, Option<i64>>(1)? {
        Some(parent_id) => {
            let parent_id = BlockId::new(parent_id).map_err(conversion_error)?;
            Block::new_child(id, page_id, parent_id, block_type)
        }
        None => Block::new_root(id, page_id, block_type),
    }
    .with_settings(settings)
    .with_enabled(row.get(6)?)
    .with_position(row.get(7)?);

    if let Some(name) = row.get::<_, Option<String>>(3)? {
        block = block.with_name(name);
    }
    if let Some(code) = row.get::<_, Option<String>>(4)? {
        block = block.with_code(code);
    }

    Ok(block)
}

impl SqliteRepository {
    /// Save a page and replace its blocks, inside a savepoint so it also
    /// works within an open unit of work
    fn save_page_savepoint(&mut self, page: &Page) -> SqliteResult<()> {
        let sp = self.conn.savepoint()?;
        let meta = page.meta();

        sp.execute(
            "INSERT INTO pages (id, site_id, parent_id, name, title, slug, url, route_name, page_alias,
                template_code, request_method, enabled, edited, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                site_id = excluded.site_id,
                parent_id = excluded.parent_id,
                name = excluded.name,
                title = excluded.title,
                slug = excluded.slug,
                url = excluded.url,
                route_name = excluded.route_name,
                page_alias = excluded.page_alias,
                template_code = excluded.template_code,
                request_method = excluded.request_method,
                enabled = excluded.enabled,
                edited = excluded.edited,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                meta.id().value(),
                meta.site_id().value(),
                meta.parent_id().map(PageId::value),
                meta.name(),
                meta.title(),
                meta.slug(),
                meta.url().map(PageUrl::as_str),
                meta.route_name().map(RouteName::as_str),
                meta.page_alias().map(PageAlias::as_str),
                meta.template_code(),
                meta.request_method(),
                meta.is_enabled(),
                meta.is_edited(),
                to_millis(meta.created_at()),
                to_millis(meta.updated_at()),
            ],
        )?;

        sp.execute(
            "DELETE FROM blocks WHERE page_id = ?1",
            params![meta.id().value()],
        )?;

        // Pre-order walk so every parent row exists before its children
        let mut stack: Vec<(&Block, usize)> = page
            .root_blocks()
            .into_iter()
            .enumerate()
            .rev()
            .map(|(index, block)| (block, index))
            .collect();

        while let Some((block, sort_order)) = stack.pop() {
            let settings = serde_json::to_string(block.settings())
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            sp.execute(
                "INSERT INTO blocks (id, page_id, parent_id, block_type, name, code, settings,
                    enabled, position, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    block.id().value(),
                    meta.id().value(),
                    block.parent_id().map(BlockId::value),
                    block.block_type().as_str(),
                    block.name(),
                    block.code(),
                    settings,
                    block.is_enabled(),
                    block.position(),
                    sort_order as i64,
                ],
            )?;

            stack.extend(
                page.children(block.id())
                    .into_iter()
                    .enumerate()
                    .rev()
                    .map(|(index, child)| (child, index)),
            );
        }

        sp.commit()
    }

    /// Load a page with its whole block tree
    fn load_page(&self, page_id: &PageId) -> SqliteResult<Option<Page>> {
        let meta = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
                params![page_id.value()],
                page_meta_from_row,
            )
            .optional()?;

        let Some(meta) = meta else {
            return Ok(None);
        };
        let mut page = Page::new(meta);

        let mut stmt = self.conn.prepare(
            "SELECT id, parent_id, block_type, name, code, settings, enabled, position
             FROM blocks
             WHERE page_id = ?1
             ORDER BY sort_order, id",
        )?;

        let blocks = stmt
            .query_map(params![page_id.value()], |row| block_from_row(*page_id, row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        // Group by parent, keeping sibling order, then attach breadth first
        let mut by_parent: HashMap<Option<BlockId>, Vec<Block>> = HashMap::new();
        for block in blocks {
            by_parent
                .entry(block.parent_id().copied())
                .or_default()
                .push(block);
        }

        let mut queue: VecDeque<Option<BlockId>> = VecDeque::from([None]);
        while let Some(parent_id) = queue.pop_front() {
            for block in by_parent.remove(&parent_id).unwrap_or_default() {
                let block_id = *block.id();
                page.add_block(block).map_err(conversion_error)?;
                queue.push_back(Some(block_id));
            }
        }

        Ok(Some(page))
    }

    fn load_pages(&self, ids: Vec<i64>) -> DomainResult<Vec<Page>> {
        let mut pages = Vec::with_capacity(ids.len());
        for id in ids {
            let page_id = PageId::new(id)?;
            if let Some(page) = self.find_by_id(&page_id)? {
                pages.push(page);
            }
        }
        Ok(pages)
    }
}

impl PageRepository for SqliteRepository {
    fn save(&mut self, page: Page) -> DomainResult<()> {
        self.save_page_savepoint(&page).map_err(db_error)
    }

    fn find_by_id(&self, id: &PageId) -> DomainResult<Option<Page>> {
        self.load_page(id).map_err(db_error)
    }

    fn find_one_by(&self, site_id: Option<&SiteId>, key: &PageKey) -> DomainResult<Option<Page>> {
        let (column, value) = page_key_filter(key);
        let sql = format!(
            "SELECT id FROM pages WHERE {} = ?1 AND (?2 IS NULL OR site_id = ?2) ORDER BY id LIMIT 1",
            column
        );

        let page_id: Option<i64> = self
            .conn
            .query_row(&sql, params![value, site_id.map(SiteId::value)], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_error)?;

        match page_id {
            Some(id) => self.find_by_id(&PageId::new(id)?),
            None => Ok(None),
        }
    }

    fn find_by_site(&self, site_id: &SiteId) -> DomainResult<Vec<Page>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM pages WHERE site_id = ?1 ORDER BY id")
            .map_err(db_error)?;

        let ids: Vec<i64> = stmt
            .query_map(params![site_id.value()], |row| row.get(0))
            .map_err(db_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(db_error)?;

        self.load_pages(ids)
    }

    fn delete(&mut self, id: &PageId) -> DomainResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM pages WHERE id = ?1", params![id.value()])
            .map_err(db_error)?;

        Ok(rows_affected > 0)
    }

    fn last_block_id(&self) -> DomainResult<Option<BlockId>> {
        let last: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM blocks", [], |row| row.get(0))
            .map_err(db_error)?;

        last.map(BlockId::new).transpose()
    }
}

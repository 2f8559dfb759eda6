use rusqlite::{Connection, Result};

/// Initialize the SQLite database with the required schema.
/// This function is idempotent and can be safely called multiple times.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    // Enable foreign key constraints
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            host TEXT NOT NULL,
            relative_path TEXT,
            locale TEXT,
            enabled INTEGER NOT NULL,
            is_default INTEGER NOT NULL
        )",
        [],
    )?;

    // Timestamps are stored as milliseconds since the Unix epoch
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            parent_id INTEGER,
            name TEXT NOT NULL,
            title TEXT,
            slug TEXT,
            url TEXT,
            route_name TEXT,
            page_alias TEXT,
            template_code TEXT NOT NULL,
            request_method TEXT,
            enabled INTEGER NOT NULL,
            edited INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (site_id) REFERENCES sites(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(site_id, url)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_route ON pages(site_id, route_name)",
        [],
    )?;

    // sort_order is the position among siblings; position is the block's own setting
    conn.execute(
        "CREATE TABLE IF NOT EXISTS blocks (
            id INTEGER PRIMARY KEY,
            page_id INTEGER NOT NULL,
            parent_id INTEGER,
            block_type TEXT NOT NULL,
            name TEXT,
            code TEXT,
            settings TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            position INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES blocks(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_blocks_page ON blocks(page_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_blocks_parent ON blocks(parent_id)",
        [],
    )?;

    // Snapshots outlive the pages they capture, so no foreign keys here
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER NOT NULL,
            site_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            url TEXT,
            route_name TEXT,
            page_alias TEXT,
            enabled INTEGER NOT NULL,
            publication_date_start INTEGER,
            publication_date_end INTEGER,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_page ON snapshots(page_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_url ON snapshots(site_id, url)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_route ON snapshots(site_id, route_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_alias ON snapshots(site_id, page_alias)",
        [],
    )?;

    Ok(())
}

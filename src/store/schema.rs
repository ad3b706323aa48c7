use rusqlite::Connection;

pub(crate) fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS database_size_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            database_name TEXT NOT NULL,
            driver TEXT NOT NULL,
            total_size_bytes INTEGER NOT NULL,
            total_size_mb REAL NOT NULL,
            total_size_gb REAL NOT NULL,
            max_size_bytes INTEGER,
            max_size_mb REAL,
            max_size_gb REAL,
            usage_percentage REAL,
            table_count INTEGER NOT NULL DEFAULT 0,
            total_rows INTEGER NOT NULL DEFAULT 0,
            growth_bytes INTEGER,
            growth_mb REAL,
            growth_percentage REAL,
            days_until_full INTEGER,
            estimated_full_date INTEGER,
            largest_tables TEXT,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS database_table_size_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            database_size_log_id INTEGER NOT NULL,
            table_name TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            size_mb REAL NOT NULL,
            data_size_mb REAL,
            index_size_mb REAL,
            row_count INTEGER NOT NULL DEFAULT 0,
            growth_bytes INTEGER,
            growth_mb REAL,
            growth_percentage REAL,
            row_growth INTEGER,
            row_growth_percentage REAL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY(database_size_log_id) REFERENCES database_size_logs(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_size_logs_database ON database_size_logs(database_name);
         CREATE INDEX IF NOT EXISTS idx_size_logs_created ON database_size_logs(created_at);
         CREATE INDEX IF NOT EXISTS idx_size_logs_database_created ON database_size_logs(database_name, created_at);
         CREATE INDEX IF NOT EXISTS idx_table_logs_table ON database_table_size_logs(table_name);
         CREATE INDEX IF NOT EXISTS idx_table_logs_parent_table ON database_table_size_logs(database_size_log_id, table_name);
         CREATE INDEX IF NOT EXISTS idx_table_logs_table_created ON database_table_size_logs(table_name, created_at);",
    )?;

    Ok(())
}

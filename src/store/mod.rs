// src/store/mod.rs

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use std::{path::Path, time::Instant};
use tracing::{info, warn};

use crate::process::{csv_io::read_table, naming::table_name_for, RawTable};

/// Rows per insert transaction.
pub const BATCH_ROWS: usize = 1000;
const MAX_BATCH_ATTEMPTS: u32 = 3;

/// Double-quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Relational destination for consolidated tables. Every column is TEXT.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open a database on disk at `path`, creating the file if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        info!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Drop `name` if present and create it with one TEXT column per header.
    pub fn replace_table(&self, name: &str, headers: &[String]) -> Result<()> {
        let columns = headers
            .iter()
            .map(|h| format!("{} TEXT", quote_ident(h)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({columns});",
            table = quote_ident(name)
        );
        self.conn
            .execute_batch(&sql)
            .with_context(|| format!("creating table {}", name))?;
        info!(table = name, columns = headers.len(), "created table");
        Ok(())
    }

    fn insert_batch(&mut self, sql: &str, rows: &[Vec<String>]) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()
    }

    /// Insert `rows` in transactions of `BATCH_ROWS`, retrying a failed batch.
    pub fn insert_rows(&mut self, name: &str, headers: &[String], rows: &[Vec<String>]) -> Result<usize> {
        let column_list = headers.iter().map(|h| quote_ident(h)).collect::<Vec<_>>().join(", ");
        let placeholders = vec!["?"; headers.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(name),
            column_list,
            placeholders
        );

        let mut inserted = 0;
        for (batch_no, batch) in rows.chunks(BATCH_ROWS).enumerate() {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self.insert_batch(&sql, batch) {
                    Ok(()) => break,
                    Err(e) if attempt < MAX_BATCH_ATTEMPTS => {
                        warn!(table = name, batch = batch_no, attempt, error = %e, "retrying batch");
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("inserting batch {} into {} after {} attempts", batch_no, name, attempt)
                        });
                    }
                }
            }
            inserted += batch.len();
        }
        Ok(inserted)
    }

    /// Replace table `name` with the contents of `table`.
    pub fn load_table(&mut self, name: &str, table: &RawTable) -> Result<usize> {
        let start = Instant::now();
        self.replace_table(name, &table.headers)?;
        let rows = table.aligned_rows(&table.headers);
        let n = self.insert_rows(name, &table.headers, &rows)?;
        info!(table = name, rows = n, elapsed = ?start.elapsed(), "loaded table");
        Ok(n)
    }

    /// Load a CSV file into a table named after its lowercased stem.
    pub fn load_csv_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(String, usize)> {
        let path = path.as_ref();
        let name = table_name_for(path)
            .with_context(|| format!("no table name for {}", path.display()))?;
        let table = read_table(path)?;
        let n = self.load_table(&name, &table)?;
        Ok((name, n))
    }

    pub fn row_count(&self, name: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
        Ok(self.conn.query_row(&sql, [], |r| r.get(0))?)
    }

    pub fn column_names(&self, name: &str) -> Result<Vec<String>> {
        let stmt = self.conn.prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(name)))?;
        Ok(stmt.column_names().into_iter().map(str::to_string).collect())
    }
}

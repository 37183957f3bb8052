//! `SQLite`-based catalog backend.
//!
//! Items and descriptors live in separate tables so that catalog edits never
//! touch descriptor blobs and re-indexing never rewrites item rows.

use crate::descriptor::ExtractorConfig;
use crate::models::{
    CatalogItem, Descriptor, DescriptorRecord, FeatureSpace, IndexedItem, ItemId,
};
use crate::storage::sqlite::{acquire_lock, configure_connection, record_operation_metrics};
use crate::storage::traits::CatalogBackend;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

const ITEM_COLUMNS: &str = "i.id, i.name, i.description, i.price, i.category, i.brand, \
                            i.image_path, i.image_url, i.stock, i.is_active";

const DESCRIPTOR_COLUMNS: &str = "d.vector, d.dimensions, d.extractor_version, d.grid_size, \
                                  d.histogram_bins, d.source_digest, d.extracted_at";

/// Feature-space columns added after the first schema, with the values
/// stamped on rows that predate them.
const SPACE_COLUMNS: [(&str, usize); 2] = [
    ("grid_size", ExtractorConfig::DEFAULT_GRID_SIZE as usize),
    ("histogram_bins", ExtractorConfig::DEFAULT_HISTOGRAM_BINS),
];

/// `SQLite`-based catalog backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and
/// `busy_timeout` let separate processes (an indexing run and a query) share
/// the database file.
///
/// # Schema
///
/// - `items`: one row per catalog item, ordered by insertion (`rowid`)
/// - `descriptors`: one row per indexed item; `vector` holds little-endian
///   `f32` values, tagged with the feature space they were extracted in,
///   deleted with the item via a foreign key
pub struct SqliteCatalogBackend {
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
    /// Descriptor length accepted by `store_descriptor`.
    dimensions: usize,
}

impl SqliteCatalogBackend {
    /// Opens (or creates) a catalog database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>, dimensions: usize) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::operation("create_data_dir", e))?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::operation("open_sqlite", e))?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            dimensions,
        };
        backend.initialize()?;
        Ok(backend)
    }

    /// Creates an in-memory catalog (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::operation("open_sqlite_in_memory", e))?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: None,
            dimensions,
        };
        backend.initialize()?;
        Ok(backend)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                brand TEXT NOT NULL DEFAULT '',
                image_path TEXT,
                image_url TEXT,
                stock INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS descriptors (
                item_id TEXT PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
                vector BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                extractor_version INTEGER NOT NULL,
                grid_size INTEGER NOT NULL,
                histogram_bins INTEGER NOT NULL,
                source_digest TEXT,
                extracted_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_items_active ON items(is_active);
            CREATE INDEX IF NOT EXISTS idx_descriptors_version ON descriptors(extractor_version);",
        )
        .map_err(|e| Error::operation("create_catalog_tables", e))?;

        add_missing_space_columns(&conn)
    }

    /// Runs `f` under the connection lock and records metrics for it.
    fn with_conn<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            f(&conn)
        };
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, operation, start, status);
        result
    }
}

/// Upgrades a `descriptors` table created before rows carried their
/// feature space.
fn add_missing_space_columns(conn: &Connection) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('descriptors')")
        .map_err(sql_error("inspect_descriptors"))?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(sql_error("inspect_descriptors"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(sql_error("inspect_descriptors"))?;

    for (column, default) in SPACE_COLUMNS {
        if existing.iter().any(|name| name == column) {
            continue;
        }
        conn.execute_batch(&format!(
            "ALTER TABLE descriptors ADD COLUMN {column} INTEGER NOT NULL DEFAULT {default}"
        ))
        .map_err(sql_error("migrate_descriptors"))?;
        tracing::info!(column, default, "Added feature space column to descriptors");
    }
    Ok(())
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    let stock: i64 = row.get(8)?;
    Ok(CatalogItem {
        id: ItemId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        brand: row.get(5)?,
        image_path: row.get::<_, Option<String>>(6)?.map(PathBuf::from),
        image_url: row.get(7)?,
        stock: u32::try_from(stock).unwrap_or(0),
        is_active: row.get(9)?,
    })
}

/// Raw descriptor columns, decoded outside the row callback so that format
/// errors surface as crate errors.
struct DescriptorRow {
    vector: Vec<u8>,
    dimensions: i64,
    extractor_version: i64,
    grid_size: i64,
    histogram_bins: i64,
    source_digest: Option<String>,
    extracted_at: i64,
}

impl DescriptorRow {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Option<Self>> {
        let Some(vector) = row.get::<_, Option<Vec<u8>>>(offset)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            vector,
            dimensions: row.get(offset + 1)?,
            extractor_version: row.get(offset + 2)?,
            grid_size: row.get(offset + 3)?,
            histogram_bins: row.get(offset + 4)?,
            source_digest: row.get(offset + 5)?,
            extracted_at: row.get(offset + 6)?,
        }))
    }

    fn into_record(self) -> Result<DescriptorRecord> {
        let descriptor = Descriptor::from_bytes(&self.vector)?;
        let dimensions = usize::try_from(self.dimensions).unwrap_or(0);
        if descriptor.len() != dimensions {
            return Err(Error::DimensionMismatch {
                expected: dimensions,
                actual: descriptor.len(),
            });
        }
        let space = FeatureSpace::new(
            column_u32("extractor_version", self.extractor_version)?,
            column_u32("grid_size", self.grid_size)?,
            column_u32("histogram_bins", self.histogram_bins)?,
        );
        Ok(DescriptorRecord {
            descriptor,
            space,
            source_digest: self.source_digest,
            extracted_at: DateTime::<Utc>::from_timestamp(self.extracted_at, 0)
                .unwrap_or_default(),
        })
    }
}

fn column_u32(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidInput(format!("invalid {column} {value}")))
}

fn sql_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::operation(operation, e)
}

impl CatalogBackend for SqliteCatalogBackend {
    #[instrument(skip(self, item), fields(operation = "upsert_item", backend = BACKEND, item.id = %item.id))]
    fn upsert_item(&self, item: &CatalogItem) -> Result<()> {
        self.with_conn("upsert_item", |conn| {
            // ON CONFLICT keeps the rowid, so catalog order is insertion order.
            conn.execute(
                "INSERT INTO items (id, name, description, price, category, brand,
                                    image_path, image_url, stock, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    price = excluded.price,
                    category = excluded.category,
                    brand = excluded.brand,
                    image_path = excluded.image_path,
                    image_url = excluded.image_url,
                    stock = excluded.stock,
                    is_active = excluded.is_active",
                params![
                    item.id.as_str(),
                    item.name,
                    item.description,
                    item.price,
                    item.category,
                    item.brand,
                    item.image_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned()),
                    item.image_url,
                    i64::from(item.stock),
                    item.is_active,
                ],
            )
            .map_err(sql_error("upsert_item"))?;
            Ok(())
        })
    }

    #[instrument(skip(self), fields(operation = "get_item", backend = BACKEND, item.id = %id))]
    fn get_item(&self, id: &ItemId) -> Result<Option<CatalogItem>> {
        self.with_conn("get_item", |conn| {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = ?1"),
                params![id.as_str()],
                item_from_row,
            )
            .optional()
            .map_err(sql_error("get_item"))
        })
    }

    #[instrument(skip(self), fields(operation = "delete_item", backend = BACKEND, item.id = %id))]
    fn delete_item(&self, id: &ItemId) -> Result<bool> {
        self.with_conn("delete_item", |conn| {
            let deleted = conn
                .execute("DELETE FROM items WHERE id = ?1", params![id.as_str()])
                .map_err(sql_error("delete_item"))?;
            Ok(deleted > 0)
        })
    }

    #[instrument(skip(self), fields(operation = "list_items", backend = BACKEND))]
    fn list_items(&self, active_only: bool) -> Result<Vec<CatalogItem>> {
        self.with_conn("list_items", |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items i
                     WHERE ?1 = 0 OR i.is_active = 1
                     ORDER BY i.rowid"
                ))
                .map_err(sql_error("list_items"))?;
            let rows = stmt
                .query_map(params![active_only], item_from_row)
                .map_err(sql_error("list_items"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_error("list_items"))
        })
    }

    #[instrument(
        skip(self, record),
        fields(operation = "store_descriptor", backend = BACKEND, item.id = %id, dims = record.descriptor.len())
    )]
    fn store_descriptor(&self, id: &ItemId, record: &DescriptorRecord) -> Result<()> {
        if record.descriptor.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: record.descriptor.len(),
            });
        }

        self.with_conn("store_descriptor", |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM items WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error("store_descriptor"))?;
            if exists.is_none() {
                return Err(Error::InvalidInput(format!("unknown catalog item '{id}'")));
            }

            #[allow(clippy::cast_possible_wrap)]
            let dimensions = record.descriptor.len() as i64;
            conn.execute(
                "INSERT OR REPLACE INTO descriptors
                    (item_id, vector, dimensions, extractor_version, grid_size,
                     histogram_bins, source_digest, extracted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    record.descriptor.to_bytes(),
                    dimensions,
                    i64::from(record.space.version),
                    i64::from(record.space.grid_size),
                    i64::from(record.space.histogram_bins),
                    record.source_digest,
                    record.extracted_at.timestamp(),
                ],
            )
            .map_err(sql_error("store_descriptor"))?;
            Ok(())
        })
    }

    #[instrument(skip(self), fields(operation = "get_descriptor", backend = BACKEND, item.id = %id))]
    fn get_descriptor(&self, id: &ItemId) -> Result<Option<DescriptorRecord>> {
        let row = self.with_conn("get_descriptor", |conn| {
            conn.query_row(
                &format!("SELECT {DESCRIPTOR_COLUMNS} FROM descriptors d WHERE d.item_id = ?1"),
                params![id.as_str()],
                |row| DescriptorRow::from_row(row, 0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(sql_error("get_descriptor"))
        })?;
        row.map(DescriptorRow::into_record).transpose()
    }

    #[instrument(skip(self), fields(operation = "clear_descriptor", backend = BACKEND, item.id = %id))]
    fn clear_descriptor(&self, id: &ItemId) -> Result<bool> {
        self.with_conn("clear_descriptor", |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM descriptors WHERE item_id = ?1",
                    params![id.as_str()],
                )
                .map_err(sql_error("clear_descriptor"))?;
            Ok(deleted > 0)
        })
    }

    #[instrument(skip(self), fields(operation = "indexed_items", backend = BACKEND))]
    fn indexed_items(&self, active_only: bool) -> Result<Vec<IndexedItem>> {
        let rows = self.with_conn("indexed_items", |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ITEM_COLUMNS}, {DESCRIPTOR_COLUMNS}
                     FROM items i LEFT JOIN descriptors d ON d.item_id = i.id
                     WHERE ?1 = 0 OR i.is_active = 1
                     ORDER BY i.rowid"
                ))
                .map_err(sql_error("indexed_items"))?;
            let rows = stmt
                .query_map(params![active_only], |row| {
                    Ok((item_from_row(row)?, DescriptorRow::from_row(row, 10)?))
                })
                .map_err(sql_error("indexed_items"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_error("indexed_items"))
        })?;

        // A corrupt blob makes that one item unsearchable, not the catalog.
        Ok(rows
            .into_iter()
            .map(|(item, raw)| {
                let record = raw.and_then(|raw| match raw.into_record() {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(item.id = %item.id, error = %e, "Ignoring unreadable descriptor");
                        None
                    },
                });
                IndexedItem { item, record }
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND))]
    fn count(&self) -> Result<usize> {
        self.with_conn("count", |conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
                .map_err(sql_error("count"))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteCatalogBackend {
        SqliteCatalogBackend::in_memory(4).unwrap()
    }

    const SPACE: FeatureSpace = FeatureSpace::new(1, 64, 32);

    fn record(values: Vec<f32>) -> DescriptorRecord {
        DescriptorRecord::new(Descriptor::new(values), SPACE).with_source_digest("abc123")
    }

    #[test]
    fn test_upsert_and_get_item() {
        let backend = backend();
        let item = CatalogItem::new("sku-1", "Sneaker")
            .with_price("49.90")
            .with_classification("Shoes", "Acme")
            .with_image_path("/img/sneaker.png");
        backend.upsert_item(&item).unwrap();

        let loaded = backend.get_item(&item.id).unwrap().unwrap();
        assert_eq!(loaded, item);
        assert!(backend.get_item(&ItemId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_preserves_order_and_descriptor() {
        let backend = backend();
        for id in ["a", "b", "c"] {
            backend.upsert_item(&CatalogItem::new(id, id)).unwrap();
        }
        backend
            .store_descriptor(&ItemId::new("a"), &record(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();

        // Updating "a" keeps it first and keeps its descriptor.
        backend
            .upsert_item(&CatalogItem::new("a", "renamed"))
            .unwrap();

        let ids: Vec<String> = backend
            .list_items(false)
            .unwrap()
            .into_iter()
            .map(|i| i.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(backend.get_descriptor(&ItemId::new("a")).unwrap().is_some());
    }

    #[test]
    fn test_descriptor_round_trip_is_bit_exact() {
        let backend = backend();
        let id = ItemId::new("sku-1");
        backend.upsert_item(&CatalogItem::new("sku-1", "Mug")).unwrap();

        let values = vec![0.1, -0.0, f32::MIN_POSITIVE, 1.0 / 3.0];
        backend.store_descriptor(&id, &record(values.clone())).unwrap();

        let loaded = backend.get_descriptor(&id).unwrap().unwrap();
        let bits: Vec<u32> = loaded.descriptor.as_slice().iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
        assert_eq!(loaded.space, SPACE);
        assert_eq!(loaded.source_digest.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_feature_space_round_trip() {
        let backend = backend();
        let id = ItemId::new("sku-1");
        backend.upsert_item(&CatalogItem::new("sku-1", "Mug")).unwrap();

        let coarse = FeatureSpace::new(1, 32, 16);
        backend
            .store_descriptor(&id, &DescriptorRecord::new(Descriptor::new(vec![1.0; 4]), coarse))
            .unwrap();

        let loaded = backend.get_descriptor(&id).unwrap().unwrap();
        assert_eq!(loaded.space, coarse);
        assert!(!loaded.is_in(&SPACE));
    }

    #[test]
    fn test_opening_old_schema_adds_space_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE items (
                    id TEXT PRIMARY KEY, name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '', price TEXT NOT NULL DEFAULT '',
                    category TEXT NOT NULL DEFAULT '', brand TEXT NOT NULL DEFAULT '',
                    image_path TEXT, image_url TEXT,
                    stock INTEGER NOT NULL DEFAULT 0, is_active INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE descriptors (
                    item_id TEXT PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
                    vector BLOB NOT NULL, dimensions INTEGER NOT NULL,
                    extractor_version INTEGER NOT NULL, source_digest TEXT,
                    extracted_at INTEGER NOT NULL
                );
                INSERT INTO items (id, name) VALUES ('sku-1', 'Mug');",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO descriptors VALUES ('sku-1', ?1, 4, 1, NULL, 0)",
                params![Descriptor::new(vec![0.25; 4]).to_bytes()],
            )
            .unwrap();
        }

        let backend = SqliteCatalogBackend::new(&path, 4).unwrap();
        let loaded = backend.get_descriptor(&ItemId::new("sku-1")).unwrap().unwrap();
        assert_eq!(loaded.space, SPACE);
        assert_eq!(loaded.descriptor.as_slice(), &[0.25; 4]);
    }

    #[test]
    fn test_store_descriptor_checks_dimensions() {
        let backend = backend();
        let id = ItemId::new("sku-1");
        backend.upsert_item(&CatalogItem::new("sku-1", "Mug")).unwrap();

        let err = backend.store_descriptor(&id, &record(vec![1.0])).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 4,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_store_descriptor_requires_item() {
        let backend = backend();
        let err = backend
            .store_descriptor(&ItemId::new("ghost"), &record(vec![0.0; 4]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_indexed_items_filters_inactive() {
        let backend = backend();
        backend.upsert_item(&CatalogItem::new("on", "On")).unwrap();
        backend
            .upsert_item(&CatalogItem::new("off", "Off").inactive())
            .unwrap();
        backend
            .store_descriptor(&ItemId::new("on"), &record(vec![1.0; 4]))
            .unwrap();

        let active = backend.indexed_items(true).unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].has_features());

        let all = backend.indexed_items(false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all[1].has_features());
        assert_eq!(backend.count().unwrap(), 2);
    }

    #[test]
    fn test_delete_cascades_and_clear() {
        let backend = backend();
        let id = ItemId::new("sku-1");
        backend.upsert_item(&CatalogItem::new("sku-1", "Mug")).unwrap();
        backend.store_descriptor(&id, &record(vec![1.0; 4])).unwrap();

        assert!(backend.clear_descriptor(&id).unwrap());
        assert!(!backend.clear_descriptor(&id).unwrap());

        backend.store_descriptor(&id, &record(vec![1.0; 4])).unwrap();
        assert!(backend.delete_item(&id).unwrap());
        assert!(backend.get_descriptor(&id).unwrap().is_none());
        assert!(!backend.delete_item(&id).unwrap());
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let id = ItemId::new("sku-1");

        {
            let backend = SqliteCatalogBackend::new(&path, 4).unwrap();
            backend.upsert_item(&CatalogItem::new("sku-1", "Mug")).unwrap();
            backend.store_descriptor(&id, &record(vec![0.5; 4])).unwrap();
        }

        let reopened = SqliteCatalogBackend::new(&path, 4).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        let loaded = reopened.get_descriptor(&id).unwrap().unwrap();
        assert_eq!(loaded.descriptor.as_slice(), &[0.5; 4]);
    }
}

use rusqlite::types::Value;
use rusqlite::{Connection, DatabaseName, params};
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::ledger::{Category, Ledger, Location, QuantityKind, StockRecord};
use crate::period_log::{PeriodLabel, PeriodLog};

/// Columns added after the first schema revision, with the DDL used to
/// backfill them on older files.
const OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("brand", "ALTER TABLE stock_records ADD COLUMN brand TEXT NOT NULL DEFAULT ''"),
    ("category", "ALTER TABLE stock_records ADD COLUMN category TEXT"),
    (
        "quantity_kind",
        "ALTER TABLE stock_records ADD COLUMN quantity_kind TEXT NOT NULL DEFAULT 'exact'",
    ),
    (
        "total_across_locations",
        "ALTER TABLE stock_records ADD COLUMN total_across_locations INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "daily_change",
        "ALTER TABLE stock_records ADD COLUMN daily_change INTEGER NOT NULL DEFAULT 0",
    ),
];

/// SQLite-backed ledger: one `stock_records` table for the ledger and a
/// `period_changes` table keyed by period label.
pub struct LedgerStore {
    conn: Connection,
    snapshot_dir: Option<PathBuf>,
}

impl LedgerStore {
    /// Open (creating if needed) the ledger file at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "Ledger file opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS stock_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name TEXT NOT NULL,
                location INTEGER NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL,
                brand TEXT NOT NULL DEFAULT '',
                category TEXT,
                quantity_kind TEXT NOT NULL DEFAULT 'exact',
                total_across_locations INTEGER NOT NULL DEFAULT 0,
                daily_change INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS period_changes (
                product_name TEXT NOT NULL,
                period_label TEXT NOT NULL,
                net_change INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (product_name, period_label)
            )",
            [],
        )?;

        // Migrate: older files predate brand/category/kind/derived columns
        for (column, ddl) in OPTIONAL_COLUMNS {
            let present = conn
                .prepare(&format!("SELECT {column} FROM stock_records LIMIT 0"))
                .is_ok();
            if !present {
                conn.execute_batch(ddl)?;
                info!(column, "Migrated stock_records: added column");
            }
        }

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stock_records_product ON stock_records(product_name)",
            [],
        )?;

        info!("Ledger store initialized");
        Ok(Self {
            conn,
            snapshot_dir: None,
        })
    }

    /// Write a recovery copy into `dir` after every save.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Read the ledger and change log. Totals are recomputed from the
    /// quantities read; `daily_change` is taken as stored.
    pub fn load(&self) -> Result<(Ledger, PeriodLog), StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_name, brand, category, location, quantity, quantity_kind,
                    last_updated, total_across_locations, daily_change
             FROM stock_records
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawRecord {
                id: row.get(0)?,
                product_name: row.get(1)?,
                brand: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                category: row.get(3)?,
                location: row.get(4)?,
                quantity: row.get(5)?,
                quantity_kind: row.get(6)?,
                last_updated: row.get(7)?,
                daily_change: row.get(9)?,
            })
        })?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(raw?.into_record()?);
        }
        let mut ledger = Ledger::from_records(records);
        ledger.recompute_all_totals();

        let mut stmt = self.conn.prepare(
            "SELECT rowid, product_name, period_label, net_change
             FROM period_changes
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        // "2025-03" and "March 2025" rows for one product fold into one entry
        let mut log = PeriodLog::new();
        for row in rows {
            let (rowid, product_name, label, net_change) = row?;
            let period = label.parse::<PeriodLabel>().map_err(|e| StoreError::CorruptRow {
                table: "period_changes",
                row: rowid,
                reason: e.to_string(),
            })?;
            log.record_change(&product_name, net_change, period);
        }

        info!(
            records = ledger.len(),
            period_entries = log.entries().len(),
            "Ledger loaded"
        );
        Ok((ledger, log))
    }

    /// Replace the stored ledger and change log with the given values, then
    /// take a best-effort snapshot.
    pub fn save(&mut self, ledger: &Ledger, log: &PeriodLog, at: OffsetDateTime) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM stock_records", [])?;
        tx.execute("DELETE FROM period_changes", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO stock_records
                    (product_name, brand, category, location, quantity, quantity_kind,
                     last_updated, total_across_locations, daily_change)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in ledger.records() {
                insert.execute(params![
                    r.product_name,
                    r.brand,
                    r.category.map(Category::as_str),
                    r.location.code(),
                    r.quantity,
                    r.quantity_kind.as_str(),
                    format_timestamp(r.last_updated),
                    r.total_across_locations as i64,
                    r.daily_change,
                ])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO period_changes (product_name, period_label, net_change)
                 VALUES (?1, ?2, ?3)",
            )?;
            for e in log.entries() {
                insert.execute(params![e.product_name, e.period.to_string(), e.net_change])?;
            }
        }
        tx.commit()?;
        info!(
            records = ledger.len(),
            period_entries = log.entries().len(),
            "Ledger saved"
        );

        if let Some(dir) = &self.snapshot_dir {
            match self.snapshot(dir, at) {
                Ok(path) => info!(path = %path.display(), "Snapshot written"),
                Err(e) => warn!(error = %e, dir = %dir.display(), "Snapshot failed; ledger itself is saved"),
            }
        }
        Ok(())
    }

    /// Online backup of the whole file into `dir/backup_<timestamp>.db`.
    pub fn snapshot(&self, dir: &Path, at: OffsetDateTime) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(dir)?;
        let stamp = at
            .format(format_description!(
                "[year]-[month]-[day]_[hour]-[minute]-[second]"
            ))
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        let path = dir.join(format!("backup_{stamp}.db"));
        self.conn.backup(DatabaseName::Main, &path, None)?;
        Ok(path)
    }

    /// (stock rows, change-log rows) currently on disk.
    pub fn counts(&self) -> Result<(usize, usize), StoreError> {
        let records: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM stock_records", [], |row| row.get(0))?;
        let changes: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM period_changes", [], |row| row.get(0))?;
        Ok((records, changes))
    }
}

/// A `stock_records` row before validation.
struct RawRecord {
    id: i64,
    product_name: String,
    brand: String,
    category: Option<String>,
    location: Value,
    quantity: i64,
    quantity_kind: Option<String>,
    last_updated: Option<String>,
    daily_change: Option<i64>,
}

impl RawRecord {
    fn into_record(self) -> Result<StockRecord, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            table: "stock_records",
            row: self.id,
            reason,
        };

        let location = match &self.location {
            Value::Integer(code) => Location::from_code(*code),
            Value::Text(label) => crate::display::parse_location(label),
            _ => None,
        }
        .ok_or_else(|| corrupt(format!("unknown location {:?}", self.location)))?;

        let quantity = u32::try_from(self.quantity.max(0)).unwrap_or(u32::MAX);
        if self.quantity < 0 {
            warn!(row = self.id, quantity = self.quantity, "Negative stored quantity clamped to 0");
        }

        let last_updated = self
            .last_updated
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| {
                warn!(row = self.id, raw = ?self.last_updated, "Unreadable timestamp; treating as oldest");
                OffsetDateTime::UNIX_EPOCH
            });

        Ok(StockRecord {
            product_name: self.product_name,
            brand: self.brand,
            category: self.category.as_deref().and_then(Category::parse),
            location,
            quantity,
            quantity_kind: self
                .quantity_kind
                .as_deref()
                .and_then(QuantityKind::parse)
                .unwrap_or(QuantityKind::Exact),
            last_updated,
            total_across_locations: 0,
            daily_change: self.daily_change.unwrap_or(0),
        })
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// RFC 3339, or the `YYYY-MM-DD HH:MM` form older sheets used (taken as UTC).
fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(at);
    }
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::record;
    use time::Month;
    use time::macros::datetime;

    const AT: OffsetDateTime = datetime!(2025-03-10 12:30:05 UTC);

    fn sample() -> (Ledger, PeriodLog) {
        let mut ledger = Ledger::from_records(vec![
            record("Omega3", "", Location::Warehouse, 2),
            record("Omega3", "Lamberts", Location::Store, 1),
        ]);
        ledger.recompute_all_totals();
        let mut log = PeriodLog::new();
        log.record_change("Omega3", 3, PeriodLabel::new(2025, Month::March));
        (ledger, log)
    }

    #[test]
    fn missing_file_loads_as_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("nested/ledger.db")).unwrap();
        let (ledger, log) = store.load().unwrap();
        assert!(ledger.is_empty());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn save_then_load_restores_both_sections() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let (ledger, log) = sample();
        store.save(&ledger, &log, AT).unwrap();

        let (loaded, loaded_log) = store.load().unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(loaded_log, log);
        assert_eq!(store.counts().unwrap(), (2, 1));
    }

    #[test]
    fn save_overwrites_rather_than_appends() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let (ledger, log) = sample();
        store.save(&ledger, &log, AT).unwrap();
        store.save(&ledger, &log, AT).unwrap();
        assert_eq!(store.counts().unwrap(), (2, 1));
    }

    #[test]
    fn duplicate_keys_survive_a_round_trip() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let ledger = Ledger::from_records(vec![
            record("Zinc", "", Location::Shelf, 1),
            record("zinc", "", Location::Shelf, 2),
        ]);
        store.save(&ledger, &PeriodLog::new(), AT).unwrap();
        let (loaded, _) = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn legacy_table_gets_defaulted_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE stock_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name TEXT NOT NULL,
                location INTEGER NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL
             );
             INSERT INTO stock_records (product_name, location, quantity, last_updated)
             VALUES ('Vitamin D3', '1 (Μαγαζί)', 4, '2025-02-28 17:45'),
                    ('Vitamin D3', 0, -2, 'yesterday');",
        )
        .unwrap();

        let store = LedgerStore::from_connection(conn).unwrap();
        let (ledger, _) = store.load().unwrap();
        let rows = ledger.records();

        assert_eq!(rows[0].location, Location::Store);
        assert_eq!(rows[0].brand, "");
        assert_eq!(rows[0].quantity_kind, QuantityKind::Exact);
        assert_eq!(rows[0].last_updated, datetime!(2025-02-28 17:45 UTC));
        assert_eq!(rows[1].quantity, 0);
        assert_eq!(rows[1].last_updated, OffsetDateTime::UNIX_EPOCH);
        assert!(rows.iter().all(|r| r.total_across_locations == 4));
    }

    #[test]
    fn equivalent_period_labels_merge_and_save_again() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "INSERT INTO period_changes (product_name, period_label, net_change)
                 VALUES ('Omega3', '2025-03', 4), ('Omega3', 'March 2025', -1);",
            )
            .unwrap();

        let (ledger, log) = store.load().unwrap();
        let march = PeriodLabel::new(2025, Month::March);
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries_for_period(march)[0].net_change, 3);

        store.save(&ledger, &log, AT).unwrap();
        assert_eq!(store.counts().unwrap(), (0, 1));
    }

    #[test]
    fn unknown_location_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        let store = LedgerStore::from_connection(conn).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO stock_records (product_name, location, quantity, last_updated)
                 VALUES ('Zinc', 7, 1, '2025-03-01T00:00:00Z')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.load(),
            Err(StoreError::CorruptRow { table: "stock_records", .. })
        ));
    }

    #[test]
    fn snapshot_lands_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = dir.path().join("backups");
        let mut store = LedgerStore::open(dir.path().join("ledger.db"))
            .unwrap()
            .with_snapshot_dir(&snapshots);
        let (ledger, log) = sample();
        store.save(&ledger, &log, AT).unwrap();

        let expected = snapshots.join("backup_2025-03-10_12-30-05.db");
        assert!(expected.exists());
        let copy = LedgerStore::open(&expected).unwrap();
        assert_eq!(copy.counts().unwrap(), (2, 1));
    }

    #[test]
    fn snapshot_failure_does_not_fail_the_save() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"file in the way").unwrap();
        let mut store = LedgerStore::open_in_memory()
            .unwrap()
            .with_snapshot_dir(&blocker);
        let (ledger, log) = sample();
        assert!(store.save(&ledger, &log, AT).is_ok());
    }
}

//! SQLite position store.
//!
//! One row per tranche, keyed by (symbol, zone, period). Closed rows are
//! kept so an exited zone stays used for the rest of its period.

use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::error::ZonetraderError;
use crate::domain::position::PositionStatus;
use crate::domain::zone::{Period, Zone};
use crate::ports::config_port::ConfigPort;
use crate::ports::execution_port::{EntryFill, PositionStore, StoredPosition};

pub struct SqlitePositionStore {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> ZonetraderError {
    ZonetraderError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> ZonetraderError {
    ZonetraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqlitePositionStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ZonetraderError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, ZonetraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn initialize_schema(&self) -> Result<(), ZonetraderError> {
        let conn = self.pool.get().map_err(pool_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS positions (
                symbol TEXT NOT NULL,
                zone TEXT NOT NULL,
                period INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                capital REAL NOT NULL,
                entry_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                exit_price REAL,
                exit_date TEXT,
                PRIMARY KEY (symbol, zone, period)
            );
            CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);",
        )
        .map_err(query_error)?;
        Ok(())
    }

    /// Mark a tranche closed. Returns false if no open row matched.
    pub fn close_position(
        &self,
        symbol: &str,
        zone: Zone,
        period: Period,
        exit_price: f64,
        exit_date: NaiveDate,
    ) -> Result<bool, ZonetraderError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let changed = conn
            .execute(
                "UPDATE positions SET status = 'closed', exit_price = ?4, exit_date = ?5
                 WHERE symbol = ?1 AND zone = ?2 AND period = ?3 AND status = 'open'",
                params![
                    symbol,
                    zone.as_str(),
                    period,
                    exit_price,
                    exit_date.format("%Y-%m-%d").to_string()
                ],
            )
            .map_err(query_error)?;
        Ok(changed > 0)
    }

    fn positions_where(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<StoredPosition>, ZonetraderError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(query_error)?;

        let mut positions = Vec::new();
        for row in rows {
            let (symbol, zone, period, quantity, price, status) = row.map_err(query_error)?;
            let zone: Zone = zone.parse().map_err(|reason: String| {
                ZonetraderError::DatabaseQuery { reason }
            })?;
            let status = match status.as_str() {
                "closed" => PositionStatus::Closed,
                _ => PositionStatus::Open,
            };
            positions.push(StoredPosition {
                symbol,
                zone,
                period,
                quantity,
                price,
                status,
            });
        }
        Ok(positions)
    }
}

impl PositionStore for SqlitePositionStore {
    fn get_open_positions(&self, symbol: &str) -> Result<Vec<StoredPosition>, ZonetraderError> {
        self.positions_where(
            "SELECT symbol, zone, period, quantity, price, status FROM positions
             WHERE symbol = ?1 AND status = 'open' ORDER BY period, zone",
            &[&symbol],
        )
    }

    fn zones_used(&self, symbol: &str, period: Period) -> Result<Vec<Zone>, ZonetraderError> {
        Ok(self
            .positions_where(
                "SELECT symbol, zone, period, quantity, price, status FROM positions
                 WHERE symbol = ?1 AND period = ?2",
                &[&symbol, &period],
            )?
            .into_iter()
            .map(|p| p.zone)
            .collect())
    }

    fn log_entry(&mut self, entry: &EntryFill) -> Result<(), ZonetraderError> {
        let conn = self.pool.get().map_err(pool_error)?;
        conn.execute(
            "INSERT INTO positions (symbol, zone, period, quantity, price, capital, entry_date, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'open')",
            params![
                entry.symbol,
                entry.zone.as_str(),
                crate::domain::zone::period_of(entry.date),
                entry.quantity,
                entry.price,
                entry.capital,
                entry.date.format("%Y-%m-%d").to_string()
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }
}

use crate::error::DbError;
use crate::types::{Calculation, HistoryEntry, Payout, Report, ReportRow, StoredCalculation, StoredReport};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_VERSION: i64 = 1;

/// Fixed-width timestamps so text ordering matches time ordering.
fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "opened tip distribution database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS tip_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                store_number TEXT NOT NULL,
                time_period_start TEXT NOT NULL,
                time_period_end TEXT NOT NULL,
                executed_by TEXT NOT NULL,
                executed_on TEXT NOT NULL,
                rows TEXT NOT NULL,
                total_tippable_hours_reported REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tip_calculations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                total_tips REAL NOT NULL,
                adjustments REAL NOT NULL,
                hourly_tip_rate REAL NOT NULL,
                payouts TEXT NOT NULL,
                FOREIGN KEY (report_id) REFERENCES tip_reports(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_tip_calculations_report ON tip_calculations(report_id);
            ",
        )?;
        conn.execute(
            "INSERT INTO schema_version (version) SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
            params![SCHEMA_VERSION],
        )?;
        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    pub fn insert_report(&self, report: &Report) -> Result<i64, DbError> {
        let created_at = now_timestamp();
        let rows_json = serde_json::to_string(&report.rows)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tip_reports (created_at, store_number, time_period_start, time_period_end, executed_by, executed_on, rows, total_tippable_hours_reported) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                created_at,
                report.store_number,
                report.time_period_start,
                report.time_period_end,
                report.executed_by,
                report.executed_on,
                rows_json,
                report.total_tippable_hours_reported
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_calculation(&self, calculation: &Calculation) -> Result<i64, DbError> {
        let report_id = calculation.report_id.ok_or(DbError::MissingReportId)?;
        let created_at = now_timestamp();
        let payouts_json = serde_json::to_string(&calculation.payouts)?;
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tip_reports WHERE id = ?)",
            params![report_id],
            |r| r.get(0),
        )?;
        if !exists {
            return Err(DbError::ReportNotFound(report_id));
        }
        conn.execute(
            "INSERT INTO tip_calculations (report_id, created_at, total_tips, adjustments, hourly_tip_rate, payouts) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                report_id,
                created_at,
                calculation.inputs.total_tips,
                calculation.inputs.adjustments,
                calculation.hourly_rate,
                payouts_json
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_report(&self, id: i64) -> Result<Option<StoredReport>, DbError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT created_at, store_number, time_period_start, time_period_end, executed_by, executed_on, rows, total_tippable_hours_reported FROM tip_reports WHERE id = ?",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        Report {
                            store_number: row.get(1)?,
                            time_period_start: row.get(2)?,
                            time_period_end: row.get(3)?,
                            executed_by: row.get(4)?,
                            executed_on: row.get(5)?,
                            rows: Vec::new(),
                            total_tippable_hours_reported: row.get(7)?,
                        },
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;
        let Some((created_at, mut report, rows_json)) = raw else {
            return Ok(None);
        };
        report.rows = serde_json::from_str::<Vec<ReportRow>>(&rows_json)?;
        Ok(Some(StoredReport {
            id,
            created_at,
            report,
        }))
    }

    /// Reports newest first, each with its calculations newest first.
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, store_number, time_period_start, time_period_end FROM tip_reports ORDER BY created_at DESC, id DESC",
        )?;
        let reports = stmt
            .query_map([], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    store_number: row.get(2)?,
                    time_period_start: row.get(3)?,
                    time_period_end: row.get(4)?,
                    calculations: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut calc_stmt = conn.prepare(
            "SELECT id, report_id, created_at, total_tips, adjustments, hourly_tip_rate, payouts FROM tip_calculations WHERE report_id = ? ORDER BY created_at DESC, id DESC",
        )?;
        let mut out = Vec::with_capacity(reports.len());
        for mut entry in reports {
            let raw = calc_stmt
                .query_map(params![entry.id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            for (id, report_id, created_at, total_tips, adjustments, hourly_tip_rate, payouts) in raw {
                entry.calculations.push(StoredCalculation {
                    id,
                    report_id,
                    created_at,
                    total_tips,
                    adjustments,
                    hourly_tip_rate,
                    payouts: serde_json::from_str::<Vec<Payout>>(&payouts)?,
                });
            }
            out.push(entry);
        }
        Ok(out)
    }

    /// Delete a report and its calculations. Returns whether a report was removed.
    pub fn delete_report(&self, id: i64) -> Result<bool, DbError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM tip_calculations WHERE report_id = ?", params![id])?;
        let removed = conn.execute("DELETE FROM tip_reports WHERE id = ?", params![id])?;
        Ok(removed > 0)
    }
}

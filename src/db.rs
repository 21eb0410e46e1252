use std::path::Path;

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::pipeline::RunStats;
use crate::record::{Category, CategoryFields, ExtractionRecord};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            run_id     INTEGER PRIMARY KEY,
            started_at TEXT NOT NULL,
            targets    INTEGER NOT NULL,
            ok         INTEGER NOT NULL,
            errors     INTEGER NOT NULL,
            skipped    INTEGER NOT NULL DEFAULT 0
        );

        -- Category columns hold JSON arrays of strings
        CREATE TABLE IF NOT EXISTS records (
            run_id                  INTEGER NOT NULL REFERENCES runs(run_id),
            position                INTEGER NOT NULL,
            name                    TEXT NOT NULL,
            url                     TEXT NOT NULL,
            courses                 TEXT NOT NULL,
            course_descriptions     TEXT NOT NULL,
            admissions_requirements TEXT NOT NULL,
            application_deadlines   TEXT NOT NULL,
            early_admission         TEXT NOT NULL,
            regular_admission       TEXT NOT NULL,
            scraped_at              TEXT NOT NULL,
            error                   TEXT,
            PRIMARY KEY (run_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_records_url ON records(url);
        ",
    )?;
    Ok(())
}

/// Store one run and its records atomically. Returns the new run id.
pub fn save_run(
    conn: &Connection,
    started_at: &str,
    stats: &RunStats,
    records: &[ExtractionRecord],
) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO runs (started_at, targets, ok, errors, skipped) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![started_at, stats.total, stats.ok, stats.errors, stats.skipped],
    )?;
    let run_id = tx.last_insert_rowid();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO records
             (run_id, position, name, url, courses, course_descriptions,
              admissions_requirements, application_deadlines, early_admission,
              regular_admission, scraped_at, error)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        )?;
        for (pos, r) in records.iter().enumerate() {
            let cols = Category::ALL
                .iter()
                .map(|c| serde_json::to_string(r.fields.get(*c)))
                .collect::<Result<Vec<_>, _>>()?;
            stmt.execute(params![
                run_id, pos, r.name, r.url, cols[0], cols[1], cols[2], cols[3], cols[4],
                cols[5], r.scraped_at, r.error,
            ])?;
        }
    }
    tx.commit()?;
    Ok(run_id)
}

pub struct RunRow {
    pub run_id: i64,
    pub started_at: String,
    pub targets: usize,
    pub ok: usize,
    pub errors: usize,
    pub skipped: usize,
}

pub fn latest_run(conn: &Connection) -> Result<Option<RunRow>> {
    let row = conn
        .query_row(
            "SELECT run_id, started_at, targets, ok, errors, skipped
             FROM runs ORDER BY run_id DESC LIMIT 1",
            [],
            |row| {
                Ok(RunRow {
                    run_id: row.get(0)?,
                    started_at: row.get(1)?,
                    targets: row.get(2)?,
                    ok: row.get(3)?,
                    errors: row.get(4)?,
                    skipped: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

struct RawRecord {
    name: String,
    url: String,
    columns: [String; 6],
    scraped_at: String,
    error: Option<String>,
}

/// Records of one run in input order, optionally only the failed ones.
pub fn fetch_records(
    conn: &Connection,
    run_id: i64,
    errors_only: bool,
    limit: Option<usize>,
) -> Result<Vec<ExtractionRecord>> {
    let sql = format!(
        "SELECT name, url, courses, course_descriptions, admissions_requirements,
                application_deadlines, early_admission, regular_admission,
                scraped_at, error
         FROM records
         WHERE run_id = ?1{}
         ORDER BY position{}",
        if errors_only { " AND error IS NOT NULL" } else { "" },
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map([run_id], |row| {
            Ok(RawRecord {
                name: row.get(0)?,
                url: row.get(1)?,
                columns: [
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ],
                scraped_at: row.get(8)?,
                error: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter().map(into_record).collect()
}

fn into_record(raw: RawRecord) -> Result<ExtractionRecord> {
    let mut fields = CategoryFields::default();
    for (category, json) in Category::ALL.iter().zip(raw.columns.iter()) {
        *fields.get_mut(*category) = serde_json::from_str(json)?;
    }
    Ok(ExtractionRecord {
        name: raw.name,
        url: raw.url,
        fields,
        scraped_at: raw.scraped_at,
        error: raw.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&dir.path().join("db/test.sqlite")).unwrap();
        init_schema(&conn).unwrap();
        (dir, conn)
    }

    fn sample() -> Vec<ExtractionRecord> {
        let fields = CategoryFields {
            courses: vec!["Economics BA".into(), "History BA".into()],
            application_deadlines: vec!["January 15".into()],
            ..Default::default()
        };
        vec![
            ExtractionRecord::new("Alpha College", "https://alpha.edu", fields),
            ExtractionRecord::failed("Beta University", "https://beta.edu", "HTTP 404"),
        ]
    }

    #[test]
    fn run_roundtrips_in_order() {
        let (_dir, conn) = open();
        let records = sample();
        let stats = RunStats { total: 2, ok: 1, errors: 1, skipped: 0 };
        let run_id = save_run(&conn, "2024-05-01 10:00:00", &stats, &records).unwrap();

        let back = fetch_records(&conn, run_id, false, None).unwrap();
        assert_eq!(back, records);

        let failed = fetch_records(&conn, run_id, true, None).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "Beta University");
    }

    #[test]
    fn latest_run_picks_newest() {
        let (_dir, conn) = open();
        assert!(latest_run(&conn).unwrap().is_none());

        let stats = RunStats { total: 2, ok: 1, errors: 1, skipped: 0 };
        save_run(&conn, "2024-05-01 10:00:00", &stats, &sample()).unwrap();
        let second = RunStats { total: 1, ok: 1, errors: 0, skipped: 3 };
        let id = save_run(&conn, "2024-05-02 10:00:00", &second, &sample()[..1]).unwrap();

        let run = latest_run(&conn).unwrap().unwrap();
        assert_eq!(run.run_id, id);
        assert_eq!(run.started_at, "2024-05-02 10:00:00");
        assert_eq!((run.targets, run.ok, run.errors, run.skipped), (1, 1, 0, 3));
        assert_eq!(fetch_records(&conn, id, false, Some(10)).unwrap().len(), 1);
    }
}

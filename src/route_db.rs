use std::cmp::Ordering;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, ToSql, Transaction};

use crate::route_source::Shift;

/* Submission storage. Rows are insert-only: one row per engine invocation,
holding the recomputed metrics plus the re-encoded GPX text, later served back
to the reporting side. The engine itself only ever sees the `RouteStore`
trait. */

/// The engine-side boundary to persistence.
pub trait RouteStore {
    fn store(&mut self, submission: &NewSubmission) -> Result<i64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub route_id: String,
    pub operator: String,
    pub submitted_at: DateTime<Utc>,
    pub shift: Shift,
    pub distance_km: f64,
    pub duration_seconds: Option<f64>,
    pub description: Option<String>,
    pub gpx: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    pub id: i64,
    pub route_id: String,
    pub operator: String,
    pub submitted_at: DateTime<Utc>,
    pub shift: Shift,
    pub distance_km: f64,
    pub duration_seconds: Option<f64>,
    pub description: Option<String>,
    pub gpx: String,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    /// exact match
    pub operator: Option<String>,
    /// substring match
    pub route_id: Option<String>,
    /// substring match
    pub description: Option<String>,
    pub shift: Option<Shift>,
    /// inclusive, on the submission date
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// One reporting aggregate row: per route and day, total distance and average
/// duration.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub route_id: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub total_distance_km: f64,
    pub avg_duration_seconds: Option<f64>,
}

fn open_db_and_run_migration(
    path: &Path,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<Connection> {
    debug!("open and run migration for {:?}", path);
    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;

    let version = tx.query_row("PRAGMA user_version;", (), |row| row.get::<_, i64>(0))? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for i in version..target_version {
                info!("running migration for version: {}", i + 1);
                let f = migrations.get(i).unwrap();
                f(&tx)?;
            }
            tx.pragma_update(None, "user_version", target_version as i64)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(conn)
}

pub struct RouteDb {
    conn: Connection,
}

impl RouteDb {
    pub fn open(path: &Path) -> Result<RouteDb> {
        let conn = open_db_and_run_migration(
            path,
            &[&|tx| {
                let sql = "
                CREATE TABLE route_submission (
                    id             INTEGER PRIMARY KEY AUTOINCREMENT
                                        UNIQUE
                                        NOT NULL,
                    route_id       TEXT    NOT NULL,
                    operator       TEXT    NOT NULL,
                    submitted_at   TEXT    NOT NULL, -- RFC3339
                    shift          TEXT    NOT NULL,
                    distance_km    REAL    NOT NULL,
                    duration_sec   REAL,
                    description    TEXT,
                    gpx            TEXT    NOT NULL
                );
                CREATE INDEX route_submission_submitted_at_index ON route_submission (
                    submitted_at DESC
                );
                ";
                for s in sql_split::split(sql) {
                    tx.execute(&s, ())?;
                }
                Ok(())
            }],
        )?;
        Ok(RouteDb { conn })
    }

    pub fn count_submissions(&self, filter: &SubmissionFilter) -> Result<i64> {
        let (where_clause, params) = build_where_clause(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM route_submission WHERE 1=1 {};",
            where_clause
        );
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(self.conn.query_row(&sql, &params[..], |row| row.get(0))?)
    }

    /// Newest first, `limit`/`offset` paginated.
    pub fn query_submissions(
        &self,
        filter: &SubmissionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SubmissionRow>> {
        let (where_clause, mut params) = build_where_clause(filter);
        let sql = format!(
            "SELECT id, route_id, operator, submitted_at, shift, distance_km, \
             duration_sec, description, gpx FROM route_submission WHERE 1=1 {} \
             ORDER BY submitted_at DESC, id DESC LIMIT ? OFFSET ?;",
            where_clause
        );
        params.push(Box::new(limit));
        params.push(Box::new(offset));
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut query = self.conn.prepare(&sql)?;
        let mut rows = query.query(&params[..])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(submission_of_row(row)?);
        }
        Ok(results)
    }

    pub fn get_submission(&self, id: i64) -> Result<Option<SubmissionRow>> {
        let mut query = self.conn.prepare(
            "SELECT id, route_id, operator, submitted_at, shift, distance_km, \
             duration_sec, description, gpx FROM route_submission WHERE id = ?1;",
        )?;
        let mut rows = query.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(submission_of_row(row)?)),
            None => Ok(None),
        }
    }

    /// The re-encoded document text alone, for serving the file back.
    pub fn get_submission_gpx(&self, id: i64) -> Result<Option<String>> {
        let mut query = self
            .conn
            .prepare("SELECT gpx FROM route_submission WHERE id = ?1;")?;
        Ok(query.query_row([id], |row| row.get(0)).optional()?)
    }

    pub fn operators(&self) -> Result<Vec<String>> {
        let mut query = self
            .conn
            .prepare("SELECT DISTINCT operator FROM route_submission ORDER BY operator;")?;
        let mut operators = Vec::new();
        for row in query.query_map((), |row| row.get(0))? {
            operators.push(row?);
        }
        Ok(operators)
    }

    /// Per route and day: summed distance and averaged duration, newest day
    /// first.
    pub fn daily_totals(&self, filter: &SubmissionFilter) -> Result<Vec<DailyTotal>> {
        let (where_clause, params) = build_where_clause(filter);
        let sql = format!(
            "SELECT route_id, MAX(description), date(substr(submitted_at, 1, 10)) AS day, \
             SUM(distance_km), AVG(duration_sec) FROM route_submission WHERE 1=1 {} \
             GROUP BY route_id, day ORDER BY day DESC, route_id;",
            where_clause
        );
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut query = self.conn.prepare(&sql)?;
        let mut rows = query.query(&params[..])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let day: String = row.get(2)?;
            results.push(DailyTotal {
                route_id: row.get(0)?,
                description: row.get(1)?,
                date: NaiveDate::parse_from_str(&day, "%Y-%m-%d")?,
                total_distance_km: row.get(3)?,
                avg_duration_seconds: row.get(4)?,
            });
        }
        Ok(results)
    }
}

impl RouteStore for RouteDb {
    fn store(&mut self, submission: &NewSubmission) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let sql = "INSERT INTO route_submission \
                   (route_id, operator, submitted_at, shift, distance_km, duration_sec, description, gpx) \
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);";
        tx.execute(
            sql,
            (
                &submission.route_id,
                &submission.operator,
                submission.submitted_at.to_rfc3339(),
                submission.shift.to_string(),
                submission.distance_km,
                submission.duration_seconds,
                &submission.description,
                &submission.gpx,
            ),
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        info!(
            "stored submission id={} route={} operator={} shift={}",
            id, submission.route_id, submission.operator, submission.shift
        );
        Ok(id)
    }
}

fn build_where_clause(filter: &SubmissionFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut where_clause = String::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(operator) = &filter.operator {
        where_clause.push_str(" AND operator = ?");
        params.push(Box::new(operator.clone()));
    }
    if let Some(route_id) = &filter.route_id {
        where_clause.push_str(" AND route_id LIKE ?");
        params.push(Box::new(format!("%{}%", route_id)));
    }
    if let Some(description) = &filter.description {
        where_clause.push_str(" AND description LIKE ?");
        params.push(Box::new(format!("%{}%", description)));
    }
    if let Some(shift) = filter.shift {
        where_clause.push_str(" AND shift = ?");
        params.push(Box::new(shift.to_string()));
    }
    if let Some(from_date) = filter.from_date {
        where_clause.push_str(" AND date(substr(submitted_at, 1, 10)) >= date(?)");
        params.push(Box::new(from_date.to_string()));
    }
    if let Some(to_date) = filter.to_date {
        where_clause.push_str(" AND date(substr(submitted_at, 1, 10)) <= date(?)");
        params.push(Box::new(to_date.to_string()));
    }

    (where_clause, params)
}

fn submission_of_row(row: &rusqlite::Row) -> Result<SubmissionRow> {
    let submitted_at: String = row.get(3)?;
    let shift: String = row.get(4)?;
    Ok(SubmissionRow {
        id: row.get(0)?,
        route_id: row.get(1)?,
        operator: row.get(2)?,
        submitted_at: DateTime::parse_from_rfc3339(&submitted_at)?.with_timezone(&Utc),
        shift: Shift::from_str(&shift)
            .map_err(|_| anyhow!("invalid shift in DB row: {:?}", shift))?,
        distance_km: row.get(5)?,
        duration_seconds: row.get(6)?,
        description: row.get(7)?,
        gpx: row.get(8)?,
    })
}

use anyhow::{anyhow, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, Params, Row};
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{
    Company, File, Job, JobAggregateRow, JobDetailRow, JobWithRelations, LazyJobDetails,
};
use crate::schema::{self, COMPANY, FILES, FILE_JOB, JOBS, JOB_COMPANY};

pub struct DbConfig {
    pub path: PathBuf,
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl DbConfig {
    /// `<name>.db` in the per-user data directory, or in the working
    /// directory when no home directory can be resolved.
    pub fn default_path(name: &str) -> PathBuf {
        let file = format!("{}.db", name);
        match directories::ProjectDirs::from("", "", "jobbench") {
            Some(dirs) => dirs.data_dir().join(file),
            None => PathBuf::from(file),
        }
    }

    /// SQLite URI opening the database file read-only.
    pub fn connection_uri(&self) -> String {
        let path = self.path.to_string_lossy();
        let escaped = path
            .replace('%', "%25")
            .replace('?', "%3f")
            .replace('#', "%23");
        format!("file:{}?mode=ro", escaped)
    }
}

pub struct Database {
    conn: Connection,
    queries: Cell<usize>,
}

impl Database {
    /// Open the store, retrying with a fixed delay until it is reachable and
    /// the benchmark tables exist.
    pub fn connect(config: &DbConfig) -> Result<Self> {
        let mut last_err = None;

        for attempt in 1..=config.max_retries {
            match Self::open(config) {
                Ok(db) => {
                    info!(path = %config.path.display(), "Successfully connected to database");
                    return Ok(db);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_retries = config.max_retries,
                        error = %format!("{:#}", e),
                        "Failed to connect to database"
                    );
                    last_err = Some(e);
                    if attempt < config.max_retries {
                        thread::sleep(config.retry_interval);
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| anyhow!("no connection attempts were made"));
        Err(err.context(format!(
            "failed to connect database after {} attempts",
            config.max_retries
        )))
    }

    fn open(config: &DbConfig) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(config.connection_uri(), flags)
            .with_context(|| format!("Failed to open {}", config.path.display()))?;
        let db = Self::from_connection(conn)?;
        db.ensure_schema()?;
        Ok(db)
    }

    /// Wrap an already-open connection. Registers the `rarray` function the
    /// batched lookups rely on.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        rusqlite::vtab::array::load_module(&conn).context("Failed to load rarray module")?;
        Ok(Self {
            conn,
            queries: Cell::new(0),
        })
    }

    pub fn ensure_schema(&self) -> Result<()> {
        for table in schema::TABLES {
            let found: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table.name],
                |row| row.get(0),
            )?;
            if found == 0 {
                return Err(anyhow!("Table '{}' not found", table.name));
            }
        }
        Ok(())
    }

    /// Number of statements executed since the last call.
    pub fn take_query_count(&self) -> usize {
        self.queries.replace(0)
    }

    fn query_rows<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.queries.set(self.queries.get() + 1);
        debug!(sql, "query");
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, f)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // --- Retrieval strategies ---

    /// Jobs with company and files attached, in three round trips.
    pub fn eager_load_jobs(&self) -> Result<Vec<JobWithRelations>> {
        let jobs = self
            .query_rows(
                &format!("SELECT {} FROM {}", JOBS.select_list(false), JOBS.name),
                [],
                Self::row_to_job,
            )
            .context("Failed to fetch jobs")?;

        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let company_ids: BTreeSet<&str> = jobs
            .iter()
            .map(|j| j.company_id.as_str())
            .filter(|id| !id.is_empty())
            .collect();
        let company_ids: Vec<Value> = company_ids
            .into_iter()
            .map(|id| Value::Text(id.to_string()))
            .collect();

        let companies: HashMap<String, Company> = self
            .query_rows(
                &format!(
                    "SELECT {} FROM {} WHERE {} IN rarray(?1)",
                    COMPANY.select_list(false),
                    COMPANY.name,
                    COMPANY.primary_key
                ),
                params![Rc::new(company_ids)],
                Self::row_to_company,
            )
            .context("Failed to fetch companies")?
            .into_iter()
            .map(|c| (c.company_id.clone(), c))
            .collect();

        let job_ids: Vec<Value> = jobs.iter().map(|j| Value::Text(j.uuid.clone())).collect();

        let mut files_by_job: HashMap<String, Vec<File>> = HashMap::new();
        for file in self
            .query_rows(
                &format!(
                    "SELECT {} FROM {} WHERE {} IN rarray(?1)",
                    FILES.select_list(false),
                    FILES.name,
                    FILE_JOB.column
                ),
                params![Rc::new(job_ids)],
                Self::row_to_file,
            )
            .context("Failed to fetch files")?
        {
            files_by_job.entry(file.job_id.clone()).or_default().push(file);
        }

        Ok(jobs
            .into_iter()
            .map(|job| {
                let company = companies.get(&job.company_id).cloned().unwrap_or_default();
                let files = files_by_job.remove(&job.uuid).unwrap_or_default();
                JobWithRelations { job, company, files }
            })
            .collect())
    }

    /// One flat row per (job, file) pair from a single left join.
    pub fn join_job_details(&self) -> Result<Vec<JobDetailRow>> {
        let sql = format!(
            "SELECT jobs.uuid AS job_id, jobs.job_title, jobs.company_id, company.company_name,
                    jobs.location, jobs.salary, jobs.posted_date, files.file_id, files.file_name
             FROM {} {} {}",
            JOBS.name,
            JOB_COMPANY.left_join(&COMPANY),
            FILE_JOB.left_join(&FILES),
        );
        self.query_rows(&sql, [], Self::row_to_detail)
            .context("Failed to fetch joined job details")
    }

    /// First `limit` jobs, then one company lookup and one files lookup per job.
    pub fn lazy_load_jobs(&self, limit: u32) -> Result<Vec<LazyJobDetails>> {
        let jobs = self
            .query_rows(
                &format!("SELECT {} FROM {} LIMIT ?1", JOBS.select_list(false), JOBS.name),
                [limit],
                Self::row_to_job,
            )
            .context("Failed to fetch jobs")?;

        let company_sql = format!(
            "SELECT {} FROM {} WHERE {pk} = ?1 ORDER BY {pk} LIMIT 1",
            COMPANY.select_list(false),
            COMPANY.name,
            pk = COMPANY.primary_key,
        );
        let files_sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            FILES.select_list(false),
            FILES.name,
            FILE_JOB.column,
        );

        let mut details = Vec::with_capacity(jobs.len());
        for job in jobs {
            let company = self
                .query_rows(&company_sql, [&job.company_id], Self::row_to_company)
                .with_context(|| format!("Failed to fetch company for job {}", job.uuid))?
                .into_iter()
                .next()
                .unwrap_or_default();
            let files = self
                .query_rows(&files_sql, [&job.uuid], Self::row_to_file)
                .with_context(|| format!("Failed to fetch files for job {}", job.uuid))?;
            details.push(LazyJobDetails { job, company, files });
        }

        Ok(details)
    }

    /// One row per job with company and files built as JSON by the engine.
    pub fn aggregate_job_details(&self) -> Result<Vec<JobAggregateRow>> {
        let sql = r#"
            SELECT
                jobs.uuid AS job_id,
                jobs.job_title,
                jobs.company_id,
                (
                    SELECT json_object('company_id', company.company_id, 'company_name', company.company_name)
                    FROM company
                    WHERE company.company_id = jobs.company_id
                ) AS company,
                jobs.location,
                jobs.salary,
                jobs.posted_date,
                (
                    SELECT json_group_array(json_object('file_id', files.file_id, 'file_name', files.file_name))
                    FROM files
                    WHERE files.job_id = jobs.uuid
                ) AS files
            FROM jobs
        "#;
        self.query_rows(sql, [], Self::row_to_aggregate)
            .context("Failed to fetch aggregated job details")
    }

    fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
        Ok(Job {
            uuid: row.get(0)?,
            job_title: text_or_empty(row, 1)?,
            company_id: text_or_empty(row, 2)?,
            location: text_or_empty(row, 3)?,
            salary: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
            posted_date: row.get(5)?,
        })
    }

    fn row_to_company(row: &Row) -> rusqlite::Result<Company> {
        Ok(Company {
            company_id: row.get(0)?,
            company_name: text_or_empty(row, 1)?,
        })
    }

    fn row_to_file(row: &Row) -> rusqlite::Result<File> {
        Ok(File {
            file_id: text_or_empty(row, 0)?,
            file_name: text_or_empty(row, 1)?,
            job_id: row.get(2)?,
        })
    }

    fn row_to_detail(row: &Row) -> rusqlite::Result<JobDetailRow> {
        Ok(JobDetailRow {
            job_id: row.get(0)?,
            job_title: text_or_empty(row, 1)?,
            company_id: row.get(2)?,
            company_name: row.get(3)?,
            location: text_or_empty(row, 4)?,
            salary: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
            posted_date: row.get(6)?,
            file_id: row.get(7)?,
            file_name: row.get(8)?,
        })
    }

    fn row_to_aggregate(row: &Row) -> rusqlite::Result<JobAggregateRow> {
        Ok(JobAggregateRow {
            job_id: row.get(0)?,
            job_title: text_or_empty(row, 1)?,
            company_id: row.get(2)?,
            company: row.get(3)?,
            location: text_or_empty(row, 4)?,
            salary: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
            posted_date: row.get(6)?,
            files: row.get(7)?,
        })
    }
}

/// Nullable text column read as an empty string, like an unset field.
fn text_or_empty(row: &Row, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

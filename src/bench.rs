use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Eager,
    Join,
    Lazy,
    Aggregate,
}

impl Strategy {
    /// Run order for the "all" mode and its summary.
    pub const ALL: [Strategy; 4] = [
        Strategy::Eager,
        Strategy::Join,
        Strategy::Lazy,
        Strategy::Aggregate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Eager => "eager",
            Strategy::Join => "join",
            Strategy::Lazy => "lazy",
            Strategy::Aggregate => "aggregate",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Strategy::Eager => "Eager Loading",
            Strategy::Join => "Join",
            Strategy::Lazy => "Lazy Loading",
            Strategy::Aggregate => "JSON Aggregate",
        }
    }

    pub fn output_file(self) -> &'static str {
        match self {
            Strategy::Eager => "eager_load_output.json",
            Strategy::Join => "join_output.json",
            Strategy::Lazy => "lazy_load_output.json",
            Strategy::Aggregate => "json_aggregate_output.json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub strategy: Strategy,
    pub elapsed: Duration,
    pub records: usize,
    pub queries: usize,
    pub path: PathBuf,
}

pub struct Runner<'a> {
    db: &'a Database,
    output_dir: PathBuf,
    lazy_limit: u32,
}

impl<'a> Runner<'a> {
    pub fn new(db: &'a Database, output_dir: impl Into<PathBuf>, lazy_limit: u32) -> Self {
        Self {
            db,
            output_dir: output_dir.into(),
            lazy_limit,
        }
    }

    /// Fetch, serialize and write one strategy's result, timing the whole thing.
    pub fn run(&self, strategy: Strategy) -> Result<RunReport> {
        let path = self.output_dir.join(strategy.output_file());
        self.db.take_query_count();
        let start = Instant::now();

        let records = match strategy {
            Strategy::Eager => write_json(&path, &self.db.eager_load_jobs()?)?,
            Strategy::Join => write_json(&path, &self.db.join_job_details()?)?,
            Strategy::Lazy => write_json(&path, &self.db.lazy_load_jobs(self.lazy_limit)?)?,
            Strategy::Aggregate => write_json(&path, &self.db.aggregate_job_details()?)?,
        };

        let elapsed = start.elapsed();
        let queries = self.db.take_query_count();
        debug!(strategy = strategy.name(), queries, "round trips");
        info!(
            strategy = strategy.name(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            records,
            output = %path.display(),
            "{} took {:?}",
            strategy.name(),
            elapsed
        );

        Ok(RunReport {
            strategy,
            elapsed,
            records,
            queries,
            path,
        })
    }

    /// Run every strategy in order, stopping at the first failure.
    pub fn run_all(&self) -> Result<Vec<RunReport>> {
        let start = Instant::now();
        let reports = Strategy::ALL
            .iter()
            .map(|&s| self.run(s))
            .collect::<Result<Vec<_>>>()?;

        for report in &reports {
            info!(
                strategy = report.strategy.name(),
                elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
                records = report.records,
                queries = report.queries,
                output = %report.path.display(),
                "{} took {:?}",
                report.strategy.label(),
                report.elapsed
            );
        }
        info!(elapsed = ?start.elapsed(), "All strategies finished");

        Ok(reports)
    }
}

/// Write `rows` as indented JSON to `path`, replacing any existing file.
/// Returns the number of records written.
pub fn write_json<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize> {
    let json = serde_json::to_vec_pretty(rows).context("Failed to marshal JSON")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{acme_db, seeded_db};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jobbench-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("Failed to create scratch dir");
        dir
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_output_file_names() {
        let names: Vec<_> = Strategy::ALL.iter().map(|s| s.output_file()).collect();
        assert_eq!(
            names,
            vec![
                "eager_load_output.json",
                "join_output.json",
                "lazy_load_output.json",
                "json_aggregate_output.json"
            ]
        );
    }

    #[test]
    fn test_write_json_overwrites_and_indents() {
        let dir = scratch_dir("write");
        let path = dir.join("out.json");
        std::fs::write(&path, "stale contents that are longer than the new ones").unwrap();

        let written = write_json(&path, &[serde_json::json!({"a": 1})]).unwrap();
        assert_eq!(written, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[\n  {\n    \"a\": 1\n  }\n]");
    }

    #[test]
    fn test_write_json_missing_dir_fails() {
        let path = std::env::temp_dir().join("jobbench-no-such-dir/out/x.json");
        let err = write_json::<u8>(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("Failed to write JSON"));
    }

    #[test]
    fn test_run_reports_records_and_queries() {
        let db = seeded_db();
        let dir = scratch_dir("run");
        let runner = Runner::new(&db, &dir, 50);

        let eager = runner.run(Strategy::Eager).unwrap();
        assert_eq!((eager.records, eager.queries), (3, 3));

        let join = runner.run(Strategy::Join).unwrap();
        assert_eq!((join.records, join.queries), (4, 1));

        let lazy = runner.run(Strategy::Lazy).unwrap();
        assert_eq!((lazy.records, lazy.queries), (3, 7));

        let aggregate = runner.run(Strategy::Aggregate).unwrap();
        assert_eq!((aggregate.records, aggregate.queries), (3, 1));
        assert_eq!(aggregate.path, dir.join("json_aggregate_output.json"));
    }

    #[test]
    fn test_run_all_order_and_outputs() {
        let db = acme_db(true);
        let dir = scratch_dir("all");
        let reports = Runner::new(&db, &dir, 50).run_all().unwrap();

        let order: Vec<_> = reports.iter().map(|r| r.strategy).collect();
        assert_eq!(order, Strategy::ALL.to_vec());
        for strategy in Strategy::ALL {
            let value = read_json(&dir.join(strategy.output_file()));
            assert_eq!(value.as_array().unwrap().len(), 1);
        }

        let eager = read_json(&dir.join(Strategy::Eager.output_file()));
        assert_eq!(eager[0]["Files"][0]["FileName"], "resume.pdf");
    }

    #[test]
    fn test_run_is_idempotent() {
        let db = seeded_db();
        let dir = scratch_dir("idem");
        let runner = Runner::new(&db, &dir, 50);

        for strategy in Strategy::ALL {
            let path = runner.run(strategy).unwrap().path;
            let first = std::fs::read(&path).unwrap();
            runner.run(strategy).unwrap();
            assert_eq!(first, std::fs::read(&path).unwrap(), "{} drifted", strategy.name());
        }
    }
}

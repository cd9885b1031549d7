//! Static descriptors for the three tables the benchmarks read.
//!
//! Queries build their column lists from these so the table shapes are
//! declared in exactly one place.

pub struct Table {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [&'static str],
}

/// A many-to-one link: `from.column` references `to.primary_key`.
pub struct Relation {
    pub from: &'static Table,
    pub column: &'static str,
    pub to: &'static Table,
}

pub const COMPANY: Table = Table {
    name: "company",
    primary_key: "company_id",
    columns: &["company_id", "company_name"],
};

pub const JOBS: Table = Table {
    name: "jobs",
    primary_key: "uuid",
    columns: &["uuid", "job_title", "company_id", "location", "salary", "posted_date"],
};

pub const FILES: Table = Table {
    name: "files",
    primary_key: "file_id",
    columns: &["file_id", "file_name", "job_id"],
};

pub const TABLES: [&Table; 3] = [&COMPANY, &JOBS, &FILES];

pub const JOB_COMPANY: Relation = Relation {
    from: &JOBS,
    column: "company_id",
    to: &COMPANY,
};

pub const FILE_JOB: Relation = Relation {
    from: &FILES,
    column: "job_id",
    to: &JOBS,
};

impl Table {
    /// Comma-separated column list, optionally qualified with the table name.
    pub fn select_list(&self, qualified: bool) -> String {
        self.columns
            .iter()
            .map(|c| {
                if qualified {
                    format!("{}.{}", self.name, c)
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Relation {
    /// `LEFT JOIN` clause bringing in whichever side of the relation is `target`.
    pub fn left_join(&self, target: &Table) -> String {
        format!(
            "LEFT JOIN {} ON {}.{} = {}.{}",
            target.name, self.from.name, self.column, self.to.name, self.to.primary_key,
        )
    }
}

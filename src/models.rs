use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(rename = "CompanyID")]
    pub company_id: String,
    #[serde(rename = "CompanyName")]
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "JobTitle")]
    pub job_title: String,
    #[serde(rename = "CompanyID")]
    pub company_id: String, // empty when NULL; not enforced, may point nowhere
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Salary")]
    pub salary: f64,
    #[serde(rename = "PostedDate")]
    pub posted_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "FileID")]
    pub file_id: String,
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
}

/// A job with its company and files attached in batched lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobWithRelations {
    #[serde(flatten)]
    pub job: Job,
    #[serde(rename = "Company")]
    pub company: Company,
    #[serde(rename = "Files")]
    pub files: Vec<File>,
}

/// A job with its company and files fetched one query at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LazyJobDetails {
    pub job: Job,
    pub company: Company,
    pub files: Vec<File>,
}

/// One row of the jobs/company/files left join. Repeats per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetailRow {
    pub job_id: String,
    pub job_title: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub location: String,
    pub salary: f64,
    pub posted_date: NaiveDate,
    pub file_id: Option<String>,
    pub file_name: Option<String>,
}

/// A job row whose company and files were encoded as JSON text by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAggregateRow {
    pub job_id: String,
    pub job_title: String,
    pub company_id: Option<String>,
    pub company: Option<String>,
    pub location: String,
    pub salary: f64,
    pub posted_date: NaiveDate,
    pub files: Option<String>,
}

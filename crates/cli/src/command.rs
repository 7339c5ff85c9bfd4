//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use resumatch_core::types::DbId;

#[derive(Parser, Debug)]
#[command(
    name = "resumatch",
    version,
    about = "Score résumés against job postings",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account and log in.
    Signup { email: String, password: String },

    /// Log in and store the session.
    Login { email: String, password: String },

    /// Forget the stored session.
    Logout,

    /// List uploaded résumés.
    Resumes,

    /// Upload a résumé (pdf, doc, docx).
    Upload { path: PathBuf },

    /// List parsed job postings.
    Jobs,

    /// Parse a job posting from its URL.
    Parse { url: String },

    /// Score one résumé against a job.
    Match {
        resume_id: DbId,
        /// Job posting id, or @file.json for a custom job description.
        #[arg(value_parser = parse_job)]
        job: JobArg,
    },

    /// Score several résumés against a job.
    Bulk {
        /// Job posting id, or @file.json for a custom job description.
        #[arg(value_parser = parse_job)]
        job: JobArg,
        #[arg(required = true)]
        resume_ids: Vec<DbId>,
    },

    /// List past match results.
    History,
}

/// The job side of `match` and `bulk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobArg {
    Posting(DbId),
    /// Path to a JSON file describing the job.
    Custom(PathBuf),
}

fn parse_job(raw: &str) -> Result<JobArg, String> {
    match raw.strip_prefix('@') {
        Some("") => Err("expected a file name after '@'".to_string()),
        Some(path) => Ok(JobArg::Custom(path.into())),
        None => raw
            .parse()
            .map(JobArg::Posting)
            .map_err(|_| format!("not a job posting id: {raw}")),
    }
}

//! Terminal output for operation progress and results.

use resumatch_core::models::{BulkMatchItem, JobPosting, MatchResult, Resume};
use resumatch_orchestrator::{OperationState, ProgressSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub(crate) fn progress_line(progress: &ProgressSnapshot) -> String {
    if progress.total == 100 {
        format!("[{:>3}%] {}", progress.current, progress.label)
    } else {
        format!("[{}/{}] {}", progress.current, progress.total, progress.label)
    }
}

/// Print each new progress snapshot to stderr until the operation settles.
pub(crate) fn spawn_progress<T>(mut rx: watch::Receiver<OperationState<T>>) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut shown: Option<ProgressSnapshot> = None;
        loop {
            let (progress, settled) = {
                let state = rx.borrow_and_update();
                (state.progress().cloned(), state.result().is_some())
            };
            if settled {
                return;
            }
            if let Some(progress) = progress {
                if shown.as_ref() != Some(&progress) {
                    eprintln!("{}", progress_line(&progress));
                    shown = Some(progress);
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
}

pub(crate) fn match_result(result: &MatchResult) -> String {
    let mut out = format!("Score: {}/100", result.score);
    if !result.missing_keywords.is_empty() {
        out.push_str(&format!(
            "\nMissing keywords: {}",
            result.missing_keywords.join(", ")
        ));
    }
    for suggestion in &result.suggestions {
        out.push_str(&format!("\n  - {suggestion}"));
    }
    out
}

/// Bulk results, best score first.
pub(crate) fn bulk_results(items: &[BulkMatchItem]) -> String {
    let mut items: Vec<&BulkMatchItem> = items.iter().collect();
    items.sort_by(|a, b| b.match_result.score.cmp(&a.match_result.score));
    items
        .iter()
        .map(|item| {
            format!(
                "{:>3}  #{:<6} {}",
                item.match_result.score, item.resume_id, item.resume_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn job_posting(job: &JobPosting) -> String {
    let mut out = format!("#{} {}", job.id, job.title);
    if let Some(company) = &job.company {
        out.push_str(&format!(" at {company}"));
    }
    out.push_str(&format!("\n    {}", job.url));
    if !job.skills.is_empty() {
        out.push_str(&format!("\n    Skills: {}", job.skills.join(", ")));
    }
    out
}

pub(crate) fn resume(resume: &Resume) -> String {
    match resume.created_at {
        Some(created) => format!(
            "#{} {} ({})",
            resume.id,
            resume.filename,
            created.format("%Y-%m-%d")
        ),
        None => format!("#{} {}", resume.id, resume.filename),
    }
}

pub(crate) fn history_entry(result: &MatchResult) -> String {
    let id = |id: Option<i64>| id.map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "{:>3}  resume {} / job {}",
        result.score,
        id(result.resume_id),
        id(result.job_posting_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: i32) -> MatchResult {
        MatchResult {
            id: None,
            user_id: None,
            resume_id: Some(1),
            job_posting_id: None,
            score,
            missing_keywords: vec!["rust".into(), "tokio".into()],
            suggestions: vec!["Mention async work".into()],
            created_at: None,
        }
    }

    #[test]
    fn progress_lines() {
        let percent = ProgressSnapshot {
            current: 40,
            total: 100,
            label: "Scoring".into(),
        };
        assert_eq!(progress_line(&percent), "[ 40%] Scoring");

        let counter = ProgressSnapshot {
            current: 2,
            total: 5,
            label: "cv.pdf".into(),
        };
        assert_eq!(progress_line(&counter), "[2/5] cv.pdf");
    }

    #[test]
    fn match_result_lists_keywords_and_suggestions() {
        let out = match_result(&result(72));
        assert!(out.starts_with("Score: 72/100"));
        assert!(out.contains("Missing keywords: rust, tokio"));
        assert!(out.contains("  - Mention async work"));
    }

    #[test]
    fn bulk_results_sorted_by_score() {
        let items = vec![
            BulkMatchItem {
                resume_id: 1,
                resume_name: "low.pdf".into(),
                match_result: result(30),
            },
            BulkMatchItem {
                resume_id: 2,
                resume_name: "high.pdf".into(),
                match_result: result(90),
            },
        ];
        let out = bulk_results(&items);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("high.pdf"));
        assert!(lines[1].contains("low.pdf"));
    }

    #[test]
    fn history_entry_marks_missing_ids() {
        assert_eq!(history_entry(&result(55)), " 55  resume 1 / job -");
    }
}

//! Table rows and formatting helpers for terminal output

use chrono::DateTime;
use colored::{ColoredString, Colorize};
use scrapetrack_core::application::JobTree;
use scrapetrack_core::domain::{Job, LogEntry, LogLevel, Page};
use tabled::Tabled;

const QUERY_WIDTH: usize = 48;

#[derive(Tabled)]
pub struct JobRow {
    id: String,
    parent: String,
    status: String,
    cost: String,
    urls: usize,
    started: String,
    finished: String,
    query: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            parent: or_dash(job.parent_job_id.as_deref()),
            status: job.status.to_string(),
            cost: job.research_costs.to_string(),
            urls: job.visited_urls.len(),
            started: format_millis(job.started_at),
            finished: job.finished_at.map_or_else(|| "-".to_string(), format_millis),
            query: truncate(job.query.as_deref().unwrap_or("-"), QUERY_WIDTH),
        }
    }
}

#[derive(Tabled)]
pub struct PageRow {
    id: String,
    url: String,
    title: String,
    chars: usize,
    scraped: String,
}

impl From<&Page> for PageRow {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            url: page.url.clone(),
            title: truncate(page.title.as_deref().unwrap_or("-"), QUERY_WIDTH),
            chars: page.content_length(),
            scraped: format_millis(page.scraped_at),
        }
    }
}

#[derive(Tabled)]
pub struct StatusRow {
    pub status: String,
    pub jobs: i64,
}

pub fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn colored_status(status: &str) -> ColoredString {
    match status {
        "completed" => status.green(),
        "failed" => status.red(),
        "cancelled" => status.yellow(),
        _ => status.cyan(),
    }
}

pub fn colored_level(level: LogLevel) -> ColoredString {
    let label = level.as_str().to_uppercase();
    match level {
        LogLevel::Debug => label.dimmed(),
        LogLevel::Info => label.normal(),
        LogLevel::Warning => label.yellow(),
        LogLevel::Error => label.red(),
        LogLevel::Critical => label.red().bold(),
    }
}

pub fn log_line(entry: &LogEntry) -> String {
    let mut line = format!(
        "{} {:<8} {}",
        format_millis(entry.created_at),
        colored_level(entry.level),
        entry.message
    );
    if !entry.details.is_empty() {
        line.push(' ');
        line.push_str(&serde_json::Value::Object(entry.details.clone()).to_string());
    }
    line
}

/// Indented one-line-per-job rendering of a tree
pub fn render_tree(tree: &JobTree) -> String {
    let mut out = String::new();
    let mut stack = vec![(tree, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        out.push_str(&format!(
            "{}{} [{}] cost={} {}\n",
            "  ".repeat(depth),
            node.job.id,
            colored_status(node.job.status.as_str()),
            node.job.research_costs,
            truncate(node.job.query.as_deref().unwrap_or(""), QUERY_WIDTH)
        ));
        for child in node.children.iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapetrack_core::domain::{Job, JobStatus};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_render_tree_orders_children() {
        colored::control::set_override(false);

        let mut child_a = Job::new_test("a");
        child_a.parent_job_id = Some("root".to_string());
        let mut child_b = Job::new_test("b");
        child_b.parent_job_id = Some("root".to_string());
        let mut root = Job::new("root", 0, JobStatus::in_progress());
        root.query = Some("root query".to_string());

        let tree = JobTree {
            job: root,
            children: vec![
                JobTree {
                    job: child_a.clone(),
                    children: vec![],
                },
                JobTree {
                    job: child_b.clone(),
                    children: vec![],
                },
            ],
        };

        let rendered = render_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("root "));
        assert!(lines[1].starts_with(&format!("  {} ", child_a.id)));
        assert!(lines[2].starts_with(&format!("  {} ", child_b.id)));
    }
}

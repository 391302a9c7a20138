//! File glue around the pipeline
//!
//! Reads identifier lists (Mastodon follow exports, plain lists, or a
//! directory of JSON follow records) and writes the confirmed result CSV,
//! the error CSV, and an HTML page of profile links.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{CheckerError, CheckerResult};
use crate::types::{ErrorLog, ResultSet};

/// Column holding the address in Mastodon exports and in our own output
pub const ACCOUNT_COLUMN: &str = "Account address";
pub const PROFILE_URL_COLUMN: &str = "Profile URL";

/// Reads and writes pipeline inputs and outputs
pub struct FileManager;

impl FileManager {
    /// Read raw identifiers from a CSV, a plain list, or a directory of JSON records
    pub async fn read_identifiers(path: &Path) -> CheckerResult<Vec<String>> {
        let metadata = fs::metadata(path).await.map_err(|_| CheckerError::FileError {
            operation: "stat".to_string(),
            path: path.display().to_string(),
        })?;

        if metadata.is_dir() {
            return Self::read_json_subjects(path).await;
        }

        let content = fs::read_to_string(path).await.map_err(|_| CheckerError::FileError {
            operation: "read".to_string(),
            path: path.display().to_string(),
        })?;

        if is_csv(path) {
            Ok(parse_account_column(&content))
        } else {
            Ok(parse_plain_list(&content))
        }
    }

    /// Identifiers from the `subject` field of every `*.json` file in `dir`, sorted by file name
    async fn read_json_subjects(dir: &Path) -> CheckerResult<Vec<String>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut subjects = Vec::with_capacity(files.len());
        for file in files {
            let content = fs::read_to_string(&file).await?;
            let json: serde_json::Value = serde_json::from_str(&content)?;
            if let Some(subject) = json.get("subject").and_then(|s| s.as_str()) {
                subjects.push(subject.to_string());
            }
        }
        Ok(subjects)
    }

    pub async fn write_results_csv(path: &Path, results: &ResultSet) -> CheckerResult<()> {
        let mut out = format!("{ACCOUNT_COLUMN},{PROFILE_URL_COLUMN}\n");
        for entry in results {
            out.push_str(&format!("{},{}\n", csv_escape(entry.identifier.as_str()), csv_escape(&entry.link)));
        }
        Self::write(path, out).await
    }

    pub async fn write_errors_csv(path: &Path, errors: &ErrorLog) -> CheckerResult<()> {
        let mut out = format!("{ACCOUNT_COLUMN},Error\n");
        for entry in errors {
            out.push_str(&format!("{},{}\n", csv_escape(entry.identifier.as_str()), csv_escape(&entry.message)));
        }
        Self::write(path, out).await
    }

    pub async fn write_link_page(path: &Path, results: &ResultSet) -> CheckerResult<()> {
        Self::write(path, render_link_page(results)).await
    }

    async fn write(path: &Path, content: String) -> CheckerResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await.map_err(|_| CheckerError::FileError {
            operation: "write".to_string(),
            path: path.display().to_string(),
        })
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// One entry per non-empty line, `#` lines skipped
pub fn parse_plain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Values of the `Account address` column, or the first column if there is none
pub fn parse_account_column(content: &str) -> Vec<String> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let header = parse_csv_line(header.trim_start_matches('\u{feff}'));
    let column = header
        .iter()
        .position(|name| name.trim().eq_ignore_ascii_case(ACCOUNT_COLUMN))
        .unwrap_or(0);

    lines
        .filter_map(|line| parse_csv_line(line).into_iter().nth(column))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Split one CSV line, honoring double-quoted fields and `""` escapes
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

pub fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone page with one link per confirmed profile
pub fn render_link_page(results: &ResultSet) -> String {
    let links: Vec<String> = results
        .iter()
        .map(|entry| {
            let url = html_escape(&entry.link);
            format!("<a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{url}</a><br>")
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Profile URLs</title>\n\
         <style>a {{ text-decoration: none; color: blue; }} a:hover {{ text-decoration: underline; }}</style>\n\
         </head>\n<body>\n{}\n</body>\n</html>\n",
        links.join("\n")
    )
}

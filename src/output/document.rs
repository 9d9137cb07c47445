//! Plain-text documents for retrieval
//!
//! Each record becomes one deterministic text document holding the source,
//! category path, update date, question, cleaned answer and law names. Raw
//! markup, URLs, fetch times and page chrome are left out.

use crate::output::OutputResult;
use crate::record::{Record, Source};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Answer lines containing any of these are page chrome
const NOISE_KEYWORDS: [&str; 37] = [
    "FACEBOOK", "facebook", "FB", "fb", "Line", "line", "LINE", "Twitter", "twitter",
    "友善列印", "列印", "Print", "print", "回上頁", "上一頁", "回首頁", "瀏覽人次", "點閱數",
    "點閱次數", "更新日期", "發布日期", "分享至", "Share", "share", ":::", "跳到主要內容區塊",
    "網站導覽", "網站地圖", "相關連結", "相關網站", "無障礙", "accessibility", "瀏覽次數",
    "人氣", "回頁首", "字級", "RSS",
];

/// Endings of names that look like laws or regulations
const LAW_SUFFIXES: [&str; 10] = [
    "法", "條例", "辦法", "規則", "細則", "要點", "準則", "綱要", "規定", "標準",
];

/// Openings of sentence fragments that were mistaken for law names
const FRAGMENT_PREFIXES: [&str; 19] = [
    "依", "按", "次依", "又", "如", "即", "並", "則", "係", "為", "有", "含", "下稱", "上開",
    "適用", "事業", "雇主", "勞雇", "比照",
];

/// Counts from one export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub output_dir: PathBuf,
    pub total: usize,
    pub written: usize,
    pub failed: usize,
    pub bytes: u64,
    pub by_source: BTreeMap<Source, usize>,
}

/// Formats a record as a plain-text document
///
/// # Arguments
///
/// * `record` - The record to format
///
/// # Returns
///
/// The document text; its identifier is the record id
pub fn format_document(record: &Record) -> String {
    let mut lines = Vec::new();

    lines.push(format!("來源: {}", record.source().display_name()));

    let category = collapse_spaces(record.category());
    let subcategory = collapse_spaces(record.subcategory());
    if !category.is_empty() {
        if !subcategory.is_empty() && subcategory != category {
            lines.push(format!("分類: {} > {}", category, subcategory));
        } else {
            lines.push(format!("分類: {}", category));
        }
    }

    if let Some(date) = record.effective_date() {
        lines.push(format!("更新日期: {}", date.format("%Y-%m-%d")));
    }

    lines.push(String::new());
    lines.push(format!("問: {}", collapse_spaces(record.question())));

    let answer = clean_answer(&record.answer().text);
    if !answer.is_empty() {
        lines.push(String::new());
        lines.push(format!("答: {}", answer));
    }

    let mut laws: Vec<String> = Vec::new();
    for reference in record.related_references() {
        let name = collapse_spaces(&reference.name);
        if is_law_name(&name) && !laws.contains(&name) {
            laws.push(name);
        }
    }
    if !laws.is_empty() {
        lines.push(String::new());
        lines.push(format!("相關法規: {}", laws.join(", ")));
    }

    lines.join("\n")
}

/// Writes one `{id}.txt` document per record into `dir`
///
/// A record that cannot be written is logged and counted, not fatal.
pub fn export_documents<'a, I>(dir: &Path, records: I) -> OutputResult<ExportSummary>
where
    I: IntoIterator<Item = &'a Record>,
{
    fs::create_dir_all(dir)?;

    let mut summary = ExportSummary {
        output_dir: dir.to_path_buf(),
        ..ExportSummary::default()
    };

    for record in records {
        summary.total += 1;
        let path = dir.join(format!("{}.txt", record.id()));
        let text = format_document(record);

        match fs::write(&path, text.as_bytes()) {
            Ok(()) => {
                debug!("Wrote {}", path.display());
                summary.written += 1;
                summary.bytes += text.len() as u64;
                *summary.by_source.entry(record.source()).or_insert(0) += 1;
            }
            Err(e) => {
                warn!("Failed to write {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Exported {} of {} documents to {} ({:.2} KB)",
        summary.written,
        summary.total,
        dir.display(),
        summary.bytes as f64 / 1024.0
    );

    Ok(summary)
}

fn collapse_spaces(text: &str) -> String {
    strip_tags(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(text: &str) -> String {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    match TAG.get_or_init(|| Regex::new(r"<[^>]+>").ok()) {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

fn is_noise_line(line: &str) -> bool {
    NOISE_KEYWORDS.iter().any(|keyword| line.contains(keyword))
        || line.chars().count() <= 2
        || line.chars().all(|c| matches!(c, '-' | '=' | '_' | '*' | '#'))
}

/// Answer text without chrome lines and with blank runs collapsed
fn clean_answer(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;

    let stripped = strip_tags(text);
    for line in stripped.lines().map(str::trim) {
        if line.is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
            continue;
        }
        if is_noise_line(line) {
            continue;
        }
        lines.push(line);
        previous_blank = false;
    }

    lines.join("\n").trim().to_string()
}

fn is_law_name(name: &str) -> bool {
    let length = name.chars().count();
    (3..=25).contains(&length)
        && LAW_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        && !FRAGMENT_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        && !name.contains("下稱")
        && !name.contains("係指")
}

//! Harvested question/answer records
//!
//! A [`RecordDraft`] is what a source strategy extracts from a detail page.
//! It becomes an immutable [`Record`] once the orchestrator assigns an id and
//! a fetch timestamp. Construction and deserialization both validate, so a
//! `Record` value always satisfies:
//! - a non-empty id and question
//! - answer markup never present without plain text
//! - `updated_date >= published_date` when both are known

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Answer markup is cut to this many characters before storage
pub const MAX_MARKUP_CHARS: usize = 10_000;

/// Date key used in ids and indexes when a record carries no date
pub const UNKNOWN_DATE_KEY: &str = "unknown";

/// The FAQ sites this crate knows how to harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Ministry of Labor
    Mol,
    /// Bureau of Labor Insurance
    Bli,
    /// Occupational Safety and Health Administration
    Osha,
}

impl Source {
    pub fn all() -> [Source; 3] {
        [Source::Mol, Source::Bli, Source::Osha]
    }

    /// Short name used in config files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Mol => "mol",
            Source::Bli => "bli",
            Source::Osha => "osha",
        }
    }

    /// Directory name of the source's store and prefix of its record ids
    pub fn slug(&self) -> &'static str {
        match self {
            Source::Mol => "mol_faq",
            Source::Bli => "bli_faq",
            Source::Osha => "osha_faq",
        }
    }

    /// Name of the publishing agency
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Mol => "勞動部",
            Source::Bli => "勞動部勞工保險局",
            Source::Osha => "職業安全衛生署",
        }
    }

    /// Parse either the short name (`mol`) or the slug (`mol_faq`)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Source::all()
            .into_iter()
            .find(|s| s.as_str() == name || s.slug() == name)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answer body in plain text plus the markup it was extracted from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default)]
    pub html: String,
}

impl Answer {
    /// Build an answer, truncating the markup to [`MAX_MARKUP_CHARS`]
    pub fn new(text: impl Into<String>, html: impl AsRef<str>) -> Self {
        Self {
            text: text.into(),
            html: truncate_chars(html.as_ref(), MAX_MARKUP_CHARS),
        }
    }
}

/// A law or regulation mentioned by an answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Reference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: String::new(),
        }
    }

    pub fn linked(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Reasons a record is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record id is empty")]
    EmptyId,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("answer has markup but no plain text")]
    MissingAnswerText,

    #[error("updated date {updated} precedes published date {published}")]
    DatesOutOfOrder {
        published: NaiveDate,
        updated: NaiveDate,
    },
}

/// Fields extracted from a detail page, before an id is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub source: Source,
    pub category: String,
    pub subcategory: String,
    pub question: String,
    pub answer: Answer,
    pub related_references: Vec<Reference>,
    pub published_date: Option<NaiveDate>,
    pub updated_date: Option<NaiveDate>,
    pub source_url: String,
    pub department: Option<String>,
}

impl RecordDraft {
    pub fn new(source: Source, question: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source,
            category: String::new(),
            subcategory: String::new(),
            question: question.into(),
            answer: Answer::default(),
            related_references: Vec::new(),
            published_date: None,
            updated_date: None,
            source_url: source_url.into(),
            department: None,
        }
    }

    /// `updated_date`, else `published_date`
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.updated_date.or(self.published_date)
    }

    /// `yyyymmdd` of the effective date, or `unknown`
    pub fn date_key(&self) -> String {
        date_key(self.effective_date())
    }

    /// Validate the draft and freeze it into a [`Record`]
    pub fn into_record(
        self,
        id: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Record, ValidationError> {
        Record::try_from(RawRecord {
            id: id.into(),
            source: self.source,
            category: self.category,
            subcategory: self.subcategory,
            question: self.question,
            answer: self.answer,
            related_references: self.related_references,
            published_date: self.published_date,
            updated_date: self.updated_date,
            source_url: self.source_url,
            department: self.department,
            fetched_at,
        })
    }
}

/// An immutable, validated question/answer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Record {
    id: String,
    source: Source,
    category: String,
    subcategory: String,
    question: String,
    answer: Answer,
    related_references: Vec<Reference>,
    published_date: Option<NaiveDate>,
    updated_date: Option<NaiveDate>,
    source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<String>,
    fetched_at: DateTime<Utc>,
}

/// Unvalidated wire form of [`Record`]
#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    source: Source,
    #[serde(default)]
    category: String,
    #[serde(default)]
    subcategory: String,
    question: String,
    #[serde(default)]
    answer: Answer,
    #[serde(default)]
    related_references: Vec<Reference>,
    #[serde(default)]
    published_date: Option<NaiveDate>,
    #[serde(default)]
    updated_date: Option<NaiveDate>,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    department: Option<String>,
    fetched_at: DateTime<Utc>,
}

impl TryFrom<RawRecord> for Record {
    type Error = ValidationError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if raw.question.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        if raw.answer.text.trim().is_empty() && !raw.answer.html.trim().is_empty() {
            return Err(ValidationError::MissingAnswerText);
        }
        if let (Some(published), Some(updated)) = (raw.published_date, raw.updated_date) {
            if updated < published {
                return Err(ValidationError::DatesOutOfOrder { published, updated });
            }
        }

        Ok(Self {
            id: raw.id,
            source: raw.source,
            category: raw.category,
            subcategory: raw.subcategory,
            question: raw.question,
            answer: Answer {
                html: truncate_chars(&raw.answer.html, MAX_MARKUP_CHARS),
                text: raw.answer.text,
            },
            related_references: raw.related_references,
            published_date: raw.published_date,
            updated_date: raw.updated_date,
            source_url: raw.source_url,
            department: raw.department.filter(|d| !d.trim().is_empty()),
            fetched_at: raw.fetched_at,
        })
    }
}

impl Record {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn subcategory(&self) -> &str {
        &self.subcategory
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn related_references(&self) -> &[Reference] {
        &self.related_references
    }

    pub fn published_date(&self) -> Option<NaiveDate> {
        self.published_date
    }

    pub fn updated_date(&self) -> Option<NaiveDate> {
        self.updated_date
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// `updated_date`, else `published_date`
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.updated_date.or(self.published_date)
    }

    /// Keys this record is filed under in the category index
    ///
    /// Both the top-level category and the combined `category > subcategory`
    /// path are indexed, so either level can be queried.
    pub fn category_keys(&self) -> Vec<String> {
        let category = self.category.trim();
        let subcategory = self.subcategory.trim();
        let mut keys = Vec::new();

        match (category.is_empty(), subcategory.is_empty()) {
            (false, false) if category != subcategory => {
                keys.push(category.to_string());
                keys.push(format!("{} > {}", category, subcategory));
            }
            (false, _) => keys.push(category.to_string()),
            (true, false) => keys.push(subcategory.to_string()),
            (true, true) => {}
        }

        keys
    }

    /// Whether this record should replace one with `other_updated`
    ///
    /// Only a strictly newer `updated_date` supersedes. A missing date is
    /// older than any known date.
    pub fn supersedes(&self, other_updated: Option<NaiveDate>) -> bool {
        is_newer(self.updated_date, other_updated)
    }
}

/// Whether `candidate` is a strictly newer `updated_date` than `current`
///
/// A missing date is older than any known date.
pub fn is_newer(candidate: Option<NaiveDate>, current: Option<NaiveDate>) -> bool {
    match (candidate, current) {
        (Some(candidate), Some(current)) => candidate > current,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// `yyyymmdd` for a date, or `unknown`
pub fn date_key(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%Y%m%d").to_string(),
        None => UNKNOWN_DATE_KEY.to_string(),
    }
}

/// Build a record id: `{source_slug}_{date_key}_{sequence:04}`
pub fn record_id(source: Source, date_key: &str, sequence: u32) -> String {
    format!("{}_{}_{:04}", source.slug(), date_key, sequence)
}

/// Split an id into its date key and sequence number
///
/// Returns `None` for ids that were not produced by [`record_id`].
pub fn parse_record_id(id: &str) -> Option<(&str, u32)> {
    let mut parts = id.rsplitn(3, '_');
    let sequence = parts.next()?.parse().ok()?;
    let date_key = parts.next()?;
    parts.next()?;
    Some((date_key, sequence))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

//! Book listing model.

use crate::config::BookFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use uuid::Uuid;

/// A file in the books directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Display title (file stem).
    pub title: String,

    /// Path relative to the books directory, forward slashes.
    pub filename: String,

    /// Absolute or root-joined path on disk.
    #[serde(skip)]
    pub path: PathBuf,

    /// Detected format, if known.
    pub format: Option<BookFormat>,

    /// MIME type served on download.
    pub mime_type: String,

    /// File size in bytes.
    pub size: u64,

    /// Last modified time.
    pub modified: DateTime<Utc>,
}

impl Book {
    /// Describe a file located at `filename` below the books directory.
    pub fn new(filename: String, path: PathBuf, size: u64, modified: DateTime<Utc>) -> Self {
        let name = filename.rsplit('/').next().unwrap_or(&filename);
        let format = BookFormat::from_file_name(name);

        Self {
            title: title_from_file_name(name),
            mime_type: format
                .map(|f| f.mime_type())
                .unwrap_or("application/octet-stream")
                .to_string(),
            format,
            filename,
            path,
            size,
            modified,
        }
    }

    /// Stable identifier derived from the relative filename.
    pub fn id(&self) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, self.filename.as_bytes()).to_string()
    }

    /// Short format label for listings.
    pub fn label(&self) -> String {
        super::format_label(&self.mime_type)
    }

    /// Whether a cover can be requested for this book.
    pub fn has_cover(&self) -> bool {
        self.format.is_some_and(|f| f.has_cover_support())
    }

    /// Filename percent-encoded per segment, for use in URLs.
    pub fn url_path(&self) -> String {
        encode_url_path(&self.filename)
    }
}

/// Percent-encode each `/`-separated segment of a root-relative filename.
pub fn encode_url_path(filename: &str) -> String {
    filename
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// File name without its book extension (`.fb2.zip` counts as one).
pub fn title_from_file_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.ends_with(".fb2.zip") {
        return name[..name.len() - ".fb2.zip".len()].to_string();
    }

    match name.rfind('.') {
        Some(index) if index > 0 => name[..index].to_string(),
        _ => name.to_string(),
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    /// Title A to Z.
    #[serde(rename = "name-asc")]
    NameAsc,
    /// Title Z to A.
    #[serde(rename = "name-desc")]
    NameDesc,
    /// Oldest first.
    #[serde(rename = "date-asc")]
    DateAsc,
    /// Newest first.
    #[default]
    #[serde(rename = "date-desc")]
    DateDesc,
}

impl SortMode {
    /// Query-string value of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::NameAsc => "name-asc",
            SortMode::NameDesc => "name-desc",
            SortMode::DateAsc => "date-asc",
            SortMode::DateDesc => "date-desc",
        }
    }

    /// Parse a query-string value; unknown values fall back to newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("name-asc") => SortMode::NameAsc,
            Some("name-desc") => SortMode::NameDesc,
            Some("date-asc") => SortMode::DateAsc,
            _ => SortMode::DateDesc,
        }
    }

    /// Sort books in place.
    pub fn sort(&self, books: &mut [Book]) {
        let by_name = |a: &Book, b: &Book| -> Ordering {
            a.title.to_lowercase().cmp(&b.title.to_lowercase())
        };

        match self {
            SortMode::NameAsc => books.sort_by(by_name),
            SortMode::NameDesc => books.sort_by(|a, b| by_name(b, a)),
            SortMode::DateAsc => books.sort_by(|a, b| a.modified.cmp(&b.modified)),
            SortMode::DateDesc => books.sort_by(|a, b| b.modified.cmp(&a.modified)),
        }
    }
}

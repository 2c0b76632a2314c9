//! Books directory: listing, path safety and display helpers.

pub mod book;

pub use book::{Book, SortMode};

use crate::error::{AppError, Result};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// List every book below `root`, recursively.
///
/// Hidden files and directories are skipped. A missing root is created and
/// yields an empty listing.
pub fn scan(root: &Path) -> Result<Vec<Book>> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        tracing::info!(path = %root.display(), "Created books directory");
        return Ok(Vec::new());
    }

    let books = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let metadata = e.metadata().ok()?;
            let relative = e.path().strip_prefix(root).ok()?;
            let filename = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let modified = metadata
                .modified()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::Utc::now());

            Some(Book::new(filename, e.path().to_path_buf(), metadata.len(), modified))
        })
        .collect::<Vec<_>>();

    tracing::debug!(path = %root.display(), books = books.len(), "Scanned books directory");
    Ok(books)
}

/// Join an untrusted, root-relative filename onto the books directory.
///
/// Rejects empty names, absolute paths, backslashes and any `..` segment.
pub fn resolve_book_path(root: &Path, filename: &str) -> Result<PathBuf> {
    let filename = filename.trim_start_matches('/');

    if filename.is_empty() || filename.contains('\\') || filename.contains('\0') {
        return Err(AppError::BadRequest(format!("Invalid filename: {}", filename)));
    }

    let relative = Path::new(filename);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if !safe {
        return Err(AppError::BadRequest(format!("Invalid filename: {}", filename)));
    }

    Ok(root.join(relative))
}

/// Short label for a MIME type, as shown in listings.
pub fn format_label(mime_type: &str) -> String {
    let label = match mime_type {
        "application/epub+zip" => "EPUB",
        "application/pdf" => "PDF",
        "application/x-fictionbook+xml" | "application/x-zip-compressed-fb2" => "FB2",
        "application/zip" | "application/x-zip-compressed" => "ZIP",
        "application/x-cbz" | "application/vnd.comicbook+zip" => "CBZ",
        "application/x-cbr" | "application/vnd.comicbook-rar" => "CBR",
        "application/x-cb7" => "CB7",
        "application/x-mobi" | "application/x-mobipocket-ebook" => "MOBI",
        "application/vnd.amazon.ebook" => "AZW",
        "image/vnd.djvu" => "DJVU",
        "text/plain" => "TXT",
        "text/rtf" | "application/rtf" => "RTF",
        "text/html" => "HTML",
        other => {
            let lower = other.to_lowercase();
            if lower.contains("azw") {
                return "AZW".to_string();
            }
            if lower.contains("djvu") {
                return "DJVU".to_string();
            }
            if other.chars().count() > 12 {
                return format!("{}...", other.chars().take(10).collect::<String>());
            }
            other
        }
    };

    label.to_string()
}

/// Format a byte count for display.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", size, UNITS[unit])
}

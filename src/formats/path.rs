//! Archive entry path handling.
//!
//! Zip entry names are posix-style and case-sensitive. References found in
//! control documents are relative to the referencing document, may use
//! backslashes, and are sometimes percent-encoded.

use std::borrow::Cow;

/// Directory portion of an entry path, without trailing slash.
///
/// `OEBPS/content.opf` gives `OEBPS`; `content.opf` gives the empty string.
pub fn parent(path: &str) -> &str {
    path.rfind(['/', '\\']).map_or("", |index| &path[..index])
}

/// Last segment of an entry path.
pub fn file_name(path: &str) -> &str {
    path.rfind(['/', '\\']).map_or(path, |index| &path[index + 1..])
}

/// Lowercased extension of an entry path, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    name.rfind('.')
        .filter(|&index| index > 0)
        .map(|index| name[index + 1..].to_ascii_lowercase())
}

/// Convert separators and collapse `.` and `..` segments.
///
/// A `..` that would climb above the archive root is dropped.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut stack: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    stack.join("/")
}

/// Resolve `href` against the directory of the document that referenced it.
pub fn resolve(base_dir: &str, href: &str) -> String {
    let href = href
        .find(['#', '?'])
        .map_or(href, |position| &href[..position]);

    if base_dir.is_empty() || href.starts_with('/') {
        normalize(href)
    } else {
        normalize(&format!("{}/{}", base_dir, href))
    }
}

/// Percent-decode an entry path, leaving invalid sequences untouched.
pub fn decode(path: &str) -> Cow<'_, str> {
    percent_encoding::percent_decode_str(path).decode_utf8_lossy()
}

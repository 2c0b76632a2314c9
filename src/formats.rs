//! Archive introspection: cover images and bibliographic metadata.
//!
//! A file name selects an [`ArchiveKind`]. Kinds with a canonical control
//! document (EPUB, FictionBook) try their resolver first; whatever they cannot
//! answer falls back to a generic scan of the archive's image entries.

mod epub;
mod fb2;
pub mod path;

pub use epub::{COVER_STRATEGIES, CoverStrategy, EpubResolver, ManifestItem, PackageDocument};
pub use fb2::Fb2Resolver;

use crate::error::InspectError;
use serde::Serialize;
use std::io::{Cursor, Read};
use zip::ZipArchive;
use zip::result::ZipError;

/// An opened archive held fully in memory.
pub type Archive = ZipArchive<Cursor<Vec<u8>>>;

/// Extracted cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverResult {
    /// Raw image bytes as stored in the archive.
    pub bytes: Vec<u8>,
    /// MIME type derived from the entry extension.
    pub mime_type: String,
}

/// Descriptive metadata of a book. Unset fields were not declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    /// Title.
    pub title: Option<String>,
    /// Primary creator (author).
    pub creator: Option<String>,
    /// Identifier (ISBN, UUID URN, ...).
    pub identifier: Option<String>,
    /// Language code.
    pub language: Option<String>,
    /// Publisher.
    pub publisher: Option<String>,
    /// Subject or genre.
    pub subject: Option<String>,
    /// Description or annotation.
    pub description: Option<String>,
    /// Publication date as declared.
    pub date: Option<String>,
    /// Embedded cover image.
    #[serde(skip)]
    pub cover: Option<CoverResult>,
}

/// What the caller wants out of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectMode {
    /// Cover image only.
    Cover,
    /// Metadata, including the cover when one exists.
    Info,
}

/// Result of a successful inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// Produced by [`InspectMode::Cover`].
    Cover(CoverResult),
    /// Produced by [`InspectMode::Info`].
    Info(BookMetadata),
}

/// Output of a format-specific resolver.
///
/// The metadata is always usable once the control documents parsed; the
/// cover may still have failed to resolve.
#[derive(Debug)]
pub struct Resolution {
    /// Descriptive fields, `cover` left unset.
    pub metadata: BookMetadata,
    /// Cover resolved through the format's own indirection.
    pub cover: Result<CoverResult, InspectError>,
}

/// Format-specific cover and metadata resolution.
pub trait ContainerResolver: Send + Sync {
    /// Resolve metadata and cover from an opened archive.
    fn resolve(&self, archive: &mut Archive) -> Result<Resolution, InspectError>;
}

/// Supported container kinds, resolved once from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.epub`
    Epub,
    /// `.fb2.zip`
    FictionBookZip,
    /// `.cbz` and `.zip`
    GenericZip,
}

impl ArchiveKind {
    /// Detect the kind from a file name or path.
    pub fn from_file_name(name: &str) -> Result<Self, InspectError> {
        let lower = name.to_lowercase();

        if lower.ends_with(".epub") {
            Ok(ArchiveKind::Epub)
        } else if lower.ends_with(".fb2.zip") {
            Ok(ArchiveKind::FictionBookZip)
        } else if lower.ends_with(".cbz") || lower.ends_with(".zip") {
            Ok(ArchiveKind::GenericZip)
        } else {
            Err(InspectError::UnsupportedExtension(
                path::extension(name).unwrap_or_default(),
            ))
        }
    }

    /// Resolver for kinds that declare their cover in a control document.
    pub fn resolver(self) -> Option<&'static dyn ContainerResolver> {
        match self {
            ArchiveKind::Epub => Some(&EpubResolver),
            ArchiveKind::FictionBookZip => Some(&Fb2Resolver),
            ArchiveKind::GenericZip => None,
        }
    }
}

/// Whether a path names an archive this module can inspect.
pub fn is_supported(name: &str) -> bool {
    ArchiveKind::from_file_name(name).is_ok()
}

/// Inspect a book file on disk.
///
/// Returns `None` for unsupported extensions, unreadable files, corrupt
/// archives, and archives without any usable image.
pub fn inspect(file: &std::path::Path, mode: InspectMode) -> Option<Inspection> {
    let name = file.file_name()?.to_string_lossy();

    if let Err(e) = ArchiveKind::from_file_name(&name) {
        tracing::debug!(path = %file.display(), error = %e, "Skipping inspection");
        return None;
    }

    match std::fs::read(file) {
        Ok(bytes) => inspect_bytes(&name, bytes, mode),
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "Failed to read book file");
            None
        }
    }
}

/// Extract only the cover of a book file.
pub fn inspect_cover(file: &std::path::Path) -> Option<CoverResult> {
    match inspect(file, InspectMode::Cover)? {
        Inspection::Cover(cover) => Some(cover),
        Inspection::Info(metadata) => metadata.cover,
    }
}

/// Extract metadata (and cover) of a book file.
pub fn inspect_info(file: &std::path::Path) -> Option<BookMetadata> {
    match inspect(file, InspectMode::Info)? {
        Inspection::Info(metadata) => Some(metadata),
        Inspection::Cover(cover) => Some(BookMetadata {
            cover: Some(cover),
            ..BookMetadata::default()
        }),
    }
}

/// Inspect an archive already read into memory.
pub fn inspect_bytes(file_name: &str, bytes: Vec<u8>, mode: InspectMode) -> Option<Inspection> {
    match try_inspect(file_name, bytes, mode) {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(file = file_name, error = %e, "Inspection failed");
            None
        }
    }
}

fn try_inspect(
    file_name: &str,
    bytes: Vec<u8>,
    mode: InspectMode,
) -> Result<Option<Inspection>, InspectError> {
    let kind = ArchiveKind::from_file_name(file_name)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let resolution = kind
        .resolver()
        .and_then(|resolver| match resolver.resolve(&mut archive) {
            Ok(resolution) => Some(resolution),
            Err(e) => {
                tracing::debug!(file = file_name, ?kind, error = %e, "Resolver failed, using image scan");
                None
            }
        });

    match (mode, resolution) {
        (InspectMode::Cover, Some(Resolution { cover: Ok(cover), .. })) => {
            Ok(Some(Inspection::Cover(cover)))
        }
        (InspectMode::Cover, resolution) => {
            if let Some(Resolution { cover: Err(e), .. }) = resolution {
                tracing::debug!(file = file_name, error = %e, "Declared cover unavailable, using image scan");
            }
            Ok(generic_cover(&mut archive)?.map(Inspection::Cover))
        }
        (InspectMode::Info, Some(resolution)) => {
            let mut metadata = resolution.metadata;
            metadata.cover = match resolution.cover {
                Ok(cover) => Some(cover),
                Err(e) => {
                    tracing::debug!(file = file_name, error = %e, "Declared cover unavailable, using image scan");
                    generic_cover(&mut archive).unwrap_or_else(|e| {
                        tracing::debug!(file = file_name, error = %e, "Image scan failed");
                        None
                    })
                }
            };
            Ok(Some(Inspection::Info(metadata)))
        }
        (InspectMode::Info, None) => Ok(generic_cover(&mut archive)?.map(|cover| {
            Inspection::Info(BookMetadata {
                cover: Some(cover),
                ..BookMetadata::default()
            })
        })),
    }
}

/// Image selection rules for archives without a usable control document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePick {
    /// An entry whose last segment is `cover.jpg`, `cover.jpeg` or `cover.png`.
    NamedCover,
    /// The largest `.jpg`/`.jpeg`/`.png` entry by declared size.
    LargestImage,
}

/// Order in which [`ImagePick`] rules are tried.
pub const GENERIC_STRATEGIES: [ImagePick; 2] = [ImagePick::NamedCover, ImagePick::LargestImage];

const COVER_NAMES: [&str; 3] = ["cover.jpg", "cover.jpeg", "cover.png"];
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Listing data of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry path inside the archive.
    pub name: String,
    /// Declared uncompressed size.
    pub size: u64,
}

impl ImagePick {
    /// Pick an entry from the candidate list, in enumeration order.
    pub fn select(self, entries: &[EntryInfo]) -> Option<&EntryInfo> {
        match self {
            ImagePick::NamedCover => entries.iter().find(|entry| {
                let name = path::file_name(&entry.name).to_lowercase();
                COVER_NAMES.contains(&name.as_str())
            }),
            ImagePick::LargestImage => entries
                .iter()
                .filter(|entry| {
                    path::extension(&entry.name)
                        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
                })
                // strictly greater, so the first of equal sizes is kept
                .fold(None, |best: Option<&EntryInfo>, entry| match best {
                    Some(current) if current.size >= entry.size => Some(current),
                    _ => Some(entry),
                }),
        }
    }
}

/// File entries eligible for the image scan, in archive order.
pub fn candidate_entries(archive: &mut Archive) -> Vec<EntryInfo> {
    (0..archive.len())
        .filter_map(|index| {
            let entry = archive.by_index_raw(index).ok()?;
            if entry.is_dir() || entry.name().contains("__MACOSX") {
                return None;
            }
            Some(EntryInfo {
                name: entry.name().to_string(),
                size: entry.size(),
            })
        })
        .collect()
}

/// Run the generic image heuristic.
pub fn generic_cover(archive: &mut Archive) -> Result<Option<CoverResult>, InspectError> {
    let entries = candidate_entries(archive);

    let Some(chosen) = GENERIC_STRATEGIES
        .iter()
        .find_map(|strategy| strategy.select(&entries))
    else {
        return Ok(None);
    };

    let bytes = read_entry(archive, &chosen.name)?
        .ok_or_else(|| InspectError::CoverEntryMissing(chosen.name.clone()))?;

    Ok(Some(CoverResult {
        bytes,
        mime_type: image_mime(&chosen.name).to_string(),
    }))
}

/// Read an entry's bytes, retrying with the percent-decoded name.
///
/// Returns `Ok(None)` when neither name exists.
pub fn read_entry(archive: &mut Archive, name: &str) -> Result<Option<Vec<u8>>, InspectError> {
    let decoded = path::decode(name);
    let candidates = [name, decoded.as_ref()];

    for candidate in candidates {
        match archive.by_name(candidate) {
            Ok(mut entry) => {
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                return Ok(Some(data));
            }
            Err(ZipError::FileNotFound) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(None)
}

/// Read an entry as UTF-8 text, dropping a leading byte order mark.
pub fn read_entry_text(archive: &mut Archive, name: &str) -> Result<Option<String>, InspectError> {
    let Some(bytes) = read_entry(archive, name)? else {
        return Ok(None);
    };

    let mut bytes = bytes;
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }

    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| InspectError::Encoding(name.to_string()))
}

/// MIME type of an image entry, by extension. Defaults to `image/jpeg`.
pub fn image_mime(name: &str) -> &'static str {
    match path::extension(name).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Parse a control document, tolerating a DOCTYPE declaration.
pub(crate) fn parse_xml(text: &str) -> Result<roxmltree::Document<'_>, InspectError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Ok(roxmltree::Document::parse_with_options(text, options)?)
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn text_content(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

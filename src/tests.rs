use crate::config::{BookFormat, Config, Overrides};
use crate::formats::{self, BookMetadata, CoverResult, InspectMode, Inspection};
use crate::library::{self, SortMode};
use crate::opds;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

fn package_xml(metadata: &str, manifest: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">{}</metadata>
  <manifest>{}</manifest>
</package>"#,
        metadata, manifest
    )
}

fn cover(file_name: &str, bytes: Vec<u8>) -> Option<CoverResult> {
    match formats::inspect_bytes(file_name, bytes, InspectMode::Cover)? {
        Inspection::Cover(cover) => Some(cover),
        Inspection::Info(_) => panic!("cover mode returned metadata"),
    }
}

fn info(file_name: &str, bytes: Vec<u8>) -> Option<BookMetadata> {
    match formats::inspect_bytes(file_name, bytes, InspectMode::Info)? {
        Inspection::Info(metadata) => Some(metadata),
        Inspection::Cover(_) => panic!("info mode returned a bare cover"),
    }
}

fn image(size: usize) -> Vec<u8> {
    vec![0xAB; size]
}

// ============================================================================
// EPUB
// ============================================================================

#[test]
fn epub_meta_cover_resolves_relative_to_package() {
    let opf = package_xml(
        r#"<dc:title>Dune</dc:title><meta name="cover" content="cover-img"/>"#,
        r#"<item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
           <item id="p1" href="images/plate.jpg" media-type="image/jpeg"/>"#,
    );
    let big = image(4096);
    let epub = build_zip(&[
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/images/plate.jpg", &big),
        ("OEBPS/images/cover.jpg", b"THE-COVER"),
        ("images/cover.jpg", b"WRONG-DIRECTORY"),
    ]);

    let found = cover("dune.epub", epub).unwrap();
    assert_eq!(found.bytes, b"THE-COVER");
    assert_eq!(found.mime_type, "image/jpeg");
}

#[test]
fn epub3_cover_image_property_beats_id_heuristic() {
    let opf = package_xml(
        "<dc:title>Kindred</dc:title>",
        r#"<item id="cover-thumb" href="thumb.jpg" media-type="image/jpeg"/>
           <item id="art" href="art.jpg" media-type="image/jpeg" properties="cover-image"/>"#,
    );
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/thumb.jpg", b"THUMB"),
        ("OEBPS/art.jpg", b"ART"),
    ]);

    assert_eq!(cover("kindred.epub", epub).unwrap().bytes, b"ART");
}

#[test]
fn epub_png_cover_reports_png_mime() {
    let opf = package_xml(
        r#"<meta name="cover" content="c"/>"#,
        r#"<item id="c" href="cover.png" media-type="image/png"/>"#,
    );
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/cover.png", b"\x89PNG"),
    ]);

    let found = cover("book.EPUB", epub).unwrap();
    assert_eq!(found.mime_type, "image/png");
    assert_eq!(found.bytes, b"\x89PNG");
}

#[test]
fn epub_percent_encoded_href_and_bom() {
    let opf = package_xml(
        r#"<meta name="cover" content="c"/>"#,
        r#"<item id="c" href="../Images/front%20cover.jpeg" media-type="image/jpeg"/>"#,
    );
    let mut opf_bytes = vec![0xEF, 0xBB, 0xBF];
    opf_bytes.extend_from_slice(opf.as_bytes());

    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", &opf_bytes),
        ("Images/front cover.jpeg", b"FRONT"),
    ]);

    let found = cover("spaced.epub", epub).unwrap();
    assert_eq!(found.bytes, b"FRONT");
    assert_eq!(found.mime_type, "image/jpeg");
}

#[test]
fn epub_without_container_falls_back_to_image_scan() {
    let epub = build_zip(&[
        ("OEBPS/content.opf", b"<package/>"),
        ("OEBPS/images/page.jpg", &image(2048)),
        ("OEBPS/images/Cover.JPG", b"NAMED"),
    ]);

    assert_eq!(cover("broken.epub", epub).unwrap().bytes, b"NAMED");
}

#[test]
fn epub_with_missing_cover_entry_falls_back_to_image_scan() {
    let opf = package_xml(
        r#"<meta name="cover" content="c"/>"#,
        r#"<item id="c" href="images/gone.jpg" media-type="image/jpeg"/>"#,
    );
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/images/a.jpg", &image(10)),
        ("OEBPS/images/b.jpg", &image(20)),
    ]);

    let found = cover("gone.epub", epub).unwrap();
    assert_eq!(found.bytes.len(), 20);
}

#[test]
fn epub_with_missing_package_document_falls_back_to_image_scan() {
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/images/a.jpg", &image(10)),
        ("OEBPS/images/b.png", &image(30)),
    ]);

    let found = cover("nopackage.epub", epub).unwrap();
    assert_eq!(found.bytes.len(), 30);
    assert_eq!(found.mime_type, "image/png");
}

#[test]
fn epub_with_malformed_container_falls_back_to_image_scan() {
    let opf = package_xml(
        r#"<meta name="cover" content="c"/>"#,
        r#"<item id="c" href="images/declared.jpg" media-type="image/jpeg"/>"#,
    );
    let without_full_path = r#"<container><rootfiles><rootfile media-type="application/oebps-package+xml"/></rootfiles></container>"#;

    for container in [without_full_path, "<container><rootfiles>"] {
        let epub = build_zip(&[
            ("META-INF/container.xml", container.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
            ("OEBPS/images/declared.jpg", b"DECLARED"),
            ("OEBPS/images/page.jpg", &image(4096)),
        ]);

        let found = cover("badcontainer.epub", epub).unwrap();
        assert_eq!(found.bytes.len(), 4096, "container: {container}");
    }
}

#[test]
fn epub_id_heuristic_picks_non_image_cover_item() {
    let opf = package_xml(
        "",
        r#"<item id="img1" href="big.jpg" media-type="image/jpeg"/>
           <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>"#,
    );
    let page = b"<html><body><img src=\"big.jpg\"/></body></html>";
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/big.jpg", &image(100)),
        ("OEBPS/cover.xhtml", page),
    ]);

    assert_eq!(cover("page.epub", epub).unwrap().bytes, page);
}

#[test]
fn epub_id_heuristic_missing_item_falls_back_to_image_scan() {
    let opf = package_xml(
        "",
        r#"<item id="img1" href="big.jpg" media-type="image/jpeg"/>
           <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>"#,
    );
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/big.jpg", &image(100)),
    ]);

    let found = cover("nopage.epub", epub).unwrap();
    assert_eq!(found.bytes.len(), 100);
    assert_eq!(found.mime_type, "image/jpeg");
}

#[test]
fn epub_info_returns_metadata_and_cover() {
    let opf = package_xml(
        r#"<dc:title>The Dispossessed</dc:title>
           <dc:creator>Ursula K. Le Guin</dc:creator>
           <dc:identifier>urn:isbn:9780061054884</dc:identifier>
           <dc:language>en</dc:language>
           <dc:publisher>Harper</dc:publisher>
           <dc:date>1974</dc:date>
           <dc:description>An ambiguous utopia.</dc:description>
           <meta name="cover" content="c"/>"#,
        r#"<item id="c" href="cover.jpg" media-type="image/jpeg"/>"#,
    );
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/cover.jpg", b"C"),
    ]);

    let metadata = info("dispossessed.epub", epub).unwrap();
    assert_eq!(metadata.title.as_deref(), Some("The Dispossessed"));
    assert_eq!(metadata.creator.as_deref(), Some("Ursula K. Le Guin"));
    assert_eq!(metadata.identifier.as_deref(), Some("urn:isbn:9780061054884"));
    assert_eq!(metadata.language.as_deref(), Some("en"));
    assert_eq!(metadata.publisher.as_deref(), Some("Harper"));
    assert_eq!(metadata.date.as_deref(), Some("1974"));
    assert_eq!(metadata.description.as_deref(), Some("An ambiguous utopia."));
    assert_eq!(metadata.subject, None);
    assert_eq!(metadata.cover.unwrap().bytes, b"C");
}

#[test]
fn epub_info_keeps_metadata_when_cover_unresolved() {
    let opf = package_xml(
        "<dc:title>Plain</dc:title>",
        r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
    );
    let epub = build_zip(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/ch1.xhtml", b"<html/>"),
    ]);

    let metadata = info("plain.epub", epub).unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Plain"));
    assert!(metadata.cover.is_none());
}

#[test]
fn corrupt_epub_returns_none() {
    let garbage = b"this is not a zip archive".to_vec();
    assert!(formats::inspect_bytes("corrupt.epub", garbage.clone(), InspectMode::Cover).is_none());
    assert!(formats::inspect_bytes("corrupt.epub", garbage, InspectMode::Info).is_none());
}

// ============================================================================
// GENERIC ARCHIVES
// ============================================================================

#[test]
fn cbz_named_cover_beats_larger_pages() {
    let cbz = build_zip(&[
        ("page1.jpg", &image(500 * 1024)),
        ("page2.jpg", &image(300 * 1024)),
        ("cover.png", &image(50 * 1024)),
    ]);

    let found = cover("comic.cbz", cbz).unwrap();
    assert_eq!(found.bytes.len(), 50 * 1024);
    assert_eq!(found.mime_type, "image/png");
}

#[test]
fn zip_largest_image_without_named_cover() {
    let archive = build_zip(&[
        ("a.jpg", &image(100 * 1024)),
        ("b.jpg", &image(900 * 1024)),
        ("notes.txt", &image(2000 * 1024)),
    ]);

    let found = cover("scans.zip", archive).unwrap();
    assert_eq!(found.bytes.len(), 900 * 1024);
    assert_eq!(found.mime_type, "image/jpeg");
}

#[test]
fn zip_skips_directories_and_macosx_entries() {
    let archive = build_zip(&[
        ("cover.jpg/", b""),
        ("__MACOSX/", b""),
        ("__MACOSX/._cover.jpg", &image(4096)),
        ("__MACOSX/big.jpg", &image(8192)),
        ("pages/001.jpeg", &image(16)),
    ]);

    let found = cover("mac.cbz", archive).unwrap();
    assert_eq!(found.bytes.len(), 16);
}

#[test]
fn zip_without_images_returns_none() {
    let archive = build_zip(&[("readme.txt", b"hello"), ("dir/", b"")]);
    assert!(cover("docs.zip", archive.clone()).is_none());
    assert!(info("docs.zip", archive).is_none());
}

#[test]
fn zip_info_holds_only_the_cover() {
    let archive = build_zip(&[("001.jpg", b"PAGE")]);
    let metadata = info("comic.cbz", archive).unwrap();
    assert_eq!(metadata.title, None);
    assert_eq!(metadata.cover.unwrap().bytes, b"PAGE");
}

#[test]
fn unsupported_extension_returns_none() {
    let archive = build_zip(&[("cover.jpg", b"X")]);
    assert!(formats::inspect_bytes("book.pdf", archive.clone(), InspectMode::Cover).is_none());
    assert!(formats::inspect_bytes("book.cbr", archive, InspectMode::Info).is_none());
    assert!(!formats::is_supported("book.mobi"));
    assert!(formats::is_supported("Book.FB2.ZIP"));
}

// ============================================================================
// FICTIONBOOK
// ============================================================================

const FB2: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0" xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <genre>sf</genre>
      <author><first-name>Stanislaw</first-name><last-name>Lem</last-name></author>
      <book-title>Solaris</book-title>
      <annotation><p>A living ocean.</p></annotation>
      <lang>pl</lang>
      <coverpage><l:image l:href="#front.png"/></coverpage>
    </title-info>
  </description>
  <body><section><p>Text</p></section></body>
  <binary id="other.jpg" content-type="image/jpeg">AAAA</binary>
  <binary id="front.png" content-type="image/png">iVBO
  Rw==</binary>
</FictionBook>"##;

#[test]
fn fb2_zip_cover_and_metadata() {
    let archive = build_zip(&[("solaris.fb2", FB2.as_bytes())]);

    let found = cover("solaris.fb2.zip", archive.clone()).unwrap();
    assert_eq!(found.mime_type, "image/png");
    assert_eq!(found.bytes, [0x89, b'P', b'N', b'G']);

    let metadata = info("solaris.fb2.zip", archive).unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Solaris"));
    assert_eq!(metadata.creator.as_deref(), Some("Stanislaw Lem"));
    assert_eq!(metadata.language.as_deref(), Some("pl"));
    assert_eq!(metadata.subject.as_deref(), Some("sf"));
    assert_eq!(metadata.description.as_deref(), Some("A living ocean."));
    assert!(metadata.cover.is_some());
}

#[test]
fn fb2_zip_without_fb2_entry_falls_back_to_image_scan() {
    let archive = build_zip(&[("scan.jpg", b"SCAN")]);
    assert_eq!(cover("lost.fb2.zip", archive).unwrap().bytes, b"SCAN");
}

// ============================================================================
// FILES ON DISK
// ============================================================================

#[test]
fn inspect_reads_files_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comic.cbz");
    std::fs::write(&path, build_zip(&[("cover.jpeg", b"DISK")])).unwrap();

    let found = formats::inspect_cover(&path).unwrap();
    assert_eq!(found.bytes, b"DISK");

    let metadata = formats::inspect_info(&path).unwrap();
    assert_eq!(metadata.cover.unwrap().mime_type, "image/jpeg");

    assert!(formats::inspect_cover(&dir.path().join("missing.cbz")).is_none());
}

#[test]
fn library_feed_links_covers_only_for_archives() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Alpha.epub"), b"epub").unwrap();
    std::fs::create_dir(dir.path().join("papers")).unwrap();
    std::fs::write(dir.path().join("papers/Beta Paper.pdf"), b"pdf").unwrap();

    let mut books = library::scan(dir.path()).unwrap();
    SortMode::NameAsc.sort(&mut books);

    assert_eq!(books.len(), 2);
    assert_eq!(books[0].format, Some(BookFormat::Epub));
    assert_eq!(books[1].filename, "papers/Beta Paper.pdf");

    let xml = opds::acquisition_feed("Shelf", "http://shelf.lan", &books, SortMode::NameAsc);
    assert!(xml.contains("http://shelf.lan/book/cover/Alpha.epub"));
    assert!(xml.contains("http://shelf.lan/book/download/papers/Beta%20Paper.pdf"));
    assert!(!xml.contains("/book/cover/papers/"));
}

#[test]
fn default_config_is_usable() {
    let config = Config::default();
    assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    assert!(!config.auth.enabled());
    assert_eq!(config.auth.session_days, 15);

    let parsed: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(parsed.server.port, 8080);
    assert_eq!(parsed.server.upload_limit_mb, 256);
    assert_eq!(parsed.library.books_dir, std::path::PathBuf::from("books"));
}

#[test]
fn config_overrides_replace_file_values() {
    let mut config: Config = toml::from_str(
        r#"
[server]
port = 9000
title = "Family Shelf"

[auth]
username = "reader"
"#,
    )
    .unwrap();
    assert!(!config.auth.enabled());

    config.apply(&Overrides {
        port: Some(8181),
        books_dir: Some("/srv/books".into()),
        admin_password: Some("pw".to_string()),
        reverse_proxy: Some(true),
        reverse_proxy_host: Some("books.example.org".to_string()),
        reverse_proxy_port: Some("8443".to_string()),
        ..Overrides::default()
    });

    assert_eq!(config.server.port, 8181);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.title, "Family Shelf");
    assert_eq!(config.library.books_dir, std::path::PathBuf::from("/srv/books"));
    assert!(config.auth.verify("reader", "pw"));
    assert!(!config.auth.verify("reader", "nope"));
    assert_eq!(config.proxy.public_url(), "http://books.example.org:8443");
}

#[test]
fn config_load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(crate::AppError::Config(_))));
}

//! HTML pages for the admin UI.

use crate::formats::BookMetadata;
use crate::library::{self, Book, SortMode};
use quick_xml::escape::escape;

const STYLE: &str = r#"
        body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #333; }
        a { color: #0066cc; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 0.4rem; border-bottom: 1px solid #e8e8e8; vertical-align: middle; }
        .panel { background: #f5f5f5; padding: 1rem; border-radius: 8px; margin: 1rem 0; }
        .cover { max-width: 240px; border-radius: 4px; }
        .thumb { height: 48px; }
        .label { font-size: 0.8rem; background: #e8e8e8; padding: 0.1rem 0.4rem; border-radius: 4px; }
        form.inline { display: inline; }
        .error { color: #b00020; }
        dt { font-weight: bold; margin-top: 0.5rem; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="stylesheet" href="/static/style.css">
    <style>{style}</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape(title),
        style = STYLE,
        body = body,
    )
}

/// Admin listing with upload, rename and delete forms.
pub fn admin_page(title: &str, books: &[Book], sort: SortMode, base_url: &str) -> String {
    let sort_options = [
        (SortMode::DateDesc, "Newest first"),
        (SortMode::DateAsc, "Oldest first"),
        (SortMode::NameAsc, "Title A-Z"),
        (SortMode::NameDesc, "Title Z-A"),
    ]
    .iter()
    .map(|(mode, label)| {
        let selected = if *mode == sort { " selected" } else { "" };
        format!(
            r#"<option value="{}"{}>{}</option>"#,
            mode.as_str(),
            selected,
            label
        )
    })
    .collect::<String>();

    let rows = books
        .iter()
        .map(|book| {
            let url_path = book.url_path();
            let url = escape(url_path.as_str()).into_owned();
            let filename = escape(book.filename.as_str()).into_owned();
            let thumb = if book.has_cover() {
                format!(r#"<img class="thumb" src="/book/cover/{}" alt="" loading="lazy">"#, url)
            } else {
                String::new()
            };

            format!(
                r#"<tr>
    <td>{thumb}</td>
    <td><a href="/book/info/{url}">{title}</a><br><small>{filename}</small></td>
    <td><span class="label">{label}</span></td>
    <td>{size}</td>
    <td>{modified}</td>
    <td>
        <a href="/book/download/{url}">Download</a>
        <form class="inline" method="post" action="/book/rename">
            <input type="hidden" name="oldFilename" value="{filename}">
            <input type="text" name="newFilename" placeholder="New name" required>
            <button type="submit">Rename</button>
        </form>
        <form class="inline" method="post" action="/book/delete/{url}" onsubmit="return confirm('Delete this book?')">
            <button type="submit">Delete</button>
        </form>
    </td>
</tr>"#,
                thumb = thumb,
                url = url,
                title = escape(book.title.as_str()),
                filename = filename,
                label = escape(book.label().as_str()),
                size = library::format_size(book.size),
                modified = book.modified.format("%Y-%m-%d %H:%M"),
            )
        })
        .collect::<String>();

    let listing = if books.is_empty() {
        "<p>No books yet. Upload one above.</p>".to_string()
    } else {
        format!(
            r#"<table>
<thead><tr><th></th><th>Title</th><th>Format</th><th>Size</th><th>Updated</th><th>Actions</th></tr></thead>
<tbody>
{}
</tbody>
</table>"#,
            rows
        )
    };

    let body = format!(
        r#"<h1>{title}</h1>
<div class="panel">
    <p><strong>{count}</strong> books. OPDS catalog: <code>{base_url}/</code></p>
    <form method="post" action="/book/upload" enctype="multipart/form-data">
        <input type="file" name="book" required>
        <button type="submit">Upload</button>
    </form>
</div>
<form method="get" action="/admin">
    <label>Sort by <select name="sort" onchange="this.form.submit()">{sort_options}</select></label>
    <noscript><button type="submit">Apply</button></noscript>
</form>
{listing}
<form method="post" action="/user/logout"><button type="submit">Log out</button></form>"#,
        title = escape(title),
        count = books.len(),
        base_url = escape(base_url),
        sort_options = sort_options,
        listing = listing,
    );

    layout(title, &body)
}

/// Details page for one book.
pub fn book_details(
    display_title: &str,
    filename: &str,
    url_path: &str,
    metadata: Option<&BookMetadata>,
) -> String {
    let url = escape(url_path);

    let cover = match metadata.and_then(|m| m.cover.as_ref()) {
        Some(_) => format!(
            r#"<img class="cover" src="/book/cover/{}" alt="Cover">"#,
            url
        ),
        None => String::new(),
    };

    let fields = metadata
        .map(|m| {
            [
                ("Author", &m.creator),
                ("Publisher", &m.publisher),
                ("Published", &m.date),
                ("Language", &m.language),
                ("Subject", &m.subject),
                ("Identifier", &m.identifier),
                ("Description", &m.description),
            ]
            .iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("<dt>{}</dt><dd>{}</dd>", label, escape(v)))
            })
            .collect::<String>()
        })
        .unwrap_or_default();

    let body = format!(
        r#"<p><a href="/admin">&larr; Back</a></p>
<h1>{title}</h1>
<div class="panel">
    {cover}
    <dl>{fields}</dl>
    <p><small>{filename}</small></p>
    <p><a href="/book/download/{url}">Download</a></p>
</div>"#,
        title = escape(display_title),
        cover = cover,
        fields = fields,
        filename = escape(filename),
        url = url,
    );

    layout(display_title, &body)
}

/// Login form.
pub fn login_page(title: &str, failed: bool) -> String {
    let error = if failed {
        r#"<p class="error">Invalid username or password.</p>"#
    } else {
        ""
    };

    let body = format!(
        r#"<h1>{title}</h1>
<div class="panel">
    {error}
    <form method="post" action="/user/login">
        <p><label>Username <input type="text" name="username" autocomplete="username" required></label></p>
        <p><label>Password <input type="password" name="password" autocomplete="current-password" required></label></p>
        <button type="submit">Log in</button>
    </form>
</div>"#,
        title = escape(title),
        error = error,
    );

    layout(&format!("Login - {}", title), &body)
}

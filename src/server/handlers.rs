//! HTTP request handlers.

use crate::auth::{self, SESSION_COOKIE};
use crate::config::BookFormat;
use crate::error::{AppError, Result};
use crate::formats::{self, BookMetadata, InspectMode, Inspection};
use crate::library::SortMode;
use crate::library::book::{encode_url_path, title_from_file_name};
use crate::opds;
use crate::server::{AppState, views};
use axum::{
    Form,
    body::Body,
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

/// Build a response, returning 500 on error (which shouldn't happen).
fn build_response(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal error"))
                .unwrap_or_default()
        })
}

/// Run the archive inspector off the async runtime.
async fn run_inspection(path: PathBuf, mode: InspectMode) -> Result<Option<Inspection>> {
    tokio::task::spawn_blocking(move || formats::inspect(&path, mode))
        .await
        .map_err(|e| AppError::Internal(format!("Inspection task failed: {}", e)))
}

/// Last segment of a root-relative filename.
fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    sort: Option<String>,
}

// ============================================================================
// CATALOG
// ============================================================================

/// OPDS acquisition feed of the whole library.
pub async fn catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Response<Body>> {
    let base_url = state.base_url(&headers);
    let sort = SortMode::parse(params.sort.as_deref());

    let mut books = state.list_books().await?;
    sort.sort(&mut books);

    let xml = opds::acquisition_feed(&state.config.server.title, &base_url, &books, sort);
    Ok(build_response(StatusCode::OK, opds::ACQUISITION_MIME, xml))
}

/// Admin listing page.
pub async fn admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Html<String>> {
    let sort = SortMode::parse(params.sort.as_deref());

    let mut books = state.list_books().await?;
    sort.sort(&mut books);

    Ok(Html(views::admin_page(
        &state.config.server.title,
        &books,
        sort,
        &state.base_url(&headers),
    )))
}

// ============================================================================
// BOOKS
// ============================================================================

/// Book details page.
pub async fn book_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Html<String>> {
    let path = state.existing_book_path(&filename)?;

    let metadata: Option<BookMetadata> = match run_inspection(path, InspectMode::Info).await? {
        Some(Inspection::Info(metadata)) => Some(metadata),
        _ => None,
    };

    let title = metadata
        .as_ref()
        .and_then(|m| m.title.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| title_from_file_name(base_name(&filename)));

    Ok(Html(views::book_details(
        &title,
        &filename,
        &encode_url_path(&filename),
        metadata.as_ref(),
    )))
}

/// Book cover image.
pub async fn book_cover(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response<Body>> {
    let path = state.existing_book_path(&filename)?;

    let cover = match run_inspection(path, InspectMode::Cover).await? {
        Some(Inspection::Cover(cover)) => cover,
        _ => return Err(AppError::NotFound(format!("No cover for {}", filename))),
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, cover.mime_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(cover.bytes))
        .unwrap_or_else(|_| Response::default()))
}

/// Raw book file, streamed.
pub async fn book_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response<Body>> {
    let path = state.existing_book_path(&filename)?;

    let file = tokio::fs::File::open(&path).await?;
    let size = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    let name = base_name(&filename);
    let mime_type = BookFormat::from_file_name(name)
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream");
    let ascii_name: String = name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() && c != '"' { c } else { '_' })
        .collect();
    let content_disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_name,
        urlencoding::encode(name)
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, size)
        .body(body)
        .unwrap_or_else(|_| Response::default()))
}

/// Store an uploaded book under its base name.
pub async fn book_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("book") {
            continue;
        }

        let name = field
            .file_name()
            .map(|n| base_name(n).trim().to_string())
            .unwrap_or_default();
        if name.is_empty() || name.starts_with('.') {
            return Err(AppError::BadRequest("Missing file name".to_string()));
        }

        let path = state.book_path(&name)?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;

        tokio::fs::create_dir_all(&state.config.library.books_dir).await?;
        tokio::fs::write(&path, &data).await?;

        tracing::info!(file = %name, size = data.len(), "Uploaded book");
        return Ok(Redirect::to("/admin"));
    }

    Err(AppError::BadRequest("Missing \"book\" field".to_string()))
}

/// Rename form fields.
#[derive(Debug, Deserialize)]
pub struct RenameForm {
    #[serde(rename = "oldFilename")]
    old_filename: String,
    #[serde(rename = "newFilename")]
    new_filename: String,
}

/// Rename a book within its directory.
pub async fn book_rename(
    State(state): State<AppState>,
    Form(form): Form<RenameForm>,
) -> Result<Redirect> {
    let old_path = state.existing_book_path(&form.old_filename)?;
    let new_name = renamed_file_name(&form.old_filename, &form.new_filename)?;
    let new_path = old_path.with_file_name(&new_name);

    if tokio::fs::try_exists(&new_path).await? {
        return Err(AppError::Conflict(format!("{} already exists", new_name)));
    }

    tokio::fs::rename(&old_path, &new_path).await?;
    tracing::info!(from = %form.old_filename, to = %new_name, "Renamed book");

    Ok(Redirect::to("/admin"))
}

/// Target name for a rename. The new name must be a plain file name; when it
/// has no extension the old one (`.fb2.zip` included) is kept.
pub fn renamed_file_name(old_filename: &str, new_name: &str) -> Result<String> {
    let new_name = new_name.trim();
    if new_name.is_empty() || new_name.starts_with('.') || new_name.contains(['/', '\\', '\0']) {
        return Err(AppError::BadRequest(format!("Invalid new name: {}", new_name)));
    }

    if new_name.rfind('.').is_some_and(|index| index > 0) {
        return Ok(new_name.to_string());
    }

    let old_name = base_name(old_filename);
    let stem_len = title_from_file_name(old_name).len();
    Ok(format!("{}{}", new_name, &old_name[stem_len..]))
}

/// Delete a book. Deleting a missing file is not an error.
pub async fn book_delete(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Redirect> {
    let path = state.book_path(&filename)?;

    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::info!(file = %filename, "Deleted book"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(file = %filename, "Nothing to delete");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to("/admin"))
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

/// Login page.
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.config.auth.enabled() || state.is_authenticated(&headers) {
        return Redirect::to("/admin").into_response();
    }

    Html(views::login_page(&state.config.server.title, false)).into_response()
}

/// Check credentials and open a session.
pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if !state.config.auth.enabled() {
        return Redirect::to("/admin").into_response();
    }

    if !state.config.auth.verify(&form.username, &form.password) {
        tracing::warn!(username = %form.username, "Failed login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Html(views::login_page(&state.config.server.title, true)),
        )
            .into_response();
    }

    let token = state.sessions.create();
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE,
        token,
        state.sessions.max_age()
    );
    tracing::info!(username = %form.username, "Admin logged in");

    ([(header::SET_COOKIE, cookie)], Redirect::to("/admin")).into_response()
}

/// Close the current session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = auth::cookie_value(&headers, SESSION_COOKIE) {
        state.sessions.revoke(&token);
    }

    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0; SameSite=Lax", SESSION_COOKIE);
    ([(header::SET_COOKIE, cookie)], Redirect::to("/user/login"))
}

/// Require a session or Basic credentials outside `/user` and `/static`.
pub async fn auth_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let open = path.starts_with("/user/") || path.starts_with("/static/");

    if open || state.is_authenticated(request.headers()) {
        return next.run(request).await;
    }

    let wants_html = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));

    if wants_html {
        Redirect::to("/user/login").into_response()
    } else {
        AppError::Unauthorized.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_file_name_keeps_extension() {
        assert_eq!(renamed_file_name("a/Old.epub", "New").unwrap(), "New.epub");
        assert_eq!(renamed_file_name("Old.FB2.zip", "New").unwrap(), "New.FB2.zip");
        assert_eq!(renamed_file_name("Old.epub", "New.kepub").unwrap(), "New.kepub");
        assert_eq!(renamed_file_name("README", "Notes").unwrap(), "Notes");
    }

    #[test]
    fn test_renamed_file_name_rejects_paths() {
        assert!(renamed_file_name("Old.epub", "../New").is_err());
        assert!(renamed_file_name("Old.epub", "sub/New").is_err());
        assert!(renamed_file_name("Old.epub", "  ").is_err());
        assert!(renamed_file_name("Old.epub", ".hidden").is_err());
    }

    fn state_with_books(dir: &std::path::Path) -> AppState {
        let mut config = crate::config::Config::default();
        config.library.books_dir = dir.to_path_buf();
        AppState::new(config)
    }

    fn rename_form(old: &str, new: &str) -> Form<RenameForm> {
        Form(RenameForm {
            old_filename: old.to_string(),
            new_filename: new.to_string(),
        })
    }

    #[tokio::test]
    async fn test_rename_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.epub"), b"a").unwrap();
        std::fs::write(dir.path().join("b.epub"), b"b").unwrap();
        let state = state_with_books(dir.path());

        let result = book_rename(State(state.clone()), rename_form("a.epub", "b")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let result = book_rename(State(state.clone()), rename_form("missing.epub", "c")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert!(book_rename(State(state), rename_form("a.epub", "c")).await.is_ok());
        assert!(dir.path().join("c.epub").is_file());
        assert!(!dir.path().join("a.epub").exists());
    }

    #[tokio::test]
    async fn test_cover_of_non_archive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("paper.pdf"), b"%PDF-1.7").unwrap();
        let state = state_with_books(dir.path());

        let result = book_cover(State(state.clone()), Path("paper.pdf".to_string())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = book_cover(State(state), Path("../paper.pdf".to_string())).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_info_title_falls_back_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shelf")).unwrap();
        std::fs::write(dir.path().join("shelf/My Book.pdf"), b"%PDF").unwrap();
        let state = state_with_books(dir.path());

        let Html(body) = book_info(State(state), Path("shelf/My Book.pdf".to_string()))
            .await
            .unwrap();
        assert!(body.contains("<h1>My Book</h1>"));
        assert!(body.contains("/book/download/shelf/My%20Book.pdf"));
    }

    #[tokio::test]
    async fn test_delete_missing_book_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.cbz"), b"x").unwrap();
        let state = state_with_books(dir.path());

        assert!(book_delete(State(state.clone()), Path("old.cbz".to_string())).await.is_ok());
        assert!(!dir.path().join("old.cbz").exists());
        assert!(book_delete(State(state), Path("old.cbz".to_string())).await.is_ok());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("dir/sub/book.epub"), "book.epub");
        assert_eq!(base_name("C:\\Users\\me\\book.epub"), "book.epub");
        assert_eq!(base_name("book.epub"), "book.epub");
    }
}

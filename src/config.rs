use crate::error::{AppError, Result};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Personal ebook shelf served over OPDS.
#[derive(Parser, Debug, Clone)]
#[command(name = "opdshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "OPDSHELF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Settings that override the config file.
    #[command(flatten)]
    pub overrides: Overrides,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Command line and environment overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Interface to listen on.
    #[arg(long, env = "HOST", global = true)]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(long, env = "PORT", global = true)]
    pub port: Option<u16>,

    /// Directory holding the books.
    #[arg(long, env = "BOOKS_DIR", global = true)]
    pub books_dir: Option<PathBuf>,

    /// Directory holding static assets.
    #[arg(long, env = "STATIC_DIR", global = true)]
    pub static_dir: Option<PathBuf>,

    /// Build links from the public proxy address instead of the Host header.
    #[arg(long, env = "REVERSE_PROXY", global = true, value_parser = BoolishValueParser::new())]
    pub reverse_proxy: Option<bool>,

    /// Public host (with scheme) used behind a reverse proxy.
    #[arg(long, env = "REVERSE_PROXY_HOST", global = true)]
    pub reverse_proxy_host: Option<String>,

    /// Public port used behind a reverse proxy.
    #[arg(long, env = "REVERSE_PROXY_PORT", global = true)]
    pub reverse_proxy_port: Option<String>,

    /// Admin username. Auth is disabled unless both username and password are set.
    #[arg(long, env = "ADMIN_USERNAME", global = true)]
    pub admin_username: Option<String>,

    /// Admin password.
    #[arg(long, env = "ADMIN_PASSWORD", global = true, hide_env_values = true)]
    pub admin_password: Option<String>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve,

    /// Write a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Extract the cover or metadata of a single book file.
    Inspect {
        /// Book file to inspect.
        file: PathBuf,
        /// Print metadata instead of cover details.
        #[arg(long)]
        info: bool,
    },
}

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Library configuration.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Reverse proxy configuration.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Catalog title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Largest accepted upload, in megabytes.
    #[serde(default = "default_upload_limit_mb")]
    pub upload_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            title: default_title(),
            static_dir: default_static_dir(),
            upload_limit_mb: default_upload_limit_mb(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_title() -> String {
    "OPDShelf".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_upload_limit_mb() -> usize {
    256
}

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory holding the books.
    #[serde(default = "default_books_dir")]
    pub books_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            books_dir: default_books_dir(),
        }
    }
}

fn default_books_dir() -> PathBuf {
    PathBuf::from("books")
}

/// Reverse proxy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether links use the public address below.
    #[serde(default)]
    pub enabled: bool,

    /// Public host, optionally with scheme (e.g. `https://books.example.org`).
    #[serde(default)]
    pub host: String,

    /// Public port, empty for the scheme default.
    #[serde(default)]
    pub port: String,
}

impl ProxyConfig {
    /// Public base URL, without trailing slash.
    pub fn public_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let host = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        if self.port.is_empty() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Admin username.
    #[serde(default)]
    pub username: Option<String>,

    /// Admin password.
    #[serde(default)]
    pub password: Option<String>,

    /// Login session duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            session_days: default_session_days(),
        }
    }
}

fn default_session_days() -> u32 {
    15
}

impl AuthConfig {
    /// Auth is enforced only when both credentials are configured.
    pub fn enabled(&self) -> bool {
        matches!(
            (&self.username, &self.password),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        )
    }

    /// Check a username/password pair against the configured admin.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.enabled()
            && self.username.as_deref() == Some(username)
            && self.password.as_deref() == Some(password)
    }
}

impl Config {
    /// Build the process configuration: config file first, then overrides.
    pub fn build(cli: &Cli) -> Result<Self> {
        let path = cli.config.clone().or_else(Self::find_config_file);

        let mut config = match path {
            Some(ref path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::load(path)?
            }
            None => Self::default(),
        };

        config.apply(&cli.overrides);
        Ok(config)
    }

    /// Apply command line and environment overrides.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(dir) = &overrides.books_dir {
            self.library.books_dir = dir.clone();
        }
        if let Some(dir) = &overrides.static_dir {
            self.server.static_dir = dir.clone();
        }
        if let Some(enabled) = overrides.reverse_proxy {
            self.proxy.enabled = enabled;
        }
        if let Some(host) = &overrides.reverse_proxy_host {
            self.proxy.host = host.clone();
        }
        if let Some(port) = &overrides.reverse_proxy_port {
            self.proxy.port = port.clone();
        }
        if overrides.admin_username.is_some() {
            self.auth.username = overrides.admin_username.clone();
        }
        if overrides.admin_password.is_some() {
            self.auth.password = overrides.admin_password.clone();
        }
    }

    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("opdshelf.toml"),
            dirs::config_dir()
                .map(|p| p.join("opdshelf").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/opdshelf/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Address to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# opdshelf configuration
# Every value can also be set from the environment (PORT, HOST, BOOKS_DIR, ...).

[server]
host = "0.0.0.0"
port = 8080
title = "OPDShelf"
static_dir = "static"
upload_limit_mb = 256

[library]
books_dir = "books"

[proxy]
# Build feed links from this address instead of the request Host header.
enabled = false
# host = "https://books.example.org"
# port = ""

[auth]
# Auth is enforced only when both are set.
# username = "admin"
# password = "change-me"
session_days = 15
"#
        .to_string()
    }
}

/// Book file formats known to the library listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    /// EPUB format (Electronic Publication).
    Epub,
    /// PDF format (Portable Document Format).
    Pdf,
    /// FictionBook XML.
    Fb2,
    /// Zipped FictionBook.
    Fb2Zip,
    /// CBZ format (Comic Book ZIP archive).
    Cbz,
    /// CBR format (Comic Book RAR archive).
    Cbr,
    /// CB7 format (Comic Book 7-Zip archive).
    Cb7,
    /// Plain zip archive.
    Zip,
    /// MOBI format (Mobipocket eBook).
    Mobi,
    /// Kindle AZW/AZW3.
    Azw,
    /// DjVu document.
    Djvu,
    /// Plain text format.
    Txt,
    /// Rich text format.
    Rtf,
    /// HTML format.
    Html,
}

impl BookFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            BookFormat::Epub => "application/epub+zip",
            BookFormat::Pdf => "application/pdf",
            BookFormat::Fb2 => "application/x-fictionbook+xml",
            BookFormat::Fb2Zip => "application/x-zip-compressed-fb2",
            BookFormat::Cbz => "application/vnd.comicbook+zip",
            BookFormat::Cbr => "application/x-cbr",
            BookFormat::Cb7 => "application/x-cb7",
            BookFormat::Zip => "application/zip",
            BookFormat::Mobi => "application/x-mobipocket-ebook",
            BookFormat::Azw => "application/vnd.amazon.ebook",
            BookFormat::Djvu => "image/vnd.djvu",
            BookFormat::Txt => "text/plain",
            BookFormat::Rtf => "application/rtf",
            BookFormat::Html => "text/html",
        }
    }

    /// Try to detect format from a file name. `.fb2.zip` wins over `.zip`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".fb2.zip") {
            return Some(BookFormat::Fb2Zip);
        }

        let (_, ext) = lower.rsplit_once('.')?;
        match ext {
            "epub" => Some(BookFormat::Epub),
            "pdf" => Some(BookFormat::Pdf),
            "fb2" => Some(BookFormat::Fb2),
            "cbz" => Some(BookFormat::Cbz),
            "cbr" => Some(BookFormat::Cbr),
            "cb7" => Some(BookFormat::Cb7),
            "zip" => Some(BookFormat::Zip),
            "mobi" => Some(BookFormat::Mobi),
            "azw" | "azw3" | "azw4" => Some(BookFormat::Azw),
            "djvu" => Some(BookFormat::Djvu),
            "txt" => Some(BookFormat::Txt),
            "rtf" => Some(BookFormat::Rtf),
            "html" | "htm" => Some(BookFormat::Html),
            _ => None,
        }
    }

    /// Whether the inspector can read covers from this format.
    pub fn has_cover_support(&self) -> bool {
        matches!(
            self,
            BookFormat::Epub | BookFormat::Fb2Zip | BookFormat::Cbz | BookFormat::Zip
        )
    }
}

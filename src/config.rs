//! Layered configuration: TOML file, environment variable overrides, and
//! (for credentials only) an interactive prompt fallback — generalized
//! from the teacher's `config.rs`, which did the same three-tier
//! resolution for a single Qobuz/Bandcamp pair.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::source::Source;

// --- Public config types ---

#[derive(Debug, Clone)]
pub struct Config {
    pub downloads: DownloadsConfig,
    pub database: DatabaseConfig,
    pub filepaths: FilepathsConfig,
    pub artwork: ArtworkConfig,
    pub quality: QualityConfig,
    pub conversion: ConversionConfig,
    pub lastfm: LastfmConfig,
    pub cli: CliConfig,
    pub qobuz: CredentialSlot<QobuzCredentials>,
    pub tidal: CredentialSlot<TidalCredentials>,
    pub deezer: CredentialSlot<DeezerCredentials>,
    pub soundcloud: CredentialSlot<SoundcloudCredentials>,
    pub verify_ssl: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadsConfig {
    pub folder: PathBuf,
    pub source_subdirectories: bool,
    pub max_connections: usize,
    pub requests_per_minute: i64,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            source_subdirectories: false,
            max_connections: 4,
            requests_per_minute: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub downloads_enabled: bool,
    pub downloads_path: PathBuf,
    pub failed_downloads_enabled: bool,
    pub failed_downloads_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FilepathsConfig {
    pub folder_format: String,
    pub track_format: String,
    pub restrict_characters: bool,
    pub truncate_to: usize,
}

impl Default for FilepathsConfig {
    fn default() -> Self {
        Self {
            folder_format: "{albumartist}/{album}".to_string(),
            track_format: "{tracknumber:02} - {title}".to_string(),
            restrict_characters: false,
            truncate_to: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArtworkConfig {
    pub embed_size: String,
    pub save_hi_res: bool,
}

/// Per-source quality tier (spec.md §6: "quality per source"), the same
/// 0-4 scale as `client::Quality` but kept source-agnostic here so
/// `config.rs` doesn't need to depend on `client`.
#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub qobuz: u8,
    pub tidal: u8,
    pub deezer: u8,
    pub soundcloud: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            qobuz: 4,
            tidal: 4,
            deezer: 2,
            soundcloud: 1,
        }
    }
}

impl QualityConfig {
    pub fn for_source(&self, source: Source) -> u8 {
        match source {
            Source::Qobuz => self.qobuz,
            Source::Tidal => self.tidal,
            Source::Deezer => self.deezer,
            Source::Soundcloud => self.soundcloud,
            Source::Lastfm => 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversionConfig {
    pub enabled: bool,
    pub codec: String,
    pub sampling_rate: u32,
    pub bit_depth: u8,
}

#[derive(Debug, Clone, Default)]
pub struct LastfmConfig {
    pub source: Option<Source>,
    pub fallback_source: Option<Source>,
}

#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub progress_bars: bool,
}

/// A credential struct that is either fully resolved (`Ready`) or
/// missing required fields (`Unconfigured`). Mirrors the teacher's
/// `Option<QobuzConfig>` pattern, generalized across four sources.
#[derive(Debug, Clone)]
pub enum CredentialSlot<T> {
    Ready(T),
    Unconfigured,
}

impl<T> CredentialSlot<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            CredentialSlot::Ready(t) => Some(t),
            CredentialSlot::Unconfigured => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CredentialSlot::Unconfigured)
    }
}

#[derive(Debug, Clone)]
pub struct QobuzCredentials {
    pub email_or_userid: String,
    pub password_or_token: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TidalCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeezerCredentials {
    pub arl: String,
    /// Master key used to derive per-track Blowfish decryption keys.
    /// Never embedded in this crate; operator-supplied only.
    pub decryption_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SoundcloudCredentials {
    pub client_id: String,
    pub app_version: String,
}

// --- TOML deserialization types ---

#[derive(Deserialize, Default)]
struct FileConfig {
    downloads: Option<FileDownloads>,
    database: Option<FileDatabase>,
    filepaths: Option<FileFilepaths>,
    artwork: Option<FileArtwork>,
    quality: Option<FileQuality>,
    conversion: Option<FileConversion>,
    lastfm: Option<FileLastfm>,
    cli: Option<FileCli>,
    qobuz: Option<FileQobuz>,
    tidal: Option<FileTidal>,
    deezer: Option<FileDeezer>,
    soundcloud: Option<FileSoundcloud>,
    verify_ssl: Option<bool>,
}

#[derive(Deserialize, Default)]
struct FileDownloads {
    folder: Option<String>,
    source_subdirectories: Option<bool>,
    max_connections: Option<usize>,
    requests_per_minute: Option<i64>,
}

#[derive(Deserialize, Default)]
struct FileDatabase {
    downloads_enabled: Option<bool>,
    downloads_path: Option<String>,
    failed_downloads_enabled: Option<bool>,
    failed_downloads_path: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileFilepaths {
    folder_format: Option<String>,
    track_format: Option<String>,
    restrict_characters: Option<bool>,
    truncate_to: Option<usize>,
}

#[derive(Deserialize, Default)]
struct FileArtwork {
    embed_size: Option<String>,
    save_hi_res: Option<bool>,
}

#[derive(Deserialize, Default)]
struct FileQuality {
    qobuz: Option<u8>,
    tidal: Option<u8>,
    deezer: Option<u8>,
    soundcloud: Option<u8>,
}

#[derive(Deserialize, Default)]
struct FileConversion {
    enabled: Option<bool>,
    codec: Option<String>,
    sampling_rate: Option<u32>,
    bit_depth: Option<u8>,
}

#[derive(Deserialize, Default)]
struct FileLastfm {
    source: Option<String>,
    fallback_source: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileCli {
    progress_bars: Option<bool>,
}

#[derive(Deserialize, Default)]
struct FileQobuz {
    email_or_userid: Option<String>,
    password_or_token: Option<String>,
    app_id: Option<String>,
    app_secret: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileTidal {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileDeezer {
    arl: Option<String>,
    decryption_secret: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileSoundcloud {
    client_id: Option<String>,
    app_version: Option<String>,
}

// --- Resolution helpers ---

fn env_or_file(env_var: &str, file_value: Option<String>) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|s| !s.is_empty())
        .or(file_value)
        .filter(|s| !s.is_empty())
}

fn resolve_qobuz(fc: &FileConfig) -> CredentialSlot<QobuzCredentials> {
    let q = fc.qobuz.as_ref();
    let email = env_or_file("QOBUZ_EMAIL", q.and_then(|q| q.email_or_userid.clone()));
    let password = env_or_file("QOBUZ_PASSWORD", q.and_then(|q| q.password_or_token.clone()));
    match (email, password) {
        (Some(email_or_userid), Some(password_or_token)) => {
            CredentialSlot::Ready(QobuzCredentials {
                email_or_userid,
                password_or_token,
                app_id: q.and_then(|q| q.app_id.clone()),
                app_secret: q.and_then(|q| q.app_secret.clone()),
            })
        }
        _ => CredentialSlot::Unconfigured,
    }
}

fn resolve_tidal(fc: &FileConfig) -> CredentialSlot<TidalCredentials> {
    let t = fc.tidal.as_ref();
    match env_or_file("TIDAL_ACCESS_TOKEN", t.and_then(|t| t.access_token.clone())) {
        Some(access_token) => CredentialSlot::Ready(TidalCredentials {
            access_token,
            refresh_token: t.and_then(|t| t.refresh_token.clone()),
        }),
        None => CredentialSlot::Unconfigured,
    }
}

fn resolve_deezer(fc: &FileConfig) -> CredentialSlot<DeezerCredentials> {
    let d = fc.deezer.as_ref();
    match env_or_file("DEEZER_ARL", d.and_then(|d| d.arl.clone())) {
        Some(arl) => CredentialSlot::Ready(DeezerCredentials {
            arl,
            decryption_secret: env_or_file(
                "DEEZER_DECRYPTION_SECRET",
                d.and_then(|d| d.decryption_secret.clone()),
            ),
        }),
        None => CredentialSlot::Unconfigured,
    }
}

fn resolve_soundcloud(fc: &FileConfig) -> CredentialSlot<SoundcloudCredentials> {
    let s = fc.soundcloud.as_ref();
    let client_id = env_or_file("SOUNDCLOUD_CLIENT_ID", s.and_then(|s| s.client_id.clone()));
    let app_version = s
        .and_then(|s| s.app_version.clone())
        .unwrap_or_else(|| "0".to_string());
    match client_id {
        Some(client_id) => CredentialSlot::Ready(SoundcloudCredentials {
            client_id,
            app_version,
        }),
        None => CredentialSlot::Unconfigured,
    }
}

fn resolve_downloads(fc: &FileConfig) -> DownloadsConfig {
    let d = fc.downloads.as_ref();
    let defaults = DownloadsConfig::default();
    DownloadsConfig {
        folder: d
            .and_then(|d| d.folder.clone())
            .map(PathBuf::from)
            .unwrap_or(defaults.folder),
        source_subdirectories: d
            .and_then(|d| d.source_subdirectories)
            .unwrap_or(defaults.source_subdirectories),
        max_connections: d
            .and_then(|d| d.max_connections)
            .unwrap_or(defaults.max_connections)
            .max(1),
        requests_per_minute: d
            .and_then(|d| d.requests_per_minute)
            .unwrap_or(defaults.requests_per_minute),
    }
}

fn resolve_database(fc: &FileConfig) -> DatabaseConfig {
    let d = fc.database.as_ref();
    DatabaseConfig {
        downloads_enabled: d.and_then(|d| d.downloads_enabled).unwrap_or(true),
        downloads_path: d
            .and_then(|d| d.downloads_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("downloads.db")),
        failed_downloads_enabled: d.and_then(|d| d.failed_downloads_enabled).unwrap_or(true),
        failed_downloads_path: d
            .and_then(|d| d.failed_downloads_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("failed_downloads.db")),
    }
}

fn resolve_filepaths(fc: &FileConfig) -> FilepathsConfig {
    let f = fc.filepaths.as_ref();
    let defaults = FilepathsConfig::default();
    FilepathsConfig {
        folder_format: f
            .and_then(|f| f.folder_format.clone())
            .unwrap_or(defaults.folder_format),
        track_format: f
            .and_then(|f| f.track_format.clone())
            .unwrap_or(defaults.track_format),
        restrict_characters: f
            .and_then(|f| f.restrict_characters)
            .unwrap_or(defaults.restrict_characters),
        truncate_to: f.and_then(|f| f.truncate_to).unwrap_or(defaults.truncate_to),
    }
}

fn resolve_artwork(fc: &FileConfig) -> ArtworkConfig {
    let a = fc.artwork.as_ref();
    ArtworkConfig {
        embed_size: a
            .and_then(|a| a.embed_size.clone())
            .unwrap_or_else(|| "large".to_string()),
        save_hi_res: a.and_then(|a| a.save_hi_res).unwrap_or(false),
    }
}

fn resolve_quality(fc: &FileConfig) -> QualityConfig {
    let q = fc.quality.as_ref();
    let defaults = QualityConfig::default();
    QualityConfig {
        qobuz: q.and_then(|q| q.qobuz).unwrap_or(defaults.qobuz),
        tidal: q.and_then(|q| q.tidal).unwrap_or(defaults.tidal),
        deezer: q.and_then(|q| q.deezer).unwrap_or(defaults.deezer),
        soundcloud: q.and_then(|q| q.soundcloud).unwrap_or(defaults.soundcloud),
    }
}

fn resolve_conversion(fc: &FileConfig) -> ConversionConfig {
    let c = fc.conversion.as_ref();
    ConversionConfig {
        enabled: c.and_then(|c| c.enabled).unwrap_or(false),
        codec: c
            .and_then(|c| c.codec.clone())
            .unwrap_or_else(|| "flac".to_string()),
        sampling_rate: c.and_then(|c| c.sampling_rate).unwrap_or(44100),
        bit_depth: c.and_then(|c| c.bit_depth).unwrap_or(16),
    }
}

fn resolve_lastfm(fc: &FileConfig) -> LastfmConfig {
    let l = fc.lastfm.as_ref();
    LastfmConfig {
        source: l
            .and_then(|l| l.source.clone())
            .and_then(|s| Source::parse(&s)),
        fallback_source: l
            .and_then(|l| l.fallback_source.clone())
            .and_then(|s| Source::parse(&s)),
    }
}

fn resolve_cli(fc: &FileConfig) -> CliConfig {
    CliConfig {
        progress_bars: fc
            .cli
            .as_ref()
            .and_then(|c| c.progress_bars)
            .unwrap_or(true),
    }
}

// --- Public API ---

fn config_dir() -> PathBuf {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME").unwrap_or_default();
            PathBuf::from(home).join(".config")
        });
    config_dir.join("medley")
}

fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Parse config from TOML content only (no env vars). Exposed for testing.
pub fn parse_toml_config(content: &str) -> Result<Config> {
    let fc: FileConfig = toml::from_str(content).context("failed to parse config")?;
    Ok(build_config(&fc))
}

fn build_config(fc: &FileConfig) -> Config {
    Config {
        downloads: resolve_downloads(fc),
        database: resolve_database(fc),
        filepaths: resolve_filepaths(fc),
        artwork: resolve_artwork(fc),
        quality: resolve_quality(fc),
        conversion: resolve_conversion(fc),
        lastfm: resolve_lastfm(fc),
        cli: resolve_cli(fc),
        qobuz: resolve_qobuz(fc),
        tidal: resolve_tidal(fc),
        deezer: resolve_deezer(fc),
        soundcloud: resolve_soundcloud(fc),
        verify_ssl: fc.verify_ssl.unwrap_or(true),
    }
}

/// Load config from file and environment variable overrides.
///
/// Precedence for each credential field: environment variable, then the
/// config file's `[source]` section, then unconfigured (the orchestrator
/// prompts interactively in that case, see `get_logged_in_client`).
pub fn load_config() -> Result<Config> {
    let file_contents = std::fs::read_to_string(config_path()).unwrap_or_default();
    let fc: FileConfig = toml::from_str(&file_contents).context("failed to parse config file")?;
    Ok(build_config(&fc))
}

// --- Interactive prompts (credentials only; menus live in searcher.rs) ---

/// Prompt for missing Qobuz credentials on the controlling terminal.
pub fn prompt_qobuz_credentials() -> Result<QobuzCredentials> {
    let email = prompt_line("Qobuz email or user id: ")?;
    let password = prompt_secret("Qobuz password or token: ")?;
    Ok(QobuzCredentials {
        email_or_userid: email,
        password_or_token: password,
        app_id: None,
        app_secret: None,
    })
}

pub fn prompt_tidal_credentials() -> Result<TidalCredentials> {
    let access_token = prompt_secret("Tidal access token: ")?;
    Ok(TidalCredentials {
        access_token,
        refresh_token: None,
    })
}

pub fn prompt_deezer_credentials() -> Result<DeezerCredentials> {
    let arl = prompt_secret("Deezer ARL cookie: ")?;
    Ok(DeezerCredentials {
        arl,
        decryption_secret: None,
    })
}

pub fn prompt_soundcloud_credentials() -> Result<SoundcloudCredentials> {
    let client_id = prompt_line("SoundCloud client id: ")?;
    Ok(SoundcloudCredentials {
        client_id,
        app_version: "0".to_string(),
    })
}

fn prompt_line(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("no value provided for '{label}' and stdin is not a terminal");
    }
    eprint!("{label}");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("value for '{label}' cannot be empty");
    }
    Ok(trimmed)
}

fn prompt_secret(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("no value provided for '{label}' and stdin is not a terminal");
    }
    eprint!("{label}");
    io::stderr().flush()?;
    let value = rpassword::read_password().context("failed to read secret input")?;
    if value.is_empty() {
        bail!("value for '{label}' cannot be empty");
    }
    Ok(value)
}

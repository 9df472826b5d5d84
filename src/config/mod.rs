//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagewright";
const ENV_PREFIX: &str = "PAGEWRIGHT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CONTENT_BASE_URL: &str = "https://cdn.contentstack.io";
const DEFAULT_CONTENT_TYPE: &str = "page";
const DEFAULT_LOCALE: &str = "en-us";
const DEFAULT_CONTENT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PREVIEW_HOST: &str = "rest-preview.contentstack.com";
const DEFAULT_LIVE_PREVIEW_CAPACITY: u32 = 64;
const DEFAULT_SITE_TITLE: &str = "Pagewright";

/// Command-line arguments for the Pagewright binary.
#[derive(Debug, Parser)]
#[command(
    name = "pagewright",
    version,
    about = "Server-rendered CMS pages with live preview"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGEWRIGHT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Fetch and render a single route, printing its HTML.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverrides {
    /// Override the content delivery API base URL.
    #[arg(long = "content-base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the publishing environment queried.
    #[arg(long = "content-environment", value_name = "NAME")]
    pub environment: Option<String>,

    /// Override the entry locale.
    #[arg(long = "content-locale", value_name = "LOCALE")]
    pub locale: Option<String>,

    /// Override the deployment mode shown on the environment page.
    #[arg(long = "deployment-mode", value_name = "MODE")]
    pub deployment_mode: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle live preview.
    #[arg(
        long = "live-preview",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub live_preview: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: ContentOverrides,

    /// Request path to render, e.g. `/about` or `/blog/hello`.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Write the HTML to a file instead of stdout.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub live_preview: LivePreviewSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub delivery_token: Option<String>,
    pub environment: String,
    pub content_type: String,
    pub locale: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LivePreviewSettings {
    pub enabled: bool,
    pub preview_token: Option<String>,
    pub preview_host: String,
    /// Synthesize `data-cslp` editor tags on fetched documents.
    pub editable_tags: bool,
    pub capacity: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub footer_copy: Option<String>,
    pub deployment_mode: DeploymentMode,
}

/// Deployment mode the site runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
    Other(String),
}

impl DeploymentMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" => Self::Development,
            "production" => Self::Production,
            other => Self::Other(other.to_string()),
        }
    }

    /// Human label shown on the environment page.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Development => "Development",
            Self::Production => "Production",
            Self::Other(_) => "Staging/Preview",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_content_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    live_preview: RawLivePreviewSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.live_preview {
            self.live_preview.enabled = Some(enabled);
        }

        self.apply_content_overrides(&overrides.content);
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(url) = overrides.base_url.as_ref() {
            self.content.base_url = Some(url.clone());
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.content.environment = Some(environment.clone());
        }
        if let Some(locale) = overrides.locale.as_ref() {
            self.content.locale = Some(locale.clone());
        }
        if let Some(mode) = overrides.deployment_mode.as_ref() {
            self.site.deployment_mode = Some(mode.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            live_preview,
            site,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let content = build_content_settings(content)?;
        let live_preview = build_live_preview_settings(live_preview)?;
        let site = build_site_settings(site);

        Ok(Self {
            server,
            logging,
            content,
            live_preview,
            site,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let raw_url = content
        .base_url
        .unwrap_or_else(|| DEFAULT_CONTENT_BASE_URL.to_string());
    let base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("content.base_url", format!("invalid url: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "content.base_url",
            "scheme must be http or https",
        ));
    }

    let environment = non_blank(content.environment).unwrap_or_default();
    let content_type =
        non_blank(content.content_type).unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let locale = non_blank(content.locale).unwrap_or_else(|| DEFAULT_LOCALE.to_string());

    let timeout_secs = content
        .timeout_seconds
        .unwrap_or(DEFAULT_CONTENT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "content.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ContentSettings {
        base_url,
        api_key: non_blank(content.api_key),
        delivery_token: non_blank(content.delivery_token),
        environment,
        content_type,
        locale,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_live_preview_settings(
    live_preview: RawLivePreviewSettings,
) -> Result<LivePreviewSettings, LoadError> {
    let enabled = live_preview.enabled.unwrap_or(false);
    let preview_host =
        non_blank(live_preview.preview_host).unwrap_or_else(|| DEFAULT_PREVIEW_HOST.to_string());
    if preview_host.contains('/') {
        return Err(LoadError::invalid(
            "live_preview.preview_host",
            "expected a bare host name",
        ));
    }

    let capacity = non_zero_u32(
        live_preview
            .capacity
            .unwrap_or(DEFAULT_LIVE_PREVIEW_CAPACITY.into()),
        "live_preview.capacity",
    )?;

    Ok(LivePreviewSettings {
        enabled,
        preview_token: non_blank(live_preview.preview_token),
        preview_host,
        editable_tags: live_preview.editable_tags.unwrap_or(enabled),
        capacity,
    })
}

fn build_site_settings(site: RawSiteSettings) -> SiteSettings {
    SiteSettings {
        title: non_blank(site.title).unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        footer_copy: non_blank(site.footer_copy),
        deployment_mode: site
            .deployment_mode
            .as_deref()
            .map(DeploymentMode::parse)
            .unwrap_or(DeploymentMode::Development),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    delivery_token: Option<String>,
    environment: Option<String>,
    content_type: Option<String>,
    locale: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLivePreviewSettings {
    enabled: Option<bool>,
    preview_token: Option<String>,
    preview_host: Option<String>,
    editable_tags: Option<bool>,
    capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    footer_copy: Option<String>,
    deployment_mode: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.content.environment = Some("staging".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            content: ContentOverrides {
                environment: Some("production".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.content.environment, "production");
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.content.base_url.as_str(), "https://cdn.contentstack.io/");
        assert_eq!(settings.content.content_type, "page");
        assert_eq!(settings.content.locale, "en-us");
        assert!(settings.content.api_key.is_none());
        assert!(!settings.live_preview.enabled);
        assert!(!settings.live_preview.editable_tags);
        assert_eq!(settings.site.deployment_mode, DeploymentMode::Development);
    }

    #[test]
    fn editable_tags_follow_live_preview_unless_set() {
        let mut raw = RawSettings::default();
        raw.live_preview.enabled = Some(true);
        let settings = Settings::from_raw(raw.clone()).expect("valid settings");
        assert!(settings.live_preview.editable_tags);

        raw.live_preview.editable_tags = Some(false);
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(!settings.live_preview.editable_tags);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn rejects_invalid_values() {
        let mut raw = RawSettings::default();
        raw.content.base_url = Some("ftp://cdn.example.com".to_string());
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "content.base_url",
                ..
            })
        ));

        let mut raw = RawSettings::default();
        raw.content.timeout_seconds = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "content.timeout_seconds",
                ..
            })
        ));

        let mut raw = RawSettings::default();
        raw.live_preview.capacity = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn deployment_mode_labels() {
        assert_eq!(DeploymentMode::parse("development").label(), "Development");
        assert_eq!(DeploymentMode::parse(" Production ").label(), "Production");
        assert_eq!(DeploymentMode::parse("preview").label(), "Staging/Preview");
        assert_eq!(DeploymentMode::parse("").label(), "Staging/Preview");
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["pagewright"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_render_arguments() {
        let args = CliArgs::parse_from([
            "pagewright",
            "render",
            "--content-environment",
            "preview",
            "--deployment-mode",
            "production",
            "--output",
            "/tmp/about.html",
            "/about",
        ]);

        match args.command.expect("render command") {
            Command::Render(render) => {
                assert_eq!(render.path, "/about");
                assert_eq!(render.overrides.environment.as_deref(), Some("preview"));
                assert_eq!(
                    render.overrides.deployment_mode.as_deref(),
                    Some("production")
                );
                assert_eq!(
                    render.output.as_deref(),
                    Some(std::path::Path::new("/tmp/about.html"))
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_live_preview_toggle() {
        let args = CliArgs::parse_from(["pagewright", "serve", "--live-preview", "yes"]);
        match args.command.expect("serve command") {
            Command::Serve(serve) => assert_eq!(serve.overrides.live_preview, Some(true)),
            _ => panic!("wrong command parsed"),
        }
    }
}

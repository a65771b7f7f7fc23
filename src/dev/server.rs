//! Bundled live transformer.
//!
//! # Responsibilities
//! - Serve the dev client script and its reload ping endpoint
//! - Serve `public/` and project files, falling through otherwise
//! - Refuse dotfiles, key material and the project config; leave `.html`
//!   requests to the render pipeline
//! - Inject the dev client into the template
//! - Load the server entry fresh on every request
//! - Attach source ids and code frames to render errors
//!
//! # Design Decisions
//! - Project overrides live in `<root>/ssr.dev.toml`; a malformed file is
//!   a startup error, never ignored
//! - Under the test flag only errors are logged

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::{self, BoxFuture, FutureExt};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::backend::Fallthrough;
use crate::config::{AppConfig, DevConfig};
use crate::dev::{code_frame, LiveTransformer};
use crate::render::dylib::DylibLoader;
use crate::render::entry::{ModuleLoader, ServerEntry};
use crate::render::error::RenderError;

/// Per-project overrides, read from the project root.
pub const PROJECT_CONFIG_FILE: &str = "ssr.dev.toml";

/// Extensions of files the middleware never serves.
const DENIED_EXTENSIONS: &[&str] = &["pem", "crt", "key", "p12", "pfx"];

const CLIENT_SCRIPT: &str = r#"// ssr-handle dev client
const ping = "__PING_PATH__";
let seen = null;
setInterval(async () => {
  try {
    const stamp = await (await fetch(ping, { cache: "no-store" })).text();
    if (seen !== null && stamp !== seen) location.reload();
    seen = stamp;
  } catch (_) {}
}, 1000);
"#;

/// Error type for dev server initialization.
#[derive(Debug, Error)]
pub enum DevServerError {
    #[error("project root {} is not a directory", .0.display())]
    RootMissing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed project config {}: {source}", path.display())]
    ProjectConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProjectConfig {
    public_dir: Option<String>,
    /// Specifier → specifier rewrites applied before loading.
    alias: HashMap<String, String>,
}

impl ProjectConfig {
    fn read(root: &Path) -> Result<Self, DevServerError> {
        let path = root.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| DevServerError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| DevServerError::ProjectConfig { path, source })
    }
}

/// Dev server construction options.
#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub root: PathBuf,
    /// Server entry specifier watched by the reload ping.
    pub entry: String,
    pub public_dir: String,
    pub client_path: String,
    pub inject_client: bool,
    /// Log errors only.
    pub quiet: bool,
}

impl DevServerOptions {
    pub fn from_config(app: &AppConfig, dev: &DevConfig) -> Self {
        Self {
            root: app.root.clone(),
            entry: app.dev_entry.clone(),
            public_dir: dev.public_dir.clone(),
            client_path: dev.client_path.clone(),
            inject_client: dev.inject_client,
            quiet: app.test,
        }
    }
}

/// Live transformer bound to a project root.
pub struct DevServer {
    root: PathBuf,
    entry: String,
    client_path: String,
    ping_path: String,
    inject_client: bool,
    quiet: bool,
    aliases: HashMap<String, String>,
    loader: Arc<dyn ModuleLoader>,
    public_files: ServeDir,
    project_files: ServeDir,
}

impl DevServer {
    /// Dev server loading native server entries fresh from `root`.
    pub fn new(options: DevServerOptions) -> Result<Self, DevServerError> {
        let loader = Arc::new(DylibLoader::fresh(options.root.clone()));
        Self::with_loader(options, loader)
    }

    pub fn with_loader(
        options: DevServerOptions,
        loader: Arc<dyn ModuleLoader>,
    ) -> Result<Self, DevServerError> {
        if !options.root.is_dir() {
            return Err(DevServerError::RootMissing(options.root));
        }
        let project = ProjectConfig::read(&options.root)?;
        let public_dir = project.public_dir.unwrap_or(options.public_dir);

        let serve = |dir: PathBuf| {
            ServeDir::new(dir)
                .append_index_html_on_directories(false)
                .call_fallback_on_method_not_allowed(true)
        };
        let public_files = serve(options.root.join(&public_dir));
        let project_files = serve(options.root.clone());

        if !options.quiet {
            tracing::info!(
                root = %options.root.display(),
                public_dir = %public_dir,
                aliases = project.alias.len(),
                "Dev server ready (middleware mode)"
            );
        }

        Ok(Self {
            ping_path: format!("{}/ping", options.client_path.trim_end_matches('/')),
            root: options.root,
            entry: options.entry,
            client_path: options.client_path,
            inject_client: options.inject_client,
            quiet: options.quiet,
            aliases: project.alias,
            loader,
            public_files,
            project_files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_specifier<'a>(&'a self, specifier: &'a str) -> &'a str {
        self.aliases
            .get(specifier)
            .map(String::as_str)
            .unwrap_or(specifier)
    }

    fn source_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() && path.is_file() {
            path.to_path_buf()
        } else {
            self.root.join(file.trim_start_matches('/'))
        }
    }

    fn client_tag(&self) -> String {
        format!(r#"<script type="module" src="{}"></script>"#, self.client_path)
    }

    fn client_script(&self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "application/javascript"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            CLIENT_SCRIPT.replace("__PING_PATH__", &self.ping_path),
        )
            .into_response()
    }

    fn ping(&self) -> Response {
        let stamp = self
            .loader
            .fingerprint(self.resolve_specifier(&self.entry))
            .unwrap_or_else(|| "none".to_string());
        (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            stamp,
        )
            .into_response()
    }
}

/// How the middleware treats a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exposure {
    /// Static file lookup, then fall through.
    Files,
    /// Public files only; project `.html` files are templates, not assets.
    Page,
    /// Answered `403` without touching the file system.
    Denied,
}

fn exposure(path: &str) -> Exposure {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let segments: Vec<&str> = decoded
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.iter().any(|segment| segment.starts_with('.')) {
        return Exposure::Denied;
    }
    let Some(name) = segments.last() else {
        return Exposure::Files;
    };
    if name.eq_ignore_ascii_case(PROJECT_CONFIG_FILE) {
        return Exposure::Denied;
    }

    let extension = Path::new(*name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some(ext) if DENIED_EXTENSIONS.contains(&ext) => Exposure::Denied,
        Some("html" | "htm") => Exposure::Page,
        _ => Exposure::Files,
    }
}

/// Byte offset just past the opening `<head>` tag, if any.
fn head_insert_position(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(found) = lower[from..].find("<head") {
        let after = from + found + "<head".len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() => {
                return lower[after..].find('>').map(|end| after + end + 1);
            }
            // <header> and friends
            _ => from = after,
        }
    }
    None
}

impl LiveTransformer for DevServer {
    fn middleware(
        &self,
        request: Request<Body>,
        fallthrough: Fallthrough,
    ) -> BoxFuture<'static, Response> {
        let path = request.uri().path();
        if path == self.client_path {
            return future::ready(self.client_script()).boxed();
        }
        if path == self.ping_path {
            return future::ready(self.ping()).boxed();
        }

        match exposure(path) {
            Exposure::Denied => {
                if !self.quiet {
                    tracing::warn!(path, "Refused to serve protected project file");
                }
                future::ready(StatusCode::FORBIDDEN.into_response()).boxed()
            }
            Exposure::Page => {
                let files = self.public_files.clone().fallback(fallthrough);
                async move {
                    match files.oneshot(request).await {
                        Ok(response) => response.map(Body::new),
                        Err(never) => match never {},
                    }
                }
                .boxed()
            }
            Exposure::Files => {
                let files = self
                    .public_files
                    .clone()
                    .fallback(self.project_files.clone().fallback(fallthrough));
                async move {
                    match files.oneshot(request).await {
                        Ok(response) => response.map(Body::new),
                        Err(never) => match never {},
                    }
                }
                .boxed()
            }
        }
    }

    fn transform_index_html<'a>(
        &'a self,
        url: &'a str,
        html: &'a str,
    ) -> BoxFuture<'a, Result<String, RenderError>> {
        tracing::trace!(url, "Transforming index html");
        let transformed = if self.inject_client {
            let tag = self.client_tag();
            match head_insert_position(html) {
                Some(at) => format!("{}{tag}{}", &html[..at], &html[at..]),
                None => format!("{tag}{html}"),
            }
        } else {
            html.to_string()
        };
        future::ready(Ok(transformed)).boxed()
    }

    fn ssr_load_module<'a>(
        &'a self,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ServerEntry>, RenderError>> {
        let resolved = self.resolve_specifier(specifier);
        async move {
            let entry = self.loader.load(resolved).await?;
            if !self.quiet {
                tracing::debug!(specifier, resolved, "Server entry loaded");
            }
            Ok(entry)
        }
        .boxed()
    }

    fn ssr_fix_stacktrace(&self, error: &mut RenderError) {
        let Some(loc) = error.loc.clone() else {
            return;
        };
        let path = self.source_path(&loc.file);
        if error.id.is_none() {
            error.id = Some(path.display().to_string());
        }
        if error.frame.is_none() {
            match std::fs::read_to_string(&path) {
                Ok(source) => error.frame = code_frame::generate(&source, loc.line, loc.column),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Source unavailable for code frame");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::entry::{render_fn, ModuleRegistry, RenderOutput};
    use crate::render::error::{SourceLocation, Stage};
    use std::convert::Infallible;
    use tower::util::BoxCloneService;

    fn options(root: &Path) -> DevServerOptions {
        DevServerOptions {
            root: root.to_path_buf(),
            entry: "/src/entry-server".into(),
            public_dir: "public".into(),
            client_path: "/@ssr/client".into(),
            inject_client: true,
            quiet: true,
        }
    }

    fn server(root: &Path) -> DevServer {
        DevServer::with_loader(options(root), Arc::new(ModuleRegistry::new())).unwrap()
    }

    fn not_found() -> Fallthrough {
        BoxCloneService::new(tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(StatusCode::IM_A_TEAPOT.into_response())
        }))
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = DevServer::with_loader(
            options(Path::new("/no/such/root")),
            Arc::new(ModuleRegistry::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DevServerError::RootMissing(_)));
    }

    #[test]
    fn test_malformed_project_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "public_dir = [").unwrap();
        let err = DevServer::with_loader(options(dir.path()), Arc::new(ModuleRegistry::new()))
            .err()
            .unwrap();
        assert!(matches!(err, DevServerError::ProjectConfig { .. }));

        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "unknown = 1").unwrap();
        assert!(DevServer::with_loader(options(dir.path()), Arc::new(ModuleRegistry::new())).is_err());
    }

    #[test]
    fn test_head_insert_position() {
        assert_eq!(head_insert_position("<html><head><title>"), Some(12));
        assert_eq!(head_insert_position("<HEAD lang=\"en\">x"), Some(16));
        assert_eq!(head_insert_position("<header></header><head>"), Some(23));
        assert_eq!(head_insert_position("<body></body>"), None);
    }

    #[tokio::test]
    async fn test_transform_injects_client_after_head() {
        let dir = tempfile::tempdir().unwrap();
        let dev = server(dir.path());
        let html = dev
            .transform_index_html("/", "<head></head><!--app-html-->")
            .await
            .unwrap();
        assert_eq!(
            html,
            r#"<head><script type="module" src="/@ssr/client"></script></head><!--app-html-->"#
        );

        let html = dev.transform_index_html("/", "<!--app-html-->").await.unwrap();
        assert!(html.starts_with("<script"));
    }

    #[tokio::test]
    async fn test_middleware_serves_client_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/logo.svg"), "<svg/>").unwrap();
        let dev = server(dir.path());

        let request = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let response = dev.middleware(request("/@ssr/client"), not_found()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );

        let response = dev.middleware(request("/logo.svg"), not_found()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = dev.middleware(request("/"), not_found()).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn test_exposure_of_paths() {
        for path in [
            "/.env",
            "/.env.local",
            "/%2Eenv",
            "/.git/config",
            "/src/.secret/x.js",
            "/ssr.dev.toml",
            "/SSR.DEV.TOML",
            "/certs/server.pem",
            "/tls/site.CRT",
            "/a%5C.env",
        ] {
            assert_eq!(exposure(path), Exposure::Denied, "{path}");
        }
        assert_eq!(exposure("/index.html"), Exposure::Page);
        assert_eq!(exposure("/docs/guide.HTM"), Exposure::Page);
        assert_eq!(exposure("/"), Exposure::Files);
        assert_eq!(exposure("/src/main.js"), Exposure::Files);
        assert_eq!(exposure("/env.js"), Exposure::Files);
    }

    #[tokio::test]
    async fn test_middleware_protects_project_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(dir.path().join("index.html"), "<!--app-html-->").unwrap();
        std::fs::write(dir.path().join("key.pem"), "-----BEGIN").unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/about.html"), "static").unwrap();
        let dev = server(dir.path());

        let request = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        for uri in ["/.env", "/key.pem"] {
            let response = dev.middleware(request(uri), not_found()).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        }

        let response = dev.middleware(request("/index.html"), not_found()).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

        let response = dev.middleware(request("/about.html"), not_found()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_aliases_are_applied_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[alias]\n\"/src/entry-server\" = \"app\"\n",
        )
        .unwrap();
        let registry = ModuleRegistry::new().with(
            "app",
            render_fn(|_, _| async { Ok(RenderOutput::html("aliased", serde_json::Value::Null)) }),
        );
        let dev = DevServer::with_loader(options(dir.path()), Arc::new(registry)).unwrap();

        assert!(dev.ssr_load_module("/src/entry-server").await.is_ok());
        assert!(dev.ssr_load_module("/src/other").await.is_err());
    }

    #[test]
    fn test_fix_stacktrace_adds_id_and_frame() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.rs"), "a\nb\nc\n").unwrap();
        let dev = server(dir.path());

        let mut error = RenderError::new(Stage::Render, "bad").with_loc(SourceLocation {
            file: "src/app.rs".into(),
            line: 2,
            column: 1,
        });
        dev.ssr_fix_stacktrace(&mut error);

        assert!(error.id.as_deref().unwrap().ends_with("app.rs"));
        assert!(error.frame.as_deref().unwrap().contains("> 2 | b"));
    }

    #[test]
    fn test_fix_stacktrace_keeps_existing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let dev = server(dir.path());

        let mut error = RenderError::new(Stage::Render, "bad");
        dev.ssr_fix_stacktrace(&mut error);
        assert!(error.id.is_none());

        let mut error = RenderError::new(Stage::Render, "bad")
            .with_id("given")
            .with_frame("frame")
            .with_loc(SourceLocation {
                file: "missing.rs".into(),
                line: 1,
                column: 1,
            });
        dev.ssr_fix_stacktrace(&mut error);
        assert_eq!(error.id.as_deref(), Some("given"));
        assert_eq!(error.frame.as_deref(), Some("frame"));
    }
}

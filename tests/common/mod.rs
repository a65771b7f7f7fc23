//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use ssr_handle::render::{ModuleRegistry, ServerEntry};
use ssr_handle::{bootstrap_with_loader, HttpServer, Mode, SsrConfig, SsrRuntime};

pub const DEV_ENTRY: &str = "/src/entry-server";
pub const PROD_ENTRY: &str = "server/entry-server";

pub const TEMPLATE: &str = "<html><head><title>t</title></head><body><!--init-props--><div id=\"app\"><!--app-html--></div></body></html>";

/// A throwaway project directory with a template and built client assets.
pub struct Project {
    pub dir: TempDir,
    pub config: SsrConfig,
}

impl Project {
    pub fn new(mode: Mode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(root, "index.html", TEMPLATE);
        write(root, "dist/client/assets/app.js", "console.log('client')");
        write(root, "public/robots.txt", "User-agent: *");

        let mut config = SsrConfig::default();
        config.app.mode = mode;
        config.app.root = root.to_path_buf();
        config.app.index = root.join("index.html");
        config.app.dist = root.join("dist");
        config.app.test = true;
        config.dev.inject_client = false;

        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        write(self.root(), relative, contents);
    }

    /// Runtime whose server entries come from `registry`.
    pub fn runtime(&self, registry: Arc<ModuleRegistry>) -> SsrRuntime {
        match bootstrap_with_loader(&self.config, registry) {
            Ok(runtime) => runtime,
            Err(e) => panic!("bootstrap failed: {e}"),
        }
    }

    pub fn router(&self, registry: Arc<ModuleRegistry>) -> Router {
        HttpServer::new(self.runtime(registry), &self.config.server).router()
    }
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Registry serving `entry` under both the dev and prod specifiers.
pub fn registry(entry: Arc<dyn ServerEntry>) -> Arc<ModuleRegistry> {
    Arc::new(
        ModuleRegistry::new()
            .with(DEV_ENTRY, entry.clone())
            .with(PROD_ENTRY, entry),
    )
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub async fn get(router: &Router, uri: &str) -> Reply {
    send(router, Method::GET, uri).await
}

pub async fn send(router: &Router, method: Method, uri: &str) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

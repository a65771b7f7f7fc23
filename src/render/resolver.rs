//! Render function resolution strategies.
//!
//! # Responsibilities
//! - Development: transform the template and load the server entry fresh
//!   for every request, so edits take effect without a restart
//! - Production: import the precompiled server entry once and reuse it
//!
//! # Design Decisions
//! - The strategy is chosen once at bootstrap; callers only see `resolve`
//! - The production cache is a `OnceCell` owned by the resolver; concurrent
//!   first requests wait on a single import
//! - A failed import is not cached, so the next request tries again

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;

use crate::config::Mode;
use crate::dev::LiveTransformer;
use crate::observability::metrics;
use crate::render::entry::{ModuleLoader, ServerEntry};
use crate::render::error::RenderError;
use crate::render::template::Template;

/// A render function together with the template it renders into.
pub struct Resolved {
    pub entry: Arc<dyn ServerEntry>,
    pub template: Arc<str>,
}

/// Produces the render function for a request.
pub trait RenderResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        url: &'a str,
        template: &'a Template,
    ) -> BoxFuture<'a, Result<Resolved, RenderError>>;
}

/// Always-fresh resolution through the live transformer.
pub struct DevResolver {
    transformer: Arc<dyn LiveTransformer>,
    entry: String,
}

impl DevResolver {
    pub fn new(transformer: Arc<dyn LiveTransformer>, entry: impl Into<String>) -> Self {
        Self {
            transformer,
            entry: entry.into(),
        }
    }
}

impl RenderResolver for DevResolver {
    fn resolve<'a>(
        &'a self,
        url: &'a str,
        template: &'a Template,
    ) -> BoxFuture<'a, Result<Resolved, RenderError>> {
        async move {
            let html = self
                .transformer
                .transform_index_html(url, template.as_str())
                .await?;
            let entry = self.transformer.ssr_load_module(&self.entry).await?;
            metrics::record_module_load(Mode::Development);
            Ok(Resolved {
                entry,
                template: Arc::from(html),
            })
        }
        .boxed()
    }
}

/// Import-once resolution of the precompiled server entry.
pub struct ProdResolver {
    loader: Arc<dyn ModuleLoader>,
    entry: String,
    cached: OnceCell<Arc<dyn ServerEntry>>,
}

impl ProdResolver {
    pub fn new(loader: Arc<dyn ModuleLoader>, entry: impl Into<String>) -> Self {
        Self {
            loader,
            entry: entry.into(),
            cached: OnceCell::new(),
        }
    }

    /// Whether the server entry has been imported yet.
    pub fn is_loaded(&self) -> bool {
        self.cached.initialized()
    }

    async fn entry(&self) -> Result<Arc<dyn ServerEntry>, RenderError> {
        let entry = self
            .cached
            .get_or_try_init(|| async {
                let entry = self.loader.load(&self.entry).await?;
                metrics::record_module_load(Mode::Production);
                tracing::info!(entry = %self.entry, "Server entry imported");
                Ok::<_, RenderError>(entry)
            })
            .await?;
        Ok(Arc::clone(entry))
    }
}

impl RenderResolver for ProdResolver {
    fn resolve<'a>(
        &'a self,
        _url: &'a str,
        template: &'a Template,
    ) -> BoxFuture<'a, Result<Resolved, RenderError>> {
        async move {
            Ok(Resolved {
                entry: self.entry().await?,
                template: template.shared(),
            })
        }
        .boxed()
    }
}

//! Server entry abstraction and module loading.
//!
//! # Responsibilities
//! - Define the `ServerEntry` capability (the application's render function)
//! - Define the `ModuleLoader` seam used by both resolver strategies
//! - Provide an in-process registry for statically linked entries
//!
//! # Design Decisions
//! - Render calls return `'static` boxed futures so they can be spawned
//! - A render result is either a redirect or markup + state, never both

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::render::context::RenderContext;
use crate::render::error::{RenderError, Stage};

/// Raw value returned by a server entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    #[serde(default)]
    pub app_html: String,

    /// Initial state for client hydration. Missing data serializes as `null`.
    #[serde(default)]
    pub props_data: serde_json::Value,

    #[serde(default)]
    pub redirect: Option<String>,
}

impl RenderOutput {
    pub fn html(app_html: impl Into<String>, props_data: serde_json::Value) -> Self {
        Self {
            app_html: app_html.into(),
            props_data,
            redirect: None,
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            redirect: Some(location.into()),
            ..Self::default()
        }
    }

    /// Decide the outcome. An empty redirect counts as no redirect.
    pub fn into_result(self) -> RenderResult {
        match self.redirect {
            Some(location) if !location.is_empty() => RenderResult::Redirect { location },
            _ => RenderResult::Rendered {
                markup: self.app_html,
                state: self.props_data,
            },
        }
    }
}

/// Outcome of a successful render call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderResult {
    Redirect { location: String },
    Rendered { markup: String, state: serde_json::Value },
}

/// The application's render function.
pub trait ServerEntry: Send + Sync {
    fn render(
        &self,
        url: &str,
        context: RenderContext,
    ) -> BoxFuture<'static, Result<RenderOutput, RenderError>>;
}

/// Adapter turning an async closure into a [`ServerEntry`].
pub struct FnEntry<F>(F);

impl<F, Fut> ServerEntry for FnEntry<F>
where
    F: Fn(String, RenderContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RenderOutput, RenderError>> + Send + 'static,
{
    fn render(
        &self,
        url: &str,
        context: RenderContext,
    ) -> BoxFuture<'static, Result<RenderOutput, RenderError>> {
        (self.0)(url.to_string(), context).boxed()
    }
}

/// Build a shared entry from an async closure.
pub fn render_fn<F, Fut>(f: F) -> Arc<dyn ServerEntry>
where
    F: Fn(String, RenderContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RenderOutput, RenderError>> + Send + 'static,
{
    Arc::new(FnEntry(f))
}

/// Resolves a module specifier to a server entry.
pub trait ModuleLoader: Send + Sync {
    fn load<'a>(
        &'a self,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ServerEntry>, RenderError>>;

    /// Value that changes whenever the module behind `specifier` changes.
    fn fingerprint(&self, _specifier: &str) -> Option<String> {
        None
    }
}

/// In-process modules keyed by specifier.
///
/// Entries can be replaced while the server runs; the next load observes
/// the new entry.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, (u64, Arc<dyn ServerEntry>)>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(self, specifier: impl Into<String>, entry: Arc<dyn ServerEntry>) -> Self {
        self.insert(specifier, entry);
        self
    }

    /// Register or replace an entry.
    pub fn insert(&self, specifier: impl Into<String>, entry: Arc<dyn ServerEntry>) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let specifier = specifier.into();
        let generation = modules.get(&specifier).map_or(0, |(g, _)| g + 1);
        modules.insert(specifier, (generation, entry));
    }

    fn get(&self, specifier: &str) -> Option<(u64, Arc<dyn ServerEntry>)> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(specifier)
            .cloned()
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load<'a>(
        &'a self,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ServerEntry>, RenderError>> {
        let result = self.get(specifier).map(|(_, entry)| entry).ok_or_else(|| {
            RenderError::new(
                Stage::Load,
                format!("no module registered for '{specifier}'"),
            )
            .with_id(specifier)
        });
        future::ready(result).boxed()
    }

    fn fingerprint(&self, specifier: &str) -> Option<String> {
        self.get(specifier).map(|(generation, _)| generation.to_string())
    }
}

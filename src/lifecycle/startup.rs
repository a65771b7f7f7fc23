//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the template
//! - Construct exactly one asset backend for the configured mode
//! - Select the matching resolver strategy and error formatter
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, there is no degraded mode
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{Backend, DevBackend, StaticAssets};
use crate::config::{Mode, SsrConfig};
use crate::dev::{DevServer, DevServerError, DevServerOptions, LiveTransformer};
use crate::http::error_page::ErrorFormatter;
use crate::render::dylib::DylibLoader;
use crate::render::entry::ModuleLoader;
use crate::render::resolver::{DevResolver, ProdResolver, RenderResolver};
use crate::render::template::{Template, TemplateError};

/// Environment variable that marks a test run.
pub const TEST_ENV_VAR: &str = "SSR_TEST";

/// Error type for startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("dev server failed to start: {0}")]
    DevServer(#[from] DevServerError),
}

/// Everything a request needs, fixed for the process lifetime.
pub struct SsrRuntime {
    pub mode: Mode,
    pub template: Template,
    pub backend: Arc<dyn Backend>,
    pub resolver: Arc<dyn RenderResolver>,
    pub errors: ErrorFormatter,
}

/// Whether the dev server should log errors only.
pub fn is_test_run(config: &SsrConfig) -> bool {
    config.app.test || std::env::var_os(TEST_ENV_VAR).is_some()
}

/// Build the runtime, loading native server entries from disk.
pub fn bootstrap(config: &SsrConfig) -> Result<SsrRuntime, BootstrapError> {
    let loader: Arc<dyn ModuleLoader> = match config.app.mode {
        Mode::Development => Arc::new(DylibLoader::fresh(config.app.root.clone())),
        Mode::Production => Arc::new(DylibLoader::in_place(config.app.dist.clone())),
    };
    bootstrap_with_loader(config, loader)
}

/// Build the runtime with a custom module loader.
pub fn bootstrap_with_loader(
    config: &SsrConfig,
    loader: Arc<dyn ModuleLoader>,
) -> Result<SsrRuntime, BootstrapError> {
    let template = Template::load(&config.app.index)?;
    tracing::info!(
        mode = %config.app.mode,
        template = %config.app.index.display(),
        "Template loaded"
    );

    let runtime = match config.app.mode {
        Mode::Development => {
            let mut options = DevServerOptions::from_config(&config.app, &config.dev);
            options.quiet = is_test_run(config);
            let transformer: Arc<dyn LiveTransformer> =
                Arc::new(DevServer::with_loader(options, loader)?);

            SsrRuntime {
                mode: Mode::Development,
                template,
                backend: Arc::new(DevBackend::new(transformer.clone())),
                resolver: Arc::new(DevResolver::new(
                    transformer.clone(),
                    config.app.dev_entry.clone(),
                )),
                errors: ErrorFormatter::Development(transformer),
            }
        }
        Mode::Production => {
            let assets = StaticAssets::new(config.app.client_dir());
            tracing::info!(dir = %assets.dir().display(), "Serving static client assets");

            SsrRuntime {
                mode: Mode::Production,
                template,
                backend: Arc::new(assets),
                resolver: Arc::new(ProdResolver::new(loader, config.app.prod_entry.clone())),
                errors: ErrorFormatter::Production,
            }
        }
    };

    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::entry::ModuleRegistry;

    fn config(mode: Mode, root: &std::path::Path) -> SsrConfig {
        let mut config = SsrConfig::default();
        config.app.mode = mode;
        config.app.root = root.to_path_buf();
        config.app.index = root.join("index.html");
        config.app.dist = root.join("dist");
        config.app.test = true;
        config
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = bootstrap(&config(Mode::Production, dir.path())).err().unwrap();
        assert!(matches!(err, BootstrapError::Template(TemplateError::Io { .. })));
    }

    #[test]
    fn test_dev_init_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<!--init-props--><!--app-html-->").unwrap();
        std::fs::write(dir.path().join("ssr.dev.toml"), "alias = 3").unwrap();

        let err = bootstrap_with_loader(
            &config(Mode::Development, dir.path()),
            Arc::new(ModuleRegistry::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, BootstrapError::DevServer(_)));
    }

    #[test]
    fn test_mode_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<!--init-props--><!--app-html-->").unwrap();

        for mode in [Mode::Development, Mode::Production] {
            let runtime = bootstrap_with_loader(
                &config(mode, dir.path()),
                Arc::new(ModuleRegistry::new()),
            )
            .ok()
            .unwrap();
            assert_eq!(runtime.mode, mode);
            assert_eq!(runtime.backend.mode(), mode);
            assert_eq!(
                matches!(runtime.errors, ErrorFormatter::Development(_)),
                mode.is_dev()
            );
        }
    }
}

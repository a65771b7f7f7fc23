//! Native server entries loaded from dynamic libraries.
//!
//! A server entry library exports:
//!
//! ```text
//! ssr_render(url: *const c_char, context_json: *const c_char) -> *mut c_char
//! ssr_free(ptr: *mut c_char)
//! ssr_init()                      (optional, called once after loading)
//! ```
//!
//! `ssr_render` returns a NUL-terminated JSON document, either
//! `{"appHtml": .., "propsData": .., "redirect": ..}` or
//! `{"error": {"message": .., "id": .., "frame": .., "pluginCode": .., "loc": ..}}`,
//! which the host hands back to `ssr_free`. Any reply carrying an `error`
//! key is a failure, whatever its shape; a success must name `appHtml` or
//! `redirect`.
//!
//! # Design Decisions
//! - Fresh loads copy the library to a unique temporary path first; the
//!   dynamic loader caches by path, so reopening the original would return
//!   the stale image after a rebuild
//! - A fresh loader reuses its last image until the file's fingerprint
//!   changes, so unchanged libraries are not copied and reopened per request
//! - Render calls run on the blocking pool

use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::UNIX_EPOCH;

use futures_util::future::{BoxFuture, FutureExt};
use libloading::Library;
use serde_json::Value;
use uuid::Uuid;

use crate::render::context::RenderContext;
use crate::render::entry::{ModuleLoader, RenderOutput, ServerEntry};
use crate::render::error::{ErrorPayload, RenderError, Stage};

type RenderSymbol = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut c_char;
type FreeSymbol = unsafe extern "C" fn(*mut c_char);
type InitSymbol = unsafe extern "C" fn();

const RENDER_SYMBOL: &str = "ssr_render";
const FREE_SYMBOL: &str = "ssr_free";
const INIT_SYMBOL: &str = "ssr_init";

struct LoadedLibrary {
    path: PathBuf,
    render: RenderSymbol,
    free: FreeSymbol,
    // Keeps the symbols above valid.
    _library: Library,
}

impl LoadedLibrary {
    /// # Safety
    ///
    /// The library at `path` must export the symbols described in the
    /// module documentation with exactly those signatures.
    unsafe fn open(path: &Path) -> Result<Self, RenderError> {
        let load_error = |message: String| {
            RenderError::new(Stage::Load, message).with_id(path.display().to_string())
        };

        let library = unsafe { Library::new(path) }.map_err(|e| {
            load_error(format!(
                "failed to load server entry {}: {e}",
                path.display()
            ))
        })?;

        let render = *unsafe { library.get::<RenderSymbol>(RENDER_SYMBOL.as_bytes()) }
            .map_err(|e| load_error(format!("missing symbol '{RENDER_SYMBOL}': {e}")))?;
        let free = *unsafe { library.get::<FreeSymbol>(FREE_SYMBOL.as_bytes()) }
            .map_err(|e| load_error(format!("missing symbol '{FREE_SYMBOL}': {e}")))?;

        if let Ok(init) = unsafe { library.get::<InitSymbol>(INIT_SYMBOL.as_bytes()) } {
            unsafe { init() };
        }

        Ok(Self {
            path: path.to_path_buf(),
            render,
            free,
            _library: library,
        })
    }

    fn call(&self, url: &str, context_json: &str) -> Result<RenderOutput, RenderError> {
        let url = CString::new(url).map_err(|e| RenderError::wrap(Stage::Render, e))?;
        let context = CString::new(context_json).map_err(|e| RenderError::wrap(Stage::Render, e))?;

        let raw = unsafe { (self.render)(url.as_ptr(), context.as_ptr()) };
        if raw.is_null() {
            return Err(RenderError::new(
                Stage::Render,
                format!("'{RENDER_SYMBOL}' returned a null pointer"),
            )
            .with_id(self.path.display().to_string()));
        }
        let reply = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { (self.free)(raw) };

        parse_reply(&reply)
    }
}

const UNSPECIFIED_ERROR: &str = "server entry reported an error";

fn parse_reply(reply: &str) -> Result<RenderOutput, RenderError> {
    let malformed = |detail: String| {
        RenderError::new(
            Stage::Render,
            format!("server entry returned malformed JSON: {detail}"),
        )
        .with_plugin_code(reply)
    };

    let mut fields = match serde_json::from_str::<Value>(reply) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(malformed("expected an object".to_string())),
        Err(e) => return Err(malformed(e.to_string())),
    };

    if let Some(error) = fields.remove("error") {
        return Err(failure(error, reply));
    }
    if !fields.contains_key("appHtml") && !fields.contains_key("redirect") {
        return Err(malformed("neither 'appHtml' nor 'redirect' present".to_string()));
    }
    serde_json::from_value(Value::Object(fields)).map_err(|e| malformed(e.to_string()))
}

/// The error reported by an `{"error": ..}` reply.
fn failure(error: Value, reply: &str) -> RenderError {
    match error {
        Value::String(message) if !message.is_empty() => RenderError::new(Stage::Render, message),
        Value::Object(mut fields) => {
            let has_message = fields
                .get("message")
                .and_then(Value::as_str)
                .is_some_and(|message| !message.is_empty());
            if !has_message {
                fields.insert("message".into(), Value::from(UNSPECIFIED_ERROR));
            }
            match serde_json::from_value::<ErrorPayload>(Value::Object(fields)) {
                Ok(payload) => payload.into(),
                Err(_) => RenderError::new(Stage::Render, UNSPECIFIED_ERROR).with_plugin_code(reply),
            }
        }
        _ => RenderError::new(Stage::Render, UNSPECIFIED_ERROR).with_plugin_code(reply),
    }
}

/// A server entry backed by a loaded dynamic library.
pub struct DylibEntry {
    library: Arc<LoadedLibrary>,
}

impl ServerEntry for DylibEntry {
    fn render(
        &self,
        url: &str,
        context: RenderContext,
    ) -> BoxFuture<'static, Result<RenderOutput, RenderError>> {
        let library = Arc::clone(&self.library);
        let url = url.to_string();
        async move {
            let context_json =
                serde_json::to_string(&context).map_err(|e| RenderError::wrap(Stage::Render, e))?;
            tokio::task::spawn_blocking(move || library.call(&url, &context_json))
                .await
                .map_err(|e| RenderError::new(Stage::Render, format!("render task failed: {e}")))?
        }
        .boxed()
    }
}

type Images = HashMap<PathBuf, (String, Arc<LoadedLibrary>)>;

/// Loads server entries from native libraries under a root directory.
#[derive(Clone)]
pub struct DylibLoader {
    root: PathBuf,
    fresh: bool,
    /// Last image opened per library path, with the fingerprint it had.
    images: Arc<Mutex<Images>>,
}

impl DylibLoader {
    /// Loader that reopens a private copy whenever the library changes
    /// (development).
    pub fn fresh(root: impl Into<PathBuf>) -> Self {
        Self::with_mode(root.into(), true)
    }

    /// Loader that opens the library in place (production).
    pub fn in_place(root: impl Into<PathBuf>) -> Self {
        Self::with_mode(root.into(), false)
    }

    fn with_mode(root: PathBuf, fresh: bool) -> Self {
        Self {
            root,
            fresh,
            images: Arc::default(),
        }
    }

    /// Map a specifier like `/src/entry-server` to a library path.
    ///
    /// The platform library extension is appended unless the specifier
    /// already names an existing file.
    pub fn resolve(&self, specifier: &str) -> PathBuf {
        let mut path = self.root.join(specifier.trim_start_matches('/'));
        if !path.is_file() {
            let mut name = path.file_name().unwrap_or_default().to_os_string();
            name.push(".");
            name.push(std::env::consts::DLL_EXTENSION);
            path.set_file_name(name);
        }
        path
    }
}

/// Modification time and length of the library file.
fn stamp(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    let nanos = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    Some(format!("{nanos}-{}", meta.len()))
}

fn stage_copy(path: &Path) -> std::io::Result<PathBuf> {
    let dir = std::env::temp_dir().join("ssr-handle");
    std::fs::create_dir_all(&dir)?;
    let mut staged = dir.join(format!("entry-{}", Uuid::new_v4()));
    staged.set_extension(std::env::consts::DLL_EXTENSION);
    std::fs::copy(path, &staged)?;
    Ok(staged)
}

fn open_library(path: PathBuf, fresh: bool) -> Result<LoadedLibrary, RenderError> {
    if !fresh {
        // SAFETY: server entries are built against the ABI above.
        return unsafe { LoadedLibrary::open(&path) };
    }

    let staged = stage_copy(&path).map_err(|e| {
        RenderError::new(
            Stage::Load,
            format!("failed to stage server entry {}: {e}", path.display()),
        )
        .with_id(path.display().to_string())
    })?;
    // SAFETY: as above; the staged file is a byte copy of `path`.
    let loaded = unsafe { LoadedLibrary::open(&staged) };
    // The mapping outlives the file on unix; elsewhere the copy stays behind.
    let _ = std::fs::remove_file(&staged);

    let mut loaded = loaded?;
    loaded.path = path;
    Ok(loaded)
}

impl DylibLoader {
    fn cached(&self, path: &Path, current: &str) -> Option<Arc<LoadedLibrary>> {
        let images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
        images
            .get(path)
            .filter(|(seen, _)| seen == current)
            .map(|(_, library)| Arc::clone(library))
    }
}

impl ModuleLoader for DylibLoader {
    fn load<'a>(
        &'a self,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ServerEntry>, RenderError>> {
        let path = self.resolve(specifier);
        let fresh = self.fresh;
        async move {
            let current = if fresh { stamp(&path) } else { None };
            if let Some(current) = &current {
                if let Some(library) = self.cached(&path, current) {
                    return Ok(Arc::new(DylibEntry { library }) as Arc<dyn ServerEntry>);
                }
            }

            let key = path.clone();
            let library = tokio::task::spawn_blocking(move || open_library(path, fresh))
                .await
                .map_err(|e| RenderError::new(Stage::Load, format!("load task failed: {e}")))??;
            let library = Arc::new(library);
            tracing::debug!(path = %library.path.display(), fresh, "Server entry loaded");

            if let Some(current) = current {
                self.images
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, (current, Arc::clone(&library)));
            }
            Ok(Arc::new(DylibEntry { library }) as Arc<dyn ServerEntry>)
        }
        .boxed()
    }

    fn fingerprint(&self, specifier: &str) -> Option<String> {
        stamp(&self.resolve(specifier))
    }
}

//! Server entry used by the native loader tests.
//!
//! Routes on the URL it is given:
//! - `/fail`: structured error reply
//! - `/bare-error`: error reply without a payload object
//! - `/null`: null pointer
//! - `/login`: redirect to `/signin`
//! - anything else: markup echoing the URL, with the image's init and
//!   render counters and the received context as state

use std::ffi::{c_char, CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};

static INITS: AtomicUsize = AtomicUsize::new(0);
static RENDERS: AtomicUsize = AtomicUsize::new(0);

#[no_mangle]
pub extern "C" fn ssr_init() {
    INITS.fetch_add(1, Ordering::SeqCst);
}

/// # Safety
///
/// Both arguments must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn ssr_render(url: *const c_char, context: *const c_char) -> *mut c_char {
    let url = unsafe { CStr::from_ptr(url) }.to_string_lossy();
    let context = unsafe { CStr::from_ptr(context) }.to_string_lossy();
    let renders = RENDERS.fetch_add(1, Ordering::SeqCst) + 1;

    let reply = match url.as_ref() {
        "/null" => return std::ptr::null_mut(),
        "/fail" => r#"{"error":{"message":"render exploded","id":"src/app.rs","loc":{"file":"src/app.rs","line":2}}}"#.to_string(),
        "/bare-error" => r#"{"error":"boom"}"#.to_string(),
        "/login" => r#"{"redirect":"/signin"}"#.to_string(),
        _ => format!(
            r#"{{"appHtml":"<p>{url}</p>","propsData":{{"inits":{},"renders":{renders},"context":{context}}}}}"#,
            INITS.load(Ordering::SeqCst)
        ),
    };
    CString::new(reply)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

/// # Safety
///
/// `ptr` must come from `ssr_render` and be freed only once.
#[no_mangle]
pub unsafe extern "C" fn ssr_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

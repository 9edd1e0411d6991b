//! FFI bindings for Blink Morse
//!
//! This module provides C-compatible functions for driving the pipeline from
//! a host application's frame loop. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `bm_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::PipelineConfig;
use crate::pipeline::{decode_ndjson, BlinkMorsePipeline, StepOutcome};
use crate::storage::{JsonFileStore, MemoryStore, ThresholdStore};
use crate::types::Thresholds;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Parse optional thresholds JSON; NULL means defaults
unsafe fn thresholds_arg(json: *const c_char) -> Result<Thresholds, String> {
    if json.is_null() {
        return Ok(Thresholds::default());
    }
    let s = cstr_to_string(json).ok_or_else(|| "Invalid thresholds string pointer".to_string())?;
    Thresholds::from_json(&s).map_err(|e| e.to_string())
}

// ============================================================================
// Stateless API
// ============================================================================

/// Decode an NDJSON trace and return the transcript report JSON.
///
/// # Safety
/// - `ndjson` must be a valid null-terminated C string.
/// - `thresholds_json` must be a valid null-terminated C string or NULL (defaults).
/// - Returns a newly allocated string that must be freed with `bm_free_string`.
/// - Returns NULL on error; call `bm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bm_decode_trace(
    ndjson: *const c_char,
    thresholds_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let trace = match cstr_to_string(ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid trace string pointer");
            return ptr::null_mut();
        }
    };

    let thresholds = match thresholds_arg(thresholds_json) {
        Ok(t) => t,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    match decode_ndjson(&trace, thresholds) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Pipeline API
// ============================================================================

/// Opaque handle to a BlinkMorsePipeline
pub struct PipelineHandle {
    pipeline: BlinkMorsePipeline,
}

/// Create a pipeline.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL (defaults).
/// - `thresholds_path` must be a valid null-terminated C string or NULL. When
///   given, thresholds are loaded from and saved to that JSON file; otherwise
///   defaults are used and nothing is persisted.
/// - Returns a pointer that must be freed with `bm_pipeline_free`.
/// - Returns NULL on error; call `bm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_new(
    config_json: *const c_char,
    thresholds_path: *const c_char,
) -> *mut PipelineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        PipelineConfig::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| "Invalid config string pointer".to_string())
            .and_then(|s| PipelineConfig::from_json(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e);
                return ptr::null_mut();
            }
        }
    };

    let store: Box<dyn ThresholdStore> = match cstr_to_string(thresholds_path) {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    match BlinkMorsePipeline::new(config, store) {
        Ok(pipeline) => Box::into_raw(Box::new(PipelineHandle { pipeline })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a pipeline.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_free(handle: *mut PipelineHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Run one step on a handle, recording a null handle as the last error
unsafe fn step_handle(
    handle: *mut PipelineHandle,
    timestamp: f64,
    ear: f64,
    face_detected: i32,
) -> Option<StepOutcome> {
    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return None;
    }
    let raw_ear = if face_detected != 0 { Some(ear) } else { None };
    Some((*handle).pipeline.step(timestamp, raw_ear))
}

/// Serialize a value, recording a failure as the last error
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Run one frame cycle and report decoder changes.
///
/// Pass `face_detected = 0` when the landmark detector found no face; `ear`
/// is ignored in that case.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns the decoder snapshot as a newly allocated JSON string that must
///   be freed with `bm_free_string`.
/// - Returns NULL when the decoder did not change. Returns NULL on error as
///   well; `bm_last_error` is non-NULL only in that case.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_step(
    handle: *mut PipelineHandle,
    timestamp: f64,
    ear: f64,
    face_detected: i32,
) -> *mut c_char {
    clear_last_error();

    match step_handle(handle, timestamp, ear, face_detected).and_then(|o| o.snapshot) {
        Some(snapshot) => json_to_cstr(&snapshot),
        None => ptr::null_mut(),
    }
}

/// Run one frame cycle and return everything it produced.
///
/// Same inputs as `bm_pipeline_step`. Use this when the host also needs the
/// per-frame metrics, e.g. to display the smoothed EAR.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns the step outcome as a newly allocated JSON string that must be
///   freed with `bm_free_string`.
/// - Returns NULL on error; call `bm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_step_outcome(
    handle: *mut PipelineHandle,
    timestamp: f64,
    ear: f64,
    face_detected: i32,
) -> *mut c_char {
    clear_last_error();

    match step_handle(handle, timestamp, ear, face_detected) {
        Some(outcome) => json_to_cstr(&outcome),
        None => ptr::null_mut(),
    }
}

/// Get the committed translation.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `bm_free_string`.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_translation(handle: *const PipelineHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }
    string_to_cstr(&(*handle).pipeline.get_translation())
}

/// Get the live preview of the in-progress letter.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `bm_free_string`.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_preview(handle: *const PipelineHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }
    string_to_cstr(&(*handle).pipeline.get_buffer_preview())
}

/// Get the current thresholds as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `bm_free_string`.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_thresholds(handle: *const PipelineHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }
    json_to_cstr(&(*handle).pipeline.thresholds())
}

/// Clear the decoded text.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_reset(handle: *mut PipelineHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }
    (*handle).pipeline.reset();
    0
}

/// Start collecting a fresh calibration set.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `bm_pipeline_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn bm_pipeline_start_calibration(handle: *mut PipelineHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }
    (*handle).pipeline.start_calibration();
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Blink Morse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Blink Morse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bm_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Blink Morse call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn bm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn bm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        bm_free_string(ptr);
        s
    }

    #[test]
    fn test_pipeline_lifecycle() {
        unsafe {
            let handle = bm_pipeline_new(ptr::null(), ptr::null());
            assert!(!handle.is_null());

            // one 0.8s closure, then silence long enough to commit a letter
            let mut t = 0.0;
            let mut step = |ear: f64, seconds: f64| {
                let frames = (seconds / 0.01).round() as usize;
                for _ in 0..frames {
                    bm_free_string(bm_pipeline_step(handle, t, ear, 1));
                    t += 0.01;
                }
            };
            step(0.3, 0.5);
            step(0.05, 0.8);
            step(0.3, 3.0);

            assert_eq!(take_string(bm_pipeline_translation(handle)), "T");
            assert_eq!(take_string(bm_pipeline_preview(handle)), "");

            assert_eq!(bm_pipeline_reset(handle), 0);
            assert_eq!(take_string(bm_pipeline_translation(handle)), "");

            bm_pipeline_free(handle);
        }
    }

    #[test]
    fn test_step_returns_snapshot_or_null() {
        unsafe {
            let handle = bm_pipeline_new(ptr::null(), ptr::null());

            // open, then closed: no decoder change yet
            assert!(bm_pipeline_step(handle, 0.0, 0.3, 1).is_null());
            assert!(bm_last_error().is_null());
            assert!(bm_pipeline_step(handle, 0.1, 0.05, 1).is_null());
            assert!(bm_last_error().is_null());

            // reopening after 0.2s registers a dot
            let json = take_string(bm_pipeline_step(handle, 0.3, 0.3, 1));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["event"], "symbol");
            assert_eq!(value["buffer"], ".");

            assert!(bm_pipeline_step(ptr::null_mut(), 0.4, 0.3, 1).is_null());
            assert!(!bm_last_error().is_null());

            bm_pipeline_free(handle);
        }
    }

    #[test]
    fn test_step_outcome_json() {
        unsafe {
            let handle = bm_pipeline_new(ptr::null(), ptr::null());
            let json = take_string(bm_pipeline_step_outcome(handle, 0.0, 0.0, 0));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["metrics"]["face_detected"], false);
            assert!(value["blink"].is_null());
            bm_pipeline_free(handle);
        }
    }

    #[test]
    fn test_invalid_config_sets_error() {
        unsafe {
            let config = CString::new(r#"{"blink": {"smoothing_factor": 2.0}}"#).unwrap();
            let handle = bm_pipeline_new(config.as_ptr(), ptr::null());
            assert!(handle.is_null());
            assert!(!bm_last_error().is_null());
        }
    }

    #[test]
    fn test_null_handle() {
        unsafe {
            assert!(bm_pipeline_translation(ptr::null()).is_null());
            assert!(!bm_last_error().is_null());
            assert_eq!(bm_pipeline_reset(ptr::null_mut()), -1);
        }
    }

    #[test]
    fn test_thresholds_json() {
        unsafe {
            let handle = bm_pipeline_new(ptr::null(), ptr::null());
            let json = take_string(bm_pipeline_thresholds(handle));
            assert_eq!(Thresholds::from_json(&json).unwrap(), Thresholds::default());
            assert_eq!(bm_pipeline_start_calibration(handle), 0);
            bm_pipeline_free(handle);
        }
    }

    #[test]
    fn test_decode_trace() {
        unsafe {
            let trace = CString::new("{\"timestamp\": 0.0, \"ear\": 0.3}\n").unwrap();
            let report = take_string(bm_decode_trace(trace.as_ptr(), ptr::null()));
            let value: serde_json::Value = serde_json::from_str(&report).unwrap();
            assert_eq!(value["producer"]["name"], "blink-morse");

            let bad = CString::new("not json").unwrap();
            assert!(bm_decode_trace(bad.as_ptr(), ptr::null()).is_null());
            assert!(!bm_last_error().is_null());

            let thresholds = CString::new("{\"short_blink_max\": ").unwrap();
            assert!(bm_decode_trace(trace.as_ptr(), thresholds.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = CStr::from_ptr(bm_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}

use std::ffi::{c_char, c_void, CStr};

use crate::{context::Context, native::GlBackend};

fn source_name(source: u32) -> &'static str {
    match source {
        gl::DEBUG_SOURCE_API => "api",
        gl::DEBUG_SOURCE_WINDOW_SYSTEM => "window-system",
        gl::DEBUG_SOURCE_SHADER_COMPILER => "shader-compiler",
        gl::DEBUG_SOURCE_THIRD_PARTY => "third-party",
        gl::DEBUG_SOURCE_APPLICATION => "application",
        _ => "other",
    }
}

fn type_name(ty: u32) -> &'static str {
    match ty {
        gl::DEBUG_TYPE_ERROR => "error",
        gl::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "deprecated",
        gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "undefined-behavior",
        gl::DEBUG_TYPE_PORTABILITY => "portability",
        gl::DEBUG_TYPE_PERFORMANCE => "performance",
        gl::DEBUG_TYPE_MARKER => "marker",
        gl::DEBUG_TYPE_PUSH_GROUP => "push-group",
        gl::DEBUG_TYPE_POP_GROUP => "pop-group",
        _ => "other",
    }
}

extern "system" fn on_message(
    source: u32,
    ty: u32,
    id: u32,
    severity: u32,
    length: i32,
    message: *const c_char,
    _user: *mut c_void,
) {
    if message.is_null() {
        return;
    }
    let message = unsafe {
        match usize::try_from(length) {
            Ok(len) => String::from_utf8_lossy(std::slice::from_raw_parts(message.cast(), len)),
            Err(_) => CStr::from_ptr(message).to_string_lossy(),
        }
    };
    let (source, ty) = (source_name(source), type_name(ty));
    match severity {
        gl::DEBUG_SEVERITY_HIGH => tracing::error!(target: "gl", source, ty, id, "{message}"),
        gl::DEBUG_SEVERITY_MEDIUM => tracing::warn!(target: "gl", source, ty, id, "{message}"),
        gl::DEBUG_SEVERITY_LOW => tracing::info!(target: "gl", source, ty, id, "{message}"),
        _ => tracing::debug!(target: "gl", source, ty, id, "{message}"),
    }
}

/// Forwards driver debug messages to `tracing` under the `gl` target.
///
/// Returns `false` when the driver does not expose `GL_KHR_debug`.
pub fn install_message_callback(ctx: &Context<GlBackend>) -> bool {
    let gl = ctx.backend().raw();
    if !gl.DebugMessageCallback.is_loaded() {
        tracing::warn!("GL_KHR_debug is unavailable, driver messages will not be logged");
        return false;
    }
    unsafe {
        gl.Enable(gl::DEBUG_OUTPUT);
        gl.Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
        gl.DebugMessageCallback(Some(on_message), std::ptr::null());
    }
    true
}

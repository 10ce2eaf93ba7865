//! FFmpeg access
//!
//! This module handles:
//! - FFmpeg initialization and log filtering
//! - Probing container duration
//!
//! Frame extraction for thumbnails lives in `thumbnail::frame`.

use std::path::Path;

pub use ffmpeg_next as ffmpeg;

use crate::error::FfmpegError;

/// Initialize the FFmpeg library.
///
/// Must be called once at startup, before any file is opened.
pub fn init() -> Result<(), FfmpegError> {
    ffmpeg::init()
        .map_err(|e| FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e)))?;

    tracing::info!("FFmpeg initialized");

    Ok(())
}

/// Limit FFmpeg's own logging to warnings and route it through `tracing`.
///
/// Must be called after `init()` and before any worker starts decoding,
/// because the log callback is global state.
pub fn install_log_filter() {
    // SAFETY: both calls only touch FFmpeg's global log settings and run
    // once at startup before any decoding thread exists.
    unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
        ffmpeg::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Noise that shows up when probing partially written or odd files
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Could not find codec parameters",
    "decoding for stream",
    "Invalid NAL unit size",
    "st: 0 edit list",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    }
}

/// Version of the linked libavformat, e.g. `libavformat 61.7.100`
pub fn version_info() -> String {
    let v = ffmpeg::format::version();
    format!("libavformat {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}

/// Container duration in seconds, `None` when the container does not know.
pub fn probe_duration(path: &Path) -> Result<Option<f64>, FfmpegError> {
    let context = ffmpeg::format::input(&path)
        .map_err(|e| FfmpegError::OpenInput(format!("{}: {}", path.display(), e)))?;

    let duration = context.duration();
    if duration <= 0 {
        // fall back to the best video stream's own duration
        return Ok(context
            .streams()
            .best(ffmpeg::media::Type::Video)
            .filter(|s| s.duration() > 0)
            .map(|s| s.duration() as f64 * f64::from(s.time_base())));
    }
    Ok(Some(duration as f64 / ffmpeg::ffi::AV_TIME_BASE as f64))
}

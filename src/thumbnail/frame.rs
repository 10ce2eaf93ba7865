//! Representative-frame extraction and cover fitting

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use super::ThumbnailError;
use crate::error::FfmpegError;
use crate::ffmpeg::ffmpeg;

/// Source of the frame a thumbnail is cut from. Implementations block.
pub trait FrameGrabber: Send + Sync {
    fn grab(&self, path: &Path) -> Result<RgbImage, ThumbnailError>;
}

/// Decodes the frame one third of the way into the best video stream
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegFrameGrabber;

struct StreamFacts {
    index: usize,
    time_base: ffmpeg::Rational,
    start_pts: i64,
    fps: f64,
    frame_count: i64,
    parameters: ffmpeg::codec::Parameters,
}

impl FfmpegFrameGrabber {
    fn stream_facts(input: &ffmpeg::format::context::Input, path: &Path) -> Result<StreamFacts, FfmpegError> {
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| FfmpegError::NoVideoStream(path.display().to_string()))?;

        let time_base = stream.time_base();
        let rate = stream.avg_frame_rate();
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            f64::from(rate)
        } else {
            0.0
        };

        let duration_secs = if stream.duration() > 0 {
            stream.duration() as f64 * f64::from(time_base)
        } else if input.duration() > 0 {
            input.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        // container count first, else estimate from duration and frame rate
        let frame_count = if stream.frames() > 0 {
            stream.frames()
        } else {
            (duration_secs * fps) as i64
        };

        let start_pts = if stream.start_time() == ffmpeg::ffi::AV_NOPTS_VALUE {
            0
        } else {
            stream.start_time()
        };

        Ok(StreamFacts {
            index: stream.index(),
            time_base,
            start_pts,
            fps,
            frame_count,
            parameters: stream.parameters(),
        })
    }
}

impl FrameGrabber for FfmpegFrameGrabber {
    fn grab(&self, path: &Path) -> Result<RgbImage, ThumbnailError> {
        let mut input = ffmpeg::format::input(&path)
            .map_err(|e| FfmpegError::OpenInput(format!("{}: {}", path.display(), e)))?;

        let facts = Self::stream_facts(&input, path)?;
        if facts.frame_count <= 0 {
            return Err(FfmpegError::NoFrames(path.display().to_string()).into());
        }
        let target = facts.frame_count / 3;

        let context = ffmpeg::codec::Context::from_parameters(facts.parameters.clone())
            .map_err(|e| FfmpegError::DecoderCreate(e.to_string()))?;
        let mut decoder = context
            .decoder()
            .video()
            .map_err(|e| FfmpegError::DecoderCreate(e.to_string()))?;

        // seek straight to the target; sequential decoding is the fallback
        let target_secs = if facts.fps > 0.0 {
            target as f64 / facts.fps
        } else {
            0.0
        };
        let target_pts = facts.start_pts + (target_secs / f64::from(facts.time_base)) as i64;
        let seek_ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        let seeked = target > 0 && facts.fps > 0.0 && input.seek(seek_ts, ..seek_ts).is_ok();
        if !seeked && target > 0 {
            tracing::debug!(path = %path.display(), target, "seek failed, decoding sequentially");
        }

        let mut decoded: i64 = 0;
        let mut last: Option<ffmpeg::frame::Video> = None;
        let mut chosen: Option<ffmpeg::frame::Video> = None;
        let mut frame = ffmpeg::frame::Video::empty();

        let reached = |frame: &ffmpeg::frame::Video, decoded: i64| {
            if seeked {
                frame
                    .timestamp()
                    .or_else(|| frame.pts())
                    .map(|pts| pts >= target_pts)
                    .unwrap_or(true)
            } else {
                decoded >= target
            }
        };

        'packets: for (stream, packet) in input.packets() {
            if stream.index() != facts.index {
                continue;
            }
            if let Err(e) = decoder.send_packet(&packet) {
                tracing::trace!(error = %e, "skipping undecodable packet");
                continue;
            }
            while decoder.receive_frame(&mut frame).is_ok() {
                if reached(&frame, decoded) {
                    chosen = Some(frame.clone());
                    break 'packets;
                }
                decoded += 1;
                last = Some(frame.clone());
            }
        }

        if chosen.is_none() {
            let _ = decoder.send_eof();
            while decoder.receive_frame(&mut frame).is_ok() {
                if reached(&frame, decoded) {
                    chosen = Some(frame.clone());
                    break;
                }
                decoded += 1;
                last = Some(frame.clone());
            }
        }

        // a short or mis-estimated file still gets its last frame
        let frame = chosen
            .or(last)
            .ok_or_else(|| FfmpegError::NoFrames(path.display().to_string()))?;
        Ok(to_rgb_image(&frame)?)
    }
}

fn to_rgb_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage, FfmpegError> {
    let (width, height) = (frame.width(), frame.height());
    let mut scaler = ffmpeg::software::scaling::Context::get(
        frame.format(),
        width,
        height,
        ffmpeg::format::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| FfmpegError::ScalerCreate(e.to_string()))?;

    let mut rgb = ffmpeg::frame::Video::empty();
    scaler
        .run(frame, &mut rgb)
        .map_err(|e| FfmpegError::ReadFrame(e.to_string()))?;

    // rows are padded to the stride; copy out the visible part only
    let stride = rgb.stride(0);
    let row_bytes = width as usize * 3;
    let data = rgb.data(0);
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| FfmpegError::ReadFrame("frame buffer size mismatch".to_string()))
}

/// Scale `frame` so it covers a `width`x`height` box, crop the overflow
/// around the centre and pad any rounding gap with black.
pub fn fit_cover(frame: &RgbImage, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    if frame.width() == 0 || frame.height() == 0 {
        return canvas;
    }

    let scale = f64::max(
        width as f64 / frame.width() as f64,
        height as f64 / frame.height() as f64,
    );
    let scaled_w = ((frame.width() as f64 * scale).round() as u32).max(1);
    let scaled_h = ((frame.height() as f64 * scale).round() as u32).max(1);
    let scaled = imageops::resize(frame, scaled_w, scaled_h, FilterType::Triangle);

    let crop_w = scaled_w.min(width);
    let crop_h = scaled_h.min(height);
    let cropped = imageops::crop_imm(
        &scaled,
        (scaled_w - crop_w) / 2,
        (scaled_h - crop_h) / 2,
        crop_w,
        crop_h,
    )
    .to_image();

    imageops::replace(
        &mut canvas,
        &cropped,
        ((width - crop_w) / 2) as i64,
        ((height - crop_h) / 2) as i64,
    );
    canvas
}

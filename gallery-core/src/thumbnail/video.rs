//! Video thumbnailing: the "golden frame" heuristic. Captures frames at
//! five points along the video and keeps the one with the highest
//! per-channel pixel variance, on the theory that a near-black or
//! near-white frame (a fade, a title card) is a worse thumbnail than a
//! frame with real visual content.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageBuffer, Rgb};
use tracing::warn;

use crate::error::{GalleryError, Result};

const SAMPLE_FRACTIONS: [f64; 5] = [0.10, 0.30, 0.50, 0.70, 0.90];
const THUMB_WIDTH: u32 = 320;
const JPEG_QUALITY: u8 = 80;

struct Candidate {
    frame: ImageBuffer<Rgb<u8>, Vec<u8>>,
    variance: f64,
}

/// Generates a JPEG thumbnail for the video at `source`, writing it to
/// `dest`. Temp frames are extracted under `scratch_dir` and removed
/// afterward regardless of outcome.
pub fn generate(source: &Path, dest: &Path, scratch_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(scratch_dir)?;
    let duration_secs = probe_duration_secs(source)?;

    let mut best: Option<Candidate> = None;
    let mut any_valid = false;

    for frac in SAMPLE_FRACTIONS {
        let at = duration_secs * frac;
        let frame_path = scratch_dir.join(format!("frame_{:03}.png", (frac * 100.0) as u32));
        match extract_frame(source, at, &frame_path) {
            Ok(()) => {
                any_valid = true;
                if let Ok(img) = image::open(&frame_path) {
                    let rgb = img.to_rgb8();
                    let variance = channel_variance(&rgb);
                    let is_better = best.as_ref().map(|b| variance > b.variance).unwrap_or(true);
                    if is_better {
                        best = Some(Candidate { frame: rgb, variance });
                    }
                }
            }
            Err(e) => warn!(?source, at, error = %e, "frame extraction failed at sample point"),
        }
        let _ = std::fs::remove_file(&frame_path);
    }

    if !any_valid {
        return Err(GalleryError::Internal(format!("no frame could be extracted from {}", source.display())));
    }

    let Some(candidate) = best else {
        return Err(GalleryError::Internal(format!("no valid frame found for {}", source.display())));
    };

    let (w, h) = candidate.frame.dimensions();
    let thumb_height = if w == 0 { h } else { (h as u64 * THUMB_WIDTH as u64 / w as u64) as u32 };
    let resized = image::DynamicImage::ImageRgb8(candidate.frame).resize(THUMB_WIDTH, thumb_height.max(1), FilterType::Lanczos3);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(dest)?;
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    resized
        .write_with_encoder(encoder)
        .map_err(|e| GalleryError::Internal(format!("jpeg encode failed: {e}")))?;
    Ok(())
}

fn channel_variance(img: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> f64 {
    let n = img.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let sum: f64 = img.as_raw().iter().map(|&b| b as f64).sum();
    let mean = sum / n;
    let variance = img.as_raw().iter().map(|&b| (b as f64 - mean).powi(2)).sum::<f64>() / n;
    variance
}

fn probe_duration_secs(source: &Path) -> Result<f64> {
    let ictx = ffmpeg_next::format::input(source)
        .map_err(|e| GalleryError::Internal(format!("failed to open video: {e}")))?;
    let duration = ictx.duration();
    if duration <= 0 {
        return Ok(1.0);
    }
    Ok(duration as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE))
}

fn extract_frame(source: &Path, at_secs: f64, frame_path: &PathBuf) -> Result<()> {
    let mut ictx = ffmpeg_next::format::input(source)
        .map_err(|e| GalleryError::Internal(format!("failed to open video: {e}")))?;
    let stream_index = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| GalleryError::Internal("no video stream".to_string()))?
        .index();

    let timestamp = (at_secs * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
    ictx.seek(timestamp, ..timestamp)
        .map_err(|e| GalleryError::Internal(format!("seek failed: {e}")))?;

    let stream = ictx.stream(stream_index).ok_or_else(|| GalleryError::Internal("stream vanished".to_string()))?;
    let context = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| GalleryError::Internal(format!("decoder setup failed: {e}")))?;
    let mut decoder = context.decoder().video().map_err(|e| GalleryError::Internal(format!("decoder open failed: {e}")))?;

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| GalleryError::Internal(format!("scaler setup failed: {e}")))?;

    for (packet_stream, packet) in ictx.packets() {
        if packet_stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet).map_err(|e| GalleryError::Internal(format!("decode send failed: {e}")))?;
        let mut decoded = ffmpeg_next::frame::Video::empty();
        if decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb_frame = ffmpeg_next::frame::Video::empty();
            scaler.run(&decoded, &mut rgb_frame).map_err(|e| GalleryError::Internal(format!("scale failed: {e}")))?;

            let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(rgb_frame.width(), rgb_frame.height(), rgb_frame.data(0).to_vec())
                    .ok_or_else(|| GalleryError::Internal("frame buffer conversion failed".to_string()))?;
            buffer
                .save(frame_path)
                .map_err(|e| GalleryError::Internal(format!("frame save failed: {e}")))?;
            return Ok(());
        }
    }
    Err(GalleryError::Internal("no decodable frame found near requested timestamp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_is_zero_for_uniform_image() {
        let img = ImageBuffer::from_pixel(10, 10, Rgb([128, 128, 128]));
        assert_eq!(channel_variance(&img), 0.0);
    }

    #[test]
    fn variance_is_positive_for_noisy_image() {
        let mut img = ImageBuffer::from_pixel(2, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        assert!(channel_variance(&img) > 0.0);
    }
}

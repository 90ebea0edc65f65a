//! Headless capture: PNG screenshots.

#![allow(clippy::cast_possible_truncation)]

use std::fs;
use std::io;
use std::path::Path;

use mos_vic_ii::PALETTE;
use raster_cache::FullFrameSink;
use thiserror::Error;

use crate::C64;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no frame has been presented yet")]
    NoFrame,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}

/// Save the sink's current screen as a PNG file.
///
/// # Errors
///
/// I/O and encoder errors, or an empty sink that has not seen a frame.
pub fn save_screenshot(sink: &FullFrameSink, path: &Path) -> Result<(), CaptureError> {
    if sink.frames() == 0 {
        return Err(CaptureError::NoFrame);
    }
    let file = fs::File::create(path)?;
    let w = io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, sink.width() as u32, sink.height() as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(sink.rgba())?;
    log::debug!(
        "capture: {}x{} screenshot to {}",
        sink.width(),
        sink.height(),
        path.display()
    );
    Ok(())
}

/// Run `num_frames` frames, saving each as a numbered PNG in `dir`.
///
/// # Errors
///
/// Directory creation and PNG errors.
pub fn record(c64: &mut C64, dir: &Path, num_frames: u32) -> Result<(), CaptureError> {
    fs::create_dir_all(dir)?;
    let mut sink = FullFrameSink::new(PALETTE);
    for i in 1..=num_frames {
        c64.run_frame(&mut sink);
        save_screenshot(&sink, &dir.join(format!("{i:06}.png")))?;
    }
    eprintln!("Captured {num_frames} frames to {}", dir.display());
    Ok(())
}

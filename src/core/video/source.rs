//! 帧来源 - 外部采集程序

use std::process::{Command, Stdio};

use chrono::Local;
use log::debug;

use super::frame::Frame;
use crate::core::config::CaptureConfig;
use crate::core::error::{ArchiveError, ArchiveResult};

pub trait FrameSource {
    /// Grab the next frame at the working resolution.
    fn capture(&mut self) -> ArchiveResult<Frame>;
}

/// Runs an external grabber (ffmpeg, fswebcam, ...) that writes one encoded
/// image to stdout, decodes it and scales it to the working resolution.
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
    width: u32,
    height: u32,
    frame_counter: u64,
}

impl CommandFrameSource {
    pub fn new(command: &[String], width: u32, height: u32) -> ArchiveResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ArchiveError::Capture("empty capture command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            width,
            height,
            frame_counter: 0,
        })
    }

    pub fn from_config(config: &CaptureConfig) -> ArchiveResult<Self> {
        Self::new(&config.command, config.width, config.height)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Decode an encoded image and bring it to `width`x`height`.
    pub fn decode(
        bytes: &[u8],
        width: u32,
        height: u32,
        frame_number: u64,
    ) -> ArchiveResult<Frame> {
        let captured_at = Local::now();
        let image = image::load_from_memory(bytes)?.to_rgb8();
        Frame::from_image(image, captured_at, frame_number).resize_to(width, height)
    }
}

impl FrameSource for CommandFrameSource {
    fn capture(&mut self) -> ArchiveResult<Frame> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ArchiveError::Capture(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::Capture(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(ArchiveError::Capture(format!(
                "{} produced no image data",
                self.program
            )));
        }

        let frame = Self::decode(&output.stdout, self.width, self.height, self.frame_counter)?;
        debug!(
            "📷 Captured frame #{} ({} bytes encoded)",
            frame.frame_number,
            output.stdout.len()
        );
        self.frame_counter += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_resizes_to_working_resolution() {
        let bytes = encoded_png(96, 72);
        let frame = CommandFrameSource::decode(&bytes, 64, 48, 7).unwrap();

        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.data.len(), 64 * 48 * 3);
        assert_eq!(frame.frame_number, 7);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = CommandFrameSource::decode(b"not an image", 64, 48, 0);
        assert!(matches!(result, Err(ArchiveError::Image(_))));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandFrameSource::new(&[], 640, 480),
            Err(ArchiveError::Capture(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_grabber_reports_capture_error() {
        let mut source = CommandFrameSource::new(&["false".to_string()], 640, 480).unwrap();
        assert!(matches!(source.capture(), Err(ArchiveError::Capture(_))));
        assert_eq!(source.frame_count(), 0);
    }
}

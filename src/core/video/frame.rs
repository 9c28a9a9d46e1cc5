use chrono::{DateTime, Local};
use image::RgbImage;

use crate::core::error::{ArchiveError, ArchiveResult};

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGB 格式
    pub captured_at: DateTime<Local>,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at: DateTime<Local>,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            captured_at,
            frame_number,
        }
    }

    pub fn from_image(image: RgbImage, captured_at: DateTime<Local>, frame_number: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw(), captured_at, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn to_image(&self) -> ArchiveResult<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            ArchiveError::InvalidFrame {
                width: self.width,
                height: self.height,
            },
        )
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> ArchiveResult<Frame> {
        if (self.width, self.height) == (target_width, target_height) {
            return Ok(self.clone());
        }
        let resized = image::imageops::resize(
            &self.to_image()?,
            target_width,
            target_height,
            image::imageops::FilterType::Lanczos3,
        );

        Ok(Frame::from_image(resized, self.captured_at, self.frame_number))
    }
}

//! # 尺寸计算模块
//!
//! ## 设计思路
//!
//! 尺寸解析只需要图片头部的自然宽高，不做完整解码，降低大图的内存开销。
//! 显示尺寸受宽度上限约束：超宽图等比缩小到上限宽度，高度随缩放比例浮点缩放。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 应用宽度上限规则得到显示尺寸

use image::ImageReader;
use std::io::Cursor;

use super::source::ImageDimensions;
use super::{ImageError, ImageResolver};

impl ImageResolver {
    /// 仅通过内存中的图片头信息读取自然宽高。
    pub(super) fn probe_natural_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
        let cursor = Cursor::new(bytes);
        let reader = ImageReader::new(cursor)
            .with_guessed_format()
            .map_err(|e| ImageError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| ImageError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))?;

        if width == 0 || height == 0 {
            return Err(ImageError::Decode("图片自然尺寸为零".to_string()));
        }

        Ok((width, height))
    }

    /// 应用宽度上限规则，得到显示尺寸。
    ///
    /// 自然宽度超过上限时：宽度取上限，高度按 `上限 / 自然宽度` 等比缩放（不取整）；
    /// 未超过时原样返回自然尺寸。
    pub(super) fn fit_display_dimensions(
        natural_width: u32,
        natural_height: u32,
        max_display_width: u32,
    ) -> ImageDimensions {
        let width = natural_width as f64;
        let height = natural_height as f64;

        if natural_width > max_display_width {
            let scale = max_display_width as f64 / width;
            ImageDimensions {
                width: max_display_width as f64,
                height: height * scale,
            }
        } else {
            ImageDimensions { width, height }
        }
    }
}

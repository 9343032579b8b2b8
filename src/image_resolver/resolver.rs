//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageResolver` 承载两项解析能力，供文档渲染器在处理图片标签时逐个调用：
//! - `resolve_content`：引用 → 图片二进制
//! - `resolve_size`：引用 → 受宽度上限约束的显示尺寸
//!
//! 两者共用同一回退策略：主图失败后改用备用图**恰好一次**，不做通用重试循环；
//! 备用图也失败时整体失败，错误中携带备用图加载详情。
//!
//! ## 实现思路
//!
//! - 单次调用内使用独立的字节缓冲与测量过程，调用间无共享可变状态。
//! - 尺寸回退不复用主图的测量状态：备用图单独加载、单独测量。

use super::source::{ImageDimensions, RawImageData};
use super::{ImageError, ResolverConfig};

/// 渲染器调用图片解析的接口。
///
/// 文档渲染器对每个图片标签分别调用两个方法；实现方保证每次调用独立完成，
/// 并发调用之间不要求完成顺序。
#[allow(async_fn_in_trait)]
pub trait TagResolver {
    /// 解析图片二进制内容。
    async fn resolve_content(&self, reference: &str) -> Result<Vec<u8>, ImageError>;

    /// 解析图片显示尺寸。
    async fn resolve_size(&self, reference: &str) -> Result<ImageDimensions, ImageError>;
}

/// 图片解析器。
///
/// 封装加载配置，编排“主图 → 备用图”的解析流程。
pub struct ImageResolver {
    config: ResolverConfig,
}

impl ImageResolver {
    /// 根据配置创建解析器。
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// 当前生效的配置。
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// 解析图片二进制内容，主图失败时改用备用图。
    pub async fn resolve_content(&self, reference: &str) -> Result<Vec<u8>, ImageError> {
        match self.load_reference(reference, &self.config).await {
            Ok(raw) => {
                log::debug!(
                    "✅ 图片内容解析成功 - 来源: {} 体积: {} bytes",
                    raw.source_hint,
                    raw.bytes.len()
                );
                Ok(raw.bytes)
            }
            Err(primary_err) => {
                log::warn!(
                    "⚠️ 图片加载失败，改用备用图片 - 引用: {} 错误: {}",
                    reference,
                    primary_err
                );
                self.load_fallback().await.map(|raw| raw.bytes)
            }
        }
    }

    /// 解析显示尺寸，主图失败时对备用图执行同样的计算。
    pub async fn resolve_size(&self, reference: &str) -> Result<ImageDimensions, ImageError> {
        match self.measure_reference(reference).await {
            Ok(dims) => Ok(dims),
            Err(primary_err) => {
                log::warn!(
                    "⚠️ 图片尺寸获取失败，改用备用图片 - 引用: {} 错误: {}",
                    reference,
                    primary_err
                );

                let raw = self.load_fallback().await?;
                let (width, height) = Self::probe_natural_dimensions(&raw.bytes)
                    .map_err(|e| ImageError::FallbackUnavailable(e.to_string()))?;

                Ok(Self::fit_display_dimensions(
                    width,
                    height,
                    self.config.max_display_width,
                ))
            }
        }
    }

    /// 主图测量：加载 + 读取头部尺寸 + 应用宽度上限。
    async fn measure_reference(&self, reference: &str) -> Result<ImageDimensions, ImageError> {
        let raw = self.load_reference(reference, &self.config).await?;
        let (width, height) = Self::probe_natural_dimensions(&raw.bytes)?;
        let dims = Self::fit_display_dimensions(width, height, self.config.max_display_width);

        log::debug!(
            "📐 尺寸解析完成 - 自然: {}x{} 显示: {}x{}",
            width,
            height,
            dims.width,
            dims.height
        );

        Ok(dims)
    }

    /// 加载备用图片；失败时上转为“备用图不可用”，携带底层错误详情。
    async fn load_fallback(&self) -> Result<RawImageData, ImageError> {
        self.load_reference(&self.config.fallback_image, &self.config)
            .await
            .map_err(|e| {
                log::error!(
                    "❌ 备用图片加载失败 - 引用: {} 错误: {}",
                    self.config.fallback_image,
                    e
                );
                ImageError::FallbackUnavailable(e.to_string())
            })
    }
}

impl TagResolver for ImageResolver {
    async fn resolve_content(&self, reference: &str) -> Result<Vec<u8>, ImageError> {
        ImageResolver::resolve_content(self, reference).await
    }

    async fn resolve_size(&self, reference: &str) -> Result<ImageDimensions, ImageError> {
        ImageResolver::resolve_size(self, reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 255])
        });

        let dyn_img = DynamicImage::ImageRgba8(img);
        let mut cursor = Cursor::new(Vec::new());
        dyn_img
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn write_temp_png(name: &str, width: u32, height: u32) -> (PathBuf, Vec<u8>) {
        let path = std::env::temp_dir().join(format!(
            "docx-exporter-resolver-{}-{}",
            std::process::id(),
            name
        ));
        let bytes = create_png_bytes(width, height);
        std::fs::write(&path, &bytes).expect("write temp png failed");
        (path, bytes)
    }

    fn resolver_with_fallback(fallback: &str) -> ImageResolver {
        let mut config = ResolverConfig::default();
        config.fallback_image = fallback.to_string();
        ImageResolver::new(config)
    }

    #[tokio::test]
    async fn content_prefers_primary_reference() {
        let (primary, primary_bytes) = write_temp_png("content-primary.png", 32, 32);
        let resolver = resolver_with_fallback("/definitely/not/here.png");

        let bytes = resolver
            .resolve_content(&primary.to_string_lossy())
            .await
            .expect("primary content should resolve");

        assert_eq!(bytes, primary_bytes);
    }

    #[tokio::test]
    async fn content_falls_back_when_primary_missing() {
        let (fallback, fallback_bytes) = write_temp_png("content-fallback.png", 16, 16);
        let resolver = resolver_with_fallback(&fallback.to_string_lossy());

        let bytes = resolver
            .resolve_content("/definitely/not/here.png")
            .await
            .expect("fallback content should resolve");

        assert_eq!(bytes, fallback_bytes);
    }

    #[tokio::test]
    async fn content_double_failure_carries_fallback_error_detail() {
        let resolver = resolver_with_fallback("/also/not/here.png");

        let result = resolver.resolve_content("/definitely/not/here.png").await;

        match result {
            Err(ImageError::FallbackUnavailable(detail)) => {
                assert!(detail.contains("/also/not/here.png"));
            }
            other => panic!("expected FallbackUnavailable, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn size_caps_width_at_maximum() {
        let (primary, _) = write_temp_png("size-wide.png", 600, 400);
        let resolver = resolver_with_fallback("/definitely/not/here.png");

        let dims = resolver
            .resolve_size(&primary.to_string_lossy())
            .await
            .expect("size should resolve");

        assert_eq!(dims.width, 300.0);
        assert_eq!(dims.height, 200.0);
    }

    #[tokio::test]
    async fn size_keeps_small_image_dimensions() {
        let (primary, _) = write_temp_png("size-small.png", 120, 80);
        let resolver = resolver_with_fallback("/definitely/not/here.png");

        let dims = resolver
            .resolve_size(&primary.to_string_lossy())
            .await
            .expect("size should resolve");

        assert_eq!(dims.width, 120.0);
        assert_eq!(dims.height, 80.0);
    }

    #[tokio::test]
    async fn size_uses_fallback_dimensions_when_primary_missing() {
        let (fallback, _) = write_temp_png("size-fallback.png", 100, 150);
        let resolver = resolver_with_fallback(&fallback.to_string_lossy());

        let dims = resolver
            .resolve_size("/definitely/not/here.png")
            .await
            .expect("fallback size should resolve");

        assert_eq!(dims.width, 100.0);
        assert_eq!(dims.height, 150.0);
    }

    #[tokio::test]
    async fn size_applies_width_cap_to_fallback_image_too() {
        let (fallback, _) = write_temp_png("size-fallback-wide.png", 900, 300);
        let resolver = resolver_with_fallback(&fallback.to_string_lossy());

        let dims = resolver
            .resolve_size("/definitely/not/here.png")
            .await
            .expect("fallback size should resolve");

        assert_eq!(dims.width, 300.0);
        assert_eq!(dims.height, 100.0);
    }

    #[tokio::test]
    async fn size_double_failure_rejects() {
        let resolver = resolver_with_fallback("/also/not/here.png");

        let result = resolver.resolve_size("/definitely/not/here.png").await;

        assert!(matches!(result, Err(ImageError::FallbackUnavailable(_))));
    }

    #[tokio::test]
    async fn undecodable_primary_bytes_trigger_fallback() {
        let not_an_image = std::env::temp_dir().join(format!(
            "docx-exporter-resolver-{}-not-image.bin",
            std::process::id()
        ));
        std::fs::write(&not_an_image, b"plain text payload").expect("write temp file failed");

        let (fallback, _) = write_temp_png("size-fallback-decode.png", 40, 60);
        let resolver = resolver_with_fallback(&fallback.to_string_lossy());

        let dims = resolver
            .resolve_size(&not_an_image.to_string_lossy())
            .await
            .expect("fallback size should resolve");

        assert_eq!(dims.width, 40.0);
        assert_eq!(dims.height, 60.0);
    }
}

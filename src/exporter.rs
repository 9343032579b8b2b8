//! # 导出编排模块
//!
//! ## 设计思路
//!
//! `DocxExporter` 只负责流程编排与配置管理。
//! 处理链路固定为：
//! 1. 读取模板二进制
//! 2. 解包归档
//! 3. 渲染数据（图片标签经由解析器的回退策略）
//! 4. 回写归档并落盘
//!
//! ## 实现思路
//!
//! - 记录 `load/render/write/total` 阶段耗时，便于性能诊断。
//! - `export` 保持“记录日志后静默终止”的调用面：任何失败只产生日志，
//!   不产生部分输出文件；需要错误值的调用方使用 `try_export`。

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::image_resolver::{ImageResolver, ResolverConfig};
use crate::template::{self, DocxArchive, TemplateData};

/// 导出配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// 图片解析配置。
    pub resolver: ResolverConfig,
}

/// 文档导出器。
///
/// 一个导出器可复用于多次导出；单次导出内部无跨调用共享状态。
pub struct DocxExporter {
    resolver: ImageResolver,
}

impl DocxExporter {
    /// 根据配置创建导出器。
    pub fn new(config: ExportConfig) -> Self {
        Self {
            resolver: ImageResolver::new(config.resolver),
        }
    }

    /// 执行导出；失败返回错误值。
    ///
    /// 渲染完成前不落盘，任何失败都不会留下部分输出文件。
    pub async fn try_export(
        &self,
        template_path: &Path,
        data: &TemplateData,
        output_path: &Path,
    ) -> Result<(), ExportError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let template_bytes = std::fs::read(template_path).map_err(|e| {
            ExportError::Template(format!("无法读取模板 {}：{}", template_path.display(), e))
        })?;
        let mut archive = DocxArchive::from_bytes(&template_bytes)?;
        let load_elapsed = load_start.elapsed();

        let render_start = Instant::now();
        let summary = template::render(&mut archive, data, &self.resolver).await?;
        let document = archive.to_bytes()?;
        let render_elapsed = render_start.elapsed();

        let write_start = Instant::now();
        std::fs::write(output_path, &document).map_err(|e| {
            ExportError::Output(format!("无法写入 {}：{}", output_path.display(), e))
        })?;
        let write_elapsed = write_start.elapsed();

        log::info!(
            "✅ 文档导出完成 - 输出: {} 文本标签: {} 图片标签: {} load={}ms render={}ms write={}ms total={}ms",
            output_path.display(),
            summary.text_tags,
            summary.image_tags,
            load_elapsed.as_millis(),
            render_elapsed.as_millis(),
            write_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(())
    }

    /// 执行导出；失败仅记录日志，不向调用方传播。
    pub async fn export(&self, template_path: &Path, data: &TemplateData, output_path: &Path) {
        if let Err(err) = self.try_export(template_path, data, output_path).await {
            log::error!(
                "❌ 导出失败，已放弃本次导出 - 模板: {} 错误: {}",
                template_path.display(),
                err
            );
        }
    }
}

/// 便捷入口：用默认配置导出一份文档。
pub async fn export_docx(
    template_path: impl AsRef<Path>,
    data: &TemplateData,
    output_path: impl AsRef<Path>,
) {
    DocxExporter::new(ExportConfig::default())
        .export(template_path.as_ref(), data, output_path.as_ref())
        .await;
}

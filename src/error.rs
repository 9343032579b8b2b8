//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `ExportError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)` 等不一致模式。
//! 导出入口统一返回 `Result<T, ExportError>`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `RenderError` / `ImageError` / `std::io::Error` 提供 `From` 转换，无需手动 map。

use crate::image_resolver::ImageError;
use crate::template::RenderError;

/// 导出级统一错误类型
///
/// 所有导出入口均返回此类型，确保调用方收到一致的错误格式。
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// 模板读取失败
    #[error("模板读取失败: {0}")]
    Template(String),

    /// 渲染链路错误（标签替换 / 图片内联 / 归档补丁）
    #[error("{0}")]
    Render(#[from] RenderError),

    /// 图片解析流水线错误（加载 / 测量 / 回退）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 输出写入失败
    #[error("输出写入失败: {0}")]
    Output(String),
}

//! # 渲染错误模块
//!
//! 单一错误枚举承载渲染链路错误，图片解析错误通过 `#[from]` 上转，
//! 调用侧无需手动 map。

use crate::image_resolver::ImageError;

/// 文档渲染统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// zip 容器解包、回写或条目访问失败。
    #[error("归档错误：{0}")]
    Archive(String),

    /// 标签或数据形状不合法。
    #[error("标签错误：{0}")]
    Tag(String),

    /// 图片标签解析失败（主图与备用图均不可用）。
    #[error("{0}")]
    Image(#[from] ImageError),
}

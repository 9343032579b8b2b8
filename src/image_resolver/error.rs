//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载图片解析链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。

/// 图片解析统一错误类型。
///
/// 该类型会在渲染层被上转为 `RenderError`，最终进入导出日志。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 主图与备用图双双失败时返回，消息中携带备用图加载错误详情。
    #[error("备用图片不可用：{0}")]
    FallbackUnavailable(String),
}

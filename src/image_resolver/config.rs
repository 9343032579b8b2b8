//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ResolverConfig`，保证运行时行为可观测、可调整、可测试。
//! 默认值即生产可用：显示宽度上限沿用渲染上下文的 300 单位约定。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用配置。
//! - 派生 serde 序列化，便于 CLI 从 JSON 配置文件注入。

use serde::{Deserialize, Serialize};

/// 默认备用图片引用。
pub const DEFAULT_FALLBACK_IMAGE: &str = "failImg.png";

/// 默认显示宽度上限。
pub const DEFAULT_MAX_DISPLAY_WIDTH: u32 = 300;

/// 图片解析配置。
///
/// 字段覆盖了加载（下载 / 读取）与尺寸计算两个阶段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 显示宽度上限，自然宽度超出时等比缩小到该值。
    pub max_display_width: u32,
    /// 备用图片引用（路径或 URL），主图加载失败时使用。
    pub fallback_image: String,
    /// 下载/读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 最大重定向次数，避免无限跳转或恶意链路。
    pub max_redirects: usize,
    /// 是否允许访问内网或本地地址（默认关闭，防 SSRF）。
    pub allow_private_network: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_display_width: DEFAULT_MAX_DISPLAY_WIDTH,
            fallback_image: DEFAULT_FALLBACK_IMAGE.to_string(),
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            max_redirects: 5,
            allow_private_network: false,
        }
    }
}

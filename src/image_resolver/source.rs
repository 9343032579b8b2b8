//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部引用语义”和“流水线中间结果”解耦：
//! - `ImageSource` 表示引用字符串的来源分类
//! - `RawImageData` 表示已加载但未解码的字节
//! - `ImageDimensions` 表示计算后的显示尺寸

/// 图片引用来源。
///
/// 模板数据中的图片引用是一段不透明字符串，按前缀分类到具体加载路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 网络地址来源。
    Url(String),
    /// Data URL 来源（`data:image/...;base64,` 前缀）。
    DataUrl(String),
    /// 本地文件路径来源。
    FilePath(String),
}

impl ImageSource {
    /// 按前缀分类引用字符串。
    pub fn classify(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else if trimmed.starts_with("data:image/") {
            Self::DataUrl(trimmed.to_string())
        } else {
            Self::FilePath(trimmed.to_string())
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 尺寸计算输出：受宽度上限约束后的显示尺寸。
///
/// 高度按缩放比例浮点缩放，不做取整，可能为非整数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDimensions {
    /// 显示宽度。
    pub width: f64,
    /// 显示高度。
    pub height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_http_and_https_urls() {
        assert_eq!(
            ImageSource::classify("https://example.com/a.png"),
            ImageSource::Url("https://example.com/a.png".to_string())
        );
        assert_eq!(
            ImageSource::classify("http://example.com/a.png"),
            ImageSource::Url("http://example.com/a.png".to_string())
        );
    }

    #[test]
    fn classify_recognizes_data_urls() {
        let reference = "data:image/png;base64,iVBORw0KGgo=";
        assert_eq!(
            ImageSource::classify(reference),
            ImageSource::DataUrl(reference.to_string())
        );
    }

    #[test]
    fn classify_defaults_to_file_path() {
        assert_eq!(
            ImageSource::classify("  ./assets/logo.png "),
            ImageSource::FilePath("./assets/logo.png".to_string())
        );
    }
}

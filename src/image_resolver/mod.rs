//! # 图片解析模块（image_resolver）
//!
//! ## 设计思路
//!
//! 该模块将“引用分类 → 加载校验 → 尺寸计算 → 回退编排”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `resolver`：编排主图/备用图解析流程，暴露 `TagResolver` 接口
//! - `loader`：负责 URL/Data URL/文件加载与安全校验
//! - `measure`：负责头部尺寸读取与宽度上限规则
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 渲染器遇到图片标签
//!    ↓
//! resolver.rs（主图 → 备用图，恰好一次回退）
//!    ├─ loader.rs（来源加载 + URL/体积安全校验）
//!    └─ measure.rs（头部尺寸 + 宽度上限）
//!    ↓
//! 内容字节 / 显示尺寸 返回渲染器
//! ```

mod config;
mod error;
mod loader;
mod measure;
mod resolver;
mod source;

pub use config::{DEFAULT_FALLBACK_IMAGE, DEFAULT_MAX_DISPLAY_WIDTH, ResolverConfig};
pub use error::ImageError;
pub use resolver::{ImageResolver, TagResolver};
pub use source::{ImageDimensions, ImageSource};

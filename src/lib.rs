//! # docx 模板导出工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                调用方 (CLI / 库使用者)                    │
//! │      模板路径 ── 数据对象 (JSON) ── 输出路径              │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓ export / try_export
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↓                                                  │
//! │  ┌─ error ─────────── ExportError (统一错误类型)          │
//! │  │                                                       │
//! │  ├─ exporter ──────── 读模板 → 渲染 → 落盘 (阶段耗时日志) │
//! │  │                                                       │
//! │  ├─ template ─────── zip 归档解包/回写 + 标签替换/图片内联│
//! │  │   ├─ archive          条目映射 + 体积上限              │
//! │  │   └─ render           文本/图片标签 + 关系/媒体补丁    │
//! │  │                                                       │
//! │  └─ image_resolver ── 图片引用 → 内容字节 / 显示尺寸      │
//! │      ├─ loader           URL/Data URL/文件 + 安全校验     │
//! │      ├─ measure          头部尺寸 + 宽度上限              │
//! │      └─ resolver         主图失败回退备用图（恰好一次）    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `ExportError`，导出入口的返回类型 |
//! | [`exporter`] | 导出编排：模板读取、渲染调度、输出落盘 |
//! | [`template`] | docx 容器处理与标签替换（文档渲染器） |
//! | [`image_resolver`] | 图片引用解析：内容与显示尺寸，主图失败回退备用图 |

pub mod error;
pub mod exporter;
pub mod image_resolver;
pub mod template;

pub use error::ExportError;
pub use exporter::{DocxExporter, ExportConfig, export_docx};
pub use image_resolver::{ImageDimensions, ImageError, ImageResolver, ResolverConfig};
pub use template::{DOCX_MIME_TYPE, DocxArchive, TemplateData};

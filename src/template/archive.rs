//! # 文档归档模块
//!
//! ## 设计思路
//!
//! docx 本质是 zip 容器。将容器解包为“条目名 → 字节”映射后在内存中打补丁，
//! 再整体回写，未触碰的条目保持原字节不变。
//! 解包阶段施加单条目与总体积上限，防止恶意压缩包触发高内存开销。

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::RenderError;

/// 导出文档的固定 MIME 类型。
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// word 主文档条目。
pub(crate) const WORD_DOCUMENT: &str = "word/document.xml";
/// word 主文档的关系条目。
pub(crate) const WORD_DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
/// 内嵌媒体条目名前缀。
pub(crate) const WORD_MEDIA_IMAGE: &str = "word/media/image_";
/// 内容类型清单条目。
pub(crate) const CONTENT_TYPES: &str = "[Content_Types].xml";
/// 文档属性条目。
pub(crate) const DOC_PROPS_CORE: &str = "docProps/core.xml";

/// 单条目解压后体积上限（字节）。
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;
/// 全部条目解压后总体积上限（字节）。
pub const MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024;

/// 解包阶段施加的体积上限。
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    /// 单条目解压后体积上限（字节）。
    pub max_part_bytes: u64,
    /// 全部条目解压后总体积上限（字节）。
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_PART_BYTES,
            max_total_bytes: MAX_TOTAL_BYTES,
        }
    }
}

/// 内存中的 docx 归档。
pub struct DocxArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl DocxArchive {
    /// 用默认体积上限从 zip 字节解包。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RenderError> {
        Self::from_bytes_limited(bytes, ArchiveLimits::default())
    }

    /// 从 zip 字节解包，按给定上限拦截超限条目。
    pub fn from_bytes_limited(bytes: &[u8], limits: ArchiveLimits) -> Result<Self, RenderError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| RenderError::Archive(format!("无法打开 zip 归档：{}", e)))?;

        let mut entries = BTreeMap::new();
        let mut total: u64 = 0;

        for index in 0..zip.len() {
            let mut file = zip
                .by_index(index)
                .map_err(|e| RenderError::Archive(format!("无法读取 zip 条目：{}", e)))?;

            if file.is_dir() {
                continue;
            }

            if file.size() > limits.max_part_bytes {
                return Err(RenderError::Archive(format!(
                    "条目 {} 解压后体积过大：{} 字节（限制：{} 字节）",
                    file.name(),
                    file.size(),
                    limits.max_part_bytes
                )));
            }

            total = total.saturating_add(file.size());
            if total > limits.max_total_bytes {
                return Err(RenderError::Archive(format!(
                    "归档解压后总体积超过限制（{} 字节）",
                    limits.max_total_bytes
                )));
            }

            let name = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)
                .map_err(|e| RenderError::Archive(format!("读取条目 {} 失败：{}", name, e)))?;
            entries.insert(name, content);
        }

        if !entries.contains_key(WORD_DOCUMENT) {
            return Err(RenderError::Archive(format!(
                "归档缺少 {}，不是有效的 docx 模板",
                WORD_DOCUMENT
            )));
        }

        Ok(Self { entries })
    }

    /// 读取条目字节。
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(|bytes| bytes.as_slice())
    }

    /// 将条目读取为 UTF-8 文本。
    pub(crate) fn entry_string(&self, name: &str) -> Result<String, RenderError> {
        let bytes = self
            .entry(name)
            .ok_or_else(|| RenderError::Archive(format!("归档缺少条目 {}", name)))?;

        String::from_utf8(bytes.to_vec())
            .map_err(|e| RenderError::Archive(format!("条目 {} 不是合法 UTF-8：{}", name, e)))
    }

    /// 写入或覆盖条目。
    pub(crate) fn set_entry(&mut self, name: &str, bytes: Vec<u8>) {
        self.entries.insert(name.to_string(), bytes);
    }

    /// 条目是否存在。
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// 全部条目名（字典序）。
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 序列化回 zip 字节。
    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in &self.entries {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| RenderError::Archive(format!("写入条目 {} 失败：{}", name, e)))?;
            writer
                .write_all(content)
                .map_err(|e| RenderError::Archive(format!("写入条目 {} 内容失败：{}", name, e)))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| RenderError::Archive(format!("生成 zip 归档失败：{}", e)))?;

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in entries {
            writer.start_file(*name, options).expect("start entry failed");
            writer.write_all(content).expect("write entry failed");
        }

        writer.finish().expect("finish zip failed").into_inner()
    }

    #[test]
    fn from_bytes_requires_main_document_part() {
        let bytes = zip_with_entries(&[("word/styles.xml", b"<w:styles/>")]);

        let result = DocxArchive::from_bytes(&bytes);

        assert!(matches!(result, Err(RenderError::Archive(_))));
    }

    #[test]
    fn round_trip_preserves_unrelated_entries() {
        let bytes = zip_with_entries(&[
            (WORD_DOCUMENT, b"<w:document/>"),
            ("word/styles.xml", b"<w:styles>unchanged</w:styles>"),
            ("customXml/item1.xml", b"<item/>"),
        ]);

        let archive = DocxArchive::from_bytes(&bytes).expect("parse archive failed");
        let rebuilt = archive.to_bytes().expect("serialize archive failed");
        let reparsed = DocxArchive::from_bytes(&rebuilt).expect("reparse archive failed");

        assert_eq!(
            reparsed.entry("word/styles.xml"),
            Some(b"<w:styles>unchanged</w:styles>".as_slice())
        );
        assert_eq!(reparsed.entry("customXml/item1.xml"), Some(b"<item/>".as_slice()));
    }

    #[test]
    fn part_size_limit_rejects_oversized_entry() {
        let big = vec![b'x'; 2048];
        let bytes = zip_with_entries(&[(WORD_DOCUMENT, b"<w:document/>"), ("word/big.bin", &big)]);

        let limits = ArchiveLimits {
            max_part_bytes: 1024,
            max_total_bytes: MAX_TOTAL_BYTES,
        };
        let result = DocxArchive::from_bytes_limited(&bytes, limits);

        assert!(matches!(result, Err(RenderError::Archive(_))));
    }

    #[test]
    fn total_size_limit_rejects_oversized_archive() {
        let part = vec![b'x'; 700];
        let bytes = zip_with_entries(&[
            (WORD_DOCUMENT, b"<w:document/>"),
            ("word/a.bin", &part),
            ("word/b.bin", &part),
        ]);

        let limits = ArchiveLimits {
            max_part_bytes: 1024,
            max_total_bytes: 1024,
        };
        let result = DocxArchive::from_bytes_limited(&bytes, limits);

        assert!(matches!(result, Err(RenderError::Archive(_))));
    }

    #[test]
    fn entry_string_rejects_invalid_utf8() {
        let bytes = zip_with_entries(&[(WORD_DOCUMENT, &[0xff, 0xfe, 0x00][..])]);

        let archive = DocxArchive::from_bytes(&bytes).expect("parse archive failed");
        let result = archive.entry_string(WORD_DOCUMENT);

        assert!(matches!(result, Err(RenderError::Archive(_))));
    }
}

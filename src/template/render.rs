//! # 渲染模块
//!
//! ## 设计思路
//!
//! 在 `word/document.xml` 上执行扁平标签替换：
//! - `{name}`：文本标签，替换为数据值（XML 转义）
//! - `{%name}`：图片标签，替换为内联图片 run，并补齐媒体条目、
//!   关系条目与内容类型声明
//!
//! 标签必须完整出现在同一文本节点内；循环、条件等结构化模板语义不在范围内。
//!
//! ## 实现思路
//!
//! 1. 预编译正则一次性扫描全部标签
//! 2. 文本标签就地替换；图片标签先解析显示尺寸、再解析内容字节，
//!    按 EMU 换算拼接 drawing XML
//! 3. 为每张图片分配 `word/media/image_N.<ext>` 与下一个可用关系 Id
//! 4. 存在 `docProps/core.xml` 时刷新文档修改时间

use once_cell::sync::Lazy;
use regex::Regex;

use crate::image_resolver::{ImageDimensions, TagResolver};

use super::archive::{
    CONTENT_TYPES, DOC_PROPS_CORE, DocxArchive, WORD_DOCUMENT, WORD_DOCUMENT_RELS,
    WORD_MEDIA_IMAGE,
};
use super::data::TemplateData;
use super::error::RenderError;

/// 标签语法：`{name}` 文本标签，`{%name}` 图片标签。
static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(%?)([A-Za-z0-9_][A-Za-z0-9_.\-]*)\}").expect("标签正则不合法"));

/// 关系条目中已分配的数字 Id。
static REL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Id="rId(\d+)""#).expect("关系 Id 正则不合法"));

/// `docProps/core.xml` 中的修改时间节点。
static MODIFIED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<dcterms:modified[^>]*>[^<]*</dcterms:modified>").expect("修改时间正则不合法")
});

/// 每显示单位对应的 EMU 数（96 DPI 像素约定）。
const EMU_PER_PIXEL: f64 = 9525.0;

const IMAGE_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const RELATIONSHIPS_SKELETON: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

/// 渲染结果统计。
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderSummary {
    /// 替换的文本标签数。
    pub text_tags: usize,
    /// 嵌入的图片标签数。
    pub image_tags: usize,
}

struct TagMatch {
    start: usize,
    end: usize,
    image: bool,
    name: String,
}

struct PendingImage {
    media_name: String,
    rel_id: String,
    extension: &'static str,
    mime_type: &'static str,
    bytes: Vec<u8>,
}

/// 将数据渲染进归档，图片标签通过 `resolver` 逐个解析。
///
/// 任何图片标签解析失败都会中止渲染，归档保持可丢弃状态（调用方不回写）。
pub async fn render<R: TagResolver>(
    archive: &mut DocxArchive,
    data: &TemplateData,
    resolver: &R,
) -> Result<RenderSummary, RenderError> {
    let document = archive.entry_string(WORD_DOCUMENT)?;

    let matches: Vec<TagMatch> = TAG_PATTERN
        .captures_iter(&document)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let marker = captures.get(1)?;
            let name = captures.get(2)?;

            Some(TagMatch {
                start: whole.start(),
                end: whole.end(),
                image: marker.as_str() == "%",
                name: name.as_str().to_string(),
            })
        })
        .collect();

    let mut summary = RenderSummary::default();
    let mut output = String::with_capacity(document.len());
    let mut cursor = 0usize;
    let mut pending_images: Vec<PendingImage> = Vec::new();
    let mut next_rel_id = next_relationship_id(archive)?;

    for tag in &matches {
        output.push_str(&document[cursor..tag.start]);

        if tag.image {
            let reference = data.image_reference(&tag.name)?;
            let size = resolver.resolve_size(reference).await?;
            let bytes = resolver.resolve_content(reference).await?;

            let (extension, mime_type) = media_kind(&bytes);
            let media_name = allocate_media_name(archive, &pending_images, extension);
            let rel_id = format!("rId{}", next_rel_id);

            output.push_str(&inline_image_run(&rel_id, next_rel_id, &tag.name, &size));

            log::info!(
                "🖼️ 图片标签已嵌入 - 标签: {} 条目: {} 显示尺寸: {:.0}x{:.1}",
                tag.name,
                media_name,
                size.width,
                size.height
            );

            pending_images.push(PendingImage {
                media_name,
                rel_id,
                extension,
                mime_type,
                bytes,
            });
            next_rel_id += 1;
            summary.image_tags += 1;
        } else {
            let value = data.text(&tag.name).unwrap_or_else(|| {
                log::warn!("⚠️ 数据中缺少标签 {}，以空文本替换", tag.name);
                String::new()
            });
            output.push_str(&escape_xml_text(&value));
            summary.text_tags += 1;
        }

        cursor = tag.end;
    }
    output.push_str(&document[cursor..]);

    if !pending_images.is_empty() {
        patch_relationships(archive, &pending_images)?;
        patch_content_types(archive, &pending_images)?;

        for image in pending_images {
            archive.set_entry(&image.media_name, image.bytes);
        }
    }

    archive.set_entry(WORD_DOCUMENT, output.into_bytes());
    refresh_modified_timestamp(archive);

    Ok(summary)
}

/// 扫描关系条目，返回下一个可用的数字 Id。
fn next_relationship_id(archive: &DocxArchive) -> Result<usize, RenderError> {
    if !archive.contains(WORD_DOCUMENT_RELS) {
        return Ok(1);
    }

    let rels = archive.entry_string(WORD_DOCUMENT_RELS)?;
    let max_id = REL_ID_PATTERN
        .captures_iter(&rels)
        .filter_map(|captures| captures.get(1)?.as_str().parse::<usize>().ok())
        .max()
        .unwrap_or(0);

    Ok(max_id + 1)
}

/// 分配媒体条目名，跳过归档中已存在的同名条目。
fn allocate_media_name(
    archive: &DocxArchive,
    pending: &[PendingImage],
    extension: &str,
) -> String {
    let mut index = archive
        .entry_names()
        .filter(|name| name.starts_with(WORD_MEDIA_IMAGE))
        .count()
        + pending.len()
        + 1;

    loop {
        let candidate = format!("{}{}.{}", WORD_MEDIA_IMAGE, index, extension);
        let taken = archive.contains(&candidate)
            || pending.iter().any(|image| image.media_name == candidate);

        if !taken {
            return candidate;
        }
        index += 1;
    }
}

/// 按文件签名判定媒体扩展名与 MIME；无法识别时按 PNG 处理。
fn media_kind(bytes: &[u8]) -> (&'static str, &'static str) {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            match kind.extension() {
                "jpg" => ("jpg", "image/jpeg"),
                "gif" => ("gif", "image/gif"),
                "bmp" => ("bmp", "image/bmp"),
                "tif" => ("tif", "image/tiff"),
                _ => ("png", "image/png"),
            }
        }
        _ => ("png", "image/png"),
    }
}

/// 构造内联图片 run。
///
/// 标签出现在 `<w:t>` 文本节点内，先闭合当前 run，插入 drawing run，
/// 再重新打开文本节点，保持段落结构合法。
fn inline_image_run(rel_id: &str, doc_pr_id: usize, tag_name: &str, size: &ImageDimensions) -> String {
    let cx = (size.width * EMU_PER_PIXEL).round() as u64;
    let cy = (size.height * EMU_PER_PIXEL).round() as u64;

    format!(
        concat!(
            r#"</w:t></w:r><w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="{name}"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rid}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline>"#,
            r#"</w:drawing></w:r><w:r><w:t xml:space="preserve">"#,
        ),
        cx = cx,
        cy = cy,
        id = doc_pr_id,
        name = tag_name,
        rid = rel_id,
    )
}

/// 将图片关系追加进关系条目，条目缺失时先建骨架。
fn patch_relationships(
    archive: &mut DocxArchive,
    images: &[PendingImage],
) -> Result<(), RenderError> {
    let rels = if archive.contains(WORD_DOCUMENT_RELS) {
        archive.entry_string(WORD_DOCUMENT_RELS)?
    } else {
        RELATIONSHIPS_SKELETON.to_string()
    };

    let mut additions = String::new();
    for image in images {
        let target = image
            .media_name
            .strip_prefix("word/")
            .unwrap_or(&image.media_name);

        additions.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            image.rel_id, IMAGE_RELATIONSHIP_TYPE, target
        ));
    }

    if !rels.contains("</Relationships>") {
        return Err(RenderError::Archive(format!(
            "条目 {} 缺少 Relationships 结束节点",
            WORD_DOCUMENT_RELS
        )));
    }

    let patched = rels.replace("</Relationships>", &format!("{}</Relationships>", additions));
    archive.set_entry(WORD_DOCUMENT_RELS, patched.into_bytes());

    Ok(())
}

/// 为用到的图片扩展名补齐内容类型默认声明。
fn patch_content_types(
    archive: &mut DocxArchive,
    images: &[PendingImage],
) -> Result<(), RenderError> {
    let mut content_types = archive.entry_string(CONTENT_TYPES)?;

    for image in images {
        let marker = format!(r#"Extension="{}""#, image.extension);
        if content_types.contains(&marker) {
            continue;
        }

        if !content_types.contains("</Types>") {
            return Err(RenderError::Archive(format!(
                "条目 {} 缺少 Types 结束节点",
                CONTENT_TYPES
            )));
        }

        let declaration = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            image.extension, image.mime_type
        );
        content_types = content_types.replace("</Types>", &format!("{}</Types>", declaration));
    }

    archive.set_entry(CONTENT_TYPES, content_types.into_bytes());

    Ok(())
}

/// 文本节点转义。
fn escape_xml_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// 刷新 `docProps/core.xml` 的修改时间；条目缺失时跳过。
fn refresh_modified_timestamp(archive: &mut DocxArchive) {
    let Ok(core) = archive.entry_string(DOC_PROPS_CORE) else {
        return;
    };

    if !MODIFIED_PATTERN.is_match(&core) {
        return;
    }

    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let replacement = format!(
        r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
        stamp
    );
    let updated = MODIFIED_PATTERN.replace(&core, replacement.as_str()).into_owned();

    archive.set_entry(DOC_PROPS_CORE, updated.into_bytes());
    log::debug!("🕒 已刷新文档修改时间");
}

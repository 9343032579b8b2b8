//! # 模板数据模块
//!
//! ## 设计思路
//!
//! 模板数据是一个 JSON 对象：键为标签名，值为文本或图片引用。
//! 用轻量包装替代裸 `serde_json::Value`，在入口处一次性校验形状，
//! 后续读取不再处理“顶层不是对象”的分支。

use serde_json::{Map, Value};

use super::RenderError;

/// 模板数据对象。
#[derive(Debug, Clone, Default)]
pub struct TemplateData(Map<String, Value>);

impl TemplateData {
    /// 从 JSON 值构造，要求顶层是对象。
    pub fn from_value(value: Value) -> Result<Self, RenderError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(RenderError::Tag(format!(
                "模板数据必须是 JSON 对象，实际为 {}",
                json_type_name(&other)
            ))),
        }
    }

    /// 读取标签的原始值。
    pub fn get(&self, tag: &str) -> Option<&Value> {
        self.0.get(tag)
    }

    /// 将标签值渲染为文本。
    ///
    /// 字符串原样返回；数字与布尔值按字面量输出；`null` 视为缺失。
    pub fn text(&self, tag: &str) -> Option<String> {
        match self.0.get(tag)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// 将标签值作为图片引用读取（必须是非空字符串）。
    pub fn image_reference(&self, tag: &str) -> Result<&str, RenderError> {
        match self.0.get(tag) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(RenderError::Tag(format!(
                "图片标签 {} 的值必须是非空字符串引用",
                tag
            ))),
            None => Err(RenderError::Tag(format!("图片标签 {} 在数据中缺失", tag))),
        }
    }
}

impl From<Map<String, Value>> for TemplateData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

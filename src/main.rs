//! # docx 模板导出工具 — 命令行入口
//!
//! 本文件仅负责日志初始化与参数解析，业务逻辑分布在各子模块中，
//! 详见 `lib.rs` 架构文档。
//!
//! 用法：`docx-exporter <模板.docx> <数据.json> <输出.docx> [配置.json]`

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use docx_exporter::exporter::{DocxExporter, ExportConfig};
use docx_exporter::template::TemplateData;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 || args.len() > 5 {
        eprintln!(
            "用法: {} <模板.docx> <数据.json> <输出.docx> [配置.json]",
            args.first().map(String::as_str).unwrap_or("docx-exporter")
        );
        return ExitCode::from(2);
    }

    let template_path = PathBuf::from(&args[1]);
    let data_path = PathBuf::from(&args[2]);
    let output_path = PathBuf::from(&args[3]);

    let config = match args.get(4) {
        Some(path) => match load_config(Path::new(path)) {
            Ok(config) => config,
            Err(err) => {
                log::error!("❌ 配置文件读取失败 - {}: {}", path, err);
                return ExitCode::FAILURE;
            }
        },
        None => ExportConfig::default(),
    };

    let data = match load_data(&data_path) {
        Ok(data) => data,
        Err(err) => {
            log::error!("❌ 数据文件读取失败 - {}: {}", data_path.display(), err);
            return ExitCode::FAILURE;
        }
    };

    DocxExporter::new(config)
        .export(&template_path, &data, &output_path)
        .await;

    ExitCode::SUCCESS
}

fn load_config(path: &Path) -> Result<ExportConfig, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

fn load_data(path: &Path) -> Result<TemplateData, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    TemplateData::from_value(value).map_err(|e| e.to_string())
}

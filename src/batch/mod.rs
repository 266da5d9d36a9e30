//! # 批量输入模块
//!
//! 将文件或目录输入整理为有序的结构批次。
//!
//! ## 功能
//! - 自动检测输入类型（文件/目录）
//! - 收集匹配文件列表并按路径排序
//! - 逐文件读取，帧顺序保持不变
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `parsers/` 读取结构

pub mod collector;

pub use collector::{FileCollector, DEFAULT_PATTERN};

use crate::error::Result;
use crate::models::StructureBatch;
use crate::parsers;
use std::path::PathBuf;

/// 从文件或目录读取结构批次
pub fn load_input(input: PathBuf, pattern: &str, recursive: bool) -> Result<StructureBatch> {
    let files = FileCollector::new(input)
        .with_pattern(pattern)?
        .recursive(recursive)
        .collect()?;
    parsers::load_batch(&files)
}

//! # 输入文件收集
//!
//! 根据输入路径和模式收集结构文件列表。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - 逗号分隔的多个 glob 模式，匹配文件名
//! - 可选递归目录搜索
//! - 输出按路径排序，保证批次顺序稳定
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{RelaxError, Result};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 默认匹配的结构文件
pub const DEFAULT_PATTERN: &str = "*.xyz,*.extxyz,*.vasp,POSCAR*,CONTCAR*";

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 原始模式字符串（用于报错）
    pattern: String,
    patterns: Vec<Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            pattern: "*".to_string(),
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Pattern::new(s).map_err(|e| {
                    RelaxError::Configuration(format!("Invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.pattern = pattern.to_string();
        self.patterns = patterns;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }

        if !self.input.is_dir() {
            return Err(RelaxError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        if files.is_empty() {
            return Err(RelaxError::NoFilesFound {
                pattern: format!("{} in {}", self.pattern, self.input.display()),
            });
        }

        files.sort();
        Ok(files)
    }

    /// 检查文件是否匹配任一模式；未设置模式时全部匹配
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_sorted_matches() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xyz", "a.xyz", "POSCAR_001", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.xyz"), "").unwrap();

        let files = FileCollector::new(dir.path().to_path_buf())
            .with_pattern(DEFAULT_PATTERN)
            .unwrap()
            .collect()
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["POSCAR_001", "a.xyz", "b.xyz"]);

        let recursive = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("*.xyz")
            .unwrap()
            .recursive(true)
            .collect()
            .unwrap();
        assert_eq!(recursive.len(), 3);
    }

    #[test]
    fn test_single_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.data");
        fs::write(&path, "").unwrap();

        let files = FileCollector::new(path.clone())
            .with_pattern("*.xyz")
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(files, vec![path]);
    }

    #[test]
    fn test_empty_directory_and_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("*.xyz")
            .unwrap()
            .collect()
            .unwrap_err();
        assert!(matches!(err, RelaxError::NoFilesFound { .. }));

        let err = FileCollector::new(dir.path().join("missing"))
            .collect()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}

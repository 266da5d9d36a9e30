//! # 统一错误处理模块
//!
//! 定义 batchrelax 的所有错误类型，使用 `thiserror` 派生。
//!
//! 未收敛（达到最大步数）不是错误，而是 `RelaxStatus::StepLimitReached`，
//! 见 `relax/collector.rs`。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// batchrelax 统一错误类型
#[derive(Error, Debug)]
pub enum RelaxError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 配置错误（在任何迭代之前失败）
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid range format: {0}")]
    InvalidRange(String),

    // ─────────────────────────────────────────────────────────────
    // 模型输入错误（整个批次中止）
    // ─────────────────────────────────────────────────────────────
    #[error("Model cannot process structure #{index} '{name}': {reason}")]
    ModelInput {
        index: usize,
        name: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

impl RelaxError {
    /// 是否属于配置错误（文件路径、掩码长度、单位字符串等）
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RelaxError::Configuration(_)
                | RelaxError::InvalidRange(_)
                | RelaxError::InvalidStructure(_)
                | RelaxError::FileNotFound { .. }
                | RelaxError::UnsupportedFormat(_)
        )
    }

    /// 将批内子集索引映射回原始批次索引
    pub(crate) fn remap_structure_index(self, original: &[usize]) -> Self {
        match self {
            RelaxError::ModelInput {
                index,
                name,
                reason,
            } => RelaxError::ModelInput {
                index: original.get(index).copied().unwrap_or(index),
                name,
                reason,
            },
            other => other,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RelaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_model_input_index() {
        let err = RelaxError::ModelInput {
            index: 1,
            name: "dimer".to_string(),
            reason: "isolated atom".to_string(),
        };
        match err.remap_structure_index(&[0, 4, 7]) {
            RelaxError::ModelInput { index, .. } => assert_eq!(index, 4),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_configuration_classification() {
        assert!(RelaxError::Configuration("bad unit".to_string()).is_configuration());
        assert!(RelaxError::FileNotFound {
            path: "missing.xyz".to_string()
        }
        .is_configuration());
        assert!(RelaxError::InvalidStructure("empty batch".to_string()).is_configuration());
        assert!(!RelaxError::Other("x".to_string()).is_configuration());
    }
}

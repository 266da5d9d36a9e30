//! # 运行配置
//!
//! 从 TOML 文件读取 `[evaluator]` 与 `[relax]` 两节，未知键视为错误。
//! 命令行参数在此基础上覆盖。
//!
//! ```toml
//! [evaluator]
//! model = "lj-argon"
//! neighbor_cutoff = 8.5
//! device = "parallel:4"
//!
//! [relax]
//! fmax = 0.05
//! steps = 200
//!
//! [relax.lbfgs]
//! maxstep = 0.1
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `forcefield::EvaluatorConfig`, `relax::RelaxConfig`
//! - 使用 `toml` + `serde` 反序列化

use crate::error::{RelaxError, Result};
use crate::forcefield::EvaluatorConfig;
use crate::relax::RelaxConfig;

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub evaluator: EvaluatorConfig,
    pub relax: RelaxConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RelaxError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            RelaxError::Configuration(reason) => {
                RelaxError::Configuration(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RelaxError::Configuration(e.to_string()))
    }
}

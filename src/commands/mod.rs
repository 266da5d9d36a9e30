//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `config.rs`, `forcefield/`, `relax/`, `report/`, `utils/`
//! - 子模块: relax, evaluate

pub mod evaluate;
pub mod relax;

use crate::batch;
use crate::cli::common::InputArgs;
use crate::cli::Commands;
use crate::config::RunConfig;
use crate::error::{RelaxError, Result};
use crate::models::{Structure, StructureBatch};
use crate::parsers;
use crate::utils::output;
use std::path::Path;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Relax(args) => relax::execute(args),
        Commands::Evaluate(args) => evaluate::execute(args),
    }
}

/// 读取 `--config`（未给出时使用默认值）
fn load_config(input: &InputArgs) -> Result<RunConfig> {
    match &input.config {
        Some(path) => {
            output::print_info(&format!("Configuration: '{}'", path.display()));
            RunConfig::from_file(path)
        }
        None => Ok(RunConfig::default()),
    }
}

/// 读取输入结构批次
fn load_structures(input: &InputArgs) -> Result<StructureBatch> {
    let batch = batch::load_input(input.input.clone(), &input.pattern, input.recursive)?;
    if batch.is_empty() {
        return Err(RelaxError::InvalidStructure(format!(
            "No structures found in '{}'",
            input.input.display()
        )));
    }

    output::print_info(&format!(
        "Loaded {} structures from '{}'",
        batch.len(),
        input.input.display()
    ));
    Ok(batch)
}

/// 写出结构；POSCAR 无法保存非周期边界时给出警告
fn write_structures(path: &Path, structures: &[Structure]) -> Result<()> {
    if parsers::loses_open_boundaries(path, structures) {
        output::print_warning(&format!(
            "'{}' stores non-periodic structures in a vacuum box; they read back as periodic",
            path.display()
        ));
    }
    parsers::write_structures(path, structures)
}

//! # evaluate 子命令 CLI 定义
//!
//! 单点能量/受力计算，不移动原子。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/evaluate.rs`

use super::common::{EvaluatorArgs, InputArgs};

use clap::Args;
use std::path::PathBuf;

/// evaluate 子命令参数
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub evaluator: EvaluatorArgs,

    /// Write structures with energies and forces as extended XYZ
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Per-structure summary CSV
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

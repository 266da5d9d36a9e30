//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `relax`: 批量 L-BFGS 结构弛豫
//! - `evaluate`: 单点能量/受力计算
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: common, relax, evaluate

pub mod common;
pub mod evaluate;
pub mod relax;

use clap::{Parser, Subcommand};

/// batchrelax - 批量结构弛豫
#[derive(Parser)]
#[command(name = "batchrelax")]
#[command(version)]
#[command(about = "Batch-wise L-BFGS structure relaxation with pair-potential force fields", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Relax a batch of structures until forces fall below fmax
    Relax(relax::RelaxArgs),

    /// Single-point energies and forces for a batch of structures
    Evaluate(evaluate::EvaluateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_relax_command() {
        let cli = Cli::try_parse_from([
            "batchrelax",
            "relax",
            "batch.xyz",
            "--model",
            "lj-argon",
            "--fmax",
            "0.01",
            "--fix",
            "1-2",
            "--device",
            "parallel:2",
        ])
        .unwrap();

        match cli.command {
            Commands::Relax(args) => {
                assert_eq!(args.input.input.to_str(), Some("batch.xyz"));
                assert_eq!(args.evaluator.model.as_deref(), Some("lj-argon"));
                assert_eq!(args.fmax, Some(0.01));
                assert_eq!(args.fix.as_deref(), Some("1-2"));
                assert_eq!(args.output.to_str(), Some("relaxed.xyz"));
            }
            Commands::Evaluate(_) => panic!("expected relax"),
        }
    }
}

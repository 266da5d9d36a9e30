//! # relax 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/relax.rs`

use super::common::{EvaluatorArgs, InputArgs};
use crate::error::{RelaxError, Result};
use crate::relax::RelaxConfig;
use crate::utils::range;

use clap::Args;
use std::path::PathBuf;

/// relax 子命令参数
#[derive(Args, Debug)]
pub struct RelaxArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub evaluator: EvaluatorArgs,

    // ─────────────────────────────────────────────────────────────
    // 弛豫参数
    // ─────────────────────────────────────────────────────────────
    /// Force convergence threshold (eV/Å)
    #[arg(long)]
    pub fmax: Option<f64>,

    /// Maximum number of optimizer steps per structure
    #[arg(long)]
    pub steps: Option<usize>,

    /// Atoms to freeze in every structure, 1-based (e.g., "1-4,7")
    #[arg(long)]
    pub fix: Option<String>,

    /// L-BFGS history length
    #[arg(long)]
    pub memory: Option<usize>,

    /// Maximum displacement of any atom per step (Å)
    #[arg(long)]
    pub maxstep: Option<f64>,

    /// Append every evaluated frame to this extended-XYZ trajectory
    #[arg(long)]
    pub trajectory: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // 输出
    // ─────────────────────────────────────────────────────────────
    /// Optimized structures (.xyz for the batch, POSCAR/.vasp for a single structure)
    #[arg(short, long, default_value = "relaxed.xyz")]
    pub output: PathBuf,

    /// Per-structure summary CSV
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Convergence plot (.png or .svg)
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Figure width in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 1400)]
    pub width: u32,

    /// Figure height in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Suppress the progress bar
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

impl RelaxArgs {
    /// 用命令行参数覆盖弛豫配置；`natoms` 为批次统一原子数，用于 `--fix`
    pub fn apply(&self, config: &mut RelaxConfig, natoms: Option<usize>) -> Result<()> {
        if let Some(fmax) = self.fmax {
            config.fmax = fmax;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(memory) = self.memory {
            config.lbfgs.memory = memory;
        }
        if let Some(maxstep) = self.maxstep {
            config.lbfgs.maxstep = maxstep;
        }
        if let Some(path) = &self.trajectory {
            config.trajectory = Some(path.clone());
        }
        if let Some(expr) = &self.fix {
            let natoms = natoms.ok_or_else(|| {
                RelaxError::Configuration(
                    "--fix requires every structure to have the same number of atoms".to_string(),
                )
            })?;
            config.mask = range::mask_from_range(expr, natoms)?;
        }
        Ok(())
    }
}

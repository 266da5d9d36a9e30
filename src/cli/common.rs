//! # 共享 CLI 参数
//!
//! `relax` 与 `evaluate` 共用的输入与力场参数。命令行给出的值覆盖
//! `--config` 文件中的同名设置。
//!
//! ## 依赖关系
//! - 被 `cli/relax.rs`, `cli/evaluate.rs` 使用
//! - 覆盖 `config::RunConfig` 的 `[evaluator]` 节

use crate::batch::DEFAULT_PATTERN;
use crate::error::Result;
use crate::forcefield::EvaluatorConfig;

use clap::Args;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// 输入
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct InputArgs {
    /// Input: structure file (.xyz/.extxyz/POSCAR) or directory of structure files
    pub input: PathBuf,

    /// Glob pattern for input files (directory input, e.g., "*.xyz,POSCAR*")
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,

    /// Recurse into subdirectories (directory input)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// TOML run configuration ([evaluator], [relax] sections)
    #[arg(short, long, env = "BATCHRELAX_CONFIG")]
    pub config: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────
// 力场
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct EvaluatorArgs {
    /// Force-field model: built-in name (lj-argon, lj-neon, morse-copper) or TOML model file
    #[arg(short, long)]
    pub model: Option<String>,

    /// Neighbor cutoff radius, in model length units
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Compute device: cpu, parallel, parallel:N
    #[arg(long)]
    pub device: Option<String>,

    /// Energy unit of the model (eV, meV, kcal/mol, kJ/mol, Hartree, Ry)
    #[arg(long)]
    pub energy_unit: Option<String>,

    /// Length unit of the model (Ang, Bohr, nm)
    #[arg(long)]
    pub position_unit: Option<String>,
}

impl EvaluatorArgs {
    /// 用命令行参数覆盖配置
    pub fn apply(&self, config: &mut EvaluatorConfig) -> Result<()> {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(cutoff) = self.cutoff {
            config.neighbor_cutoff = cutoff;
        }
        if let Some(device) = &self.device {
            config.device = device.parse()?;
        }
        if let Some(unit) = &self.energy_unit {
            config.energy_unit = unit.parse()?;
        }
        if let Some(unit) = &self.position_unit {
            config.position_unit = unit.parse()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::Device;
    use crate::models::EnergyUnit;

    #[test]
    fn test_cli_overrides_config() {
        let args = EvaluatorArgs {
            model: Some("lj-neon".to_string()),
            cutoff: None,
            device: Some("parallel:3".to_string()),
            energy_unit: Some("meV".to_string()),
            position_unit: None,
        };
        let mut config = EvaluatorConfig {
            model: "lj-argon".to_string(),
            neighbor_cutoff: 9.0,
            ..Default::default()
        };
        args.apply(&mut config).unwrap();

        assert_eq!(config.model, "lj-neon");
        assert!((config.neighbor_cutoff - 9.0).abs() < 1e-12);
        assert_eq!(config.device, Device::Parallel(3));
        assert_eq!(config.energy_unit, EnergyUnit::MilliElectronVolt);
    }

    #[test]
    fn test_bad_unit_rejected() {
        let args = EvaluatorArgs {
            model: None,
            cutoff: None,
            device: None,
            energy_unit: None,
            position_unit: Some("parsec".to_string()),
        };
        let err = args.apply(&mut EvaluatorConfig::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}

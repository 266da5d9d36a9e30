//! # 结果导出
//!
//! 将弛豫或单点计算结果导出为 CSV 汇总表。
//!
//! ## CSV 列
//! index, name, formula, natoms, energy, energy_per_atom, max_force,
//! steps, evaluations, status
//!
//! ## 依赖关系
//! - 被 `commands/relax.rs`, `commands/evaluate.rs` 调用
//! - 使用 `relax/collector.rs` 的 RelaxationResult
//! - 使用 `csv` + `serde` 写入

use crate::error::{RelaxError, Result};
use crate::forcefield::Evaluation;
use crate::models::Structure;
use crate::relax::RelaxationResult;

use serde::Serialize;
use std::path::Path;

/// 汇总表中的一行
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub index: usize,
    pub name: String,
    pub formula: String,
    pub natoms: usize,
    pub energy: f64,
    pub energy_per_atom: f64,
    pub max_force: f64,
    pub steps: usize,
    pub evaluations: usize,
    pub status: String,
}

impl SummaryRow {
    pub fn from_result(result: &RelaxationResult) -> Self {
        let natoms = result.structure.natoms();
        SummaryRow {
            index: result.index,
            name: result.structure.name.clone(),
            formula: result.structure.formula(),
            natoms,
            energy: result.energy,
            energy_per_atom: per_atom(result.energy, natoms),
            max_force: result.max_force,
            steps: result.steps,
            evaluations: result.evaluations,
            status: result.status.to_string(),
        }
    }

    /// 单点计算（未施加任何约束）
    pub fn from_evaluation(index: usize, structure: &Structure, evaluation: &Evaluation) -> Self {
        let natoms = structure.natoms();
        SummaryRow {
            index,
            name: structure.name.clone(),
            formula: structure.formula(),
            natoms,
            energy: evaluation.energy,
            energy_per_atom: per_atom(evaluation.energy, natoms),
            max_force: max_force(&evaluation.forces),
            steps: 0,
            evaluations: 1,
            status: "single point".to_string(),
        }
    }
}

fn per_atom(energy: f64, natoms: usize) -> f64 {
    if natoms == 0 {
        0.0
    } else {
        energy / natoms as f64
    }
}

/// 最大单原子受力模长
pub fn max_force(forces: &[[f64; 3]]) -> f64 {
    forces
        .iter()
        .map(|f| (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt())
        .fold(0.0, f64::max)
}

/// 写出汇总 CSV
pub fn write_summary(rows: &[SummaryRow], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    for row in rows {
        wtr.serialize(row)?;
    }

    wtr.flush().map_err(|e| RelaxError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

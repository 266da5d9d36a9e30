//! # evaluate 子命令实现
//!
//! 对整个批次做一次能量/受力计算，不移动原子、不施加冻结。
//!
//! ## 依赖关系
//! - 使用 `cli/evaluate.rs` 定义的 EvaluateArgs
//! - 使用 `forcefield/` 的 BatchEvaluator
//! - 使用 `report/export.rs` 写汇总表

use super::{load_config, load_structures, write_structures};
use crate::cli::evaluate::EvaluateArgs;
use crate::error::Result;
use crate::forcefield::{BatchEvaluator, ForceFieldEvaluator};
use crate::models::Structure;
use crate::report::export::{self, SummaryRow};
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct EnergyRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Structure")]
    name: String,
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "E/atom (eV)")]
    energy_per_atom: String,
    #[tabled(rename = "max|F| (eV/Å)")]
    max_force: String,
}

/// 执行单点计算
pub fn execute(args: EvaluateArgs) -> Result<()> {
    output::print_header("Single-Point Evaluation");

    let mut config = load_config(&args.input)?;
    args.evaluator.apply(&mut config.evaluator)?;

    let batch = load_structures(&args.input)?;
    let evaluator = ForceFieldEvaluator::new(&config.evaluator)?;
    output::print_info(&format!("Force field: {}", evaluator.describe()));

    let refs: Vec<&Structure> = batch.iter().collect();
    let evaluations = evaluator.evaluate(&refs)?;

    let summary: Vec<SummaryRow> = batch
        .iter()
        .zip(&evaluations)
        .enumerate()
        .map(|(i, (s, e))| SummaryRow::from_evaluation(i, s, e))
        .collect();

    let rows: Vec<EnergyRow> = summary
        .iter()
        .map(|r| EnergyRow {
            index: r.index + 1,
            name: r.name.clone(),
            formula: r.formula.clone(),
            energy: format!("{:.6}", r.energy),
            energy_per_atom: format!("{:.6}", r.energy_per_atom),
            max_force: format!("{:.4}", r.max_force),
        })
        .collect();
    println!("{}", Table::new(&rows));

    if let Some(path) = &args.output {
        let structures: Vec<Structure> = batch
            .into_inner()
            .into_iter()
            .zip(evaluations)
            .map(|(mut s, e)| {
                s.energy = Some(e.energy);
                s.forces = Some(e.forces);
                s
            })
            .collect();
        write_structures(path, &structures)?;
        output::print_written("structures with energies and forces", path);
    }

    if let Some(path) = &args.summary {
        export::write_summary(&summary, path)?;
        output::print_written("summary", path);
    }

    output::print_done(&format!("Evaluated {} structures", summary.len()));
    Ok(())
}

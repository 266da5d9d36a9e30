//! # relax 子命令实现
//!
//! 读取结构批次，用同一个力场同时弛豫所有结构。
//!
//! ## 流程
//! 1. 读取配置文件，命令行参数覆盖
//! 2. 读取输入批次，构建力场与驱动器
//! 3. 迭代至全部结构收敛或达到步数上限（进度条显示）
//! 4. 打印结果表与未收敛警告
//! 5. 写出优化结构、汇总 CSV、收敛曲线
//!
//! 未收敛不影响退出码。
//!
//! ## 依赖关系
//! - 使用 `cli/relax.rs` 定义的 RelaxArgs
//! - 使用 `relax/` 驱动器与结果收集
//! - 使用 `report/` 导出结果

use super::{load_config, load_structures, write_structures};
use crate::cli::relax::RelaxArgs;
use crate::error::Result;
use crate::forcefield::ForceFieldEvaluator;
use crate::relax::{BatchRelaxationDriver, ResultCollector};
use crate::report::{export, plot};
use crate::utils::{output, progress};

use std::path::Path;
use tabled::{Table, Tabled};

/// 结果表行
#[derive(Debug, Clone, Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Structure")]
    name: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "max|F| (eV/Å)")]
    max_force: String,
    #[tabled(rename = "Steps")]
    steps: usize,
    #[tabled(rename = "Status")]
    status: String,
}

/// 执行批量弛豫
pub fn execute(args: RelaxArgs) -> Result<()> {
    output::print_header("Batch Structure Relaxation");

    let mut config = load_config(&args.input)?;
    args.evaluator.apply(&mut config.evaluator)?;

    let batch = load_structures(&args.input)?;
    args.apply(&mut config.relax, batch.uniform_natoms())?;

    let evaluator = ForceFieldEvaluator::new(&config.evaluator)?;
    output::print_info(&format!("Force field: {}", evaluator.describe()));
    output::print_info(&format!(
        "fmax = {} eV/Å, steps = {}, maxstep = {} Å, memory = {}",
        config.relax.fmax, config.relax.steps, config.relax.lbfgs.maxstep, config.relax.lbfgs.memory
    ));
    let frozen = config.relax.mask.iter().filter(|&&f| f).count();
    if frozen > 0 {
        output::print_info(&format!("Frozen atoms per structure: {}", frozen));
    }

    let driver = BatchRelaxationDriver::new(&evaluator, config.relax);

    let results = if args.quiet {
        driver.run(&batch)?
    } else {
        let pb = progress::create_relax_bar(batch.len() as u64);
        let results = driver.run_with(&batch, |report| progress::update_relax_bar(&pb, report));
        pb.finish_and_clear();
        results?
    };

    print_results(&results);
    write_outputs(&args, &results)?;

    output::print_done(&format!(
        "{}/{} structures converged ({} force evaluations)",
        results.converged_count(),
        results.len(),
        results.total_evaluations()
    ));

    Ok(())
}

fn print_results(results: &ResultCollector) {
    let rows: Vec<ResultRow> = results
        .collect()
        .iter()
        .map(|r| ResultRow {
            index: r.index + 1,
            name: r.structure.name.clone(),
            energy: format!("{:.6}", r.energy),
            max_force: format!("{:.4}", r.max_force),
            steps: r.steps,
            status: r.status.to_string(),
        })
        .collect();

    output::print_header("Relaxation Results");
    println!("{}", Table::new(&rows));

    let warnings = results.warnings();
    if !warnings.is_empty() {
        println!();
        for warning in &warnings {
            output::print_warning(&warning.to_string());
        }
    }
    output::print_separator();
}

fn write_outputs(args: &RelaxArgs, results: &ResultCollector) -> Result<()> {
    let (structures, _) = results.optimizer_results();
    write_structures(&args.output, &structures)?;
    output::print_written("optimized structures", &args.output);

    if let Some(path) = &args.summary {
        let rows: Vec<export::SummaryRow> = results
            .collect()
            .iter()
            .map(export::SummaryRow::from_result)
            .collect();
        export::write_summary(&rows, path)?;
        output::print_written("summary", path);
    }

    if let Some(path) = &args.plot {
        plot::generate_convergence_plot(
            results.collect(),
            path,
            "Relaxation Convergence",
            args.width,
            args.height,
            is_svg(path),
        )?;
        output::print_written("convergence plot", path);
    }

    Ok(())
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

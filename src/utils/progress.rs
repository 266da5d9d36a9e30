//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `indicatif` crate

use crate::relax::IterationReport;
use indicatif::{ProgressBar, ProgressStyle};

/// 弛豫进度条：长度为结构数，位置为已结束的结构数
pub fn create_relax_bar(structures: u64) -> ProgressBar {
    let pb = ProgressBar::new(structures);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} done {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb
}

/// 用迭代摘要更新弛豫进度条
pub fn update_relax_bar(pb: &ProgressBar, report: &IterationReport) {
    pb.set_position((report.converged + report.stopped) as u64);
    pb.set_message(format!(
        "iter {} | evaluated {} | max|F| {:.4} eV/Å",
        report.iteration, report.evaluated, report.largest_max_force
    ));
}

//! # 收敛曲线
//!
//! 使用 `plotters` 绘制每个结构的收敛过程：
//! 左图为 E - E_final（eV），右图为 max|F|（eV/Å，对数坐标）。
//! 支持 PNG 和 SVG 输出，结构数不超过 10 时显示图例。
//!
//! ## 依赖关系
//! - 被 `commands/relax.rs` 调用
//! - 使用 `relax/collector.rs` 的 RelaxationResult
//! - 使用 `plotters` 渲染图表

use crate::error::{RelaxError, Result};
use crate::relax::RelaxationResult;

use plotters::prelude::*;
use std::path::Path;

const MAX_LEGEND_ENTRIES: usize = 10;
const FORCE_FLOOR: f64 = 1e-6;

/// 单个结构的曲线数据
struct Curve {
    name: String,
    energy: Vec<(f64, f64)>,
    force: Vec<(f64, f64)>,
}

fn curves(results: &[RelaxationResult]) -> Vec<Curve> {
    results
        .iter()
        .map(|r| {
            let e_final = r.energy_history.last().copied().unwrap_or(r.energy);
            Curve {
                name: r.structure.name.clone(),
                energy: r
                    .energy_history
                    .iter()
                    .enumerate()
                    .map(|(i, e)| ((i + 1) as f64, e - e_final))
                    .collect(),
                force: r
                    .fmax_history
                    .iter()
                    .enumerate()
                    .map(|(i, f)| ((i + 1) as f64, f.max(FORCE_FLOOR)))
                    .collect(),
            }
        })
        .collect()
}

/// (x_max, e_min, e_max, f_min, f_max)
fn ranges(curves: &[Curve]) -> (f64, f64, f64, f64, f64) {
    let x_max = curves
        .iter()
        .map(|c| c.energy.len())
        .max()
        .unwrap_or(1)
        .max(2) as f64;

    let (mut e_min, mut e_max) = curves
        .iter()
        .flat_map(|c| c.energy.iter().map(|(_, e)| *e))
        .fold((0.0f64, 0.0f64), |(lo, hi), e| (lo.min(e), hi.max(e)));
    if (e_max - e_min).abs() < 1e-12 {
        e_min -= 1e-3;
        e_max += 1e-3;
    }
    let pad = 0.05 * (e_max - e_min);

    let (f_min, f_max) = curves
        .iter()
        .flat_map(|c| c.force.iter().map(|(_, f)| *f))
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), f| (lo.min(f), hi.max(f)));
    let f_min = if f_min.is_finite() { f_min } else { FORCE_FLOOR };
    let f_max = f_max.max(f_min * 10.0);

    (x_max, e_min - pad, e_max + pad, f_min * 0.5, f_max * 2.0)
}

/// 生成收敛曲线图
pub fn generate_convergence_plot(
    results: &[RelaxationResult],
    output_path: &Path,
    title: &str,
    width: u32,
    height: u32,
    use_svg: bool,
) -> Result<()> {
    let data = curves(results);
    if use_svg {
        let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
        draw_convergence_chart(&root, &data, title)?;
        root.present()
            .map_err(|e| RelaxError::Other(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
        draw_convergence_chart(&root, &data, title)?;
        root.present()
            .map_err(|e| RelaxError::Other(e.to_string()))?;
    }
    Ok(())
}

fn draw_convergence_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    data: &[Curve],
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)
        .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;

    let root = root
        .titled(title, ("sans-serif", 28).into_font())
        .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;
    let panels = root.split_evenly((1, 2));
    let (left, right) = (&panels[0], &panels[1]);

    let (x_max, e_min, e_max, f_min, f_max) = ranges(data);
    let show_legend = data.len() <= MAX_LEGEND_ENTRIES;

    // 能量
    let mut energy_chart = ChartBuilder::on(left)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(1.0..x_max, e_min..e_max)
        .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;

    energy_chart
        .configure_mesh()
        .x_desc("Evaluation")
        .y_desc("E - E_final (eV)")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;

    for (i, curve) in data.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let series = energy_chart
            .draw_series(LineSeries::new(
                curve.energy.iter().copied(),
                color.stroke_width(2),
            ))
            .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;
        if show_legend {
            series
                .label(curve.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    if show_legend && !data.is_empty() {
        energy_chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 14))
            .draw()
            .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;
    }

    // 受力
    let mut force_chart = ChartBuilder::on(right)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(1.0..x_max, (f_min..f_max).log_scale())
        .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;

    force_chart
        .configure_mesh()
        .x_desc("Evaluation")
        .y_desc("max|F| (eV/Å)")
        .y_label_formatter(&|y| format!("{:.0e}", y))
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;

    for (i, curve) in data.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        force_chart
            .draw_series(LineSeries::new(
                curve.force.iter().copied(),
                color.stroke_width(2),
            ))
            .map_err(|e| RelaxError::Other(format!("{:?}", e)))?;
    }

    Ok(())
}

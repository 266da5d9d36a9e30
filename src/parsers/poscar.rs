//! # VASP POSCAR 格式解析器
//!
//! 解析 VASP POSCAR/CONTCAR 文件格式，selective dynamics 中三个方向
//! 均为 F 的原子记为固定原子。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1 [T T T]       # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `report/export.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{RelaxError, Result};
use crate::models::{elements, Lattice, Structure};
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    let err = |reason: String| RelaxError::ParseError {
        format: "poscar".to_string(),
        path: default_name.to_string(),
        reason,
    };

    if lines.len() < 8 {
        return Err(err("File too short".to_string()));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();
    let name = if name.is_empty() {
        default_name.to_string()
    } else {
        name
    };

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .trim()
        .parse()
        .map_err(|_| err(format!("Invalid scaling factor '{}'", lines[1].trim())))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for i in 0..3 {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(err(format!("Invalid lattice vector at line {}", 3 + i)));
        }
        matrix[i] = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols (VASP 5+)
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    if line5_parts.is_empty() || line5_parts[0].parse::<i32>().is_ok() {
        return Err(err(
            "VASP 4 format without element line is not supported".to_string(),
        ));
    }

    let mut species = Vec::with_capacity(line5_parts.len());
    for &symbol in &line5_parts {
        // 形如 "Fe_pv" 的 POTCAR 标签只取元素部分
        let z = elements::atomic_number(symbol.split(['_', '/']).next().unwrap_or(symbol))
            .ok_or_else(|| err(format!("Unknown element '{}'", symbol)))?;
        species.push(z);
    }

    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    if counts.len() != species.len() {
        return Err(err(format!(
            "{} element symbols but {} counts",
            species.len(),
            counts.len()
        )));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    let selective = lines[coord_line]
        .trim()
        .to_lowercase()
        .starts_with('s');
    if selective {
        coord_line += 1;
    }

    // Coordinate type line
    if lines.len() <= coord_line {
        return Err(err("Missing coordinate type line".to_string()));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let total: usize = counts.iter().sum();
    let mut numbers = Vec::with_capacity(total);
    let mut positions = Vec::with_capacity(total);
    let mut fixed = Vec::new();
    let mut line_idx = coord_line + 1;

    for (&z, &count) in species.iter().zip(counts.iter()) {
        for _ in 0..count {
            let line = lines
                .get(line_idx)
                .ok_or_else(|| err(format!("Expected {} atoms, file ends early", total)))?;
            let tokens: Vec<&str> = line.split_whitespace().collect();

            let parts: Vec<f64> = tokens
                .iter()
                .take(3)
                .filter_map(|s| s.parse().ok())
                .collect();
            if parts.len() < 3 {
                return Err(err(format!("Invalid position at line {}", line_idx + 1)));
            }

            let position = if is_cartesian {
                [parts[0] * scale, parts[1] * scale, parts[2] * scale]
            } else {
                lattice.frac_to_cart([parts[0], parts[1], parts[2]])
            };

            if selective {
                let frozen = tokens
                    .iter()
                    .skip(3)
                    .take(3)
                    .all(|t| t.eq_ignore_ascii_case("f"));
                fixed.push(frozen && tokens.len() >= 6);
            }

            numbers.push(z);
            positions.push(position);
            line_idx += 1;
        }
    }

    Ok(Structure::new(name, numbers, positions)?
        .with_cell(lattice, [true; 3])
        .with_fixed(fixed))
}

/// 将 Structure 转换为 POSCAR 格式字符串（笛卡尔坐标）
pub fn to_poscar_string(structure: &Structure) -> String {
    // 按元素首次出现顺序分组
    let mut elem_order: Vec<u8> = Vec::new();
    for &z in &structure.numbers {
        if !elem_order.contains(&z) {
            elem_order.push(z);
        }
    }

    let mut result = String::new();

    // Line 0: Comment
    result.push_str(&format!("{}\n", structure.name));

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice（非周期结构写一个包围盒，原子平移到盒中心）
    let (matrix, shift) = match &structure.cell {
        Some(cell) => (cell.matrix, [0.0; 3]),
        None => bounding_box(structure),
    };
    for row in &matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    // Line 5: Elements
    let symbols: Vec<&str> = elem_order
        .iter()
        .map(|&z| elements::symbol(z).unwrap_or("X"))
        .collect();
    result.push_str(&format!("   {}\n", symbols.join("   ")));

    // Line 6: Counts
    let counts: Vec<String> = elem_order
        .iter()
        .map(|z| structure.numbers.iter().filter(|n| *n == z).count().to_string())
        .collect();
    result.push_str(&format!("   {}\n", counts.join("   ")));

    let selective = !structure.fixed.is_empty();
    if selective {
        result.push_str("Selective dynamics\n");
    }
    result.push_str("Cartesian\n");

    for &z in &elem_order {
        for (a, pos) in structure.positions.iter().enumerate() {
            if structure.numbers[a] != z {
                continue;
            }
            result.push_str(&format!(
                "  {:16.10}  {:16.10}  {:16.10}",
                pos[0] + shift[0],
                pos[1] + shift[1],
                pos[2] + shift[2]
            ));
            if selective {
                let flag = if structure.fixed[a] { "F" } else { "T" };
                result.push_str(&format!("  {} {} {}", flag, flag, flag));
            }
            result.push('\n');
        }
    }

    result
}

/// 盒两侧各留出的真空层 (Å)
const VACUUM: f64 = 5.0;

/// 非周期结构的包围盒与使原子居中的平移量
fn bounding_box(structure: &Structure) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut extent = [0.0f64; 3];
    let mut shift = [0.0f64; 3];
    for k in 0..3 {
        let (lo, hi) = structure
            .positions
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[k]), hi.max(p[k]))
            });
        if lo.is_finite() {
            extent[k] = hi - lo + 2.0 * VACUUM;
            shift[k] = VACUUM - lo;
        } else {
            extent[k] = 2.0 * VACUUM;
        }
    }
    let matrix = [
        [extent[0], 0.0, 0.0],
        [0.0, extent[1], 0.0],
        [0.0, 0.0, extent[2]],
    ];
    (matrix, shift)
}

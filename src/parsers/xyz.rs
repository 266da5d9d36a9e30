//! # 扩展 XYZ 格式解析器
//!
//! 读写多帧（扩展）XYZ 文件，弛豫的主要输入输出格式，也用于轨迹。
//!
//! ## 格式说明
//! ```text
//! 2                                        # 原子数
//! Lattice="10 0 0 0 10 0 0 0 10" Properties=species:S:1:pos:R:3:forces:R:3 energy=-0.01 pbc="T T T"
//! Ar 0.0 0.0 0.0 0.01 0.0 0.0
//! Ar 3.8 0.0 0.0 -0.01 0.0 0.0
//! ```
//! - 无 `Properties` 时按 `species:S:1:pos:R:3` 处理（普通 XYZ）
//! - `move_mask:L:1`（或 L:3）为 F 的原子视为固定
//! - 其他未识别的列按声明的列数跳过
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `relax/trajectory.rs`, `report/export.rs` 使用
//! - 使用 `models/structure.rs`
//! - 使用 `regex` 解析注释行中的 key=value

use crate::error::{RelaxError, Result};
use crate::models::{elements, Lattice, Structure};

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_\-]*)=(?:"([^"]*)"|(\S+))"#).expect("valid regex")
});

/// 解析扩展 XYZ 文件（可能包含多帧）
pub fn parse_xyz_file(path: &Path) -> Result<Vec<Structure>> {
    let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_xyz_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析所有帧
pub fn parse_xyz_content(content: &str, default_name: &str) -> Result<Vec<Structure>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut frames = Vec::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        if lines[cursor].trim().is_empty() {
            cursor += 1;
            continue;
        }

        let frame_no = frames.len() + 1;
        let err = |reason: String| RelaxError::ParseError {
            format: "xyz".to_string(),
            path: default_name.to_string(),
            reason: format!("frame {}: {}", frame_no, reason),
        };

        let natoms: usize = lines[cursor]
            .trim()
            .parse()
            .map_err(|_| err(format!("invalid atom count '{}'", lines[cursor].trim())))?;

        if cursor + 2 + natoms > lines.len() {
            return Err(err(format!(
                "expected {} atom lines, file ends early",
                natoms
            )));
        }

        let comment = lines[cursor + 1];
        let atom_lines = &lines[cursor + 2..cursor + 2 + natoms];
        let structure = parse_frame(comment, atom_lines).map_err(err)?;
        frames.push(structure);
        cursor += 2 + natoms;
    }

    if frames.is_empty() {
        return Err(RelaxError::ParseError {
            format: "xyz".to_string(),
            path: default_name.to_string(),
            reason: "no frames found".to_string(),
        });
    }

    // 未命名帧按文件名编号
    let multi = frames.len() > 1;
    for (i, frame) in frames.iter_mut().enumerate() {
        if frame.name.is_empty() {
            frame.name = if multi {
                format!("{}_{}", default_name, i + 1)
            } else {
                default_name.to_string()
            };
        }
    }

    Ok(frames)
}

/// 列定义
#[derive(Debug)]
struct Column {
    name: String,
    kind: char,
    width: usize,
}

fn parse_properties(value: &str) -> std::result::Result<Vec<Column>, String> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(format!("malformed Properties '{}'", value));
    }

    parts
        .chunks(3)
        .map(|c| {
            let kind = c[1]
                .chars()
                .next()
                .map(|k| k.to_ascii_uppercase())
                .ok_or_else(|| format!("empty type for column '{}'", c[0]))?;
            let width: usize = c[2]
                .parse()
                .map_err(|_| format!("invalid width for column '{}'", c[0]))?;
            let name = c[0].to_lowercase();
            let expected = match name.as_str() {
                "species" => Some(1),
                "pos" | "forces" => Some(3),
                _ => None,
            };
            if width == 0 || expected.is_some_and(|w| w != width) {
                return Err(format!("invalid width {} for column '{}'", width, c[0]));
            }
            Ok(Column {
                name,
                kind,
                width,
            })
        })
        .collect()
}

fn parse_bool(token: &str) -> Option<bool> {
    match token.to_lowercase().as_str() {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_frame(comment: &str, atom_lines: &[&str]) -> std::result::Result<Structure, String> {
    let mut lattice = None;
    let mut pbc = None;
    let mut properties = "species:S:1:pos:R:3".to_string();
    let mut energy = None;
    let mut name = String::new();

    for cap in KEY_VALUE.captures_iter(comment) {
        let key = cap[1].to_lowercase();
        let value = cap
            .get(2)
            .or_else(|| cap.get(3))
            .map(|m| m.as_str())
            .unwrap_or("");

        match key.as_str() {
            "lattice" => {
                let v: Vec<f64> = value
                    .split_whitespace()
                    .map(|x| x.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| format!("invalid Lattice '{}'", value))?;
                if v.len() != 9 {
                    return Err(format!("Lattice needs 9 numbers, got {}", v.len()));
                }
                lattice = Some(Lattice::from_vectors([
                    [v[0], v[1], v[2]],
                    [v[3], v[4], v[5]],
                    [v[6], v[7], v[8]],
                ]));
            }
            "pbc" => {
                let flags: Vec<bool> = value.split_whitespace().filter_map(parse_bool).collect();
                if flags.len() != 3 {
                    return Err(format!("invalid pbc '{}'", value));
                }
                pbc = Some([flags[0], flags[1], flags[2]]);
            }
            "properties" => properties = value.to_string(),
            "energy" => {
                energy = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("invalid energy '{}'", value))?,
                )
            }
            "name" => name = value.to_string(),
            _ => {}
        }
    }

    let columns = parse_properties(&properties)?;
    if !columns.iter().any(|c| c.name == "species") || !columns.iter().any(|c| c.name == "pos") {
        return Err("Properties must contain species and pos".to_string());
    }

    let mut numbers = Vec::with_capacity(atom_lines.len());
    let mut positions = Vec::with_capacity(atom_lines.len());
    let mut forces = Vec::new();
    let mut fixed = Vec::new();

    for (a, line) in atom_lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut offset = 0;

        for column in &columns {
            if offset + column.width > tokens.len() {
                return Err(format!("atom line {} has too few columns", a + 1));
            }
            let fields = &tokens[offset..offset + column.width];
            offset += column.width;

            let reals = || -> std::result::Result<[f64; 3], String> {
                if fields.len() != 3 {
                    return Err(format!("column '{}' must have 3 entries", column.name));
                }
                let mut v = [0.0; 3];
                for (k, f) in fields.iter().enumerate() {
                    v[k] = f
                        .parse()
                        .map_err(|_| format!("atom line {}: invalid number '{}'", a + 1, f))?;
                }
                Ok(v)
            };

            match (column.name.as_str(), column.kind) {
                ("species", _) => {
                    let token = fields[0];
                    let z = token
                        .parse::<u8>()
                        .ok()
                        .filter(|&z| elements::symbol(z).is_some())
                        .or_else(|| elements::atomic_number(token))
                        .ok_or_else(|| format!("unknown species '{}'", token))?;
                    numbers.push(z);
                }
                ("pos", _) => positions.push(reals()?),
                ("forces", _) => forces.push(reals()?),
                ("move_mask", 'L') => {
                    let movable: Vec<bool> = fields.iter().filter_map(|f| parse_bool(f)).collect();
                    if movable.len() != fields.len() {
                        return Err(format!("atom line {}: invalid move_mask", a + 1));
                    }
                    fixed.push(movable.iter().all(|&m| !m));
                }
                _ => {}
            }
        }
    }

    let pbc = pbc.unwrap_or(if lattice.is_some() { [true; 3] } else { [false; 3] });

    let mut structure = Structure::new(name, numbers, positions).map_err(|e| e.to_string())?;
    if let Some(lattice) = lattice {
        structure = structure.with_cell(lattice, pbc);
    } else if pbc.iter().any(|&p| p) {
        return Err("pbc set without Lattice".to_string());
    }
    structure.fixed = fixed;
    structure.energy = energy;
    if !forces.is_empty() {
        structure.forces = Some(forces);
    }
    structure.validate().map_err(|e| e.to_string())?;

    Ok(structure)
}

fn flag(b: bool) -> &'static str {
    if b {
        "T"
    } else {
        "F"
    }
}

/// 生成单帧扩展 XYZ 文本，`extra` 为附加到注释行的 key=value
pub fn format_frame(structure: &Structure, extra: &[(&str, String)]) -> String {
    let mut properties = String::from("species:S:1:pos:R:3");
    if structure.forces.is_some() {
        properties.push_str(":forces:R:3");
    }
    if !structure.fixed.is_empty() {
        properties.push_str(":move_mask:L:1");
    }

    let mut header = Vec::new();
    if let Some(cell) = &structure.cell {
        let values: Vec<String> = cell
            .matrix
            .iter()
            .flat_map(|row| row.iter().map(|x| format!("{:.10}", x)))
            .collect();
        header.push(format!("Lattice=\"{}\"", values.join(" ")));
    }
    header.push(format!("Properties={}", properties));
    if let Some(energy) = structure.energy {
        header.push(format!("energy={:.10}", energy));
    }
    header.push(format!(
        "pbc=\"{} {} {}\"",
        flag(structure.pbc[0]),
        flag(structure.pbc[1]),
        flag(structure.pbc[2])
    ));
    if !structure.name.is_empty() {
        header.push(format!("name=\"{}\"", structure.name.replace('"', "'")));
    }
    for (key, value) in extra {
        header.push(format!("{}={}", key, value));
    }

    let mut result = String::new();
    result.push_str(&format!("{}\n", structure.natoms()));
    result.push_str(&header.join(" "));
    result.push('\n');

    let symbols = structure.symbols();
    for (a, pos) in structure.positions.iter().enumerate() {
        result.push_str(&format!(
            "{:<3} {:16.10} {:16.10} {:16.10}",
            symbols[a], pos[0], pos[1], pos[2]
        ));
        if let Some(forces) = &structure.forces {
            let f = forces[a];
            result.push_str(&format!(" {:16.10} {:16.10} {:16.10}", f[0], f[1], f[2]));
        }
        if !structure.fixed.is_empty() {
            result.push_str(&format!(" {}", flag(!structure.fixed[a])));
        }
        result.push('\n');
    }

    result
}

/// 将多个结构写为多帧扩展 XYZ 文本
pub fn to_xyz_string(structures: &[Structure]) -> String {
    structures.iter().map(|s| format_frame(s, &[])).collect()
}

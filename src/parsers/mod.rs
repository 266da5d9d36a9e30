//! # 解析器模块
//!
//! 提供结构文件的读写：扩展 XYZ（多帧）与 VASP POSCAR/CONTCAR。
//!
//! ## 依赖关系
//! - 被 `commands/`, `relax/trajectory.rs`, `report/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: xyz, poscar

pub mod poscar;
pub mod xyz;

use crate::error::{RelaxError, Result};
use crate::models::{Structure, StructureBatch};
use std::fs;
use std::path::{Path, PathBuf};

/// 结构文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Xyz,
    Poscar,
}

/// 从文件路径推断格式
pub fn detect_format(path: &Path) -> Result<StructureFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xyz" | "extxyz" => Ok(StructureFormat::Xyz),
        "vasp" | "poscar" => Ok(StructureFormat::Poscar),
        _ => {
            // 可能是 POSCAR/CONTCAR (无扩展名)
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                    return Ok(StructureFormat::Poscar);
                }
            }
            Err(RelaxError::UnsupportedFormat(format!(
                "Cannot determine format for: {}",
                path.display()
            )))
        }
    }
}

/// 读取单个文件中的全部结构
pub fn parse_structure_file(path: &Path) -> Result<Vec<Structure>> {
    if !path.exists() {
        return Err(RelaxError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    match detect_format(path)? {
        StructureFormat::Xyz => xyz::parse_xyz_file(path),
        StructureFormat::Poscar => Ok(vec![poscar::parse_poscar_file(path)?]),
    }
}

/// 按给定顺序读取多个文件，组成一个批次
pub fn load_batch(files: &[PathBuf]) -> Result<StructureBatch> {
    let mut structures = Vec::new();
    for file in files {
        structures.extend(parse_structure_file(file)?);
    }
    StructureBatch::new(structures)
}

/// 写成 POSCAR 会丢失非周期边界（读回时三个方向均为周期性）
pub fn loses_open_boundaries(path: &Path, structures: &[Structure]) -> bool {
    matches!(detect_format(path), Ok(StructureFormat::Poscar))
        && structures.iter().any(|s| s.pbc != [true; 3])
}

/// 按扩展名写出结构；POSCAR 只能容纳单个结构
pub fn write_structures(path: &Path, structures: &[Structure]) -> Result<()> {
    let content = match detect_format(path)? {
        StructureFormat::Xyz => xyz::to_xyz_string(structures),
        StructureFormat::Poscar => match structures {
            [single] => poscar::to_poscar_string(single),
            _ => {
                return Err(RelaxError::Configuration(format!(
                    "POSCAR output holds one structure, got {}; use .xyz instead",
                    structures.len()
                )))
            }
        },
    };

    fs::write(path, content).map_err(|e| RelaxError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

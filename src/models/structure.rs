//! # 原子结构数据模型
//!
//! 定义弛豫使用的结构表示：笛卡尔坐标、原子序数、可选晶胞与周期性。
//! 原子顺序在整个弛豫过程中保持不变。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `forcefield/`, `relax/` 使用
//! - 使用 `models/elements.rs` 进行元素符号转换

use crate::error::{RelaxError, Result};
use crate::models::elements;
use serde::{Deserialize, Serialize};

/// 晶格表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 正交晶胞
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]])
    }

    /// 计算晶格体积（带符号）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        dot(a, cross(b, c))
    }

    /// 三个方向上的晶面间距（体积 / 对应晶面面积）
    ///
    /// 近邻搜索用它决定每个周期方向需要的镜像数目。
    pub fn heights(&self) -> [f64; 3] {
        let [a, b, c] = self.matrix;
        let volume = self.volume().abs();
        [
            volume / norm(cross(b, c)),
            volume / norm(cross(c, a)),
            volume / norm(cross(a, b)),
        ]
    }

    /// 逆矩阵；晶胞退化时返回 None
    pub fn inverse(&self) -> Option<[[f64; 3]; 3]> {
        let m = self.matrix;
        let det = self.volume();
        if det.abs() < 1e-10 {
            return None;
        }

        Some([
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ])
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// 笛卡尔坐标转分数坐标
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        // frac = cart · M⁻¹ (行向量约定)
        let inv = self.inverse()?;
        Some([
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ])
    }

    /// 按比例缩放（单位换算时使用）
    pub fn scaled(&self, factor: f64) -> Self {
        let mut matrix = self.matrix;
        for row in matrix.iter_mut() {
            for x in row.iter_mut() {
                *x *= factor;
            }
        }
        Lattice { matrix }
    }
}

/// 单个原子结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 结构名称
    pub name: String,

    /// 原子序数
    pub numbers: Vec<u8>,

    /// 笛卡尔坐标 (Å)
    pub positions: Vec<[f64; 3]>,

    /// 晶胞
    pub cell: Option<Lattice>,

    /// 周期性边界条件
    pub pbc: [bool; 3],

    /// 文件中声明的固定原子（POSCAR selective dynamics / move_mask），为空表示无
    pub fixed: Vec<bool>,

    /// 能量 (eV)
    pub energy: Option<f64>,

    /// 力 (eV/Å)
    pub forces: Option<Vec<[f64; 3]>>,
}

impl Structure {
    /// 创建非周期结构，原子序数与坐标行数必须一致
    pub fn new(
        name: impl Into<String>,
        numbers: Vec<u8>,
        positions: Vec<[f64; 3]>,
    ) -> Result<Self> {
        let structure = Structure {
            name: name.into(),
            numbers,
            positions,
            cell: None,
            pbc: [false; 3],
            fixed: Vec::new(),
            energy: None,
            forces: None,
        };
        structure.validate()?;
        Ok(structure)
    }

    /// 从元素符号创建
    pub fn from_symbols(
        name: impl Into<String>,
        symbols: &[&str],
        positions: Vec<[f64; 3]>,
    ) -> Result<Self> {
        let numbers = symbols
            .iter()
            .map(|s| {
                elements::atomic_number(s)
                    .ok_or_else(|| RelaxError::InvalidStructure(format!("Unknown element '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        Structure::new(name, numbers, positions)
    }

    /// 设置晶胞与周期性
    pub fn with_cell(mut self, cell: Lattice, pbc: [bool; 3]) -> Self {
        self.cell = Some(cell);
        self.pbc = pbc;
        self
    }

    /// 设置固定原子标记
    pub fn with_fixed(mut self, fixed: Vec<bool>) -> Self {
        self.fixed = fixed;
        self
    }

    /// 原子数
    pub fn natoms(&self) -> usize {
        self.positions.len()
    }

    /// 是否存在任一周期方向
    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().any(|&p| p)
    }

    /// 元素符号列表
    pub fn symbols(&self) -> Vec<&'static str> {
        self.numbers
            .iter()
            .map(|&z| elements::symbol(z).unwrap_or("X"))
            .collect()
    }

    /// 检查结构不变量
    pub fn validate(&self) -> Result<()> {
        if self.numbers.len() != self.positions.len() {
            return Err(RelaxError::InvalidStructure(format!(
                "'{}': {} species but {} position rows",
                self.name,
                self.numbers.len(),
                self.positions.len()
            )));
        }

        if !self.fixed.is_empty() && self.fixed.len() != self.positions.len() {
            return Err(RelaxError::InvalidStructure(format!(
                "'{}': {} fixed flags for {} atoms",
                self.name,
                self.fixed.len(),
                self.positions.len()
            )));
        }

        if self.is_periodic() && self.cell.is_none() {
            return Err(RelaxError::InvalidStructure(format!(
                "'{}': periodic boundary conditions require a cell",
                self.name
            )));
        }

        if let Some(forces) = &self.forces {
            if forces.len() != self.positions.len() {
                return Err(RelaxError::InvalidStructure(format!(
                    "'{}': {} force rows for {} atoms",
                    self.name,
                    forces.len(),
                    self.positions.len()
                )));
            }
        }

        Ok(())
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for symbol in self.symbols() {
            *counts.entry(symbol).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// 有序结构批次；插入顺序即迭代与报告顺序
#[derive(Debug, Clone, Default)]
pub struct StructureBatch {
    structures: Vec<Structure>,
}

impl StructureBatch {
    /// 创建批次并检查每个结构
    pub fn new(structures: Vec<Structure>) -> Result<Self> {
        for structure in &structures {
            structure.validate()?;
        }
        Ok(StructureBatch { structures })
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Structure> {
        self.structures.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Structure> {
        self.structures.get(index)
    }

    pub fn into_inner(self) -> Vec<Structure> {
        self.structures
    }

    /// 若所有结构原子数相同则返回该原子数
    pub fn uniform_natoms(&self) -> Option<usize> {
        let first = self.structures.first()?.natoms();
        self.structures
            .iter()
            .all(|s| s.natoms() == first)
            .then_some(first)
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

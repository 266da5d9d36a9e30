//! # 近邻列表
//!
//! 在截断半径内构建完整（双向）近邻列表，沿周期方向包含镜像原子。
//!
//! ## 算法
//! 1. 沿周期方向把坐标折回晶胞内（分数坐标取 [0, 1)）
//! 2. 由晶面间距计算每个周期方向需要的镜像数 n_k = ceil(r_c / h_k)
//! 3. 遍历所有 (i, j, 平移) 组合，跳过 i == j 且平移为零
//! 4. 保留距离小于截断半径的原子对
//!
//! 复杂度 O(N² · 镜像数)，适合分子与小晶胞。
//!
//! ## 依赖关系
//! - 被 `forcefield/mod.rs` 调用
//! - 使用 `models/structure.rs` 的 Lattice

use crate::models::Lattice;

/// 一条近邻记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 中心原子
    pub i: usize,
    /// 近邻原子
    pub j: usize,
    /// r_i - (r_j + 平移)
    pub vector: [f64; 3],
    /// |vector|
    pub distance: f64,
}

/// 完整近邻列表：每个原子对出现两次 (i, j) 与 (j, i)
#[derive(Debug, Clone, Default)]
pub struct NeighborList {
    pub pairs: Vec<Neighbor>,
    /// 每个原子的近邻数
    pub counts: Vec<usize>,
}

impl NeighborList {
    /// 构建近邻列表
    pub fn build(
        positions: &[[f64; 3]],
        cell: Option<&Lattice>,
        pbc: [bool; 3],
        cutoff: f64,
    ) -> Self {
        let n = positions.len();
        let positions = wrap_positions(positions, cell, pbc);
        let shifts = image_shifts(cell, pbc, cutoff);
        let cutoff_sq = cutoff * cutoff;

        let mut pairs = Vec::new();
        let mut counts = vec![0usize; n];

        for i in 0..n {
            for j in 0..n {
                for shift in &shifts {
                    if i == j && shift.iter().all(|&x| x == 0.0) {
                        continue;
                    }

                    let vector = [
                        positions[i][0] - positions[j][0] - shift[0],
                        positions[i][1] - positions[j][1] - shift[1],
                        positions[i][2] - positions[j][2] - shift[2],
                    ];
                    let d2 = vector[0] * vector[0] + vector[1] * vector[1] + vector[2] * vector[2];

                    if d2 < cutoff_sq {
                        pairs.push(Neighbor {
                            i,
                            j,
                            vector,
                            distance: d2.sqrt(),
                        });
                        counts[i] += 1;
                    }
                }
            }
        }

        NeighborList { pairs, counts }
    }

    /// 第一个没有任何近邻的原子
    pub fn first_isolated(&self) -> Option<usize> {
        self.counts.iter().position(|&c| c == 0)
    }
}

/// 周期方向上折回晶胞；晶胞退化时保持原坐标
fn wrap_positions(positions: &[[f64; 3]], cell: Option<&Lattice>, pbc: [bool; 3]) -> Vec<[f64; 3]> {
    let cell = match cell {
        Some(cell) if pbc.iter().any(|&p| p) => cell,
        _ => return positions.to_vec(),
    };

    positions
        .iter()
        .map(|&p| match cell.cart_to_frac(p) {
            Some(mut frac) => {
                for k in 0..3 {
                    if pbc[k] {
                        frac[k] -= frac[k].floor();
                    }
                }
                cell.frac_to_cart(frac)
            }
            None => p,
        })
        .collect()
}

/// 需要考虑的镜像平移向量（含零平移）
fn image_shifts(cell: Option<&Lattice>, pbc: [bool; 3], cutoff: f64) -> Vec<[f64; 3]> {
    let cell = match cell {
        Some(cell) if pbc.iter().any(|&p| p) => cell,
        _ => return vec![[0.0; 3]],
    };

    let heights = cell.heights();
    let mut reps = [0i32; 3];
    for k in 0..3 {
        if pbc[k] && heights[k] > 0.0 {
            reps[k] = (cutoff / heights[k]).ceil() as i32;
        }
    }

    let mut shifts = Vec::new();
    for a in -reps[0]..=reps[0] {
        for b in -reps[1]..=reps[1] {
            for c in -reps[2]..=reps[2] {
                shifts.push(cell.frac_to_cart([a as f64, b as f64, c as f64]));
            }
        }
    }
    shifts
}

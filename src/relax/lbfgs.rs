//! # L-BFGS 步长计算
//!
//! 每个结构持有独立的历史缓冲区，结构之间没有任何耦合。
//! 每次迭代只需要一次能量/受力计算，因此适合批量驱动。
//!
//! ## 算法
//! 1. 用上一步的 (s, y) 更新历史，y·s <= 1e-10 的曲率对被丢弃
//! 2. 双循环递推计算 d = -H·g，初始逆 Hessian 取常数 1/alpha
//! 3. 若 d 不是下降方向（d·F <= 0），清空历史改用最速下降
//! 4. 步长乘以 damping，并缩放使任一原子位移不超过 maxstep
//!
//! 参考: Nocedal & Wright, "Numerical Optimization", Algorithm 7.4
//!
//! ## 依赖关系
//! - 被 `relax/driver.rs` 使用
//! - 无外部模块依赖

use crate::error::{RelaxError, Result};
use serde::Deserialize;
use std::collections::VecDeque;

/// L-BFGS 参数
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LbfgsParams {
    /// 保存的 (s, y) 对数目
    pub memory: usize,
    /// 单个原子单步最大位移 (Å)
    pub maxstep: f64,
    /// 初始 Hessian 猜测 (eV/Å²)
    pub alpha: f64,
    /// 步长阻尼系数
    pub damping: f64,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        LbfgsParams {
            memory: 100,
            maxstep: 0.2,
            alpha: 70.0,
            damping: 1.0,
        }
    }
}

impl LbfgsParams {
    /// 检查参数
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(RelaxError::Configuration(format!(
                    "lbfgs.{} must be positive, got {}",
                    name, v
                )))
            }
        };

        if self.memory == 0 {
            return Err(RelaxError::Configuration(
                "lbfgs.memory must be at least 1".to_string(),
            ));
        }
        positive("maxstep", self.maxstep)?;
        positive("alpha", self.alpha)?;
        positive("damping", self.damping)
    }
}

/// 单个结构的 L-BFGS 状态
#[derive(Debug, Clone)]
pub struct Lbfgs {
    params: LbfgsParams,
    s: VecDeque<Vec<f64>>,
    y: VecDeque<Vec<f64>>,
    rho: VecDeque<f64>,
    /// 上一次调用时的坐标与受力
    previous: Option<(Vec<f64>, Vec<f64>)>,
}

impl Lbfgs {
    pub fn new(params: LbfgsParams) -> Self {
        Lbfgs {
            params,
            s: VecDeque::new(),
            y: VecDeque::new(),
            rho: VecDeque::new(),
            previous: None,
        }
    }

    /// 由当前坐标与（已施加约束的）受力计算位移
    ///
    /// `positions` 与 `forces` 为展平的 3N 数组；`frozen` 为每个原子的冻结标记，
    /// 冻结原子的位移恒为零。
    pub fn step(&mut self, positions: &[f64], forces: &[f64], frozen: &[bool]) -> Vec<f64> {
        let n = positions.len();
        self.update_history(positions, forces);

        // q = g = -F
        let mut d: Vec<f64> = forces.iter().map(|f| -f).collect();
        let k = self.s.len();
        let mut alphas = vec![0.0; k];

        // First loop: most recent to oldest.
        for i in (0..k).rev() {
            alphas[i] = self.rho[i] * dot(&self.s[i], &d);
            axpy(-alphas[i], &self.y[i], &mut d);
        }

        let h0 = 1.0 / self.params.alpha;
        for x in d.iter_mut() {
            *x *= h0;
        }

        // Second loop: oldest to most recent.
        for i in 0..k {
            let beta = self.rho[i] * dot(&self.y[i], &d);
            axpy(alphas[i] - beta, &self.s[i], &mut d);
        }

        // d = -H·g
        for x in d.iter_mut() {
            *x = -*x;
        }
        zero_frozen(&mut d, frozen);

        if k > 0 && dot(&d, forces) <= 0.0 {
            self.reset();
            d = forces.iter().map(|f| f * h0).collect();
            zero_frozen(&mut d, frozen);
        }

        for x in d.iter_mut() {
            *x *= self.params.damping;
        }

        let longest = max_atom_displacement(&d);
        if longest > self.params.maxstep {
            let scale = self.params.maxstep / longest;
            for x in d.iter_mut() {
                *x *= scale;
            }
        }

        debug_assert_eq!(d.len(), n);
        self.previous = Some((positions.to_vec(), forces.to_vec()));
        d
    }

    fn update_history(&mut self, positions: &[f64], forces: &[f64]) {
        let Some((r0, f0)) = self.previous.take() else {
            return;
        };

        let s: Vec<f64> = positions.iter().zip(&r0).map(|(r, r0)| r - r0).collect();
        // y = g - g0 = f0 - f
        let y: Vec<f64> = f0.iter().zip(forces).map(|(f0, f)| f0 - f).collect();
        let sy = dot(&s, &y);

        if sy > 1e-10 {
            if self.s.len() == self.params.memory {
                self.s.pop_front();
                self.y.pop_front();
                self.rho.pop_front();
            }
            self.s.push_back(s);
            self.y.push_back(y);
            self.rho.push_back(1.0 / sy);
        }
    }

    fn reset(&mut self) {
        self.s.clear();
        self.y.clear();
        self.rho.clear();
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// y += a·x
fn axpy(a: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

fn zero_frozen(d: &mut [f64], frozen: &[bool]) {
    for (atom, chunk) in d.chunks_exact_mut(3).enumerate() {
        if frozen.get(atom).copied().unwrap_or(false) {
            chunk.fill(0.0);
        }
    }
}

/// 最大单原子位移
fn max_atom_displacement(d: &[f64]) -> f64 {
    d.chunks_exact(3)
        .map(|c| (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt())
        .fold(0.0, f64::max)
}

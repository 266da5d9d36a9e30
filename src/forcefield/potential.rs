//! # 对势模型
//!
//! 提供 Lennard-Jones 与 Morse 对势，参数按元素给出，异种原子对按混合规则组合。
//!
//! ## 公式
//! - Lennard-Jones: φ(r) = 4ε[(σ/r)¹² − (σ/r)⁶]
//!   混合: σ_ij = (σ_i + σ_j)/2, ε_ij = √(ε_i ε_j)
//! - Morse: φ(r) = D[e^{−2α(r−r₀)} − 2e^{−α(r−r₀)}]
//!   混合: D_ij = √(D_i D_j), α_ij = (α_i + α_j)/2, r₀_ij = (r₀_i + r₀_j)/2
//!
//! 每个原子对的能量都减去 φ(r_c)，使其在截断处为零。
//!
//! ## 模型文件 (TOML)
//! ```text
//! name = "argon"
//! potential = "lennard-jones"
//!
//! [species.Ar]
//! epsilon = 0.0104
//! sigma = 3.40
//! ```
//!
//! ## 依赖关系
//! - 被 `forcefield/mod.rs` 使用
//! - 使用 `models/elements.rs` 解析元素符号
//! - 使用 `toml` + `serde` 读取模型文件

use crate::error::{RelaxError, Result};
use crate::models::elements;

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// 对势类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PotentialKind {
    LennardJones,
    Morse,
}

impl std::fmt::Display for PotentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PotentialKind::LennardJones => write!(f, "lennard-jones"),
            PotentialKind::Morse => write!(f, "morse"),
        }
    }
}

/// 单个元素的参数（按势类型取用其中的字段）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesParams {
    pub epsilon: Option<f64>,
    pub sigma: Option<f64>,
    pub depth: Option<f64>,
    pub alpha: Option<f64>,
    pub r0: Option<f64>,
}

/// 模型文件内容
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    #[serde(default)]
    pub name: Option<String>,
    pub potential: PotentialKind,
    pub species: BTreeMap<String, SpeciesParams>,
}

impl ModelFile {
    /// 读取 TOML 模型文件
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RelaxError::Configuration(format!(
                "Model '{}' is neither a built-in model nor an existing file",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            RelaxError::Configuration(reason) => {
                RelaxError::Configuration(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// 从 TOML 字符串解析
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RelaxError::Configuration(format!("Invalid model file: {}", e)))
    }
}

/// 单个原子对的参数
#[derive(Debug, Clone, Copy, PartialEq)]
enum PairParams {
    LennardJones { epsilon: f64, sigma: f64 },
    Morse { depth: f64, alpha: f64, r0: f64 },
}

impl PairParams {
    /// 返回 (φ(r), dφ/dr)
    fn evaluate(&self, r: f64) -> (f64, f64) {
        match *self {
            PairParams::LennardJones { epsilon, sigma } => {
                let s6 = (sigma / r).powi(6);
                let s12 = s6 * s6;
                let energy = 4.0 * epsilon * (s12 - s6);
                let derivative = -24.0 * epsilon * (2.0 * s12 - s6) / r;
                (energy, derivative)
            }
            PairParams::Morse { depth, alpha, r0 } => {
                let e = (-alpha * (r - r0)).exp();
                let energy = depth * (e * e - 2.0 * e);
                let derivative = 2.0 * alpha * depth * (e - e * e);
                (energy, derivative)
            }
        }
    }
}

/// 编译后的对势：原子序数对 -> 参数与截断能量
#[derive(Debug, Clone)]
pub struct PairPotential {
    name: String,
    kind: PotentialKind,
    species: BTreeMap<u8, SpeciesParams>,
    pairs: HashMap<(u8, u8), (PairParams, f64)>,
    cutoff: f64,
}

impl PairPotential {
    /// 由模型文件与截断半径（模型长度单位）构建
    pub fn from_model(model: &ModelFile, cutoff: f64) -> Result<Self> {
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(RelaxError::Configuration(format!(
                "neighbor_cutoff must be a positive number, got {}",
                cutoff
            )));
        }

        let mut species = BTreeMap::new();
        for (symbol, params) in &model.species {
            let z = elements::atomic_number(symbol).ok_or_else(|| {
                RelaxError::Configuration(format!("Unknown element '{}' in model file", symbol))
            })?;
            check_species(model.potential, symbol, params)?;
            species.insert(z, params.clone());
        }

        if species.is_empty() {
            return Err(RelaxError::Configuration(
                "Model file defines no species".to_string(),
            ));
        }

        let mut pairs = HashMap::new();
        for (&zi, pi) in &species {
            for (&zj, pj) in &species {
                let params = mix(model.potential, pi, pj);
                let (shift, _) = params.evaluate(cutoff);
                pairs.insert((zi, zj), (params, shift));
            }
        }

        Ok(PairPotential {
            name: model
                .name
                .clone()
                .unwrap_or_else(|| model.potential.to_string()),
            kind: model.potential,
            species,
            pairs,
            cutoff,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PotentialKind {
        self.kind
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// 模型是否包含该元素
    pub fn supports(&self, number: u8) -> bool {
        self.species.contains_key(&number)
    }

    /// 返回截断平移后的 (φ(r) − φ(r_c), dφ/dr)
    pub fn pair(&self, zi: u8, zj: u8, r: f64) -> Option<(f64, f64)> {
        let (params, shift) = self.pairs.get(&(zi, zj))?;
        let (energy, derivative) = params.evaluate(r);
        Some((energy - shift, derivative))
    }
}

/// 检查势类型所需参数是否齐全
fn check_species(kind: PotentialKind, symbol: &str, params: &SpeciesParams) -> Result<()> {
    let required: &[(&str, Option<f64>)] = match kind {
        PotentialKind::LennardJones => &[("epsilon", params.epsilon), ("sigma", params.sigma)],
        PotentialKind::Morse => &[
            ("depth", params.depth),
            ("alpha", params.alpha),
            ("r0", params.r0),
        ],
    };

    for (field, value) in required {
        match value {
            Some(v) if v.is_finite() && *v > 0.0 => {}
            Some(v) => {
                return Err(RelaxError::Configuration(format!(
                    "species {}: {} must be positive, got {}",
                    symbol, field, v
                )))
            }
            None => {
                return Err(RelaxError::Configuration(format!(
                    "species {}: missing '{}' for {} potential",
                    symbol, field, kind
                )))
            }
        }
    }
    Ok(())
}

/// 混合规则（参数已由 check_species 保证存在）
fn mix(kind: PotentialKind, a: &SpeciesParams, b: &SpeciesParams) -> PairParams {
    let get = |v: Option<f64>| v.unwrap_or(0.0);
    match kind {
        PotentialKind::LennardJones => PairParams::LennardJones {
            epsilon: (get(a.epsilon) * get(b.epsilon)).sqrt(),
            sigma: 0.5 * (get(a.sigma) + get(b.sigma)),
        },
        PotentialKind::Morse => PairParams::Morse {
            depth: (get(a.depth) * get(b.depth)).sqrt(),
            alpha: 0.5 * (get(a.alpha) + get(b.alpha)),
            r0: 0.5 * (get(a.r0) + get(b.r0)),
        },
    }
}

// ─────────────────────────────────────────────────────────────
// 内置模型（eV, Å）
// ─────────────────────────────────────────────────────────────

/// 内置模型名称
pub const BUILTIN_MODELS: &[&str] = &["lj-argon", "lj-neon", "morse-copper"];

/// 按名称查找内置模型
pub fn builtin_model(name: &str) -> Option<ModelFile> {
    let (potential, symbol, params) = match name.to_lowercase().as_str() {
        "lj-argon" => (
            PotentialKind::LennardJones,
            "Ar",
            SpeciesParams {
                epsilon: Some(0.0104),
                sigma: Some(3.40),
                ..Default::default()
            },
        ),
        "lj-neon" => (
            PotentialKind::LennardJones,
            "Ne",
            SpeciesParams {
                epsilon: Some(0.0031),
                sigma: Some(2.74),
                ..Default::default()
            },
        ),
        // Girifalco & Weizer (1959)
        "morse-copper" => (
            PotentialKind::Morse,
            "Cu",
            SpeciesParams {
                depth: Some(0.3429),
                alpha: Some(1.3588),
                r0: Some(2.866),
                ..Default::default()
            },
        ),
        _ => return None,
    };

    let mut species = BTreeMap::new();
    species.insert(symbol.to_string(), params);
    Some(ModelFile {
        name: Some(name.to_lowercase()),
        potential,
        species,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argon() -> PairPotential {
        PairPotential::from_model(&builtin_model("lj-argon").unwrap(), 8.5).unwrap()
    }

    #[test]
    fn test_lj_minimum_has_zero_derivative() {
        let pot = argon();
        let r_min = 2f64.powf(1.0 / 6.0) * 3.40;
        let (_, d) = pot.pair(18, 18, r_min).unwrap();
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn test_energy_shifted_to_zero_at_cutoff() {
        let pot = argon();
        let (e, _) = pot.pair(18, 18, 8.5).unwrap();
        assert!(e.abs() < 1e-15);
    }

    #[test]
    fn test_morse_derivative_matches_finite_difference() {
        let pot =
            PairPotential::from_model(&builtin_model("morse-copper").unwrap(), 6.0).unwrap();
        let r = 2.5;
        let h = 1e-6;
        let (_, d) = pot.pair(29, 29, r).unwrap();
        let (ep, _) = pot.pair(29, 29, r + h).unwrap();
        let (em, _) = pot.pair(29, 29, r - h).unwrap();
        assert!((d - (ep - em) / (2.0 * h)).abs() < 1e-6);
    }

    #[test]
    fn test_mixing_rules() {
        let model = ModelFile::from_toml(
            r#"
potential = "lennard-jones"

[species.Ar]
epsilon = 0.0104
sigma = 3.40

[species.Ne]
epsilon = 0.0031
sigma = 2.74
"#,
        )
        .unwrap();
        let pot = PairPotential::from_model(&model, 10.0).unwrap();

        let sigma = 0.5 * (3.40 + 2.74);
        let r_min = 2f64.powf(1.0 / 6.0) * sigma;
        let (_, d) = pot.pair(18, 10, r_min).unwrap();
        assert!(d.abs() < 1e-12);
        assert!(pot.supports(10));
        assert!(!pot.supports(29));
    }

    #[test]
    fn test_missing_parameter_rejected() {
        let model = ModelFile::from_toml(
            r#"
potential = "morse"

[species.Cu]
depth = 0.34
alpha = 1.36
"#,
        )
        .unwrap();
        let err = PairPotential::from_model(&model, 6.0).unwrap_err();
        assert!(err.to_string().contains("r0"));
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let model = builtin_model("lj-neon").unwrap();
        assert!(PairPotential::from_model(&model, 0.0).is_err());
        assert!(PairPotential::from_model(&model, f64::NAN).is_err());
    }

    #[test]
    fn test_unknown_potential_kind_rejected() {
        let result = ModelFile::from_toml("potential = \"buckingham\"\n[species.O]\n");
        assert!(result.is_err());
    }
}

//! # 力场计算模块
//!
//! 批量计算结构的能量与受力。驱动器每次迭代只调用一次 `evaluate`，
//! 传入当前仍在弛豫的全部结构。
//!
//! ## 单位约定
//! - 输入坐标为 Å，按 `position_unit` 换算为模型长度单位
//! - 模型原始能量乘以 `energy_unit` 因子得到 eV
//! - 原始受力乘以 能量因子/长度因子 得到 eV/Å
//! - `neighbor_cutoff` 使用模型长度单位
//!
//! ## 依赖关系
//! - 被 `relax/driver.rs`, `commands/` 使用
//! - 子模块: neighbors, potential
//! - 使用 `rayon` 在结构之间并行

pub mod neighbors;
pub mod potential;

use crate::error::{RelaxError, Result};
use crate::models::{elements, EnergyUnit, LengthUnit, Structure};
use neighbors::NeighborList;
use potential::{builtin_model, ModelFile, PairPotential};

use rayon::prelude::*;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// 单个结构的计算结果
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// 能量 (eV)
    pub energy: f64,
    /// 受力 (eV/Å)，形状与坐标一致
    pub forces: Vec<[f64; 3]>,
}

/// 批量能量/受力计算接口
///
/// 返回值与输入一一对应且顺序相同。任何结构无法转换为模型输入时返回
/// `RelaxError::ModelInput`，其中 `index` 是该结构在本次输入切片中的位置。
pub trait BatchEvaluator {
    fn evaluate(&self, batch: &[&Structure]) -> Result<Vec<Evaluation>>;
}

/// 计算设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Device {
    /// 单线程
    #[default]
    Cpu,
    /// rayon 线程池，0 = 全部核心
    Parallel(usize),
}

impl FromStr for Device {
    type Err = RelaxError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.split_once(':') {
            None if s == "cpu" => Ok(Device::Cpu),
            None if s == "parallel" => Ok(Device::Parallel(0)),
            Some(("parallel", n)) => n.parse().map(Device::Parallel).map_err(|_| {
                RelaxError::Configuration(format!("Invalid thread count in device '{}'", s))
            }),
            _ => Err(RelaxError::Configuration(format!(
                "Unsupported device '{}'. Use 'cpu', 'parallel' or 'parallel:N'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = RelaxError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Parallel(0) => write!(f, "parallel"),
            Device::Parallel(n) => write!(f, "parallel:{}", n),
        }
    }
}

/// 力场配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    /// 内置模型名称或 TOML 模型文件路径
    pub model: String,
    /// 近邻截断半径（模型长度单位）
    pub neighbor_cutoff: f64,
    pub device: Device,
    /// 模型原始能量单位
    pub energy_unit: EnergyUnit,
    /// 模型长度单位
    pub position_unit: LengthUnit,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            model: String::new(),
            neighbor_cutoff: 6.0,
            device: Device::Cpu,
            energy_unit: EnergyUnit::ElectronVolt,
            position_unit: LengthUnit::Angstrom,
        }
    }
}

/// 基于对势的批量力场
pub struct ForceFieldEvaluator {
    potential: PairPotential,
    device: Device,
    pool: Option<rayon::ThreadPool>,
    energy_to_ev: f64,
    length_to_ang: f64,
}

impl ForceFieldEvaluator {
    /// 按配置加载模型
    pub fn new(config: &EvaluatorConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(RelaxError::Configuration(format!(
                "No model given. Use a model file or one of: {}",
                potential::BUILTIN_MODELS.join(", ")
            )));
        }

        let model = match builtin_model(&config.model) {
            Some(model) => model,
            None => ModelFile::from_path(Path::new(&config.model))?,
        };

        Self::from_model(&model, config)
    }

    /// 由已解析的模型构建
    pub fn from_model(model: &ModelFile, config: &EvaluatorConfig) -> Result<Self> {
        let potential = PairPotential::from_model(model, config.neighbor_cutoff)?;

        let pool = match config.device {
            Device::Cpu => None,
            Device::Parallel(jobs) => {
                let threads = if jobs == 0 { num_cpus::get() } else { jobs };
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        RelaxError::Configuration(format!("Cannot start thread pool: {}", e))
                    })?;
                Some(pool)
            }
        };

        Ok(ForceFieldEvaluator {
            potential,
            device: config.device,
            pool,
            energy_to_ev: config.energy_unit.to_ev(),
            length_to_ang: config.position_unit.to_angstrom(),
        })
    }

    /// 模型描述（用于终端输出）
    pub fn describe(&self) -> String {
        format!(
            "{} ({}, cutoff {:.3}, device {})",
            self.potential.name(),
            self.potential.kind(),
            self.potential.cutoff(),
            self.device
        )
    }

    /// 计算单个结构
    fn evaluate_one(&self, index: usize, structure: &Structure) -> Result<Evaluation> {
        let fail = |reason: String| RelaxError::ModelInput {
            index,
            name: structure.name.clone(),
            reason,
        };

        let natoms = structure.natoms();
        if structure.numbers.len() != natoms {
            return Err(fail(format!(
                "{} species for {} positions",
                structure.numbers.len(),
                natoms
            )));
        }

        for (a, &z) in structure.numbers.iter().enumerate() {
            if !self.potential.supports(z) {
                return Err(fail(format!(
                    "atom {} ({}) is not covered by model '{}'",
                    a + 1,
                    elements::symbol(z).unwrap_or("?"),
                    self.potential.name()
                )));
            }
        }

        // Å -> 模型长度单位
        let scale = 1.0 / self.length_to_ang;
        let mut positions = Vec::with_capacity(natoms);
        for (a, p) in structure.positions.iter().enumerate() {
            if !p.iter().all(|x| x.is_finite()) {
                return Err(fail(format!("atom {} has non-finite coordinates", a + 1)));
            }
            positions.push([p[0] * scale, p[1] * scale, p[2] * scale]);
        }
        let cell = structure.cell.as_ref().map(|c| c.scaled(scale));

        let list = NeighborList::build(
            &positions,
            cell.as_ref(),
            structure.pbc,
            self.potential.cutoff(),
        );

        if let Some(a) = list.first_isolated() {
            return Err(fail(format!(
                "atom {} ({}) has no neighbors within cutoff {}",
                a + 1,
                elements::symbol(structure.numbers[a]).unwrap_or("?"),
                self.potential.cutoff()
            )));
        }

        let mut energy = 0.0;
        let mut forces = vec![[0.0; 3]; natoms];

        for pair in &list.pairs {
            if pair.distance < 1e-8 {
                return Err(fail(format!(
                    "atoms {} and {} overlap",
                    pair.i + 1,
                    pair.j + 1
                )));
            }

            let zi = structure.numbers[pair.i];
            let zj = structure.numbers[pair.j];
            let (phi, dphi) = self
                .potential
                .pair(zi, zj, pair.distance)
                .ok_or_else(|| fail(format!("no parameters for pair {}-{}", zi, zj)))?;

            // 完整近邻列表中每对出现两次
            energy += 0.5 * phi;
            for k in 0..3 {
                forces[pair.i][k] -= dphi * pair.vector[k] / pair.distance;
            }
        }

        let force_factor = self.energy_to_ev / self.length_to_ang;
        for f in forces.iter_mut() {
            for x in f.iter_mut() {
                *x *= force_factor;
            }
        }

        Ok(Evaluation {
            energy: energy * self.energy_to_ev,
            forces,
        })
    }
}

impl BatchEvaluator for ForceFieldEvaluator {
    fn evaluate(&self, batch: &[&Structure]) -> Result<Vec<Evaluation>> {
        let results: Vec<Result<Evaluation>> = match &self.pool {
            Some(pool) => pool.install(|| {
                batch
                    .par_iter()
                    .enumerate()
                    .map(|(i, s)| self.evaluate_one(i, s))
                    .collect()
            }),
            None => batch
                .iter()
                .enumerate()
                .map(|(i, s)| self.evaluate_one(i, s))
                .collect(),
        };

        // 按输入顺序报告第一个错误
        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    fn config(model: &str) -> EvaluatorConfig {
        EvaluatorConfig {
            model: model.to_string(),
            neighbor_cutoff: 8.5,
            ..Default::default()
        }
    }

    fn argon_dimer(d: f64) -> Structure {
        Structure::from_symbols("Ar2", &["Ar", "Ar"], vec![[0.0; 3], [d, 0.0, 0.0]]).unwrap()
    }

    #[test]
    fn test_dimer_forces_are_opposite() {
        let evaluator = ForceFieldEvaluator::new(&config("lj-argon")).unwrap();
        let s = argon_dimer(3.6);
        let result = evaluator.evaluate(&[&s]).unwrap();

        let f = &result[0].forces;
        assert_eq!(f.len(), 2);
        // 3.6 Å < r_min，排斥：原子 0 受 -x 方向力
        assert!(f[0][0] < 0.0);
        for k in 0..3 {
            assert!((f[0][k] + f[1][k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forces_match_energy_gradient() {
        let evaluator = ForceFieldEvaluator::new(&config("lj-argon")).unwrap();
        let base = Structure::from_symbols(
            "Ar3",
            &["Ar", "Ar", "Ar"],
            vec![[0.0, 0.0, 0.0], [3.7, 0.2, 0.0], [1.6, 3.3, 0.4]],
        )
        .unwrap();

        let forces = evaluator.evaluate(&[&base]).unwrap()[0].forces.clone();
        let h = 1e-5;

        for a in 0..3 {
            for k in 0..3 {
                let mut plus = base.clone();
                let mut minus = base.clone();
                plus.positions[a][k] += h;
                minus.positions[a][k] -= h;
                let ep = evaluator.evaluate(&[&plus]).unwrap()[0].energy;
                let em = evaluator.evaluate(&[&minus]).unwrap()[0].energy;
                let numeric = -(ep - em) / (2.0 * h);
                assert!(
                    (numeric - forces[a][k]).abs() < 1e-6,
                    "atom {} axis {}: {} vs {}",
                    a,
                    k,
                    numeric,
                    forces[a][k]
                );
            }
        }
    }

    #[test]
    fn test_isolated_atom_is_model_input_error() {
        let evaluator = ForceFieldEvaluator::new(&config("lj-argon")).unwrap();
        let good = argon_dimer(3.8);
        let bad = argon_dimer(20.0);

        match evaluator.evaluate(&[&good, &bad]) {
            Err(RelaxError::ModelInput { index, reason, .. }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("no neighbors"));
            }
            other => panic!("expected model input error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_species_is_model_input_error() {
        let evaluator = ForceFieldEvaluator::new(&config("lj-argon")).unwrap();
        let s = Structure::from_symbols("CuAr", &["Cu", "Ar"], vec![[0.0; 3], [3.0, 0.0, 0.0]])
            .unwrap();
        assert!(matches!(
            evaluator.evaluate(&[&s]),
            Err(RelaxError::ModelInput { .. })
        ));
    }

    #[test]
    fn test_periodic_fcc_copper_is_balanced() {
        // 理想 fcc 中每个原子受力为零
        let a = 3.61;
        let cell = Lattice::orthorhombic(a, a, a);
        let frac = [[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]];
        let positions = frac.iter().map(|f| cell.frac_to_cart(*f)).collect();
        let s = Structure::from_symbols("Cu4", &["Cu"; 4], positions)
            .unwrap()
            .with_cell(cell, [true; 3]);

        let mut cfg = config("morse-copper");
        cfg.neighbor_cutoff = 6.0;
        let evaluator = ForceFieldEvaluator::new(&cfg).unwrap();
        let result = evaluator.evaluate(&[&s]).unwrap();

        assert!(result[0].energy < 0.0);
        for f in &result[0].forces {
            for x in f {
                assert!(x.abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_energy_unit_conversion() {
        let model = builtin_model("lj-argon").unwrap();
        let ev = ForceFieldEvaluator::from_model(&model, &config("lj-argon")).unwrap();

        let mut cfg = config("lj-argon");
        cfg.energy_unit = EnergyUnit::KcalPerMol;
        let kcal = ForceFieldEvaluator::from_model(&model, &cfg).unwrap();

        let s = argon_dimer(3.6);
        let e_ev = ev.evaluate(&[&s]).unwrap()[0].energy;
        let e_kcal = kcal.evaluate(&[&s]).unwrap()[0].energy;
        assert!((e_kcal - e_ev * EnergyUnit::KcalPerMol.to_ev()).abs() < 1e-15);
    }

    #[test]
    fn test_bohr_model_forces_match_gradient_in_angstrom() {
        let model = builtin_model("lj-argon").unwrap();
        let angstrom = ForceFieldEvaluator::from_model(&model, &config("lj-argon")).unwrap();

        let mut cfg = config("lj-argon");
        cfg.position_unit = LengthUnit::Bohr;
        let bohr = ForceFieldEvaluator::from_model(&model, &cfg).unwrap();
        let a0 = LengthUnit::Bohr.to_angstrom();

        // σ = 3.40 Bohr，间距约 1.1 σ
        let base = Structure::from_symbols(
            "Ar3",
            &["Ar", "Ar", "Ar"],
            vec![[0.0, 0.0, 0.0], [2.0, 0.1, 0.0], [0.9, 1.8, 0.2]],
        )
        .unwrap();
        let result = bohr.evaluate(&[&base]).unwrap().remove(0);

        // 同一结构以 Bohr 数值放入 Å 模型，能量一致，受力差 1/a0
        let mut stretched = base.clone();
        for p in stretched.positions.iter_mut() {
            for x in p.iter_mut() {
                *x /= a0;
            }
        }
        let reference = angstrom.evaluate(&[&stretched]).unwrap().remove(0);
        assert!((result.energy - reference.energy).abs() < 1e-12);
        assert!(result.energy < 0.0);

        let h = 1e-5;
        for a in 0..3 {
            for k in 0..3 {
                assert!((result.forces[a][k] - reference.forces[a][k] / a0).abs() < 1e-10);

                let mut plus = base.clone();
                let mut minus = base.clone();
                plus.positions[a][k] += h;
                minus.positions[a][k] -= h;
                let ep = bohr.evaluate(&[&plus]).unwrap()[0].energy;
                let em = bohr.evaluate(&[&minus]).unwrap()[0].energy;
                let numeric = -(ep - em) / (2.0 * h);
                assert!(
                    (numeric - result.forces[a][k]).abs() < 1e-6,
                    "atom {} axis {}: {} vs {}",
                    a,
                    k,
                    numeric,
                    result.forces[a][k]
                );
            }
        }
    }

    #[test]
    fn test_parallel_device_matches_serial() {
        let serial = ForceFieldEvaluator::new(&config("lj-argon")).unwrap();
        let mut cfg = config("lj-argon");
        cfg.device = Device::Parallel(2);
        let parallel = ForceFieldEvaluator::new(&cfg).unwrap();

        let structures: Vec<Structure> = (0..6).map(|i| argon_dimer(3.5 + 0.1 * i as f64)).collect();
        let refs: Vec<&Structure> = structures.iter().collect();

        assert_eq!(
            serial.evaluate(&refs).unwrap(),
            parallel.evaluate(&refs).unwrap()
        );
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("parallel".parse::<Device>().unwrap(), Device::Parallel(0));
        assert_eq!("Parallel:4".parse::<Device>().unwrap(), Device::Parallel(4));
        assert!("cuda".parse::<Device>().is_err());
        assert!("parallel:x".parse::<Device>().is_err());
    }

    #[test]
    fn test_missing_model_is_configuration_error() {
        let err = ForceFieldEvaluator::new(&config("/no/such/model.toml"))
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert!(ForceFieldEvaluator::new(&config("")).is_err());
    }
}

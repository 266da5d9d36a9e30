//! # 批量弛豫驱动器
//!
//! 同时弛豫一批相互独立的结构，只共享力场，不共享优化历史。
//!
//! ## 每次迭代
//! 1. 对所有 Active 结构调用一次 `BatchEvaluator::evaluate`
//! 2. 冻结原子受力置零
//! 3. 记录能量/受力，写轨迹帧
//! 4. max|F_i| < fmax -> Converged
//! 5. 已走步数达到上限 -> StepLimitReached
//! 6. 否则计算 L-BFGS 位移，只更新非冻结原子
//!
//! 已收敛的结构不再参与计算，保留最后一次有效的能量与受力。
//! 任一结构的 ModelInput 错误使整个批次中止。
//!
//! ## 依赖关系
//! - 被 `commands/relax.rs` 调用
//! - 使用 `forcefield/` 的 BatchEvaluator
//! - 使用 `relax/lbfgs.rs`, `relax/collector.rs`, `relax/trajectory.rs`

use crate::error::{RelaxError, Result};
use crate::forcefield::BatchEvaluator;
use crate::models::{Structure, StructureBatch};
use crate::relax::collector::ResultCollector;
use crate::relax::lbfgs::{Lbfgs, LbfgsParams};
use crate::relax::trajectory::TrajectoryWriter;

use serde::Deserialize;
use std::path::PathBuf;

/// 弛豫配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaxConfig {
    /// 受力收敛阈值 (eV/Å)
    pub fmax: f64,
    /// 最大步数
    pub steps: usize,
    /// 冻结掩码，长度等于单个结构的原子数；为空表示不冻结
    pub mask: Vec<bool>,
    /// 轨迹输出（追加写入）
    pub trajectory: Option<PathBuf>,
    pub lbfgs: LbfgsParams,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        RelaxConfig {
            fmax: 0.05,
            steps: 200,
            mask: Vec::new(),
            trajectory: None,
            lbfgs: LbfgsParams::default(),
        }
    }
}

impl RelaxConfig {
    /// 检查配置与批次是否相容；任何迭代之前调用
    pub fn validate(&self, batch: &StructureBatch) -> Result<()> {
        if self.fmax.is_nan() || self.fmax < 0.0 {
            return Err(RelaxError::Configuration(format!(
                "fmax must be non-negative, got {}",
                self.fmax
            )));
        }

        self.lbfgs.validate()?;

        for structure in batch.iter() {
            structure.validate()?;
        }

        if !self.mask.is_empty() {
            for (i, structure) in batch.iter().enumerate() {
                if structure.natoms() != self.mask.len() {
                    return Err(RelaxError::Configuration(format!(
                        "mask has {} entries but structure #{} '{}' has {} atoms",
                        self.mask.len(),
                        i,
                        structure.name,
                        structure.natoms()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// 单个结构的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxStatus {
    Active,
    Converged,
    /// 达到最大步数仍未收敛（不是错误）
    StepLimitReached,
}

impl RelaxStatus {
    pub fn is_terminal(self) -> bool {
        self != RelaxStatus::Active
    }
}

impl std::fmt::Display for RelaxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelaxStatus::Active => write!(f, "active"),
            RelaxStatus::Converged => write!(f, "converged"),
            RelaxStatus::StepLimitReached => write!(f, "step limit"),
        }
    }
}

/// 单个结构的弛豫状态
#[derive(Debug, Clone)]
pub struct RelaxationState {
    /// 在原始批次中的位置
    pub index: usize,
    /// 当前结构（坐标随迭代更新）
    pub structure: Structure,
    /// 冻结标记（掩码 OR 文件中的固定标记）
    pub frozen: Vec<bool>,
    pub energy: Option<f64>,
    /// 施加约束后的受力
    pub forces: Option<Vec<[f64; 3]>>,
    pub max_force: f64,
    /// 坐标更新次数
    pub steps: usize,
    /// 力场调用次数
    pub evaluations: usize,
    pub status: RelaxStatus,
    pub energy_history: Vec<f64>,
    pub fmax_history: Vec<f64>,
    optimizer: Lbfgs,
}

impl RelaxationState {
    fn new(index: usize, structure: &Structure, mask: &[bool], params: LbfgsParams) -> Self {
        let frozen = (0..structure.natoms())
            .map(|a| {
                mask.get(a).copied().unwrap_or(false)
                    || structure.fixed.get(a).copied().unwrap_or(false)
            })
            .collect();

        RelaxationState {
            index,
            structure: structure.clone(),
            frozen,
            energy: None,
            forces: None,
            max_force: f64::INFINITY,
            steps: 0,
            evaluations: 0,
            status: RelaxStatus::Active,
            energy_history: Vec::new(),
            fmax_history: Vec::new(),
            optimizer: Lbfgs::new(params),
        }
    }

    /// 记录一次计算结果并返回施加约束后的最大受力
    fn record(&mut self, energy: f64, mut forces: Vec<[f64; 3]>) -> f64 {
        for (f, &frozen) in forces.iter_mut().zip(&self.frozen) {
            if frozen {
                *f = [0.0; 3];
            }
        }

        let max_force = forces
            .iter()
            .map(|f| (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt())
            .fold(0.0, f64::max);

        self.energy = Some(energy);
        self.forces = Some(forces);
        self.max_force = max_force;
        self.evaluations += 1;
        self.energy_history.push(energy);
        self.fmax_history.push(max_force);
        max_force
    }

    /// 走一步 L-BFGS
    fn advance(&mut self) {
        let Some(forces) = &self.forces else {
            return;
        };

        let flat_positions: Vec<f64> = self.structure.positions.iter().flatten().copied().collect();
        let flat_forces: Vec<f64> = forces.iter().flatten().copied().collect();
        let displacement = self
            .optimizer
            .step(&flat_positions, &flat_forces, &self.frozen);

        for (a, (pos, dr)) in self
            .structure
            .positions
            .iter_mut()
            .zip(displacement.chunks_exact(3))
            .enumerate()
        {
            // 冻结原子保持逐位不变
            if self.frozen[a] {
                continue;
            }
            for k in 0..3 {
                pos[k] += dr[k];
            }
        }

        self.steps += 1;
    }
}

/// 每次迭代后传给观察者的摘要
#[derive(Debug, Clone, Copy)]
pub struct IterationReport {
    /// 从 1 开始的迭代编号
    pub iteration: usize,
    /// 本次迭代参与计算的结构数
    pub evaluated: usize,
    /// 本次迭代后仍为 Active 的结构数
    pub active: usize,
    pub converged: usize,
    pub stopped: usize,
    /// 本次参与计算的结构中最大的 max|F|
    pub largest_max_force: f64,
}

/// 批量弛豫驱动器
pub struct BatchRelaxationDriver<'a, E: BatchEvaluator + ?Sized> {
    evaluator: &'a E,
    config: RelaxConfig,
}

impl<'a, E: BatchEvaluator + ?Sized> BatchRelaxationDriver<'a, E> {
    pub fn new(evaluator: &'a E, config: RelaxConfig) -> Self {
        BatchRelaxationDriver { evaluator, config }
    }

    /// 弛豫整个批次
    pub fn run(&self, batch: &StructureBatch) -> Result<ResultCollector> {
        self.run_with(batch, |_| {})
    }

    /// 弛豫整个批次，每次迭代后调用 `observer`
    pub fn run_with<F>(&self, batch: &StructureBatch, mut observer: F) -> Result<ResultCollector>
    where
        F: FnMut(&IterationReport),
    {
        self.config.validate(batch)?;

        let mut states: Vec<RelaxationState> = batch
            .iter()
            .enumerate()
            .map(|(i, s)| RelaxationState::new(i, s, &self.config.mask, self.config.lbfgs))
            .collect();

        let mut trajectory = match &self.config.trajectory {
            Some(path) => Some(TrajectoryWriter::append(path)?),
            None => None,
        };

        let mut iteration = 0;
        loop {
            let active: Vec<usize> = states
                .iter()
                .filter(|s| s.status == RelaxStatus::Active)
                .map(|s| s.index)
                .collect();
            if active.is_empty() {
                break;
            }
            iteration += 1;

            let evaluations = {
                let live: Vec<&Structure> = active.iter().map(|&i| &states[i].structure).collect();
                self.evaluator
                    .evaluate(&live)
                    .map_err(|e| e.remap_structure_index(&active))?
            };

            if evaluations.len() != active.len() {
                return Err(RelaxError::Other(format!(
                    "evaluator returned {} results for {} structures",
                    evaluations.len(),
                    active.len()
                )));
            }

            let mut largest_max_force: f64 = 0.0;
            for (&i, evaluation) in active.iter().zip(evaluations) {
                let state = &mut states[i];

                if evaluation.forces.len() != state.structure.natoms() {
                    return Err(RelaxError::ModelInput {
                        index: i,
                        name: state.structure.name.clone(),
                        reason: format!(
                            "evaluator returned {} force rows for {} atoms",
                            evaluation.forces.len(),
                            state.structure.natoms()
                        ),
                    });
                }

                let finite = evaluation.energy.is_finite()
                    && evaluation.forces.iter().flatten().all(|x| x.is_finite());
                if !finite {
                    return Err(RelaxError::ModelInput {
                        index: i,
                        name: state.structure.name.clone(),
                        reason: "evaluator returned a non-finite energy or force".to_string(),
                    });
                }

                let max_force = state.record(evaluation.energy, evaluation.forces);
                largest_max_force = largest_max_force.max(max_force);

                if let Some(writer) = trajectory.as_mut() {
                    writer.write_state(state)?;
                }

                if max_force < self.config.fmax {
                    state.status = RelaxStatus::Converged;
                } else if state.steps >= self.config.steps {
                    state.status = RelaxStatus::StepLimitReached;
                } else {
                    state.advance();
                }
            }

            let count = |status: RelaxStatus| states.iter().filter(|s| s.status == status).count();
            observer(&IterationReport {
                iteration,
                evaluated: active.len(),
                active: count(RelaxStatus::Active),
                converged: count(RelaxStatus::Converged),
                stopped: count(RelaxStatus::StepLimitReached),
                largest_max_force,
            });
        }

        if let Some(writer) = trajectory.as_mut() {
            writer.flush()?;
        }

        ResultCollector::from_states(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::{Evaluation, EvaluatorConfig, ForceFieldEvaluator};
    use std::cell::RefCell;

    /// 每个原子被弹簧拉向 `center`：E = ½k Σ|r - c|²
    struct HarmonicTrap {
        k: f64,
        center: [f64; 3],
        calls: RefCell<Vec<usize>>,
    }

    impl HarmonicTrap {
        fn new(k: f64) -> Self {
            HarmonicTrap {
                k,
                center: [1.0, -2.0, 0.5],
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl BatchEvaluator for HarmonicTrap {
        fn evaluate(&self, batch: &[&Structure]) -> Result<Vec<Evaluation>> {
            self.calls.borrow_mut().push(batch.len());
            Ok(batch
                .iter()
                .map(|s| {
                    let mut energy = 0.0;
                    let forces = s
                        .positions
                        .iter()
                        .map(|p| {
                            let mut f = [0.0; 3];
                            for k in 0..3 {
                                let dx = p[k] - self.center[k];
                                energy += 0.5 * self.k * dx * dx;
                                f[k] = -self.k * dx;
                            }
                            f
                        })
                        .collect();
                    Evaluation { energy, forces }
                })
                .collect())
        }
    }

    fn cluster(name: &str, offset: f64) -> Structure {
        Structure::from_symbols(
            name,
            &["Ar", "Ar", "Ar"],
            vec![
                [0.0 + offset, 0.0, 0.0],
                [2.0, 1.0 + offset, -1.0],
                [-1.5, 0.5, 2.0 + offset],
            ],
        )
        .unwrap()
    }

    fn batch() -> StructureBatch {
        StructureBatch::new(vec![cluster("a", 0.0), cluster("b", 0.7), cluster("c", -0.3)])
            .unwrap()
    }

    fn config(fmax: f64, steps: usize) -> RelaxConfig {
        RelaxConfig {
            fmax,
            steps,
            ..Default::default()
        }
    }

    #[test]
    fn test_shapes_and_order_preserved() {
        let trap = HarmonicTrap::new(5.0);
        let input = batch();
        let results = BatchRelaxationDriver::new(&trap, config(1e-4, 500))
            .run(&input)
            .unwrap();

        assert_eq!(results.len(), input.len());
        for (i, result) in results.collect().iter().enumerate() {
            let original = input.get(i).unwrap();
            assert_eq!(result.index, i);
            assert_eq!(result.structure.name, original.name);
            assert_eq!(result.structure.natoms(), original.natoms());
            assert_eq!(result.forces.len(), original.natoms());
            assert_eq!(result.status, RelaxStatus::Converged);
            assert!(result.max_force < 1e-4);
        }
    }

    #[test]
    fn test_masked_atoms_are_bit_identical() {
        let trap = HarmonicTrap::new(5.0);
        let input = batch();
        let mut cfg = config(1e-4, 500);
        cfg.mask = vec![true, false, true];

        let results = BatchRelaxationDriver::new(&trap, cfg).run(&input).unwrap();

        for (i, result) in results.collect().iter().enumerate() {
            let original = input.get(i).unwrap();
            for a in [0, 2] {
                for k in 0..3 {
                    assert_eq!(
                        result.structure.positions[a][k].to_bits(),
                        original.positions[a][k].to_bits()
                    );
                }
                assert_eq!(result.forces[a], [0.0; 3]);
            }
            // 自由原子移到了势阱中心
            assert!((result.structure.positions[1][1] + 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_file_fixed_flags_merge_with_mask() {
        let trap = HarmonicTrap::new(5.0);
        let fixed = cluster("fixed", 0.0).with_fixed(vec![false, true, false]);
        let input = StructureBatch::new(vec![fixed.clone()]).unwrap();

        let results = BatchRelaxationDriver::new(&trap, config(1e-4, 500))
            .run(&input)
            .unwrap();
        let result = &results.collect()[0];
        assert_eq!(result.structure.positions[1], fixed.positions[1]);
        assert_ne!(result.structure.positions[0], fixed.positions[0]);
    }

    #[test]
    fn test_huge_fmax_converges_after_one_evaluation() {
        let trap = HarmonicTrap::new(5.0);
        let input = batch();
        let results = BatchRelaxationDriver::new(&trap, config(1e9, 100))
            .run(&input)
            .unwrap();

        for (i, result) in results.collect().iter().enumerate() {
            assert_eq!(result.status, RelaxStatus::Converged);
            assert_eq!(result.evaluations, 1);
            assert_eq!(result.steps, 0);
            assert_eq!(result.structure.positions, input.get(i).unwrap().positions);
        }
        assert_eq!(*trap.calls.borrow(), vec![3]);
    }

    #[test]
    fn test_zero_steps_never_moves_atoms() {
        let trap = HarmonicTrap::new(5.0);
        let relaxed = Structure::from_symbols("relaxed", &["Ar"], vec![trap.center]).unwrap();
        let mut structures = batch().into_inner();
        structures.push(relaxed);
        let input = StructureBatch::new(structures).unwrap();

        let results = BatchRelaxationDriver::new(&trap, config(0.05, 0))
            .run(&input)
            .unwrap();

        let collected = results.collect();
        for (i, result) in collected.iter().enumerate() {
            assert_eq!(result.steps, 0);
            assert_eq!(result.structure.positions, input.get(i).unwrap().positions);
        }
        assert_eq!(collected[0].status, RelaxStatus::StepLimitReached);
        assert_eq!(collected[3].status, RelaxStatus::Converged);
        assert_eq!(results.warnings().len(), 3);
    }

    #[test]
    fn test_step_limit_is_not_an_error() {
        let trap = HarmonicTrap::new(5.0);
        let results = BatchRelaxationDriver::new(&trap, config(1e-12, 2))
            .run(&batch())
            .unwrap();

        for result in results.collect() {
            assert_eq!(result.status, RelaxStatus::StepLimitReached);
            assert_eq!(result.steps, 2);
            assert_eq!(result.evaluations, 3);
        }
    }

    #[test]
    fn test_identical_structures_are_deterministic() {
        let trap = HarmonicTrap::new(3.0);
        let input = StructureBatch::new(vec![cluster("x", 0.2), cluster("y", 0.2)]).unwrap();
        let mut cfg = config(1e-5, 500);
        cfg.mask = vec![false, true, false];

        let results = BatchRelaxationDriver::new(&trap, cfg).run(&input).unwrap();
        let collected = results.collect();

        assert_eq!(collected[0].steps, collected[1].steps);
        assert_eq!(collected[0].structure.positions, collected[1].structure.positions);
        assert_eq!(collected[0].energy.to_bits(), collected[1].energy.to_bits());
    }

    #[test]
    fn test_converged_structures_leave_the_live_set() {
        let trap = HarmonicTrap::new(5.0);
        let at_center = Structure::from_symbols("done", &["Ar"], vec![trap.center]).unwrap();
        let input = StructureBatch::new(vec![at_center, cluster("far", 0.0)]).unwrap();

        let results = BatchRelaxationDriver::new(&trap, config(1e-4, 500))
            .run(&input)
            .unwrap();

        let calls = trap.calls.borrow();
        assert_eq!(calls[0], 2);
        assert!(calls[1..].iter().all(|&n| n == 1));
        assert_eq!(results.collect()[0].evaluations, 1);
    }

    #[test]
    fn test_observer_sees_every_iteration() {
        let trap = HarmonicTrap::new(5.0);
        let mut reports = Vec::new();
        BatchRelaxationDriver::new(&trap, config(1e-4, 500))
            .run_with(&batch(), |r| reports.push(*r))
            .unwrap();

        assert_eq!(reports.len(), trap.calls.borrow().len());
        assert_eq!(reports[0].iteration, 1);
        let last = reports.last().unwrap();
        assert_eq!(last.active, 0);
        assert_eq!(last.converged, 3);
    }

    #[test]
    fn test_mask_length_mismatch_fails_before_evaluation() {
        let trap = HarmonicTrap::new(5.0);
        let mut cfg = config(0.05, 10);
        cfg.mask = vec![true, false];

        let err = BatchRelaxationDriver::new(&trap, cfg)
            .run(&batch())
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert!(trap.calls.borrow().is_empty());
    }

    #[test]
    fn test_negative_fmax_rejected() {
        let trap = HarmonicTrap::new(5.0);
        assert!(BatchRelaxationDriver::new(&trap, config(-1.0, 10))
            .run(&batch())
            .is_err());
        assert!(BatchRelaxationDriver::new(&trap, config(f64::NAN, 10))
            .run(&batch())
            .is_err());
    }

    #[test]
    fn test_model_input_error_aborts_batch_with_original_index() {
        let evaluator = ForceFieldEvaluator::new(&EvaluatorConfig {
            model: "lj-argon".to_string(),
            neighbor_cutoff: 8.5,
            ..Default::default()
        })
        .unwrap();

        let good = Structure::from_symbols("good", &["Ar", "Ar"], vec![[0.0; 3], [3.9, 0.0, 0.0]])
            .unwrap();
        let isolated =
            Structure::from_symbols("isolated", &["Ar", "Ar"], vec![[0.0; 3], [30.0, 0.0, 0.0]])
                .unwrap();
        let input = StructureBatch::new(vec![good.clone(), good, isolated]).unwrap();

        match BatchRelaxationDriver::new(&evaluator, config(0.01, 50)).run(&input) {
            Err(RelaxError::ModelInput { index, name, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(name, "isolated");
            }
            other => panic!("expected model input error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_lj_dimer_relaxes_to_pair_minimum() {
        let evaluator = ForceFieldEvaluator::new(&EvaluatorConfig {
            model: "lj-argon".to_string(),
            neighbor_cutoff: 8.5,
            ..Default::default()
        })
        .unwrap();

        let dimer = Structure::from_symbols("Ar2", &["Ar", "Ar"], vec![[0.0; 3], [4.0, 0.0, 0.0]])
            .unwrap();
        let input = StructureBatch::new(vec![dimer]).unwrap();

        let results = BatchRelaxationDriver::new(&evaluator, config(1e-4, 500))
            .run(&input)
            .unwrap();
        let result = &results.collect()[0];

        assert_eq!(result.status, RelaxStatus::Converged);
        let p = &result.structure.positions;
        let d = ((p[1][0] - p[0][0]).powi(2) + (p[1][1] - p[0][1]).powi(2)).sqrt();
        let r_min = 2f64.powf(1.0 / 6.0) * 3.40;
        assert!((d - r_min).abs() < 1e-2, "distance {} vs {}", d, r_min);
    }

    /// 对名为 `bad` 的结构返回 NaN
    struct NanForces;

    impl BatchEvaluator for NanForces {
        fn evaluate(&self, batch: &[&Structure]) -> Result<Vec<Evaluation>> {
            Ok(batch
                .iter()
                .map(|s| {
                    if s.name == "bad" {
                        Evaluation {
                            energy: f64::NAN,
                            forces: vec![[f64::NAN; 3]; s.natoms()],
                        }
                    } else {
                        Evaluation {
                            energy: 0.0,
                            forces: vec![[0.0; 3]; s.natoms()],
                        }
                    }
                })
                .collect())
        }
    }

    #[test]
    fn test_non_finite_evaluation_aborts_batch() {
        let input = StructureBatch::new(vec![cluster("a", 0.0), cluster("bad", 0.7)]).unwrap();

        match BatchRelaxationDriver::new(&NanForces, config(0.05, 10)).run(&input) {
            Err(RelaxError::ModelInput { index, name, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "bad");
            }
            other => panic!("expected model input error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_infinite_energy_is_rejected() {
        struct InfiniteEnergy;

        impl BatchEvaluator for InfiniteEnergy {
            fn evaluate(&self, batch: &[&Structure]) -> Result<Vec<Evaluation>> {
                Ok(batch
                    .iter()
                    .map(|s| Evaluation {
                        energy: f64::INFINITY,
                        forces: vec![[0.0; 3]; s.natoms()],
                    })
                    .collect())
            }
        }

        let result = BatchRelaxationDriver::new(&InfiniteEnergy, config(0.05, 10)).run(&batch());
        assert!(matches!(result, Err(RelaxError::ModelInput { index: 0, .. })));
    }
}

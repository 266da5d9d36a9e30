//! # 弛豫结果收集
//!
//! 驱动器结束后将每个结构的最终状态整理为只读结果，
//! 顺序与输入批次一致。
//!
//! ## 依赖关系
//! - 被 `relax/driver.rs` 构造
//! - 被 `commands/relax.rs`, `report/` 使用

use crate::error::{RelaxError, Result};
use crate::models::Structure;
use crate::relax::driver::{RelaxStatus, RelaxationState};
use serde::Serialize;

/// 单个结构的最终结果
#[derive(Debug, Clone)]
pub struct RelaxationResult {
    /// 在输入批次中的位置
    pub index: usize,
    /// 优化后的结构，energy/forces 字段已填入
    pub structure: Structure,
    /// 最终能量 (eV)
    pub energy: f64,
    /// 施加约束后的受力 (eV/Å)，冻结原子为零
    pub forces: Vec<[f64; 3]>,
    pub max_force: f64,
    pub steps: usize,
    pub evaluations: usize,
    pub status: RelaxStatus,
    pub energy_history: Vec<f64>,
    pub fmax_history: Vec<f64>,
}

impl RelaxationResult {
    pub fn converged(&self) -> bool {
        self.status == RelaxStatus::Converged
    }
}

/// 达到步数上限仍未收敛
#[derive(Debug, Clone, PartialEq)]
pub struct NonConvergenceWarning {
    pub index: usize,
    pub name: String,
    pub steps: usize,
    pub max_force: f64,
}

impl std::fmt::Display for NonConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "structure #{} '{}' did not converge in {} steps (max force {:.4} eV/Å)",
            self.index, self.name, self.steps, self.max_force
        )
    }
}

/// 按批次顺序汇总的性质
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedProperties {
    pub energy: Vec<f64>,
    pub forces: Vec<Vec<[f64; 3]>>,
    pub max_force: Vec<f64>,
    pub steps: Vec<usize>,
    pub evaluations: Vec<usize>,
    pub converged: Vec<bool>,
}

/// 结果收集器
#[derive(Debug, Clone)]
pub struct ResultCollector {
    results: Vec<RelaxationResult>,
}

impl ResultCollector {
    /// 由终态构造；仍为 Active 或缺少计算结果的状态视为错误
    pub fn from_states(states: Vec<RelaxationState>) -> Result<Self> {
        let mut results = Vec::with_capacity(states.len());

        for state in states {
            if !state.status.is_terminal() {
                return Err(RelaxError::Other(format!(
                    "structure #{} '{}' is still being relaxed",
                    state.index, state.structure.name
                )));
            }

            let (Some(energy), Some(forces)) = (state.energy, state.forces) else {
                return Err(RelaxError::Other(format!(
                    "structure #{} '{}' was never evaluated",
                    state.index, state.structure.name
                )));
            };

            let mut structure = state.structure;
            structure.energy = Some(energy);
            structure.forces = Some(forces.clone());

            results.push(RelaxationResult {
                index: state.index,
                structure,
                energy,
                forces,
                max_force: state.max_force,
                steps: state.steps,
                evaluations: state.evaluations,
                status: state.status,
                energy_history: state.energy_history,
                fmax_history: state.fmax_history,
            });
        }

        results.sort_by_key(|r| r.index);
        Ok(ResultCollector { results })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// 全部结果，按输入顺序
    pub fn collect(&self) -> &[RelaxationResult] {
        &self.results
    }

    pub fn converged_count(&self) -> usize {
        self.results.iter().filter(|r| r.converged()).count()
    }

    pub fn total_evaluations(&self) -> usize {
        self.results.iter().map(|r| r.evaluations).sum()
    }

    /// 优化后的结构
    pub fn optimized_structures(&self) -> Vec<Structure> {
        self.results.iter().map(|r| r.structure.clone()).collect()
    }

    /// 汇总性质
    pub fn properties(&self) -> AggregatedProperties {
        let mut props = AggregatedProperties::default();
        for r in &self.results {
            props.energy.push(r.energy);
            props.forces.push(r.forces.clone());
            props.max_force.push(r.max_force);
            props.steps.push(r.steps);
            props.evaluations.push(r.evaluations);
            props.converged.push(r.converged());
        }
        props
    }

    /// (结构, 汇总性质)
    pub fn optimizer_results(&self) -> (Vec<Structure>, AggregatedProperties) {
        (self.optimized_structures(), self.properties())
    }

    /// 达到步数上限的结构
    pub fn warnings(&self) -> Vec<NonConvergenceWarning> {
        self.results
            .iter()
            .filter(|r| r.status == RelaxStatus::StepLimitReached)
            .map(|r| NonConvergenceWarning {
                index: r.index,
                name: r.structure.name.clone(),
                steps: r.steps,
                max_force: r.max_force,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::{BatchEvaluator, Evaluation};
    use crate::models::StructureBatch;
    use crate::relax::driver::{BatchRelaxationDriver, RelaxConfig};

    /// 受力恒定，永不收敛
    struct ConstantPush;

    impl BatchEvaluator for ConstantPush {
        fn evaluate(&self, batch: &[&Structure]) -> Result<Vec<Evaluation>> {
            Ok(batch
                .iter()
                .map(|s| Evaluation {
                    energy: -s.positions.iter().map(|p| p[0]).sum::<f64>(),
                    forces: vec![[1.0, 0.0, 0.0]; s.natoms()],
                })
                .collect())
        }
    }

    fn run(fmax: f64, steps: usize) -> ResultCollector {
        let a = Structure::from_symbols("a", &["Ar", "Ar"], vec![[0.0; 3], [3.0, 0.0, 0.0]])
            .unwrap();
        let b = Structure::from_symbols("b", &["Ar", "Ar"], vec![[0.0; 3], [0.0, 3.0, 0.0]])
            .unwrap();
        let batch = StructureBatch::new(vec![a, b]).unwrap();
        BatchRelaxationDriver::new(
            &ConstantPush,
            RelaxConfig {
                fmax,
                steps,
                ..Default::default()
            },
        )
        .run(&batch)
        .unwrap()
    }

    #[test]
    fn test_optimizer_results_are_aligned() {
        let results = run(0.5, 3);
        let (structures, props) = results.optimizer_results();

        assert_eq!(structures.len(), 2);
        assert_eq!(props.energy.len(), 2);
        assert_eq!(props.steps, vec![3, 3]);
        assert_eq!(props.evaluations, vec![4, 4]);
        assert_eq!(props.converged, vec![false, false]);
        assert_eq!(structures[1].name, "b");
        assert_eq!(structures[0].energy, Some(props.energy[0]));
        assert_eq!(props.forces[0].len(), 2);
    }

    #[test]
    fn test_warnings_for_step_limited_structures() {
        let results = run(0.5, 2);
        let warnings = results.warnings();

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].index, 0);
        assert_eq!(warnings[1].name, "b");
        assert!((warnings[0].max_force - 1.0).abs() < 1e-12);
        assert!(warnings[0].to_string().contains("did not converge in 2 steps"));
    }

    #[test]
    fn test_no_warnings_when_converged() {
        let results = run(2.0, 5);
        assert!(results.warnings().is_empty());
        assert_eq!(results.converged_count(), 2);
        assert_eq!(results.total_evaluations(), 2);
        assert!(results.collect().iter().all(|r| r.energy_history.len() == 1));
    }
}

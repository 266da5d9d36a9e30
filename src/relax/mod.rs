//! # 批量结构弛豫
//!
//! ## 模块组成
//! - `lbfgs`      - 单结构 L-BFGS 步长
//! - `driver`     - 批量迭代循环与收敛判定
//! - `collector`  - 结果整理与未收敛警告
//! - `trajectory` - 扩展 XYZ 轨迹追加写入
//!
//! ## 依赖关系
//! - 被 `commands/relax.rs` 使用
//! - 使用 `forcefield/`, `models/`, `parsers/xyz.rs`

pub mod collector;
pub mod driver;
pub mod lbfgs;
pub mod trajectory;

pub use collector::{AggregatedProperties, NonConvergenceWarning, RelaxationResult, ResultCollector};
pub use driver::{BatchRelaxationDriver, IterationReport, RelaxConfig, RelaxStatus};
pub use lbfgs::LbfgsParams;

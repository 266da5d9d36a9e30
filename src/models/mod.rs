//! # 数据模型模块
//!
//! 定义统一的原子结构、元素表与单位换算。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `forcefield/`, `relax/`, `commands/` 使用
//! - 子模块: structure, elements, units

pub mod elements;
pub mod structure;
pub mod units;

pub use structure::{Lattice, Structure, StructureBatch};
pub use units::{EnergyUnit, LengthUnit};

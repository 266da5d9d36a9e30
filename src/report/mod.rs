//! # 结果报告
//!
//! ## 子模块
//! - `export` - CSV 汇总表
//! - `plot`   - 收敛曲线 (PNG/SVG)
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `relax/` 的结果类型

pub mod export;
pub mod plot;

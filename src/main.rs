//! # batchrelax - 批量结构弛豫工具
//!
//! 用同一个力场同时弛豫一批相互独立的原子结构。每次迭代对所有
//! 尚未收敛的结构调用一次力场，每个结构持有独立的 L-BFGS 历史。
//!
//! ## 子命令
//! - `relax`    - 批量 L-BFGS 弛豫，支持冻结原子与轨迹输出
//! - `evaluate` - 单点能量/受力计算
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/      (输入文件收集)
//!   │     ├── config.rs   (TOML 运行配置)
//!   │     ├── forcefield/ (对势力场)
//!   │     ├── relax/      (驱动器、L-BFGS、结果收集)
//!   │     ├── report/     (CSV 与收敛曲线)
//!   │     ├── parsers/    (XYZ / POSCAR)
//!   │     └── models/     (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod forcefield;
mod models;
mod parsers;
mod relax;
mod report;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}

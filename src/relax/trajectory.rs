//! # 轨迹输出
//!
//! 每次计算后为每个结构追加一帧扩展 XYZ，附带 `structure` 与 `step` 键。
//! 文件以追加模式打开，已有内容不会被覆盖。
//!
//! ## 依赖关系
//! - 被 `relax/driver.rs` 使用
//! - 使用 `parsers/xyz.rs` 的帧格式

use crate::error::{RelaxError, Result};
use crate::parsers::xyz;
use crate::relax::driver::RelaxationState;

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct TrajectoryWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TrajectoryWriter {
    /// 以追加模式打开（不存在则创建）
    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RelaxError::FileWriteError {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(TrajectoryWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// 写出状态的当前帧（坐标 + 最近一次的能量与受力）
    pub fn write_state(&mut self, state: &RelaxationState) -> Result<()> {
        let mut frame = state.structure.clone();
        frame.energy = state.energy;
        frame.forces = state.forces.clone();

        let text = xyz::format_frame(
            &frame,
            &[
                ("structure", state.index.to_string()),
                ("step", state.steps.to_string()),
            ],
        );

        self.writer
            .write_all(text.as_bytes())
            .map_err(|e| self.write_error(e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| self.write_error(e))
    }

    fn write_error(&self, source: std::io::Error) -> RelaxError {
        RelaxError::FileWriteError {
            path: self.path.display().to_string(),
            source,
        }
    }
}

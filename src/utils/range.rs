//! # 原子范围解析
//!
//! 将 "1-4,7" 形式的 1 起始范围转换为冻结掩码。
//!
//! ## 依赖关系
//! - 被 `cli/relax.rs` 使用

use crate::error::{RelaxError, Result};

/// 解析范围字符串 (e.g., "1-5,8,10-12")，返回闭区间 (起, 止) 列表，不展开
pub fn parse_spans(expr: &str) -> Result<Vec<(usize, usize)>> {
    let mut spans = Vec::new();

    for chunk in expr.split(',') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        let invalid = || RelaxError::InvalidRange(chunk.to_string());

        if let Some((a, b)) = chunk.split_once('-') {
            let a: usize = a.trim().parse().map_err(|_| invalid())?;
            let b: usize = b.trim().parse().map_err(|_| invalid())?;
            if a < 1 || b < a {
                return Err(invalid());
            }
            spans.push((a, b));
        } else {
            let v: usize = chunk.parse().map_err(|_| invalid())?;
            if v < 1 {
                return Err(invalid());
            }
            spans.push((v, v));
        }
    }

    Ok(spans)
}

/// 由范围字符串生成长度为 `natoms` 的冻结掩码
pub fn mask_from_range(expr: &str, natoms: usize) -> Result<Vec<bool>> {
    let mut mask = vec![false; natoms];
    for (first, last) in parse_spans(expr)? {
        if last > natoms {
            return Err(RelaxError::Configuration(format!(
                "atom {} in '{}' exceeds the {} atoms per structure",
                last, expr, natoms
            )));
        }
        mask[first - 1..last].fill(true);
    }
    Ok(mask)
}

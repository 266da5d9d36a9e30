//! # 元素周期表
//!
//! 元素符号与原子序数之间的转换。
//!
//! ## 依赖关系
//! - 被 `models/structure.rs`, `parsers/`, `forcefield/potential.rs` 使用
//! - 纯静态数据，无外部依赖

/// 元素符号，下标 = 原子序数 - 1
static SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// 原子序数 -> 元素符号
pub fn symbol(number: u8) -> Option<&'static str> {
    if number == 0 {
        return None;
    }
    SYMBOLS.get(number as usize - 1).copied()
}

/// 元素符号 -> 原子序数
///
/// 接受大小写不规范的写法，以及带数字后缀的标签（如 "Fe1"）。
pub fn atomic_number(label: &str) -> Option<u8> {
    let letters: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    if letters.is_empty() {
        return None;
    }

    let mut normalized = String::with_capacity(letters.len());
    for (i, c) in letters.chars().enumerate() {
        if i == 0 {
            normalized.push(c.to_ascii_uppercase());
        } else {
            normalized.push(c.to_ascii_lowercase());
        }
    }

    SYMBOLS
        .iter()
        .position(|&s| s == normalized)
        .map(|i| (i + 1) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(symbol(1), Some("H"));
        assert_eq!(symbol(18), Some("Ar"));
        assert_eq!(symbol(118), Some("Og"));
        assert_eq!(symbol(0), None);
        assert_eq!(symbol(119), None);
    }

    #[test]
    fn test_atomic_number_lookup() {
        assert_eq!(atomic_number("Cu"), Some(29));
        assert_eq!(atomic_number("cu"), Some(29));
        assert_eq!(atomic_number("Fe1"), Some(26));
        assert_eq!(atomic_number("Xx"), None);
        assert_eq!(atomic_number(""), None);
    }
}

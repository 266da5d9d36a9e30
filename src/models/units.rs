//! # 单位换算
//!
//! 模型原始输出的能量/长度单位字符串到 eV / Å 的换算因子。
//! 不支持的单位字符串属于配置错误。
//!
//! ## 依赖关系
//! - 被 `forcefield/mod.rs` 使用

use crate::error::{RelaxError, Result};
use serde::Deserialize;
use std::str::FromStr;

/// 能量单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum EnergyUnit {
    #[default]
    ElectronVolt,
    MilliElectronVolt,
    KcalPerMol,
    KjPerMol,
    Hartree,
    Rydberg,
}

impl EnergyUnit {
    /// 1 个该单位等于多少 eV
    pub fn to_ev(self) -> f64 {
        match self {
            EnergyUnit::ElectronVolt => 1.0,
            EnergyUnit::MilliElectronVolt => 1e-3,
            EnergyUnit::KcalPerMol => 0.043_364_104_3,
            EnergyUnit::KjPerMol => 0.010_364_269_6,
            EnergyUnit::Hartree => 27.211_386_245_988,
            EnergyUnit::Rydberg => 13.605_693_122_994,
        }
    }
}

impl FromStr for EnergyUnit {
    type Err = RelaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ev" => Ok(EnergyUnit::ElectronVolt),
            "mev" => Ok(EnergyUnit::MilliElectronVolt),
            "kcal/mol" | "kcal_mol" | "kcalmol" => Ok(EnergyUnit::KcalPerMol),
            "kj/mol" | "kj_mol" | "kjmol" => Ok(EnergyUnit::KjPerMol),
            "hartree" | "ha" => Ok(EnergyUnit::Hartree),
            "rydberg" | "ry" => Ok(EnergyUnit::Rydberg),
            _ => Err(RelaxError::Configuration(format!(
                "Unsupported energy unit '{}'. Use one of: eV, meV, kcal/mol, kJ/mol, Hartree, Ry",
                s
            ))),
        }
    }
}

impl TryFrom<String> for EnergyUnit {
    type Error = RelaxError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnergyUnit::ElectronVolt => write!(f, "eV"),
            EnergyUnit::MilliElectronVolt => write!(f, "meV"),
            EnergyUnit::KcalPerMol => write!(f, "kcal/mol"),
            EnergyUnit::KjPerMol => write!(f, "kJ/mol"),
            EnergyUnit::Hartree => write!(f, "Hartree"),
            EnergyUnit::Rydberg => write!(f, "Ry"),
        }
    }
}

/// 长度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LengthUnit {
    #[default]
    Angstrom,
    Bohr,
    Nanometer,
}

impl LengthUnit {
    /// 1 个该单位等于多少 Å
    pub fn to_angstrom(self) -> f64 {
        match self {
            LengthUnit::Angstrom => 1.0,
            LengthUnit::Bohr => 0.529_177_210_903,
            LengthUnit::Nanometer => 10.0,
        }
    }
}

impl FromStr for LengthUnit {
    type Err = RelaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ang" | "angstrom" | "a" | "å" => Ok(LengthUnit::Angstrom),
            "bohr" | "a0" => Ok(LengthUnit::Bohr),
            "nm" | "nanometer" => Ok(LengthUnit::Nanometer),
            _ => Err(RelaxError::Configuration(format!(
                "Unsupported position unit '{}'. Use one of: Ang, Bohr, nm",
                s
            ))),
        }
    }
}

impl TryFrom<String> for LengthUnit {
    type Error = RelaxError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthUnit::Angstrom => write!(f, "Ang"),
            LengthUnit::Bohr => write!(f, "Bohr"),
            LengthUnit::Nanometer => write!(f, "nm"),
        }
    }
}

//! 每个患者每个切面的附属信息文件 `{data_info}/{patient}/Info_{view}.cfg`.
//!
//! 文件为 `Key: Value` 格式, 与 YAML 映射兼容, 例如:
//!
//! ```text
//! ED: 1
//! ES: 14
//! NbFrame: 14
//! ImageQuality: Good
//! LVef: 59.7
//! ```

use super::{LoadError, LoadResult};
use crate::consts::View;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 图像质量字段名.
pub const QUALITY_FIELD: &str = "ImageQuality";

/// 图像质量评级.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Quality {
    /// 好.
    Good,

    /// 中等.
    Medium,

    /// 差.
    Poor,
}

impl Quality {
    /// 质量筛选时是否保留? `Good` 和 `Medium` 保留.
    #[inline]
    pub const fn is_acceptable(self) -> bool {
        matches!(self, Quality::Good | Quality::Medium)
    }
}

impl FromStr for Quality {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(Quality::Good),
            "medium" => Ok(Quality::Medium),
            "poor" => Ok(Quality::Poor),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Good => "Good",
            Quality::Medium => "Medium",
            Quality::Poor => "Poor",
        })
    }
}

/// 单个切面的附属信息. 除 `ImageQuality` 外的字段都只做记录.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewInfo {
    /// 舒张末期所在帧.
    #[serde(rename = "ED")]
    pub ed: Option<u32>,

    /// 收缩末期所在帧.
    #[serde(rename = "ES")]
    pub es: Option<u32>,

    /// 序列帧数.
    pub nb_frame: Option<u32>,

    /// 原始质量评级文本.
    pub image_quality: Option<String>,

    /// 左心室舒张末期容积.
    #[serde(rename = "LVedv")]
    pub lv_edv: Option<f64>,

    /// 左心室收缩末期容积.
    #[serde(rename = "LVesv")]
    pub lv_esv: Option<f64>,

    /// 左心室射血分数.
    #[serde(rename = "LVef")]
    pub lv_ef: Option<f64>,
}

/// 附属信息文件路径.
#[inline]
pub fn info_path(info_root: &Path, patient: &str, view: View) -> PathBuf {
    info_root
        .join(patient)
        .join(format!("Info_{}.cfg", view.tag()))
}

/// 读取并解析附属信息文件.
pub fn read_info(path: &Path) -> LoadResult<ViewInfo> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::Io(path.to_owned(), e))?;
    if text.trim().is_empty() {
        return Ok(ViewInfo::default());
    }
    serde_yaml::from_str(&text).map_err(|e| LoadError::Yaml(path.to_owned(), e))
}

/// 从已解析的信息中取出质量评级. `path` 仅用于报告错误.
pub fn quality_of(info: &ViewInfo, path: &Path) -> LoadResult<Quality> {
    let value = info
        .image_quality
        .as_deref()
        .ok_or_else(|| LoadError::MissingField {
            path: path.to_owned(),
            field: QUALITY_FIELD,
        })?;
    value.parse().map_err(|_| LoadError::BadQuality {
        path: path.to_owned(),
        value: value.to_owned(),
    })
}

/// 读取患者 `patient` 在切面 `view` 上的质量评级.
pub fn read_quality(info_root: &Path, patient: &str, view: View) -> LoadResult<Quality> {
    let path = info_path(info_root, patient, view);
    quality_of(&read_info(&path)?, &path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_info(root: &Path, patient: &str, view: View, text: &str) {
        let dir = root.join(patient);
        fs::create_dir_all(&dir).unwrap();
        fs::write(info_path(root, patient, view), text).unwrap();
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!("Good".parse(), Ok(Quality::Good));
        assert_eq!(" medium ".parse(), Ok(Quality::Medium));
        assert_eq!("Poor".parse(), Ok(Quality::Poor));
        assert!("Excellent".parse::<Quality>().is_err());
        assert!(Quality::Medium.is_acceptable());
        assert!(!Quality::Poor.is_acceptable());
    }

    #[test]
    fn test_read_quality() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_info(
            root,
            "patient0001",
            View::TwoChamber,
            "ED: 1\nES: 14\nNbFrame: 14\nSex: F\nAge: 53\n\
             ImageQuality: Medium\nLVedv: 95.1\nLVef: 59.7\n",
        );
        assert_eq!(
            read_quality(root, "patient0001", View::TwoChamber).unwrap(),
            Quality::Medium
        );
        let info = read_info(&info_path(root, "patient0001", View::TwoChamber)).unwrap();
        assert_eq!(info.es, Some(14));
        assert_eq!(info.lv_esv, None);

        write_info(root, "patient0001", View::FourChamber, "ED: 1\nES: 14\n");
        assert!(matches!(
            read_quality(root, "patient0001", View::FourChamber),
            Err(LoadError::MissingField { field: QUALITY_FIELD, .. })
        ));

        write_info(root, "patient0002", View::TwoChamber, "ImageQuality: Great\n");
        assert!(matches!(
            read_quality(root, "patient0002", View::TwoChamber),
            Err(LoadError::BadQuality { .. })
        ));

        assert!(matches!(
            read_quality(root, "patient0003", View::TwoChamber),
            Err(LoadError::Io(..))
        ));
    }
}

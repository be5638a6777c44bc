//! 患者清单 `{data_root}/list/dataset.yaml`.
//!
//! 清单是一个 YAML 字符串列表, 每一项是一个患者标识, 例如:
//!
//! ```yaml
//! - patient0001
//! - patient0002
//! ```

use super::{LoadError, LoadResult};
use crate::consts::MANIFEST_PATH;
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

/// 数据根目录 `root` 下的清单文件路径.
#[inline]
pub fn manifest_path(root: &Path) -> PathBuf {
    let mut ans = root.to_owned();
    ans.extend(MANIFEST_PATH);
    ans
}

/// 读取数据根目录 `root` 下的患者清单, 保持文件中的顺序.
///
/// 重复出现的标识只保留第一次, 并记录一条警告.
pub fn read_manifest(root: &Path) -> LoadResult<Vec<String>> {
    let path = manifest_path(root);
    let text = fs::read_to_string(&path).map_err(|e| LoadError::Io(path.clone(), e))?;
    let ids = parse_manifest(&text).map_err(|e| LoadError::Yaml(path.clone(), e))?;

    let dup = ids.iter().duplicates().join(", ");
    if !dup.is_empty() {
        log::warn!("{}: duplicated patients ignored: {dup}", path.display());
    }
    Ok(ids.into_iter().unique().collect())
}

/// 解析清单文本. 空文档视为空清单.
pub fn parse_manifest(text: &str) -> Result<Vec<String>, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let ids: Option<Vec<String>> = serde_yaml::from_str(text)?;
    Ok(ids.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let ids = parse_manifest("- patient0001\n- patient0002\n").unwrap();
        assert_eq!(ids, ["patient0001", "patient0002"]);
        assert!(parse_manifest("").unwrap().is_empty());
        assert!(parse_manifest("patient: 1").is_err());
    }

    #[test]
    fn test_read_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_manifest(dir.path()), Err(LoadError::Io(..))));

        fs::create_dir_all(dir.path().join("list")).unwrap();
        fs::write(manifest_path(dir.path()), "- b\n- a\n- b\n- c\n").unwrap();
        assert_eq!(read_manifest(dir.path()).unwrap(), ["b", "a", "c"]);
    }
}

//! 数据集操作.

use std::env;
use std::path::{Path, PathBuf};

mod camus;
mod config;
mod error;
pub mod manifest;
pub mod quality;
pub mod split;

pub use camus::{
    Acquisition, CamusDataset, Mode, Sample, TestView, TestVolume, TrainSlice, TrainView,
};
pub use config::{CamusConfig, Variant};
pub use error::{LoadError, LoadResult};

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P, I>(it: I) -> Option<PathBuf>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = P>,
{
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 获取 CAMUS 数据集根目录.
///
/// 1. 若环境变量 `$CAMUS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/camus`. 无法确定用户主目录时返回 `None`.
pub fn camus_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("CAMUS_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["camus"]),
    }
}

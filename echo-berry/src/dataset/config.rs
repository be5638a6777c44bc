use super::{LoadError, LoadResult};
use crate::augment::AugmentConfig;
use crate::consts::{CROP_BOUND, DEFAULT_TEST_LEN};
use crate::preprocess::PadPolicy;
use crate::Idx2d;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 加载器变体.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// 加载全部切面. 补零留 10 像素余量, 向下取整.
    #[default]
    Basic,

    /// 只保留质量为 `Good`/`Medium` 的切面. 补零不留余量, 向上取整.
    QualityFiltered,
}

impl Variant {
    /// 该变体使用的补零规则.
    #[inline]
    pub const fn pad_policy(self) -> PadPolicy {
        match self {
            Variant::Basic => PadPolicy::BASIC,
            Variant::QualityFiltered => PadPolicy::QUALITY_FILTERED,
        }
    }
}

/// CAMUS 数据集加载配置. 可以从 YAML 文件读取:
///
/// ```yaml
/// data_root: /data/camus
/// data_info: /data/camus/info   # 可选, 默认与 data_root 相同
/// training_size: [256, 256]     # (高, 宽)
/// test_size: 10
/// seed: 0
/// variant: quality_filtered
/// augmentation:                 # 可选, 省略则不做增强
///   noise_std: 0.02
///   gamma_range: [0.7, 1.5]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CamusConfig {
    /// 数据根目录. 清单位于 `{data_root}/list/dataset.yaml`, 体数据直接位于该目录下.
    pub data_root: PathBuf,

    /// 附属信息根目录. `None` 时使用 `data_root`.
    #[serde(default)]
    pub data_info: Option<PathBuf>,

    /// 训练尺寸 (高, 宽).
    pub training_size: Idx2d,

    /// 测试集患者个数.
    #[serde(default = "default_test_size")]
    pub test_size: usize,

    /// 划分与增强所用的随机种子.
    #[serde(default)]
    pub seed: u64,

    /// 加载器变体.
    #[serde(default)]
    pub variant: Variant,

    /// 体数据文件扩展名 (不含 `.`).
    #[serde(default = "default_extension")]
    pub extension: String,

    /// 训练集在线增强参数. `None` 时不做增强.
    #[serde(default)]
    pub augmentation: Option<AugmentConfig>,
}

fn default_test_size() -> usize {
    DEFAULT_TEST_LEN
}

fn default_extension() -> String {
    "mhd".to_owned()
}

impl CamusConfig {
    /// 以默认参数构建.
    pub fn new<P: Into<PathBuf>>(data_root: P, training_size: Idx2d) -> Self {
        Self {
            data_root: data_root.into(),
            data_info: None,
            training_size,
            test_size: default_test_size(),
            seed: 0,
            variant: Variant::default(),
            extension: default_extension(),
            augmentation: None,
        }
    }

    /// 从 YAML 文件读取.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| LoadError::Io(path.to_owned(), e))?;
        serde_yaml::from_str(&text).map_err(|e| LoadError::Yaml(path.to_owned(), e))
    }

    /// 附属信息根目录.
    #[inline]
    pub fn info_root(&self) -> &Path {
        self.data_info.as_deref().unwrap_or(&self.data_root)
    }

    /// 检查配置是否合法.
    pub fn validate(&self) -> LoadResult<()> {
        let (h, w) = self.training_size;
        if h == 0 || w == 0 {
            return Err(LoadError::InvalidConfig(format!(
                "training_size must be positive, got {:?}",
                self.training_size
            )));
        }
        if h > CROP_BOUND || w > CROP_BOUND {
            log::warn!(
                "training_size {:?} exceeds the {CROP_BOUND}x{CROP_BOUND} crop bound",
                self.training_size
            );
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(LoadError::InvalidConfig(format!(
                "extension must not be empty or start with '.', got {:?}",
                self.extension
            )));
        }
        if let Some(aug) = &self.augmentation {
            aug.validate()
                .map_err(|msg| LoadError::InvalidConfig(msg.to_owned()))?;
        }
        Ok(())
    }
}

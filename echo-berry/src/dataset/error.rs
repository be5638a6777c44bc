use crate::data::VolumeError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// 构建数据集时的错误. 所有变体都携带出错的文件路径.
#[derive(Debug)]
pub enum LoadError {
    /// 底层 I/O 错误.
    Io(PathBuf, io::Error),

    /// YAML 解析错误 (患者清单, 质量信息文件, 配置文件).
    Yaml(PathBuf, serde_yaml::Error),

    /// 体数据读取错误. 路径为该次采集的图像文件, 标注与其同名, 带 `_gt` 后缀.
    Volume(PathBuf, VolumeError),

    /// 质量信息文件缺少必要字段.
    MissingField {
        /// 文件路径.
        path: PathBuf,

        /// 缺少的字段名.
        field: &'static str,
    },

    /// 质量信息文件中 `ImageQuality` 的值无法识别.
    BadQuality {
        /// 文件路径.
        path: PathBuf,

        /// 原始值.
        value: String,
    },

    /// 配置不合法.
    InvalidConfig(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(p, e) => write!(f, "{}: {e}", p.display()),
            Self::Yaml(p, e) => write!(f, "{}: yaml: {e}", p.display()),
            Self::Volume(p, e) => write!(f, "{}: {e}", p.display()),
            Self::MissingField { path, field } => {
                write!(f, "{}: missing field `{field}`", path.display())
            }
            Self::BadQuality { path, value } => {
                write!(f, "{}: unknown image quality `{value}`", path.display())
            }
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Yaml(_, e) => Some(e),
            Self::Volume(_, e) => Some(e),
            _ => None,
        }
    }
}

/// 数据集构建结果.
pub type LoadResult<T> = Result<T, LoadError>;

//! 体数据读取错误.

use super::metaimage::MetaImageError;
use std::fmt;
use std::path::PathBuf;

/// 打开 3D 体数据时的错误.
#[derive(Debug)]
pub enum VolumeError {
    /// 读取 nifti 文件错误.
    Nifti(nifti::NiftiError),

    /// 读取 MetaImage 文件错误.
    MetaImage(MetaImageError),

    /// 文件扩展名无法识别.
    UnsupportedFormat(PathBuf),

    /// 标签体素值无法无损地转换为类别索引 (`u8`). 参数为出错的原始值.
    LabelOutOfRange(f64),

    /// 头部声明的形状与实际体素个数不符.
    Shape(ndarray::ShapeError),
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nifti(e) => write!(f, "nifti: {e}"),
            Self::MetaImage(e) => write!(f, "metaimage: {e}"),
            Self::UnsupportedFormat(p) => write!(f, "unsupported volume format: {}", p.display()),
            Self::LabelOutOfRange(v) => write!(f, "label value {v} is not a class index"),
            Self::Shape(e) => write!(f, "shape error: {e}"),
        }
    }
}

impl std::error::Error for VolumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Nifti(e) => Some(e),
            Self::MetaImage(e) => Some(e),
            Self::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<nifti::NiftiError> for VolumeError {
    fn from(value: nifti::NiftiError) -> Self {
        Self::Nifti(value)
    }
}

impl From<MetaImageError> for VolumeError {
    fn from(value: MetaImageError) -> Self {
        Self::MetaImage(value)
    }
}

impl From<ndarray::ShapeError> for VolumeError {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}

/// 体数据读取结果.
pub type VolumeResult<T> = Result<T, VolumeError>;

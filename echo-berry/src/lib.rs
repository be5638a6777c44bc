#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 CAMUS 心脏超声数据集的体数据读取, 预处理, 数据集加载和在线增强.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 体数据按照数组轴序 `(z, h, w)` 组织, 体素分辨率同样以该顺序给出
//!   (与 MetaImage/nifti 文件头部的 `(x, y, z)` 相反).
//! 2. 在非期望情况下 (例如图像与标注形状不一致), 程序会直接 panic.
//!   其余可预期的失败 (文件缺失, 格式错误等) 都以 `Result` 返回.
//!
//! # 模块
//!
//! ### 体数据读写 ✅
//!
//! `.mhd`/`.mha` (MetaImage) 和 `.nii`/`.nii.gz` 两种格式, 2D 图像视为 `z = 1` 的体数据.
//!
//! 实现位于 `echo-berry/src/data`.
//!
//! ### 预处理 ✅
//!
//! 第 98 百分位数截断与规范化, 对称补零, 256 x 256 截断, 测试时的中心裁剪.
//!
//! 实现位于 `echo-berry/src/preprocess.rs`.
//!
//! ### CAMUS 数据集加载器 ✅
//!
//! 患者清单, 固定种子的划分, 按切面的质量筛选, 训练/测试两种视图.
//!
//! 实现位于 `echo-berry/src/dataset`.
//!
//! ### 在线数据增强 ✅
//!
//! 噪声, 亮度, gamma, 仿射, 随机裁剪.
//!
//! 实现位于 `echo-berry/src/augment.rs`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D 超声体数据基础数据结构.
mod data;

pub use data::{
    metaimage, read_volume, window, EchoData3d, EchoLabel, EchoScan, ImgWriteVis,
    IntensityWindow, LabelSlice, OwnedLabelSlice, OwnedScanSlice, ScanSlice, VolumeAttr,
    VolumeError, VolumeFormat, VolumeHeader, VolumeResult, Voxel,
};

pub mod consts;

pub mod augment;
pub mod dataset;
pub mod prelude;
pub mod preprocess;

#![warn(missing_docs)]

//! 心脏超声分割网络的解码器组件, 基于 burn.
//!
//! - [`attention`]: 注意力门控上采样模块;
//! - [`blocks`]: 预激活残差块;
//! - [`interpolate`]: 角点对齐的三线性插值;
//! - [`data`]: 将 `echo_berry` 的 CAMUS 数据集接入 burn 的 `Dataset`/`Batcher`.

pub mod attention;
pub mod blocks;
pub mod data;
pub mod interpolate;

pub use attention::{AttentionGate, AttentionGateConfig, AttentionUpBlock, AttentionUpBlockConfig};
pub use blocks::{BlockKind, NormKind};

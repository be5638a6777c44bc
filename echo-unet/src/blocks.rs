//! 残差卷积块. 采用预激活顺序: 归一化 -> ReLU -> 卷积.

use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, InstanceNorm, InstanceNormConfig, PaddingConfig3d};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

/// 归一化层类型.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum NormKind {
    /// `BatchNorm3d`.
    #[default]
    Batch,

    /// `InstanceNorm3d`, 不带仿射参数.
    Instance,
}

/// 残差块类型.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum BlockKind {
    /// 两个 `k x k x k` 卷积.
    #[default]
    Basic,

    /// `1 -> k -> 1` 三个卷积, 中间通道数为输出通道数的 1/4.
    Bottleneck,
}

impl BlockKind {
    /// 瓶颈块中间通道数相对输出通道数的压缩倍率.
    pub const EXPANSION: usize = 4;
}

/// [`ConvNorm`] 配置.
#[derive(Config, Debug)]
pub struct ConvNormConfig {
    /// 输入通道数.
    pub in_channels: usize,

    /// 输出通道数.
    pub out_channels: usize,

    /// 卷积核大小. 各方向补零 `k / 2`, 保持空间尺寸.
    #[config(default = "[3, 3, 3]")]
    pub kernel_size: [usize; 3],

    /// 归一化类型.
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
}

impl ConvNormConfig {
    /// 初始化.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNorm<B> {
        let [kd, kh, kw] = self.kernel_size;
        let conv = Conv3dConfig::new([self.in_channels, self.out_channels], self.kernel_size)
            .with_padding(PaddingConfig3d::Explicit(kd / 2, kh / 2, kw / 2))
            .with_bias(false)
            .init(device);
        let (batch, instance) = match self.norm {
            NormKind::Batch => (Some(BatchNormConfig::new(self.in_channels).init(device)), None),
            NormKind::Instance => (
                None,
                Some(
                    InstanceNormConfig::new(self.in_channels)
                        .with_affine(false)
                        .init(device),
                ),
            ),
        };
        ConvNorm {
            batch,
            instance,
            conv,
        }
    }
}

/// 预激活卷积单元: 归一化 -> ReLU -> 卷积.
#[derive(Module, Debug)]
pub struct ConvNorm<B: Backend> {
    batch: Option<BatchNorm<B, 3>>,
    instance: Option<InstanceNorm<B>>,
    conv: Conv3d<B>,
}

impl<B: Backend> ConvNorm<B> {
    /// `[N, C_in, D, H, W]` -> `[N, C_out, D, H, W]`.
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let x = match (&self.batch, &self.instance) {
            (Some(norm), _) => norm.forward(x),
            (None, Some(norm)) => norm.forward(x),
            (None, None) => x,
        };
        self.conv.forward(relu(x))
    }
}

/// [`ResBlock`] 配置.
#[derive(Config, Debug)]
pub struct ResBlockConfig {
    /// 输入通道数.
    pub in_channels: usize,

    /// 输出通道数.
    pub out_channels: usize,

    /// 块类型.
    #[config(default = "BlockKind::Basic")]
    pub block: BlockKind,

    /// 主路径卷积核大小.
    #[config(default = "[3, 3, 3]")]
    pub kernel_size: [usize; 3],

    /// 归一化类型.
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
}

impl ResBlockConfig {
    /// 初始化. 输入输出通道数不同时, 捷径为 `1 x 1 x 1` 投影.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResBlock<B> {
        let unit = |cin: usize, cout: usize, kernel_size: [usize; 3]| {
            ConvNormConfig::new(cin, cout)
                .with_kernel_size(kernel_size)
                .with_norm(self.norm)
                .init(device)
        };
        let (cin, cout, k) = (self.in_channels, self.out_channels, self.kernel_size);

        let convs = match self.block {
            BlockKind::Basic => vec![unit(cin, cout, k), unit(cout, cout, k)],
            BlockKind::Bottleneck => {
                let mid = (cout / BlockKind::EXPANSION).max(1);
                vec![
                    unit(cin, mid, [1, 1, 1]),
                    unit(mid, mid, k),
                    unit(mid, cout, [1, 1, 1]),
                ]
            }
        };
        let shortcut = (cin != cout).then(|| unit(cin, cout, [1, 1, 1]));
        ResBlock { convs, shortcut }
    }
}

/// 预激活残差块.
#[derive(Module, Debug)]
pub struct ResBlock<B: Backend> {
    convs: Vec<ConvNorm<B>>,
    shortcut: Option<ConvNorm<B>>,
}

impl<B: Backend> ResBlock<B> {
    /// `[N, C_in, D, H, W]` -> `[N, C_out, D, H, W]`.
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let residual = match &self.shortcut {
            Some(proj) => proj.forward(x.clone()),
            None => x.clone(),
        };
        let out = self.convs.iter().fold(x, |acc, unit| unit.forward(acc));
        out + residual
    }

    /// 主路径卷积单元个数.
    #[inline]
    pub fn depth(&self) -> usize {
        self.convs.len()
    }

    /// 是否带有投影捷径?
    #[inline]
    pub fn has_projection(&self) -> bool {
        self.shortcut.is_some()
    }
}

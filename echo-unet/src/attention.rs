//! 注意力门控上采样模块.
//!
//! 解码器的粗分辨率特征先三线性插值到编码器跳连特征的空间尺寸, 再由注意力门
//! 计算逐体素的相关性 `psi`, 用于加权跳连特征. 加权后的跳连特征与上采样特征
//! 在通道维拼接, 最后经过若干残差块得到输出.

use crate::blocks::{BlockKind, NormKind, ResBlock, ResBlockConfig};
use crate::interpolate::trilinear_align_corners;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{InstanceNorm, InstanceNormConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};

/// [`AttentionGate`] 配置.
#[derive(Config, Debug)]
pub struct AttentionGateConfig {
    /// 门控信号 (上采样后的粗特征) 通道数.
    pub gate_channels: usize,

    /// 跳连特征通道数.
    pub skip_channels: usize,

    /// 中间通道数.
    pub inter_channels: usize,
}

impl AttentionGateConfig {
    /// 初始化.
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionGate<B> {
        let project = |cin: usize, cout: usize| {
            Conv3dConfig::new([cin, cout], [1, 1, 1])
                .with_bias(false)
                .init(device)
        };
        let norm = |channels: usize| {
            InstanceNormConfig::new(channels)
                .with_affine(false)
                .init(device)
        };
        AttentionGate {
            w_g: project(self.gate_channels, self.inter_channels),
            w_g_norm: norm(self.inter_channels),
            w_x: project(self.skip_channels, self.inter_channels),
            w_x_norm: norm(self.inter_channels),
            psi: project(self.inter_channels, 1),
            psi_norm: norm(1),
        }
    }
}

/// 注意力门.
#[derive(Module, Debug)]
pub struct AttentionGate<B: Backend> {
    w_g: Conv3d<B>,
    w_g_norm: InstanceNorm<B>,
    w_x: Conv3d<B>,
    w_x_norm: InstanceNorm<B>,
    psi: Conv3d<B>,
    psi_norm: InstanceNorm<B>,
}

impl<B: Backend> AttentionGate<B> {
    /// 逐体素相关性 `[N, 1, D, H, W]`, 取值位于 `[0, 1]`.
    ///
    /// `g` 与 `x` 的空间尺寸必须相同.
    pub fn attention_map(&self, g: Tensor<B, 5>, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let g1 = self.w_g_norm.forward(self.w_g.forward(g));
        let x1 = self.w_x_norm.forward(self.w_x.forward(x));
        let psi = self.psi.forward(relu(g1 + x1));
        sigmoid(self.psi_norm.forward(psi))
    }

    /// 以相关性加权跳连特征 `x`. 输出形状与 `x` 相同.
    pub fn forward(&self, g: Tensor<B, 5>, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let psi = self.attention_map(g, x.clone());
        let psi = psi.expand(x.dims());
        x * psi
    }
}

/// [`AttentionUpBlock`] 配置.
#[derive(Config, Debug)]
pub struct AttentionUpBlockConfig {
    /// 粗特征通道数.
    pub in_channels: usize,

    /// 跳连特征通道数, 同时也是输出通道数.
    pub out_channels: usize,

    /// 残差块个数.
    #[config(default = "2")]
    pub num_blocks: usize,

    /// 残差块类型.
    #[config(default = "BlockKind::Basic")]
    pub block: BlockKind,

    /// 残差块卷积核大小.
    #[config(default = "[3, 3, 3]")]
    pub kernel_size: [usize; 3],

    /// 名义上采样倍率. 实际插值目标总是跳连特征的空间尺寸, 该值仅作记录.
    #[config(default = "[2, 2, 2]")]
    pub up_scale: [usize; 3],

    /// 归一化类型.
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
}

impl AttentionUpBlockConfig {
    /// 初始化. `num_blocks` 为 0 时程序 panic.
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionUpBlock<B> {
        assert!(self.num_blocks > 0, "至少需要一个残差块");
        let (cin, cout) = (self.in_channels, self.out_channels);
        let attn = AttentionGateConfig::new(cin, cout, (cout / 2).max(1)).init(device);

        let block = |c: usize| {
            ResBlockConfig::new(c, cout)
                .with_block(self.block)
                .with_kernel_size(self.kernel_size)
                .with_norm(self.norm)
                .init(device)
        };
        let blocks = std::iter::once(block(cin + cout))
            .chain((1..self.num_blocks).map(|_| block(cout)))
            .collect();
        log::debug!(
            "attention up block: {cin} + {cout} -> {cout}, {} x {:?}",
            self.num_blocks,
            self.block
        );

        AttentionUpBlock { attn, blocks }
    }
}

/// 注意力门控上采样模块.
#[derive(Module, Debug)]
pub struct AttentionUpBlock<B: Backend> {
    attn: AttentionGate<B>,
    blocks: Vec<ResBlock<B>>,
}

impl<B: Backend> AttentionUpBlock<B> {
    /// `coarse`: `[N, in, d, h, w]`, `skip`: `[N, out, D, H, W]` -> `[N, out, D, H, W]`.
    pub fn forward(&self, coarse: Tensor<B, 5>, skip: Tensor<B, 5>) -> Tensor<B, 5> {
        let [_, _, d, h, w] = skip.dims();
        let up = trilinear_align_corners(coarse, [d, h, w]);
        let gated = self.attn.forward(up.clone(), skip);
        let out = Tensor::cat(vec![gated, up], 1);
        self.blocks.iter().fold(out, |acc, block| block.forward(acc))
    }

    /// 注意力门.
    #[inline]
    pub fn gate(&self) -> &AttentionGate<B> {
        &self.attn
    }

    /// 残差块个数.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray;

    #[test]
    fn test_gate_shape_and_range() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(8, 4, 2).init::<B>(&device);
        let g = Tensor::<B, 5>::random([2, 8, 3, 4, 4], Distribution::Default, &device);
        let x = Tensor::<B, 5>::random([2, 4, 3, 4, 4], Distribution::Default, &device);

        let psi = gate.attention_map(g.clone(), x.clone());
        assert_eq!(psi.dims(), [2, 1, 3, 4, 4]);
        let values = psi.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));

        assert_eq!(gate.forward(g, x).dims(), [2, 4, 3, 4, 4]);
    }

    #[test]
    fn test_gate_zero_skip() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(2, 3, 1).init::<B>(&device);
        let g = Tensor::<B, 5>::random([1, 2, 2, 2, 2], Distribution::Default, &device);
        let x = Tensor::<B, 5>::zeros([1, 3, 2, 2, 2], &device);
        let out = gate.forward(g, x).into_data().to_vec::<f32>().unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_up_block_output_shape() {
        let device = Default::default();
        let config = AttentionUpBlockConfig::new(8, 4);
        assert_eq!(config.up_scale, [2, 2, 2]);
        let up = config.init::<B>(&device);
        assert_eq!(up.num_blocks(), 2);

        let coarse = Tensor::<B, 5>::random([1, 8, 2, 2, 2], Distribution::Default, &device);
        let skip = Tensor::<B, 5>::random([1, 4, 4, 4, 4], Distribution::Default, &device);
        assert_eq!(up.forward(coarse, skip).dims(), [1, 4, 4, 4, 4]);
    }

    #[test]
    fn test_up_block_bottleneck_uneven_size() {
        let device = Default::default();
        let up = AttentionUpBlockConfig::new(16, 8)
            .with_num_blocks(1)
            .with_block(BlockKind::Bottleneck)
            .with_kernel_size([1, 3, 3])
            .with_norm(NormKind::Instance)
            .init::<B>(&device);

        let coarse = Tensor::<B, 5>::random([2, 16, 1, 3, 2], Distribution::Default, &device);
        let skip = Tensor::<B, 5>::random([2, 8, 1, 5, 4], Distribution::Default, &device);
        assert_eq!(up.forward(coarse, skip).dims(), [2, 8, 1, 5, 4]);
    }

    #[test]
    #[should_panic]
    fn test_up_block_without_blocks() {
        let device = Default::default();
        AttentionUpBlockConfig::new(4, 4)
            .with_num_blocks(0)
            .init::<B>(&device);
    }
}

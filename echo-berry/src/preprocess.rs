//! 体数据预处理: 强度截断与规范化, 对称补零, 平面尺寸截断.
//!
//! 处理顺序与训练时一致:
//!
//! 1. 以第 98 百分位数 `p` 为上限, 将强度截断到 `[0, p]` 并除以 `p`;
//! 2. 若某个平面方向小于训练尺寸, 在该方向两侧对称补零 (图像与标注同步);
//! 3. 保留左上角, 将平面尺寸截断到至多 [`CROP_BOUND`] x [`CROP_BOUND`].
//!
//! 补零发生在规范化之后还是之前不影响结果, 因为 0 在窗口 `[0, p]` 下仍被映射为 0.

use crate::consts::{CLIP_PERCENTILE, CROP_BOUND};
use crate::data::{EchoLabel, EchoScan, IntensityWindow, VolumeAttr};
use crate::Idx2d;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

/// 补零量的取整方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadRounding {
    /// 向下取整.
    Floor,

    /// 向上取整.
    Ceil,
}

/// 平面方向的对称补零规则.
///
/// 长度为 `n` 的方向在 `n < target` 时, 每侧补 `(target + margin - n) / 2` 个零,
/// 除法的取整方式由 `rounding` 决定. 任何合法规则都保证补零后长度不小于 `target`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PadPolicy {
    margin: usize,
    rounding: PadRounding,
}

impl PadPolicy {
    /// 基础加载器的规则: 额外留 10 个像素的余量, 向下取整.
    pub const BASIC: PadPolicy = PadPolicy {
        margin: 10,
        rounding: PadRounding::Floor,
    };

    /// 质量筛选加载器的规则: 不留余量, 向上取整.
    pub const QUALITY_FILTERED: PadPolicy = PadPolicy {
        margin: 0,
        rounding: PadRounding::Ceil,
    };

    /// 自定义规则.
    ///
    /// 向下取整且 `margin == 0` 时, 奇数缺口会差一个像素, 因此程序 panic.
    pub fn new(margin: usize, rounding: PadRounding) -> Self {
        assert!(
            rounding == PadRounding::Ceil || margin > 0,
            "向下取整的补零规则至少需要 1 个像素的余量"
        );
        Self { margin, rounding }
    }

    /// 长度为 `len` 的方向为达到 `target` 每侧需要补零的个数.
    #[inline]
    pub fn amount(&self, len: usize, target: usize) -> usize {
        if len >= target {
            return 0;
        }
        let deficit = target + self.margin - len;
        match self.rounding {
            PadRounding::Floor => deficit / 2,
            PadRounding::Ceil => (deficit + 1) / 2,
        }
    }
}

/// 预处理之后的一对图像/标注.
#[derive(Clone, Debug)]
pub struct PreparedVolume {
    /// 规范化到 `[0, 1]` 的图像, `(z, h, w)`.
    pub image: Array3<f32>,

    /// 类别索引标注, 与 `image` 同形.
    pub label: Array3<u8>,

    /// 体素分辨率 (毫米), `(z, h, w)`.
    pub spacing: [f64; 3],

    /// 截断所用的强度上限 (原始强度单位).
    pub clip: f32,
}

/// 按训练尺寸 `training_size` (高, 宽) 和补零规则 `pad` 预处理一对图像/标注.
///
/// 如果两者形状不一致, 则程序 panic.
pub fn preprocess(
    scan: EchoScan,
    label: EchoLabel,
    training_size: Idx2d,
    pad: PadPolicy,
) -> PreparedVolume {
    assert_eq!(scan.shape(), label.shape(), "图像和标注形状不一致");
    let spacing = label.spacing();

    let mut image = scan.into_raw();
    let window = {
        let values = image.as_slice_memory_order().map_or_else(
            || image.iter().copied().collect::<Vec<_>>(),
            <[f32]>::to_vec,
        );
        IntensityWindow::from_percentile(&values, CLIP_PERCENTILE)
            .or_else(|| IntensityWindow::new(0.0, 0.0))
    };
    if let Some(window) = window {
        window.apply(image.view_mut());
    }

    let (image, label) = pad_symmetric(image.view(), label.data(), training_size, pad);
    let (image, label) = truncate(image.view(), label.view(), (CROP_BOUND, CROP_BOUND));

    PreparedVolume {
        image,
        label,
        spacing,
        clip: window.map_or(0.0, |w| w.upper_bound()),
    }
}

/// 对每个小于目标尺寸的平面方向两侧对称补零.
pub fn pad_symmetric(
    image: ArrayView3<f32>,
    label: ArrayView3<u8>,
    (th, tw): Idx2d,
    pad: PadPolicy,
) -> (Array3<f32>, Array3<u8>) {
    let (z, h, w) = image.dim();
    let (ph, pw) = (pad.amount(h, th), pad.amount(w, tw));
    let shape = (z, h + 2 * ph, w + 2 * pw);

    let mut out_image = Array3::<f32>::zeros(shape);
    let mut out_label = Array3::<u8>::zeros(shape);
    out_image
        .slice_mut(s![.., ph..ph + h, pw..pw + w])
        .assign(&image);
    out_label
        .slice_mut(s![.., ph..ph + h, pw..pw + w])
        .assign(&label);
    (out_image, out_label)
}

/// 保留左上角, 将平面尺寸截断到至多 `bound`.
pub fn truncate(
    image: ArrayView3<f32>,
    label: ArrayView3<u8>,
    (bh, bw): Idx2d,
) -> (Array3<f32>, Array3<u8>) {
    let (_, h, w) = image.dim();
    let (h, w) = (h.min(bh), w.min(bw));
    (
        image.slice(s![.., ..h, ..w]).to_owned(),
        label.slice(s![.., ..h, ..w]).to_owned(),
    )
}

/// 中心裁剪到至多 `size` (高, 宽). 小于 `size` 的方向保持不变.
pub fn center_crop(
    image: ArrayView3<f32>,
    label: ArrayView3<u8>,
    (th, tw): Idx2d,
) -> (Array3<f32>, Array3<u8>) {
    let (_, h, w) = image.dim();
    let (ch, cw) = (th.min(h), tw.min(w));
    let (y0, x0) = ((h - ch) / 2, (w - cw) / 2);
    (
        image.slice(s![.., y0..y0 + ch, x0..x0 + cw]).to_owned(),
        label.slice(s![.., y0..y0 + ch, x0..x0 + cw]).to_owned(),
    )
}

/// 以 `(y0, x0)` 为左上角从 2D 切片上裁剪 `size` 大小的区域. 超出部分补零.
pub fn crop_2d<T: Copy + Default>(
    data: ArrayView2<T>,
    (y0, x0): Idx2d,
    (th, tw): Idx2d,
) -> Array2<T> {
    let (h, w) = data.dim();
    let mut out = Array2::from_elem((th, tw), T::default());
    let (y1, x1) = ((y0 + th).min(h), (x0 + tw).min(w));
    if y0 < y1 && x0 < x1 {
        out.slice_mut(s![..y1 - y0, ..x1 - x0])
            .assign(&data.slice(s![y0..y1, x0..x1]));
    }
    out
}

//! 训练切片的在线数据增强.
//!
//! 对每一对 (图像, 标注) 切片依次施加:
//! 加性高斯噪声 -> 亮度平移 -> gamma 变换 -> 随机仿射 -> 随机裁剪.
//! 随机数发生器总是由调用者显式传入, 本模块不持有任何全局随机状态.

use crate::preprocess::{crop_2d, pad_symmetric, PadPolicy};
use crate::Idx2d;
use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// 各增强步骤的参数范围.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// 加性高斯噪声的标准差. 为 0 时跳过.
    pub noise_std: f32,

    /// 亮度平移量 (服从 `N(0, brightness_std)`) 的标准差. 为 0 时跳过.
    pub brightness_std: f32,

    /// gamma 的取值范围 `[lo, hi]`.
    pub gamma_range: (f32, f32),

    /// 缩放倍率的取值范围 `[lo, hi]`.
    pub scale_range: (f32, f32),

    /// 旋转角度的绝对值上限 (度).
    pub rotate_deg: f32,

    /// 平移量的绝对值上限, 以图像边长的比例计.
    pub translate: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            noise_std: 0.02,
            brightness_std: 0.1,
            gamma_range: (0.7, 1.5),
            scale_range: (0.85, 1.25),
            rotate_deg: 15.0,
            translate: 0.1,
        }
    }
}

impl AugmentConfig {
    /// 不做任何改变的参数组合 (随机裁剪除外).
    pub fn identity() -> Self {
        Self {
            noise_std: 0.0,
            brightness_std: 0.0,
            gamma_range: (1.0, 1.0),
            scale_range: (1.0, 1.0),
            rotate_deg: 0.0,
            translate: 0.0,
        }
    }

    /// 检查参数是否合法. 不合法时返回描述信息.
    pub fn validate(&self) -> Result<(), &'static str> {
        let finite_non_neg = |v: f32| v.is_finite() && v >= 0.0;
        let range_ok =
            |(lo, hi): (f32, f32)| lo.is_finite() && hi.is_finite() && 0.0 < lo && lo <= hi;
        if !finite_non_neg(self.noise_std) {
            return Err("noise_std must be a finite non-negative number");
        }
        if !finite_non_neg(self.brightness_std) {
            return Err("brightness_std must be a finite non-negative number");
        }
        if !range_ok(self.gamma_range) {
            return Err("gamma_range must satisfy 0 < lo <= hi");
        }
        if !range_ok(self.scale_range) {
            return Err("scale_range must satisfy 0 < lo <= hi");
        }
        if !finite_non_neg(self.rotate_deg) {
            return Err("rotate_deg must be a finite non-negative number");
        }
        if !(finite_non_neg(self.translate) && self.translate < 1.0) {
            return Err("translate must lie in [0, 1)");
        }
        Ok(())
    }
}

/// 在闭区间 `[lo, hi]` 上均匀采样. 区间退化时直接返回 `lo`.
#[inline]
fn uniform<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f32, f32)) -> f32 {
    if lo < hi {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// 在 `[-bound, bound]` 上均匀采样.
#[inline]
fn symmetric<R: Rng + ?Sized>(rng: &mut R, bound: f32) -> f32 {
    uniform(rng, (-bound, bound))
}

/// 逐像素加上 `N(0, std)` 噪声.
pub fn gaussian_noise<R: Rng + ?Sized>(image: &mut Array2<f32>, std: f32, rng: &mut R) {
    if std <= 0.0 {
        return;
    }
    if let Ok(normal) = Normal::new(0.0, std) {
        image.iter_mut().for_each(|v| *v += normal.sample(rng));
    }
}

/// 整幅图像加上同一个服从 `N(0, std)` 的平移量.
pub fn brightness_shift<R: Rng + ?Sized>(image: &mut Array2<f32>, std: f32, rng: &mut R) {
    if std <= 0.0 {
        return;
    }
    if let Ok(normal) = Normal::new(0.0, std) {
        let shift: f32 = normal.sample(rng);
        image.mapv_inplace(|v| v + shift);
    }
}

/// 对 `[min, max]` 归一化后的图像施加 `x^gamma`, 然后映射回原区间,
/// 并恢复原有的均值与标准差. 常数图像保持不变.
pub fn gamma_transform(image: &mut Array2<f32>, gamma: f32) {
    const EPS: f32 = 1e-7;
    let Some(mean) = image.mean() else {
        return;
    };
    let std = image.std(0.0);
    let (lo, hi) = image
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    if range <= EPS || std <= EPS {
        return;
    }

    image.mapv_inplace(|v| ((v - lo) / (range + EPS)).powf(gamma) * (range + EPS) + lo);

    let new_mean = image.mean().unwrap_or(mean);
    let new_std = image.std(0.0);
    image.mapv_inplace(|v| (v - new_mean) / (new_std + EPS) * std + mean);
}

/// 围绕图像中心的仿射变换参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AffineParams {
    /// 缩放倍率.
    pub scale: f32,

    /// 旋转角 (弧度), 在图像坐标系中顺时针为正.
    pub angle: f32,

    /// 平移量 (高, 宽方向, 像素).
    pub shift: (f32, f32),
}

impl AffineParams {
    /// 恒等变换.
    pub const IDENTITY: AffineParams = AffineParams {
        scale: 1.0,
        angle: 0.0,
        shift: (0.0, 0.0),
    };

    /// 输出像素 `(y, x)` 在输入图像中的 (浮点) 位置.
    #[inline]
    fn source(&self, (y, x): (f32, f32), (cy, cx): (f32, f32)) -> (f32, f32) {
        let (sin, cos) = self.angle.sin_cos();
        let dy = y - cy - self.shift.0;
        let dx = x - cx - self.shift.1;
        let sx = (cos * dx + sin * dy) / self.scale + cx;
        let sy = (-sin * dx + cos * dy) / self.scale + cy;
        (sy, sx)
    }
}

/// 对图像 (双线性插值) 和标注 (最近邻) 施加同一个仿射变换, 输入范围外补零.
pub fn warp_affine(
    image: ArrayView2<f32>,
    label: ArrayView2<u8>,
    params: &AffineParams,
) -> (Array2<f32>, Array2<u8>) {
    let (h, w) = image.dim();
    let center = ((h as f32 - 1.0) / 2.0, (w as f32 - 1.0) / 2.0);
    let inside = |y: isize, x: isize| y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w;
    let pixel = |y: isize, x: isize| {
        if inside(y, x) {
            image[(y as usize, x as usize)]
        } else {
            0.0
        }
    };

    let mut out_image = Array2::<f32>::zeros((h, w));
    let mut out_label = Array2::<u8>::zeros((h, w));
    for ((y, x), v) in out_image.indexed_iter_mut() {
        let (sy, sx) = params.source((y as f32, x as f32), center);

        let (y0, x0) = (sy.floor(), sx.floor());
        let (fy, fx) = (sy - y0, sx - x0);
        let (y0, x0) = (y0 as isize, x0 as isize);
        *v = pixel(y0, x0) * (1.0 - fy) * (1.0 - fx)
            + pixel(y0, x0 + 1) * (1.0 - fy) * fx
            + pixel(y0 + 1, x0) * fy * (1.0 - fx)
            + pixel(y0 + 1, x0 + 1) * fy * fx;

        let (ny, nx) = (sy.round() as isize, sx.round() as isize);
        if inside(ny, nx) {
            out_label[(y, x)] = label[(ny as usize, nx as usize)];
        }
    }
    (out_image, out_label)
}

/// 随机裁剪到 `size`. 若某方向不足 `size`, 先在该方向两侧对称补零.
pub fn random_crop<R: Rng + ?Sized>(
    image: ArrayView2<f32>,
    label: ArrayView2<u8>,
    size: Idx2d,
    rng: &mut R,
) -> (Array2<f32>, Array2<u8>) {
    let (padded_image, padded_label) = pad_symmetric(
        image.insert_axis(Axis(0)),
        label.insert_axis(Axis(0)),
        size,
        PadPolicy::QUALITY_FILTERED,
    );
    let image = padded_image.index_axis_move(Axis(0), 0);
    let label = padded_label.index_axis_move(Axis(0), 0);

    let (h, w) = image.dim();
    let y0 = rng.gen_range(0..=h - size.0);
    let x0 = rng.gen_range(0..=w - size.1);
    (
        crop_2d(image.view(), (y0, x0), size),
        crop_2d(label.view(), (y0, x0), size),
    )
}

/// 完整的增强流水线.
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentConfig,
    crop: Idx2d,
}

impl Augmenter {
    /// 以参数 `config` 和裁剪尺寸 `crop` (高, 宽) 构建.
    pub fn new(config: AugmentConfig, crop: Idx2d) -> Self {
        Self { config, crop }
    }

    /// 参数.
    #[inline]
    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// 随机采样一组仿射参数. 平移量以 `shape` (高, 宽) 为基准.
    pub fn sample_affine<R: Rng + ?Sized>(&self, shape: Idx2d, rng: &mut R) -> AffineParams {
        let c = &self.config;
        AffineParams {
            scale: uniform(rng, c.scale_range),
            angle: symmetric(rng, c.rotate_deg).to_radians(),
            shift: (
                symmetric(rng, c.translate) * shape.0 as f32,
                symmetric(rng, c.translate) * shape.1 as f32,
            ),
        }
    }

    /// 对一对切片施加全部增强步骤. 返回的图像与标注形状均为裁剪尺寸.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        image: ArrayView2<f32>,
        label: ArrayView2<u8>,
        rng: &mut R,
    ) -> (Array2<f32>, Array2<u8>) {
        assert_eq!(image.dim(), label.dim(), "图像和标注形状不一致");
        let c = &self.config;

        let mut image = image.to_owned();
        gaussian_noise(&mut image, c.noise_std, rng);
        brightness_shift(&mut image, c.brightness_std, rng);
        gamma_transform(&mut image, uniform(rng, c.gamma_range));

        let params = self.sample_affine(image.dim(), rng);
        let (image, label) = if params == AffineParams::IDENTITY {
            (image, label.to_owned())
        } else {
            warp_affine(image.view(), label, &params)
        };

        random_crop(image.view(), label.view(), self.crop, rng)
    }
}

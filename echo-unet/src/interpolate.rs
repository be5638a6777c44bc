//! 体数据张量的三线性插值.
//!
//! burn 没有提供 3D 插值, 这里按空间维度依次做一维线性插值 (`align_corners = true`),
//! 三次一维插值的复合即三线性插值.

use burn::prelude::*;

/// `align_corners` 模式下, 长度 `len` 插值到 `out` 时每个输出位置的
/// (下邻索引, 上邻索引, 上邻权重).
///
/// 输出位置 `i` 对应输入坐标 `i * (len - 1) / (out - 1)`. `out == 1` 时取输入的第 0 个元素.
pub fn align_corners_weights(len: usize, out: usize) -> (Vec<i64>, Vec<i64>, Vec<f32>) {
    assert!(len > 0 && out > 0, "插值长度必须为正");
    let scale = if out > 1 {
        (len - 1) as f64 / (out - 1) as f64
    } else {
        0.0
    };

    let mut lo = Vec::with_capacity(out);
    let mut hi = Vec::with_capacity(out);
    let mut weight = Vec::with_capacity(out);
    for i in 0..out {
        let src = i as f64 * scale;
        let l = (src.floor() as usize).min(len - 1);
        let h = (l + 1).min(len - 1);
        lo.push(l as i64);
        hi.push(h as i64);
        weight.push((src - l as f64) as f32);
    }
    (lo, hi, weight)
}

/// 沿第 `dim` 维线性插值到长度 `out`.
pub fn linear_along<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    dim: usize,
    out: usize,
) -> Tensor<B, D> {
    let len = x.dims()[dim];
    if len == out {
        return x;
    }
    let device = x.device();
    let (lo, hi, weight) = align_corners_weights(len, out);

    let lo = Tensor::<B, 1, Int>::from_data(TensorData::new(lo, [out]), &device);
    let hi = Tensor::<B, 1, Int>::from_data(TensorData::new(hi, [out]), &device);
    let a = x.clone().select(dim, lo);
    let b = x.select(dim, hi);

    let mut shape = [1usize; D];
    shape[dim] = out;
    let weight = Tensor::<B, 1>::from_data(TensorData::new(weight, [out]), &device)
        .reshape(shape)
        .expand(a.dims());
    a.clone() + (b - a) * weight
}

/// 将 `[N, C, D, H, W]` 张量三线性插值到空间尺寸 `size`, 角点对齐.
pub fn trilinear_align_corners<B: Backend>(x: Tensor<B, 5>, size: [usize; 3]) -> Tensor<B, 5> {
    let x = linear_along(x, 2, size[0]);
    let x = linear_along(x, 3, size[1]);
    linear_along(x, 4, size[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_weights() {
        let (lo, hi, w) = align_corners_weights(2, 3);
        assert_eq!(lo, [0, 0, 1]);
        assert_eq!(hi, [1, 1, 1]);
        assert_close(&w, &[0.0, 0.5, 0.0]);

        let (lo, _, w) = align_corners_weights(5, 1);
        assert_eq!(lo, [0]);
        assert_close(&w, &[0.0]);

        let (lo, hi, w) = align_corners_weights(4, 2);
        assert_eq!(lo, [0, 3]);
        assert_eq!(hi, [1, 3]);
        assert_close(&w, &[0.0, 0.0]);
    }

    #[test]
    fn test_linear_along() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([0.0, 1.0], &device).reshape([1, 1, 2, 1, 1]);
        let y = linear_along(x, 2, 3);
        assert_eq!(y.dims(), [1, 1, 3, 1, 1]);
        assert_close(&y.into_data().to_vec::<f32>().unwrap(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_trilinear_preserves_linear_function() {
        let device = Default::default();
        // f(z, y, x) = z + 10y + 100x 在 2x2x2 网格上取值.
        let f = |z: usize, y: usize, x: usize| (z + 10 * y + 100 * x) as f32;
        let values: Vec<f32> = (0..8).map(|i| f(i / 4, (i / 2) % 2, i % 2)).collect();
        let x = Tensor::<B, 1>::from_data(TensorData::new(values, [8]), &device)
            .reshape([1, 1, 2, 2, 2]);

        let y = trilinear_align_corners(x, [3, 3, 5]);
        assert_eq!(y.dims(), [1, 1, 3, 3, 5]);
        let out = y.into_data().to_vec::<f32>().unwrap();
        let mut expected = Vec::new();
        for z in 0..3 {
            for h in 0..3 {
                for w in 0..5 {
                    expected.push(z as f32 * 0.5 + 10.0 * h as f32 * 0.5 + 100.0 * w as f32 * 0.25);
                }
            }
        }
        assert_close(&out, &expected);
    }

    #[test]
    fn test_same_size_is_identity() {
        let device = Default::default();
        let x = Tensor::<B, 5>::ones([2, 3, 4, 4, 4], &device);
        let y = trilinear_align_corners(x.clone(), [4, 4, 4]);
        assert_eq!(y.into_data(), x.into_data());
    }
}

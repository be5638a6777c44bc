use ndarray::{ArrayViewMut, Dimension};

/// 计算 `values` 的第 `q` 百分位数 (`0 <= q <= 100`), 相邻秩之间线性插值.
///
/// 与 numpy `percentile` 的默认 (`linear`) 方法一致. `values` 为空时返回 `None`.
pub fn percentile(values: &[f32], q: f64) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    assert!((0.0..=100.0).contains(&q), "百分位数必须位于 [0, 100]");

    let mut buf = values.to_vec();
    let rank = q / 100.0 * (buf.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;

    let (_, &mut v_lo, right) = buf.select_nth_unstable_by(lo, f32::total_cmp);
    if frac == 0.0 || right.is_empty() {
        return Some(v_lo);
    }
    let v_hi = right.iter().copied().min_by(f32::total_cmp).unwrap_or(v_lo);
    Some((v_lo as f64 + (v_hi as f64 - v_lo as f64) * frac) as f32)
}

/// 强度窗口. 窗口内的强度被线性映射到 `[0, 1]`, 窗口外的强度被截断.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    lower: f32,
    upper: f32,
}

impl IntensityWindow {
    /// 构建强度窗口.
    ///
    /// `lower` 和 `upper` 必须是有限值, 否则返回 `None`. 允许 `upper <= lower`,
    /// 此时窗口退化, 所有强度都被映射为 0.
    pub fn new(lower: f32, upper: f32) -> Option<IntensityWindow> {
        (lower.is_finite() && upper.is_finite()).then_some(Self { lower, upper })
    }

    /// 构建 `[0, percentile(values, q)]` 窗口. `values` 为空时返回 `None`.
    pub fn from_percentile(values: &[f32], q: f64) -> Option<IntensityWindow> {
        Self::new(0.0, percentile(values, q)?)
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗口是否退化 (上限不大于下限)?
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.upper <= self.lower
    }

    /// 求 `v` 在当前窗口下的规范化强度 (`0.0 <= value <= 1.0`).
    ///
    /// `NaN` 被映射为 0.
    pub fn eval(&self, v: f32) -> f32 {
        if self.is_degenerate() || v.is_nan() {
            return 0.0;
        }
        (v.clamp(self.lower, self.upper) - self.lower) / (self.upper - self.lower)
    }

    /// 就地规范化整个数组.
    pub fn apply<D: Dimension>(&self, mut data: ArrayViewMut<'_, f32, D>) {
        let window = *self;
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                data.par_mapv_inplace(|v| window.eval(v));
            } else {
                data.mapv_inplace(|v| window.eval(v));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_percentile_matches_linear_interpolation() {
        let v: Vec<f32> = (1..=100).map(|i| i as f32).collect();
        // numpy.percentile(range(1, 101), 98) == 98.02
        assert!(float_eq(percentile(&v, 98.0).unwrap(), 98.02));
        assert!(float_eq(percentile(&v, 0.0).unwrap(), 1.0));
        assert!(float_eq(percentile(&v, 100.0).unwrap(), 100.0));
        assert!(float_eq(percentile(&[3.0, 1.0, 2.0], 50.0).unwrap(), 2.0));
        assert!(float_eq(percentile(&[4.0, 1.0], 25.0).unwrap(), 1.75));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_window_eval() {
        let w = IntensityWindow::new(0.0, 200.0).unwrap();
        assert_eq!(w.eval(-5.0), 0.0);
        assert_eq!(w.eval(0.0), 0.0);
        assert!(float_eq(w.eval(50.0), 0.25));
        assert_eq!(w.eval(200.0), 1.0);
        assert_eq!(w.eval(1e9), 1.0);
        assert_eq!(w.eval(f32::NAN), 0.0);
        assert_eq!(w.eval(f32::INFINITY), 1.0);
    }

    #[test]
    fn test_window_invalid_and_degenerate() {
        assert!(IntensityWindow::new(0.0, f32::NAN).is_none());
        let w = IntensityWindow::new(0.0, 0.0).unwrap();
        assert!(w.is_degenerate());
        assert_eq!(w.eval(10.0), 0.0);
    }

    #[test]
    fn test_window_apply() {
        let mut a = array![[0.0f32, 10.0], [20.0, 40.0]];
        IntensityWindow::new(0.0, 20.0).unwrap().apply(a.view_mut());
        assert_eq!(a, array![[0.0, 0.5], [1.0, 1.0]]);
    }
}

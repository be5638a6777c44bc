//! 数据集统计结果.

use echo_berry::consts::View;
use echo_berry::dataset::{CamusDataset, Variant};
use echo_berry::Idx2d;
use itertools::Itertools;
use ndarray::ArrayView2;
use std::collections::BTreeMap;
use std::fmt;

/// 分隔线.
pub const SEP: &str = "--------------------------------------------------------";

const S4: &str = "    ";

/// 标签各类别的像素计数: \[背景, 心内膜, 心肌, 左心房\]. 其余取值计入 `other`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassHistogram {
    counts: [usize; 4],
    other: usize,
}

impl ClassHistogram {
    /// 累加一张标注切片.
    pub fn add(&mut self, label: ArrayView2<u8>) {
        for &p in label.iter() {
            match self.counts.get_mut(p as usize) {
                Some(c) => *c += 1,
                None => self.other += 1,
            }
        }
    }

    /// 像素总数.
    pub fn total(&self) -> usize {
        self.counts.iter().sum::<usize>() + self.other
    }

    /// 第 `class` 类所占比例, 超出类别范围时给出 `other` 的比例. 没有像素时返回 `None`.
    pub fn fraction(&self, class: usize) -> Option<f64> {
        let total = self.total();
        let count = self.counts.get(class).copied().unwrap_or(self.other);
        (total > 0).then(|| count as f64 / total as f64)
    }
}

/// 每个轴上的最小/最大值.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpacingRange {
    bounds: Option<([f64; 3], [f64; 3])>,
}

impl SpacingRange {
    /// 纳入一个体素分辨率.
    pub fn add(&mut self, spacing: [f64; 3]) {
        self.bounds = Some(match self.bounds {
            None => (spacing, spacing),
            Some((mut lo, mut hi)) => {
                for i in 0..3 {
                    lo[i] = lo[i].min(spacing[i]);
                    hi[i] = hi[i].max(spacing[i]);
                }
                (lo, hi)
            }
        });
    }

    /// `(最小值, 最大值)`.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        self.bounds
    }
}

/// 概览结果.
#[derive(Clone, Debug)]
pub struct SurveyReport {
    variant: Variant,
    training_size: Idx2d,
    train_patients: usize,
    test_patients: usize,
    train_slices: usize,
    test_volumes: usize,
    slices_by_view: BTreeMap<View, usize>,
    slice_shapes: BTreeMap<Idx2d, usize>,
    classes: ClassHistogram,
    mean_intensity: Option<f64>,
    test_spacing: SpacingRange,
}

impl SurveyReport {
    /// 遍历数据集的两个视图, 汇总统计.
    pub fn collect(ds: &CamusDataset) -> Self {
        let train = ds.train_view();
        let test = ds.test_view();

        let mut slices_by_view = BTreeMap::new();
        let mut slice_shapes = BTreeMap::new();
        let mut classes = ClassHistogram::default();
        let (mut sum, mut pixels) = (0f64, 0usize);
        for sli in train.iter() {
            *slices_by_view.entry(sli.source.view).or_insert(0) += 1;
            *slice_shapes.entry(sli.image.dim()).or_insert(0) += 1;
            classes.add(sli.label.view());
            sum += sli.image.iter().map(|&v| v as f64).sum::<f64>();
            pixels += sli.image.len();
        }

        let mut test_spacing = SpacingRange::default();
        test.iter().for_each(|v| test_spacing.add(v.spacing));

        Self {
            variant: ds.config().variant,
            training_size: ds.config().training_size,
            train_patients: ds.train_patients().len(),
            test_patients: ds.test_patients().len(),
            train_slices: train.len(),
            test_volumes: test.len(),
            slices_by_view,
            slice_shapes,
            classes,
            mean_intensity: (pixels > 0).then(|| sum / pixels as f64),
            test_spacing,
        }
    }
}

#[inline]
fn opt_to_display(f: Option<f64>) -> String {
    match f {
        Some(f) => format!("{f:.4}"),
        None => "/".to_string(),
    }
}

impl fmt::Display for SurveyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CAMUS survey ({:?}, training size {:?}):", self.variant, self.training_size)?;
        writeln!(
            f,
            "{S4}Patients: {} train / {} test",
            self.train_patients, self.test_patients
        )?;
        writeln!(
            f,
            "{S4}Samples: {} train slices / {} test volumes",
            self.train_slices, self.test_volumes
        )?;
        writeln!(
            f,
            "{S4}Train slices by view: {}",
            self.slices_by_view
                .iter()
                .map(|(v, n)| format!("{v}={n}"))
                .join(", ")
        )?;
        writeln!(
            f,
            "{S4}Train slice shapes: {}",
            self.slice_shapes
                .iter()
                .map(|((h, w), n)| format!("{h}x{w} ({n})"))
                .join(", ")
        )?;
        writeln!(
            f,
            "{S4}Class fractions: {}",
            ["background", "lv_endo", "lv_epi", "la"]
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{name}={}", opt_to_display(self.classes.fraction(i))))
                .join(", ")
        )?;
        writeln!(f, "{S4}Mean intensity: {}", opt_to_display(self.mean_intensity))?;
        match self.test_spacing.bounds() {
            Some((lo, hi)) => writeln!(f, "{S4}Test spacing (z, h, w): {lo:?} ..= {hi:?}"),
            None => writeln!(f, "{S4}Test spacing (z, h, w): /"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_histogram() {
        let mut h = ClassHistogram::default();
        assert_eq!(h.fraction(0), None);
        h.add(array![[0, 0], [1, 3]].view());
        h.add(array![[2, 9]].view());
        assert_eq!(h.total(), 6);
        assert_eq!(h.fraction(0), Some(2.0 / 6.0));
        assert_eq!(h.fraction(3), Some(1.0 / 6.0));
        // 超出类别范围的索引对应 `other`.
        assert_eq!(h.fraction(7), Some(1.0 / 6.0));
    }

    #[test]
    fn test_spacing_range() {
        let mut r = SpacingRange::default();
        assert_eq!(r.bounds(), None);
        r.add([1.0, 0.3, 0.2]);
        r.add([1.0, 0.15, 0.4]);
        assert_eq!(r.bounds(), Some(([1.0, 0.15, 0.2], [1.0, 0.3, 0.4])));
    }
}

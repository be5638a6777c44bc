use crate::Idx2d;
use ndarray::{Array2, ArrayView2};
use std::ops::Index;

/// 不可变、借用的二维水平标签切片.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`OwnedLabelSlice`].
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for LabelSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> LabelSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
        self.data.indexed_iter()
    }
}

/// 拥有所有权的二维水平标签切片.
///
/// `OwnedLabelSlice` 仅提供到 `LabelSlice` 的轻量转换.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedLabelSlice {
    data: Array2<u8>,
}

impl From<Array2<u8>> for OwnedLabelSlice {
    #[inline]
    fn from(data: Array2<u8>) -> Self {
        Self { data }
    }
}

impl OwnedLabelSlice {
    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> LabelSlice<'_> {
        LabelSlice::new(self.data.view())
    }
}

/// 不可变、借用的二维水平图像切片.
pub struct ScanSlice<'a> {
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> ScanSlice<'a> {
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 强度)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }
}

/// 拥有所有权的二维水平图像切片.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedScanSlice {
    data: Array2<f32>,
}

impl From<Array2<f32>> for OwnedScanSlice {
    #[inline]
    fn from(data: Array2<f32>) -> Self {
        Self { data }
    }
}

impl OwnedScanSlice {
    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> ScanSlice<'_> {
        ScanSlice::new(self.data.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_owned_round_trip() {
        let scan = OwnedScanSlice::from(array![[0.0f32, 0.5, 1.0]]);
        assert_eq!(scan.as_immut().shape(), (1, 3));
        assert_eq!(scan.as_immut()[(0, 1)], 0.5);

        let label = OwnedLabelSlice::from(array![[0u8], [3]]);
        let pixels: Vec<_> = label.as_immut().indexed_iter().map(|(i, &p)| (i, p)).collect();
        assert_eq!(pixels, vec![((0, 0), 0), ((1, 0), 3)]);
    }
}

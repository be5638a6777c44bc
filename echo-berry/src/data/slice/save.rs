//! 切片的可视化存储.

use crate::{LabelSlice, ScanSlice};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 对于 `LabelSlice` 这类仅存在 0, 1, 2, 3 像素值的图像, 在保存时会映射到肉眼较易区分的灰度;
/// 对于 `ScanSlice`, 假定强度已规范化到 `[0, 1]`, 保存时线性映射到 `[0, 255]`.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使像素更有利于单通道可视化.
#[inline]
pub(crate) fn pretty(label: u8) -> u8 {
    use crate::consts::gray::*;
    match label {
        CAMUS_BACKGROUND => BLACK,
        CAMUS_LV_ENDO => WHITE,
        CAMUS_LV_EPI => GRAY,
        CAMUS_LA => DARK_GRAY,
        any_else => panic!("只允许图像存在 0, 1, 2, 3 像素, 但发现了 `{any_else}`"),
    }
}

/// 会将背景/心内膜/心肌/左心房像素分别映射为黑色/白色/灰色/暗灰色. 不允许其他值.
impl ImgWriteVis for LabelSlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, image::Luma([pretty(pix)]));
        }
        buf.save(path)
    }
}

/// 超出 `[0, 1]` 的强度会被截断.
impl ImgWriteVis for ScanSlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &v) in self.indexed_iter() {
            let gray = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
        }
        buf.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OwnedLabelSlice, OwnedScanSlice};
    use ndarray::array;

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let scan = OwnedScanSlice::from(array![[0.0f32, 0.5], [1.0, 2.0]]);
        let label = OwnedLabelSlice::from(array![[0u8, 1], [2, 3]]);
        let sp = dir.path().join("scan.png");
        let lp = dir.path().join("label.png");
        scan.as_immut().save(&sp).unwrap();
        label.as_immut().save(&lp).unwrap();

        let img = image::open(&sp).unwrap().to_luma8();
        assert_eq!(img.get_pixel(1, 0).0, [128]);
        assert_eq!(img.get_pixel(1, 1).0, [255]);
        let img = image::open(&lp).unwrap().to_luma8();
        assert_eq!(img.get_pixel(1, 0).0, [255]);
        assert_eq!(img.get_pixel(0, 1).0, [128]);
    }

    #[test]
    #[should_panic]
    fn test_pretty_rejects_unknown_label() {
        pretty(7);
    }
}

use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use num::ToPrimitive;

use crate::Idx3d;

mod error;
pub mod metaimage;
pub mod slice;
pub mod window;

pub use error::{VolumeError, VolumeResult};
pub use slice::{ImgWriteVis, LabelSlice, OwnedLabelSlice, OwnedScanSlice, ScanSlice};
pub use window::IntensityWindow;

use metaimage::MetaImage;

/// 体数据的形状与物理分辨率.
///
/// 两者都按照数组轴序 `(z, h, w)` 存储, 即与文件头部 `(x, y, z)` 的顺序相反.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VolumeHeader {
    shape: Idx3d,
    spacing: [f64; 3],
}

impl VolumeHeader {
    /// 直接构建.
    #[inline]
    pub fn new(shape: Idx3d, spacing: [f64; 3]) -> Self {
        Self { shape, spacing }
    }
}

/// 可以从文件中读取的体素类型.
///
/// 两种格式都先把体素解码为 `f64`, 再经 [`Voxel::from_f64`] 转换, 因此同一个非法值在
/// nifti 与 MetaImage 下得到相同的结果.
pub trait Voxel: Copy + Default + Send + Sync + 'static {
    /// 从解码后的体素值转换.
    fn from_f64(v: f64) -> VolumeResult<Self>;
}

impl Voxel for f32 {
    #[inline]
    fn from_f64(v: f64) -> VolumeResult<Self> {
        Ok(v as f32)
    }
}

impl Voxel for u8 {
    fn from_f64(v: f64) -> VolumeResult<Self> {
        match v.to_u8() {
            Some(p) if v.fract() == 0.0 => Ok(p),
            _ => Err(VolumeError::LabelOutOfRange(v)),
        }
    }
}

/// 体数据文件格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VolumeFormat {
    /// `.nii`, `.nii.gz`
    Nifti,

    /// `.mhd`, `.mha`
    MetaImage,
}

impl VolumeFormat {
    /// 根据文件名后缀判断格式.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Some(Self::Nifti)
        } else if name.ends_with(".mhd") || name.ends_with(".mha") {
            Some(Self::MetaImage)
        } else {
            None
        }
    }
}

/// 读取 nifti 或 MetaImage 体数据, 并统一转换为 `(z, h, w)` 轴序.
pub fn read_volume<T: Voxel, P: AsRef<Path>>(
    path: P,
) -> VolumeResult<(VolumeHeader, Array3<T>)> {
    let path = path.as_ref();
    match VolumeFormat::from_path(path) {
        Some(VolumeFormat::Nifti) => read_nifti(path),
        Some(VolumeFormat::MetaImage) => read_metaimage(path),
        None => Err(VolumeError::UnsupportedFormat(path.to_owned())),
    }
}

fn read_nifti<T: Voxel>(path: &Path) -> VolumeResult<(VolumeHeader, Array3<T>)> {
    let obj = ReaderOptions::new().read_file(path)?;
    // [W, H, z]. 2D 图像的 z 维可能为 0.
    let [_, w, h, z, ..] = obj.header().dim;
    let [_, pw, ph, pz, ..] = obj.header().pixdim;
    let shape = (z.max(1) as usize, h.max(1) as usize, w.max(1) as usize);
    let pz = if pz > 0.0 { pz as f64 } else { 1.0 };
    let spacing = [pz, ph as f64, pw as f64];

    // [W, H, z] -> [z, H, W], 逻辑顺序迭代即为行优先.
    let data = obj.into_volume().into_ndarray::<f64>()?.reversed_axes();
    let raw = data
        .iter()
        .map(|&v| T::from_f64(v))
        .collect::<VolumeResult<Vec<T>>>()?;
    let data = Array3::from_shape_vec(shape, raw)?;

    Ok((VolumeHeader { shape, spacing }, data))
}

fn read_metaimage<T: Voxel>(path: &Path) -> VolumeResult<(VolumeHeader, Array3<T>)> {
    let img = MetaImage::open(path)?;
    let shape = img.header().shape_zyx();
    let spacing = img.header().spacing_zyx();

    // x 变化最快, 恰好是 (z, y, x) 的行优先布局.
    let raw = img
        .decode()
        .into_iter()
        .map(T::from_f64)
        .collect::<VolumeResult<Vec<T>>>()?;
    let data = Array3::from_shape_vec(shape, raw)?;

    Ok((VolumeHeader { shape, spacing }, data))
}

/// 3D 体数据头部的共用属性和部分通用操作.
pub trait VolumeAttr {
    /// 获取 header 部分.
    fn header(&self) -> &VolumeHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.header().shape
    }

    /// 获取单个体素分辨率 (毫米), 顺序为 `(z, h, w)`.
    #[inline]
    fn spacing(&self) -> [f64; 3] {
        self.header().spacing
    }
}

/// 3D 超声图像. 强度值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct EchoScan {
    header: VolumeHeader,
    data: Array3<f32>,
}

impl VolumeAttr for EchoScan {
    #[inline]
    fn header(&self) -> &VolumeHeader {
        &self.header
    }
}

impl Index<Idx3d> for EchoScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl EchoScan {
    /// 打开 nii 或 mhd/mha 格式的超声图像.
    pub fn open<P: AsRef<Path>>(path: P) -> VolumeResult<Self> {
        let (header, data) = read_volume(path)?;
        Ok(Self { header, data })
    }

    /// 由 `(z, h, w)` 数据和同顺序的分辨率直接构建.
    pub fn from_parts(data: Array3<f32>, spacing: [f64; 3]) -> Self {
        let header = VolumeHeader::new(data.dim(), spacing);
        Self { header, data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<f32> {
        self.data
    }
}

/// 3D 超声分割标注. 标签值以 `u8` 类别索引保存.
#[derive(Debug, Clone)]
pub struct EchoLabel {
    header: VolumeHeader,
    data: Array3<u8>,
}

impl VolumeAttr for EchoLabel {
    #[inline]
    fn header(&self) -> &VolumeHeader {
        &self.header
    }
}

impl Index<Idx3d> for EchoLabel {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl EchoLabel {
    /// 打开 nii 或 mhd/mha 格式的分割标注.
    /// 非整数或超出 `u8` 的体素值会返回 [`VolumeError::LabelOutOfRange`].
    pub fn open<P: AsRef<Path>>(path: P) -> VolumeResult<Self> {
        let (header, data) = read_volume(path)?;
        Ok(Self { header, data })
    }

    /// 由 `(z, h, w)` 数据和同顺序的分辨率直接构建.
    pub fn from_parts(data: Array3<u8>, spacing: [f64; 3]) -> Self {
        let header = VolumeHeader::new(data.dim(), spacing);
        Self { header, data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }
}

/// 超声图像与对应的标注.
///
/// 该结构完全透明, 仅包含两个公开的 `scan` 和 `label` 子结构.
#[derive(Debug, Clone)]
pub struct EchoData3d {
    /// 3D 超声图像.
    pub scan: EchoScan,

    /// 3D 分割标注.
    pub label: EchoLabel,
}

impl EchoData3d {
    /// 分别打开图像和对应标注. 如果任一文件打开失败, 则返回 `Err`.
    /// 若两个文件的数据形状不一致, 则程序 `panic`.
    pub fn open(
        scan_path: impl AsRef<Path>,
        label_path: impl AsRef<Path>,
    ) -> VolumeResult<Self> {
        let scan = EchoScan::open(scan_path.as_ref())?;
        let label = EchoLabel::open(label_path.as_ref())?;
        assert_eq!(
            scan.shape(),
            label.shape(),
            "图像和标注形状不一致: {}",
            scan_path.as_ref().display()
        );
        Ok(Self { scan, label })
    }

    /// 拆分为图像和标注.
    #[inline]
    pub fn into_parts(self) -> (EchoScan, EchoLabel) {
        (self.scan, self.label)
    }
}

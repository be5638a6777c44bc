//! CAMUS 数据集加载器.
//!
//! 构建时一次性读取并预处理划分后的全部体数据: 训练集按 z 轴拆成 2D 切片缓存,
//! 测试集保留完整体数据和体素分辨率. 之后切换训练/测试视图不会重新读取文件.

use super::config::{CamusConfig, Variant};
use super::split::{self, Split};
use super::{manifest, quality, LoadError, LoadResult};
use crate::augment::Augmenter;
use crate::consts::{Phase, View};
use crate::preprocess::{center_crop, preprocess, PadPolicy, PreparedVolume};
use crate::{EchoData3d, Idx2d, VolumeAttr};
use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// 数据集当前提供的视图.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Mode {
    /// 训练集 2D 切片.
    #[default]
    Train,

    /// 测试集 3D 体数据.
    Test,
}

/// 一次采集: 患者, 切面, 时相.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Acquisition {
    /// 患者标识.
    pub patient: String,

    /// 切面.
    pub view: View,

    /// 时相.
    pub phase: Phase,
}

impl Acquisition {
    /// 文件名主干, 形如 `patient0001_2CH_ED`.
    #[inline]
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.patient, self.view, self.phase)
    }

    /// 图像文件路径 `{root}/{stem}.{ext}`.
    pub fn image_path(&self, root: &Path, ext: &str) -> PathBuf {
        root.join(format!("{}.{ext}", self.stem()))
    }

    /// 标注文件路径 `{root}/{stem}_gt.{ext}`.
    pub fn label_path(&self, root: &Path, ext: &str) -> PathBuf {
        root.join(format!("{}_gt.{ext}", self.stem()))
    }
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// 缓存的训练切片.
#[derive(Clone, Debug)]
pub struct TrainSlice {
    /// 来源.
    pub source: Acquisition,

    /// 在来源体数据中的 z 索引.
    pub z: usize,

    /// 规范化后的图像.
    pub image: Array2<f32>,

    /// 标注.
    pub label: Array2<u8>,

    /// 平面分辨率 (高, 宽), 毫米.
    pub spacing: [f64; 2],
}

/// 缓存的测试体数据.
#[derive(Clone, Debug)]
pub struct TestVolume {
    /// 来源.
    pub source: Acquisition,

    /// 规范化后的图像, `(z, h, w)`.
    pub image: Array3<f32>,

    /// 标注.
    pub label: Array3<u8>,

    /// 体素分辨率 `(z, h, w)`, 毫米.
    pub spacing: [f64; 3],
}

/// 数据集返回的样本.
#[derive(Clone, Debug, PartialEq)]
pub enum Sample {
    /// 训练样本: 一对 2D 切片.
    Slice {
        /// 图像.
        image: Array2<f32>,

        /// 标注.
        label: Array2<u8>,
    },

    /// 测试样本: 中心裁剪后的一对体数据及其体素分辨率.
    Volume {
        /// 图像.
        image: Array3<f32>,

        /// 标注.
        label: Array3<u8>,

        /// 体素分辨率 `(z, h, w)`.
        spacing: [f64; 3],
    },
}

impl Sample {
    /// 图像与标注的形状, 2D 样本的 z 维为 1.
    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            Sample::Slice { image, .. } => {
                let (h, w) = image.dim();
                (1, h, w)
            }
            Sample::Volume { image, .. } => image.dim(),
        }
    }
}

/// 训练集视图. 与数据集的当前模式无关.
#[derive(Clone, Copy)]
pub struct TrainView<'a> {
    slices: &'a [TrainSlice],
    augmenter: Option<&'a Augmenter>,
    rng: &'a Mutex<StdRng>,
}

impl<'a> TrainView<'a> {
    /// 切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// 是否启用了在线增强?
    #[inline]
    pub fn is_augmented(&self) -> bool {
        self.augmenter.is_some()
    }

    /// 未经增强的缓存切片.
    #[inline]
    pub fn raw(&self, idx: usize) -> Option<&'a TrainSlice> {
        self.slices.get(idx)
    }

    /// 按顺序迭代缓存切片.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'a, TrainSlice> {
        self.slices.iter()
    }

    /// 获取第 `idx` 个训练样本. 启用增强时使用数据集自带的随机数发生器.
    pub fn get(&self, idx: usize) -> Option<(Array2<f32>, Array2<u8>)> {
        let sli = self.slices.get(idx)?;
        Some(match self.augmenter {
            Some(aug) => {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                aug.apply(sli.image.view(), sli.label.view(), &mut *rng)
            }
            None => (sli.image.clone(), sli.label.clone()),
        })
    }

    /// 获取第 `idx` 个训练样本. 启用增强时使用调用者提供的 `rng`.
    pub fn get_with<R: Rng + ?Sized>(
        &self,
        idx: usize,
        rng: &mut R,
    ) -> Option<(Array2<f32>, Array2<u8>)> {
        let sli = self.slices.get(idx)?;
        Some(match self.augmenter {
            Some(aug) => aug.apply(sli.image.view(), sli.label.view(), rng),
            None => (sli.image.clone(), sli.label.clone()),
        })
    }
}

/// 测试集视图. 与数据集的当前模式无关.
#[derive(Clone, Copy)]
pub struct TestView<'a> {
    volumes: &'a [TestVolume],
    crop: Idx2d,
}

impl<'a> TestView<'a> {
    /// 体数据个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// 未经裁剪的缓存体数据.
    #[inline]
    pub fn raw(&self, idx: usize) -> Option<&'a TestVolume> {
        self.volumes.get(idx)
    }

    /// 按顺序迭代缓存体数据.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'a, TestVolume> {
        self.volumes.iter()
    }

    /// 第 `idx` 个体数据的体素分辨率.
    #[inline]
    pub fn spacing(&self, idx: usize) -> Option<[f64; 3]> {
        self.volumes.get(idx).map(|v| v.spacing)
    }

    /// 获取第 `idx` 个测试样本: 中心裁剪到训练尺寸的图像, 标注, 以及体素分辨率.
    pub fn get(&self, idx: usize) -> Option<(Array3<f32>, Array3<u8>, [f64; 3])> {
        let vol = self.volumes.get(idx)?;
        let (image, label) = center_crop(vol.image.view(), vol.label.view(), self.crop);
        Some((image, label, vol.spacing))
    }
}

/// CAMUS 数据集.
///
/// 该结构是 `Send + Sync` 的. 唯一的内部可变状态是增强所用的随机数发生器.
pub struct CamusDataset {
    config: CamusConfig,
    split: Split,
    train: Vec<TrainSlice>,
    test: Vec<TestVolume>,
    mode: Mode,
    augmenter: Option<Augmenter>,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for CamusDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CamusDataset")
            .field("data_root", &self.config.data_root)
            .field("variant", &self.config.variant)
            .field("mode", &self.mode)
            .field("train_slices", &self.train.len())
            .field("test_volumes", &self.test.len())
            .finish()
    }
}

impl CamusDataset {
    /// 按配置读取并预处理整个数据集. 初始模式为 [`Mode::Train`].
    ///
    /// 任一文件缺失或格式错误都会返回 `Err`. 若某对图像和标注形状不一致, 则程序 panic.
    pub fn open(config: CamusConfig) -> LoadResult<Self> {
        config.validate()?;
        log::info!(
            "loading CAMUS ({:?}) from {}",
            config.variant,
            config.data_root.display()
        );

        let ids = manifest::read_manifest(&config.data_root)?;
        log::info!("{} patients in manifest", ids.len());
        let ids = split::shuffled(ids, config.seed);

        let views = retained_views(&config, &ids)?;
        let split = split::partition(ids, config.test_size);
        log::info!(
            "split: {} train / {} test patients",
            split.train.len(),
            split.test.len()
        );

        let pad = config.variant.pad_policy();
        let mut train = Vec::new();
        for acq in acquisitions(&split.train, &views) {
            let vol = load_prepared(&config, &acq, pad)?;
            let spacing = [vol.spacing[1], vol.spacing[2]];
            let slices = vol
                .image
                .axis_iter(Axis(0))
                .zip(vol.label.axis_iter(Axis(0)))
                .enumerate()
                .map(|(z, (image, label))| TrainSlice {
                    source: acq.clone(),
                    z,
                    image: image.to_owned(),
                    label: label.to_owned(),
                    spacing,
                });
            train.extend(slices);
        }

        let mut test = Vec::new();
        for acq in acquisitions(&split.test, &views) {
            let vol = load_prepared(&config, &acq, pad)?;
            test.push(TestVolume {
                source: acq,
                image: vol.image,
                label: vol.label,
                spacing: vol.spacing,
            });
        }
        log::info!(
            "load done: {} train slices, {} test volumes",
            train.len(),
            test.len()
        );

        let augmenter = config
            .augmentation
            .clone()
            .map(|aug| Augmenter::new(aug, config.training_size));
        let rng = Mutex::new(StdRng::seed_from_u64(config.seed));

        Ok(Self {
            config,
            split,
            train,
            test,
            mode: Mode::Train,
            augmenter,
            rng,
        })
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &CamusConfig {
        &self.config
    }

    /// 当前模式.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 切换模式. 不会重新读取任何数据.
    #[inline]
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// 训练集患者, 按打乱后的顺序排列.
    #[inline]
    pub fn train_patients(&self) -> &[String] {
        &self.split.train
    }

    /// 测试集患者, 按打乱后的顺序排列.
    #[inline]
    pub fn test_patients(&self) -> &[String] {
        &self.split.test
    }

    /// 训练集视图.
    #[inline]
    pub fn train_view(&self) -> TrainView<'_> {
        TrainView {
            slices: &self.train,
            augmenter: self.augmenter.as_ref(),
            rng: &self.rng,
        }
    }

    /// 测试集视图.
    #[inline]
    pub fn test_view(&self) -> TestView<'_> {
        TestView {
            volumes: &self.test,
            crop: self.config.training_size,
        }
    }

    /// 当前模式下的样本个数.
    pub fn len(&self) -> usize {
        match self.mode {
            Mode::Train => self.train.len(),
            Mode::Test => self.test.len(),
        }
    }

    /// 当前模式下是否没有样本?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前模式下第 `idx` 个样本. 越界时返回 `None`.
    pub fn get(&self, idx: usize) -> Option<Sample> {
        match self.mode {
            Mode::Train => self
                .train_view()
                .get(idx)
                .map(|(image, label)| Sample::Slice { image, label }),
            Mode::Test => self.test_sample(idx),
        }
    }

    /// 与 [`CamusDataset::get`] 相同, 但增强使用调用者提供的 `rng`.
    pub fn get_with<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Option<Sample> {
        match self.mode {
            Mode::Train => self
                .train_view()
                .get_with(idx, rng)
                .map(|(image, label)| Sample::Slice { image, label }),
            Mode::Test => self.test_sample(idx),
        }
    }

    fn test_sample(&self, idx: usize) -> Option<Sample> {
        self.test_view()
            .get(idx)
            .map(|(image, label, spacing)| Sample::Volume {
                image,
                label,
                spacing,
            })
    }
}

/// 每个患者保留的切面. 基础变体保留全部切面, 质量筛选变体只保留 `Good`/`Medium`.
fn retained_views(
    config: &CamusConfig,
    ids: &[String],
) -> LoadResult<HashMap<String, Vec<View>>> {
    let mut ans = HashMap::with_capacity(ids.len());
    for id in ids {
        let views = match config.variant {
            Variant::Basic => View::ALL.to_vec(),
            Variant::QualityFiltered => {
                let mut views = Vec::with_capacity(View::ALL.len());
                for view in View::ALL {
                    let q = quality::read_quality(config.info_root(), id, view)?;
                    if q.is_acceptable() {
                        views.push(view);
                    } else {
                        log::info!("skip {id} {view}: image quality {q}");
                    }
                }
                views
            }
        };
        ans.insert(id.clone(), views);
    }
    Ok(ans)
}

/// 按 患者 -> 切面 -> 时相 的顺序展开全部采集.
fn acquisitions<'a>(
    patients: &'a [String],
    views: &'a HashMap<String, Vec<View>>,
) -> impl Iterator<Item = Acquisition> + 'a {
    patients.iter().flat_map(move |p| {
        let retained = views.get(p).map(Vec::as_slice).unwrap_or_default();
        retained.iter().flat_map(move |&view| {
            Phase::ALL.into_iter().map(move |phase| Acquisition {
                patient: p.clone(),
                view,
                phase,
            })
        })
    })
}

/// 读取一次采集的图像和标注并预处理.
fn load_prepared(
    config: &CamusConfig,
    acq: &Acquisition,
    pad: PadPolicy,
) -> LoadResult<PreparedVolume> {
    let image_path = acq.image_path(&config.data_root, &config.extension);
    let label_path = acq.label_path(&config.data_root, &config.extension);
    let (scan, label) = EchoData3d::open(&image_path, &label_path)
        .map_err(|e| LoadError::Volume(image_path, e))?
        .into_parts();
    log::debug!("{acq}: shape {:?}, spacing {:?}", scan.shape(), label.spacing());
    Ok(preprocess(scan, label, config.training_size, pad))
}

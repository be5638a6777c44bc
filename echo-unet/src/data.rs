//! 将 [`CamusDataset`] 接入 burn 的数据加载流程.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use echo_berry::dataset::CamusDataset;
use ndarray::{Array2, Array3};
use std::sync::Arc;

/// 一个训练样本.
#[derive(Clone, Debug, PartialEq)]
pub struct EchoItem {
    /// 图像 `(h, w)`.
    pub image: Array2<f32>,

    /// 标注 `(h, w)`.
    pub label: Array2<u8>,
}

/// 一个测试样本.
#[derive(Clone, Debug, PartialEq)]
pub struct EchoVolumeItem {
    /// 图像 `(z, h, w)`.
    pub image: Array3<f32>,

    /// 标注 `(z, h, w)`.
    pub label: Array3<u8>,

    /// 体素分辨率 `(z, h, w)`.
    pub spacing: [f64; 3],
}

/// 训练集切片. 启用增强时每次访问都会重新采样.
#[derive(Clone, Debug)]
pub struct EchoItemDataset {
    inner: Arc<CamusDataset>,
}

impl EchoItemDataset {
    /// 包装共享的数据集.
    pub fn new(inner: Arc<CamusDataset>) -> Self {
        Self { inner }
    }
}

impl Dataset<EchoItem> for EchoItemDataset {
    fn get(&self, index: usize) -> Option<EchoItem> {
        let (image, label) = self.inner.train_view().get(index)?;
        Some(EchoItem { image, label })
    }

    fn len(&self) -> usize {
        self.inner.train_view().len()
    }
}

/// 测试集体数据, 已中心裁剪到训练尺寸.
#[derive(Clone, Debug)]
pub struct EchoVolumeDataset {
    inner: Arc<CamusDataset>,
}

impl EchoVolumeDataset {
    /// 包装共享的数据集.
    pub fn new(inner: Arc<CamusDataset>) -> Self {
        Self { inner }
    }
}

impl Dataset<EchoVolumeItem> for EchoVolumeDataset {
    fn get(&self, index: usize) -> Option<EchoVolumeItem> {
        let (image, label, spacing) = self.inner.test_view().get(index)?;
        Some(EchoVolumeItem {
            image,
            label,
            spacing,
        })
    }

    fn len(&self) -> usize {
        self.inner.test_view().len()
    }
}

/// 一批训练样本.
#[derive(Clone, Debug)]
pub struct EchoBatch<B: Backend> {
    /// `[N, 1, H, W]`.
    pub images: Tensor<B, 4>,

    /// `[N, H, W]` 类别索引.
    pub labels: Tensor<B, 3, Int>,
}

/// 将若干形状相同的 [`EchoItem`] 堆叠为 [`EchoBatch`].
#[derive(Clone, Debug)]
pub struct EchoBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> EchoBatcher<B> {
    /// 在 `device` 上构建张量.
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<EchoItem, EchoBatch<B>> for EchoBatcher<B> {
    /// 样本形状不一致或 `items` 为空时程序 panic.
    fn batch(&self, items: Vec<EchoItem>) -> EchoBatch<B> {
        let n = items.len();
        assert!(n > 0, "空批次");
        let (h, w) = items[0].image.dim();

        let mut images = Vec::with_capacity(n * h * w);
        let mut labels = Vec::with_capacity(n * h * w);
        for item in &items {
            assert_eq!(item.image.dim(), (h, w), "批内图像形状不一致");
            assert_eq!(item.label.dim(), (h, w), "批内标注形状不一致");
            images.extend(item.image.iter().copied());
            labels.extend(item.label.iter().map(|&p| p as i64));
        }

        EchoBatch {
            images: Tensor::from_data(TensorData::new(images, [n, 1, h, w]), &self.device),
            labels: Tensor::from_data(TensorData::new(labels, [n, h, w]), &self.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::DataLoaderBuilder;
    use echo_berry::dataset::CamusConfig;
    use ndarray::array;
    use std::fs;

    type B = NdArray;

    #[test]
    fn test_batch() {
        let batcher = EchoBatcher::<B>::new(Default::default());
        let items = vec![
            EchoItem {
                image: array![[0.0, 0.5], [1.0, 0.25]],
                label: array![[0, 1], [2, 3]],
            },
            EchoItem {
                image: array![[1.0, 1.0], [0.0, 0.0]],
                label: array![[3, 3], [0, 1]],
            },
        ];
        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [2, 1, 2, 2]);
        assert_eq!(batch.labels.dims(), [2, 2, 2]);
        assert_eq!(
            batch.images.into_data().to_vec::<f32>().unwrap(),
            vec![0.0, 0.5, 1.0, 0.25, 1.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(
            batch.labels.into_data().to_vec::<i64>().unwrap(),
            vec![0, 1, 2, 3, 3, 3, 0, 1]
        );
    }

    fn tiny_dataset() -> (tempfile::TempDir, Arc<CamusDataset>) {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("list")).unwrap();
        fs::write(root.join("list").join("dataset.yaml"), "- a\n- b\n").unwrap();
        for p in ["a", "b"] {
            for view in ["2CH", "4CH"] {
                for phase in ["ED", "ES"] {
                    for suffix in ["", "_gt"] {
                        let stem = format!("{p}_{view}_{phase}{suffix}");
                        let header = format!(
                            "NDims = 3\nDimSize = 5 4 2\nElementSpacing = 0.3 0.2 1.0\n\
                             ElementType = MET_UCHAR\nElementDataFile = {stem}.raw\n"
                        );
                        fs::write(root.join(format!("{stem}.mhd")), header).unwrap();
                        let raw: Vec<u8> = (0u8..40).map(|v| v % 4).collect();
                        fs::write(root.join(format!("{stem}.raw")), raw).unwrap();
                    }
                }
            }
        }
        let mut config = CamusConfig::new(root, (4, 4));
        config.test_size = 1;
        let ds = CamusDataset::open(config).unwrap();
        (dir, Arc::new(ds))
    }

    #[test]
    fn test_datasets_and_loader() {
        let (_dir, ds) = tiny_dataset();
        let train = EchoItemDataset::new(ds.clone());
        // 1 个训练患者 x 4 次采集 x 2 层.
        assert_eq!(train.len(), 8);
        assert_eq!(train.get(0).unwrap().image.dim(), (4, 5));
        assert!(train.get(8).is_none());

        let test = EchoVolumeDataset::new(ds);
        assert_eq!(test.len(), 4);
        let item = test.get(0).unwrap();
        assert_eq!(item.image.dim(), (2, 4, 4));
        assert_eq!(item.spacing, [1.0, 0.2, 0.3]);

        let loader = DataLoaderBuilder::new(EchoBatcher::<B>::new(Default::default()))
            .batch_size(3)
            .build(train);
        let sizes: Vec<usize> = loader.iter().map(|b| b.images.dims()[0]).collect();
        assert_eq!(sizes, [3, 3, 2]);
    }

    #[test]
    #[should_panic]
    fn test_batch_shape_mismatch() {
        let batcher = EchoBatcher::<B>::new(Default::default());
        batcher.batch(vec![
            EchoItem {
                image: Array2::zeros((2, 2)),
                label: Array2::zeros((2, 2)),
            },
            EchoItem {
                image: Array2::zeros((3, 2)),
                label: Array2::zeros((3, 2)),
            },
        ]);
    }
}

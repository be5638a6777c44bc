//! 🫀欢迎光临🩺
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::slice::{ImgWriteVis, LabelSlice, OwnedLabelSlice, OwnedScanSlice, ScanSlice};
pub use crate::data::window::IntensityWindow;
pub use crate::data::{EchoData3d, EchoLabel, EchoScan, VolumeAttr};

pub use crate::consts::gray::{CAMUS_BACKGROUND, CAMUS_LA, CAMUS_LV_ENDO, CAMUS_LV_EPI};
pub use crate::consts::{Phase, View, CROP_BOUND};

pub use crate::augment::{AugmentConfig, Augmenter};
pub use crate::preprocess::{preprocess, PadPolicy};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{CamusConfig, CamusDataset, LoadError, Mode, Sample, Variant};

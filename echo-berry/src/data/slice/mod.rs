//! 超声图像/标注水平切片对象的操作.

mod core;
mod save;

pub use self::core::{LabelSlice, OwnedLabelSlice, OwnedScanSlice, ScanSlice};

pub use save::ImgWriteVis;

//! 程序运行函数.

use crate::report::SurveyReport;
use crate::Args;
use echo_berry::dataset::{self, CamusConfig, CamusDataset, LoadError, Variant};
use echo_berry::{ImgWriteVis, OwnedLabelSlice, OwnedScanSlice};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 运行错误.
#[derive(Debug)]
pub enum RunError {
    /// 未给出配置文件, 且无法确定默认数据目录.
    NoDataDir,

    /// 数据集加载错误.
    Load(LoadError),

    /// 创建输出目录错误.
    Io(PathBuf, io::Error),

    /// 写 PNG 错误.
    Image(PathBuf, image::ImageError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDataDir => f.write_str("no --config given and no home directory found"),
            Self::Load(e) => write!(f, "{e}"),
            Self::Io(p, e) => write!(f, "{}: {e}", p.display()),
            Self::Image(p, e) => write!(f, "{}: {e}", p.display()),
        }
    }
}

impl From<LoadError> for RunError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}

/// 由命令行参数得到数据集配置.
pub fn config_from_args(args: &Args) -> Result<CamusConfig, RunError> {
    if let Some(path) = &args.config {
        return Ok(CamusConfig::from_yaml_file(path)?);
    }
    let root = dataset::camus_dir_from_env_or_home().ok_or(RunError::NoDataDir)?;
    let mut config = CamusConfig::new(root, (args.size, args.size));
    if args.quality {
        config.variant = Variant::QualityFiltered;
    }
    Ok(config)
}

/// 实际运行.
pub fn run(args: &Args) -> Result<SurveyReport, RunError> {
    let config = config_from_args(args)?;
    log::info!("data root: {}", config.data_root.display());

    let ds = CamusDataset::open(config)?;
    let report = SurveyReport::collect(&ds);

    if args.dump > 0 {
        dump_previews(&ds, args.dump, &args.out)?;
    }
    Ok(report)
}

/// 将前 `n` 张训练切片 (未增强) 的图像和标注保存为 PNG.
fn dump_previews(ds: &CamusDataset, n: usize, out: &Path) -> Result<(), RunError> {
    fs::create_dir_all(out).map_err(|e| RunError::Io(out.to_owned(), e))?;
    let view = ds.train_view();
    for sli in view.iter().take(n) {
        let stem = format!("{}_{:03}", sli.source, sli.z);

        let path = out.join(format!("{stem}.png"));
        let scan = OwnedScanSlice::from(sli.image.clone());
        scan.as_immut()
            .save(&path)
            .map_err(|e| RunError::Image(path.clone(), e))?;

        let path = out.join(format!("{stem}_gt.png"));
        let label = OwnedLabelSlice::from(sli.label.clone());
        label
            .as_immut()
            .save(&path)
            .map_err(|e| RunError::Image(path.clone(), e))?;
    }
    log::info!("{} previews written to {}", n.min(view.len()), out.display());
    Ok(())
}

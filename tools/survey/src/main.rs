//! CAMUS 数据集概览工具.
//!
//! ```text
//! survey --config camus.yaml --dump 8 --out preview
//! survey --size 256 --quality        # 使用 $CAMUS_DIR 或 ~/dataset/camus
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod report;
mod runner;

/// 命令行参数.
#[derive(Parser, Debug)]
#[command(
    name = "survey",
    about = "Load a CAMUS dataset and report split and sample statistics"
)]
pub struct Args {
    /// YAML dataset config. Without it, `$CAMUS_DIR` or `~/dataset/camus` is used.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Training size (square) used when no config file is given.
    #[arg(long, default_value_t = 256)]
    size: usize,

    /// Use the quality-filtered loader when no config file is given.
    #[arg(long)]
    quality: bool,

    /// Save PNG previews of the first N training slices.
    #[arg(long, default_value_t = 0, value_name = "N")]
    dump: usize,

    /// Directory for PNG previews.
    #[arg(long, default_value = "survey-out", value_name = "DIR")]
    out: PathBuf,
}

fn main() -> ExitCode {
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
    {
        eprintln!("logger: {e}");
    }

    let args = Args::parse();
    match runner::run(&args) {
        Ok(report) => {
            sep();
            print!("{report}");
            sep();
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[inline]
fn sep() {
    println!("{}", report::SEP);
}

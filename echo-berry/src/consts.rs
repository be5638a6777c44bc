//! 通用常量.

use std::fmt;

/// 单通道颜色.
pub mod gray {
    /// CAMUS 数据集中, 背景的像素值.
    pub const CAMUS_BACKGROUND: u8 = 0;

    /// CAMUS 数据集中, 左心室心内膜 (血池) 的像素值.
    pub const CAMUS_LV_ENDO: u8 = 1;

    /// CAMUS 数据集中, 左心室心外膜 (心肌) 的像素值.
    pub const CAMUS_LV_EPI: u8 = 2;

    /// CAMUS 数据集中, 左心房的像素值.
    pub const CAMUS_LA: u8 = 3;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道暗灰色.
    pub const DARK_GRAY: u8 = 0b_0100_0000;

    /// 单通道灰色.
    pub const GRAY: u8 = 0b_1000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}

/// 预处理后水平切片在两个平面方向上的最大尺寸.
pub const CROP_BOUND: usize = 256;

/// 强度截断所用的百分位数.
pub const CLIP_PERCENTILE: f64 = 98.0;

/// 基础加载器默认的测试集病人数量.
pub const DEFAULT_TEST_LEN: usize = 10;

/// 患者清单相对于数据根目录的位置.
pub const MANIFEST_PATH: [&str; 2] = ["list", "dataset.yaml"];

/// 心脏超声切面.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum View {
    /// 心尖两腔心切面.
    TwoChamber,

    /// 心尖四腔心切面.
    FourChamber,
}

impl View {
    /// 全部切面, 按文件命名顺序排列.
    pub const ALL: [View; 2] = [View::TwoChamber, View::FourChamber];

    /// 文件名中使用的标记.
    #[inline]
    pub const fn tag(&self) -> &'static str {
        match self {
            View::TwoChamber => "2CH",
            View::FourChamber => "4CH",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 心动周期时相.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Phase {
    /// 舒张末期.
    EndDiastole,

    /// 收缩末期.
    EndSystole,
}

impl Phase {
    /// 全部时相, 按文件命名顺序排列.
    pub const ALL: [Phase; 2] = [Phase::EndDiastole, Phase::EndSystole];

    /// 文件名中使用的标记.
    #[inline]
    pub const fn tag(&self) -> &'static str {
        match self {
            Phase::EndDiastole => "ED",
            Phase::EndSystole => "ES",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

//! MetaImage (`.mhd` + `.raw`/`.zraw`, 或单文件 `.mha`) 读取.
//!
//! 仅支持单通道 2D/3D 图像, 这已覆盖 CAMUS 数据集的全部文件.

use flate2::read::ZlibDecoder;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// MetaImage 解析错误.
#[derive(Debug)]
pub enum MetaImageError {
    /// 底层 I/O 错误.
    Io(io::Error),

    /// 缺少必需的头部字段.
    MissingField(&'static str),

    /// 头部字段取值无法解析. 参数依次为字段名和原始值.
    BadValue(String, String),

    /// 不支持的体素类型, 如 `MET_LONG_LONG`.
    UnsupportedElement(String),

    /// 不支持的维数. 仅支持 2 或 3.
    UnsupportedDims(usize),

    /// 数据长度不足. 参数依次为期望字节数和实际字节数.
    Truncated(usize, usize),
}

impl fmt::Display for MetaImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::MissingField(key) => write!(f, "missing header field `{key}`"),
            Self::BadValue(key, value) => write!(f, "bad value `{value}` for field `{key}`"),
            Self::UnsupportedElement(t) => write!(f, "unsupported element type `{t}`"),
            Self::UnsupportedDims(n) => write!(f, "unsupported dimension count {n}"),
            Self::Truncated(expected, found) => {
                write!(f, "expected {expected} bytes of pixel data, found {found}")
            }
        }
    }
}

impl std::error::Error for MetaImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MetaImageError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// MetaImage 结果.
pub type MetaResult<T> = Result<T, MetaImageError>;

/// 体素存储类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElementType {
    /// `MET_UCHAR`
    U8,
    /// `MET_CHAR`
    I8,
    /// `MET_USHORT`
    U16,
    /// `MET_SHORT`
    I16,
    /// `MET_UINT`
    U32,
    /// `MET_INT`
    I32,
    /// `MET_FLOAT`
    F32,
    /// `MET_DOUBLE`
    F64,
}

impl ElementType {
    fn parse(s: &str) -> MetaResult<Self> {
        Ok(match s {
            "MET_UCHAR" => Self::U8,
            "MET_CHAR" => Self::I8,
            "MET_USHORT" => Self::U16,
            "MET_SHORT" => Self::I16,
            "MET_UINT" => Self::U32,
            "MET_INT" => Self::I32,
            "MET_FLOAT" => Self::F32,
            "MET_DOUBLE" => Self::F64,
            other => return Err(MetaImageError::UnsupportedElement(other.to_string())),
        })
    }

    /// 单个体素占用的字节数.
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// 像素数据的位置.
#[derive(Clone, Debug, PartialEq)]
enum DataFile {
    /// 紧跟在头部之后 (`.mha`).
    Local,

    /// 独立文件, 路径相对于头部文件所在目录.
    External(PathBuf),
}

/// 外部数据文件中像素数据之前的字节.
#[derive(Copy, Clone, Debug, PartialEq)]
enum HeaderSize {
    /// 跳过固定字节数.
    Skip(usize),

    /// `HeaderSize = -1`: 像素数据位于文件末尾, 跳过的字节数由体素总大小反推.
    Trailing,
}

impl HeaderSize {
    fn parse(key: &str, value: &str) -> MetaResult<Self> {
        match parse_scalar::<i64>(key, value)? {
            -1 => Ok(Self::Trailing),
            v if v >= 0 => Ok(Self::Skip(v as usize)),
            _ => Err(MetaImageError::BadValue(key.to_string(), value.to_string())),
        }
    }

    /// 长度为 `len` 的数据文件中, 像素数据 (共 `expected` 字节) 的起始偏移.
    fn offset(&self, len: usize, expected: usize) -> usize {
        match *self {
            Self::Skip(n) => n.min(len),
            Self::Trailing => len.saturating_sub(expected),
        }
    }
}

/// 已解析的 MetaImage 头部.
#[derive(Clone, Debug)]
pub struct MetaHeader {
    /// 每一维的体素个数, 按 `(x, y[, z])` 排列.
    pub dim_size: Vec<usize>,

    /// 每一维的体素间距 (毫米), 按 `(x, y[, z])` 排列.
    pub spacing: Vec<f64>,

    /// 体素类型.
    pub element: ElementType,

    /// 数据是否以大端序存储.
    pub msb: bool,

    /// 数据是否经过 zlib 压缩.
    pub compressed: bool,

    /// 外部数据文件开头需要跳过的字节.
    header_size: HeaderSize,

    data_file: DataFile,
}

impl MetaHeader {
    /// 体素总个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.dim_size.iter().product()
    }

    /// 是否没有任何体素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 以 `(z, y, x)` 排列的数组形状. 2D 图像的 `z` 为 1.
    pub fn shape_zyx(&self) -> (usize, usize, usize) {
        match self.dim_size.as_slice() {
            &[x, y] => (1, y, x),
            &[x, y, z] => (z, y, x),
            _ => unreachable!("dims checked while parsing"),
        }
    }

    /// 以 `(z, y, x)` 排列的体素间距. 2D 图像的 `z` 方向间距取 1.
    pub fn spacing_zyx(&self) -> [f64; 3] {
        match self.spacing.as_slice() {
            &[x, y] => [1.0, y, x],
            &[x, y, z] => [z, y, x],
            _ => unreachable!("dims checked while parsing"),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> MetaResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(MetaImageError::BadValue(key.to_string(), value.to_string())),
    }
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> MetaResult<Vec<T>> {
    value
        .split_whitespace()
        .map(|s| {
            s.parse()
                .map_err(|_| MetaImageError::BadValue(key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_scalar<T: std::str::FromStr>(key: &str, value: &str) -> MetaResult<T> {
    value
        .parse()
        .map_err(|_| MetaImageError::BadValue(key.to_string(), value.to_string()))
}

/// 解析头部文本. 返回头部和像素数据在 `bytes` 中的起始偏移 (仅对 `LOCAL` 有意义).
fn parse_header(bytes: &[u8]) -> MetaResult<(MetaHeader, usize)> {
    let mut ndims = None;
    let mut dim_size = None;
    let mut spacing = None;
    let mut element_size = None;
    let mut element = None;
    let mut msb = false;
    let mut compressed = false;
    let mut header_size = HeaderSize::Skip(0);
    let mut channels = 1usize;
    let mut data_file = None;

    let mut offset = 0usize;
    while offset < bytes.len() && data_file.is_none() {
        let end = bytes[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| offset + p);
        let line = String::from_utf8_lossy(&bytes[offset..end]);
        offset = (end + 1).min(bytes.len());

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "NDims" => ndims = Some(parse_scalar::<usize>(key, value)?),
            "DimSize" => dim_size = Some(parse_list::<usize>(key, value)?),
            "ElementSpacing" => spacing = Some(parse_list::<f64>(key, value)?),
            "ElementSize" => element_size = Some(parse_list::<f64>(key, value)?),
            "ElementType" => element = Some(ElementType::parse(value)?),
            "ElementNumberOfChannels" => channels = parse_scalar::<usize>(key, value)?,
            "BinaryDataByteOrderMSB" | "ElementByteOrderMSB" | "ByteOrderMSB" => {
                msb = parse_bool(key, value)?
            }
            "CompressedData" => compressed = parse_bool(key, value)?,
            "HeaderSize" => header_size = HeaderSize::parse(key, value)?,
            "ElementDataFile" => {
                data_file = Some(if value.eq_ignore_ascii_case("LOCAL") {
                    DataFile::Local
                } else {
                    DataFile::External(PathBuf::from(value))
                })
            }
            _ => {}
        }
    }

    let dim_size = dim_size.ok_or(MetaImageError::MissingField("DimSize"))?;
    let ndims = ndims.unwrap_or(dim_size.len());
    if !(2..=3).contains(&ndims) || dim_size.len() != ndims {
        return Err(MetaImageError::UnsupportedDims(ndims));
    }
    if channels != 1 {
        return Err(MetaImageError::BadValue(
            "ElementNumberOfChannels".to_string(),
            channels.to_string(),
        ));
    }
    let spacing = spacing
        .or(element_size)
        .unwrap_or_else(|| vec![1.0; ndims]);
    if spacing.len() != ndims {
        return Err(MetaImageError::BadValue(
            "ElementSpacing".to_string(),
            format!("{spacing:?}"),
        ));
    }

    if compressed && header_size == HeaderSize::Trailing {
        // 压缩数据的长度未知, 无法从文件末尾反推.
        return Err(MetaImageError::BadValue(
            "HeaderSize".to_string(),
            "-1 with CompressedData".to_string(),
        ));
    }

    let header = MetaHeader {
        dim_size,
        spacing,
        element: element.ok_or(MetaImageError::MissingField("ElementType"))?,
        msb,
        compressed,
        header_size,
        data_file: data_file.ok_or(MetaImageError::MissingField("ElementDataFile"))?,
    };
    Ok((header, offset))
}

/// 一个已完全读入内存的 MetaImage.
#[derive(Clone, Debug)]
pub struct MetaImage {
    header: MetaHeader,
    raw: Vec<u8>,
}

impl MetaImage {
    /// 打开 `.mhd` 或 `.mha` 文件, 并读入全部像素数据.
    pub fn open<P: AsRef<Path>>(path: P) -> MetaResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let (header, offset) = parse_header(&bytes)?;

        let stored = match &header.data_file {
            DataFile::Local => bytes[offset..].to_vec(),
            DataFile::External(name) => {
                let mut data_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
                data_path.push(name);
                let mut data = fs::read(data_path)?;
                let expected = header.len() * header.element.size();
                data.drain(..header.header_size.offset(data.len(), expected));
                data
            }
        };

        let raw = if header.compressed {
            let mut buf = Vec::with_capacity(header.len() * header.element.size());
            ZlibDecoder::new(stored.as_slice()).read_to_end(&mut buf)?;
            buf
        } else {
            stored
        };

        let expected = header.len() * header.element.size();
        if raw.len() < expected {
            return Err(MetaImageError::Truncated(expected, raw.len()));
        }
        Ok(Self { header, raw })
    }

    /// 头部信息.
    #[inline]
    pub fn header(&self) -> &MetaHeader {
        &self.header
    }

    /// 按存储顺序 (x 最快变化) 将体素解码为 `f64`.
    pub fn decode(&self) -> Vec<f64> {
        let size = self.header.element.size();
        let msb = self.header.msb;
        macro_rules! decode_as {
            ($t: ty) => {
                self.raw[..self.header.len() * size]
                    .chunks_exact(size)
                    .map(|c| {
                        let mut arr = [0u8; std::mem::size_of::<$t>()];
                        arr.copy_from_slice(c);
                        let v = if msb {
                            <$t>::from_be_bytes(arr)
                        } else {
                            <$t>::from_le_bytes(arr)
                        };
                        v as f64
                    })
                    .collect()
            };
        }
        match self.header.element {
            ElementType::U8 => decode_as!(u8),
            ElementType::I8 => decode_as!(i8),
            ElementType::U16 => decode_as!(u16),
            ElementType::I16 => decode_as!(i16),
            ElementType::U32 => decode_as!(u32),
            ElementType::I32 => decode_as!(i32),
            ElementType::F32 => decode_as!(f32),
            ElementType::F64 => decode_as!(f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_mhd(dir: &Path, name: &str, header: &str, raw_name: &str, raw: &[u8]) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, header).unwrap();
        fs::write(dir.join(raw_name), raw).unwrap();
        p
    }

    #[test]
    fn test_parse_2d_camus_like_header() {
        let text = "ObjectType = Image\nNDims = 2\nDimSize = 4 3\nElementSpacing = 0.3 0.15\n\
                    ElementType = MET_UCHAR\nElementDataFile = a.raw\n";
        let (h, _) = parse_header(text.as_bytes()).unwrap();
        assert_eq!(h.shape_zyx(), (1, 3, 4));
        assert_eq!(h.spacing_zyx(), [1.0, 0.15, 0.3]);
        assert_eq!(h.element, ElementType::U8);
        assert!(!h.msb);
    }

    #[test]
    fn test_missing_fields() {
        let text = "NDims = 2\nDimSize = 4 3\nElementDataFile = a.raw\n";
        assert!(matches!(
            parse_header(text.as_bytes()),
            Err(MetaImageError::MissingField("ElementType"))
        ));
        let text = "NDims = 4\nDimSize = 1 1 1 1\nElementType = MET_UCHAR\nElementDataFile = a\n";
        assert!(matches!(
            parse_header(text.as_bytes()),
            Err(MetaImageError::UnsupportedDims(4))
        ));
    }

    #[test]
    fn test_read_external_short_msb() {
        let dir = tempfile::tempdir().unwrap();
        let values: [i16; 6] = [-2, -1, 0, 1, 2, 300];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let p = write_mhd(
            dir.path(),
            "v.mhd",
            "NDims = 3\nDimSize = 3 2 1\nElementType = MET_SHORT\n\
             BinaryDataByteOrderMSB = True\nElementDataFile = v.raw\n",
            "v.raw",
            &raw,
        );
        let img = MetaImage::open(p).unwrap();
        assert_eq!(img.header().shape_zyx(), (1, 2, 3));
        assert_eq!(img.decode(), vec![-2.0, -1.0, 0.0, 1.0, 2.0, 300.0]);
    }

    #[test]
    fn test_read_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let raw: Vec<u8> = (0u8..12).collect();
        let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
        e.write_all(&raw).unwrap();
        let p = write_mhd(
            dir.path(),
            "c.mhd",
            "NDims = 2\nDimSize = 4 3\nElementType = MET_UCHAR\nCompressedData = True\n\
             ElementDataFile = c.zraw\n",
            "c.zraw",
            &e.finish().unwrap(),
        );
        let img = MetaImage::open(p).unwrap();
        assert_eq!(img.decode(), raw.iter().map(|&v| v as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_read_local_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes =
            b"NDims = 2\nDimSize = 2 2\nElementType = MET_FLOAT\nElementDataFile = LOCAL\n"
                .to_vec();
        for v in [0.5f32, 1.5, 2.5, 3.5] {
            bytes.extend(v.to_le_bytes());
        }
        let p = dir.path().join("l.mha");
        fs::write(&p, &bytes).unwrap();
        assert_eq!(MetaImage::open(&p).unwrap().decode(), vec![0.5, 1.5, 2.5, 3.5]);

        bytes.truncate(bytes.len() - 4);
        fs::write(&p, &bytes).unwrap();
        assert!(matches!(
            MetaImage::open(&p),
            Err(MetaImageError::Truncated(16, 12))
        ));
    }

    #[test]
    fn test_header_size_skip_and_trailing() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = b"junk-prefix".to_vec();
        raw.extend([7u8, 8, 9, 10]);

        let p = write_mhd(
            dir.path(),
            "s.mhd",
            "NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nHeaderSize = 11\n\
             ElementDataFile = s.raw\n",
            "s.raw",
            &raw,
        );
        assert_eq!(MetaImage::open(p).unwrap().decode(), vec![7.0, 8.0, 9.0, 10.0]);

        let p = write_mhd(
            dir.path(),
            "t.mhd",
            "NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nHeaderSize = -1\n\
             ElementDataFile = t.raw\n",
            "t.raw",
            &raw,
        );
        assert_eq!(MetaImage::open(p).unwrap().decode(), vec![7.0, 8.0, 9.0, 10.0]);

        let text = "NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nHeaderSize = -3\n\
                    ElementDataFile = t.raw\n";
        assert!(matches!(
            parse_header(text.as_bytes()),
            Err(MetaImageError::BadValue(..))
        ));
        let text = "NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nHeaderSize = -1\n\
                    CompressedData = True\nElementDataFile = t.zraw\n";
        assert!(parse_header(text.as_bytes()).is_err());
    }
}

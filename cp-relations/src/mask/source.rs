//! 掩膜与图像的获取.
//!
//! 分析会话只通过 [`MaskSource`] 取用掩膜和图像, 不关心它们来自内存还是硬盘.
//! 返回值以 `Arc` 共享, 调用方无法原地修改缓存中的数组.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::DynamicImage;
use ndarray::{Array, Array2, ArrayD, Axis, Dimension, Ix2};
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};

use super::{Image, LabelMask};
use crate::dataset::run_dir_from_env_or_home;
use crate::{RelError, RelResult};

/// 掩膜 / 图像获取接口. 以 `(图像标识, 名称)` 定位.
pub trait MaskSource: Send + Sync {
    /// 获取标签掩膜.
    fn get_mask(&self, image_id: &str, name: &str) -> RelResult<Arc<LabelMask>>;

    /// 获取强度图像.
    fn get_image(&self, image_id: &str, name: &str) -> RelResult<Arc<Image>>;

    /// 获取多通道图像的第 `channel` 个通道 (从 1 开始).
    ///
    /// 默认实现只支持单通道图像, 此时 `channel` 必须为 1.
    fn get_image_channel(
        &self,
        image_id: &str,
        name: &str,
        channel: usize,
    ) -> RelResult<Arc<Image>> {
        if channel == 1 {
            self.get_image(image_id, name)
        } else {
            Err(RelError::Mask(format!(
                "image `{name}` of {image_id} has a single channel, got channel {channel}"
            )))
        }
    }
}

type Key = (String, String);

#[inline]
fn key(image_id: &str, name: &str) -> Key {
    (image_id.to_string(), name.to_string())
}

/// 内存中的掩膜 / 图像.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    masks: HashMap<Key, Arc<LabelMask>>,
    images: HashMap<Key, Arc<Image>>,
}

impl MemorySource {
    /// 创建空的数据源.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入掩膜. 覆盖同名掩膜.
    pub fn insert_mask(&mut self, image_id: &str, name: &str, mask: LabelMask) {
        self.masks.insert(key(image_id, name), Arc::new(mask));
    }

    /// 放入图像. 覆盖同名图像.
    pub fn insert_image(&mut self, image_id: &str, name: &str, image: Image) {
        self.images.insert(key(image_id, name), Arc::new(image));
    }
}

impl MaskSource for MemorySource {
    fn get_mask(&self, image_id: &str, name: &str) -> RelResult<Arc<LabelMask>> {
        self.masks
            .get(&key(image_id, name))
            .cloned()
            .ok_or_else(|| RelError::Mask(format!("no mask `{name}` for image {image_id}")))
    }

    fn get_image(&self, image_id: &str, name: &str) -> RelResult<Arc<Image>> {
        self.images
            .get(&key(image_id, name))
            .cloned()
            .ok_or_else(|| RelError::Mask(format!("no image `{name}` for image {image_id}")))
    }
}

/// 文件名构造器. 接受图像标识和名称, 获得文件名.
pub type FilenameBuilder = fn(&str, &str) -> String;

/// 默认文件名 `{image_id}_{name}.npy`.
pub fn npy_filename(image_id: &str, name: &str) -> String {
    format!("{image_id}_{name}.npy")
}

/// 硬盘上的掩膜 / 图像目录.
///
/// 按文件扩展名选择解码方式:
///
/// 1. `.npy`: 任意整数或浮点元素类型的二维数组;
/// 2. `.tif`, `.tiff`, `.png`: 8 位或 16 位单通道图像.
#[derive(Clone, Debug)]
pub struct FileSource {
    mask_dir: PathBuf,
    image_dir: PathBuf,
    builder: FilenameBuilder,
}

impl FileSource {
    /// 以掩膜目录和图像目录初始化, 使用默认文件名 [`npy_filename`].
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(mask_dir: P, image_dir: Q) -> Self {
        Self {
            mask_dir: mask_dir.as_ref().to_owned(),
            image_dir: image_dir.as_ref().to_owned(),
            builder: npy_filename,
        }
    }

    /// 替换文件名构造器.
    pub fn with_builder(mut self, builder: FilenameBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// 使用 `$IMC_RUN_DIR` 或 `$HOME/dataset/{run}` 下的 `masks` 和 `imgs` 目录.
    ///
    /// 无法确定用户主目录时返回 `Err(RelError::Configuration)`.
    pub fn from_env_or_home(run: &str) -> RelResult<Self> {
        let base = run_dir_from_env_or_home(run).ok_or_else(|| {
            RelError::Configuration("cannot determine the dataset directory".to_string())
        })?;
        Ok(Self::new(base.join("masks"), base.join("imgs")))
    }

    fn locate(&self, dir: &Path, image_id: &str, name: &str) -> RelResult<PathBuf> {
        let path = dir.join((self.builder)(image_id, name));
        if path.is_file() {
            Ok(path)
        } else {
            Err(RelError::Mask(format!("{} not found", path.display())))
        }
    }
}

impl MaskSource for FileSource {
    fn get_mask(&self, image_id: &str, name: &str) -> RelResult<Arc<LabelMask>> {
        let path = self.locate(&self.mask_dir, image_id, name)?;
        let mask = match extension(&path).as_str() {
            "npy" => read_npy_any::<u32, Ix2>(&path)?,
            "tif" | "tiff" | "png" => read_gray(&path)?,
            other => return Err(unsupported(&path, other)),
        };
        Ok(Arc::new(mask))
    }

    fn get_image(&self, image_id: &str, name: &str) -> RelResult<Arc<Image>> {
        let path = self.locate(&self.image_dir, image_id, name)?;
        let image = match extension(&path).as_str() {
            "npy" => read_npy_any::<f64, Ix2>(&path)?,
            "tif" | "tiff" | "png" => read_gray(&path)?.mapv(f64::from),
            other => return Err(unsupported(&path, other)),
        };
        Ok(Arc::new(image))
    }

    /// `.npy` 文件可以是二维单通道图像, 也可以是三维图像栈.
    /// 三维时长度最短的轴是通道轴: 首轴 `(c, h, w)` 或末轴 `(h, w, c)`.
    fn get_image_channel(
        &self,
        image_id: &str,
        name: &str,
        channel: usize,
    ) -> RelResult<Arc<Image>> {
        let path = self.locate(&self.image_dir, image_id, name)?;
        if extension(&path) != "npy" {
            return self.get_image(image_id, name).and_then(|img| {
                if channel == 1 {
                    Ok(img)
                } else {
                    Err(RelError::Mask(format!(
                        "{}: single channel image, got channel {channel}",
                        path.display()
                    )))
                }
            });
        }
        let stack = read_npy_any::<f64, _>(&path)?;
        Ok(Arc::new(select_channel(stack, channel).map_err(|msg| {
            RelError::Mask(format!("{}: {msg}", path.display()))
        })?))
    }
}

/// 从二维或三维数组中取出第 `channel` 个通道 (从 1 开始).
fn select_channel(stack: ArrayD<f64>, channel: usize) -> Result<Image, String> {
    let shape = stack.shape().to_vec();
    let plane = match shape.as_slice() {
        [_, _] if channel == 1 => stack,
        [_, _] => return Err(format!("single channel image, got channel {channel}")),
        [c, _, w] => {
            let axis = if w < c { Axis(2) } else { Axis(0) };
            let n = shape[axis.index()];
            if channel == 0 || channel > n {
                return Err(format!("channel {channel} out of range 1..={n}"));
            }
            stack.index_axis(axis, channel - 1).to_owned()
        }
        _ => return Err(format!("expected a 2-D or 3-D array, got shape {shape:?}")),
    };
    plane.into_dimensionality::<Ix2>().map_err(|e| e.to_string())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn unsupported(path: &Path, ext: &str) -> RelError {
    RelError::Mask(format!("{}: unsupported file type `{ext}`", path.display()))
}

/// 把 `v` 转换为 `U`. 超出范围或丢失小数部分时返回 `None`.
fn exact_cast<T, U>(v: T) -> Option<U>
where
    T: num::ToPrimitive + Copy,
    U: num::NumCast + num::ToPrimitive,
{
    let u = <U as num::NumCast>::from(v)?;
    let (a, b) = (v.to_f64()?, u.to_f64()?);
    (a == b || (a.is_nan() && b.is_nan())).then_some(u)
}

/// 以元素类型 `T` 读取 npy 文件, 并逐个转换为 `U`.
///
/// 元素类型不匹配时返回 `Ok(None)`, 以便调用方换一种类型重试.
fn read_npy_as<T, U, D>(path: &Path) -> RelResult<Option<Array<U, D>>>
where
    T: ReadableElement + num::ToPrimitive + Copy,
    U: num::NumCast + num::ToPrimitive,
    D: Dimension,
{
    let a: Array<T, D> = match read_npy(path) {
        Ok(a) => a,
        Err(ReadNpyError::WrongDescriptor(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let data = a
        .iter()
        .map(|&v| exact_cast::<T, U>(v))
        .collect::<Option<Vec<U>>>()
        .ok_or_else(|| {
            RelError::Mask(format!(
                "{}: value out of range or not representable",
                path.display()
            ))
        })?;
    Array::from_shape_vec(a.raw_dim(), data)
        .map(Some)
        .map_err(|e| RelError::Mask(e.to_string()))
}

/// 依次尝试常见元素类型读取 npy 文件.
fn read_npy_any<U, D>(path: &Path) -> RelResult<Array<U, D>>
where
    U: num::NumCast + num::ToPrimitive,
    D: Dimension,
{
    let readers: [fn(&Path) -> RelResult<Option<Array<U, D>>>; 9] = [
        read_npy_as::<u32, U, D>,
        read_npy_as::<u16, U, D>,
        read_npy_as::<u8, U, D>,
        read_npy_as::<i32, U, D>,
        read_npy_as::<i64, U, D>,
        read_npy_as::<u64, U, D>,
        read_npy_as::<i16, U, D>,
        read_npy_as::<f64, U, D>,
        read_npy_as::<f32, U, D>,
    ];
    for read in readers {
        if let Some(a) = read(path)? {
            return Ok(a);
        }
    }
    Err(RelError::Mask(format!(
        "{}: unsupported npy element type",
        path.display()
    )))
}

/// 读取 8 / 16 位单通道图像. 像素值保持原样, 不做位深缩放.
fn read_gray(path: &Path) -> RelResult<Array2<u32>> {
    let (w, h, data): (u32, u32, Vec<u32>) = match image::open(path)? {
        DynamicImage::ImageLuma8(b) => {
            let (w, h) = b.dimensions();
            (w, h, b.into_raw().into_iter().map(u32::from).collect())
        }
        DynamicImage::ImageLuma16(b) => {
            let (w, h) = b.dimensions();
            (w, h, b.into_raw().into_iter().map(u32::from).collect())
        }
        other => {
            return Err(RelError::Mask(format!(
                "{}: unsupported pixel format {:?}",
                path.display(),
                other.color()
            )))
        }
    };
    Array2::from_shape_vec((h as usize, w as usize), data)
        .map_err(|e| RelError::Mask(e.to_string()))
}

/// 带记忆的数据源: 同一 `(图像标识, 名称)` 只加载一次, 之后返回同一个 `Arc`.
///
/// 加载失败不会被缓存.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    masks: Mutex<HashMap<Key, Arc<LabelMask>>>,
    images: Mutex<HashMap<Key, Arc<Image>>>,
}

impl<S: MaskSource> CachedSource<S> {
    /// 包装数据源 `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            masks: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
        }
    }

    /// 被包装的数据源.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// 清空缓存.
    pub fn clear(&self) {
        self.masks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn memoized<T, F>(
    cache: &Mutex<HashMap<Key, Arc<T>>>,
    image_id: &str,
    name: &str,
    load: F,
) -> RelResult<Arc<T>>
where
    F: FnOnce() -> RelResult<Arc<T>>,
{
    let k = key(image_id, name);
    if let Some(v) = cache.lock().unwrap_or_else(PoisonError::into_inner).get(&k) {
        return Ok(Arc::clone(v));
    }
    // 加载期间不持有锁. 并发加载同一项时, 先写入者胜出.
    let v = load()?;
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(guard.entry(k).or_insert(v)))
}

impl<S: MaskSource> MaskSource for CachedSource<S> {
    fn get_mask(&self, image_id: &str, name: &str) -> RelResult<Arc<LabelMask>> {
        memoized(&self.masks, image_id, name, || self.inner.get_mask(image_id, name))
    }

    fn get_image(&self, image_id: &str, name: &str) -> RelResult<Arc<Image>> {
        memoized(&self.images, image_id, name, || self.inner.get_image(image_id, name))
    }

    fn get_image_channel(
        &self,
        image_id: &str,
        name: &str,
        channel: usize,
    ) -> RelResult<Arc<Image>> {
        let entry = format!("{name}#{channel}");
        memoized(&self.images, image_id, &entry, || {
            self.inner.get_image_channel(image_id, name, channel)
        })
    }
}

//! 分割掩膜.
//!
//! 掩膜是二维整数数组, `0` 为背景, 其余每个取值对应一个对象 (其对象编号).

mod graph;
mod paint;
mod source;

use ndarray::Array2;

use crate::Idx2d;

pub use graph::{neighbour_pairs, neighbour_relations};
pub use paint::{map_column_on_mask, map_values_on_mask};
pub use source::{npy_filename, CachedSource, FileSource, FilenameBuilder, MaskSource, MemorySource};

/// 标签掩膜.
pub type LabelMask = Array2<u32>;

/// 强度图像 (单通道).
pub type Image = Array2<f64>;

/// 获得 `(h, w)` 的 4-邻居索引. 不检查越界, 越界索引交给 `ArrayBase::get` 过滤.
#[inline]
pub(crate) fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

//! 掩膜区域.

use std::collections::BTreeMap;

use ndarray::ArrayView2;

use crate::consts::BACKGROUND_LABEL;
use crate::{Area2d, Idx2d, Idx2dF};

/// 掩膜中一个标签值对应的全部像素.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    label: u32,
    coords: Area2d,
    centroid: Idx2dF,
}

impl Region {
    /// 标签值, 即对象编号.
    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    /// 像素坐标 `(h, w)`, 按行优先顺序排列.
    #[inline]
    pub fn coords(&self) -> &[Idx2d] {
        &self.coords
    }

    /// 质心 `(h, w)`.
    #[inline]
    pub fn centroid(&self) -> Idx2dF {
        self.centroid
    }
}

/// 提取掩膜中的所有非背景区域, 按标签值升序排列.
///
/// 同一标签值的像素即使互不连通, 也视为同一个区域.
pub fn regions(mask: ArrayView2<u32>) -> Vec<Region> {
    let mut areas: BTreeMap<u32, Area2d> = BTreeMap::new();
    for (pos, &label) in mask.indexed_iter() {
        if label != BACKGROUND_LABEL {
            areas.entry(label).or_default().push(pos);
        }
    }
    areas
        .into_iter()
        .map(|(label, coords)| {
            let n = coords.len() as f64;
            let (sh, sw) = coords
                .iter()
                .fold((0.0, 0.0), |(sh, sw), &(h, w)| (sh + h as f64, sw + w as f64));
            Region {
                label,
                coords,
                centroid: (sh / n, sw / n),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::regions;
    use ndarray::array;

    #[test]
    fn test_regions() {
        let mask = array![[0, 3, 3], [1, 0, 3], [1, 0, 0]];
        let r = regions(mask.view());
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].label(), 1);
        assert_eq!(r[0].coords(), [(1, 0), (2, 0)]);
        assert_eq!(r[0].centroid(), (1.5, 0.0));
        assert_eq!(r[1].label(), 3);
        assert_eq!(r[1].centroid(), (1.0 / 3.0, 5.0 / 3.0));
    }
}

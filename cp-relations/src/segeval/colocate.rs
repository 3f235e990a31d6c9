//! 空间共定位检测.
//!
//! 在单张图像上寻找质心距离足够近的 center 对象对, 求二者像素并集的凸包,
//! 再检查凸包内是否落有 border 对象的像素.

use std::collections::HashMap;

use log::debug;
use ndarray::ArrayView2;

use super::hull::Hull;
use super::label::LabelClass;
use super::regions::{regions, Region};
use crate::consts::MIN_HULL_POINTS;
use crate::Idx2dF;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一对距离足够近的 center 对象.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CenterHit {
    /// 第一个 center 的对象编号.
    pub first_object_number: u32,

    /// 第二个 center 的对象编号. 总是排在第一个 center 之后.
    pub second_object_number: u32,

    /// 二者像素并集的凸包顶点 `(h, w)`.
    pub points: Vec<Idx2dF>,

    /// 凸包内是否至少有一个 border 像素?
    pub contains_border: bool,
}

#[inline]
fn sq_dist(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

type Cell = (i64, i64);

/// 以边长 `side` 的方格对质心分桶. 距离不超过 `side` 的两点必然落在相邻的格子内.
struct CentroidGrid<'a> {
    points: &'a [[f64; 2]],
    side: f64,
    cells: HashMap<Cell, Vec<usize>>,
}

impl<'a> CentroidGrid<'a> {
    fn new(points: &'a [[f64; 2]], side: f64) -> Self {
        let mut grid = Self {
            points,
            side,
            cells: HashMap::new(),
        };
        for (i, p) in points.iter().enumerate() {
            let c = grid.cell(p);
            grid.cells.entry(c).or_default().push(i);
        }
        grid
    }

    #[inline]
    fn cell(&self, p: &[f64; 2]) -> Cell {
        (
            (p[0] / self.side).floor() as i64,
            (p[1] / self.side).floor() as i64,
        )
    }

    /// 编号大于 `i` 且与第 `i` 个点的平方距离不超过 `r2` 的点, 升序排列.
    fn later_within(&self, i: usize, r2: f64) -> Vec<usize> {
        let q = &self.points[i];
        let (ch, cw) = self.cell(q);
        let mut near: Vec<usize> = (-1..=1)
            .flat_map(|dh| (-1..=1).map(move |dw| (ch + dh, cw + dw)))
            .filter_map(|c| self.cells.get(&c))
            .flatten()
            .copied()
            .filter(|&j| j > i && sq_dist(q, &self.points[j]) <= r2)
            .collect();
        near.sort_unstable();
        near
    }
}

/// 在单张掩膜上检测共定位的 center 对象对.
///
/// `classes` 给出每个标签值的类别. 没有类别的区域和 background 区域不参与计算.
/// center 按标签值升序编号, 编号为 `i` 的 center 只与编号 `j > i` 的 center 配对,
/// 因此不会出现自身配对, 也不会同时出现 `(a, b)` 与 `(b, a)`.
///
/// 质心距离不超过 `distance` (含边界) 的对象对才会被检查. 像素并集少于
/// [`MIN_HULL_POINTS`] 个点或凸包退化的对象对被跳过.
///
/// 结果按 `(i, j)` 的字典序排列.
pub fn find_center_pairs(
    mask: ArrayView2<u32>,
    classes: &HashMap<u32, LabelClass>,
    distance: f64,
) -> Vec<CenterHit> {
    let mut centers: Vec<Region> = vec![];
    let mut borders: Vec<Region> = vec![];
    for r in regions(mask) {
        match classes.get(&r.label()) {
            Some(LabelClass::Center) => centers.push(r),
            Some(LabelClass::Border) => borders.push(r),
            _ => {}
        }
    }
    // 负数或 NaN 阈值下没有任何对象对满足条件.
    if centers.len() < 2 || distance.is_nan() || distance < 0.0 {
        return vec![];
    }

    let points: Vec<[f64; 2]> = centers
        .iter()
        .map(|r| {
            let (h, w) = r.centroid();
            [h, w]
        })
        .collect();
    let grid = CentroidGrid::new(&points, distance.max(1.0));
    let r2 = distance * distance;

    let mut hits = vec![];
    for i in 0..points.len() {
        let near = grid.later_within(i, r2);
        for j in near {
            let (a, b) = (&centers[i], &centers[j]);
            let n = a.coords().len() + b.coords().len();
            if n < MIN_HULL_POINTS {
                debug!(
                    "skip center pair ({}, {}): only {n} pixels",
                    a.label(),
                    b.label()
                );
                continue;
            }
            let Some(hull) = Hull::from_pixels(a.coords().iter().chain(b.coords())) else {
                debug!(
                    "skip center pair ({}, {}): degenerate hull",
                    a.label(),
                    b.label()
                );
                continue;
            };
            let contains_border = hull.contains_any(borders.iter().flat_map(|r| r.coords()));
            hits.push(CenterHit {
                first_object_number: a.label(),
                second_object_number: b.label(),
                points: hull.vertices().to_vec(),
                contains_border,
            });
        }
    }
    hits
}

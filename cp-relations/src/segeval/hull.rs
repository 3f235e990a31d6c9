//! 凸包与其三角剖分.

use geo::{Area, ConvexHull, MultiPoint, Point};

use crate::{Idx2d, Idx2dF};

/// 判断点是否落在三角形上时的容差.
const EPS: f64 = 1e-9;

/// 像素点集的凸包, 以扇形三角剖分表示.
///
/// 凸多边形的扇形剖分与 Delaunay 剖分覆盖同一区域, 两者的包含判定结果相同.
#[derive(Clone, Debug)]
pub struct Hull {
    vertices: Vec<Idx2dF>,
}

impl Hull {
    /// 求像素点集的凸包. 点集退化 (共线或不足三个顶点) 时返回 `None`.
    pub fn from_pixels<'a, I>(pixels: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Idx2d>,
    {
        let points: MultiPoint<f64> = pixels
            .into_iter()
            .map(|&(h, w)| Point::new(h as f64, w as f64))
            .collect();
        let polygon = points.convex_hull();
        if polygon.unsigned_area() <= EPS {
            return None;
        }
        let ring = polygon.exterior();
        // 外环首尾相同, 去掉重复的最后一个点.
        let n = ring.0.len().saturating_sub(1);
        let vertices: Vec<Idx2dF> = ring.0[..n].iter().map(|c| (c.x, c.y)).collect();
        (vertices.len() >= 3).then_some(Self { vertices })
    }

    /// 凸包顶点 `(h, w)`, 即三角剖分使用的点.
    #[inline]
    pub fn vertices(&self) -> &[Idx2dF] {
        &self.vertices
    }

    /// 以第一个顶点为公共顶点的所有三角形.
    pub fn triangles(&self) -> impl Iterator<Item = [Idx2dF; 3]> + '_ {
        let v0 = self.vertices[0];
        self.vertices[1..]
            .windows(2)
            .map(move |w| [v0, w[0], w[1]])
    }

    /// 点 `p` 是否落在某个三角形内 (含边界)?
    pub fn contains(&self, p: Idx2dF) -> bool {
        self.triangles().any(|t| in_triangle(p, t))
    }

    /// 是否有任意一个像素落在凸包内?
    pub fn contains_any<'a, I>(&self, pixels: I) -> bool
    where
        I: IntoIterator<Item = &'a Idx2d>,
    {
        pixels
            .into_iter()
            .any(|&(h, w)| self.contains((h as f64, w as f64)))
    }
}

#[inline]
fn cross(o: Idx2dF, a: Idx2dF, b: Idx2dF) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// 点 `p` 是否在三角形 `t` 内或边上. 与三角形的朝向无关.
fn in_triangle(p: Idx2dF, [a, b, c]: [Idx2dF; 3]) -> bool {
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    let has_neg = d1 < -EPS || d2 < -EPS || d3 < -EPS;
    let has_pos = d1 > EPS || d2 > EPS || d3 > EPS;
    !(has_neg && has_pos)
}

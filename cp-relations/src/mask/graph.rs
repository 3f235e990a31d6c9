//! 掩膜邻接图.

use std::collections::BTreeSet;

use ndarray::ArrayView2;

use super::neighbour4;
use crate::consts::BACKGROUND_LABEL;
use crate::relation::{RelationEdge, RelationRecord, RelationSet};
use crate::RelResult;

/// 获取掩膜上 4-邻接的所有标签对 `(a, b)`, 其中 `a < b`, 均不为背景.
///
/// 结果按字典序排列, 每对只出现一次.
pub fn neighbour_pairs(mask: ArrayView2<u32>) -> Vec<(u32, u32)> {
    let mut pairs = BTreeSet::new();
    for (pos, &a) in mask.indexed_iter() {
        if a == BACKGROUND_LABEL {
            continue;
        }
        for p in neighbour4(pos) {
            match mask.get(p) {
                Some(&b) if b != BACKGROUND_LABEL && b != a => {
                    pairs.insert((a.min(b), a.max(b)));
                }
                _ => {}
            }
        }
    }
    pairs.into_iter().collect()
}

/// 把每张掩膜的邻接标签对转换为双向的 neighbor 关系, 第一 / 第二对象类型都是 `object_type`.
///
/// `masks` 的每一项为 `(图像编号, 掩膜)`. 结果没有关系属性.
pub fn neighbour_relations<'a, I>(masks: I, object_type: &str) -> RelResult<RelationSet>
where
    I: IntoIterator<Item = (u32, ArrayView2<'a, u32>)>,
{
    let mut set = RelationSet::new(Vec::<String>::new());
    for (image_number, mask) in masks {
        for (a, b) in neighbour_pairs(mask) {
            for (first, second) in [(a, b), (b, a)] {
                set.push(RelationRecord {
                    first_type: object_type.to_string(),
                    second_type: object_type.to_string(),
                    edge: RelationEdge {
                        first_object_number: first,
                        first_image_number: image_number,
                        second_object_number: second,
                        second_image_number: image_number,
                        attrs: vec![],
                    },
                })?;
            }
        }
    }
    Ok(set)
}

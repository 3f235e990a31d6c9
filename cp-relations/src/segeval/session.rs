//! 分割质量评估会话.
//!
//! 一个会话对应一次 run: 图像列表、标签对象表、细胞掩膜对象表、对象关系,
//! 以及获取掩膜的数据源.

use std::collections::HashMap;

use log::info;

use super::classify::{
    classify_oversegmentation, classify_undersegmentation, OverSegmentation, UnderSegmentation,
};
use super::colocate::{find_center_pairs, CenterHit};
use super::config::{check_distance, SegEvalConfig};
use super::label::LabelClass;
use crate::consts::seg::{CONTAINS_BORDER, POINTS};
use crate::mask::MaskSource;
use crate::relation::center_relation_kind;
use crate::{
    Agg, JoinHow, JoinedTable, ObjectRelations, ObjectTable, RelError, RelResult, RelationEdge,
    RelationKind, RelationQuery, RelationRecord, RelationSet, Value,
};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 图像.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageMeta {
    /// 图像全局标识, 见 [`crate::image_id`].
    pub image_id: String,

    /// 图像编号.
    pub image_number: u32,
}

impl ImageMeta {
    /// 以 run 名和图像编号初始化.
    pub fn new(run: &str, image_number: u32) -> Self {
        Self {
            image_id: crate::image_id(run, image_number),
            image_number,
        }
    }
}

/// 分割质量评估会话.
#[derive(Debug)]
pub struct SegmentationData<S> {
    run: String,
    images: Vec<ImageMeta>,
    labels: ObjectTable,
    cell_masks: Option<ObjectTable>,
    relations: ObjectRelations,
    source: S,
    config: SegEvalConfig,
}

impl<S: MaskSource> SegmentationData<S> {
    /// 初始化.
    ///
    /// # 返回值
    ///
    /// - 当 `config` 不合法时, 返回 `Err(RelError::Configuration)`;
    /// - 当 `labels` 的对象类型不是 `config.label_object` 时, 返回 `Err(RelError::Configuration)`.
    pub fn new(
        run: impl Into<String>,
        images: Vec<ImageMeta>,
        labels: ObjectTable,
        relations: ObjectRelations,
        source: S,
        config: SegEvalConfig,
    ) -> RelResult<Self> {
        config.check()?;
        expect_type(&labels, &config.label_object)?;
        Ok(Self {
            run: run.into(),
            images,
            labels,
            cell_masks: None,
            relations,
            source,
            config,
        })
    }

    /// 加入细胞掩膜对象表. 对象类型必须是 `config.cell_mask_object`.
    pub fn with_cell_masks(mut self, cell_masks: ObjectTable) -> RelResult<Self> {
        expect_type(&cell_masks, &self.config.cell_mask_object)?;
        self.cell_masks = Some(cell_masks);
        Ok(self)
    }

    /// run 名.
    #[inline]
    pub fn run(&self) -> &str {
        &self.run
    }

    /// 图像列表.
    #[inline]
    pub fn images(&self) -> &[ImageMeta] {
        &self.images
    }

    /// 标签对象表.
    #[inline]
    pub fn labels(&self) -> &ObjectTable {
        &self.labels
    }

    /// 细胞掩膜对象表.
    #[inline]
    pub fn cell_masks(&self) -> Option<&ObjectTable> {
        self.cell_masks.as_ref()
    }

    /// 对象关系.
    #[inline]
    pub fn relations(&self) -> &ObjectRelations {
        &self.relations
    }

    /// 对象关系, 可变. 用于注册其他合成关系.
    #[inline]
    pub fn relations_mut(&mut self) -> &mut ObjectRelations {
        &mut self.relations
    }

    /// 掩膜数据源.
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &SegEvalConfig {
        &self.config
    }

    /// 图像 `image_id` 上每个标签对象的类别. 类别无法识别的对象不出现在结果中.
    pub fn label_classes(&self, image_id: &str) -> RelResult<HashMap<u32, LabelClass>> {
        let index = self.labels.column_index(&self.config.label_class_column)?;
        Ok(self
            .labels
            .filter_image(image_id)
            .filter_map(|r| Some((r.object_number(), LabelClass::from_value(r.value(index))?)))
            .collect())
    }

    /// 为每个标签对象加入其 parent 细胞掩膜上 percent touching 的最小值.
    ///
    /// 没有 parent 关系的标签对象得到缺失值. 重复调用会覆盖上一次的结果.
    pub fn add_percent_touching(&mut self) -> RelResult<()> {
        let cell_masks = self.cell_masks.as_ref().ok_or_else(|| {
            RelError::Configuration("cell mask measurements not loaded".to_string())
        })?;
        let feature = self.config.percent_touching_feature.as_str();
        let parent = RelationKind::Parent;
        let query = RelationQuery::new(&parent, &self.labels)
            .target(cell_masks)
            .values([feature])
            .how(JoinHow::Left);
        let mins = self.relations.join_values(&query)?.aggregate(feature, Agg::Min)?;
        self.labels.add_column(feature, mins);
        Ok(())
    }

    /// 检测单张图像上的共定位 center 对象对.
    pub fn get_img_nbcenters(&self, image_id: &str, distance: f64) -> RelResult<Vec<CenterHit>> {
        check_distance(distance)?;
        let classes = self.label_classes(image_id)?;
        let mask = self.source.get_mask(image_id, &self.config.label_mask)?;
        Ok(find_center_pairs(mask.view(), &classes, distance))
    }

    #[cfg(feature = "rayon")]
    fn collect_hits(&self, distance: f64) -> RelResult<Vec<(u32, Vec<CenterHit>)>> {
        self.images
            .par_iter()
            .map(|img| {
                self.get_img_nbcenters(&img.image_id, distance)
                    .map(|hits| (img.image_number, hits))
            })
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn collect_hits(&self, distance: f64) -> RelResult<Vec<(u32, Vec<CenterHit>)>> {
        self.images
            .iter()
            .map(|img| {
                self.get_img_nbcenters(&img.image_id, distance)
                    .map(|hits| (img.image_number, hits))
            })
            .collect()
    }

    /// 在所有图像上检测共定位 center 对象对, 并以 `nbcenter_dist{distance}` 为名注册为关系.
    ///
    /// 两侧对象类型都是标签对象, 图像编号都是所在图像. 关系属性为 `points` 和 `contains_border`.
    /// 返回注册的关系类型.
    pub fn add_center_rel(&mut self, distance: f64) -> RelResult<RelationKind> {
        let per_image = self.collect_hits(distance)?;
        let label_object = self.config.label_object.as_str();
        let mut set = RelationSet::new([POINTS, CONTAINS_BORDER]);
        for (image_number, hits) in per_image {
            for hit in hits {
                set.push(RelationRecord {
                    first_type: label_object.to_string(),
                    second_type: label_object.to_string(),
                    edge: RelationEdge {
                        first_object_number: hit.first_object_number,
                        first_image_number: image_number,
                        second_object_number: hit.second_object_number,
                        second_image_number: image_number,
                        attrs: vec![Value::Points(hit.points), Value::Bool(hit.contains_border)],
                    },
                })?;
            }
        }
        let kind = center_relation_kind(distance);
        info!(
            "run {}: {} center pairs within distance {distance} over {} images",
            self.run,
            set.len(),
            self.images.len()
        );
        self.relations.register(kind.clone(), set);
        Ok(kind)
    }

    /// 获取已注册的共定位关系: 每条边一行, 列为 `points` 和 `contains_border`.
    ///
    /// 该距离的共定位关系未注册时返回 `Err(RelError::Configuration)`.
    pub fn get_center_rel(&self, distance: f64) -> RelResult<JoinedTable> {
        let kind = center_relation_kind(distance);
        if self.has_no_center_pairs(&kind)? {
            return Ok(JoinedTable::with_columns([POINTS, CONTAINS_BORDER]));
        }
        let query =
            RelationQuery::new(&kind, &self.labels).relation_columns([POINTS, CONTAINS_BORDER]);
        self.relations.join_values(&query)
    }

    /// 判定欠分割. 该距离的共定位关系尚未注册时先调用 [`Self::add_center_rel`].
    pub fn get_is_undersegmented(&mut self, distance: f64) -> RelResult<Vec<UnderSegmentation>> {
        let kind = center_relation_kind(distance);
        if !self.relations.contains(&kind) {
            self.add_center_rel(distance)?;
        }
        if self.has_no_center_pairs(&kind)? {
            return Ok(vec![]);
        }
        let feature = self.config.undersegmentation_feature.as_str();
        let query = RelationQuery::new(&kind, &self.labels)
            .values([feature])
            .relation_columns([POINTS, CONTAINS_BORDER]);
        let joined = self.relations.join_values(&query)?;
        classify_undersegmentation(&self.labels, &joined, feature)
    }

    /// 判定 center 标签对象的过分割.
    pub fn get_is_oversegmented(&self) -> RelResult<Vec<OverSegmentation>> {
        classify_oversegmentation(
            &self.labels,
            &self.config.label_class_column,
            &self.config.oversegmentation_feature,
        )
    }

    /// 共定位关系已注册但没有任何边?
    ///
    /// 关系从未注册时返回 `Err(RelError::Configuration)`.
    fn has_no_center_pairs(&self, kind: &RelationKind) -> RelResult<bool> {
        if !self.relations.contains(kind) {
            return Err(RelError::Configuration(format!(
                "`{kind}` relationship not registered"
            )));
        }
        let t = self.config.label_object.as_str();
        Ok(!self.relations.has_pair(kind, t, t))
    }
}

fn expect_type(table: &ObjectTable, object_type: &str) -> RelResult<()> {
    if table.object_type() == object_type {
        Ok(())
    } else {
        Err(RelError::Configuration(format!(
            "expected {object_type} objects, got {}",
            table.object_type()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageMeta, SegmentationData};
    use crate::mask::MemorySource;
    use crate::relation::center_relation_kind;
    use crate::segeval::SegEvalConfig;
    use crate::{
        ObjectRelations, ObjectTable, RelError, RelationEdge, RelationKind, RelationRecord,
        RelationSet, Value,
    };
    use ndarray::Array2;

    const US: &str = "Intensity_MedianIntensity_Mask2xImg";
    const OS: &str = "Intensity_MinIntensity_MaskDistance";
    const PT: &str = "Neighbors_PercentTouching_Adjacent";

    fn column_mask(
        shape: (usize, usize),
        bars: &[(u32, usize, std::ops::RangeInclusive<usize>)],
    ) -> Array2<u32> {
        let mut mask = Array2::zeros(shape);
        for (label, w, rows) in bars {
            for h in rows.clone() {
                mask[(h, *w)] = *label;
            }
        }
        mask
    }

    /// r_1: center 1, 2 之间夹着 border 3, 1 与 2 的强度相同.
    /// r_2: center 1, 2 相邻, 强度不同, 没有 border.
    fn session() -> SegmentationData<MemorySource> {
        let mut source = MemorySource::new();
        source.insert_mask(
            "r_1",
            "LabelObjImg",
            column_mask((20, 20), &[(1, 10, 8..=12), (2, 12, 8..=12), (3, 11, 9..=11)]),
        );
        source.insert_mask(
            "r_2",
            "LabelObjImg",
            column_mask((8, 8), &[(1, 2, 0..=4), (2, 4, 0..=4)]),
        );

        let mut labels = ObjectTable::new("Label", ["label", US, OS]);
        labels.push("r_1", 1, 1, vec!["center".into(), 5.0.into(), (-0.5).into()]).unwrap();
        labels.push("r_1", 1, 2, vec!["center".into(), 5.0.into(), 0.5.into()]).unwrap();
        labels.push("r_1", 1, 3, vec!["border".into(), 1.0.into(), (-1.0).into()]).unwrap();
        labels.push("r_2", 2, 1, vec!["center".into(), 3.0.into(), 0.2.into()]).unwrap();
        labels.push("r_2", 2, 2, vec!["center".into(), 4.0.into(), Value::Missing]).unwrap();

        let mut cells = ObjectTable::new("Mask2x", [PT]);
        cells.push("r_1", 1, 1, vec![0.3.into()]).unwrap();
        cells.push("r_1", 1, 2, vec![0.1.into()]).unwrap();

        let mut parents = RelationSet::new(Vec::<String>::new());
        for (a, b) in [(1, 1), (1, 2), (2, 2)] {
            parents
                .push(RelationRecord {
                    first_type: "Label".to_string(),
                    second_type: "Mask2x".to_string(),
                    edge: RelationEdge {
                        first_object_number: a,
                        first_image_number: 1,
                        second_object_number: b,
                        second_image_number: 1,
                        attrs: vec![],
                    },
                })
                .unwrap();
        }
        let mut relations = ObjectRelations::new();
        relations.register(RelationKind::Parent, parents);

        let images = vec![ImageMeta::new("r", 1), ImageMeta::new("r", 2)];
        SegmentationData::new("r", images, labels, relations, source, SegEvalConfig::default())
            .unwrap()
            .with_cell_masks(cells)
            .unwrap()
    }

    #[test]
    fn test_rejects_wrong_tables() {
        let labels = ObjectTable::new("cell", ["label"]);
        let res = SegmentationData::new(
            "r",
            vec![],
            labels,
            ObjectRelations::new(),
            MemorySource::new(),
            SegEvalConfig::default(),
        );
        assert!(matches!(res, Err(RelError::Configuration(_))));

        let data = session();
        let err = data.with_cell_masks(ObjectTable::new("Label", [PT]));
        assert!(err.is_err());
    }

    #[test]
    fn test_percent_touching() {
        let mut data = session();
        data.add_percent_touching().unwrap();
        let pt: Vec<_> = data
            .labels()
            .column(PT)
            .unwrap()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect();
        assert_eq!(
            pt,
            [
                ("r_1_Label_1".to_string(), Value::Float(0.1)),
                ("r_1_Label_2".to_string(), Value::Float(0.1)),
                ("r_1_Label_3".to_string(), Value::Missing),
                ("r_2_Label_1".to_string(), Value::Missing),
                ("r_2_Label_2".to_string(), Value::Missing),
            ]
        );
    }

    #[test]
    fn test_img_nbcenters() {
        let data = session();
        let hits = data.get_img_nbcenters("r_1", 25.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains_border);
        assert!(matches!(
            data.get_img_nbcenters("r_3", 25.0),
            Err(RelError::Mask(_))
        ));
        assert!(data.get_img_nbcenters("r_1", 0.0).is_err());
    }

    #[test]
    fn test_center_rel() {
        let mut data = session();
        assert!(matches!(
            data.get_center_rel(25.0),
            Err(RelError::Configuration(_))
        ));

        let kind = data.add_center_rel(25.0).unwrap();
        assert_eq!(kind, center_relation_kind(25.0));
        let rel = data.get_center_rel(25.0).unwrap();
        assert_eq!(rel.columns(), ["points", "contains_border"]);
        let borders: Vec<_> = rel
            .rows()
            .iter()
            .map(|r| (r.id.to_string(), r.values[1].clone()))
            .collect();
        assert_eq!(
            borders,
            [
                ("r_1_Label_1".to_string(), Value::Bool(true)),
                ("r_2_Label_1".to_string(), Value::Bool(false)),
            ]
        );

        // 同样的数据重复注册, 查询结果不变.
        data.add_center_rel(25.0).unwrap();
        assert_eq!(data.get_center_rel(25.0).unwrap().rows(), rel.rows());
    }

    #[test]
    fn test_undersegmented() {
        let mut data = session();
        let kind = center_relation_kind(25.0);
        assert!(!data.relations().contains(&kind));

        let us = data.get_is_undersegmented(25.0).unwrap();
        assert!(data.relations().contains(&kind));
        let flags: Vec<_> = us
            .iter()
            .map(|u| {
                (
                    u.id.to_string(),
                    u.partner.object_number(),
                    u.is_undersegmented,
                    u.contains_border,
                )
            })
            .collect();
        assert_eq!(
            flags,
            [
                ("r_1_Label_1".to_string(), 2, true, true),
                ("r_2_Label_1".to_string(), 2, false, false),
            ]
        );
        assert!(us[0].points.len() >= 4);
    }

    #[test]
    fn test_no_pairs_in_range() {
        let mut data = session();
        // 两张图像上 center 的质心距离都是 2.
        assert!(data.get_is_undersegmented(1.0).unwrap().is_empty());
        assert!(data.relations().contains(&center_relation_kind(1.0)));
        assert!(data.get_center_rel(1.0).unwrap().is_empty());
    }

    #[test]
    fn test_oversegmented() {
        let data = session();
        let os = data.get_is_oversegmented().unwrap();
        let flags: Vec<_> = os
            .iter()
            .map(|o| (o.id.to_string(), o.is_oversegmented))
            .collect();
        assert_eq!(
            flags,
            [
                ("r_1_Label_1".to_string(), true),
                ("r_1_Label_2".to_string(), false),
                ("r_2_Label_1".to_string(), false),
                ("r_2_Label_2".to_string(), false),
            ]
        );
    }
}

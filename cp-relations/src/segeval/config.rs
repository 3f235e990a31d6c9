//! 分割质量评估配置.

use crate::consts::{seg, DEFAULT_CENTER_DISTANCE};
use crate::{RelError, RelResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 分割质量评估使用的对象名、掩膜名和特征名.
///
/// 默认值与 CellProfiler 分割比较流程的输出一致.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegEvalConfig {
    /// 标签对象类型名.
    pub label_object: String,

    /// 标签掩膜名.
    pub label_mask: String,

    /// 细胞掩膜对象类型名.
    pub cell_mask_object: String,

    /// 细胞掩膜上的 percent touching 特征.
    pub percent_touching_feature: String,

    /// 欠分割判定使用的强度特征.
    pub undersegmentation_feature: String,

    /// 过分割判定使用的边界距离特征.
    pub oversegmentation_feature: String,

    /// 标签对象表中的类别列.
    pub label_class_column: String,

    /// 共定位检测的默认距离阈值.
    pub distance: f64,
}

impl Default for SegEvalConfig {
    fn default() -> Self {
        Self {
            label_object: "Label".to_string(),
            label_mask: "LabelObjImg".to_string(),
            cell_mask_object: "Mask2x".to_string(),
            percent_touching_feature: "Neighbors_PercentTouching_Adjacent".to_string(),
            undersegmentation_feature: "Intensity_MedianIntensity_Mask2xImg".to_string(),
            oversegmentation_feature: "Intensity_MinIntensity_MaskDistance".to_string(),
            label_class_column: seg::LABEL.to_string(),
            distance: DEFAULT_CENTER_DISTANCE,
        }
    }
}

impl SegEvalConfig {
    /// 检查配置. 名称为空或距离不是正的有限数时返回 `Err(RelError::Configuration)`.
    pub fn check(&self) -> RelResult<()> {
        let names = [
            ("label_object", &self.label_object),
            ("label_mask", &self.label_mask),
            ("cell_mask_object", &self.cell_mask_object),
            ("percent_touching_feature", &self.percent_touching_feature),
            ("undersegmentation_feature", &self.undersegmentation_feature),
            ("oversegmentation_feature", &self.oversegmentation_feature),
            ("label_class_column", &self.label_class_column),
        ];
        if let Some((field, _)) = names.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(RelError::Configuration(format!("`{field}` must not be empty")));
        }
        check_distance(self.distance)
    }
}

/// 距离阈值必须是正的有限数.
pub(crate) fn check_distance(distance: f64) -> RelResult<()> {
    if distance.is_finite() && distance > 0.0 {
        Ok(())
    } else {
        Err(RelError::Configuration(format!(
            "distance must be positive, got {distance}"
        )))
    }
}

//! 欠分割 / 过分割判定.

use super::label::LabelClass;
use crate::{Idx2dF, JoinedTable, ObjectId, ObjectTable, RelError, RelResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一对共定位 center 的欠分割判定结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnderSegmentation {
    /// 第一个 center.
    pub id: ObjectId,

    /// 第二个 center.
    pub partner: ObjectId,

    /// 两侧的强度特征是否相等?
    pub is_undersegmented: bool,

    /// 凸包顶点.
    pub points: Vec<Idx2dF>,

    /// 凸包内是否有 border 像素?
    pub contains_border: bool,
}

/// 一个 center 的过分割判定结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OverSegmentation {
    /// 对象.
    pub id: ObjectId,

    /// 边界距离特征是否为负?
    pub is_oversegmented: bool,
}

/// 根据共定位连接结果判定欠分割.
///
/// `joined` 的列依次为: 第二个 center 的特征 `feature`, `points`, `contains_border`.
/// 第一个 center 的特征从 `labels` 中读取. 两侧特征在数值上相等时判定为欠分割,
/// 任一侧缺失时判定为否.
pub fn classify_undersegmentation(
    labels: &ObjectTable,
    joined: &JoinedTable,
    feature: &str,
) -> RelResult<Vec<UnderSegmentation>> {
    let own = labels.column_index(feature)?;
    let other = joined.column_index(feature)?;
    let points = joined.column_index(crate::consts::seg::POINTS)?;
    let border = joined.column_index(crate::consts::seg::CONTAINS_BORDER)?;

    let mut ans = Vec::with_capacity(joined.len());
    for row in joined.rows() {
        let Some(partner) = row.target.clone() else {
            continue;
        };
        let record = labels.find(&row.id).ok_or_else(|| {
            RelError::DataIntegrity(format!("object {} not found in label table", row.id))
        })?;
        ans.push(UnderSegmentation {
            id: row.id.clone(),
            partner,
            is_undersegmented: record.value(own).num_eq(&row.values[other]),
            points: row.values[points]
                .as_points()
                .map(<[Idx2dF]>::to_vec)
                .unwrap_or_default(),
            contains_border: row.values[border].as_bool().unwrap_or(false),
        });
    }
    Ok(ans)
}

/// 判定 center 对象的过分割: 边界距离特征 `feature` 为负时判定为过分割.
///
/// 只输出类别列 `class_column` 为 center 的对象. 特征缺失时判定为否.
pub fn classify_oversegmentation(
    labels: &ObjectTable,
    class_column: &str,
    feature: &str,
) -> RelResult<Vec<OverSegmentation>> {
    let class = labels.column_index(class_column)?;
    let value = labels.column_index(feature)?;
    Ok(labels
        .iter()
        .filter(|r| LabelClass::from_value(r.value(class)) == Some(LabelClass::Center))
        .map(|r| OverSegmentation {
            id: r.id().clone(),
            is_oversegmented: r.value(value).as_f64().map_or(false, |v| v < 0.0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::classify_oversegmentation;
    use crate::{ObjectTable, Value};

    #[test]
    fn test_oversegmentation() {
        let mut t = ObjectTable::new("Label", ["label", "Intensity_MinIntensity_MaskDistance"]);
        t.push("r_1", 1, 1, vec!["center".into(), (-0.5).into()]).unwrap();
        t.push("r_1", 1, 2, vec!["center".into(), 0.5.into()]).unwrap();
        t.push("r_1", 1, 3, vec!["border".into(), (-0.5).into()]).unwrap();
        t.push("r_1", 1, 4, vec!["center".into(), Value::Missing]).unwrap();

        let res =
            classify_oversegmentation(&t, "label", "Intensity_MinIntensity_MaskDistance").unwrap();
        let flags: Vec<_> = res
            .iter()
            .map(|r| (r.id.object_number(), r.is_oversegmented))
            .collect();
        assert_eq!(flags, [(1, true), (2, false), (4, false)]);
    }
}

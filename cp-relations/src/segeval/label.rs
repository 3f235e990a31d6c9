//! 标签类别.

use std::fmt::Formatter;

use crate::{ObjectId, ObjectTable, RelResult, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 训练标签图中每个区域的类别.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LabelClass {
    /// 对象核心区域.
    Center,

    /// 对象边界.
    Border,

    /// 背景.
    Background,
}

impl LabelClass {
    /// 由 CellProfiler 测得的标签值得到类别: `1` 为 center, `2` 为 border, `3` 为 background.
    ///
    /// 其他值返回 `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Center),
            2 => Some(Self::Border),
            3 => Some(Self::Background),
            _ => None,
        }
    }

    /// 解析类别名 (`center`, `border`, `background`). 不区分大小写.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [Self::Center, Self::Border, Self::Background]
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }

    /// 类别名.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Border => "border",
            Self::Background => "background",
        }
    }

    /// 从单元格读取类别. 接受类别名或标签值.
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Text(s) => Self::parse(s),
            other => other.as_u32().and_then(Self::from_code),
        }
    }
}

impl std::fmt::Display for LabelClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 根据标签值列 `code_column` 写入类别列 `class_column`. 无法识别的标签值得到缺失值.
///
/// 标签值列不存在时返回 `Err(RelError::Configuration)`.
pub fn assign_label_classes(
    table: &mut ObjectTable,
    code_column: &str,
    class_column: &str,
) -> RelResult<()> {
    let classes: Vec<(ObjectId, Value)> = table
        .column(code_column)?
        .map(|(id, v)| {
            let class = v
                .as_u32()
                .and_then(LabelClass::from_code)
                .map(|c| c.as_str());
            (id.clone(), Value::from(class))
        })
        .collect();
    table.add_column(class_column, classes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{assign_label_classes, LabelClass};
    use crate::{ObjectTable, Value};

    #[test]
    fn test_from_code() {
        assert_eq!(LabelClass::from_code(1), Some(LabelClass::Center));
        assert_eq!(LabelClass::from_code(3), Some(LabelClass::Background));
        assert_eq!(LabelClass::from_code(0), None);
        assert_eq!(LabelClass::parse(" Border"), Some(LabelClass::Border));
        assert_eq!(
            LabelClass::from_value(&Value::Float(2.0)),
            Some(LabelClass::Border)
        );
    }

    #[test]
    fn test_assign_label_classes() {
        let mut t = ObjectTable::new("Label", ["Intensity_MeanIntensity_LabelImg"]);
        t.push("r_1", 1, 1, vec![1.0.into()]).unwrap();
        t.push("r_1", 1, 2, vec![2.0.into()]).unwrap();
        t.push("r_1", 1, 3, vec![7.0.into()]).unwrap();
        assign_label_classes(&mut t, "Intensity_MeanIntensity_LabelImg", "label").unwrap();

        let classes: Vec<_> = t.column("label").unwrap().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            classes,
            [Value::from("center"), Value::from("border"), Value::Missing]
        );
        assert!(assign_label_classes(&mut t, "nope", "label").is_err());
    }
}

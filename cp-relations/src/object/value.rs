//! 表格单元格的值.

use crate::Idx2dF;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 对象表 / 关系表中的一个单元格.
///
/// `Float(NaN)` 与 `Missing` 同样视为缺失值.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// 缺失值.
    #[default]
    Missing,

    /// 整数.
    Int(i64),

    /// 浮点数.
    Float(f64),

    /// 布尔值.
    Bool(bool),

    /// 文本.
    Text(String),

    /// 二维点集, 例如凸包顶点.
    Points(Vec<Idx2dF>),
}

impl Value {
    /// 是否为缺失值 (包括 `NaN`)?
    #[inline]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// 以 `f64` 读取数值. 非数值或缺失时返回 `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(i) => Some(i as f64),
            Self::Float(f) if !f.is_nan() => Some(f),
            _ => None,
        }
    }

    /// 以 `u32` 读取编号. 导出表常把整数写成 `3.0` 的形式, 因此整值浮点数也可接受.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::Int(i) => u32::try_from(i).ok(),
            Self::Float(f) if f.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&f) => {
                Some(f as u32)
            }
            _ => None,
        }
    }

    /// 读取布尔值.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// 读取文本.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 读取点集.
    #[inline]
    pub fn as_points(&self) -> Option<&[Idx2dF]> {
        match self {
            Self::Points(p) => Some(p.as_slice()),
            _ => None,
        }
    }

    /// 数值意义上的相等. 整数与浮点数之间按数值比较, 缺失值与任何值都不相等.
    pub fn num_eq(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    #[inline]
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    #[inline]
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<Idx2dF>> for Value {
    #[inline]
    fn from(v: Vec<Idx2dF>) -> Self {
        Self::Points(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Missing, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn test_missing() {
        assert!(Value::Missing.is_missing());
        assert!(Value::Float(f64::NAN).is_missing());
        assert!(!Value::Float(0.0).is_missing());
        assert!(!Value::Text(String::new()).is_missing());
        assert_eq!(Value::from(None::<f64>), Value::Missing);
    }

    #[test]
    fn test_as_u32() {
        assert_eq!(Value::Int(3).as_u32(), Some(3));
        assert_eq!(Value::Float(3.0).as_u32(), Some(3));
        assert_eq!(Value::Float(3.5).as_u32(), None);
        assert_eq!(Value::Int(-1).as_u32(), None);
        assert_eq!(Value::from("3").as_u32(), None);
    }

    #[test]
    fn test_num_eq() {
        assert!(Value::Int(2).num_eq(&Value::Float(2.0)));
        assert!(!Value::Float(2.0).num_eq(&Value::Float(2.5)));
        // NaN != NaN
        assert!(!Value::Float(f64::NAN).num_eq(&Value::Float(f64::NAN)));
        assert!(!Value::Missing.num_eq(&Value::Missing));
    }
}

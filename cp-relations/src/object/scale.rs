//! 测量值缩放.
//!
//! CellProfiler 会把强度图像缩放到 `[0, 1]`, 缩放系数记录在图像表中.
//! 只有当一批图像的缩放系数一致时, 才能把对象测量值还原回原始强度.

use super::{ObjectTable, Value};
use crate::{RelError, RelResult};

/// 与 `numpy.allclose` 相同的相对容差.
const RTOL: f64 = 1e-5;

/// 与 `numpy.allclose` 相同的绝对容差.
const ATOL: f64 = 1e-8;

#[inline]
fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ATOL + RTOL * b.abs()
}

/// 检查一组缩放系数是否全部 (近似) 相等, 相等时返回第一个系数.
///
/// # 返回值
///
/// - 当 `values` 为空时, 返回 `Err(RelError::DataIntegrity)`;
/// - 当存在与第一个系数不接近的值时, 返回 `Err(RelError::DataIntegrity)`;
/// - 其他情况下返回 `Ok(values[0])`.
pub fn uniform_scaling(values: &[f64]) -> RelResult<f64> {
    let (&first, rest) = values
        .split_first()
        .ok_or_else(|| RelError::DataIntegrity("empty scaling vector".to_string()))?;
    match rest.iter().find(|&&v| !is_close(v, first)) {
        Some(other) => Err(RelError::DataIntegrity(format!(
            "not all images scaled equally: {first} vs {other}"
        ))),
        None => Ok(first),
    }
}

impl ObjectTable {
    /// 将 `columns` 中的所有数值乘以 `factor`. 整数会变为浮点数, 缺失值保持不变.
    ///
    /// 任一列不存在时返回 `Err(RelError::Configuration)`, 此时表格不被修改.
    pub fn scale_columns(&mut self, columns: &[&str], factor: f64) -> RelResult<()> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<RelResult<Vec<_>>>()?;
        for r in self.records_mut() {
            for &i in indices.iter() {
                if let Some(v) = r.values[i].as_f64() {
                    r.values[i] = Value::Float(v * factor);
                }
            }
        }
        Ok(())
    }
}

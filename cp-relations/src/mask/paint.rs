//! 把对象数值映射回掩膜.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};

use crate::consts::BACKGROUND_LABEL;
use crate::{ObjectTable, RelResult};

/// 把每个对象的数值涂到它的像素上. 背景以及 `values` 中没有的标签为 `NaN`.
pub fn map_values_on_mask(mask: ArrayView2<u32>, values: &HashMap<u32, f64>) -> Array2<f64> {
    mask.mapv(|label| match label {
        BACKGROUND_LABEL => f64::NAN,
        _ => values.get(&label).copied().unwrap_or(f64::NAN),
    })
}

/// 把对象表中图像 `image_id` 上的列 `column` 涂到掩膜上. 非数值视为缺失.
///
/// 列不存在时返回 `Err(RelError::Configuration)`.
pub fn map_column_on_mask(
    mask: ArrayView2<u32>,
    table: &ObjectTable,
    image_id: &str,
    column: &str,
) -> RelResult<Array2<f64>> {
    let index = table.column_index(column)?;
    let values: HashMap<u32, f64> = table
        .filter_image(image_id)
        .filter_map(|r| Some((r.object_number(), r.value(index).as_f64()?)))
        .collect();
    Ok(map_values_on_mask(mask, &values))
}

//! 单对象测量表.
//!
//! 每个对象 (细胞、标签区域、掩膜区域等) 由 `(图像, 对象类型, 对象编号)` 唯一确定.
//! 表格本身由上游的格式转换层生成, 这里只负责带类型地保存和查询.

mod scale;
mod value;

use std::collections::HashMap;
use std::fmt::Formatter;

use crate::{RelError, RelResult};

pub use scale::uniform_scaling;
pub use value::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 构造图像全局标识, 形如 `{run}_{image_number}`.
#[inline]
pub fn image_id(run: &str, image_number: u32) -> String {
    format!("{run}_{image_number}")
}

/// 对象全局标识.
///
/// 按 `(图像标识, 对象类型, 对象编号)` 的字典序比较.
/// 其 `Display` 形式为 `{image_id}_{object_type}_{object_number}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectId {
    image_id: String,
    object_type: String,
    object_number: u32,
}

impl ObjectId {
    /// 直接初始化.
    pub fn new(
        image_id: impl Into<String>,
        object_type: impl Into<String>,
        object_number: u32,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            object_type: object_type.into(),
            object_number,
        }
    }

    /// 图像标识.
    #[inline]
    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// 对象类型名.
    #[inline]
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// 对象编号.
    #[inline]
    pub fn object_number(&self) -> u32 {
        self.object_number
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.image_id, self.object_type, self.object_number
        )
    }
}

/// 对象表中的一行.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectRecord {
    id: ObjectId,
    image_number: u32,
    values: Vec<Value>,
}

impl ObjectRecord {
    /// 对象全局标识.
    #[inline]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// 图像编号.
    #[inline]
    pub fn image_number(&self) -> u32 {
        self.image_number
    }

    /// 对象编号.
    #[inline]
    pub fn object_number(&self) -> u32 {
        self.id.object_number
    }

    /// 与表头一一对应的测量值.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 第 `index` 列的值. 越界时 panic.
    #[inline]
    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// 单一对象类型的测量表.
///
/// 行序即插入顺序. 内部以 `(图像编号, 对象编号)` 和 [`ObjectId`] 两种方式索引.
#[derive(Clone, Debug)]
pub struct ObjectTable {
    object_type: String,
    columns: Vec<String>,
    records: Vec<ObjectRecord>,
    by_number: HashMap<(u32, u32), usize>,
    by_id: HashMap<ObjectId, usize>,
}

impl ObjectTable {
    /// 以对象类型名和表头创建空表.
    pub fn new<S, I, C>(object_type: S, columns: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            object_type: object_type.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            records: vec![],
            by_number: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// 追加一行.
    ///
    /// # 返回值
    ///
    /// - 当 `values` 的长度与表头不一致时, 返回 `Err(RelError::DataIntegrity)`;
    /// - 当 `(image_number, object_number)` 已经存在时, 返回 `Err(RelError::DataIntegrity)`;
    /// - 当对象标识已经存在 (同一 `image_id` 对应了另一个 `image_number`) 时,
    ///   返回 `Err(RelError::DataIntegrity)`;
    /// - 其他情况下成功.
    pub fn push(
        &mut self,
        image_id: &str,
        image_number: u32,
        object_number: u32,
        values: Vec<Value>,
    ) -> RelResult<()> {
        if values.len() != self.columns.len() {
            return Err(RelError::DataIntegrity(format!(
                "{} object row has {} values, expected {}",
                self.object_type,
                values.len(),
                self.columns.len()
            )));
        }
        let key = (image_number, object_number);
        if self.by_number.contains_key(&key) {
            return Err(RelError::DataIntegrity(format!(
                "duplicate {} object {object_number} in image {image_number}",
                self.object_type
            )));
        }
        let id = ObjectId::new(image_id, self.object_type.as_str(), object_number);
        if self.by_id.contains_key(&id) {
            return Err(RelError::DataIntegrity(format!(
                "duplicate object id {id} (image number {image_number})"
            )));
        }
        let pos = self.records.len();
        self.by_number.insert(key, pos);
        self.by_id.insert(id.clone(), pos);
        self.records.push(ObjectRecord {
            id,
            image_number,
            values,
        });
        Ok(())
    }

    /// 对象类型名.
    #[inline]
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// 表头.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按插入顺序迭代所有行.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ObjectRecord> {
        self.records.iter()
    }

    /// 列名对应的列下标. 列不存在时返回 `Err(RelError::Configuration)`.
    pub fn column_index(&self, name: &str) -> RelResult<usize> {
        self.columns.iter().position(|c| c == name).ok_or_else(|| {
            RelError::Configuration(format!(
                "column `{name}` not found in {} objects",
                self.object_type
            ))
        })
    }

    /// 通过 `(图像编号, 对象编号)` 获取一行.
    #[inline]
    pub fn get(&self, image_number: u32, object_number: u32) -> Option<&ObjectRecord> {
        self.by_number
            .get(&(image_number, object_number))
            .map(|&i| &self.records[i])
    }

    /// 通过全局标识获取一行.
    #[inline]
    pub fn find(&self, id: &ObjectId) -> Option<&ObjectRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    /// 按行序获取某一列的 `(标识, 值)`.
    pub fn column(&self, name: &str) -> RelResult<impl Iterator<Item = (&ObjectId, &Value)> + '_> {
        let index = self.column_index(name)?;
        Ok(self.records.iter().map(move |r| (&r.id, &r.values[index])))
    }

    /// 获取位于图像 `image_id` 上的所有行.
    pub fn filter_image<'a>(
        &'a self,
        image_id: &'a str,
    ) -> impl Iterator<Item = &'a ObjectRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.id.image_id == image_id)
    }

    /// 以左连接的方式添加 (或覆盖) 一列: `values` 中没有出现的对象得到缺失值.
    ///
    /// `values` 中同一对象出现多次时, 以最后一次为准.
    pub fn add_column<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = (ObjectId, Value)>,
    {
        let mut map: HashMap<ObjectId, Value> = values.into_iter().collect();
        let index = match self.columns.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.records
                    .iter_mut()
                    .for_each(|r| r.values.push(Value::Missing));
                self.columns.len() - 1
            }
        };
        for r in self.records.iter_mut() {
            r.values[index] = map.remove(&r.id).unwrap_or_default();
        }
    }

    /// 获取单元格的可变引用. 仅在 crate 内部使用.
    #[inline]
    pub(crate) fn records_mut(&mut self) -> std::slice::IterMut<'_, ObjectRecord> {
        self.records.iter_mut()
    }
}

impl<'a> IntoIterator for &'a ObjectTable {
    type Item = &'a ObjectRecord;
    type IntoIter = std::slice::Iter<'a, ObjectRecord>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{image_id, ObjectId, ObjectTable, Value};
    use crate::RelError;

    fn cells() -> ObjectTable {
        let mut t = ObjectTable::new("cell", ["area", "mean"]);
        let img = image_id("run1", 1);
        t.push(&img, 1, 1, vec![10.into(), 0.5.into()]).unwrap();
        t.push(&img, 1, 2, vec![12.into(), 0.7.into()]).unwrap();
        t.push(&image_id("run1", 2), 2, 1, vec![8.into(), Value::Missing])
            .unwrap();
        t
    }

    #[test]
    fn test_object_id_display_and_order() {
        let a = ObjectId::new("run1_1", "cell", 2);
        let b = ObjectId::new("run1_1", "cell", 10);
        let c = ObjectId::new("run1_2", "cell", 1);
        assert_eq!(a.to_string(), "run1_1_cell_2");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_push_rejects_bad_rows() {
        let mut t = cells();
        assert!(matches!(
            t.push("run1_1", 1, 1, vec![1.into(), 1.into()]),
            Err(RelError::DataIntegrity(_))
        ));
        assert!(matches!(
            t.push("run1_1", 1, 3, vec![1.into()]),
            Err(RelError::DataIntegrity(_))
        ));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_push_rejects_id_collision() {
        let mut t = cells();
        // 同一个图像标识不能对应两个图像编号.
        assert!(matches!(
            t.push("run1_1", 7, 1, vec![1.into(), 1.into()]),
            Err(RelError::DataIntegrity(_))
        ));
        assert_eq!(t.len(), 3);
        let id = ObjectId::new("run1_1", "cell", 1);
        assert_eq!(t.find(&id).unwrap().image_number(), 1);
        assert!(t.get(7, 1).is_none());
    }

    #[test]
    fn test_lookup() {
        let t = cells();
        let r = t.get(1, 2).unwrap();
        assert_eq!(r.id().to_string(), "run1_1_cell_2");
        assert_eq!(r.value(t.column_index("area").unwrap()), &Value::Int(12));
        assert!(t.get(2, 2).is_none());
        assert_eq!(t.find(r.id()).unwrap().object_number(), 2);
        assert_eq!(t.filter_image("run1_1").count(), 2);
        assert!(matches!(
            t.column_index("nope"),
            Err(RelError::Configuration(_))
        ));
    }

    #[test]
    fn test_add_column_left() {
        let mut t = cells();
        let id = t.get(1, 1).unwrap().id().clone();
        t.add_column("flag", [(id, Value::Bool(true))]);
        let flags: Vec<_> = t.column("flag").unwrap().map(|(_, v)| v.clone()).collect();
        assert_eq!(flags, [Value::Bool(true), Value::Missing, Value::Missing]);

        // 覆盖已有列
        t.add_column("flag", []);
        assert!(t.column("flag").unwrap().all(|(_, v)| v.is_missing()));
        assert_eq!(t.columns().len(), 3);
    }
}

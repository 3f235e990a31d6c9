//! 沿关系连接测量值.

use itertools::Itertools;
use ordered_float::NotNan;

use super::{ObjectRelations, RelationKind};
use crate::{ObjectId, ObjectTable, RelError, RelResult, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 连接方式.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JoinHow {
    /// 只输出解析成功的边. 没有任何边的源对象不出现在结果中.
    #[default]
    Inner,

    /// 在 `Inner` 的基础上, 为没有任何边的源对象补一行缺失值.
    Left,
}

/// 按源对象聚合的方式.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Agg {
    /// 最小值.
    Min,

    /// 最大值.
    Max,

    /// 平均值.
    Mean,
}

/// 一次关系连接的参数.
///
/// ```ignore
/// let joined = relations.join_values(
///     &RelationQuery::new(&RelationKind::Neighbor, &cells)
///         .values(["Intensity_MeanIntensity_Ir191"])
///         .relation_columns(["PercentTouching"]),
/// )?;
/// ```
#[derive(Clone, Debug)]
pub struct RelationQuery<'a> {
    kind: &'a RelationKind,
    source: &'a ObjectTable,
    target: Option<&'a ObjectTable>,
    values: Vec<&'a str>,
    relation_columns: Vec<&'a str>,
    how: JoinHow,
}

impl<'a> RelationQuery<'a> {
    /// 以关系类型和源对象表初始化. 目标对象表默认与源对象表相同.
    pub fn new(kind: &'a RelationKind, source: &'a ObjectTable) -> Self {
        Self {
            kind,
            source,
            target: None,
            values: vec![],
            relation_columns: vec![],
            how: JoinHow::Inner,
        }
    }

    /// 设置目标对象表.
    pub fn target(mut self, target: &'a ObjectTable) -> Self {
        self.target = Some(target);
        self
    }

    /// 需要从目标对象表取出的列.
    pub fn values<I: IntoIterator<Item = &'a str>>(mut self, columns: I) -> Self {
        self.values = columns.into_iter().collect();
        self
    }

    /// 需要一并保留的关系属性列.
    pub fn relation_columns<I: IntoIterator<Item = &'a str>>(mut self, columns: I) -> Self {
        self.relation_columns = columns.into_iter().collect();
        self
    }

    /// 设置连接方式.
    pub fn how(mut self, how: JoinHow) -> Self {
        self.how = how;
        self
    }
}

/// 连接结果中的一行.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRow {
    /// 源对象.
    pub id: ObjectId,

    /// 目标对象. 左连接补出的行为 `None`.
    pub target: Option<ObjectId>,

    /// 与 [`JoinedTable::columns`] 一一对应的值.
    pub values: Vec<Value>,
}

/// 连接结果: 按源对象表的行序排列, 同一源对象的多行按边的行序排列.
#[derive(Clone, Debug, Default)]
pub struct JoinedTable {
    columns: Vec<String>,
    rows: Vec<JoinedRow>,
}

impl JoinedTable {
    /// 只有表头的空表.
    pub(crate) fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    /// 表头: 先是目标对象的测量列, 然后是关系属性列.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 所有行.
    #[inline]
    pub fn rows(&self) -> &[JoinedRow] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列下标. 列不存在时返回 `Err(RelError::Configuration)`.
    pub fn column_index(&self, name: &str) -> RelResult<usize> {
        self.columns.iter().position(|c| c == name).ok_or_else(|| {
            RelError::Configuration(format!("column `{name}` not found in joined table"))
        })
    }

    /// 按行序获取某一列的 `(源对象, 值)`.
    pub fn column(&self, name: &str) -> RelResult<impl Iterator<Item = (&ObjectId, &Value)> + '_> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(move |r| (&r.id, &r.values[index])))
    }

    /// 按源对象聚合某一列, 结果按源对象首次出现的顺序排列.
    ///
    /// 聚合时跳过缺失值, 全部缺失的源对象得到 [`Value::Missing`].
    pub fn aggregate(&self, name: &str, agg: Agg) -> RelResult<Vec<(ObjectId, Value)>> {
        let index = self.column_index(name)?;
        let mut ans = vec![];
        for (id, group) in &self.rows.iter().group_by(|r| &r.id) {
            let nums = group
                .filter_map(|r| r.values[index].as_f64())
                .filter_map(|v| NotNan::new(v).ok());
            let value = match agg {
                Agg::Min => nums.min().map(NotNan::into_inner),
                Agg::Max => nums.max().map(NotNan::into_inner),
                Agg::Mean => {
                    let (sum, count) = nums.fold((0.0, 0usize), |(s, c), v| (s + *v, c + 1));
                    (count > 0).then(|| sum / count as f64)
                }
            };
            ans.push((id.clone(), Value::from(value)));
        }
        Ok(ans)
    }
}

impl ObjectRelations {
    /// 沿关系 `query.kind` 把目标对象的测量值连接到源对象上.
    ///
    /// 每条解析成功的边产生一行: 有 N 条边的源对象得到 N 行.
    /// 目标对象表中找不到第二对象的边被丢弃. 关系属性缺失不会导致丢弃.
    ///
    /// # 返回值
    ///
    /// - 当关系是 neighbor, 而源对象类型与目标对象类型不同时, 返回 `Err(RelError::InvalidRelationship)`;
    /// - 当 `(关系类型, 源对象类型, 目标对象类型)` 从未注册时, 返回 `Err(RelError::Configuration)`;
    /// - 当请求的测量列或关系属性列不存在时, 返回 `Err(RelError::Configuration)`.
    pub fn join_values(&self, query: &RelationQuery) -> RelResult<JoinedTable> {
        let source = query.source;
        let target = query.target.unwrap_or(source);
        if query.kind.is_neighbor() && source.object_type() != target.object_type() {
            return Err(RelError::InvalidRelationship {
                kind: query.kind.clone(),
                source_type: source.object_type().to_string(),
                target_type: target.object_type().to_string(),
            });
        }

        let edges = self.edges(query.kind, source.object_type(), target.object_type())?;
        let value_idx = query
            .values
            .iter()
            .map(|c| target.column_index(c))
            .collect::<RelResult<Vec<_>>>()?;
        let attr_idx = query
            .relation_columns
            .iter()
            .map(|&c| {
                edges.attr_index(c).ok_or_else(|| {
                    RelError::Configuration(format!(
                        "relationship attribute `{c}` not found for `{}`",
                        query.kind
                    ))
                })
            })
            .collect::<RelResult<Vec<_>>>()?;

        let columns = query
            .values
            .iter()
            .chain(query.relation_columns.iter())
            .map(|c| c.to_string())
            .collect_vec();
        let mut rows = vec![];
        for record in source {
            let before = rows.len();
            for edge in edges.edges_from(record.image_number(), record.object_number()) {
                let Some(other) = target.get(edge.second_image_number, edge.second_object_number)
                else {
                    continue;
                };
                let values = value_idx
                    .iter()
                    .map(|&i| other.value(i).clone())
                    .chain(attr_idx.iter().map(|&i| edge.attrs[i].clone()))
                    .collect();
                rows.push(JoinedRow {
                    id: record.id().clone(),
                    target: Some(other.id().clone()),
                    values,
                });
            }
            if rows.len() == before && query.how == JoinHow::Left {
                rows.push(JoinedRow {
                    id: record.id().clone(),
                    target: None,
                    values: vec![Value::Missing; columns.len()],
                });
            }
        }
        Ok(JoinedTable { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::{Agg, JoinHow, RelationQuery};
    use crate::{
        ObjectRelations, ObjectTable, RelError, RelationEdge, RelationKind, RelationRecord,
        RelationSet, Value,
    };

    fn table(object_type: &str, n: u32) -> ObjectTable {
        let mut t = ObjectTable::new(object_type, ["mean"]);
        for i in 1..=n {
            t.push("r_1", 1, i, vec![Value::Float(i as f64 * 10.0)])
                .unwrap();
        }
        t
    }

    fn edge(first: &str, second: &str, a: u32, b: u32, touching: Value) -> RelationRecord {
        RelationRecord {
            first_type: first.to_string(),
            second_type: second.to_string(),
            edge: RelationEdge {
                first_object_number: a,
                first_image_number: 1,
                second_object_number: b,
                second_image_number: 1,
                attrs: vec![touching],
            },
        }
    }

    /// cell 1 <-> 2, 1 <-> 3, cell 4 孤立; cell 2 -> 9 指向不存在的对象.
    fn relations() -> ObjectRelations {
        let mut set = RelationSet::new(["PercentTouching"]);
        for r in [
            edge("cell", "cell", 1, 2, 0.4.into()),
            edge("cell", "cell", 2, 1, 0.4.into()),
            edge("cell", "cell", 1, 3, Value::Missing),
            edge("cell", "cell", 3, 1, 0.1.into()),
            edge("cell", "cell", 2, 9, 0.2.into()),
            edge("cell", "nuclei", 1, 1, 0.0.into()),
        ] {
            set.push(r).unwrap();
        }
        let mut rel = ObjectRelations::new();
        rel.register(RelationKind::Neighbor, set);
        rel
    }

    #[test]
    fn test_round_trip() {
        let rel = relations();
        let cells = table("cell", 4);
        let q = RelationQuery::new(&RelationKind::Neighbor, &cells).values(["mean"]);
        let joined = rel.join_values(&q).unwrap();

        // 1 -> 2, 1 -> 3, 2 -> 1, 3 -> 1. 2 -> 9 无法解析, 4 没有边.
        let pairs: Vec<_> = joined
            .rows()
            .iter()
            .map(|r| (r.id.object_number(), r.target.as_ref().unwrap().object_number()))
            .collect();
        assert_eq!(pairs, [(1, 2), (1, 3), (2, 1), (3, 1)]);
        let means: Vec<_> = joined.column("mean").unwrap().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            means,
            [Value::Float(20.0), Value::Float(30.0), Value::Float(10.0), Value::Float(10.0)]
        );
    }

    #[test]
    fn test_neighbor_type_mismatch() {
        let rel = relations();
        let cells = table("cell", 4);
        let labels = table("label", 1);
        let q = RelationQuery::new(&RelationKind::Neighbor, &cells).target(&labels);
        assert!(matches!(
            rel.join_values(&q),
            Err(RelError::InvalidRelationship { .. })
        ));
    }

    #[test]
    fn test_unregistered_and_missing_columns() {
        let rel = relations();
        let cells = table("cell", 4);
        let q = RelationQuery::new(&RelationKind::Parent, &cells);
        assert!(matches!(rel.join_values(&q), Err(RelError::Configuration(_))));

        let q = RelationQuery::new(&RelationKind::Neighbor, &cells).values(["nope"]);
        assert!(matches!(rel.join_values(&q), Err(RelError::Configuration(_))));

        let q = RelationQuery::new(&RelationKind::Neighbor, &cells).relation_columns(["nope"]);
        assert!(matches!(rel.join_values(&q), Err(RelError::Configuration(_))));
    }

    #[test]
    fn test_left_join_and_relation_columns() {
        let rel = relations();
        let cells = table("cell", 4);
        let q = RelationQuery::new(&RelationKind::Neighbor, &cells)
            .values(["mean"])
            .relation_columns(["PercentTouching"])
            .how(JoinHow::Left);
        let joined = rel.join_values(&q).unwrap();
        assert_eq!(joined.columns(), ["mean", "PercentTouching"]);
        assert_eq!(joined.len(), 5);

        let last = &joined.rows()[4];
        assert_eq!(last.id.object_number(), 4);
        assert!(last.target.is_none());
        assert!(last.values.iter().all(Value::is_missing));

        // 关系属性缺失的边仍然保留
        assert!(joined.rows()[1].values[1].is_missing());
    }

    #[test]
    fn test_aggregate() {
        let rel = relations();
        let cells = table("cell", 4);
        let q = RelationQuery::new(&RelationKind::Neighbor, &cells)
            .relation_columns(["PercentTouching"])
            .how(JoinHow::Left);
        let joined = rel.join_values(&q).unwrap();

        let min = joined.aggregate("PercentTouching", Agg::Min).unwrap();
        let numbers: Vec<_> = min.iter().map(|(id, _)| id.object_number()).collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
        assert_eq!(min[0].1, Value::Float(0.4));
        assert_eq!(min[3].1, Value::Missing);

        let mean = joined.aggregate("PercentTouching", Agg::Mean).unwrap();
        assert_eq!(mean[2].1, Value::Float(0.1));
        let max = joined.aggregate("PercentTouching", Agg::Max).unwrap();
        assert_eq!(max[1].1, Value::Float(0.4));
    }
}

//! 对象关系存储.
//!
//! 关系表的每一行描述一条有向边: 第一对象 `--关系-->` 第二对象.
//! 存储按 `(关系类型, 第一对象类型, 第二对象类型)` 把边分组, 每组一张 [`EdgeTable`],
//! 组内保持输入的行序. 边既不去重, 也不检查对称性.

mod join;
mod raw;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Formatter;

use log::info;

use crate::consts::seg::CENTER_REL_PREFIX;
use crate::{RelError, RelResult, Value};

pub use join::{Agg, JoinHow, JoinedRow, JoinedTable, RelationQuery};
pub use raw::{normalize_column, KindPolicy, RawRelationTable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 关系类型.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RelationKind {
    /// 第二对象是第一对象的父对象.
    Parent,

    /// 第二对象是第一对象的子对象.
    Child,

    /// 同类型对象之间的邻居关系.
    Neighbor,

    /// 调用方命名的关系, 例如空间共定位检测得到的合成关系,
    /// 或宽松模式下保留下来的未知关系类型.
    Named(String),
}

impl RelationKind {
    /// 解析 CellProfiler 的关系类型名 (`Parent`, `Child`, `Neighbors`). 不区分大小写.
    ///
    /// 无法识别时返回 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("parent") {
            Some(Self::Parent)
        } else if s.eq_ignore_ascii_case("child") {
            Some(Self::Child)
        } else if s.eq_ignore_ascii_case("neighbors") || s.eq_ignore_ascii_case("neighbor") {
            Some(Self::Neighbor)
        } else {
            None
        }
    }

    /// 以名称构造关系类型. 名称恰好是已知类型时返回该已知类型.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::parse(&name).unwrap_or(Self::Named(name))
    }

    /// 名称.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Parent => "Parent",
            Self::Child => "Child",
            Self::Neighbor => "Neighbors",
            Self::Named(s) => s.as_str(),
        }
    }

    /// 是否为邻居关系?
    #[inline]
    pub fn is_neighbor(&self) -> bool {
        matches!(self, Self::Neighbor)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 距离阈值为 `distance` 的共定位关系名, 形如 `nbcenter_dist25`.
///
/// 阈值按整数截断, 因此 `25.0` 和 `25.7` 共用同一个名称.
#[inline]
pub fn center_relation_kind(distance: f64) -> RelationKind {
    RelationKind::Named(format!("{CENTER_REL_PREFIX}{}", distance.trunc() as i64))
}

/// 一条边.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationEdge {
    /// 第一对象编号.
    pub first_object_number: u32,

    /// 第一对象所在图像编号.
    pub first_image_number: u32,

    /// 第二对象编号.
    pub second_object_number: u32,

    /// 第二对象所在图像编号.
    pub second_image_number: u32,

    /// 关系属性 (例如 `PercentTouching`), 与所在 [`EdgeTable`] 的属性列一一对应.
    pub attrs: Vec<Value>,
}

/// 存储中的分组键.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationKey {
    /// 关系类型.
    pub kind: RelationKind,

    /// 第一对象类型名.
    pub first_type: String,

    /// 第二对象类型名.
    pub second_type: String,
}

/// 一个 `(关系类型, 第一对象类型, 第二对象类型)` 组合下的全部边.
#[derive(Clone, Debug)]
pub struct EdgeTable {
    attr_columns: Vec<String>,
    edges: Vec<RelationEdge>,
    /// `(第一图像编号, 第一对象编号)` -> 边下标, 下标按行序排列.
    by_first: HashMap<(u32, u32), Vec<usize>>,
}

impl EdgeTable {
    fn new(attr_columns: Vec<String>) -> Self {
        Self {
            attr_columns,
            edges: vec![],
            by_first: HashMap::new(),
        }
    }

    fn push(&mut self, edge: RelationEdge) {
        self.by_first
            .entry((edge.first_image_number, edge.first_object_number))
            .or_default()
            .push(self.edges.len());
        self.edges.push(edge);
    }

    /// 属性列名.
    #[inline]
    pub fn attr_columns(&self) -> &[String] {
        &self.attr_columns
    }

    /// 属性列下标.
    #[inline]
    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attr_columns.iter().position(|c| c == name)
    }

    /// 按输入行序排列的所有边.
    #[inline]
    pub fn edges(&self) -> &[RelationEdge] {
        &self.edges
    }

    /// 边的条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// 是否没有边?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 以 `(image_number, object_number)` 为第一对象的所有边, 按行序排列.
    pub fn edges_from(
        &self,
        image_number: u32,
        object_number: u32,
    ) -> impl Iterator<Item = &RelationEdge> + '_ {
        self.by_first
            .get(&(image_number, object_number))
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }
}

/// 带对象类型的一条边. 注册合成关系时使用.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationRecord {
    /// 第一对象类型名.
    pub first_type: String,

    /// 第二对象类型名.
    pub second_type: String,

    /// 边本身.
    pub edge: RelationEdge,
}

/// 同一关系类型下的一组边, 所有边共享同一组属性列.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationSet {
    attr_columns: Vec<String>,
    records: Vec<RelationRecord>,
}

impl RelationSet {
    /// 以属性列名创建空集合.
    pub fn new<I, S>(attr_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attr_columns: attr_columns.into_iter().map(Into::into).collect(),
            records: vec![],
        }
    }

    /// 追加一条边. 属性个数与属性列不一致时返回 `Err(RelError::DataIntegrity)`.
    pub fn push(&mut self, record: RelationRecord) -> RelResult<()> {
        if record.edge.attrs.len() != self.attr_columns.len() {
            return Err(RelError::DataIntegrity(format!(
                "relation record has {} attributes, expected {}",
                record.edge.attrs.len(),
                self.attr_columns.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// 属性列名.
    #[inline]
    pub fn attr_columns(&self) -> &[String] {
        &self.attr_columns
    }

    /// 所有边.
    #[inline]
    pub fn records(&self) -> &[RelationRecord] {
        &self.records
    }

    /// 边的条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 对象关系存储.
///
/// 从原始关系表构造一次, 之后只能通过 [`ObjectRelations::register`] 追加或替换关系.
/// `register` 需要 `&mut self`, 多线程共享时需由调用方加锁.
#[derive(Clone, Debug, Default)]
pub struct ObjectRelations {
    relations: BTreeMap<RelationKey, EdgeTable>,
    /// 已注册的关系类型. 注册了空集合的类型也在其中.
    kinds: BTreeSet<RelationKind>,
}

impl ObjectRelations {
    /// 创建空存储.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 从原始关系表构造存储.
    ///
    /// 对未知关系类型的处理由 `policy` 决定, 见 [`KindPolicy`].
    pub fn from_table(raw: &RawRelationTable, policy: KindPolicy) -> RelResult<Self> {
        let mut ans = Self::new();
        for (kind, set) in raw.split_by_kind(policy)? {
            ans.register(kind, set);
        }
        Ok(ans)
    }

    /// 注册 (或替换) 关系类型 `kind` 下的全部边.
    ///
    /// 原先属于 `kind` 的边会被整体移除, 然后按 `(第一对象类型, 第二对象类型)`
    /// 重新分组 `set` 中的边. 以同样的数据重复注册不会改变查询结果.
    pub fn register(&mut self, kind: RelationKind, set: RelationSet) {
        self.relations.retain(|k, _| k.kind != kind);
        let edge_count = set.len();
        let RelationSet {
            attr_columns,
            records,
        } = set;
        for RelationRecord {
            first_type,
            second_type,
            edge,
        } in records
        {
            let key = RelationKey {
                kind: kind.clone(),
                first_type,
                second_type,
            };
            self.relations
                .entry(key)
                .or_insert_with(|| EdgeTable::new(attr_columns.clone()))
                .push(edge);
        }
        info!("registered `{kind}` relationship with {edge_count} edges");
        self.kinds.insert(kind);
    }

    /// 关系类型 `kind` 是否已注册?
    #[inline]
    pub fn contains(&self, kind: &RelationKind) -> bool {
        self.kinds.contains(kind)
    }

    /// 是否存在 `(kind, first_type, second_type)` 的边?
    pub fn has_pair(&self, kind: &RelationKind, first_type: &str, second_type: &str) -> bool {
        self.relations.contains_key(&RelationKey {
            kind: kind.clone(),
            first_type: first_type.to_string(),
            second_type: second_type.to_string(),
        })
    }

    /// 所有已注册的关系类型, 按 [`RelationKind`] 的顺序排列.
    #[inline]
    pub fn kinds(&self) -> impl Iterator<Item = &RelationKind> {
        self.kinds.iter()
    }

    /// 获取 `(kind, first_type, second_type)` 的边表.
    ///
    /// 该组合从未注册时返回 `Err(RelError::Configuration)`.
    pub fn edges(
        &self,
        kind: &RelationKind,
        first_type: &str,
        second_type: &str,
    ) -> RelResult<&EdgeTable> {
        let key = RelationKey {
            kind: kind.clone(),
            first_type: first_type.to_string(),
            second_type: second_type.to_string(),
        };
        self.relations.get(&key).ok_or_else(|| {
            RelError::Configuration(format!(
                "no `{kind}` relationship registered from {first_type} to {second_type}"
            ))
        })
    }

    /// 关系类型 `kind` 下的所有 `(第一对象类型, 第二对象类型, 边表)`.
    pub fn view(&self, kind: RelationKind) -> impl Iterator<Item = (&str, &str, &EdgeTable)> + '_ {
        self.relations
            .iter()
            .filter(move |(k, _)| k.kind == kind)
            .map(|(k, t)| (k.first_type.as_str(), k.second_type.as_str(), t))
    }

    /// 所有 parent 关系.
    #[inline]
    pub fn parent(&self) -> impl Iterator<Item = (&str, &str, &EdgeTable)> + '_ {
        self.view(RelationKind::Parent)
    }

    /// 所有 child 关系.
    #[inline]
    pub fn child(&self) -> impl Iterator<Item = (&str, &str, &EdgeTable)> + '_ {
        self.view(RelationKind::Child)
    }

    /// 所有 neighbor 关系.
    #[inline]
    pub fn neighbor(&self) -> impl Iterator<Item = (&str, &str, &EdgeTable)> + '_ {
        self.view(RelationKind::Neighbor)
    }
}

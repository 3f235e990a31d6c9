//! 原始关系表.
//!
//! CellProfiler 导出的 `Object relationships` 表, 每行一条边. 表头可能带有多余的空白,
//! 读入时统一去掉.

use log::warn;

use super::{RelationEdge, RelationKind, RelationRecord, RelationSet};
use crate::consts::columns::{
    FIRST_IMG_NUMBER, FIRST_OBJ_NAME, FIRST_OBJ_NUMBER, RELATIONSHIP, SECOND_IMG_NUMBER,
    SECOND_OBJ_NAME, SECOND_OBJ_NUMBER,
};
use crate::{RelError, RelResult, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 遇到无法识别的关系类型时的处理方式.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KindPolicy {
    /// 报告 `RelError::Configuration`.
    #[default]
    Strict,

    /// 记录一条警告, 并以 [`RelationKind::Named`] 保留原名.
    Permissive,
}

/// 去掉列名中的所有空白字符.
#[inline]
pub fn normalize_column(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 原始关系表.
#[derive(Clone, Debug, Default)]
pub struct RawRelationTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// 关系表中必需的列在表头中的位置.
struct IdentityColumns {
    relationship: usize,
    first_type: usize,
    second_type: usize,
    first_obj: usize,
    second_obj: usize,
    first_img: usize,
    second_img: usize,
}

impl RawRelationTable {
    /// 以表头创建空表. 列名会被规范化.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| normalize_column(c.as_ref()))
                .collect(),
            rows: vec![],
        }
    }

    /// 追加一行. 长度与表头不一致时返回 `Err(RelError::DataIntegrity)`.
    pub fn push_row(&mut self, row: Vec<Value>) -> RelResult<()> {
        if row.len() != self.columns.len() {
            return Err(RelError::DataIntegrity(format!(
                "relationship row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// 规范化之后的表头.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn locate(&self, name: &str) -> RelResult<usize> {
        self.columns.iter().position(|c| c == name).ok_or_else(|| {
            RelError::Configuration(format!("relationship table lacks column `{name}`"))
        })
    }

    fn identity_columns(&self) -> RelResult<IdentityColumns> {
        Ok(IdentityColumns {
            relationship: self.locate(RELATIONSHIP)?,
            first_type: self.locate(FIRST_OBJ_NAME)?,
            second_type: self.locate(SECOND_OBJ_NAME)?,
            first_obj: self.locate(FIRST_OBJ_NUMBER)?,
            second_obj: self.locate(SECOND_OBJ_NUMBER)?,
            first_img: self.locate(FIRST_IMG_NUMBER)?,
            second_img: self.locate(SECOND_IMG_NUMBER)?,
        })
    }

    /// 按关系类型拆分所有行. 类型按首次出现的顺序排列, 每个类型内部保持行序.
    ///
    /// 除了七个标识列以外, 其余列 (包括 `Module` 等) 都作为关系属性保留.
    ///
    /// # 返回值
    ///
    /// - 当缺少标识列时, 返回 `Err(RelError::Configuration)`;
    /// - 严格模式下遇到未知关系类型时, 返回 `Err(RelError::Configuration)`;
    /// - 当编号不是非负整数, 或对象类型名不是文本时, 返回 `Err(RelError::DataIntegrity)`.
    pub fn split_by_kind(&self, policy: KindPolicy) -> RelResult<Vec<(RelationKind, RelationSet)>> {
        let ids = self.identity_columns()?;
        let identity = [
            ids.relationship,
            ids.first_type,
            ids.second_type,
            ids.first_obj,
            ids.second_obj,
            ids.first_img,
            ids.second_img,
        ];
        let attr_indices: Vec<usize> = (0..self.columns.len())
            .filter(|i| !identity.contains(i))
            .collect();
        let attr_columns: Vec<&str> = attr_indices
            .iter()
            .map(|&i| self.columns[i].as_str())
            .collect();

        let mut ans: Vec<(RelationKind, RelationSet)> = vec![];
        for (line, row) in self.rows.iter().enumerate() {
            let kind = self.row_kind(row, ids.relationship, policy, line)?;
            let record = RelationRecord {
                first_type: text_cell(row, ids.first_type, line)?,
                second_type: text_cell(row, ids.second_type, line)?,
                edge: RelationEdge {
                    first_object_number: number_cell(row, ids.first_obj, line)?,
                    first_image_number: number_cell(row, ids.first_img, line)?,
                    second_object_number: number_cell(row, ids.second_obj, line)?,
                    second_image_number: number_cell(row, ids.second_img, line)?,
                    attrs: attr_indices.iter().map(|&i| row[i].clone()).collect(),
                },
            };
            let pos = match ans.iter().position(|(k, _)| k == &kind) {
                Some(p) => p,
                None => {
                    ans.push((kind, RelationSet::new(attr_columns.iter().copied())));
                    ans.len() - 1
                }
            };
            ans[pos].1.push(record)?;
        }
        Ok(ans)
    }

    fn row_kind(
        &self,
        row: &[Value],
        index: usize,
        policy: KindPolicy,
        line: usize,
    ) -> RelResult<RelationKind> {
        let name = text_cell(row, index, line)?;
        match (RelationKind::parse(&name), policy) {
            (Some(kind), _) => Ok(kind),
            (None, KindPolicy::Strict) => Err(RelError::Configuration(format!(
                "unknown relationship `{name}` in row {line}"
            ))),
            (None, KindPolicy::Permissive) => {
                warn!("unknown relationship `{name}` in row {line}, kept as named relationship");
                Ok(RelationKind::Named(name))
            }
        }
    }
}

fn text_cell(row: &[Value], index: usize, line: usize) -> RelResult<String> {
    row[index]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            RelError::DataIntegrity(format!("row {line}: expected text, got {:?}", row[index]))
        })
}

fn number_cell(row: &[Value], index: usize, line: usize) -> RelResult<u32> {
    row[index].as_u32().ok_or_else(|| {
        RelError::DataIntegrity(format!(
            "row {line}: expected an object or image number, got {:?}",
            row[index]
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{normalize_column, KindPolicy, RawRelationTable};
    use crate::relation::RelationKind;
    use crate::{ObjectRelations, RelError, Value};

    const HEADER: [&str; 8] = [
        "Module",
        " Relationship",
        "First Object Name",
        "Second Object Name",
        "First Object Number",
        "Second Object Number",
        "First Image Number",
        "Second Image Number",
    ];

    fn row(kind: &str, first: &str, second: &str, a: u32, b: u32) -> Vec<Value> {
        vec![
            "MeasureObjectNeighbors".into(),
            kind.into(),
            first.into(),
            second.into(),
            a.into(),
            b.into(),
            1.into(),
            // 导出表常把整数写成浮点数
            Value::Float(1.0),
        ]
    }

    #[test]
    fn test_normalize_column() {
        assert_eq!(normalize_column(" First Object Name "), "FirstObjectName");
        let t = RawRelationTable::new(HEADER);
        assert_eq!(t.columns()[1], "Relationship");
    }

    #[test]
    fn test_split_by_kind() {
        let mut t = RawRelationTable::new(HEADER);
        t.push_row(row("Neighbors", "cell", "cell", 1, 2)).unwrap();
        t.push_row(row("Parent", "cell", "nuclei", 1, 1)).unwrap();
        t.push_row(row("Neighbors", "cell", "cell", 2, 1)).unwrap();

        let split = t.split_by_kind(KindPolicy::Strict).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].0, RelationKind::Neighbor);
        assert_eq!(split[0].1.len(), 2);
        assert_eq!(split[0].1.attr_columns(), ["Module"]);
        assert_eq!(split[1].0, RelationKind::Parent);

        let rel = ObjectRelations::from_table(&t, KindPolicy::Strict).unwrap();
        assert!(rel.contains(&RelationKind::Parent));
        assert!(!rel.contains(&RelationKind::Child));
        assert_eq!(
            rel.edges(&RelationKind::Neighbor, "cell", "cell").unwrap().len(),
            2
        );
    }

    #[test]
    fn test_unknown_kind() {
        let mut t = RawRelationTable::new(HEADER);
        t.push_row(row("Sibling", "cell", "cell", 1, 2)).unwrap();
        assert!(matches!(
            ObjectRelations::from_table(&t, KindPolicy::Strict),
            Err(RelError::Configuration(_))
        ));

        let rel = ObjectRelations::from_table(&t, KindPolicy::Permissive).unwrap();
        assert!(rel.contains(&RelationKind::Named("Sibling".to_string())));
    }

    #[test]
    fn test_bad_rows() {
        let mut t = RawRelationTable::new(HEADER);
        assert!(matches!(
            t.push_row(vec![Value::Missing]),
            Err(RelError::DataIntegrity(_))
        ));

        let mut r = row("Neighbors", "cell", "cell", 1, 2);
        r[4] = Value::Float(1.5);
        t.push_row(r).unwrap();
        assert!(matches!(
            t.split_by_kind(KindPolicy::Strict),
            Err(RelError::DataIntegrity(_))
        ));

        let t = RawRelationTable::new(&HEADER[..7]);
        assert!(matches!(
            t.split_by_kind(KindPolicy::Strict),
            Err(RelError::Configuration(_))
        ));
    }
}

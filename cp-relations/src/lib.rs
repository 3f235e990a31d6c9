#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将 CellProfiler 导出的 IMC 单细胞测量数据整理为带类型的对象表,
//! 解析对象之间的关系 (parent / child / neighbor), 并在分割掩膜上评估分割质量.
//!
//! 该 crate 不负责 CSV 解析, 也不负责绘图. 调用方 (分析脚本) 负责把导出表格读成
//! [`ObjectTable`] 和 [`RawRelationTable`], 之后的工作都在这里完成.
//!
//! # 注意
//!
//! 1. 对象由 `(图像, 对象类型, 对象编号)` 唯一确定, 见 [`ObjectId`].
//! 2. 所有错误都同步返回给调用方, 内部不做重试. 见 [`RelError`].
//!
//! # 功能
//!
//! ### 对象测量表 ✅
//!
//! 带列名的单对象测量表, 以 `(图像编号, 对象编号)` 建立索引.
//!
//! 实现位于 `cp-relations/src/object`.
//!
//! ### 关系存储 ✅
//!
//! 将扁平的关系表按 `(关系类型, 第一对象类型, 第二对象类型)` 分组存储,
//! 组内保持原始行序. 允许在构造之后注册合成关系.
//!
//! 实现位于 `cp-relations/src/relation/mod.rs`.
//!
//! ### 关系遍历 ✅
//!
//! 沿某种关系把目标对象的测量值连接到源对象上. 支持内连接和左连接,
//! 以及按源对象聚合 (最小值 / 最大值 / 平均值).
//!
//! 实现位于 `cp-relations/src/relation/join.rs`.
//!
//! ### 空间共定位检测 ✅
//!
//! 在每张图像上寻找距离足够近的 center 对象对, 求二者像素的凸包,
//! 判断凸包内是否包含 border 对象的像素.
//!
//! 实现位于 `cp-relations/src/segeval/colocate.rs`.
//!
//! ### 分割质量判定 ✅
//!
//! 欠分割 / 过分割判定, 以及 percent touching 的传播.
//!
//! 实现位于 `cp-relations/src/segeval`.
//!
//! ### 掩膜工具 ✅
//!
//! 掩膜懒加载接口 (带缓存), 掩膜邻接图, 以及把对象数值映射回掩膜.
//!
//! 实现位于 `cp-relations/src/mask`.

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 高精度二维坐标 `(h, w)`.
pub type Idx2dF = (f64, f64);

type Area2d = Vec<Idx2d>;

pub mod consts;
pub mod dataset;
pub mod error;
pub mod mask;
pub mod object;
pub mod prelude;
pub mod relation;
pub mod segeval;

pub use error::{RelError, RelResult};

pub use object::{image_id, ObjectId, ObjectRecord, ObjectTable, Value};

pub use relation::{
    Agg, EdgeTable, JoinHow, JoinedRow, JoinedTable, KindPolicy, ObjectRelations,
    RawRelationTable, RelationEdge, RelationKey, RelationKind, RelationQuery, RelationRecord,
    RelationSet,
};

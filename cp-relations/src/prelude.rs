//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx2dF};

pub use crate::error::{RelError, RelResult};
pub use crate::object::{image_id, uniform_scaling, ObjectId, ObjectTable, Value};
pub use crate::relation::{
    center_relation_kind, Agg, JoinHow, JoinedTable, KindPolicy, ObjectRelations,
    RawRelationTable, RelationKind, RelationQuery, RelationSet,
};

pub use crate::mask::{CachedSource, FileSource, LabelMask, MaskSource, MemorySource};
pub use crate::segeval::{LabelClass, SegEvalConfig, SegmentationData};

pub use crate::dataset::{home_dataset_dir_with, run_dir_from_env_or_home};

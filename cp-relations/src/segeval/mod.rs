//! 分割质量评估.
//!
//! 训练标签图中每个区域被标注为 center / border / background. 两个距离很近的 center
//! 之间若夹有 border, 说明它们可能本属同一对象. 结合掩膜上测得的强度特征,
//! 判定标签对象是否欠分割或过分割.

mod classify;
mod colocate;
mod config;
mod hull;
mod label;
mod regions;
mod session;

pub use classify::{
    classify_oversegmentation, classify_undersegmentation, OverSegmentation, UnderSegmentation,
};
pub use colocate::{find_center_pairs, CenterHit};
pub use config::SegEvalConfig;
pub use hull::Hull;
pub use label::{assign_label_classes, LabelClass};
pub use regions::{regions, Region};
pub use session::{ImageMeta, SegmentationData};

//! 运行时错误.

use crate::relation::RelationKind;

/// 关系解析、遍历以及掩膜读取的运行时错误.
#[derive(Debug, thiserror::Error)]
pub enum RelError {
    /// 配置错误: 严格模式下遇到未知的关系类型, 查询了从未注册的
    /// `(关系类型, 对象类型, 对象类型)` 组合, 或者请求了不存在的列.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 邻居关系只定义在同一种对象类型内部, 但查询给出了两种不同的类型.
    #[error("`{kind}` needs matching object types, got `{source_type}` and `{target_type}`")]
    InvalidRelationship {
        /// 查询的关系类型.
        kind: RelationKind,
        /// 源对象类型.
        source_type: String,
        /// 目标对象类型.
        target_type: String,
    },

    /// 输入数据不一致, 例如各图像的缩放系数不相同, 或关系表中的编号不是合法整数.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// 掩膜或图像不可用.
    #[error("mask not available: {0}")]
    Mask(String),

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 读取 npy 文件错误.
    #[error(transparent)]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// 解码图像文件错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// 关系解析 / 分割评估的运行结果.
pub type RelResult<T> = Result<T, RelError>;

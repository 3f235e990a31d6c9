//! 通用常量.

/// 列名. 关系表的列名在载入时会去掉所有空白字符, 这里保存的是去空白之后的形式.
pub mod columns {
    /// 关系类型.
    pub const RELATIONSHIP: &str = "Relationship";

    /// 第一对象的对象类型名.
    pub const FIRST_OBJ_NAME: &str = "FirstObjectName";

    /// 第二对象的对象类型名.
    pub const SECOND_OBJ_NAME: &str = "SecondObjectName";

    /// 第一对象编号.
    pub const FIRST_OBJ_NUMBER: &str = "FirstObjectNumber";

    /// 第二对象编号.
    pub const SECOND_OBJ_NUMBER: &str = "SecondObjectNumber";

    /// 第一对象所在图像编号.
    pub const FIRST_IMG_NUMBER: &str = "FirstImageNumber";

    /// 第二对象所在图像编号.
    pub const SECOND_IMG_NUMBER: &str = "SecondImageNumber";
}

/// 分割质量评估使用的列名.
pub mod seg {
    /// 共定位关系中, 凸包三角剖分的顶点.
    pub const POINTS: &str = "points";

    /// 共定位关系中, 凸包是否包含 border 像素.
    pub const CONTAINS_BORDER: &str = "contains_border";

    /// 标签类别 (center / border / background).
    pub const LABEL: &str = "label";

    /// 共定位关系名前缀. 完整名称形如 `nbcenter_dist25`.
    pub const CENTER_REL_PREFIX: &str = "nbcenter_dist";
}

/// 掩膜中背景的像素值.
pub const BACKGROUND_LABEL: u32 = 0;

/// 共定位检测的默认距离阈值 (单位: 像素).
pub const DEFAULT_CENTER_DISTANCE: f64 = 25.0;

/// 求凸包时合并像素点的最少个数. 少于该值的 center 对直接跳过.
pub const MIN_HULL_POINTS: usize = 4;

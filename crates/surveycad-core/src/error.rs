//! 核心错误定义

use thiserror::Error;

/// 几何构造失败：无法构成任何规范实体
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f64),

    #[error("polyline has no vertices")]
    EmptyPolyline,

    #[error("text height must not be negative, got {0}")]
    NegativeTextHeight(f64),
}

/// 坐标系解析或转换失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrsError {
    #[error("unknown SRID {0}")]
    UnknownSrid(u32),

    #[error("cannot transform between {from} and {to}")]
    IncompatiblePair { from: String, to: String },

    #[error("transform produced invalid coordinates for ({x}, {y})")]
    TransformFailed { x: f64, y: f64 },

    #[error("invalid coordinate system: {0}")]
    Parse(String),
}

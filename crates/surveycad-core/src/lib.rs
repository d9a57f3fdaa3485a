//! SurveyCAD 核心几何模型
//!
//! 提供 DXF 往返所需的规范几何实体、坐标系解析和 WKT 表示。
//!
//! # 架构设计
//!
//! - `CanonicalEntity`: 不可变的规范实体（几何 + 图层 + 来源坐标系 + 未映射属性）
//! - `Geometry`: 几何数据（线段、圆弧、圆、多段线、文本）
//! - `CoordinateSystemResolver`: 坐标系解析与转换器缓存
//!
//! # 示例
//!
//! ```rust
//! use surveycad_core::prelude::*;
//!
//! let line = Line::new(Point3::new(0.0, 0.0, 10.0), Point3::new(100.0, 0.0, 10.0));
//! let entity = CanonicalEntity::new(Geometry::Line(line), "0", CoordinateSystem::Local).unwrap();
//! assert_eq!(entity.kind(), EntityKind::Line);
//! ```

pub mod crs;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod math;
pub mod projection;
pub mod resolver;
pub mod wkt;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::crs::CoordinateSystem;
    pub use crate::entity::{Attributes, CanonicalEntity};
    pub use crate::error::{CrsError, GeometryError};
    pub use crate::geometry::{Arc, Circle, EntityKind, Geometry, Line, Polyline, PolylineVertex, Text};
    pub use crate::layer::{LayerDefinition, Rgb};
    pub use crate::math::{Point3, Vector3};
    pub use crate::resolver::{CoordinateSystemResolver, Transformer};
    pub use crate::wkt::to_wkt;
}

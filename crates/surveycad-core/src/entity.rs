//! 规范实体
//!
//! 规范实体在提取后即不可变：字段只读，坐标变换返回新实体。

use crate::crs::CoordinateSystem;
use crate::error::GeometryError;
use crate::geometry::{EntityKind, Geometry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 未映射的 DXF 组码，按组码字符串索引，往返时原样写回
pub type Attributes = BTreeMap<String, String>;

/// 规范实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    geometry: Geometry,
    layer_name: String,
    source_coordinate_system: CoordinateSystem,
    #[serde(default)]
    attributes: Attributes,
}

impl CanonicalEntity {
    /// 创建实体，几何无法构成任何规范图元时返回错误
    pub fn new(
        geometry: Geometry,
        layer_name: impl Into<String>,
        source_coordinate_system: CoordinateSystem,
    ) -> Result<Self, GeometryError> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            layer_name: layer_name.into(),
            source_coordinate_system,
            attributes: Attributes::new(),
        })
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn kind(&self) -> EntityKind {
        self.geometry.kind()
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn source_coordinate_system(&self) -> CoordinateSystem {
        self.source_coordinate_system
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// 用新几何生成一个独立实体，其余字段保持不变
    pub fn with_geometry(&self, geometry: Geometry) -> Result<Self, GeometryError> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            ..self.clone()
        })
    }
}

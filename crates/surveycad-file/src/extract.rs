//! DXF 实体提取
//!
//! 把已解析的 DXF 文档转换为规范实体。导入器和往返校验器共用这一逻辑。
//! 错误逐个收集而不是在循环中途抛出，单个坏实体不会掩盖其余实体的统计。

use crate::attributes;
use crate::error::FileError;
use dxf::entities::{Entity, EntityType};
use dxf::Drawing;
use std::collections::BTreeMap;
use std::path::Path;
use surveycad_core::crs::CoordinateSystem;
use surveycad_core::entity::CanonicalEntity;
use surveycad_core::geometry::{Arc, Circle, Geometry, Line, Polyline, PolylineVertex, Text};
use surveycad_core::layer::{LayerDefinition, DEFAULT_COLOR_INDEX};
use surveycad_core::math::Point3;

/// 提取结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entities: Vec<CanonicalEntity>,
    /// 跳过的不支持实体数量
    pub skipped: usize,
    /// 按类型统计的跳过数量
    pub skipped_by_type: BTreeMap<&'static str, usize>,
    /// 无法构成任何规范图元的实体
    pub malformed: Vec<String>,
    /// 非致命问题
    pub notes: Vec<String>,
    /// LAYER 表中的图层定义
    pub layers: Vec<LayerDefinition>,
}

impl Extraction {
    /// 没有畸形几何
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
    }
}

enum Converted {
    Entity(CanonicalEntity),
    Unsupported(&'static str),
    Malformed(String),
}

/// 加载 DXF 文件（ASCII 或二进制）
pub fn load_drawing(path: &Path) -> Result<Drawing, FileError> {
    Drawing::load_file(path).map_err(|e| FileError::Dxf(format!("{}: {e}", path.display())))
}

/// 从文档中提取所有受支持的实体
pub fn extract_drawing(drawing: &Drawing, source: CoordinateSystem) -> Extraction {
    let mut extraction = Extraction {
        layers: drawing
            .layers()
            .map(|layer| LayerDefinition {
                name: layer.name.clone(),
                color_index: layer.color.index().unwrap_or(DEFAULT_COLOR_INDEX),
                true_color: None,
                linetype: layer.line_type_name.clone(),
                lineweight: Some(layer.line_weight.raw_value()),
            })
            .collect(),
        ..Default::default()
    };

    for (index, entity) in drawing.entities().enumerate() {
        match convert_entity(entity, source, &mut extraction.notes) {
            Converted::Entity(e) => extraction.entities.push(e),
            Converted::Unsupported(name) => {
                tracing::debug!(index, entity_type = name, "Skipping unsupported entity");
                extraction.skipped += 1;
                *extraction.skipped_by_type.entry(name).or_insert(0) += 1;
            }
            Converted::Malformed(reason) => {
                tracing::warn!(index, %reason, "Malformed entity");
                extraction.malformed.push(format!("entity #{index}: {reason}"));
            }
        }
    }

    tracing::debug!(
        extracted = extraction.entities.len(),
        skipped = extraction.skipped,
        malformed = extraction.malformed.len(),
        "Extracted DXF entities"
    );

    extraction
}

fn point(p: &dxf::Point) -> Point3<f64> {
    Point3::new(p.x, p.y, p.z)
}

/// 将DXF实体转换为规范实体
fn convert_entity(entity: &Entity, source: CoordinateSystem, notes: &mut Vec<String>) -> Converted {
    let (type_name, geometry) = match &entity.specific {
        EntityType::Line(line) => (
            "LINE",
            Geometry::Line(Line::new(point(&line.p1), point(&line.p2))),
        ),

        EntityType::Circle(circle) => (
            "CIRCLE",
            Geometry::Circle(Circle::new(point(&circle.center), circle.radius)),
        ),

        EntityType::Arc(arc) => (
            "ARC",
            Geometry::Arc(Arc::new(
                point(&arc.center),
                arc.radius,
                arc.start_angle,
                arc.end_angle,
            )),
        ),

        EntityType::LwPolyline(lwpoly) => {
            // LWPOLYLINE 的 Z 由实体标高（组码 38）给出
            let z = entity.common.elevation;
            let vertices: Vec<PolylineVertex> = lwpoly
                .vertices
                .iter()
                .map(|v| PolylineVertex::with_bulge(Point3::new(v.x, v.y, z), v.bulge))
                .collect();
            (
                "LWPOLYLINE",
                Geometry::Polyline(Polyline::new(vertices, lwpoly.is_closed())),
            )
        }

        EntityType::Polyline(poly) => {
            if poly.is_polyface_mesh() || poly.is_3d_polygon_mesh() {
                return Converted::Unsupported("POLYLINE_MESH");
            }
            // 三维多段线取顶点 Z；二维多段线取多段线标高
            let is_3d = poly.is_3d_polyline();
            let elevation = poly.location.z;
            let vertices: Vec<PolylineVertex> = poly
                .vertices()
                .map(|v| {
                    let z = if is_3d { v.location.z } else { elevation };
                    PolylineVertex::with_bulge(Point3::new(v.location.x, v.location.y, z), v.bulge)
                })
                .collect();
            (
                "POLYLINE",
                Geometry::Polyline(Polyline::new(vertices, poly.is_closed())),
            )
        }

        EntityType::Text(text) => (
            "TEXT",
            Geometry::Text(
                Text::new(point(&text.location), text.value.clone(), text.text_height)
                    .with_rotation(text.rotation),
            ),
        ),

        other => return Converted::Unsupported(unsupported_name(other)),
    };

    match CanonicalEntity::new(geometry, entity.common.layer.clone(), source) {
        Ok(canonical) => Converted::Entity(canonical.with_attributes(attributes::capture(entity, notes))),
        Err(e) => Converted::Malformed(format!(
            "{type_name} on layer '{}': {e}",
            entity.common.layer
        )),
    }
}

fn unsupported_name(specific: &EntityType) -> &'static str {
    match specific {
        EntityType::MText(_) => "MTEXT",
        EntityType::Insert(_) => "INSERT",
        EntityType::Ellipse(_) => "ELLIPSE",
        EntityType::Spline(_) => "SPLINE",
        EntityType::ModelPoint(_) => "POINT",
        EntityType::Solid(_) => "SOLID",
        _ => "OTHER",
    }
}

//! DXF 导出
//!
//! 从存储读取项目的有效实体，按图层标准生成图层表，输出 AutoCAD 2004 格式的 DXF。
//! 几何原样写出，导出器只决定图层名、颜色、线宽和线型等表现信息。

use crate::attributes;
use crate::error::{ExportError, FileError};
use crate::standards::{LayerStandard, StandardsLookup};
use crate::store::GeometryStore;
use dxf::entities::{Entity, EntityType};
use dxf::enums::AcadVersion;
use dxf::{Color, Drawing};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use surveycad_core::crs::CoordinateSystem;
use surveycad_core::entity::CanonicalEntity;
use surveycad_core::geometry::{Geometry, Polyline};
use surveycad_core::layer::{LayerDefinition, Rgb, DEFAULT_COLOR_INDEX, DEFAULT_LINETYPE};
use surveycad_core::resolver::CoordinateSystemResolver;

/// 导出统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportStatistics {
    pub entities_exported: usize,
    pub layers_written: usize,
    pub warnings: Vec<String>,
}

/// 导出选项
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// 存储坐标所在的项目坐标系
    pub project_crs: CoordinateSystem,
    /// 显式指定的输出坐标系，None 表示不变换
    pub target_crs: Option<CoordinateSystem>,
}

/// 图层的输出样式
#[derive(Debug, Clone, PartialEq)]
struct LayerStyle {
    name: String,
    color_index: u8,
    true_color: Option<u32>,
    linetype: String,
    lineweight: Option<i16>,
}

/// DXF 导出器
pub struct Exporter<'a> {
    standards: &'a dyn StandardsLookup,
    resolver: &'a CoordinateSystemResolver,
    options: ExportOptions,
}

impl<'a> Exporter<'a> {
    pub fn new(
        standards: &'a dyn StandardsLookup,
        resolver: &'a CoordinateSystemResolver,
        options: ExportOptions,
    ) -> Self {
        Self {
            standards,
            resolver,
            options,
        }
    }

    /// 导出到文件
    pub fn export_file(
        &self,
        store: &dyn GeometryStore,
        project_id: &str,
        path: &Path,
    ) -> Result<ExportStatistics, ExportError> {
        let (drawing, statistics) = self.export(store, project_id)?;
        drawing
            .save_file(path)
            .map_err(|e| FileError::Dxf(format!("{}: {e}", path.display())))?;
        tracing::info!(
            "Exported {} entities on {} layers to {}",
            statistics.entities_exported,
            statistics.layers_written,
            path.display()
        );
        Ok(statistics)
    }

    /// 生成 DXF 文档
    pub fn export(
        &self,
        store: &dyn GeometryStore,
        project_id: &str,
    ) -> Result<(Drawing, ExportStatistics), ExportError> {
        let entities = self.reproject(store.read_entities(project_id)?)?;
        let stored_layers = store.read_layers(project_id)?;

        let mut drawing = Drawing::new();
        drawing.header.version = AcadVersion::R2004;
        let mut statistics = ExportStatistics::default();

        // 旧图层名 -> 输出样式
        let mut styles: HashMap<String, LayerStyle> = HashMap::new();
        let mut written = BTreeSet::new();
        let mut linetypes = BTreeSet::new();

        let referenced = entities.iter().map(|e| e.layer_name().to_string());
        let legacy_names: BTreeSet<String> = stored_layers
            .iter()
            .map(|l| l.name.clone())
            .chain(referenced)
            .collect();

        for legacy in legacy_names {
            let stored = stored_layers
                .iter()
                .find(|l| l.name == legacy)
                .cloned()
                .unwrap_or_else(|| LayerDefinition::new(legacy.clone()));
            let style = self.layer_style(&stored, &mut statistics.warnings);

            if written.insert(style.name.clone()) {
                linetypes.insert(style.linetype.clone());
                drawing.add_layer(dxf_layer(&style));
            } else {
                tracing::debug!(legacy = %legacy, layer = %style.name, "Layer merged into existing output layer");
            }
            styles.insert(legacy, style);
        }

        for entity in &entities {
            if let Some(name) = entity.attributes().get(attributes::codes::LINETYPE) {
                linetypes.insert(name.clone());
            }
        }
        add_line_types(&mut drawing, &linetypes);

        for entity in &entities {
            let style = styles.get(entity.layer_name());
            let dxf_entity = convert_entity(entity, style, &mut drawing, &mut statistics.warnings);
            drawing.add_entity(dxf_entity);
            statistics.entities_exported += 1;
        }
        statistics.layers_written = written.len();

        tracing::info!(
            project = %project_id,
            entities = statistics.entities_exported,
            layers = statistics.layers_written,
            warnings = statistics.warnings.len(),
            "Built DXF drawing"
        );

        Ok((drawing, statistics))
    }

    /// 按需变换到输出坐标系
    fn reproject(&self, entities: Vec<CanonicalEntity>) -> Result<Vec<CanonicalEntity>, ExportError> {
        let Some(target) = self.options.target_crs else {
            return Ok(entities);
        };
        let transformer = self.resolver.resolve(self.options.project_crs, target)?;
        if transformer.is_identity() {
            return Ok(entities);
        }

        tracing::info!(
            from = %self.options.project_crs,
            to = %target,
            entities = entities.len(),
            "Reprojecting entities for export"
        );

        entities
            .iter()
            .enumerate()
            .map(|(index, entity)| {
                let geometry = entity
                    .geometry()
                    .try_map_points(|p| transformer.transform(p))
                    .map_err(|source| ExportError::Transform { index, source })?;
                let attributes = attributes::try_map_points(entity.attributes(), |p| {
                    transformer.transform(p)
                })
                .map_err(|source| ExportError::Transform { index, source })?;
                Ok(entity.with_geometry(geometry)?.with_attributes(attributes))
            })
            .collect()
    }

    fn layer_style(&self, stored: &LayerDefinition, warnings: &mut Vec<String>) -> LayerStyle {
        let standard = self.standards.layer_standard(&stored.name);

        let (color_index, true_color) = match standard.map(LayerStandard::rgb) {
            Some(Ok(Some(rgb))) => map_rgb(rgb),
            Some(Err(e)) => {
                warnings.push(format!(
                    "layer '{}': {e}, using stored color {}",
                    stored.name, stored.color_index
                ));
                stored_color(stored)
            }
            Some(Ok(None)) | None => stored_color(stored),
        };

        let linetype = standard
            .and_then(|s| s.linetype.clone())
            .filter(|l| !l.trim().is_empty())
            .or_else(|| Some(stored.linetype.clone()).filter(|l| !l.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_LINETYPE.to_string());

        LayerStyle {
            name: standard.map_or_else(|| stored.name.clone(), LayerStandard::layer_name),
            color_index,
            true_color,
            linetype,
            lineweight: standard.and_then(LayerStandard::lineweight_enum),
        }
    }
}

/// 与基本调色板完全一致时只写索引，否则写最近索引和真彩色
fn map_rgb(rgb: Rgb) -> (u8, Option<u32>) {
    match rgb.exact_aci() {
        Some(index) => (index, None),
        None => (rgb.nearest_aci(), Some(rgb.to_true_color())),
    }
}

fn stored_color(stored: &LayerDefinition) -> (u8, Option<u32>) {
    let index = match stored.color_index {
        1..=255 => stored.color_index,
        _ => DEFAULT_COLOR_INDEX,
    };
    (index, stored.true_color)
}

fn dxf_layer(style: &LayerStyle) -> dxf::tables::Layer {
    let mut layer = dxf::tables::Layer::default();
    layer.name = style.name.clone();
    layer.color = Color::from_index(style.color_index);
    layer.line_type_name = style.linetype.clone();
    layer
}

fn add_line_types(drawing: &mut Drawing, names: &BTreeSet<String>) {
    let existing: BTreeSet<String> = drawing
        .line_types()
        .map(|lt| lt.name.to_uppercase())
        .collect();
    for name in names {
        if existing.contains(&name.to_uppercase()) {
            continue;
        }
        let mut line_type = dxf::tables::LineType::default();
        line_type.name = name.clone();
        drawing.add_line_type(line_type);
    }
}

fn point(p: &surveycad_core::math::Point3<f64>) -> dxf::Point {
    dxf::Point::new(p.x, p.y, p.z)
}

/// 将规范实体转换为DXF实体
fn convert_entity(
    entity: &CanonicalEntity,
    style: Option<&LayerStyle>,
    drawing: &mut Drawing,
    warnings: &mut Vec<String>,
) -> Entity {
    let mut elevation = None;
    let specific = match entity.geometry() {
        Geometry::Line(line) => {
            EntityType::Line(dxf::entities::Line::new(point(&line.start), point(&line.end)))
        }

        Geometry::Circle(circle) => {
            EntityType::Circle(dxf::entities::Circle::new(point(&circle.center), circle.radius))
        }

        Geometry::Arc(arc) => EntityType::Arc(dxf::entities::Arc::new(
            point(&arc.center),
            arc.radius,
            arc.start_angle,
            arc.end_angle,
        )),

        Geometry::Polyline(polyline) => match polyline.uniform_elevation() {
            Some(z) => {
                elevation = Some(z);
                EntityType::LwPolyline(lw_polyline(polyline))
            }
            None => EntityType::Polyline(polyline_3d(polyline, drawing)),
        },

        Geometry::Text(text) => {
            let mut dxf_text = dxf::entities::Text::default();
            dxf_text.location = point(&text.position);
            dxf_text.text_height = text.height;
            dxf_text.value = text.content.clone();
            dxf_text.rotation = text.rotation;
            EntityType::Text(dxf_text)
        }
    };

    let mut dxf_entity = Entity::new(specific);
    if let Some(z) = elevation {
        dxf_entity.common.elevation = z;
    }
    match style {
        Some(style) => {
            dxf_entity.common.layer = style.name.clone();
            if let Some(true_color) = style.true_color {
                dxf_entity.common.color_24_bit = true_color as i32;
            }
            // LAYER 表线宽不能写任意值，按实体写出；实体自身的 370 属性随后覆盖
            if let Some(weight) = style.lineweight {
                dxf_entity.common.lineweight_enum_value = weight;
            }
        }
        None => dxf_entity.common.layer = entity.layer_name().to_string(),
    }

    let mut attribute_warnings = Vec::new();
    attributes::apply(entity.attributes(), &mut dxf_entity, &mut attribute_warnings);
    warnings.extend(
        attribute_warnings
            .into_iter()
            .map(|w| format!("{} on layer '{}': {w}", entity.kind(), entity.layer_name())),
    );

    dxf_entity
}

/// 所有顶点同高程：写为 LWPOLYLINE，Z 由调用方写入实体标高
fn lw_polyline(polyline: &Polyline) -> dxf::entities::LwPolyline {
    let mut lwpoly = dxf::entities::LwPolyline::default();
    lwpoly.set_is_closed(polyline.closed);
    lwpoly.vertices = polyline
        .vertices
        .iter()
        .map(|v| {
            let mut vertex = dxf::LwPolylineVertex::default();
            vertex.x = v.point.x;
            vertex.y = v.point.y;
            vertex.bulge = v.bulge;
            vertex
        })
        .collect();
    lwpoly
}

/// 顶点高程不一致：写为三维 POLYLINE，每个顶点保留自己的 Z
fn polyline_3d(polyline: &Polyline, drawing: &mut Drawing) -> dxf::entities::Polyline {
    let mut poly = dxf::entities::Polyline::default();
    poly.set_is_3d_polyline(true);
    poly.set_is_closed(polyline.closed);
    for v in &polyline.vertices {
        let mut vertex = dxf::entities::Vertex::default();
        vertex.location = point(&v.point);
        vertex.bulge = v.bulge;
        vertex.set_is_3d_polyline_vertex(true);
        poly.add_vertex(drawing, vertex);
    }
    poly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standards::{NoStandards, StandardsTable};
    use crate::store::MemoryStore;
    use surveycad_core::geometry::{Line, PolylineVertex, Text};
    use surveycad_core::math::Point3;

    fn store_with(entities: Vec<CanonicalEntity>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_entities("site", entities).unwrap();
        store
    }

    fn entity(geometry: Geometry, layer: &str) -> CanonicalEntity {
        CanonicalEntity::new(geometry, layer, CoordinateSystem::Local).unwrap()
    }

    #[test]
    fn test_export_without_standards_keeps_legacy_names() {
        let store = store_with(vec![entity(
            Geometry::Line(Line::new(Point3::new(0.0, 0.0, 10.0), Point3::new(100.0, 0.0, 10.0))),
            "TOPO",
        )]);
        let resolver = CoordinateSystemResolver::new();
        let exporter = Exporter::new(&NoStandards, &resolver, ExportOptions::default());

        let (drawing, stats) = exporter.export(&store, "site").unwrap();
        assert_eq!(stats.entities_exported, 1);
        assert_eq!(stats.layers_written, 1);
        assert!(stats.warnings.is_empty());
        assert_eq!(drawing.header.version, AcadVersion::R2004);

        let layer = drawing.layers().find(|l| l.name == "TOPO").unwrap();
        assert_eq!(layer.color.index(), Some(DEFAULT_COLOR_INDEX));
        let exported = drawing.entities().next().unwrap();
        assert_eq!(exported.common.layer, "TOPO");
    }

    #[test]
    fn test_standards_drive_layer_name_and_color() {
        let standards = StandardsTable::from_toml_str(
            r#"
[[layer]]
legacy_name = "TOPO"
discipline = "V"
category = "TOPO"
color = "0,0,255"
lineweight = 0.5
linetype = "DASHED"

[[layer]]
legacy_name = "EOP"
discipline = "C"
category = "ROAD"
color = "10,10,250"

[[layer]]
legacy_name = "BAD"
discipline = "V"
category = "MISC"
color = "not-a-color"
"#,
        )
        .unwrap();

        let line = |layer: &str| {
            entity(
                Geometry::Line(Line::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0))),
                layer,
            )
        };
        let store = store_with(vec![line("TOPO"), line("EOP"), line("BAD")]);
        let resolver = CoordinateSystemResolver::new();
        let exporter = Exporter::new(&standards, &resolver, ExportOptions::default());
        let (drawing, stats) = exporter.export(&store, "site").unwrap();

        let topo = drawing.layers().find(|l| l.name == "V-TOPO").unwrap();
        assert_eq!(topo.color.index(), Some(5));
        assert_eq!(topo.line_type_name, "DASHED");
        assert!(drawing.line_types().any(|lt| lt.name == "DASHED"));
        let topo_entity = drawing
            .entities()
            .find(|e| e.common.layer == "V-TOPO")
            .unwrap();
        assert_eq!(topo_entity.common.lineweight_enum_value, 50);

        let road = drawing.layers().find(|l| l.name == "C-ROAD").unwrap();
        assert_eq!(road.color.index(), Some(5));
        let road_entity = drawing
            .entities()
            .find(|e| e.common.layer == "C-ROAD")
            .unwrap();
        assert_eq!(road_entity.common.color_24_bit, 0x0A0AFA);

        let misc = drawing.layers().find(|l| l.name == "V-MISC").unwrap();
        assert_eq!(misc.color.index(), Some(DEFAULT_COLOR_INDEX));
        assert_eq!(stats.warnings.len(), 1);
    }

    #[test]
    fn test_polyline_elevation_selects_entity_type() {
        let flat = Polyline::from_points(
            [Point3::new(12.345, 67.89, 102.5), Point3::new(20.0, 70.0, 102.5)],
            false,
        );
        let sloped = Polyline::new(
            vec![
                PolylineVertex::new(Point3::new(0.0, 0.0, 1.0)),
                PolylineVertex::with_bulge(Point3::new(5.0, 0.0, 2.0), 0.25),
                PolylineVertex::new(Point3::new(5.0, 5.0, 3.0)),
            ],
            true,
        );
        let store = store_with(vec![
            entity(Geometry::Polyline(flat), "A"),
            entity(Geometry::Polyline(sloped), "A"),
        ]);
        let resolver = CoordinateSystemResolver::new();
        let (drawing, _) = Exporter::new(&NoStandards, &resolver, ExportOptions::default())
            .export(&store, "site")
            .unwrap();

        let exported: Vec<&Entity> = drawing.entities().collect();
        match &exported[0].specific {
            EntityType::LwPolyline(lw) => {
                assert_eq!(exported[0].common.elevation, 102.5);
                assert_eq!(lw.vertices[0].x, 12.345);
            }
            other => panic!("unexpected entity {other:?}"),
        }
        match &exported[1].specific {
            EntityType::Polyline(poly) => {
                assert!(poly.is_3d_polyline());
                assert!(poly.is_closed());
                let zs: Vec<f64> = poly.vertices().map(|v| v.location.z).collect();
                assert_eq!(zs, vec![1.0, 2.0, 3.0]);
            }
            other => panic!("unexpected entity {other:?}"),
        }
    }

    #[test]
    fn test_text_and_attributes_written_back() {
        let mut attrs = surveycad_core::entity::Attributes::new();
        attrs.insert(attributes::codes::TEXT_STYLE.to_string(), "SURVEY".to_string());
        attrs.insert("999".to_string(), "x".to_string());
        let text = entity(
            Geometry::Text(Text::new(Point3::new(1.0, 2.0, 3.0), "BM-12", 0.25).with_rotation(45.0)),
            "ANNO",
        )
        .with_attributes(attrs);
        let store = store_with(vec![text]);
        let resolver = CoordinateSystemResolver::new();
        let (drawing, stats) = Exporter::new(&NoStandards, &resolver, ExportOptions::default())
            .export(&store, "site")
            .unwrap();

        match &drawing.entities().next().unwrap().specific {
            EntityType::Text(t) => {
                assert_eq!(t.value, "BM-12");
                assert_eq!(t.text_height, 0.25);
                assert_eq!(t.rotation, 45.0);
                assert_eq!(t.text_style_name, "SURVEY");
            }
            other => panic!("unexpected entity {other:?}"),
        }
        // 未知组码只产生警告
        assert_eq!(stats.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_project_is_an_error() {
        let store = MemoryStore::new();
        let resolver = CoordinateSystemResolver::new();
        let result = Exporter::new(&NoStandards, &resolver, ExportOptions::default())
            .export(&store, "missing");
        assert!(matches!(result, Err(ExportError::Store(_))));
    }
}

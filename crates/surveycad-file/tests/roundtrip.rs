//! 文件级往返测试：在内存中构造 DXF，经真实的保存/加载路径导入、导出并校验

use dxf::entities::{Entity, EntityType};
use dxf::enums::{AcadVersion, HorizontalTextJustification, VerticalTextJustification};
use dxf::{Drawing, LwPolylineVertex, Point, Vector};
use std::path::{Path, PathBuf};
use surveycad_core::crs::CoordinateSystem;
use surveycad_core::resolver::CoordinateSystemResolver;
use surveycad_file::{
    load_drawing, validate_batch, validate_files, ExportOptions, Exporter, FailureKind,
    GeometryStore, ImportError, ImportRequest, Importer, MemoryStore, NoStandards, StandardsTable,
    ValidationOptions,
};
use tempfile::TempDir;

fn on_layer(specific: EntityType, layer: &str) -> Entity {
    let mut entity = Entity::new(specific);
    entity.common.layer = layer.to_string();
    entity
}

fn line(p1: (f64, f64, f64), p2: (f64, f64, f64)) -> Entity {
    on_layer(
        EntityType::Line(dxf::entities::Line::new(
            Point::new(p1.0, p1.1, p1.2),
            Point::new(p2.0, p2.1, p2.2),
        )),
        "V-TOPO",
    )
}

fn arc(start: f64, end: f64) -> Entity {
    on_layer(
        EntityType::Arc(dxf::entities::Arc::new(Point::new(50.0, 50.0, 0.0), 25.0, start, end)),
        "V-CURB",
    )
}

fn lw_polyline(points: &[(f64, f64, f64)], elevation: f64, closed: bool) -> Entity {
    let mut lw = dxf::entities::LwPolyline::default();
    lw.set_is_closed(closed);
    lw.vertices = points
        .iter()
        .map(|&(x, y, bulge)| {
            let mut v = LwPolylineVertex::default();
            v.x = x;
            v.y = y;
            v.bulge = bulge;
            v
        })
        .collect();
    let mut entity = on_layer(EntityType::LwPolyline(lw), "V-BLDG");
    entity.common.elevation = elevation;
    entity
}

fn text(value: &str, x: f64, y: f64) -> Entity {
    let mut t = dxf::entities::Text::default();
    t.location = Point::new(x, y, 0.0);
    t.value = value.to_string();
    t.text_height = 0.2;
    t.rotation = 30.0;
    on_layer(EntityType::Text(t), "V-ANNO")
}

/// R12 不支持 LWPOLYLINE，保存时会被丢弃
fn new_drawing() -> Drawing {
    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2004;
    drawing
}

fn write_drawing(dir: &TempDir, name: &str, entities: Vec<Entity>) -> PathBuf {
    let mut drawing = new_drawing();
    for entity in entities {
        drawing.add_entity(entity);
    }
    save(dir, name, &drawing)
}

fn save(dir: &TempDir, name: &str, drawing: &Drawing) -> PathBuf {
    let path = dir.path().join(name);
    drawing.save_file(&path).unwrap();
    path
}

/// 顶点挂在所属文档上，必须用同一个 Drawing 创建
fn polyline_3d(drawing: &mut Drawing, points: &[(f64, f64, f64)]) -> Entity {
    let mut polyline = dxf::entities::Polyline::default();
    polyline.set_is_3d_polyline(true);
    for &(x, y, z) in points {
        let mut v = dxf::entities::Vertex::default();
        v.location = Point::new(x, y, z);
        v.set_is_3d_polyline_vertex(true);
        polyline.add_vertex(drawing, v);
    }
    on_layer(EntityType::Polyline(polyline), "V-BRKL")
}

fn survey_drawing() -> Drawing {
    let mut drawing = new_drawing();
    let breakline = polyline_3d(
        &mut drawing,
        &[(0.0, 0.0, 100.0), (10.0, 0.0, 101.25), (10.0, 10.0, 102.5)],
    );

    let entities = vec![
        line((0.0, 0.0, 10.0), (100.0, 0.0, 10.0)),
        line((6_000_123.456, 2_100_987.654, 55.5), (6_000_223.456, 2_101_087.654, 56.0)),
        arc(30.0, 120.0),
        on_layer(
            EntityType::Circle(dxf::entities::Circle::new(Point::new(-5.0, 7.5, 3.0), 1.25)),
            "V-NODE",
        ),
        lw_polyline(&[(12.345, 67.890, 0.0), (20.0, 70.0, 0.5), (25.0, 60.0, 0.0)], 102.5, false),
        lw_polyline(&[(0.0, 0.0, 0.0), (4.0, 0.0, 0.0), (4.0, 4.0, 0.0), (0.0, 4.0, 0.0)], 0.0, true),
        breakline,
        text("BM-101 EL=102.50", 1.0, 2.0),
    ];
    for entity in entities {
        drawing.add_entity(entity);
    }
    drawing
}

/// 导入文件，再导出到 `out`
fn import_then_export(original: &Path, out: &Path, standards: Option<&StandardsTable>) {
    let resolver = CoordinateSystemResolver::new();
    let mut store = MemoryStore::new();
    let request = ImportRequest::new("site", CoordinateSystem::Local);
    let stats = Importer::new(&resolver)
        .import_file(original, &request, &mut store)
        .unwrap();
    assert!(stats.errors.is_empty());

    let exporter = match standards {
        Some(table) => Exporter::new(table, &resolver, ExportOptions::default()),
        None => Exporter::new(&NoStandards, &resolver, ExportOptions::default()),
    };
    exporter.export_file(&store, "site", out).unwrap();
}

#[test]
fn roundtrip_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let original = save(&dir, "survey.dxf", &survey_drawing());
    let exported = dir.path().join("exported.dxf");
    import_then_export(&original, &exported, None);

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(report.passed, "{report}");
    assert_eq!(report.matched, 8);
    assert!(report.max_error <= 0.001);

    // 第二代导出与第一代一致
    let exported_again = dir.path().join("exported_again.dxf");
    import_then_export(&exported, &exported_again, None);
    let report = validate_files(&exported, &exported_again, &ValidationOptions::default()).unwrap();
    assert!(report.passed, "{report}");
}

#[test]
fn roundtrip_with_standards_renames_layers_only() {
    let dir = tempfile::tempdir().unwrap();
    let original = save(&dir, "survey.dxf", &survey_drawing());
    let standards = StandardsTable::from_toml_str(
        r#"
[[layer]]
legacy_name = "V-TOPO"
discipline = "V"
category = "TOPO"
feature = "MAJR"
color = "0,255,0"
lineweight = 0.35
"#,
    )
    .unwrap();
    let exported = dir.path().join("exported.dxf");
    import_then_export(&original, &exported, Some(&standards));

    let drawing = load_drawing(&exported).unwrap();
    assert!(drawing.layers().any(|l| l.name == "V-TOPO-MAJR"));
    assert!(drawing.entities().any(|e| e.common.layer == "V-TOPO-MAJR"));

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(report.passed, "{report}");
}

#[test]
fn reversed_line_is_equivalent() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_drawing(&dir, "a.dxf", vec![line((0.0, 0.0, 10.0), (100.0, 0.0, 10.0))]);
    let exported = write_drawing(&dir, "b.dxf", vec![line((100.0, 0.0, 10.0), (0.0, 0.0, 10.0))]);

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(report.passed, "{report}");
    assert_eq!(report.max_error, 0.0);
}

#[test]
fn arc_angles_wrap_around() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_drawing(&dir, "a.dxf", vec![arc(359.95, 0.1)]);
    let exported = write_drawing(&dir, "b.dxf", vec![arc(0.0, 0.15)]);

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(report.passed, "{report}");
}

#[test]
fn lost_bulge_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let square = |bulge: f64| {
        lw_polyline(
            &[(0.0, 0.0, 0.0), (10.0, 0.0, bulge), (10.0, 10.0, 0.0), (0.0, 10.0, 0.0)],
            0.0,
            true,
        )
    };
    let original = write_drawing(&dir, "a.dxf", vec![square(0.5)]);
    let exported = write_drawing(&dir, "b.dxf", vec![square(0.0)]);

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(!report.passed);
    assert_eq!(report.failure_count(FailureKind::BulgeMismatch), 1);
    assert_eq!(report.failure_count(FailureKind::Missing), 0);
    assert_eq!(report.failure_count(FailureKind::Spurious), 0);
    assert_eq!(report.failure_count(FailureKind::PositionalError), 0);
}

#[test]
fn missing_entity_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let a = || line((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
    let b = || text("B", 20.0, 20.0);
    let c = || arc(10.0, 80.0);
    let original = write_drawing(&dir, "a.dxf", vec![a(), b(), c()]);
    let exported = write_drawing(&dir, "b.dxf", vec![b(), a()]);

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(!report.passed);
    assert_eq!(report.failure_count(FailureKind::Missing), 1);
    let missing = report
        .failures
        .iter()
        .find(|f| f.kind == FailureKind::Missing)
        .unwrap();
    assert_eq!(missing.entity_kind, surveycad_core::geometry::EntityKind::Arc);
    assert_eq!(report.matched, 2);
}

#[test]
fn elevation_survives_import_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_drawing(
        &dir,
        "z.dxf",
        vec![lw_polyline(&[(12.345, 67.890, 0.0), (13.0, 68.0, 0.0)], 102.5, false)],
    );
    let exported = dir.path().join("exported.dxf");
    import_then_export(&original, &exported, None);

    let drawing = load_drawing(&exported).unwrap();
    let entity = drawing.entities().next().unwrap();
    match &entity.specific {
        EntityType::LwPolyline(lw) => {
            let round3 = |v: f64| (v * 1000.0).round() / 1000.0;
            assert_eq!(round3(lw.vertices[0].x), 12.345);
            assert_eq!(round3(lw.vertices[0].y), 67.890);
            assert_eq!(round3(entity.common.elevation), 102.500);
        }
        other => panic!("unexpected entity {other:?}"),
    }
}

#[test]
fn fixtures_keep_lightweight_polylines() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_drawing(
        &dir,
        "lw.dxf",
        vec![lw_polyline(&[(0.0, 0.0, 0.5), (10.0, 0.0, 0.0)], 7.0, false)],
    );
    let drawing = load_drawing(&path).unwrap();
    assert_eq!(drawing.entities().count(), 1);
}

#[test]
fn extrusion_and_text_alignment_survive_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirrored = dxf::entities::Arc::new(Point::new(50.0, 50.0, 0.0), 25.0, 30.0, 120.0);
    mirrored.normal = Vector::new(0.0, 0.0, -1.0);

    let mut label = dxf::entities::Text::default();
    label.location = Point::new(40.0, 1.0, 0.0);
    label.value = "STA 10+00".to_string();
    label.text_height = 0.2;
    label.horizontal_text_justification = HorizontalTextJustification::Center;
    label.vertical_text_justification = VerticalTextJustification::Middle;
    label.second_alignment_point = Point::new(50.0, 1.0, 0.0);

    let mut wide = dxf::entities::LwPolyline::default();
    wide.vertices = [(0.0, 0.0, 0.5, 1.0), (10.0, 0.0, 0.0, 0.0)]
        .iter()
        .map(|&(x, y, start, end)| {
            let mut v = LwPolylineVertex::default();
            v.x = x;
            v.y = y;
            v.starting_width = start;
            v.ending_width = end;
            v
        })
        .collect();

    let original = write_drawing(
        &dir,
        "attrs.dxf",
        vec![
            on_layer(EntityType::Arc(mirrored), "V-CURB"),
            on_layer(EntityType::Text(label), "V-ANNO"),
            on_layer(EntityType::LwPolyline(wide), "V-BLDG"),
        ],
    );
    let exported = dir.path().join("exported.dxf");
    import_then_export(&original, &exported, None);

    let drawing = load_drawing(&exported).unwrap();
    let mut seen = 0;
    for entity in drawing.entities() {
        match &entity.specific {
            EntityType::Arc(arc) => {
                assert_eq!((arc.normal.x, arc.normal.y, arc.normal.z), (0.0, 0.0, -1.0));
                seen += 1;
            }
            EntityType::Text(text) => {
                assert_eq!(text.horizontal_text_justification, HorizontalTextJustification::Center);
                assert_eq!(text.vertical_text_justification, VerticalTextJustification::Middle);
                let p = &text.second_alignment_point;
                assert_eq!((p.x, p.y, p.z), (50.0, 1.0, 0.0));
                seen += 1;
            }
            EntityType::LwPolyline(lw) => {
                assert_eq!(lw.vertices[0].starting_width, 0.5);
                assert_eq!(lw.vertices[0].ending_width, 1.0);
                seen += 1;
            }
            other => panic!("unexpected entity {other:?}"),
        }
    }
    assert_eq!(seen, 3);

    let report = validate_files(&original, &exported, &ValidationOptions::default()).unwrap();
    assert!(report.passed, "{report}");
}

#[test]
fn malformed_file_is_not_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_drawing(
        &dir,
        "bad.dxf",
        vec![
            line((0.0, 0.0, 0.0), (1.0, 1.0, 0.0)),
            on_layer(
                EntityType::Circle(dxf::entities::Circle::new(Point::new(0.0, 0.0, 0.0), 0.0)),
                "V-NODE",
            ),
        ],
    );

    let resolver = CoordinateSystemResolver::new();
    let mut store = MemoryStore::new();
    let result = Importer::new(&resolver).import_file(
        &path,
        &ImportRequest::new("site", CoordinateSystem::Local),
        &mut store,
    );
    assert!(matches!(result, Err(ImportError::Malformed { .. })));
    assert!(store.read_entities("site").is_err());

    // 校验器对畸形文件同样报错，而不是给出报告
    assert!(validate_files(&path, &path, &ValidationOptions::default()).is_err());
}

#[test]
fn layers_are_created_from_layer_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut drawing = new_drawing();
    let mut layer = dxf::tables::Layer::default();
    layer.name = "V-TOPO".to_string();
    layer.color = dxf::Color::from_index(3);
    drawing.add_layer(layer);
    drawing.add_entity(line((0.0, 0.0, 0.0), (1.0, 0.0, 0.0)));
    let mut ghost = line((5.0, 0.0, 0.0), (6.0, 0.0, 0.0));
    ghost.common.layer = "GHOST".to_string();
    drawing.add_entity(ghost);
    let path = dir.path().join("layers.dxf");
    drawing.save_file(&path).unwrap();

    let resolver = CoordinateSystemResolver::new();
    let mut store = MemoryStore::new();
    let stats = Importer::new(&resolver)
        .import_file(&path, &ImportRequest::new("site", CoordinateSystem::Local), &mut store)
        .unwrap();
    assert_eq!(stats.layers_created, 2);

    let layers = store.read_layers("site").unwrap();
    let topo = layers.iter().find(|l| l.name == "V-TOPO").unwrap();
    assert_eq!(topo.color_index, 3);
    assert!(layers.iter().any(|l| l.name == "GHOST"));

    // 再次导入同一文件不再创建图层
    let stats = Importer::new(&resolver)
        .import_file(&path, &ImportRequest::new("site", CoordinateSystem::Local), &mut store)
        .unwrap();
    assert_eq!(stats.layers_created, 0);
    assert_eq!(store.read_entities("site").unwrap().len(), 4);
}

#[test]
fn geographic_roundtrip_through_state_plane() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_drawing(
        &dir,
        "wgs84.dxf",
        vec![
            line((-122.4194, 37.7749, 15.0), (-122.4094, 37.7849, 18.5)),
            text("CP-1", -122.41, 37.78),
        ],
    );

    let resolver = CoordinateSystemResolver::new();
    let mut store = MemoryStore::new();
    let request = ImportRequest::new("sf", CoordinateSystem::StatePlane(2227))
        .with_source_crs(CoordinateSystem::Wgs84);
    Importer::new(&resolver)
        .import_file(&original, &request, &mut store)
        .unwrap();

    let exported = dir.path().join("back.dxf");
    let options = ExportOptions {
        project_crs: CoordinateSystem::StatePlane(2227),
        target_crs: Some(CoordinateSystem::Wgs84),
    };
    Exporter::new(&NoStandards, &resolver, options)
        .export_file(&store, "sf", &exported)
        .unwrap();

    let tight = ValidationOptions::default().with_tolerance(1e-6);
    let report = validate_files(&original, &exported, &tight).unwrap();
    assert!(report.passed, "{report}");
}

#[test]
fn batch_validation_reports_each_pair() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_drawing(&dir, "a.dxf", vec![line((0.0, 0.0, 0.0), (1.0, 0.0, 0.0))]);
    let b = write_drawing(&dir, "b.dxf", vec![line((1.0, 0.0, 0.0), (0.0, 0.0, 0.0))]);
    let c = write_drawing(&dir, "c.dxf", vec![]);
    let missing = dir.path().join("missing.dxf");

    let results = validate_batch(
        &[(a.clone(), b), (a.clone(), c), (a, missing)],
        &ValidationOptions::default(),
    );
    assert_eq!(results.len(), 3);
    assert!(results[0].as_ref().unwrap().passed);
    assert!(!results[1].as_ref().unwrap().passed);
    assert!(results[2].is_err());
}

//! DXF 导入
//!
//! 一个文件就是一个事务：提取、坐标变换和 WKT 生成都在内存中完成，
//! 全部成功后才一次性提交到存储。任何畸形实体或变换失败都会放弃整个文件。

use crate::attributes;
use crate::error::ImportError;
use crate::extract::{extract_drawing, load_drawing};
use crate::store::{GeometryStore, ImportBatch};
use serde::{Deserialize, Serialize};
use std::path::Path;
use surveycad_core::crs::CoordinateSystem;
use surveycad_core::entity::CanonicalEntity;
use surveycad_core::geometry::Geometry;
use surveycad_core::resolver::{CoordinateSystemResolver, Transformer};

pub use crate::store::ImportMode;

/// 导入统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStatistics {
    pub entities_imported: usize,
    pub entities_skipped: usize,
    pub layers_created: usize,
    pub errors: Vec<String>,
}

/// 导入请求
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub project_id: String,
    /// 项目坐标系，存储中的坐标都在此坐标系下
    pub project_crs: CoordinateSystem,
    /// 文件的绘制坐标系，缺省与项目坐标系相同
    pub source_crs: Option<CoordinateSystem>,
    pub mode: ImportMode,
    /// 写入导入日志的来源名称
    pub source_name: String,
}

impl ImportRequest {
    pub fn new(project_id: impl Into<String>, project_crs: CoordinateSystem) -> Self {
        Self {
            project_id: project_id.into(),
            project_crs,
            source_crs: None,
            mode: ImportMode::Append,
            source_name: String::new(),
        }
    }

    pub fn with_source_crs(mut self, source_crs: CoordinateSystem) -> Self {
        self.source_crs = Some(source_crs);
        self
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn source_crs(&self) -> CoordinateSystem {
        self.source_crs.unwrap_or(self.project_crs)
    }
}

/// DXF 导入器
pub struct Importer<'a> {
    resolver: &'a CoordinateSystemResolver,
}

impl<'a> Importer<'a> {
    pub fn new(resolver: &'a CoordinateSystemResolver) -> Self {
        Self { resolver }
    }

    /// 从 DXF 文件导入
    pub fn import_file(
        &self,
        path: &Path,
        request: &ImportRequest,
        store: &mut dyn GeometryStore,
    ) -> Result<ImportStatistics, ImportError> {
        let drawing = load_drawing(path)?;
        if request.source_name.is_empty() {
            let named = request.clone().with_source_name(path.display().to_string());
            self.import_drawing(&drawing, &named, store)
        } else {
            self.import_drawing(&drawing, request, store)
        }
    }

    /// 导入已解析的 DXF 文档
    pub fn import_drawing(
        &self,
        drawing: &dxf::Drawing,
        request: &ImportRequest,
        store: &mut dyn GeometryStore,
    ) -> Result<ImportStatistics, ImportError> {
        let source = request.source_crs();

        // 变换在提取前解析，失败时不做任何工作
        let transformer = self.resolver.resolve(source, request.project_crs)?;

        let extraction = extract_drawing(drawing, source);
        for note in &extraction.notes {
            tracing::warn!(project = %request.project_id, "{note}");
        }

        let mut statistics = ImportStatistics {
            entities_skipped: extraction.skipped,
            ..Default::default()
        };

        if !extraction.is_clean() {
            statistics.errors = extraction.malformed.clone();
            tracing::warn!(
                project = %request.project_id,
                malformed = extraction.malformed.len(),
                "Import aborted, nothing written"
            );
            return Err(ImportError::Malformed {
                statistics,
                errors: extraction.malformed,
            });
        }

        let entities = transform_all(extraction.entities, &transformer)?;
        if !transformer.is_identity() {
            tracing::info!(
                from = %source,
                to = %request.project_crs,
                entities = entities.len(),
                "Reprojected imported entities"
            );
        }

        let batch = ImportBatch::prepare(
            &*store,
            &request.project_id,
            request.mode,
            request.source_name.clone(),
            entities,
            &extraction.layers,
        )?;
        let receipt = store.commit(batch)?;

        statistics.entities_imported = receipt.entities_written;
        statistics.layers_created = receipt.layers_created;

        tracing::info!(
            "Imported {} entities ({} skipped, {} layers created) into project '{}'",
            statistics.entities_imported,
            statistics.entities_skipped,
            statistics.layers_created,
            request.project_id
        );

        Ok(statistics)
    }
}

/// 逐点变换全部实体；恒等变换时原样返回
pub(crate) fn transform_all(
    entities: Vec<CanonicalEntity>,
    transformer: &Transformer,
) -> Result<Vec<CanonicalEntity>, ImportError> {
    if transformer.is_identity() {
        return Ok(entities);
    }

    let curved = entities.iter().any(|e| has_scalar_geometry(e.geometry()));
    if curved {
        tracing::warn!("Radii, angles and bulges are carried unchanged through reprojection");
    }

    entities
        .iter()
        .enumerate()
        .map(|(index, entity)| {
            let geometry = entity
                .geometry()
                .try_map_points(|p| transformer.transform(p))
                .map_err(|source| ImportError::Transform { index, source })?;
            let attributes = attributes::try_map_points(entity.attributes(), |p| {
                transformer.transform(p)
            })
            .map_err(|source| ImportError::Transform { index, source })?;
            entity
                .with_geometry(geometry)
                .map(|e| e.with_attributes(attributes))
                .map_err(|e| ImportError::Malformed {
                    statistics: ImportStatistics::default(),
                    errors: vec![format!("entity #{index} after transform: {e}")],
                })
        })
        .collect()
}

fn has_scalar_geometry(geometry: &Geometry) -> bool {
    match geometry {
        Geometry::Arc(_) | Geometry::Circle(_) => true,
        Geometry::Polyline(pl) => pl.has_bulges(),
        Geometry::Line(_) | Geometry::Text(_) => false,
    }
}

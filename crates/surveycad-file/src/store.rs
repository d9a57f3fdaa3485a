//! 几何存储
//!
//! 导入器在内存中完成全部提取和变换后，把结果打包成一个 [`ImportBatch`]，
//! 再通过 [`GeometryStore::commit`] 一次性提交。提交先做完所有检查才修改状态，
//! 失败时存储保持原样。

use crate::dxf_import::ImportStatistics;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use surveycad_core::entity::CanonicalEntity;
use surveycad_core::layer::LayerDefinition;
use surveycad_core::wkt::to_wkt;
use uuid::Uuid;

/// 导入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImportMode {
    /// 追加到项目现有实体之后
    #[default]
    Append,
    /// 在同一事务中废止项目现有的全部实体
    Replace,
}

/// 已持久化的实体记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: Uuid,
    pub import_id: Uuid,
    pub entity: CanonicalEntity,
    pub wkt: String,
    pub imported_at: DateTime<Utc>,
    /// 被后续 Replace 导入废止
    pub superseded: bool,
}

/// 导入日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: Uuid,
    pub source_name: String,
    pub mode: ImportMode,
    pub entity_count: usize,
    pub layers_created: Vec<String>,
    pub imported_at: DateTime<Utc>,
}

/// 待提交的一次导入
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub import_id: Uuid,
    pub project_id: String,
    pub mode: ImportMode,
    pub source_name: String,
    /// 需要新建的图层
    pub layers: Vec<LayerDefinition>,
    /// 实体及其 WKT
    pub entities: Vec<(CanonicalEntity, String)>,
}

impl ImportBatch {
    /// 组装批次：生成 WKT，并为存储中不存在的图层准备定义
    ///
    /// 图层定义优先取自 `layer_table`（通常是 DXF 的 LAYER 表），否则使用默认定义。
    pub fn prepare<S: GeometryStore + ?Sized>(
        store: &S,
        project_id: &str,
        mode: ImportMode,
        source_name: impl Into<String>,
        entities: Vec<CanonicalEntity>,
        layer_table: &[LayerDefinition],
    ) -> Result<Self, StoreError> {
        if project_id.trim().is_empty() {
            return Err(StoreError::EmptyProjectId);
        }

        let mut seen = HashSet::new();
        let mut layers = Vec::new();
        for entity in &entities {
            let name = entity.layer_name();
            if store.has_layer(project_id, name) || !seen.insert(name.to_string()) {
                continue;
            }
            let definition = layer_table
                .iter()
                .find(|l| l.name == name)
                .cloned()
                .unwrap_or_else(|| LayerDefinition::new(name));
            layers.push(definition);
        }

        let entities = entities
            .into_iter()
            .map(|e| {
                let wkt = to_wkt(e.geometry());
                (e, wkt)
            })
            .collect();

        Ok(Self {
            import_id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            mode,
            source_name: source_name.into(),
            layers,
            entities,
        })
    }
}

/// 提交回执
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub import_id: Uuid,
    pub entities_written: usize,
    pub layers_created: usize,
    /// Replace 模式下被废止的实体数
    pub superseded: usize,
}

/// 按项目划分的事务性几何存储
pub trait GeometryStore {
    fn has_layer(&self, project_id: &str, name: &str) -> bool;

    /// 原子提交：要么整批生效，要么什么都不改变
    fn commit(&mut self, batch: ImportBatch) -> Result<CommitReceipt, StoreError>;

    /// 项目的有效（未废止）实体，按导入顺序
    fn read_entities(&self, project_id: &str) -> Result<Vec<CanonicalEntity>, StoreError>;

    fn read_layers(&self, project_id: &str) -> Result<Vec<LayerDefinition>, StoreError>;

    /// 直接追加实体，缺失图层自动创建
    fn insert_entities(
        &mut self,
        project_id: &str,
        entities: Vec<CanonicalEntity>,
    ) -> Result<ImportStatistics, StoreError> {
        let batch = ImportBatch::prepare(
            &*self,
            project_id,
            ImportMode::Append,
            "insert_entities",
            entities,
            &[],
        )?;
        let receipt = self.commit(batch)?;
        Ok(ImportStatistics {
            entities_imported: receipt.entities_written,
            layers_created: receipt.layers_created,
            ..Default::default()
        })
    }
}

/// 单个项目的数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    pub layers: BTreeMap<String, LayerDefinition>,
    pub entities: Vec<StoredEntity>,
    pub imports: Vec<ImportRecord>,
}

/// 内存存储，可通过 [`crate::snapshot`] 持久化
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    projects: BTreeMap<String, ProjectData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_ids(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn project(&self, project_id: &str) -> Option<&ProjectData> {
        self.projects.get(project_id)
    }

    /// 包括已废止记录在内的全部实体
    pub fn stored_entities(&self, project_id: &str) -> Result<&[StoredEntity], StoreError> {
        self.get(project_id).map(|p| p.entities.as_slice())
    }

    pub fn imports(&self, project_id: &str) -> Result<&[ImportRecord], StoreError> {
        self.get(project_id).map(|p| p.imports.as_slice())
    }

    fn get(&self, project_id: &str) -> Result<&ProjectData, StoreError> {
        self.projects
            .get(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))
    }
}

impl GeometryStore for MemoryStore {
    fn has_layer(&self, project_id: &str, name: &str) -> bool {
        self.projects
            .get(project_id)
            .is_some_and(|p| p.layers.contains_key(name))
    }

    fn commit(&mut self, batch: ImportBatch) -> Result<CommitReceipt, StoreError> {
        if batch.project_id.trim().is_empty() {
            return Err(StoreError::EmptyProjectId);
        }

        // 先检查，后修改
        for (entity, _) in &batch.entities {
            let layer = entity.layer_name();
            let known = self.has_layer(&batch.project_id, layer)
                || batch.layers.iter().any(|l| l.name == layer);
            if !known {
                return Err(StoreError::UnknownLayer {
                    project: batch.project_id.clone(),
                    layer: layer.to_string(),
                });
            }
        }

        let now = Utc::now();
        let project = self.projects.entry(batch.project_id.clone()).or_default();

        let mut superseded = 0;
        if batch.mode == ImportMode::Replace {
            for stored in project.entities.iter_mut().filter(|e| !e.superseded) {
                stored.superseded = true;
                superseded += 1;
            }
        }

        let mut layers_created = Vec::new();
        for layer in batch.layers {
            if !project.layers.contains_key(&layer.name) {
                layers_created.push(layer.name.clone());
                project.layers.insert(layer.name.clone(), layer);
            }
        }

        let entities_written = batch.entities.len();
        project
            .entities
            .extend(batch.entities.into_iter().map(|(entity, wkt)| StoredEntity {
                id: Uuid::new_v4(),
                import_id: batch.import_id,
                entity,
                wkt,
                imported_at: now,
                superseded: false,
            }));

        let receipt = CommitReceipt {
            import_id: batch.import_id,
            entities_written,
            layers_created: layers_created.len(),
            superseded,
        };

        project.imports.push(ImportRecord {
            id: batch.import_id,
            source_name: batch.source_name,
            mode: batch.mode,
            entity_count: entities_written,
            layers_created,
            imported_at: now,
        });

        tracing::info!(
            project = %batch.project_id,
            import_id = %receipt.import_id,
            entities = receipt.entities_written,
            layers_created = receipt.layers_created,
            superseded = receipt.superseded,
            "Committed import"
        );

        Ok(receipt)
    }

    fn read_entities(&self, project_id: &str) -> Result<Vec<CanonicalEntity>, StoreError> {
        Ok(self
            .get(project_id)?
            .entities
            .iter()
            .filter(|e| !e.superseded)
            .map(|e| e.entity.clone())
            .collect())
    }

    fn read_layers(&self, project_id: &str) -> Result<Vec<LayerDefinition>, StoreError> {
        Ok(self.get(project_id)?.layers.values().cloned().collect())
    }
}

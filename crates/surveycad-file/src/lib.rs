//! SurveyCAD 文件处理
//!
//! 支持：
//! - `.dxf` 导入（事务性写入几何存储）/导出（按图层标准生成表现信息）
//! - 往返坐标保真校验
//! - `.svdx` 存储快照（MessagePack + Zstd）

pub mod attributes;
pub mod dxf_export;
pub mod dxf_import;
pub mod error;
pub mod extract;
pub mod snapshot;
pub mod standards;
pub mod store;
pub mod validate;

pub use dxf_export::{ExportOptions, ExportStatistics, Exporter};
pub use dxf_import::{ImportMode, ImportRequest, ImportStatistics, Importer};
pub use error::{ExportError, FileError, ImportError, StandardsError, StoreError, ValidationError};
pub use extract::{extract_drawing, load_drawing, Extraction};
pub use standards::{LayerStandard, NoStandards, StandardsLookup, StandardsTable};
pub use store::{GeometryStore, ImportBatch, MemoryStore};
pub use validate::{
    validate_batch, validate_entities, validate_files, FailureKind, ValidationOptions,
    ValidationReport,
};

//! 文件操作错误定义

use crate::dxf_import::ImportStatistics;
use std::path::PathBuf;
use surveycad_core::error::{CrsError, GeometryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DXF error: {0}")]
    Dxf(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),
}

/// 几何存储错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("project id must not be empty")]
    EmptyProjectId,

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("layer '{layer}' is not defined in project '{project}'")]
    UnknownLayer { project: String, layer: String },
}

/// 导入错误：任何一种都意味着整个文件未写入
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("coordinate system resolution failed: {0}")]
    Crs(#[from] CrsError),

    #[error("{} malformed entities, import rolled back", .errors.len())]
    Malformed {
        statistics: ImportStatistics,
        errors: Vec<String>,
    },

    #[error("coordinate transform failed for entity #{index}: {source}")]
    Transform { index: usize, source: CrsError },

    #[error("store rejected import: {0}")]
    Store(#[from] StoreError),
}

/// 导出错误
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("coordinate system resolution failed: {0}")]
    Crs(#[from] CrsError),

    #[error("coordinate transform failed for entity #{index}: {source}")]
    Transform { index: usize, source: CrsError },

    #[error("reprojected geometry is invalid: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 图层标准加载错误
#[derive(Error, Debug)]
pub enum StandardsError {
    #[error("failed to read standards file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML standards: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON standards: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate standard for layer '{0}'")]
    Duplicate(String),
}

/// 往返校验的处理错误（与校验失败不同，校验失败体现在报告中）
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("failed to load {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: FileError,
    },

    #[error("{path:?} contains {} malformed entities", .errors.len())]
    Malformed { path: PathBuf, errors: Vec<String> },
}

//! 往返坐标保真校验
//!
//! 对原始文件和导出文件分别独立提取，再用两阶段匹配证明两组实体几何等价。
//! 校验失败体现在报告中；只有文件无法读取或含畸形几何时才返回错误。

mod compare;
mod hash;
mod matcher;
mod report;

pub use compare::{compare, Comparison};
pub use hash::{geometric_hash, GeometricHash};
pub use matcher::{match_entities, MatchOutcome, MatchStage, MatchedPair};
pub use report::{Failure, FailureKind, TypeSummary, ValidationReport};

use crate::error::ValidationError;
use crate::extract::{extract_drawing, load_drawing};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use surveycad_core::crs::CoordinateSystem;
use surveycad_core::entity::CanonicalEntity;

/// 默认位置容差（英尺）
pub const DEFAULT_TOLERANCE: f64 = 0.001;
/// 默认角度容差（度）
pub const DEFAULT_ANGULAR_TOLERANCE: f64 = 0.1;
/// 默认凸度容差
pub const DEFAULT_BULGE_TOLERANCE: f64 = 0.001;
/// 默认哈希取整小数位
pub const DEFAULT_HASH_DECIMALS: u32 = 3;

/// 校验选项
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub tolerance: f64,
    pub angular_tolerance: f64,
    pub bulge_tolerance: f64,
    pub height_tolerance: f64,
    pub hash_decimals: u32,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            angular_tolerance: DEFAULT_ANGULAR_TOLERANCE,
            bulge_tolerance: DEFAULT_BULGE_TOLERANCE,
            height_tolerance: DEFAULT_TOLERANCE,
            hash_decimals: DEFAULT_HASH_DECIMALS,
        }
    }
}

impl ValidationOptions {
    /// 设置位置容差，文字高度容差随之变化
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self.height_tolerance = tolerance;
        self
    }
}

/// 校验两组实体
pub fn validate_entities(
    original: &[CanonicalEntity],
    exported: &[CanonicalEntity],
    options: &ValidationOptions,
) -> ValidationReport {
    let outcome = match_entities(original, exported, options);

    let mut summaries: BTreeMap<_, TypeSummary> = BTreeMap::new();
    for e in original {
        summaries.entry(e.kind()).or_default().original += 1;
    }
    for e in exported {
        summaries.entry(e.kind()).or_default().exported += 1;
    }

    let mut failures = Vec::new();
    let mut error_sums: BTreeMap<_, f64> = BTreeMap::new();
    let mut total_error = 0.0;
    let mut max_error: f64 = 0.0;

    for pair in &outcome.pairs {
        let kind = original[pair.original].kind();
        let c = &pair.comparison;
        let summary = summaries.entry(kind).or_default();
        match pair.stage {
            MatchStage::Exact => summary.exact += 1,
            MatchStage::Fuzzy => summary.fuzzy += 1,
        }
        summary.max_error = summary.max_error.max(c.error);
        *error_sums.entry(kind).or_default() += c.error;
        total_error += c.error;
        max_error = max_error.max(c.error);

        // 阶段一命中也要核对实际误差
        if c.error > options.tolerance {
            failures.push(Failure {
                kind: FailureKind::PositionalError,
                entity_kind: kind,
                original_index: Some(pair.original),
                exported_index: Some(pair.exported),
                detail: format!("error {:.6} exceeds tolerance {}", c.error, options.tolerance),
            });
        }
        for (failure_kind, detail) in &c.mismatches {
            failures.push(Failure {
                kind: *failure_kind,
                entity_kind: kind,
                original_index: Some(pair.original),
                exported_index: Some(pair.exported),
                detail: detail.clone(),
            });
        }
    }

    for &i in &outcome.missing {
        let entity = &original[i];
        summaries.entry(entity.kind()).or_default().missing += 1;
        failures.push(Failure {
            kind: FailureKind::Missing,
            entity_kind: entity.kind(),
            original_index: Some(i),
            exported_index: None,
            detail: format!(
                "layer '{}' anchor {}",
                entity.layer_name(),
                format_point(&entity.geometry().anchor())
            ),
        });
    }
    for &j in &outcome.spurious {
        let entity = &exported[j];
        summaries.entry(entity.kind()).or_default().spurious += 1;
        failures.push(Failure {
            kind: FailureKind::Spurious,
            entity_kind: entity.kind(),
            original_index: None,
            exported_index: Some(j),
            detail: format!(
                "layer '{}' anchor {}",
                entity.layer_name(),
                format_point(&entity.geometry().anchor())
            ),
        });
    }

    for (kind, summary) in summaries.iter_mut() {
        let matched = summary.exact + summary.fuzzy;
        if matched > 0 {
            summary.avg_error = error_sums.get(kind).copied().unwrap_or(0.0) / matched as f64;
        }
    }

    let matched = outcome.pairs.len();
    let passed = failures.is_empty();
    if passed {
        tracing::info!(matched, "Round-trip validation passed");
    } else {
        tracing::warn!(matched, failures = failures.len(), "Round-trip validation failed");
    }

    ValidationReport {
        original: None,
        exported: None,
        tolerance: options.tolerance,
        summaries,
        matched,
        max_error,
        avg_error: if matched > 0 {
            total_error / matched as f64
        } else {
            0.0
        },
        failures,
        passed,
    }
}

fn format_point(p: &surveycad_core::math::Point3<f64>) -> String {
    format!("({:.3}, {:.3}, {:.3})", p.x, p.y, p.z)
}

/// 以 LOCAL 语义从文件提取实体，不做任何坐标变换
fn load_entities(path: &Path) -> Result<Vec<CanonicalEntity>, ValidationError> {
    let drawing = load_drawing(path).map_err(|source| ValidationError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let extraction = extract_drawing(&drawing, CoordinateSystem::Local);
    if !extraction.is_clean() {
        return Err(ValidationError::Malformed {
            path: path.to_path_buf(),
            errors: extraction.malformed,
        });
    }
    if extraction.skipped > 0 {
        tracing::debug!(
            path = %path.display(),
            skipped = extraction.skipped,
            "Unsupported entities ignored by validation"
        );
    }
    Ok(extraction.entities)
}

/// 校验两个 DXF 文件
pub fn validate_files(
    original: &Path,
    exported: &Path,
    options: &ValidationOptions,
) -> Result<ValidationReport, ValidationError> {
    let original_entities = load_entities(original)?;
    let exported_entities = load_entities(exported)?;

    tracing::info!(
        original = %original.display(),
        exported = %exported.display(),
        "Validating {} original against {} exported entities",
        original_entities.len(),
        exported_entities.len()
    );

    let mut report = validate_entities(&original_entities, &exported_entities, options);
    report.original = Some(original.display().to_string());
    report.exported = Some(exported.display().to_string());
    Ok(report)
}

/// 并行校验多组互不相关的文件
pub fn validate_batch(
    pairs: &[(PathBuf, PathBuf)],
    options: &ValidationOptions,
) -> Vec<Result<ValidationReport, ValidationError>> {
    pairs
        .par_iter()
        .map(|(original, exported)| validate_files(original, exported, options))
        .collect()
}

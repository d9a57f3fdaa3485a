//! 校验报告

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use surveycad_core::geometry::EntityKind;

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FailureKind {
    /// 原始实体在导出集中没有匹配
    Missing,
    /// 导出实体在原始集中没有匹配
    Spurious,
    PositionalError,
    AngleMismatch,
    BulgeMismatch,
    ClosureMismatch,
    RotationMismatch,
    HeightMismatch,
    ContentMismatch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Missing => "MISSING",
            FailureKind::Spurious => "SPURIOUS",
            FailureKind::PositionalError => "POSITIONAL_ERROR",
            FailureKind::AngleMismatch => "ANGLE_MISMATCH",
            FailureKind::BulgeMismatch => "BULGE_MISMATCH",
            FailureKind::ClosureMismatch => "CLOSURE_MISMATCH",
            FailureKind::RotationMismatch => "ROTATION_MISMATCH",
            FailureKind::HeightMismatch => "HEIGHT_MISMATCH",
            FailureKind::ContentMismatch => "CONTENT_MISMATCH",
        };
        f.write_str(name)
    }
}

/// 单条失败
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub entity_kind: EntityKind,
    /// 原始集中的序号
    pub original_index: Option<usize>,
    /// 导出集中的序号
    pub exported_index: Option<usize>,
    pub detail: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<18} {:<8}", self.kind.to_string(), self.entity_kind.to_string())?;
        if let Some(i) = self.original_index {
            write!(f, " original #{i}")?;
        }
        if let Some(i) = self.exported_index {
            write!(f, " exported #{i}")?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// 按实体类型的汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeSummary {
    pub original: usize,
    pub exported: usize,
    /// 阶段一（哈希）匹配数
    pub exact: usize,
    /// 阶段二（最近邻）匹配数
    pub fuzzy: usize,
    pub missing: usize,
    pub spurious: usize,
    pub max_error: f64,
    pub avg_error: f64,
}

/// 往返校验报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub original: Option<String>,
    pub exported: Option<String>,
    pub tolerance: f64,
    pub summaries: BTreeMap<EntityKind, TypeSummary>,
    pub matched: usize,
    pub max_error: f64,
    pub avg_error: f64,
    pub failures: Vec<Failure>,
    pub passed: bool,
}

impl ValidationReport {
    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures.iter().any(|f| f.kind == kind)
    }

    pub fn summary(&self, kind: EntityKind) -> Option<&TypeSummary> {
        self.summaries.get(&kind)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DXF round-trip validation")?;
        if let (Some(original), Some(exported)) = (&self.original, &self.exported) {
            writeln!(f, "  original: {original}")?;
            writeln!(f, "  exported: {exported}")?;
        }
        writeln!(f, "  tolerance: {} ft", self.tolerance)?;
        writeln!(f)?;

        writeln!(
            f,
            "{:<10} {:>8} {:>8} {:>6} {:>6} {:>7} {:>8} {:>12} {:>12}",
            "TYPE", "ORIGINAL", "EXPORTED", "EXACT", "FUZZY", "MISSING", "SPURIOUS", "MAX ERR", "AVG ERR"
        )?;
        writeln!(f, "{}", "-".repeat(87))?;
        for (kind, s) in &self.summaries {
            writeln!(
                f,
                "{:<10} {:>8} {:>8} {:>6} {:>6} {:>7} {:>8} {:>12.6} {:>12.6}",
                kind.to_string(),
                s.original,
                s.exported,
                s.exact,
                s.fuzzy,
                s.missing,
                s.spurious,
                s.max_error,
                s.avg_error
            )?;
        }
        writeln!(f, "{}", "-".repeat(87))?;
        writeln!(
            f,
            "matched {} pairs, max error {:.6}, avg error {:.6}",
            self.matched, self.max_error, self.avg_error
        )?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failures ({}):", self.failures.len())?;
            for failure in &self.failures {
                writeln!(f, "  {failure}")?;
            }
        }

        writeln!(f)?;
        if self.passed {
            write!(f, "===== PASS =====")
        } else {
            write!(f, "===== FAIL =====")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_report() -> ValidationReport {
        let mut summaries = BTreeMap::new();
        summaries.insert(
            EntityKind::Polyline,
            TypeSummary {
                original: 1,
                exported: 1,
                fuzzy: 1,
                ..Default::default()
            },
        );
        ValidationReport {
            original: Some("a.dxf".to_string()),
            exported: Some("b.dxf".to_string()),
            tolerance: 0.001,
            summaries,
            matched: 1,
            max_error: 0.0,
            avg_error: 0.0,
            failures: vec![Failure {
                kind: FailureKind::BulgeMismatch,
                entity_kind: EntityKind::Polyline,
                original_index: Some(0),
                exported_index: Some(0),
                detail: "vertex 1 bulge 0.5 vs 0".to_string(),
            }],
            passed: false,
        }
    }

    #[test]
    fn test_display_lists_failures_and_banner() {
        let text = failing_report().to_string();
        assert!(text.contains("original: a.dxf"));
        assert!(text.contains("BULGE_MISMATCH"));
        assert!(text.contains("original #0 exported #0"));
        assert!(text.ends_with("===== FAIL ====="));
    }

    #[test]
    fn test_counts_by_kind() {
        let report = failing_report();
        assert_eq!(report.failure_count(FailureKind::BulgeMismatch), 1);
        assert!(!report.has_failure(FailureKind::Missing));
        assert_eq!(report.summary(EntityKind::Polyline).map(|s| s.fuzzy), Some(1));
        assert!(report.summary(EntityKind::Text).is_none());
    }
}

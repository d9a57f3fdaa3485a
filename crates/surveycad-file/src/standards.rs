//! 图层标准
//!
//! 旧图层名到 {颜色, 线宽, 线型} 的映射，导出时只读使用。
//! 标准文件为 TOML（`[[layer]]` 数组）或 JSON（同结构），按扩展名选择解析器。
//!
//! ```toml
//! [[layer]]
//! legacy_name = "TOPO"
//! discipline = "V"
//! category = "TOPO"
//! feature = "MAJR"
//! color = "0,255,0"
//! lineweight = 0.35
//! linetype = "CONTINUOUS"
//! ```

use crate::error::StandardsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use surveycad_core::layer::Rgb;

/// 单个图层的标准
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStandard {
    /// 存储中的旧图层名
    pub legacy_name: String,
    /// 显式指定的输出图层名，覆盖命名规则
    #[serde(default)]
    pub name: Option<String>,
    pub discipline: String,
    pub category: String,
    #[serde(default)]
    pub feature: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    /// `R,G,B` 或 `#RRGGBB`
    #[serde(default)]
    pub color: Option<String>,
    /// 线宽（毫米）
    #[serde(default)]
    pub lineweight: Option<f64>,
    #[serde(default)]
    pub linetype: Option<String>,
}

impl LayerStandard {
    /// 输出图层名：`DISCIPLINE-CATEGORY[-FEATURE][-PHASE]`，全部大写
    pub fn layer_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_uppercase();
        }
        [
            Some(self.discipline.as_str()),
            Some(self.category.as_str()),
            self.feature.as_deref(),
            self.phase.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("-")
    }

    /// 解析颜色；未配置时为 `Ok(None)`
    pub fn rgb(&self) -> Result<Option<Rgb>, String> {
        match &self.color {
            None => Ok(None),
            Some(text) => text.parse().map(Some).map_err(|e| format!("{e}")),
        }
    }

    /// 线宽换算为 DXF 线宽枚举值（百分之一毫米），取最接近的标准线宽
    pub fn lineweight_enum(&self) -> Option<i16> {
        self.lineweight
            .filter(|mm| mm.is_finite() && *mm >= 0.0)
            .map(nearest_lineweight)
    }
}

/// DXF 允许的线宽（百分之一毫米）
pub const STANDARD_LINEWEIGHTS: [i16; 24] = [
    0, 5, 9, 13, 15, 18, 20, 25, 30, 35, 40, 50, 53, 60, 70, 80, 90, 100, 106, 120, 140, 158, 200,
    211,
];

fn nearest_lineweight(mm: f64) -> i16 {
    let hundredths = mm * 100.0;
    STANDARD_LINEWEIGHTS
        .iter()
        .copied()
        .min_by(|a, b| {
            (f64::from(*a) - hundredths)
                .abs()
                .total_cmp(&(f64::from(*b) - hundredths).abs())
        })
        .unwrap_or(0)
}

/// 标准查询接口
pub trait StandardsLookup {
    fn layer_standard(&self, legacy_name: &str) -> Option<&LayerStandard>;
}

/// 不提供任何标准
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStandards;

impl StandardsLookup for NoStandards {
    fn layer_standard(&self, _legacy_name: &str) -> Option<&LayerStandard> {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
struct StandardsFile {
    #[serde(default)]
    layer: Vec<LayerStandard>,
}

/// 按旧图层名索引的标准表（大小写不敏感）
#[derive(Debug, Clone, Default)]
pub struct StandardsTable {
    standards: HashMap<String, LayerStandard>,
}

impl StandardsTable {
    pub fn new(standards: Vec<LayerStandard>) -> Result<Self, StandardsError> {
        let mut map = HashMap::with_capacity(standards.len());
        for standard in standards {
            let key = standard.legacy_name.to_uppercase();
            if map.contains_key(&key) {
                return Err(StandardsError::Duplicate(standard.legacy_name));
            }
            map.insert(key, standard);
        }
        Ok(Self { standards: map })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, StandardsError> {
        let file: StandardsFile = toml::from_str(text)?;
        Self::new(file.layer)
    }

    pub fn from_json_str(text: &str) -> Result<Self, StandardsError> {
        let file: StandardsFile = serde_json::from_str(text)?;
        Self::new(file.layer)
    }

    /// 从文件加载，`.json` 按 JSON 解析，其余按 TOML
    pub fn load(path: &Path) -> Result<Self, StandardsError> {
        let text = std::fs::read_to_string(path).map_err(|source| StandardsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let table = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        tracing::info!("Loaded {} layer standards from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.standards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standards.is_empty()
    }
}

impl StandardsLookup for StandardsTable {
    fn layer_standard(&self, legacy_name: &str) -> Option<&LayerStandard> {
        self.standards.get(&legacy_name.to_uppercase())
    }
}

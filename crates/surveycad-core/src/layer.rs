//! 图层定义与颜色
//!
//! 颜色以 AutoCAD 颜色索引 (ACI) 为主，另可携带 24 位真彩色。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 默认颜色索引（白/黑）
pub const DEFAULT_COLOR_INDEX: u8 = 7;
/// 默认线型
pub const DEFAULT_LINETYPE: &str = "CONTINUOUS";

/// 图层定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub name: String,
    /// ACI 颜色索引
    pub color_index: u8,
    /// 24 位真彩色（0xRRGGBB）
    #[serde(default)]
    pub true_color: Option<u32>,
    pub linetype: String,
    /// DXF 线宽枚举值（百分之一毫米），None 表示默认
    #[serde(default)]
    pub lineweight: Option<i16>,
}

impl LayerDefinition {
    /// 自动创建图层时使用的默认定义
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_index: DEFAULT_COLOR_INDEX,
            true_color: None,
            linetype: DEFAULT_LINETYPE.to_string(),
            lineweight: None,
        }
    }

    pub fn with_color_index(mut self, index: u8) -> Self {
        self.color_index = index;
        self
    }

    pub fn with_linetype(mut self, linetype: impl Into<String>) -> Self {
        self.linetype = linetype.into();
        self
    }
}

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// 基本 ACI 调色板（1-9）
const BASIC_ACI: [(u8, Rgb); 9] = [
    (1, Rgb::new(255, 0, 0)),
    (2, Rgb::new(255, 255, 0)),
    (3, Rgb::new(0, 255, 0)),
    (4, Rgb::new(0, 255, 255)),
    (5, Rgb::new(0, 0, 255)),
    (6, Rgb::new(255, 0, 255)),
    (7, Rgb::new(255, 255, 255)),
    (8, Rgb::new(128, 128, 128)),
    (9, Rgb::new(192, 192, 192)),
];

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 打包为 DXF 真彩色整数（组码 420）
    pub fn to_true_color(&self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    pub fn from_true_color(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xFF) as u8,
            ((value >> 8) & 0xFF) as u8,
            (value & 0xFF) as u8,
        )
    }

    /// 与基本调色板完全一致时返回其索引
    pub fn exact_aci(&self) -> Option<u8> {
        BASIC_ACI
            .iter()
            .find(|(_, rgb)| rgb == self)
            .map(|(index, _)| *index)
    }

    /// 基本调色板中最接近的索引
    pub fn nearest_aci(&self) -> u8 {
        let dist = |o: &Rgb| {
            let dr = i32::from(self.r) - i32::from(o.r);
            let dg = i32::from(self.g) - i32::from(o.g);
            let db = i32::from(self.b) - i32::from(o.b);
            dr * dr + dg * dg + db * db
        };
        BASIC_ACI
            .iter()
            .min_by_key(|(_, rgb)| dist(rgb))
            .map_or(DEFAULT_COLOR_INDEX, |(index, _)| *index)
    }

    /// 基本 ACI 索引转 RGB
    pub fn from_aci(index: u8) -> Option<Self> {
        BASIC_ACI
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, rgb)| *rgb)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

/// 颜色字符串解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRgbError(pub String);

impl fmt::Display for ParseRgbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid RGB color '{}'", self.0)
    }
}

impl std::error::Error for ParseRgbError {}

impl FromStr for Rgb {
    type Err = ParseRgbError;

    /// 接受 `R,G,B`（可带空格）或 `#RRGGBB`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRgbError(s.to_string());
        let trimmed = s.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            if hex.len() != 6 {
                return Err(err());
            }
            let value = u32::from_str_radix(hex, 16).map_err(|_| err())?;
            return Ok(Self::from_true_color(value));
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(err());
        }
        let channel = |p: &str| p.parse::<u8>().map_err(|_| err());
        Ok(Self::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?))
    }
}

//! 坐标参考系统定义
//!
//! 项目声明的工作坐标系只有三种：
//! - `Local`: 任意图形单位，SRID 0，不做任何转换
//! - `StatePlane(srid)`: 州平面坐标（美国测量英尺）
//! - `Wgs84`: 地理坐标，EPSG:4326，X 为经度、Y 为纬度

use crate::error::CrsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// WGS84 地理坐标的 SRID
pub const WGS84_SRID: u32 = 4326;

/// 坐标系声明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CoordinateSystem {
    /// 本地坐标（SRID 0）
    #[default]
    Local,
    /// 州平面坐标，携带 EPSG 代码
    StatePlane(u32),
    /// WGS84 经纬度
    Wgs84,
}

impl CoordinateSystem {
    /// 空间参考标识
    pub fn srid(&self) -> u32 {
        match self {
            CoordinateSystem::Local => 0,
            CoordinateSystem::StatePlane(srid) => *srid,
            CoordinateSystem::Wgs84 => WGS84_SRID,
        }
    }

    /// 由 SRID 反推坐标系声明
    pub fn from_srid(srid: u32) -> Self {
        match srid {
            0 => CoordinateSystem::Local,
            WGS84_SRID => CoordinateSystem::Wgs84,
            other => CoordinateSystem::StatePlane(other),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, CoordinateSystem::Local)
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Local => f.write_str("LOCAL"),
            CoordinateSystem::StatePlane(srid) => write!(f, "STATE_PLANE:{srid}"),
            CoordinateSystem::Wgs84 => f.write_str("WGS84"),
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = CrsError;

    /// 接受 `LOCAL`、`WGS84`、`EPSG:4326`、`STATE_PLANE:2226`、`EPSG:2226` 或纯数字 SRID
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "LOCAL" => return Ok(CoordinateSystem::Local),
            "WGS84" => return Ok(CoordinateSystem::Wgs84),
            _ => {}
        }

        let code = normalized
            .strip_prefix("STATE_PLANE:")
            .or_else(|| normalized.strip_prefix("EPSG:"))
            .unwrap_or(&normalized);

        code.parse::<u32>()
            .map(CoordinateSystem::from_srid)
            .map_err(|_| CrsError::Parse(s.to_string()))
    }
}

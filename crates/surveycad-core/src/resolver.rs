//! 坐标系解析器
//!
//! 把 (来源, 目标) 坐标系对解析为转换器，并在进程生命周期内缓存。
//! 缓存以 SRID 对为键，读多写少，可在并发导入之间共享。

use crate::crs::CoordinateSystem;
use crate::error::CrsError;
use crate::math::Point3;
use crate::projection::{zone_for_srid, LambertConformalConic};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// 坐标转换器
///
/// 只转换 X/Y，Z 原样保留（不处理高程基准）。
#[derive(Debug, Clone, PartialEq)]
pub enum Transformer {
    /// 恒等变换：同一坐标系，或 LOCAL -> LOCAL
    Identity,
    /// 经纬度 -> 州平面
    Project(LambertConformalConic),
    /// 州平面 -> 经纬度
    Unproject(LambertConformalConic),
    /// 州平面 -> 经纬度 -> 另一州平面
    Reproject {
        from: LambertConformalConic,
        to: LambertConformalConic,
    },
}

impl Transformer {
    pub fn is_identity(&self) -> bool {
        matches!(self, Transformer::Identity)
    }

    /// 转换单个点
    pub fn transform(&self, p: &Point3<f64>) -> Result<Point3<f64>, CrsError> {
        let (x, y) = match self {
            Transformer::Identity => return Ok(*p),
            Transformer::Project(lcc) => lcc.forward(p.x, p.y)?,
            Transformer::Unproject(lcc) => lcc.inverse(p.x, p.y)?,
            Transformer::Reproject { from, to } => {
                let (lon, lat) = from.inverse(p.x, p.y)?;
                to.forward(lon, lat)?
            }
        };
        Ok(Point3::new(x, y, p.z))
    }
}

/// 坐标系解析器（带转换器缓存）
#[derive(Debug, Default)]
pub struct CoordinateSystemResolver {
    cache: RwLock<HashMap<(u32, u32), Arc<Transformer>>>,
}

impl CoordinateSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析转换器，命中缓存时直接返回
    pub fn resolve(
        &self,
        source: CoordinateSystem,
        target: CoordinateSystem,
    ) -> Result<Arc<Transformer>, CrsError> {
        let key = (source.srid(), target.srid());

        if let Some(found) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }

        let transformer = Arc::new(Self::build(source, target)?);
        tracing::debug!(
            source = %source,
            target = %target,
            identity = transformer.is_identity(),
            "Built coordinate transformer"
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(transformer)))
    }

    /// 已缓存的转换器数量
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn build(source: CoordinateSystem, target: CoordinateSystem) -> Result<Transformer, CrsError> {
        use CoordinateSystem::*;

        match (source, target) {
            (Local, Local) | (Wgs84, Wgs84) => Ok(Transformer::Identity),
            (StatePlane(a), StatePlane(b)) if a == b => {
                zone_for_srid(a)?;
                Ok(Transformer::Identity)
            }
            (Local, _) | (_, Local) => Err(CrsError::IncompatiblePair {
                from: source.to_string(),
                to: target.to_string(),
            }),
            (Wgs84, StatePlane(srid)) => Ok(Transformer::Project(lcc(srid)?)),
            (StatePlane(srid), Wgs84) => Ok(Transformer::Unproject(lcc(srid)?)),
            (StatePlane(a), StatePlane(b)) => Ok(Transformer::Reproject {
                from: lcc(a)?,
                to: lcc(b)?,
            }),
        }
    }
}

fn lcc(srid: u32) -> Result<LambertConformalConic, CrsError> {
    zone_for_srid(srid).map(|zone| LambertConformalConic::new(*zone))
}

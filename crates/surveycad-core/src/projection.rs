//! 投影转换
//!
//! 实现 Lambert 等角圆锥投影（双标准纬线，GRS80 椭球），覆盖加州 NAD83
//! 州平面坐标带（EPSG 2225-2230，美国测量英尺）。NAD83 与 WGS84 视为重合，
//! 不做基准面转换。
//!
//! 公式参见 Snyder, "Map Projections - A Working Manual", 第 15 章。

use crate::error::CrsError;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// GRS80 长半轴（米）
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 扁率倒数
const GRS80_INV_F: f64 = 298.257_222_101;
/// 美国测量英尺（米）
pub const US_SURVEY_FOOT: f64 = 1200.0 / 3937.0;

/// 纬度迭代收敛阈值（弧度）
const LATITUDE_TOLERANCE: f64 = 1e-12;
const MAX_ITERATIONS: usize = 15;

/// 州平面坐标带参数（角度为十进制度，伪偏移为米）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LccZone {
    pub srid: u32,
    pub name: &'static str,
    pub latitude_of_origin: f64,
    pub central_meridian: f64,
    pub standard_parallel_1: f64,
    pub standard_parallel_2: f64,
    pub false_easting_m: f64,
    pub false_northing_m: f64,
}

const fn dms(deg: f64, min: f64) -> f64 {
    deg + min / 60.0
}

/// 已知的州平面坐标带
pub const STATE_PLANE_ZONES: &[LccZone] = &[
    LccZone {
        srid: 2225,
        name: "NAD83 / California zone 1 (ftUS)",
        latitude_of_origin: dms(39.0, 20.0),
        central_meridian: -122.0,
        standard_parallel_1: dms(41.0, 40.0),
        standard_parallel_2: dms(40.0, 0.0),
        false_easting_m: 2_000_000.0,
        false_northing_m: 500_000.0,
    },
    LccZone {
        srid: 2226,
        name: "NAD83 / California zone 2 (ftUS)",
        latitude_of_origin: dms(37.0, 40.0),
        central_meridian: -122.0,
        standard_parallel_1: dms(39.0, 50.0),
        standard_parallel_2: dms(38.0, 20.0),
        false_easting_m: 2_000_000.0,
        false_northing_m: 500_000.0,
    },
    LccZone {
        srid: 2227,
        name: "NAD83 / California zone 3 (ftUS)",
        latitude_of_origin: dms(36.0, 30.0),
        central_meridian: -dms(120.0, 30.0),
        standard_parallel_1: dms(38.0, 26.0),
        standard_parallel_2: dms(37.0, 4.0),
        false_easting_m: 2_000_000.0,
        false_northing_m: 500_000.0,
    },
    LccZone {
        srid: 2228,
        name: "NAD83 / California zone 4 (ftUS)",
        latitude_of_origin: dms(35.0, 20.0),
        central_meridian: -119.0,
        standard_parallel_1: dms(37.0, 15.0),
        standard_parallel_2: dms(36.0, 0.0),
        false_easting_m: 2_000_000.0,
        false_northing_m: 500_000.0,
    },
    LccZone {
        srid: 2229,
        name: "NAD83 / California zone 5 (ftUS)",
        latitude_of_origin: dms(33.0, 30.0),
        central_meridian: -118.0,
        standard_parallel_1: dms(35.0, 28.0),
        standard_parallel_2: dms(34.0, 2.0),
        false_easting_m: 2_000_000.0,
        false_northing_m: 500_000.0,
    },
    LccZone {
        srid: 2230,
        name: "NAD83 / California zone 6 (ftUS)",
        latitude_of_origin: dms(32.0, 10.0),
        central_meridian: -dms(116.0, 15.0),
        standard_parallel_1: dms(33.0, 53.0),
        standard_parallel_2: dms(32.0, 47.0),
        false_easting_m: 2_000_000.0,
        false_northing_m: 500_000.0,
    },
];

/// 按 SRID 查找坐标带
pub fn zone_for_srid(srid: u32) -> Result<&'static LccZone, CrsError> {
    STATE_PLANE_ZONES
        .iter()
        .find(|z| z.srid == srid)
        .ok_or(CrsError::UnknownSrid(srid))
}

/// 预计算常数后的 Lambert 等角圆锥投影
#[derive(Debug, Clone, PartialEq)]
pub struct LambertConformalConic {
    zone: LccZone,
    e: f64,
    n: f64,
    af: f64,
    rho0: f64,
    lambda0: f64,
}

impl LambertConformalConic {
    pub fn new(zone: LccZone) -> Self {
        let f = 1.0 / GRS80_INV_F;
        let e = (2.0 * f - f * f).sqrt();

        let phi1 = zone.standard_parallel_1.to_radians();
        let phi2 = zone.standard_parallel_2.to_radians();
        let phi0 = zone.latitude_of_origin.to_radians();

        let m1 = m(phi1, e);
        let m2 = m(phi2, e);
        let t1 = t(phi1, e);
        let t2 = t(phi2, e);
        let t0 = t(phi0, e);

        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let big_f = m1 / (n * t1.powf(n));
        let af = GRS80_A * big_f;
        let rho0 = af * t0.powf(n);

        Self {
            zone,
            e,
            n,
            af,
            rho0,
            lambda0: zone.central_meridian.to_radians(),
        }
    }

    pub fn zone(&self) -> &LccZone {
        &self.zone
    }

    /// 经纬度（度）-> 平面坐标（美国测量英尺）
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), CrsError> {
        if !(-90.0..=90.0).contains(&lat) || !lon.is_finite() {
            return Err(CrsError::TransformFailed { x: lon, y: lat });
        }
        let phi = lat.to_radians();
        let rho = self.af * t(phi, self.e).powf(self.n);
        let theta = self.n * (lon.to_radians() - self.lambda0);

        let x_m = self.zone.false_easting_m + rho * theta.sin();
        let y_m = self.zone.false_northing_m + self.rho0 - rho * theta.cos();

        finite_pair(x_m / US_SURVEY_FOOT, y_m / US_SURVEY_FOOT, lon, lat)
    }

    /// 平面坐标（美国测量英尺）-> 经纬度（度）
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), CrsError> {
        let dx = x * US_SURVEY_FOOT - self.zone.false_easting_m;
        let dy = self.rho0 - (y * US_SURVEY_FOOT - self.zone.false_northing_m);

        let sign = self.n.signum();
        let rho = sign * (dx * dx + dy * dy).sqrt();
        let theta = (sign * dx).atan2(sign * dy);
        let t_prime = (rho / self.af).powf(1.0 / self.n);

        let mut phi = FRAC_PI_2 - 2.0 * t_prime.atan();
        for _ in 0..MAX_ITERATIONS {
            let es = self.e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t_prime * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
            let delta = (next - phi).abs();
            phi = next;
            if delta < LATITUDE_TOLERANCE {
                break;
            }
        }

        let lon = (theta / self.n + self.lambda0).to_degrees();
        finite_pair(lon, phi.to_degrees(), x, y)
    }
}

fn m(phi: f64, e: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - e * e * s * s).sqrt()
}

fn t(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

fn finite_pair(a: f64, b: f64, x: f64, y: f64) -> Result<(f64, f64), CrsError> {
    if a.is_finite() && b.is_finite() {
        Ok((a, b))
    } else {
        Err(CrsError::TransformFailed { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_false_origin() {
        let zone = *zone_for_srid(2226).unwrap();
        let lcc = LambertConformalConic::new(zone);
        let (x, y) = lcc
            .forward(zone.central_meridian, zone.latitude_of_origin)
            .unwrap();
        assert!((x - 2_000_000.0 / US_SURVEY_FOOT).abs() < 1e-6);
        assert!((y - 500_000.0 / US_SURVEY_FOOT).abs() < 1e-6);
    }

    #[test]
    fn test_forward_inverse_roundtrip() {
        for zone in STATE_PLANE_ZONES {
            let lcc = LambertConformalConic::new(*zone);
            let lon = zone.central_meridian + 0.731;
            let lat = zone.latitude_of_origin + 0.412;
            let (x, y) = lcc.forward(lon, lat).unwrap();
            let (lon2, lat2) = lcc.inverse(x, y).unwrap();
            assert!((lon - lon2).abs() < 1e-9, "zone {}", zone.srid);
            assert!((lat - lat2).abs() < 1e-9, "zone {}", zone.srid);
        }
    }

    #[test]
    fn test_unknown_zone() {
        assert_eq!(zone_for_srid(9999), Err(CrsError::UnknownSrid(9999)));
    }

    #[test]
    fn test_out_of_range_latitude() {
        let lcc = LambertConformalConic::new(*zone_for_srid(2227).unwrap());
        assert!(lcc.forward(-120.0, 95.0).is_err());
    }
}

//! WKT (Well-Known Text) 表示
//!
//! 供空间数据库存储使用：
//! - 线段、无凸度多段线 -> `LINESTRING Z`
//! - 圆弧 -> `CIRCULARSTRING Z`（起点、弧中点、终点）
//! - 圆 -> 闭合 `CIRCULARSTRING Z`
//! - 含凸度多段线 -> `COMPOUNDCURVE Z`
//! - 文本 -> `POINT Z`（插入点）

use crate::geometry::{Geometry, Polyline};
use crate::math::Point3;
use std::fmt::Write;

/// 将几何转换为 WKT
pub fn to_wkt(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Line(l) => format!("LINESTRING Z ({})", coords(&[l.start, l.end])),
        Geometry::Arc(a) => format!(
            "CIRCULARSTRING Z ({})",
            coords(&[a.start_point(), a.mid_point(), a.end_point()])
        ),
        Geometry::Circle(c) => {
            let start = c.point_at_angle(0.0);
            format!(
                "CIRCULARSTRING Z ({})",
                coords(&[start, c.point_at_angle(180.0), start])
            )
        }
        Geometry::Polyline(pl) => polyline_wkt(pl),
        Geometry::Text(t) => format!("POINT Z ({})", coord(&t.position)),
    }
}

fn polyline_wkt(pl: &Polyline) -> String {
    let mut points: Vec<Point3<f64>> = pl.vertices.iter().map(|v| v.point).collect();
    if pl.closed && points.len() > 1 {
        points.push(points[0]);
    }

    if !pl.has_bulges() {
        // 单顶点多段线退化为点
        if points.len() == 1 {
            return format!("POINT Z ({})", coord(&points[0]));
        }
        return format!("LINESTRING Z ({})", coords(&points));
    }

    let n = pl.vertices.len();
    let mut parts = Vec::with_capacity(pl.segment_count());
    for i in 0..pl.segment_count() {
        let v1 = &pl.vertices[i];
        let v2 = &pl.vertices[(i + 1) % n];
        if v1.bulge == 0.0 {
            parts.push(format!("({})", coords(&[v1.point, v2.point])));
        } else {
            let mid = bulge_midpoint(&v1.point, &v2.point, v1.bulge);
            parts.push(format!(
                "CIRCULARSTRING ({})",
                coords(&[v1.point, mid, v2.point])
            ));
        }
    }
    format!("COMPOUNDCURVE Z ({})", parts.join(", "))
}

/// 凸度弧段的弧中点
///
/// 凸度 b = tan(θ/4)，弦长一半为 c，则矢高 s = b·c；正凸度为逆时针弧，
/// 弧中点位于弦方向的右侧。
pub fn bulge_midpoint(p1: &Point3<f64>, p2: &Point3<f64>, bulge: f64) -> Point3<f64> {
    let mid = nalgebra::center(p1, p2);
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let chord = (dx * dx + dy * dy).sqrt();
    if chord == 0.0 {
        return mid;
    }
    let sagitta = bulge * chord / 2.0;
    // 右法向量 (dy, -dx) 单位化
    Point3::new(
        mid.x + dy / chord * sagitta,
        mid.y - dx / chord * sagitta,
        mid.z,
    )
}

fn coord(p: &Point3<f64>) -> String {
    format!("{} {} {}", p.x, p.y, p.z)
}

fn coords(points: &[Point3<f64>]) -> String {
    let mut out = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} {} {}", p.x, p.y, p.z);
    }
    out
}

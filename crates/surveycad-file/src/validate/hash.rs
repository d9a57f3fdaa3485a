//! 几何哈希
//!
//! 对实体类型、按固定小数位取整的坐标和关键标量做 SHA-256。
//! 取整后的值以整数参与哈希，避免浮点格式化带来的差异。

use sha2::{Digest, Sha256};
use surveycad_core::geometry::Geometry;
use surveycad_core::math::{normalize_degrees, Point3};

pub type GeometricHash = [u8; 32];

struct Hasher {
    inner: Sha256,
    scale: f64,
}

impl Hasher {
    fn new(decimals: u32) -> Self {
        Self {
            inner: Sha256::new(),
            scale: 10f64.powi(decimals as i32),
        }
    }

    fn round(&self, v: f64) -> i64 {
        (v * self.scale).round() as i64
    }

    fn tag(&mut self, tag: &str) {
        self.inner.update((tag.len() as u32).to_le_bytes());
        self.inner.update(tag.as_bytes());
    }

    fn scalar(&mut self, v: f64) {
        let rounded = self.round(v);
        self.inner.update(rounded.to_le_bytes());
    }

    fn point(&mut self, p: &Point3<f64>) {
        for rounded in rounded_point(p, self.scale) {
            self.inner.update(rounded.to_le_bytes());
        }
    }

    /// 角度先取整再对 360 取模，359.9999 与 0.0 得到相同的值
    fn angle(&mut self, degrees: f64) {
        let full_turn = self.round(360.0);
        let rounded = self.round(normalize_degrees(degrees)).rem_euclid(full_turn);
        self.inner.update(rounded.to_le_bytes());
    }

    fn finish(self) -> GeometricHash {
        self.inner.finalize().into()
    }
}

fn rounded_point(p: &Point3<f64>, scale: f64) -> [i64; 3] {
    [
        (p.x * scale).round() as i64,
        (p.y * scale).round() as i64,
        (p.z * scale).round() as i64,
    ]
}

/// 计算几何哈希
pub fn geometric_hash(geometry: &Geometry, decimals: u32) -> GeometricHash {
    let mut h = Hasher::new(decimals);
    h.tag(geometry.kind().dxf_name());

    match geometry {
        Geometry::Line(line) => {
            // 端点按取整后的坐标排序，方向不影响哈希
            let a = rounded_point(&line.start, h.scale);
            let b = rounded_point(&line.end, h.scale);
            let (first, second) = if a <= b {
                (&line.start, &line.end)
            } else {
                (&line.end, &line.start)
            };
            h.point(first);
            h.point(second);
        }
        Geometry::Arc(arc) => {
            h.point(&arc.center);
            h.scalar(arc.radius);
            h.angle(arc.start_angle);
            h.angle(arc.end_angle);
        }
        Geometry::Circle(circle) => {
            h.point(&circle.center);
            h.scalar(circle.radius);
        }
        Geometry::Polyline(polyline) => {
            h.tag(if polyline.closed { "closed" } else { "open" });
            h.inner.update((polyline.vertices.len() as u64).to_le_bytes());
            for vertex in &polyline.vertices {
                h.point(&vertex.point);
                h.scalar(vertex.bulge);
            }
        }
        Geometry::Text(text) => {
            h.point(&text.position);
            h.angle(text.rotation);
            h.scalar(text.height);
            h.tag(&text.content);
        }
    }

    h.finish()
}

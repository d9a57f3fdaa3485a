//! 数学工具
//!
//! 点与向量直接使用 nalgebra 类型，角度统一使用度。

pub use nalgebra::{Point3, Vector3};

/// 浮点比较容差
pub const EPSILON: f64 = 1e-10;

/// 将角度归一化到 [0, 360)
pub fn normalize_degrees(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid 对接近 -0 的值可能返回 360.0
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// 两个角度在模 360 意义下的最小差值，范围 [0, 180]
pub fn angle_difference_degrees(a: f64, b: f64) -> f64 {
    let diff = normalize_degrees(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// 三维欧氏距离
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// 所有分量均为有限值
pub fn is_finite_point(p: &Point3<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

/// 点集的质心，空集返回 None
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for p in points {
        sum += p.coords;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Point3::from(sum / count as f64))
}

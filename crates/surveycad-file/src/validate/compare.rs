//! 成对几何比较
//!
//! 给出一对同类实体的位置误差和所有非位置类差异。位置误差取所有定位点中的最大距离。

use super::report::FailureKind;
use super::ValidationOptions;
use surveycad_core::geometry::{Arc, Circle, Geometry, Line, Polyline, Text};
use surveycad_core::math::{angle_difference_degrees, distance};

/// 比较结果
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// 位置误差
    pub error: f64,
    /// 除位置误差以外的差异
    pub mismatches: Vec<(FailureKind, String)>,
}

impl Comparison {
    fn positional(error: f64) -> Self {
        Self {
            error,
            mismatches: Vec::new(),
        }
    }

    fn push(&mut self, kind: FailureKind, detail: String) {
        self.mismatches.push((kind, detail));
    }

    /// 用于候选排序的差异数
    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }
}

/// 比较两个几何；类型不同或多段线顶点数不同时不可比，返回 None
pub fn compare(a: &Geometry, b: &Geometry, options: &ValidationOptions) -> Option<Comparison> {
    match (a, b) {
        (Geometry::Line(a), Geometry::Line(b)) => Some(compare_lines(a, b)),
        (Geometry::Arc(a), Geometry::Arc(b)) => Some(compare_arcs(a, b, options)),
        (Geometry::Circle(a), Geometry::Circle(b)) => Some(compare_circles(a, b)),
        (Geometry::Polyline(a), Geometry::Polyline(b)) => compare_polylines(a, b, options),
        (Geometry::Text(a), Geometry::Text(b)) => Some(compare_texts(a, b, options)),
        _ => None,
    }
}

/// 两个方向取较小误差
fn compare_lines(a: &Line, b: &Line) -> Comparison {
    let forward = distance(&a.start, &b.start).max(distance(&a.end, &b.end));
    let reverse = distance(&a.start, &b.end).max(distance(&a.end, &b.start));
    Comparison::positional(forward.min(reverse))
}

fn compare_arcs(a: &Arc, b: &Arc, options: &ValidationOptions) -> Comparison {
    let error = distance(&a.center, &b.center).max((a.radius - b.radius).abs());
    let mut result = Comparison::positional(error);

    for (name, x, y) in [
        ("start", a.start_angle, b.start_angle),
        ("end", a.end_angle, b.end_angle),
    ] {
        let diff = angle_difference_degrees(x, y);
        if diff > options.angular_tolerance {
            result.push(
                FailureKind::AngleMismatch,
                format!("{name} angle {x:.4}° vs {y:.4}° (diff {diff:.4}°)"),
            );
        }
    }
    result
}

fn compare_circles(a: &Circle, b: &Circle) -> Comparison {
    Comparison::positional(distance(&a.center, &b.center).max((a.radius - b.radius).abs()))
}

fn compare_polylines(a: &Polyline, b: &Polyline, options: &ValidationOptions) -> Option<Comparison> {
    if a.vertices.len() != b.vertices.len() {
        return None;
    }

    let error = a
        .vertices
        .iter()
        .zip(&b.vertices)
        .map(|(va, vb)| distance(&va.point, &vb.point))
        .fold(0.0, f64::max);
    let mut result = Comparison::positional(error);

    if a.closed != b.closed {
        result.push(
            FailureKind::ClosureMismatch,
            format!("closed {} vs {}", a.closed, b.closed),
        );
    }

    for (i, (va, vb)) in a.vertices.iter().zip(&b.vertices).enumerate() {
        let diff = (va.bulge - vb.bulge).abs();
        if diff > options.bulge_tolerance {
            result.push(
                FailureKind::BulgeMismatch,
                format!("vertex {i} bulge {:.6} vs {:.6}", va.bulge, vb.bulge),
            );
        }
    }

    Some(result)
}

fn compare_texts(a: &Text, b: &Text, options: &ValidationOptions) -> Comparison {
    let mut result = Comparison::positional(distance(&a.position, &b.position));

    let rotation = angle_difference_degrees(a.rotation, b.rotation);
    if rotation > options.angular_tolerance {
        result.push(
            FailureKind::RotationMismatch,
            format!("rotation {:.4}° vs {:.4}°", a.rotation, b.rotation),
        );
    }
    if (a.height - b.height).abs() > options.height_tolerance {
        result.push(
            FailureKind::HeightMismatch,
            format!("height {} vs {}", a.height, b.height),
        );
    }
    if a.content != b.content {
        result.push(
            FailureKind::ContentMismatch,
            format!("content {:?} vs {:?}", a.content, b.content),
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveycad_core::geometry::PolylineVertex;
    use surveycad_core::math::Point3;

    fn options() -> ValidationOptions {
        ValidationOptions::default()
    }

    #[test]
    fn test_reversed_line_has_zero_error() {
        let a = Line::new(Point3::new(0.0, 0.0, 10.0), Point3::new(100.0, 0.0, 10.0));
        let c = compare(&Geometry::Line(a.clone()), &Geometry::Line(a.reversed()), &options()).unwrap();
        assert_eq!(c.error, 0.0);
        assert!(c.mismatches.is_empty());
    }

    #[test]
    fn test_arc_angles_wrap() {
        let a = Arc::new(Point3::origin(), 10.0, 359.95, 0.1);
        let b = Arc::new(Point3::origin(), 10.0, 0.0, 0.15);
        let c = compare(&Geometry::Arc(a), &Geometry::Arc(b), &options()).unwrap();
        assert!(c.mismatches.is_empty(), "{:?}", c.mismatches);

        let far = Arc::new(Point3::origin(), 10.0, 1.0, 0.15);
        let c = compare(
            &Geometry::Arc(Arc::new(Point3::origin(), 10.0, 359.95, 0.1)),
            &Geometry::Arc(far),
            &options(),
        )
        .unwrap();
        assert_eq!(c.mismatches.len(), 1);
        assert_eq!(c.mismatches[0].0, FailureKind::AngleMismatch);
    }

    #[test]
    fn test_polyline_bulge_and_closure_are_separate() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
        ];
        let mut a = Polyline::from_points(points, true);
        a.vertices[1] = PolylineVertex::with_bulge(points[1], 0.5);
        let b = Polyline::from_points(points, false);

        let c = compare(&Geometry::Polyline(a), &Geometry::Polyline(b), &options()).unwrap();
        assert_eq!(c.error, 0.0);
        let kinds: Vec<FailureKind> = c.mismatches.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![FailureKind::ClosureMismatch, FailureKind::BulgeMismatch]);
    }

    #[test]
    fn test_polyline_vertex_count_is_incomparable() {
        let a = Polyline::from_points([Point3::origin(), Point3::new(1.0, 0.0, 0.0)], false);
        let b = Polyline::from_points([Point3::origin()], false);
        assert!(compare(&Geometry::Polyline(a), &Geometry::Polyline(b), &options()).is_none());
    }

    #[test]
    fn test_text_checks() {
        let a = Text::new(Point3::new(1.0, 1.0, 0.0), "BM-1", 0.2).with_rotation(0.05);
        let b = Text::new(Point3::new(1.0, 1.0, 0.0), "BM-2", 0.25).with_rotation(359.99);
        let c = compare(&Geometry::Text(a), &Geometry::Text(b), &options()).unwrap();
        let kinds: Vec<FailureKind> = c.mismatches.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![FailureKind::HeightMismatch, FailureKind::ContentMismatch]);
    }

    #[test]
    fn test_different_kinds_are_incomparable() {
        let line = Geometry::Line(Line::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)));
        let circle = Geometry::Circle(Circle::new(Point3::origin(), 1.0));
        assert!(compare(&line, &circle, &options()).is_none());
    }
}

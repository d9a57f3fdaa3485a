//! 几何图元定义
//!
//! 支持的规范图元：
//! - 线段 (Line)
//! - 圆弧 (Arc)
//! - 圆 (Circle)
//! - 多段线 (Polyline)
//! - 文本 (Text)
//!
//! 所有坐标均为三维，二维来源的 Z 固定为 0.0。角度单位为度。

use crate::error::GeometryError;
use crate::math::{centroid, is_finite_point, normalize_degrees, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 几何类型枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Line(Line),
    Arc(Arc),
    Circle(Circle),
    Polyline(Polyline),
    Text(Text),
}

/// 实体类型标签（用于统计与分组）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Line,
    Arc,
    Circle,
    Polyline,
    Text,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Line,
        EntityKind::Arc,
        EntityKind::Circle,
        EntityKind::Polyline,
        EntityKind::Text,
    ];

    /// DXF 实体名称
    pub fn dxf_name(&self) -> &'static str {
        match self {
            EntityKind::Line => "LINE",
            EntityKind::Arc => "ARC",
            EntityKind::Circle => "CIRCLE",
            EntityKind::Polyline => "POLYLINE",
            EntityKind::Text => "TEXT",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dxf_name())
    }
}

impl Geometry {
    /// 获取几何的类型
    pub fn kind(&self) -> EntityKind {
        match self {
            Geometry::Line(_) => EntityKind::Line,
            Geometry::Arc(_) => EntityKind::Arc,
            Geometry::Circle(_) => EntityKind::Circle,
            Geometry::Polyline(_) => EntityKind::Polyline,
            Geometry::Text(_) => EntityKind::Text,
        }
    }

    /// 检查几何是否可以构成规范实体
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Geometry::Line(l) => l.validate(),
            Geometry::Arc(a) => a.validate(),
            Geometry::Circle(c) => c.validate(),
            Geometry::Polyline(pl) => pl.validate(),
            Geometry::Text(t) => t.validate(),
        }
    }

    /// 几何的所有定位点
    pub fn points(&self) -> Vec<Point3<f64>> {
        match self {
            Geometry::Line(l) => vec![l.start, l.end],
            Geometry::Arc(a) => vec![a.center],
            Geometry::Circle(c) => vec![c.center],
            Geometry::Polyline(pl) => pl.vertices.iter().map(|v| v.point).collect(),
            Geometry::Text(t) => vec![t.position],
        }
    }

    /// 锚点：与方向无关的代表点，用于空间分桶
    ///
    /// 两个几何的所有定位点误差都不超过 d 时，锚点之间的距离也不超过 d。
    pub fn anchor(&self) -> Point3<f64> {
        match self {
            Geometry::Line(l) => l.midpoint(),
            Geometry::Arc(a) => a.center,
            Geometry::Circle(c) => c.center,
            Geometry::Polyline(pl) => pl.centroid(),
            Geometry::Text(t) => t.position,
        }
    }

    /// 逐点映射，标量（半径、角度、凸度、高度）保持不变
    pub fn try_map_points<E>(
        &self,
        mut f: impl FnMut(&Point3<f64>) -> Result<Point3<f64>, E>,
    ) -> Result<Geometry, E> {
        Ok(match self {
            Geometry::Line(l) => Geometry::Line(Line::new(f(&l.start)?, f(&l.end)?)),
            Geometry::Arc(a) => Geometry::Arc(Arc {
                center: f(&a.center)?,
                ..a.clone()
            }),
            Geometry::Circle(c) => Geometry::Circle(Circle::new(f(&c.center)?, c.radius)),
            Geometry::Polyline(pl) => {
                let vertices = pl
                    .vertices
                    .iter()
                    .map(|v| Ok(PolylineVertex::with_bulge(f(&v.point)?, v.bulge)))
                    .collect::<Result<Vec<_>, E>>()?;
                Geometry::Polyline(Polyline::new(vertices, pl.closed))
            }
            Geometry::Text(t) => Geometry::Text(Text {
                position: f(&t.position)?,
                ..t.clone()
            }),
        })
    }
}

fn check_point(p: &Point3<f64>, what: &'static str) -> Result<(), GeometryError> {
    if is_finite_point(p) {
        Ok(())
    } else {
        Err(GeometryError::NonFinite(what))
    }
}

fn check_scalar(v: f64, what: &'static str) -> Result<(), GeometryError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::NonFinite(what))
    }
}

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
}

impl Line {
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }

    /// 计算线段长度
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// 计算线段中点
    pub fn midpoint(&self) -> Point3<f64> {
        nalgebra::center(&self.start, &self.end)
    }

    /// 反向线段
    pub fn reversed(&self) -> Self {
        Self::new(self.end, self.start)
    }

    fn validate(&self) -> Result<(), GeometryError> {
        check_point(&self.start, "line start")?;
        check_point(&self.end, "line end")
    }
}

/// 圆弧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point3<f64>,
    pub radius: f64,
    /// 起始角度（度，[0, 360)）
    pub start_angle: f64,
    /// 终止角度（度，[0, 360)）
    pub end_angle: f64,
}

impl Arc {
    /// 创建圆弧，角度归一化到 [0, 360)
    pub fn new(center: Point3<f64>, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle: normalize_degrees(start_angle),
            end_angle: normalize_degrees(end_angle),
        }
    }

    /// 计算逆时针扫过的角度（度）
    pub fn sweep_angle(&self) -> f64 {
        let sweep = normalize_degrees(self.end_angle - self.start_angle);
        if sweep == 0.0 {
            360.0
        } else {
            sweep
        }
    }

    /// 指定角度（度）处的圆上点，Z 与圆心相同
    pub fn point_at_angle(&self, angle: f64) -> Point3<f64> {
        let rad = angle.to_radians();
        Point3::new(
            self.center.x + self.radius * rad.cos(),
            self.center.y + self.radius * rad.sin(),
            self.center.z,
        )
    }

    /// 获取起点
    pub fn start_point(&self) -> Point3<f64> {
        self.point_at_angle(self.start_angle)
    }

    /// 获取终点
    pub fn end_point(&self) -> Point3<f64> {
        self.point_at_angle(self.end_angle)
    }

    /// 弧中点
    pub fn mid_point(&self) -> Point3<f64> {
        self.point_at_angle(self.start_angle + self.sweep_angle() / 2.0)
    }

    fn validate(&self) -> Result<(), GeometryError> {
        check_point(&self.center, "arc center")?;
        check_scalar(self.radius, "arc radius")?;
        check_scalar(self.start_angle, "arc start angle")?;
        check_scalar(self.end_angle, "arc end angle")?;
        if self.radius <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(self.radius));
        }
        Ok(())
    }
}

/// 圆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 指定角度（度）处的圆上点
    pub fn point_at_angle(&self, angle: f64) -> Point3<f64> {
        let rad = angle.to_radians();
        Point3::new(
            self.center.x + self.radius * rad.cos(),
            self.center.y + self.radius * rad.sin(),
            self.center.z,
        )
    }

    fn validate(&self) -> Result<(), GeometryError> {
        check_point(&self.center, "circle center")?;
        check_scalar(self.radius, "circle radius")?;
        if self.radius <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(self.radius));
        }
        Ok(())
    }
}

/// 多段线顶点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub point: Point3<f64>,
    /// 凸度（bulge）- 到下一个顶点的弧线段，0表示直线
    pub bulge: f64,
}

impl PolylineVertex {
    pub fn new(point: Point3<f64>) -> Self {
        Self { point, bulge: 0.0 }
    }

    pub fn with_bulge(point: Point3<f64>, bulge: f64) -> Self {
        Self { point, bulge }
    }
}

/// 多段线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<PolylineVertex>,
    /// 是否闭合
    pub closed: bool,
}

impl Polyline {
    pub fn new(vertices: Vec<PolylineVertex>, closed: bool) -> Self {
        Self { vertices, closed }
    }

    /// 从点列表创建（所有顶点都是直线连接）
    pub fn from_points(points: impl IntoIterator<Item = Point3<f64>>, closed: bool) -> Self {
        Self {
            vertices: points.into_iter().map(PolylineVertex::new).collect(),
            closed,
        }
    }

    /// 顶点数量
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 线段数量
    pub fn segment_count(&self) -> usize {
        if self.vertices.len() < 2 {
            return 0;
        }
        if self.closed {
            self.vertices.len()
        } else {
            self.vertices.len() - 1
        }
    }

    /// 是否含有弧线段
    pub fn has_bulges(&self) -> bool {
        self.vertices.iter().any(|v| v.bulge != 0.0)
    }

    /// 所有顶点 Z 值相同时返回该值（可写为 LWPOLYLINE 标高）
    pub fn uniform_elevation(&self) -> Option<f64> {
        let first = self.vertices.first()?.point.z;
        self.vertices
            .iter()
            .all(|v| v.point.z == first)
            .then_some(first)
    }

    /// 顶点质心
    pub fn centroid(&self) -> Point3<f64> {
        centroid(self.vertices.iter().map(|v| &v.point)).unwrap_or_else(Point3::origin)
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if self.vertices.is_empty() {
            return Err(GeometryError::EmptyPolyline);
        }
        for v in &self.vertices {
            check_point(&v.point, "polyline vertex")?;
            check_scalar(v.bulge, "polyline bulge")?;
        }
        Ok(())
    }
}

/// 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// 插入点
    pub position: Point3<f64>,
    /// 旋转角度（度）
    pub rotation: f64,
    /// 文本高度
    pub height: f64,
    /// 文本内容
    pub content: String,
}

impl Text {
    pub fn new(position: Point3<f64>, content: impl Into<String>, height: f64) -> Self {
        Self {
            position,
            rotation: 0.0,
            height,
            content: content.into(),
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    fn validate(&self) -> Result<(), GeometryError> {
        check_point(&self.position, "text position")?;
        check_scalar(self.rotation, "text rotation")?;
        check_scalar(self.height, "text height")?;
        // 高度 0 表示沿用文字样式的固定高度
        if self.height < 0.0 {
            return Err(GeometryError::NegativeTextHeight(self.height));
        }
        Ok(())
    }
}

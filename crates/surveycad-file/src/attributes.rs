//! 未映射组码的采集与回写
//!
//! 几何之外的 DXF 数据（线型、颜色、线宽、厚度、拉伸方向、文字对齐、XDATA 等）按组码
//! 存入实体的 `attributes`，导出时原样写回。只记录与 dxf 默认值不同的项。

use dxf::entities::{Entity, EntityCommon, EntityType};
use dxf::enums::{HorizontalTextJustification, VerticalTextJustification};
use dxf::{Color, Point, Vector, XData, XDataItem};
use serde::{Deserialize, Serialize};
use surveycad_core::entity::Attributes;
use surveycad_core::math::Point3;

/// 组码键
pub mod codes {
    pub const LINETYPE: &str = "6";
    pub const TEXT_STYLE: &str = "7";
    /// 文字第二对齐点
    pub const ALIGNMENT_POINT: &str = "11";
    pub const THICKNESS: &str = "39";
    pub const X_SCALE: &str = "41";
    pub const CONSTANT_WIDTH: &str = "43";
    pub const OBLIQUE_ANGLE: &str = "51";
    pub const COLOR: &str = "62";
    pub const HORIZONTAL_JUSTIFICATION: &str = "72";
    pub const VERTICAL_JUSTIFICATION: &str = "73";
    pub const EXTRUSION: &str = "210";
    /// LWPOLYLINE 逐顶点起止宽度，JSON 数组
    pub const VERTEX_WIDTHS: &str = "40:41";
    pub const LINEWEIGHT: &str = "370";
    pub const TRUE_COLOR: &str = "420";
    /// XDATA 以 `1001:<APPID>` 为键
    pub const XDATA_PREFIX: &str = "1001:";
}

/// 可往返的 XDATA 项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
enum XDataValue {
    Str(String),
    Real(f64),
    Distance(f64),
    ScaleFactor(f64),
    Integer(i16),
    Long(i32),
}

impl XDataValue {
    fn from_item(item: &XDataItem) -> Option<Self> {
        Some(match item {
            XDataItem::Str(s) => XDataValue::Str(s.clone()),
            XDataItem::Real(v) => XDataValue::Real(*v),
            XDataItem::Distance(v) => XDataValue::Distance(*v),
            XDataItem::ScaleFactor(v) => XDataValue::ScaleFactor(*v),
            XDataItem::Integer(v) => XDataValue::Integer(*v),
            XDataItem::Long(v) => XDataValue::Long(*v),
            _ => return None,
        })
    }

    fn into_item(self) -> XDataItem {
        match self {
            XDataValue::Str(s) => XDataItem::Str(s),
            XDataValue::Real(v) => XDataItem::Real(v),
            XDataValue::Distance(v) => XDataItem::Distance(v),
            XDataValue::ScaleFactor(v) => XDataItem::ScaleFactor(v),
            XDataValue::Integer(v) => XDataItem::Integer(v),
            XDataValue::Long(v) => XDataItem::Long(v),
        }
    }
}

/// 采集实体的未映射组码；无法携带的 XDATA 项记入 notes
pub fn capture(entity: &Entity, notes: &mut Vec<String>) -> Attributes {
    let mut attrs = Attributes::new();
    capture_common(&entity.common, &mut attrs, notes);

    match &entity.specific {
        EntityType::Line(line) => put_f64(&mut attrs, codes::THICKNESS, line.thickness, 0.0),
        EntityType::Circle(circle) => {
            put_f64(&mut attrs, codes::THICKNESS, circle.thickness, 0.0);
            put_extrusion(&mut attrs, &circle.normal);
        }
        EntityType::Arc(arc) => {
            put_f64(&mut attrs, codes::THICKNESS, arc.thickness, 0.0);
            put_extrusion(&mut attrs, &arc.normal);
        }
        EntityType::LwPolyline(lw) => {
            put_f64(&mut attrs, codes::THICKNESS, lw.thickness, 0.0);
            put_f64(&mut attrs, codes::CONSTANT_WIDTH, lw.constant_width, 0.0);
            put_extrusion(&mut attrs, &lw.extrusion_direction);
            let widths: Vec<[f64; 2]> = lw
                .vertices
                .iter()
                .map(|v| [v.starting_width, v.ending_width])
                .collect();
            if widths.iter().flatten().any(|w| *w != 0.0) {
                match serde_json::to_string(&widths) {
                    Ok(json) => {
                        attrs.insert(codes::VERTEX_WIDTHS.to_string(), json);
                    }
                    Err(e) => notes.push(format!("vertex widths could not be encoded: {e}")),
                }
            }
        }
        EntityType::Polyline(poly) => put_f64(&mut attrs, codes::THICKNESS, poly.thickness, 0.0),
        EntityType::Text(text) => {
            let defaults = dxf::entities::Text::default();
            put_f64(&mut attrs, codes::THICKNESS, text.thickness, defaults.thickness);
            put_f64(
                &mut attrs,
                codes::X_SCALE,
                text.relative_x_scale_factor,
                defaults.relative_x_scale_factor,
            );
            put_f64(&mut attrs, codes::OBLIQUE_ANGLE, text.oblique_angle, defaults.oblique_angle);
            if text.text_style_name != defaults.text_style_name {
                attrs.insert(codes::TEXT_STYLE.to_string(), text.text_style_name.clone());
            }
            put_extrusion(&mut attrs, &text.normal);

            let horizontal = text.horizontal_text_justification as i16;
            if horizontal != defaults.horizontal_text_justification as i16 {
                attrs.insert(codes::HORIZONTAL_JUSTIFICATION.to_string(), horizontal.to_string());
            }
            let vertical = text.vertical_text_justification as i16;
            if vertical != defaults.vertical_text_justification as i16 {
                attrs.insert(codes::VERTICAL_JUSTIFICATION.to_string(), vertical.to_string());
            }
            let p = &text.second_alignment_point;
            if (p.x, p.y, p.z) != (0.0, 0.0, 0.0) {
                attrs.insert(codes::ALIGNMENT_POINT.to_string(), format_triple(p.x, p.y, p.z));
            }
        }
        _ => {}
    }

    attrs
}

fn capture_common(common: &EntityCommon, attrs: &mut Attributes, notes: &mut Vec<String>) {
    let defaults = EntityCommon::default();

    if common.line_type_name != defaults.line_type_name {
        attrs.insert(codes::LINETYPE.to_string(), common.line_type_name.clone());
    }
    if let Some(code) = color_code(&common.color) {
        attrs.insert(codes::COLOR.to_string(), code.to_string());
    }
    if common.lineweight_enum_value != defaults.lineweight_enum_value {
        attrs.insert(
            codes::LINEWEIGHT.to_string(),
            common.lineweight_enum_value.to_string(),
        );
    }
    if common.color_24_bit != defaults.color_24_bit {
        attrs.insert(codes::TRUE_COLOR.to_string(), common.color_24_bit.to_string());
    }

    for xdata in &common.x_data {
        let mut values = Vec::with_capacity(xdata.items.len());
        for item in &xdata.items {
            match XDataValue::from_item(item) {
                Some(v) => values.push(v),
                None => notes.push(format!(
                    "XDATA item for '{}' cannot be carried and was dropped",
                    xdata.application_name
                )),
            }
        }
        match serde_json::to_string(&values) {
            Ok(json) => {
                attrs.insert(
                    format!("{}{}", codes::XDATA_PREFIX, xdata.application_name),
                    json,
                );
            }
            Err(e) => notes.push(format!(
                "XDATA for '{}' could not be encoded: {e}",
                xdata.application_name
            )),
        }
    }
}

fn put_f64(attrs: &mut Attributes, code: &str, value: f64, default: f64) {
    if value != default {
        attrs.insert(code.to_string(), value.to_string());
    }
}

/// 非 +Z 的拉伸方向（镜像圆弧等）
fn put_extrusion(attrs: &mut Attributes, normal: &Vector) {
    if (normal.x, normal.y, normal.z) != (0.0, 0.0, 1.0) {
        attrs.insert(
            codes::EXTRUSION.to_string(),
            format_triple(normal.x, normal.y, normal.z),
        );
    }
}

/// 组码 62：随层不记录，随块为 0，其余为 ACI 索引
fn color_code(color: &Color) -> Option<i16> {
    if color.is_by_layer() {
        None
    } else if color.is_by_block() {
        Some(0)
    } else {
        color.index().map(i16::from)
    }
}

fn color_from_code(code: i16) -> Option<Color> {
    match code {
        0 => Some(Color::by_block()),
        256 => Some(Color::by_layer()),
        _ => u8::try_from(code)
            .ok()
            .filter(|index| *index > 0)
            .map(Color::from_index),
    }
}

fn horizontal_from_code(code: i16) -> Option<HorizontalTextJustification> {
    Some(match code {
        0 => HorizontalTextJustification::Left,
        1 => HorizontalTextJustification::Center,
        2 => HorizontalTextJustification::Right,
        3 => HorizontalTextJustification::Aligned,
        4 => HorizontalTextJustification::Middle,
        5 => HorizontalTextJustification::Fit,
        _ => return None,
    })
}

fn vertical_from_code(code: i16) -> Option<VerticalTextJustification> {
    Some(match code {
        0 => VerticalTextJustification::Baseline,
        1 => VerticalTextJustification::Bottom,
        2 => VerticalTextJustification::Middle,
        3 => VerticalTextJustification::Top,
        _ => return None,
    })
}

fn format_triple(x: f64, y: f64, z: f64) -> String {
    format!("{x},{y},{z}")
}

fn parse_triple(value: &str) -> Option<(f64, f64, f64)> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => Some((*x, *y, *z)),
        _ => None,
    }
}

/// 变换属性中携带的坐标（文字第二对齐点），其余属性不变
pub fn try_map_points<E>(
    attrs: &Attributes,
    mut f: impl FnMut(&Point3<f64>) -> Result<Point3<f64>, E>,
) -> Result<Attributes, E> {
    let mut mapped = attrs.clone();
    if let Some((x, y, z)) = attrs.get(codes::ALIGNMENT_POINT).and_then(|v| parse_triple(v)) {
        let p = f(&Point3::new(x, y, z))?;
        mapped.insert(codes::ALIGNMENT_POINT.to_string(), format_triple(p.x, p.y, p.z));
    }
    Ok(mapped)
}

/// 将属性写回 DXF 实体；无法解析的值跳过并记入 warnings
pub fn apply(attrs: &Attributes, entity: &mut Entity, warnings: &mut Vec<String>) {
    for (code, value) in attrs {
        if let Some(app) = code.strip_prefix(codes::XDATA_PREFIX) {
            match serde_json::from_str::<Vec<XDataValue>>(value) {
                Ok(values) => entity.common.x_data.push(XData {
                    application_name: app.to_string(),
                    items: values.into_iter().map(XDataValue::into_item).collect(),
                }),
                Err(e) => warnings.push(format!("XDATA '{app}' skipped: {e}")),
            }
            continue;
        }

        let applied = match code.as_str() {
            codes::LINETYPE => {
                entity.common.line_type_name = value.clone();
                true
            }
            codes::COLOR => parse(value)
                .and_then(color_from_code)
                .map(|color| entity.common.color = color)
                .is_some(),
            codes::LINEWEIGHT => parse(value)
                .map(|v: i16| entity.common.lineweight_enum_value = v)
                .is_some(),
            codes::TRUE_COLOR => parse(value)
                .map(|v: i32| entity.common.color_24_bit = v)
                .is_some(),
            codes::THICKNESS => parse(value)
                .map(|v: f64| set_thickness(&mut entity.specific, v))
                .is_some(),
            codes::CONSTANT_WIDTH => parse(value)
                .map(|v: f64| {
                    if let EntityType::LwPolyline(lw) = &mut entity.specific {
                        lw.constant_width = v;
                    }
                })
                .is_some(),
            codes::TEXT_STYLE => {
                if let EntityType::Text(text) = &mut entity.specific {
                    text.text_style_name = value.clone();
                }
                true
            }
            codes::X_SCALE => parse(value)
                .map(|v: f64| {
                    if let EntityType::Text(text) = &mut entity.specific {
                        text.relative_x_scale_factor = v;
                    }
                })
                .is_some(),
            codes::EXTRUSION => parse_triple(value)
                .map(|(x, y, z)| set_extrusion(&mut entity.specific, Vector::new(x, y, z)))
                .is_some(),
            codes::VERTEX_WIDTHS => serde_json::from_str::<Vec<[f64; 2]>>(value)
                .ok()
                .map(|widths| set_vertex_widths(&mut entity.specific, &widths))
                .unwrap_or(false),
            codes::HORIZONTAL_JUSTIFICATION => parse(value)
                .and_then(horizontal_from_code)
                .map(|j| {
                    if let EntityType::Text(text) = &mut entity.specific {
                        text.horizontal_text_justification = j;
                    }
                })
                .is_some(),
            codes::VERTICAL_JUSTIFICATION => parse(value)
                .and_then(vertical_from_code)
                .map(|j| {
                    if let EntityType::Text(text) = &mut entity.specific {
                        text.vertical_text_justification = j;
                    }
                })
                .is_some(),
            codes::ALIGNMENT_POINT => parse_triple(value)
                .map(|(x, y, z)| {
                    if let EntityType::Text(text) = &mut entity.specific {
                        text.second_alignment_point = Point::new(x, y, z);
                    }
                })
                .is_some(),
            codes::OBLIQUE_ANGLE => parse(value)
                .map(|v: f64| {
                    if let EntityType::Text(text) = &mut entity.specific {
                        text.oblique_angle = v;
                    }
                })
                .is_some(),
            _ => {
                warnings.push(format!("unknown attribute group code {code} skipped"));
                continue;
            }
        };

        if !applied {
            warnings.push(format!("attribute {code}='{value}' could not be parsed"));
        }
    }
}

fn parse<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

fn set_thickness(specific: &mut EntityType, thickness: f64) {
    match specific {
        EntityType::Line(line) => line.thickness = thickness,
        EntityType::Circle(circle) => circle.thickness = thickness,
        EntityType::Arc(arc) => arc.thickness = thickness,
        EntityType::LwPolyline(lw) => lw.thickness = thickness,
        EntityType::Polyline(poly) => poly.thickness = thickness,
        EntityType::Text(text) => text.thickness = thickness,
        _ => {}
    }
}

fn set_extrusion(specific: &mut EntityType, normal: Vector) {
    match specific {
        EntityType::Circle(circle) => circle.normal = normal,
        EntityType::Arc(arc) => arc.normal = normal,
        EntityType::LwPolyline(lw) => lw.extrusion_direction = normal,
        EntityType::Text(text) => text.normal = normal,
        _ => {}
    }
}

/// 顶点数不一致时不写入
fn set_vertex_widths(specific: &mut EntityType, widths: &[[f64; 2]]) -> bool {
    match specific {
        EntityType::LwPolyline(lw) if lw.vertices.len() == widths.len() => {
            for (vertex, [start, end]) in lw.vertices.iter_mut().zip(widths) {
                vertex.starting_width = *start;
                vertex.ending_width = *end;
            }
            true
        }
        _ => false,
    }
}

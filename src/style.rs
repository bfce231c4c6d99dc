use std::collections::HashMap;

use crate::diag::{Diagnostics, WarningKind};
use crate::gradient::GradientRegistry;
use crate::types::{Align, Color, DashPattern, LineCap, LineJoin, Paint};

/// Attribute lookup by local name, so `xlink:href` style prefixes and
/// namespaced exports both resolve the way a namespace-unaware reader
/// would expect.
pub(crate) fn find_attr<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

/// Merged view over an element's styling: entries of an inline
/// `style="k:v;k2:v2"` declaration win over same-named presentation
/// attributes.
pub(crate) struct Properties<'a, 'input> {
    node: roxmltree::Node<'a, 'input>,
    styles: Option<HashMap<String, String>>,
}

impl<'a, 'input> Properties<'a, 'input> {
    pub fn new(node: roxmltree::Node<'a, 'input>) -> Self {
        let styles = find_attr(node, "style").map(parse_style_declarations);
        Self { node, styles }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        if let Some(styles) = &self.styles {
            if let Some(value) = styles.get(name) {
                return Some(value.as_str());
            }
        }
        find_attr(self.node, name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.attr(name)
    }

    /// Plain float accessor; lengths with units go through
    /// [`unit_float_attr`] instead.
    pub fn float(&self, name: &str) -> Option<f32> {
        self.attr(name).and_then(|v| v.trim().parse::<f32>().ok())
    }

    pub fn color(&self, name: &str) -> Option<Color> {
        self.attr(name).and_then(parse_color)
    }
}

pub(crate) fn parse_style_declarations(style: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for decl in style.split(';') {
        let Some((key, value)) = decl.split_once(':') else {
            continue;
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    map
}

pub(crate) fn parse_url_ref(input: &str) -> Option<String> {
    let s = input.trim();
    if !s.to_ascii_lowercase().starts_with("url(") {
        return None;
    }
    let open = s.find('(')?;
    let close = s.rfind(')')?;
    if close <= open + 1 {
        return None;
    }
    let inner = s[open + 1..close]
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    let id = inner.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Color syntax: `#RGB` (nibble duplication), `#RRGGBB`, `#AARRGGBB`,
/// `rgb()`/`rgba()` functional, and the practical named set. Unknown
/// strings yield `None`; the caller decides the fallback.
pub(crate) fn parse_color(input: &str) -> Option<Color> {
    let v = input.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    let lower = v.to_ascii_lowercase();
    if let Some(inner) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
    {
        return parse_functional_color(inner.strip_suffix(')')?);
    }
    named_color(&lower)
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let r = nibble(0)?;
            let g = nibble(1)?;
            let b = nibble(2)?;
            // Duplicate the nibble rather than scaling: 0xF -> 0xFF.
            Some(Color::rgb(r << 4 | r, g << 4 | g, b << 4 | b))
        }
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_functional_color(inner: &str) -> Option<Color> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |raw: &str| -> Option<u8> {
        if let Some(pct) = raw.strip_suffix('%') {
            let v = pct.trim().parse::<f32>().ok()?;
            return Some((v * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8);
        }
        let v = raw.parse::<i32>().ok()?;
        Some(v.clamp(0, 255) as u8)
    };
    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = match parts.get(3) {
        Some(raw) => {
            let v = raw.parse::<f32>().ok()?;
            (v * 255.0).round().clamp(0.0, 255.0) as u8
        }
        None => 255,
    };
    Some(Color::argb(a, r, g, b))
}

fn named_color(name: &str) -> Option<Color> {
    let rgb = |v: u32| Color::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8);
    let color = match name {
        "black" => rgb(0x000000),
        "white" => rgb(0xFFFFFF),
        "red" => rgb(0xFF0000),
        "green" | "lime" => rgb(0x00FF00),
        "blue" => rgb(0x0000FF),
        "yellow" => rgb(0xFFFF00),
        "cyan" | "aqua" => rgb(0x00FFFF),
        "magenta" | "fuchsia" => rgb(0xFF00FF),
        "gray" | "grey" => rgb(0x888888),
        "darkgray" | "darkgrey" => rgb(0x444444),
        "lightgray" | "lightgrey" => rgb(0xCCCCCC),
        "maroon" => rgb(0x800000),
        "navy" => rgb(0x000080),
        "olive" => rgb(0x808000),
        "purple" => rgb(0x800080),
        "silver" => rgb(0xC0C0C0),
        "teal" => rgb(0x008080),
        "orange" => rgb(0xFFA500),
        _ => return None,
    };
    Some(color)
}

/// Context for resolving lengths with units. `font_size` tracks the
/// active fill paint so `em`/`ex` follow the cascade.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnitContext {
    pub dpi: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
}

impl UnitContext {
    pub fn convert(&self, name: &str, value: &str) -> Option<f32> {
        let v = value.trim();
        let scaled = |suffix: &str, factor: f32| -> Option<f32> {
            let num = v.strip_suffix(suffix)?;
            Some(num.trim().parse::<f32>().ok()? * factor)
        };

        if let Some(r) = scaled("px", 1.0) {
            return Some(r);
        }
        if let Some(r) = scaled("pt", self.dpi / 72.0) {
            return Some(r);
        }
        if let Some(r) = scaled("pc", self.dpi / 6.0) {
            return Some(r);
        }
        if let Some(r) = scaled("cm", self.dpi / 2.54) {
            return Some(r);
        }
        if let Some(r) = scaled("mm", self.dpi / 254.0) {
            return Some(r);
        }
        if let Some(r) = scaled("in", self.dpi) {
            return Some(r);
        }
        if let Some(r) = scaled("em", self.font_size) {
            return Some(r);
        }
        if let Some(r) = scaled("ex", self.font_size / 2.0) {
            return Some(r);
        }
        if let Some(num) = v.strip_suffix('%') {
            let scalar = num.trim().parse::<f32>().ok()?;
            let mult = if name.contains('x') || name == "width" {
                self.width / 100.0
            } else if name.contains('y') || name == "height" {
                self.height / 100.0
            } else {
                // Mixed-axis percentage: width/height average, kept as-is.
                (self.height + self.width) / 2.0
            };
            return Some(scalar * mult);
        }
        v.parse::<f32>().ok()
    }
}

/// Presentation-attribute length with unit conversion (geometry reads:
/// x, y, width, r, font-size, ...). The merged style view is deliberately
/// not consulted here.
pub(crate) fn unit_float_attr(
    node: roxmltree::Node<'_, '_>,
    name: &str,
    units: &UnitContext,
) -> Option<f32> {
    units.convert(name, find_attr(node, name)?)
}

/// Inheritable paint state carried through the walk. Groups push a clone
/// and pop it back, so child mutations can never leak upward.
#[derive(Debug, Clone)]
pub(crate) struct StyleState {
    pub fill_paint: Paint,
    pub fill_set: bool,
    pub stroke_paint: Paint,
    pub stroke_set: bool,
    pub group_opacity: f32,
}

impl StyleState {
    pub fn new() -> Self {
        let fill_paint = Paint::fill();
        let mut stroke_paint = Paint::stroke();
        // Strokes only paint once a width is given somewhere.
        stroke_paint.stroke_width = 0.0;
        Self {
            fill_paint,
            fill_set: false,
            stroke_paint,
            stroke_set: false,
            group_opacity: 1.0,
        }
    }
}

fn apply_color(props: &Properties<'_, '_>, color: Color, fill_mode: bool, state: &mut StyleState) {
    let opacity = props
        .float("opacity")
        .or_else(|| {
            props.float(if fill_mode {
                "fill-opacity"
            } else {
                "stroke-opacity"
            })
        })
        .unwrap_or(1.0);
    let alpha = (255.0 * opacity * state.group_opacity).round().clamp(0.0, 255.0) as u8;
    let paint = if fill_mode {
        &mut state.fill_paint
    } else {
        &mut state.stroke_paint
    };
    paint.color = color.with_alpha(alpha);
}

/// Decides whether the element's fill paints, mutating the inherited fill
/// paint in place. Returns false only for "nothing to paint"; an explicit
/// `fill="none"` paints transparent and still counts.
pub(crate) fn resolve_fill(
    state: &mut StyleState,
    props: &Properties<'_, '_>,
    gradients: &GradientRegistry,
    default_color: Option<Color>,
    diag: &mut Diagnostics,
) -> bool {
    if props.string("display") == Some("none") {
        return false;
    }
    let Some(fill) = props.string("fill") else {
        if state.fill_set {
            return !state.fill_paint.color.is_transparent();
        }
        state.fill_paint.shader = None;
        state.fill_paint.color = default_color.unwrap_or(Color::BLACK);
        return true;
    };

    if let Some(id) = parse_url_ref(fill) {
        match gradients.resolve(&id) {
            Some(shader) => {
                state.fill_paint.shader = Some(shader);
                true
            }
            None => {
                diag.warn(WarningKind::UnresolvedGradientReference, id);
                state.fill_paint.shader = None;
                apply_color(props, Color::BLACK, true, state);
                true
            }
        }
    } else if fill.eq_ignore_ascii_case("none") {
        state.fill_paint.shader = None;
        state.fill_paint.color = Color::TRANSPARENT;
        true
    } else {
        state.fill_paint.shader = None;
        match props.color("fill") {
            Some(color) => {
                apply_color(props, color, true, state);
                true
            }
            None => {
                diag.warn(WarningKind::UnresolvedColor, fill);
                apply_color(props, Color::BLACK, true, state);
                true
            }
        }
    }
}

/// Stroke counterpart of [`resolve_fill`]. A stroke never paints while
/// its resolved width is zero or negative.
pub(crate) fn resolve_stroke(
    state: &mut StyleState,
    props: &Properties<'_, '_>,
    default_color: Option<Color>,
    diag: &mut Diagnostics,
) -> bool {
    if props.string("display") == Some("none") {
        return false;
    }

    let width = props.float("stroke-width");
    if let Some(w) = width {
        state.stroke_paint.stroke_width = w;
    }
    if state.stroke_paint.stroke_width <= 0.0 {
        return false;
    }

    match props.string("stroke-linecap").map(str::trim) {
        Some("round") => state.stroke_paint.line_cap = LineCap::Round,
        Some("square") => state.stroke_paint.line_cap = LineCap::Square,
        Some("butt") => state.stroke_paint.line_cap = LineCap::Butt,
        _ => {}
    }
    match props.string("stroke-linejoin").map(str::trim) {
        Some("miter") => state.stroke_paint.line_join = LineJoin::Miter,
        Some("round") => state.stroke_paint.line_join = LineJoin::Round,
        Some("bevel") => state.stroke_paint.line_join = LineJoin::Bevel,
        _ => {}
    }

    apply_dash(
        &mut state.stroke_paint,
        props.string("stroke-dasharray"),
        props.string("stroke-dashoffset"),
    );

    let Some(stroke) = props.attr("stroke") else {
        if state.stroke_set {
            return !state.stroke_paint.color.is_transparent();
        }
        if width.is_some() {
            if let Some(color) = default_color {
                state.stroke_paint.color = color;
                return true;
            }
        }
        state.stroke_paint.color = Color::TRANSPARENT;
        return false;
    };

    if stroke.eq_ignore_ascii_case("none") {
        state.stroke_paint.color = Color::TRANSPARENT;
        return false;
    }
    match props.color("stroke") {
        Some(color) => {
            apply_color(props, color, false, state);
            true
        }
        None => {
            diag.warn(WarningKind::UnresolvedColor, stroke);
            state.stroke_paint.color = Color::TRANSPARENT;
            false
        }
    }
}

/// stroke-dasharray / stroke-dashoffset. An odd interval list repeats
/// itself, and the offset wraps at the pattern length. A token that fails
/// to parse repeats the previous value.
fn apply_dash(paint: &mut Paint, dash: Option<&str>, offset: Option<&str>) {
    let Some(dash) = dash else {
        return;
    };
    if dash.trim() == "none" {
        paint.dash = None;
        return;
    }

    let mut intervals = Vec::new();
    let mut current = 1.0f32;
    for token in dash
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
    {
        current = token.parse::<f32>().unwrap_or(current);
        intervals.push(current);
    }
    if intervals.is_empty() {
        paint.dash = None;
        return;
    }
    if intervals.len() % 2 == 1 {
        let dup = intervals.clone();
        intervals.extend(dup);
    }

    let total: f32 = intervals.iter().sum();
    let mut off = offset
        .and_then(|o| o.trim().parse::<f32>().ok())
        .unwrap_or(0.0);
    off = if total > 0.0 { off % total } else { 0.0 };

    paint.dash = Some(DashPattern {
        intervals,
        offset: off,
    });
}

/// Text presentation attributes: font-size (unit converted), font
/// style/weight, text-anchor. Reads presentation attributes only.
pub(crate) fn apply_text_attrs(
    node: roxmltree::Node<'_, '_>,
    units: &UnitContext,
    paint: &mut Paint,
) {
    if find_attr(node, "display") == Some("none") {
        return;
    }
    if find_attr(node, "font-size").is_some() {
        paint.text_size = unit_float_attr(node, "font-size", units).unwrap_or(10.0);
    }
    let family = find_attr(node, "font-family");
    let style = find_attr(node, "font-style");
    let weight = find_attr(node, "font-weight");
    if family.is_some() || style.is_some() || weight.is_some() {
        paint.italic = style == Some("italic");
        paint.bold = weight == Some("bold");
    }
    match find_attr(node, "text-anchor") {
        Some("middle") => paint.text_align = Align::Center,
        Some("end") => paint.text_align = Align::Right,
        Some(_) => paint.text_align = Align::Left,
        None => {}
    }
}

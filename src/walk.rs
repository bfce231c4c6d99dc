use std::collections::{HashMap, HashSet};

use base64::Engine as _;

use crate::bounds::BoundsTracker;
use crate::canvas::{Canvas, Picture};
use crate::diag::{Diagnostics, Warning, WarningKind};
use crate::error::PictorError;
use crate::gradient::{Gradient, GradientKind, GradientRegistry};
use crate::imagedec::ImageDecoder;
use crate::number::parse_number_list;
use crate::path::{PathGeometry, PathSeg, parse_path_data};
use crate::style::{
    self, Properties, StyleState, UnitContext, find_attr, parse_color, unit_float_attr,
};
use crate::transform::{Matrix, parse_transform};
use crate::types::{Color, Paint, Rect};

/// Id of the reserved marker group that declares explicit bounds.
const BOUNDS_MARKER_ID: &str = "bounds";

pub(crate) struct WalkOptions<'a> {
    pub dpi: f32,
    pub default_color: Option<Color>,
    pub decoder: &'a dyn ImageDecoder,
}

pub(crate) struct WalkOutput {
    pub picture: Picture,
    pub declared_bounds: Option<Rect>,
    pub computed_limits: Option<Rect>,
    pub warnings: Vec<Warning>,
}

/// Runs one full pass over an SVG document and returns the recorded
/// picture plus bounds metadata. Only malformed XML and malformed
/// numerals abort; everything else degrades with a warning.
pub(crate) fn walk_document(xml: &str, options: WalkOptions<'_>) -> Result<WalkOutput, PictorError> {
    let doc = roxmltree::Document::parse(xml)?;
    let id_index = build_id_index(&doc);

    let mut walker = DocumentWalker {
        canvas: Canvas::new(0, 0),
        bounds: BoundsTracker::new(),
        gradients: GradientRegistry::new(),
        diag: Diagnostics::new(),
        style: StyleState::new(),
        style_stack: Vec::new(),
        frames: Vec::new(),
        hidden_depth: 0,
        bounds_mode: false,
        defs_mode: false,
        gradient: None,
        text: None,
        active_use_ids: HashSet::new(),
        id_index,
        dpi: options.dpi,
        default_color: options.default_color,
        decoder: options.decoder,
    };

    walker.emit_subtree(doc.root_element())?;

    Ok(WalkOutput {
        picture: walker.canvas.finish(),
        declared_bounds: walker.bounds.declared(),
        computed_limits: walker.bounds.limits(),
        warnings: walker.diag.into_warnings(),
    })
}

fn build_id_index<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> HashMap<String, roxmltree::Node<'a, 'input>> {
    let mut out = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if let Some(id) = find_attr(node, "id") {
            // First definition wins.
            out.entry(id.to_string()).or_insert(node);
        }
    }
    out
}

/// The generic traversal events the walker consumes. The tree source is
/// an implementation detail; the state machine only sees begin/text/end.
enum XmlEvent<'a, 'input> {
    ElementStart(roxmltree::Node<'a, 'input>),
    Text(&'a str),
    ElementEnd,
}

/// Records what an element's start event pushed, so its end event can
/// undo exactly that — mismatched or unexpected closing tags can never
/// unbalance the stacks.
#[derive(Debug, Default)]
struct Frame {
    pushed_canvas_save: bool,
    pushed_style: bool,
    bumped_hidden: bool,
    started_bounds_mode: bool,
    started_defs: bool,
    started_gradient: bool,
    started_text: bool,
}

struct DocumentWalker<'a, 'input> {
    canvas: Canvas,
    bounds: BoundsTracker,
    gradients: GradientRegistry,
    diag: Diagnostics,

    style: StyleState,
    style_stack: Vec<StyleState>,
    frames: Vec<Frame>,

    hidden_depth: u32,
    bounds_mode: bool,
    defs_mode: bool,
    gradient: Option<Gradient>,
    text: Option<TextElement>,
    active_use_ids: HashSet<String>,

    id_index: HashMap<String, roxmltree::Node<'a, 'input>>,
    dpi: f32,
    default_color: Option<Color>,
    decoder: &'a dyn ImageDecoder,
}

impl<'a, 'input> DocumentWalker<'a, 'input> {
    fn emit_subtree(&mut self, node: roxmltree::Node<'a, 'input>) -> Result<(), PictorError> {
        let descend = self.dispatch(XmlEvent::ElementStart(node))?;
        if descend {
            for child in node.children() {
                if child.is_element() {
                    self.emit_subtree(child)?;
                } else if child.is_text() {
                    if let Some(text) = child.text() {
                        self.dispatch(XmlEvent::Text(text))?;
                    }
                }
            }
        }
        self.dispatch(XmlEvent::ElementEnd)?;
        Ok(())
    }

    fn dispatch(&mut self, event: XmlEvent<'a, 'input>) -> Result<bool, PictorError> {
        match event {
            XmlEvent::ElementStart(node) => self.element_start(node),
            XmlEvent::Text(text) => {
                self.text_chunk(text);
                Ok(true)
            }
            XmlEvent::ElementEnd => {
                self.element_end();
                Ok(true)
            }
        }
    }

    fn units(&self) -> UnitContext {
        UnitContext {
            dpi: self.dpi,
            width: self.canvas.width() as f32,
            height: self.canvas.height() as f32,
            font_size: self.style.fill_paint.text_size,
        }
    }

    fn length(&self, node: roxmltree::Node<'_, '_>, name: &str) -> Option<f32> {
        unit_float_attr(node, name, &self.units())
    }

    fn push_transform(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let matrix = match find_attr(node, "transform") {
            Some(raw) => parse_transform(raw, &mut self.diag)?,
            None => Matrix::IDENTITY,
        };
        self.canvas.save();
        self.canvas.concat(matrix);
        Ok(())
    }

    fn element_start(
        &mut self,
        node: roxmltree::Node<'a, 'input>,
    ) -> Result<bool, PictorError> {
        let name = node.tag_name().name();
        let mut frame = Frame::default();

        // Paint alpha is only sticky while an ancestor actually set the
        // paint; otherwise it resets at every element.
        if !self.style.stroke_set {
            self.style.stroke_paint.set_alpha(255);
        }
        if !self.style.fill_set {
            self.style.fill_paint.set_alpha(255);
        }

        // Inside the marker group only rects matter, and they only feed
        // the declared-bounds rect.
        if self.bounds_mode {
            if name == "rect" {
                let x = self.length(node, "x").unwrap_or(0.0);
                let y = self.length(node, "y").unwrap_or(0.0);
                let width = self.length(node, "width").unwrap_or(0.0);
                let height = self.length(node, "height").unwrap_or(0.0);
                self.bounds.set_declared(Rect::from_xywh(x, y, width, height));
            }
            self.frames.push(frame);
            return Ok(true);
        }

        // Gradient definitions register even under defs suppression.
        match name {
            "linearGradient" => {
                self.gradient_start(node, GradientKind::Linear)?;
                frame.started_gradient = true;
                self.frames.push(frame);
                return Ok(true);
            }
            "radialGradient" => {
                self.gradient_start(node, GradientKind::Radial)?;
                frame.started_gradient = true;
                self.frames.push(frame);
                return Ok(true);
            }
            "stop" => {
                self.gradient_stop(node);
                self.frames.push(frame);
                return Ok(true);
            }
            _ => {}
        }

        if self.defs_mode {
            self.frames.push(frame);
            return Ok(true);
        }
        if name == "defs" {
            self.defs_mode = true;
            frame.started_defs = true;
            self.frames.push(frame);
            return Ok(true);
        }

        match name {
            "svg" => self.svg_start(node)?,
            "g" => self.group_start(node, &mut frame)?,
            "use" => {
                if self.hidden_depth == 0 {
                    self.use_element(node)?;
                }
                self.frames.push(frame);
                return Ok(false);
            }
            "rect" if self.hidden_depth == 0 => self.rect_element(node)?,
            "circle" if self.hidden_depth == 0 => self.circle_element(node)?,
            "ellipse" if self.hidden_depth == 0 => self.ellipse_element(node)?,
            "line" if self.hidden_depth == 0 => self.line_element(node)?,
            "polygon" if self.hidden_depth == 0 => self.poly_element(node, true)?,
            "polyline" if self.hidden_depth == 0 => self.poly_element(node, false)?,
            "path" if self.hidden_depth == 0 => self.path_element(node)?,
            "image" if self.hidden_depth == 0 => self.image_element(node)?,
            "text" if self.hidden_depth == 0 => self.text_start(node, &mut frame)?,
            "rect" | "circle" | "ellipse" | "line" | "polygon" | "polyline" | "path" | "image"
            | "text" => {
                // Hidden shape: skipped entirely, subtree still traversed.
            }
            _ => {
                if self.hidden_depth == 0 {
                    self.diag.warn(WarningKind::UnrecognizedElement, name);
                }
            }
        }

        self.frames.push(frame);
        Ok(true)
    }

    fn element_end(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if frame.started_gradient {
            if let Some(gradient) = self.gradient.take() {
                self.gradients.define(gradient);
            }
        }
        if frame.started_text {
            if let Some(text) = self.text.take() {
                if self.hidden_depth == 0 {
                    text.render(&mut self.canvas);
                }
            }
        }
        if frame.started_defs {
            self.defs_mode = false;
        }
        if frame.started_bounds_mode {
            self.bounds_mode = false;
        }
        if frame.bumped_hidden {
            self.hidden_depth = self.hidden_depth.saturating_sub(1);
        }
        if frame.pushed_style {
            if let Some(previous) = self.style_stack.pop() {
                self.style = previous;
            }
        }
        if frame.pushed_canvas_save {
            self.canvas.restore();
        }
    }

    fn text_chunk(&mut self, chunk: &str) {
        if let Some(text) = &mut self.text {
            text.append(chunk);
        }
    }

    /// The recording scope: declared width/height, falling back to the
    /// viewBox dimensions when they are zero or absent.
    fn svg_start(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let mut width = libm::ceilf(self.length(node, "width").unwrap_or(0.0)) as i64;
        let mut height = libm::ceilf(self.length(node, "height").unwrap_or(0.0)) as i64;
        if width == 0 || height == 0 {
            if let Some(raw) = find_attr(node, "viewBox") {
                let nums = parse_number_list(raw)?;
                if nums.len() >= 4 && nums[0] < nums[2] && nums[1] < nums[3] {
                    width = (nums[2] - nums[0]).round() as i64;
                    height = (nums[3] - nums[1]).round() as i64;
                }
            }
        }
        self.canvas = Canvas::new(width.max(0) as u32, height.max(0) as u32);
        Ok(())
    }

    fn group_start(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        frame: &mut Frame,
    ) -> Result<(), PictorError> {
        if find_attr(node, "id").is_some_and(|id| id.eq_ignore_ascii_case(BOUNDS_MARKER_ID)) {
            self.bounds_mode = true;
            frame.started_bounds_mode = true;
        }

        if self.hidden_depth > 0 {
            // Already hidden: count the nesting, don't re-enter.
            self.hidden_depth += 1;
            frame.bumped_hidden = true;
        } else if find_attr(node, "display") == Some("none") {
            self.hidden_depth = 1;
            frame.bumped_hidden = true;
        }

        self.push_transform(node)?;
        frame.pushed_canvas_save = true;

        self.style_stack.push(self.style.clone());
        frame.pushed_style = true;

        let units = self.units();
        if let Some(opacity) = unit_float_attr(node, "opacity", &units) {
            self.style.group_opacity *= opacity;
        }
        style::apply_text_attrs(node, &units, &mut self.style.fill_paint);
        style::apply_text_attrs(node, &units, &mut self.style.stroke_paint);

        let props = Properties::new(node);
        let _ = style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        );
        let _ = style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag);
        self.style.fill_set |= props.string("fill").is_some();
        self.style.stroke_set |= props.string("stroke").is_some();
        Ok(())
    }

    /// Resolves a `use` reference by re-walking the referenced subtree
    /// under a synthesized group that applies the reference's transform
    /// and position. An in-progress id set fails closed on cycles.
    fn use_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        if find_attr(node, "display") == Some("none") {
            return Ok(());
        }
        let Some(href) = find_attr(node, "href") else {
            self.diag
                .warn(WarningKind::UnresolvedUseReference, "missing href");
            return Ok(());
        };
        let Some(id) = href.trim().strip_prefix('#').filter(|id| !id.is_empty()) else {
            self.diag.warn(WarningKind::UnresolvedUseReference, href);
            return Ok(());
        };
        if !self.active_use_ids.insert(id.to_string()) {
            self.diag.warn(
                WarningKind::UnresolvedUseReference,
                format!("reference cycle through #{id}"),
            );
            return Ok(());
        }
        let Some(target) = self.id_index.get(id).copied() else {
            self.active_use_ids.remove(id);
            self.diag.warn(WarningKind::UnresolvedUseReference, id);
            return Ok(());
        };

        // Synthesized wrapper: the reference's own transform first, then
        // its x/y as a translate.
        let mut matrix = match find_attr(node, "transform") {
            Some(raw) => parse_transform(raw, &mut self.diag)?,
            None => Matrix::IDENTITY,
        };
        let x = find_attr(node, "x").and_then(|v| v.trim().parse::<f32>().ok());
        let y = find_attr(node, "y").and_then(|v| v.trim().parse::<f32>().ok());
        if x.is_some() || y.is_some() {
            matrix = matrix.mul(Matrix::translate(x.unwrap_or(0.0), y.unwrap_or(0.0)));
        }
        self.canvas.save();
        self.canvas.concat(matrix);
        self.style_stack.push(self.style.clone());

        // Residual styling on the reference cascades like group styling.
        let units = self.units();
        if let Some(opacity) = unit_float_attr(node, "opacity", &units) {
            self.style.group_opacity *= opacity;
        }
        style::apply_text_attrs(node, &units, &mut self.style.fill_paint);
        style::apply_text_attrs(node, &units, &mut self.style.stroke_paint);
        let props = Properties::new(node);
        let _ = style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        );
        let _ = style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag);
        self.style.fill_set |= props.string("fill").is_some();
        self.style.stroke_set |= props.string("stroke").is_some();

        let result = self.emit_subtree(target);

        if let Some(previous) = self.style_stack.pop() {
            self.style = previous;
        }
        self.canvas.restore();
        self.active_use_ids.remove(id);
        result
    }

    fn rect_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let x = self.length(node, "x").unwrap_or(0.0);
        let y = self.length(node, "y").unwrap_or(0.0);
        let (Some(width), Some(height)) = (self.length(node, "width"), self.length(node, "height"))
        else {
            return Ok(());
        };
        let rx = self.length(node, "rx").unwrap_or(0.0);
        let ry = self.length(node, "ry").unwrap_or(0.0);

        self.push_transform(node)?;
        let props = Properties::new(node);
        if style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        ) {
            self.bounds.include_rect(&Rect::from_xywh(x, y, width, height));
            if rx <= 0.0 && ry <= 0.0 {
                self.canvas
                    .draw_rect(x, y, width, height, &self.style.fill_paint);
            } else {
                self.canvas
                    .draw_round_rect(x, y, width, height, rx, ry, &self.style.fill_paint);
            }
        }
        if style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag) {
            if rx <= 0.0 && ry <= 0.0 {
                self.canvas
                    .draw_rect(x, y, width, height, &self.style.stroke_paint);
            } else {
                self.canvas
                    .draw_round_rect(x, y, width, height, rx, ry, &self.style.stroke_paint);
            }
        }
        self.canvas.restore();
        Ok(())
    }

    fn circle_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let (Some(cx), Some(cy), Some(radius)) = (
            self.length(node, "cx"),
            self.length(node, "cy"),
            self.length(node, "r"),
        ) else {
            return Ok(());
        };

        self.push_transform(node)?;
        let props = Properties::new(node);
        if style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        ) {
            self.bounds.include_point(cx - radius, cy - radius);
            self.bounds.include_point(cx + radius, cy + radius);
            self.canvas.draw_circle(cx, cy, radius, &self.style.fill_paint);
        }
        if style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag) {
            self.canvas
                .draw_circle(cx, cy, radius, &self.style.stroke_paint);
        }
        self.canvas.restore();
        Ok(())
    }

    fn ellipse_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let (Some(cx), Some(cy), Some(rx), Some(ry)) = (
            self.length(node, "cx"),
            self.length(node, "cy"),
            self.length(node, "rx"),
            self.length(node, "ry"),
        ) else {
            return Ok(());
        };

        self.push_transform(node)?;
        let props = Properties::new(node);
        if style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        ) {
            self.bounds.include_point(cx - rx, cy - ry);
            self.bounds.include_point(cx + rx, cy + ry);
            self.canvas
                .draw_ellipse(cx, cy, rx, ry, &self.style.fill_paint);
        }
        if style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag) {
            self.canvas
                .draw_ellipse(cx, cy, rx, ry, &self.style.stroke_paint);
        }
        self.canvas.restore();
        Ok(())
    }

    fn line_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let x1 = self.length(node, "x1").unwrap_or(0.0);
        let y1 = self.length(node, "y1").unwrap_or(0.0);
        let x2 = self.length(node, "x2").unwrap_or(0.0);
        let y2 = self.length(node, "y2").unwrap_or(0.0);

        let props = Properties::new(node);
        if style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag) {
            self.push_transform(node)?;
            self.bounds.include_point(x1, y1);
            self.bounds.include_point(x2, y2);
            self.canvas
                .draw_line(x1, y1, x2, y2, &self.style.stroke_paint);
            self.canvas.restore();
        }
        Ok(())
    }

    fn poly_element(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        close: bool,
    ) -> Result<(), PictorError> {
        let Some(raw) = find_attr(node, "points") else {
            return Ok(());
        };
        let numbers = parse_number_list(raw)?;
        if numbers.len() < 2 {
            return Ok(());
        }

        let mut geometry = PathGeometry::default();
        let mut pairs = numbers.chunks_exact(2);
        if let Some(first) = pairs.next() {
            geometry.segs.push(PathSeg::MoveTo {
                x: first[0],
                y: first[1],
            });
        }
        for pair in pairs {
            geometry.segs.push(PathSeg::LineTo {
                x: pair[0],
                y: pair[1],
            });
        }
        // A polyline stays open.
        if close {
            geometry.segs.push(PathSeg::Close);
        }

        self.push_transform(node)?;
        let props = Properties::new(node);
        if style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        ) {
            if let Some(bounds) = geometry.bounds() {
                self.bounds.include_rect(&bounds);
            }
            self.canvas.draw_path(geometry.clone(), &self.style.fill_paint);
        }
        if style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag) {
            self.canvas.draw_path(geometry, &self.style.stroke_paint);
        }
        self.canvas.restore();
        Ok(())
    }

    fn path_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let Some(d) = find_attr(node, "d") else {
            return Ok(());
        };
        let geometry = parse_path_data(d, &mut self.diag)?;

        self.push_transform(node)?;
        let props = Properties::new(node);
        if style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        ) {
            if let Some(bounds) = geometry.bounds() {
                self.bounds.include_rect(&bounds);
            }
            self.canvas.draw_path(geometry.clone(), &self.style.fill_paint);
        }
        if style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag) {
            self.canvas.draw_path(geometry, &self.style.stroke_paint);
        }
        self.canvas.restore();
        Ok(())
    }

    /// Inline raster images only: a `data:` URI with base64 payload,
    /// routed through the configured decoder.
    fn image_element(&mut self, node: roxmltree::Node<'_, '_>) -> Result<(), PictorError> {
        let href = find_attr(node, "href").unwrap_or("");
        let Some(comma) = href
            .starts_with("data")
            .then(|| href.find(','))
            .flatten()
            .filter(|_| href.contains("base64"))
        else {
            self.diag.warn(
                WarningKind::UnsupportedImageSource,
                href.chars().take(64).collect::<String>(),
            );
            return Ok(());
        };

        let x = self.length(node, "x").unwrap_or(0.0);
        let y = self.length(node, "y").unwrap_or(0.0);
        let width = self.length(node, "width").unwrap_or(0.0);
        let height = self.length(node, "height").unwrap_or(0.0);

        self.push_transform(node)?;
        self.bounds.include_rect(&Rect::from_xywh(x, y, width, height));

        let payload: String = href[comma + 1..]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match base64::engine::general_purpose::STANDARD.decode(payload.as_bytes()) {
            Ok(bytes) => match self.decoder.decode(&bytes) {
                Some(image) => self.canvas.draw_image(x, y, width, height, image),
                None => self
                    .diag
                    .warn(WarningKind::ImageDecode, "undecodable image payload"),
            },
            Err(err) => self.diag.warn(WarningKind::ImageDecode, err.to_string()),
        }
        self.canvas.restore();
        Ok(())
    }

    fn text_start(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        frame: &mut Frame,
    ) -> Result<(), PictorError> {
        self.push_transform(node)?;
        frame.pushed_canvas_save = true;
        frame.started_text = true;

        let units = self.units();
        let x = unit_float_attr(node, "x", &units).unwrap_or(0.0);
        let y = unit_float_attr(node, "y", &units).unwrap_or(0.0);

        let props = Properties::new(node);
        let fill = style::resolve_fill(
            &mut self.style,
            &props,
            &self.gradients,
            self.default_color,
            &mut self.diag,
        )
        .then(|| {
            let mut paint = self.style.fill_paint.clone();
            style::apply_text_attrs(node, &units, &mut paint);
            paint
        });
        let stroke = style::resolve_stroke(&mut self.style, &props, self.default_color, &mut self.diag)
            .then(|| {
                let mut paint = self.style.stroke_paint.clone();
                style::apply_text_attrs(node, &units, &mut paint);
                paint
            });

        let valign = match find_attr(node, "alignment-baseline") {
            Some("middle") => VAlign::Middle,
            Some("top") => VAlign::Top,
            _ => VAlign::Baseline,
        };

        self.text = Some(TextElement {
            x,
            y,
            text: String::new(),
            fill,
            stroke,
            valign,
        });
        Ok(())
    }

    fn gradient_start(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        kind: GradientKind,
    ) -> Result<(), PictorError> {
        let mut gradient = Gradient::new(kind);
        gradient.id = find_attr(node, "id").map(String::from);
        let units = self.units();
        match kind {
            GradientKind::Linear => {
                gradient.x1 = unit_float_attr(node, "x1", &units);
                gradient.y1 = unit_float_attr(node, "y1", &units);
                gradient.x2 = unit_float_attr(node, "x2", &units);
                gradient.y2 = unit_float_attr(node, "y2", &units);
            }
            GradientKind::Radial => {
                gradient.cx = unit_float_attr(node, "cx", &units);
                gradient.cy = unit_float_attr(node, "cy", &units);
                gradient.radius = unit_float_attr(node, "r", &units);
            }
        }
        if let Some(raw) = find_attr(node, "gradientTransform") {
            gradient.matrix = Some(parse_transform(raw, &mut self.diag)?);
        }
        if let Some(href) = find_attr(node, "href") {
            let href = href.trim();
            let id = href.strip_prefix('#').unwrap_or(href);
            if !id.is_empty() {
                gradient.parent_id = Some(id.to_string());
            }
        }
        self.gradient = Some(gradient);
        Ok(())
    }

    fn gradient_stop(&mut self, node: roxmltree::Node<'_, '_>) {
        let units = self.units();
        let offset = unit_float_attr(node, "offset", &units).unwrap_or(0.0);
        let props = Properties::new(node);

        let mut color = match props.string("stop-color") {
            Some(raw) => {
                let raw = raw.trim();
                parse_color(raw)
                    .or_else(|| bare_hex_color(raw))
                    .unwrap_or_else(|| {
                        self.diag.warn(WarningKind::UnresolvedColor, raw);
                        Color::BLACK
                    })
            }
            None => Color::BLACK,
        };
        color.a = match props.float("stop-opacity") {
            Some(opacity) => (255.0 * opacity).round().clamp(0.0, 255.0) as u8,
            None => 255,
        };

        if let Some(gradient) = &mut self.gradient {
            gradient.stops.push(crate::types::GradientStop { offset, color });
        }
    }
}

/// Hex digits with no `#` prefix, accepted in stop-color declarations.
fn bare_hex_color(raw: &str) -> Option<Color> {
    if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        let v = u32::from_str_radix(raw, 16).ok()?;
        return Some(Color::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8));
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VAlign {
    Baseline,
    Middle,
    Top,
}

/// Accumulates character data for one text element and emits fill-then-
/// stroke ops when it closes. The vertical-alignment adjustment is
/// recomputed as characters arrive, from approximate metrics (no font
/// loading here).
struct TextElement {
    x: f32,
    y: f32,
    text: String,
    fill: Option<Paint>,
    stroke: Option<Paint>,
    valign: VAlign,
}

impl TextElement {
    fn append(&mut self, chunk: &str) {
        let had_text = !self.text.is_empty();
        self.text.push_str(chunk);
        if self.valign == VAlign::Baseline || had_text {
            return;
        }
        let Some(paint) = self.stroke.as_ref().or(self.fill.as_ref()) else {
            return;
        };
        let ascent = 0.8 * paint.text_size;
        self.y += match self.valign {
            VAlign::Middle => ascent / 2.0,
            VAlign::Top => ascent,
            VAlign::Baseline => 0.0,
        };
    }

    fn render(&self, canvas: &mut Canvas) {
        if self.text.is_empty() {
            return;
        }
        if let Some(fill) = &self.fill {
            canvas.draw_text(self.x, self.y, self.text.as_str(), fill);
        }
        if let Some(stroke) = &self.stroke {
            canvas.draw_text(self.x, self.y, self.text.as_str(), stroke);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    use crate::canvas::DrawOp;
    use crate::imagedec::DefaultImageDecoder;
    use crate::types::Shader;

    fn walk(xml: &str) -> WalkOutput {
        walk_document(
            xml,
            WalkOptions {
                dpi: 72.0,
                default_color: None,
                decoder: &DefaultImageDecoder,
            },
        )
        .expect("walk failed")
    }

    fn shape_ops(picture: &Picture) -> Vec<&DrawOp> {
        picture
            .ops
            .iter()
            .filter(|op| !matches!(op, DrawOp::Save | DrawOp::Concat(_) | DrawOp::Restore))
            .collect()
    }

    fn save_restore_balance(picture: &Picture) -> (usize, usize) {
        let saves = picture.ops.iter().filter(|op| matches!(op, DrawOp::Save)).count();
        let restores = picture
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Restore))
            .count();
        (saves, restores)
    }

    #[test]
    fn viewbox_sizes_the_recording_when_dimensions_are_absent() {
        let out = walk(r##"<svg viewBox="0 0 320 240"></svg>"##);
        assert_eq!(out.picture.width, 320);
        assert_eq!(out.picture.height, 240);
    }

    #[test]
    fn triangle_path_limits() {
        let out = walk(
            r##"<svg width="500" height="500"><path d="M250,150L150,350L350,350Z"/></svg>"##,
        );
        let limits = out.computed_limits.unwrap();
        assert_eq!(
            (limits.left, limits.top, limits.right, limits.bottom),
            (150.0, 150.0, 350.0, 350.0)
        );
        let shapes = shape_ops(&out.picture);
        assert_eq!(shapes.len(), 1);
        assert!(matches!(shapes[0], DrawOp::Path { .. }));
    }

    #[test]
    fn fill_inherits_through_groups_and_none_overrides_locally() {
        let out = walk(
            r##"<svg width="100" height="100">
              <g fill="#ff0000">
                <rect width="10" height="10"/>
                <g fill="none"><rect width="10" height="10"/></g>
                <g><rect width="10" height="10"/></g>
              </g>
            </svg>"##,
        );
        let rects: Vec<&DrawOp> = shape_ops(&out.picture);
        assert_eq!(rects.len(), 2, "the fill=none subtree paints nothing");
        for op in rects {
            let DrawOp::Rect { paint, .. } = op else {
                panic!("expected rect ops");
            };
            assert_eq!(paint.color, Color::rgb(255, 0, 0));
        }
    }

    #[test]
    fn hidden_subtree_draws_nothing_and_balances() {
        let out = walk(
            r##"<svg width="50" height="50">
              <g display="none">
                <rect width="10" height="10"/>
                <g><circle cx="5" cy="5" r="3"/></g>
              </g>
            </svg>"##,
        );
        assert!(shape_ops(&out.picture).is_empty());
        assert!(out.computed_limits.is_none());
        let (saves, restores) = save_restore_balance(&out.picture);
        assert_eq!(saves, restores);
    }

    #[test]
    fn bounds_marker_group_feeds_declared_bounds_only() {
        let out = walk(
            r##"<svg width="50" height="50">
              <g id="Bounds">
                <g><rect x="1" y="2" width="3" height="4"/></g>
                <rect x="5" y="6" width="7" height="8"/>
              </g>
              <rect width="10" height="10"/>
            </svg>"##,
        );
        // Later rects overwrite, nested group ends don't leave the mode.
        assert_eq!(out.declared_bounds, Some(Rect::new(5.0, 6.0, 12.0, 14.0)));
        assert_eq!(shape_ops(&out.picture).len(), 1, "marker content never draws");
        let limits = out.computed_limits.unwrap();
        assert_eq!((limits.right, limits.bottom), (10.0, 10.0));
        let (saves, restores) = save_restore_balance(&out.picture);
        assert_eq!(saves, restores);
    }

    #[test]
    fn defs_suppress_drawing_but_register_gradients() {
        let out = walk(
            r##"<svg width="20" height="20">
              <defs>
                <linearGradient id="g1">
                  <stop offset="0" stop-color="#00ff00"/>
                  <stop offset="1" style="stop-color:#0000ff;stop-opacity:0.5"/>
                </linearGradient>
                <rect width="9" height="9"/>
              </defs>
              <rect width="10" height="10" fill="url(#g1)"/>
            </svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        assert_eq!(shapes.len(), 1, "defs content itself never draws");
        let DrawOp::Rect { paint, .. } = shapes[0] else {
            panic!("expected rect");
        };
        let Some(Shader::Linear { stops, .. }) = &paint.shader else {
            panic!("expected linear shader fill");
        };
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].color, Color::rgb(0, 255, 0));
        assert_eq!(stops[1].offset, 1.0);
        assert_eq!(stops[1].color.a, 128);
    }

    #[test]
    fn radial_gradient_inherits_linear_stops_via_href() {
        let out = walk(
            r##"<svg width="20" height="20" xmlns:xlink="http://www.w3.org/1999/xlink">
              <defs>
                <linearGradient id="base"><stop offset="0" stop-color="#102030"/></linearGradient>
                <radialGradient id="child" xlink:href="#base" cx="5" cy="5" r="4"/>
              </defs>
              <rect width="10" height="10" fill="url(#child)"/>
            </svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        let DrawOp::Rect { paint, .. } = shapes[0] else {
            panic!("expected rect");
        };
        let Some(Shader::Radial { stops, radius, .. }) = &paint.shader else {
            panic!("expected radial shader");
        };
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].color, Color::rgb(0x10, 0x20, 0x30));
        assert_eq!(*radius, 4.0);
    }

    #[test]
    fn missing_gradient_falls_back_to_black_with_warning() {
        let out = walk(
            r##"<svg width="20" height="20"><rect width="10" height="10" fill="url(#ghost)"/></svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        let DrawOp::Rect { paint, .. } = shapes[0] else {
            panic!("expected rect");
        };
        assert!(paint.shader.is_none());
        assert_eq!(paint.color, Color::BLACK);
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == WarningKind::UnresolvedGradientReference)
        );
    }

    #[test]
    fn use_applies_position_and_draws_the_target() {
        let out = walk(
            r##"<svg width="40" height="20">
              <defs><g id="icon"><rect width="10" height="10" fill="#ff0000"/></g></defs>
              <use href="#icon" x="2" y="3"/>
            </svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        assert_eq!(shapes.len(), 1);
        assert!(matches!(shapes[0], DrawOp::Rect { .. }));
        let translated = out.picture.ops.iter().any(|op| {
            matches!(op, DrawOp::Concat(m) if m.e == 2.0 && m.f == 3.0)
        });
        assert!(translated, "use x/y becomes a concat");
        let (saves, restores) = save_restore_balance(&out.picture);
        assert_eq!(saves, restores);
    }

    #[test]
    fn self_referential_use_fails_closed() {
        let out = walk(
            r##"<svg width="10" height="10">
              <defs><g id="loop"><use href="#loop"/></g></defs>
              <use href="#loop"/>
            </svg>"##,
        );
        assert_eq!(
            out.warnings
                .iter()
                .filter(|w| w.kind == WarningKind::UnresolvedUseReference)
                .count(),
            1
        );
        let (saves, restores) = save_restore_balance(&out.picture);
        assert_eq!(saves, restores);
    }

    #[test]
    fn missing_use_target_is_a_warning_noop() {
        let out = walk(r##"<svg width="10" height="10"><use href="#nothing"/></svg>"##);
        assert!(shape_ops(&out.picture).is_empty());
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == WarningKind::UnresolvedUseReference)
        );
    }

    #[test]
    fn unrecognized_element_warns_but_children_still_draw() {
        let out = walk(
            r##"<svg width="10" height="10"><widget><rect width="5" height="5"/></widget></svg>"##,
        );
        assert_eq!(shape_ops(&out.picture).len(), 1);
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == WarningKind::UnrecognizedElement)
        );
    }

    #[test]
    fn text_accumulates_and_adjusts_middle_baseline() {
        let out = walk(
            r##"<svg width="50" height="50"><text x="5" y="20" font-size="10" alignment-baseline="middle">Hi</text></svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        assert_eq!(shapes.len(), 1);
        let DrawOp::Text { x, y, text, paint } = shapes[0] else {
            panic!("expected text");
        };
        assert_eq!(*x, 5.0);
        // Half the approximate ascent of a 10px face.
        assert_eq!(*y, 24.0);
        assert_eq!(text, "Hi");
        assert_eq!(paint.text_size, 10.0);
        assert_eq!(paint.color, Color::BLACK);
    }

    #[test]
    fn text_anchor_maps_to_alignment() {
        let out = walk(
            r##"<svg width="50" height="50"><text x="5" y="20" text-anchor="middle">m</text></svg>"##,
        );
        let DrawOp::Text { paint, .. } = shape_ops(&out.picture)[0] else {
            panic!("expected text");
        };
        assert_eq!(paint.text_align, crate::types::Align::Center);
    }

    #[test]
    fn inline_image_decodes_and_expands_limits() {
        use std::io::Cursor;
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let b64 = base64::engine::general_purpose::STANDARD.encode(&png);
        let xml = format!(
            r##"<svg width="50" height="50"><image x="1" y="1" width="30" height="20" href="data:image/png;base64,{b64}"/></svg>"##
        );
        let out = walk(&xml);
        let shapes = shape_ops(&out.picture);
        let DrawOp::Image {
            x, y, width, image, ..
        } = shapes[0]
        else {
            panic!("expected image");
        };
        assert_eq!((*x, *y, *width), (1.0, 1.0, 30.0));
        assert_eq!((image.width, image.height), (3, 2));
        let limits = out.computed_limits.unwrap();
        assert_eq!((limits.right, limits.bottom), (31.0, 21.0));
    }

    #[test]
    fn non_data_image_href_warns() {
        let out = walk(
            r##"<svg width="10" height="10"><image width="5" height="5" href="icon.png"/></svg>"##,
        );
        assert!(shape_ops(&out.picture).is_empty());
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == WarningKind::UnsupportedImageSource)
        );
    }

    #[test]
    fn explicit_fill_none_still_expands_limits() {
        let out = walk(
            r##"<svg width="10" height="10"><rect x="1" y="1" width="4" height="4" fill="none"/></svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        assert_eq!(shapes.len(), 1, "painted transparent, not skipped");
        let DrawOp::Rect { paint, .. } = shapes[0] else {
            panic!("expected rect");
        };
        assert!(paint.color.is_transparent());
        let limits = out.computed_limits.unwrap();
        assert_eq!((limits.left, limits.right), (1.0, 5.0));
    }

    #[test]
    fn inherited_none_paints_nothing() {
        let out = walk(
            r##"<svg width="10" height="10"><g fill="none"><rect width="4" height="4"/></g></svg>"##,
        );
        assert!(shape_ops(&out.picture).is_empty());
        assert!(out.computed_limits.is_none());
    }

    #[test]
    fn group_opacity_folds_into_child_alpha() {
        let out = walk(
            r##"<svg width="10" height="10"><g opacity="0.5"><rect width="4" height="4" fill="#ff0000"/></g></svg>"##,
        );
        let DrawOp::Rect { paint, .. } = shape_ops(&out.picture)[0] else {
            panic!("expected rect");
        };
        assert_eq!(paint.color.a, 128);
        assert_eq!(paint.color.r, 255);
    }

    #[test]
    fn stroked_rect_emits_fill_then_stroke_with_dash() {
        let out = walk(
            r##"<svg width="20" height="20">
              <rect width="10" height="10" fill="#00ff00" stroke="#0000ff" stroke-width="2" stroke-dasharray="5 3" stroke-dashoffset="10"/>
            </svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        assert_eq!(shapes.len(), 2);
        let DrawOp::Rect { paint: fill, .. } = shapes[0] else {
            panic!("expected fill rect first");
        };
        assert_eq!(fill.color, Color::rgb(0, 255, 0));
        let DrawOp::Rect { paint: stroke, .. } = shapes[1] else {
            panic!("expected stroke rect second");
        };
        assert_eq!(stroke.stroke_width, 2.0);
        let dash = stroke.dash.as_ref().expect("dash pattern");
        assert_eq!(dash.intervals, vec![5.0, 3.0]);
        assert_eq!(dash.offset, 2.0);
    }

    #[test]
    fn line_strokes_and_contributes_geometry_limits() {
        let out = walk(
            r##"<svg width="20" height="20"><line x1="2" y1="3" x2="12" y2="13" stroke="#000000" stroke-width="1"/></svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        assert!(matches!(shapes[0], DrawOp::Line { .. }));
        let limits = out.computed_limits.unwrap();
        assert_eq!(
            (limits.left, limits.top, limits.right, limits.bottom),
            (2.0, 3.0, 12.0, 13.0)
        );
    }

    #[test]
    fn polygon_closes_and_polyline_stays_open() {
        let out = walk(
            r##"<svg width="20" height="20">
              <polygon points="0,0 10,0 10,10"/>
              <polyline points="0,0 5,5" stroke="#000000" stroke-width="1" fill="none"/>
            </svg>"##,
        );
        let shapes = shape_ops(&out.picture);
        let DrawOp::Path { geometry, .. } = shapes[0] else {
            panic!("expected polygon path");
        };
        assert!(matches!(geometry.segs.last(), Some(PathSeg::Close)));
        let DrawOp::Path { geometry, paint } = shapes.last().unwrap() else {
            panic!("expected polyline path");
        };
        assert!(!matches!(geometry.segs.last(), Some(PathSeg::Close)));
        assert_eq!(paint.style, crate::types::PaintStyle::Stroke);
    }

    #[test]
    fn shape_display_none_is_skipped() {
        let out = walk(
            r##"<svg width="10" height="10"><rect width="4" height="4" display="none"/></svg>"##,
        );
        // Transform framing still happens; the shape itself never paints.
        assert!(shape_ops(&out.picture).is_empty());
        assert!(out.computed_limits.is_none());
    }

    #[test]
    fn group_transform_concat_is_recorded() {
        let out = walk(
            r##"<svg width="10" height="10"><g transform="translate(3,4)"><rect width="1" height="1"/></g></svg>"##,
        );
        let concat = out.picture.ops.iter().find_map(|op| match op {
            DrawOp::Concat(m) => Some(*m),
            _ => None,
        });
        let m = concat.expect("group transform recorded");
        assert_eq!((m.e, m.f), (3.0, 4.0));
    }
}

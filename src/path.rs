use crate::diag::{Diagnostics, WarningKind};
use crate::error::PictorError;
use crate::types::Rect;

/// One path primitive, in absolute coordinates. Arcs keep their analytic
/// center parameterization (angles in degrees) so a renderer can flatten
/// them at whatever tolerance it wants.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSeg {
    MoveTo {
        x: f32,
        y: f32,
    },
    LineTo {
        x: f32,
        y: f32,
    },
    CubicTo {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x: f32,
        y: f32,
    },
    Arc {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        start: f32,
        extent: f32,
    },
    Close,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathGeometry {
    pub segs: Vec<PathSeg>,
}

impl PathGeometry {
    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }

    /// Conservative axis-aligned bounding box: cubic control points are
    /// included as-is and an arc contributes its whole ellipse rect, so
    /// the result may overshoot curved geometry but never undershoots.
    pub fn bounds(&self) -> Option<Rect> {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;

        let mut grow = |x: f32, y: f32| {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        };

        for seg in &self.segs {
            match *seg {
                PathSeg::MoveTo { x, y } | PathSeg::LineTo { x, y } => grow(x, y),
                PathSeg::CubicTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    grow(x1, y1);
                    grow(x2, y2);
                    grow(x, y);
                }
                PathSeg::Arc { cx, cy, rx, ry, .. } => {
                    grow(cx - rx, cy - ry);
                    grow(cx + rx, cy + ry);
                }
                PathSeg::Close => {}
            }
        }

        if !min_x.is_finite() || !min_y.is_finite() {
            return None;
        }
        Some(Rect::new(min_x, min_y, max_x, max_y))
    }
}

/// Parses a path-data string on its own, outside a document pass.
/// Recoverable oddities (unknown command letters) are dropped silently
/// here; inside a document they are reported through the pass
/// diagnostics.
pub fn parse_path(d: &str) -> Result<PathGeometry, PictorError> {
    let mut diag = Diagnostics::new();
    parse_path_data(d, &mut diag)
}

pub(crate) fn parse_path_data(
    d: &str,
    diag: &mut Diagnostics,
) -> Result<PathGeometry, PictorError> {
    let mut sc = PathScanner::new(d);
    sc.skip_ws();

    let mut path = PathGeometry::default();
    let mut cur_x = 0.0f32;
    let mut cur_y = 0.0f32;
    // Reflection point for the smooth variants S/T; shared between cubic
    // and quadratic tracking exactly like the command grammar expects.
    let mut last_cx = 0.0f32;
    let mut last_cy = 0.0f32;
    let mut contour_x = 0.0f32;
    let mut contour_y = 0.0f32;
    let mut cmd = b'x';

    while !sc.done() {
        let next = sc.peek();
        if !next.is_ascii_digit() && next != b'.' && next != b'-' {
            cmd = next;
            sc.advance();
        } else if cmd == b'M' {
            // Extra coordinate pairs after a moveto are implied linetos.
            cmd = b'L';
        } else if cmd == b'm' {
            cmd = b'l';
        }

        let mut was_curve = false;
        match cmd {
            b'M' | b'm' => {
                let x = sc.next_float()?;
                let y = sc.next_float()?;
                if cmd == b'm' {
                    cur_x += x;
                    cur_y += y;
                } else {
                    cur_x = x;
                    cur_y = y;
                }
                path.segs.push(PathSeg::MoveTo { x: cur_x, y: cur_y });
                contour_x = cur_x;
                contour_y = cur_y;
            }
            b'Z' | b'z' => {
                path.segs.push(PathSeg::Close);
                cur_x = contour_x;
                cur_y = contour_y;
            }
            b'L' | b'l' => {
                let x = sc.next_float()?;
                let y = sc.next_float()?;
                if cmd == b'l' {
                    cur_x += x;
                    cur_y += y;
                } else {
                    cur_x = x;
                    cur_y = y;
                }
                path.segs.push(PathSeg::LineTo { x: cur_x, y: cur_y });
            }
            b'H' | b'h' => {
                let x = sc.next_float()?;
                cur_x = if cmd == b'h' { cur_x + x } else { x };
                path.segs.push(PathSeg::LineTo { x: cur_x, y: cur_y });
            }
            b'V' | b'v' => {
                let y = sc.next_float()?;
                cur_y = if cmd == b'v' { cur_y + y } else { y };
                path.segs.push(PathSeg::LineTo { x: cur_x, y: cur_y });
            }
            b'C' | b'c' => {
                was_curve = true;
                let mut x1 = sc.next_float()?;
                let mut y1 = sc.next_float()?;
                let mut x2 = sc.next_float()?;
                let mut y2 = sc.next_float()?;
                let mut x = sc.next_float()?;
                let mut y = sc.next_float()?;
                if cmd == b'c' {
                    x1 += cur_x;
                    x2 += cur_x;
                    x += cur_x;
                    y1 += cur_y;
                    y2 += cur_y;
                    y += cur_y;
                }
                path.segs.push(PathSeg::CubicTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                });
                last_cx = x2;
                last_cy = y2;
                cur_x = x;
                cur_y = y;
            }
            b'S' | b's' => {
                was_curve = true;
                let mut x2 = sc.next_float()?;
                let mut y2 = sc.next_float()?;
                let mut x = sc.next_float()?;
                let mut y = sc.next_float()?;
                if cmd == b's' {
                    x2 += cur_x;
                    x += cur_x;
                    y2 += cur_y;
                    y += cur_y;
                }
                let x1 = 2.0 * cur_x - last_cx;
                let y1 = 2.0 * cur_y - last_cy;
                path.segs.push(PathSeg::CubicTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                });
                last_cx = x2;
                last_cy = y2;
                cur_x = x;
                cur_y = y;
            }
            b'Q' | b'q' => {
                was_curve = true;
                let mut x1 = sc.next_float()?;
                let mut y1 = sc.next_float()?;
                let mut x = sc.next_float()?;
                let mut y = sc.next_float()?;
                if cmd == b'q' {
                    x1 += cur_x;
                    y1 += cur_y;
                    x += cur_x;
                    y += cur_y;
                }
                let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur_x, cur_y, x1, y1, x, y);
                path.segs.push(PathSeg::CubicTo {
                    x1: c1x,
                    y1: c1y,
                    x2: c2x,
                    y2: c2y,
                    x,
                    y,
                });
                last_cx = x1;
                last_cy = y1;
                cur_x = x;
                cur_y = y;
            }
            b'T' | b't' => {
                was_curve = true;
                let mut x = sc.next_float()?;
                let mut y = sc.next_float()?;
                if cmd == b't' {
                    x += cur_x;
                    y += cur_y;
                }
                let qx = 2.0 * cur_x - last_cx;
                let qy = 2.0 * cur_y - last_cy;
                let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur_x, cur_y, qx, qy, x, y);
                path.segs.push(PathSeg::CubicTo {
                    x1: c1x,
                    y1: c1y,
                    x2: c2x,
                    y2: c2y,
                    x,
                    y,
                });
                last_cx = qx;
                last_cy = qy;
                cur_x = x;
                cur_y = y;
            }
            b'A' | b'a' => {
                let rx = sc.next_float()?;
                let ry = sc.next_float()?;
                let theta = sc.next_float()?;
                let large = sc.next_arc_flag()?;
                let sweep = sc.next_arc_flag()?;
                let mut x = sc.next_float()?;
                let mut y = sc.next_float()?;
                if cmd == b'a' {
                    x += cur_x;
                    y += cur_y;
                }
                append_arc(
                    &mut path.segs,
                    cur_x,
                    cur_y,
                    x,
                    y,
                    rx,
                    ry,
                    theta,
                    large,
                    sweep,
                );
                cur_x = x;
                cur_y = y;
            }
            _ => {
                diag.warn(
                    WarningKind::InvalidPathCommand,
                    String::from_utf8_lossy(&[cmd]),
                );
                sc.advance();
            }
        }

        if !was_curve {
            last_cx = cur_x;
            last_cy = cur_y;
        }
        sc.skip_ws();
    }

    Ok(path)
}

fn quad_to_cubic(x0: f32, y0: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32, f32) {
    // Quadratic Bezier -> cubic Bezier controls.
    let c1x = x0 + (2.0 / 3.0) * (x1 - x0);
    let c1y = y0 + (2.0 / 3.0) * (y1 - y0);
    let c2x = x2 + (2.0 / 3.0) * (x1 - x2);
    let c2y = y2 + (2.0 / 3.0) * (y1 - y2);
    (c1x, c1y, c2x, c2y)
}

/// SVG elliptical arc, endpoint form -> center form, per the SVG 1.1
/// implementation notes. The segment is stored analytically; degenerate
/// radii or coincident endpoints collapse to a line.
#[allow(clippy::too_many_arguments)]
fn append_arc(
    segs: &mut Vec<PathSeg>,
    x0: f32,
    y0: f32,
    x: f32,
    y: f32,
    rx_in: f32,
    ry_in: f32,
    angle_deg: f32,
    large_arc: bool,
    sweep: bool,
) {
    let mut rx = rx_in.abs();
    let mut ry = ry_in.abs();
    if rx == 0.0 || ry == 0.0 || (x0 == x && y0 == y) {
        segs.push(PathSeg::LineTo { x, y });
        return;
    }

    let dx2 = (x0 - x) / 2.0;
    let dy2 = (y0 - y) / 2.0;
    let angle = (angle_deg % 360.0).to_radians();
    let cos_angle = libm::cosf(angle);
    let sin_angle = libm::sinf(angle);

    let x1 = cos_angle * dx2 + sin_angle * dy2;
    let y1 = -sin_angle * dx2 + cos_angle * dy2;

    let mut prx = rx * rx;
    let mut pry = ry * ry;
    let px1 = x1 * x1;
    let py1 = y1 * y1;

    // Scale the radii up when they cannot span the endpoints.
    let radii_check = px1 / prx + py1 / pry;
    if radii_check > 1.0 {
        let s = libm::sqrtf(radii_check);
        rx *= s;
        ry *= s;
        prx = rx * rx;
        pry = ry * ry;
    }

    let sign = if large_arc == sweep { -1.0 } else { 1.0 };
    let mut sq = ((prx * pry) - (prx * py1) - (pry * px1)) / ((prx * py1) + (pry * px1));
    if sq < 0.0 {
        sq = 0.0;
    }
    let coef = sign * libm::sqrtf(sq);
    let cx1 = coef * (rx * y1 / ry);
    let cy1 = coef * -(ry * x1 / rx);

    let sx2 = (x0 + x) / 2.0;
    let sy2 = (y0 + y) / 2.0;
    let cx = sx2 + (cos_angle * cx1 - sin_angle * cy1);
    let cy = sy2 + (sin_angle * cx1 + cos_angle * cy1);

    let ux = (x1 - cx1) / rx;
    let uy = (y1 - cy1) / ry;
    let vx = (-x1 - cx1) / rx;
    let vy = (-y1 - cy1) / ry;

    let n = libm::sqrtf(ux * ux + uy * uy);
    let sign = if uy < 0.0 { -1.0 } else { 1.0 };
    let mut angle_start = (sign * libm::acosf((ux / n).clamp(-1.0, 1.0))).to_degrees();

    let n = libm::sqrtf((ux * ux + uy * uy) * (vx * vx + vy * vy));
    let p = ux * vx + uy * vy;
    let sign = if ux * vy - uy * vx < 0.0 { -1.0 } else { 1.0 };
    let mut angle_extent = (sign * libm::acosf((p / n).clamp(-1.0, 1.0))).to_degrees();
    if !sweep && angle_extent > 0.0 {
        angle_extent -= 360.0;
    } else if sweep && angle_extent < 0.0 {
        angle_extent += 360.0;
    }
    angle_extent %= 360.0;
    angle_start %= 360.0;

    segs.push(PathSeg::Arc {
        cx,
        cy,
        rx,
        ry,
        start: angle_start,
        extent: angle_extent,
    });
}

/// Byte cursor over one path-data string. Numerals that fail to lex are
/// fatal: geometry with a hole in it is unrecoverable.
struct PathScanner<'a> {
    s: &'a str,
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathScanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            s,
            bytes: s.as_bytes(),
            i: 0,
        }
    }

    fn done(&self) -> bool {
        self.i >= self.bytes.len()
    }

    fn peek(&self) -> u8 {
        self.bytes[self.i]
    }

    fn advance(&mut self) {
        self.i += 1;
    }

    fn skip_ws(&mut self) {
        while self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b' ' | b'\t' | b'\n' | b'\r' | b',' => self.i += 1,
                _ => break,
            }
        }
    }

    fn next_float(&mut self) -> Result<f32, PictorError> {
        self.skip_ws();
        let start = self.i;
        let mut has_digits = false;

        if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
            self.i += 1;
        }
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
            has_digits = true;
        }
        if self.i < self.bytes.len() && self.bytes[self.i] == b'.' {
            self.i += 1;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has_digits = true;
            }
        }
        if has_digits && self.i < self.bytes.len() && matches!(self.bytes[self.i], b'e' | b'E') {
            self.i += 1;
            if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
                self.i += 1;
            }
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
            }
        }

        if !has_digits {
            let rest: String = String::from_utf8_lossy(&self.bytes[start..])
                .chars()
                .take(12)
                .collect();
            return Err(PictorError::MalformedNumber(rest));
        }
        self.s[start..self.i]
            .parse::<f32>()
            .map_err(|_| PictorError::MalformedNumber(self.s[start..self.i].to_string()))
    }

    fn next_arc_flag(&mut self) -> Result<bool, PictorError> {
        self.skip_ws();
        // Arc flags are single characters and may be glued to the next
        // number ("A5 5 0 01 20 20").
        if self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b'0' => {
                    self.i += 1;
                    return Ok(false);
                }
                b'1' => {
                    self.i += 1;
                    return Ok(true);
                }
                _ => {}
            }
        }
        Ok(self.next_float()?.abs() > 0.5)
    }
}

use crate::diag::{Diagnostics, WarningKind};
use crate::error::PictorError;
use crate::number::scan_numbers;

/// Column-major 2x3 affine transform:
///
/// ```text
/// | a c e |
/// | b d f |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn rotate(deg: f32) -> Self {
        let rad = deg.to_radians();
        let s = libm::sinf(rad);
        let c = libm::cosf(rad);
        Self {
            a: c,
            b: s,
            c: -s,
            d: c,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Shear by pre-computed tangents (x sheared by y, y sheared by x).
    pub fn skew(tan_x: f32, tan_y: f32) -> Self {
        Self {
            a: 1.0,
            b: tan_y,
            c: tan_x,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `[self] * [other]` — `other` is applied to coordinates first, which
    /// makes `m.mul(t)` the pre-concatenation of `t` onto `m`.
    pub fn mul(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn is_identity(self) -> bool {
        self == Matrix::IDENTITY
    }
}

/// Parses a `transform` attribute chain, pre-concatenating every term so
/// the chain reads outer-to-inner left to right. Unknown term names are
/// reported and skipped; the rest of the chain still applies.
pub fn parse_transform(s: &str, diag: &mut Diagnostics) -> Result<Matrix, PictorError> {
    let mut matrix = Matrix::IDENTITY;
    let mut rest = s.trim();

    while !rest.is_empty() {
        let Some(open) = rest.find('(') else {
            diag.warn(WarningKind::InvalidTransformToken, rest.trim());
            break;
        };
        let Some(close) = rest[open..].find(')').map(|i| open + i) else {
            diag.warn(WarningKind::InvalidTransformToken, rest.trim());
            break;
        };
        let name = rest[..open].trim();
        let args = scan_numbers(&rest[open + 1..close], 0)?.values;

        match name {
            "matrix" => {
                if args.len() == 6 {
                    matrix = matrix.mul(Matrix {
                        a: args[0],
                        b: args[1],
                        c: args[2],
                        d: args[3],
                        e: args[4],
                        f: args[5],
                    });
                }
            }
            "translate" => {
                if !args.is_empty() {
                    let tx = args[0];
                    let ty = args.get(1).copied().unwrap_or(0.0);
                    matrix = matrix.mul(Matrix::translate(tx, ty));
                }
            }
            "scale" => {
                if !args.is_empty() {
                    let sx = args[0];
                    let sy = args.get(1).copied().unwrap_or(sx);
                    matrix = matrix.mul(Matrix::scale(sx, sy));
                }
            }
            "rotate" => {
                if !args.is_empty() {
                    let angle = args[0];
                    if args.len() > 2 {
                        let (cx, cy) = (args[1], args[2]);
                        matrix = matrix
                            .mul(Matrix::translate(cx, cy))
                            .mul(Matrix::rotate(angle))
                            .mul(Matrix::translate(-cx, -cy));
                    } else {
                        matrix = matrix.mul(Matrix::rotate(angle));
                    }
                }
            }
            "skewX" => {
                if !args.is_empty() {
                    matrix = matrix.mul(Matrix::skew(libm::tanf(args[0].to_radians()), 0.0));
                }
            }
            "skewY" => {
                if !args.is_empty() {
                    matrix = matrix.mul(Matrix::skew(0.0, libm::tanf(args[0].to_radians())));
                }
            }
            _ => {
                diag.warn(WarningKind::InvalidTransformToken, name);
            }
        }

        rest = rest[close + 1..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    Ok(matrix)
}

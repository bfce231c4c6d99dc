mod bounds;
mod cache;
mod canvas;
mod diag;
mod error;
mod gradient;
mod imagedec;
mod number;
mod path;
mod style;
mod transform;
mod walk;
mod types;

use std::sync::Arc;

use cache::PictureCache;
pub use canvas::{DrawOp, Picture};
pub use diag::{Warning, WarningKind};
pub use error::PictorError;
pub use imagedec::{DefaultImageDecoder, ImageData, ImageDecoder};
pub use number::{NumberScan, parse_number_list, scan_numbers};
pub use path::{PathGeometry, PathSeg, parse_path};
pub use transform::Matrix;
pub use types::{
    Align, Color, DashPattern, GradientStop, LineCap, LineJoin, Paint, PaintStyle, Rect, Shader,
};
use walk::WalkOptions;

/// One parsed document: the replayable picture, the bounds the document
/// declared (if any), the limits computed from painted geometry (if
/// anything painted), and the recoverable issues hit along the way.
#[derive(Debug)]
pub struct Svg {
    picture: Picture,
    declared_bounds: Option<Rect>,
    computed_limits: Option<Rect>,
    warnings: Vec<Warning>,
}

impl Svg {
    pub fn picture(&self) -> &Picture {
        &self.picture
    }

    pub fn into_picture(self) -> Picture {
        self.picture
    }

    /// Bounds authored through the reserved `bounds` marker group.
    pub fn declared_bounds(&self) -> Option<Rect> {
        self.declared_bounds
    }

    /// Bounds accumulated from painted geometry. Absent when nothing
    /// painted; approximate for curved or transformed shapes, but often
    /// better than nothing.
    pub fn computed_limits(&self) -> Option<Rect> {
        self.computed_limits
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

/// A configured parser. Cheap to keep around; holds the soft document
/// cache and the configuration a plain [`parse_svg`] call defaults.
pub struct Pictor {
    dpi: f32,
    default_color: Option<Color>,
    decoder: Box<dyn ImageDecoder>,
    cache: PictureCache,
}

impl Pictor {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PictorBuilder {
        PictorBuilder {
            dpi: 72.0,
            default_color: None,
            decoder: None,
        }
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Parses one document, bypassing the cache.
    pub fn parse_str(&self, xml: &str) -> Result<Svg, PictorError> {
        self.parse_with(xml, self.default_color)
    }

    /// Cache-aware parse keyed by the source digest plus the configured
    /// override color.
    pub fn parse_cached(&self, xml: &str) -> Result<Arc<Svg>, PictorError> {
        self.parse_cached_with(xml, self.default_color)
    }

    /// Cache-aware parse with a per-call override color. A cached entry
    /// parsed under a different override is not reused.
    pub fn parse_cached_with(
        &self,
        xml: &str,
        override_color: Option<Color>,
    ) -> Result<Arc<Svg>, PictorError> {
        let key = PictureCache::key(xml);
        if let Some(hit) = self.cache.get(&key, override_color) {
            return Ok(hit);
        }
        let svg = Arc::new(self.parse_with(xml, override_color)?);
        self.cache.insert(key, override_color, &svg);
        Ok(svg)
    }

    fn parse_with(&self, xml: &str, override_color: Option<Color>) -> Result<Svg, PictorError> {
        let output = walk::walk_document(
            xml,
            WalkOptions {
                dpi: self.dpi,
                default_color: override_color,
                decoder: self.decoder.as_ref(),
            },
        )?;
        Ok(Svg {
            picture: output.picture,
            declared_bounds: output.declared_bounds,
            computed_limits: output.computed_limits,
            warnings: output.warnings,
        })
    }
}

impl Default for Pictor {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PictorBuilder {
    dpi: f32,
    default_color: Option<Color>,
    decoder: Option<Box<dyn ImageDecoder>>,
}

impl PictorBuilder {
    /// Display density for physical units (pt, pc, cm, mm, in). Defaults
    /// to 72.
    pub fn dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Color used wherever fill or stroke is unset and nothing inherits.
    pub fn default_color(mut self, color: Color) -> Self {
        self.default_color = Some(color);
        self
    }

    pub fn image_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn build(self) -> Pictor {
        Pictor {
            dpi: self.dpi,
            default_color: self.default_color,
            decoder: self
                .decoder
                .unwrap_or_else(|| Box::new(DefaultImageDecoder)),
            cache: PictureCache::new(),
        }
    }
}

/// Parses a document with the default configuration.
pub fn parse_svg(xml: &str) -> Result<Svg, PictorError> {
    Pictor::new().parse_str(xml)
}

use crate::imagedec::ImageData;
use crate::path::PathGeometry;
use crate::transform::Matrix;
use crate::types::Paint;

/// One replayable drawing operation. Shape ops carry a resolved [`Paint`]
/// copy — cascading is finished before anything lands here. `Save`,
/// `Concat` and `Restore` mirror the walker's transform stack so a
/// renderer can replay with plain save/restore semantics.
#[derive(Debug, Clone)]
pub enum DrawOp {
    Save,
    Concat(Matrix),
    Restore,
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        paint: Paint,
    },
    RoundRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rx: f32,
        ry: f32,
        paint: Paint,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        paint: Paint,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        paint: Paint,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        paint: Paint,
    },
    Path {
        geometry: PathGeometry,
        paint: Paint,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: ImageData,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        paint: Paint,
    },
}

/// The finished display list for one document, sized to the recording
/// scope begun at the `svg` root.
#[derive(Debug, Clone)]
pub struct Picture {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl Picture {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Records drawing operations during a pass and hands the finished
/// [`Picture`] to the caller.
#[derive(Debug)]
pub(crate) struct Canvas {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
    depth: usize,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            depth: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn save(&mut self) {
        self.depth += 1;
        self.ops.push(DrawOp::Save);
    }

    pub fn concat(&mut self, matrix: Matrix) {
        if !matrix.is_identity() {
            self.ops.push(DrawOp::Concat(matrix));
        }
    }

    pub fn restore(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        self.ops.push(DrawOp::Restore);
    }

    pub fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint) {
        self.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            paint: paint.clone(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_round_rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rx: f32,
        ry: f32,
        paint: &Paint,
    ) {
        self.ops.push(DrawOp::RoundRect {
            x,
            y,
            width,
            height,
            rx,
            ry,
            paint: paint.clone(),
        });
    }

    pub fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint) {
        self.ops.push(DrawOp::Circle {
            cx,
            cy,
            radius,
            paint: paint.clone(),
        });
    }

    pub fn draw_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, paint: &Paint) {
        self.ops.push(DrawOp::Ellipse {
            cx,
            cy,
            rx,
            ry,
            paint: paint.clone(),
        });
    }

    pub fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, paint: &Paint) {
        self.ops.push(DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            paint: paint.clone(),
        });
    }

    pub fn draw_path(&mut self, geometry: PathGeometry, paint: &Paint) {
        self.ops.push(DrawOp::Path {
            geometry,
            paint: paint.clone(),
        });
    }

    pub fn draw_image(&mut self, x: f32, y: f32, width: f32, height: f32, image: ImageData) {
        self.ops.push(DrawOp::Image {
            x,
            y,
            width,
            height,
            image,
        });
    }

    pub fn draw_text(&mut self, x: f32, y: f32, text: impl Into<String>, paint: &Paint) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.into(),
            paint: paint.clone(),
        });
    }

    pub fn finish(self) -> Picture {
        Picture {
            width: self.width,
            height: self.height,
            ops: self.ops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    #[test]
    fn records_ops_in_order() {
        let mut canvas = Canvas::new(100, 50);
        let mut paint = Paint::fill();
        paint.color = Color::rgb(255, 0, 0);

        canvas.save();
        canvas.concat(Matrix::translate(5.0, 5.0));
        canvas.draw_rect(0.0, 0.0, 10.0, 10.0, &paint);
        canvas.restore();

        let picture = canvas.finish();
        assert_eq!(picture.width, 100);
        assert_eq!(picture.ops.len(), 4);
        assert!(matches!(picture.ops[0], DrawOp::Save));
        assert!(matches!(picture.ops[1], DrawOp::Concat(_)));
        assert!(matches!(picture.ops[2], DrawOp::Rect { .. }));
        assert!(matches!(picture.ops[3], DrawOp::Restore));
    }

    #[test]
    fn identity_concat_is_elided() {
        let mut canvas = Canvas::new(10, 10);
        canvas.save();
        canvas.concat(Matrix::IDENTITY);
        canvas.restore();
        assert_eq!(canvas.finish().ops.len(), 2);
    }

    #[test]
    fn unbalanced_restore_is_ignored() {
        let mut canvas = Canvas::new(10, 10);
        canvas.restore();
        assert!(canvas.finish().is_empty());
    }

    #[test]
    fn painted_ops_copy_the_paint() {
        let mut canvas = Canvas::new(10, 10);
        let mut paint = Paint::fill();
        paint.color = Color::rgb(1, 2, 3);
        canvas.draw_circle(5.0, 5.0, 2.0, &paint);
        paint.color = Color::rgb(9, 9, 9);
        let picture = canvas.finish();
        let DrawOp::Circle { paint: recorded, .. } = &picture.ops[0] else {
            panic!("expected circle");
        };
        assert_eq!(recorded.color, Color::rgb(1, 2, 3));
    }
}

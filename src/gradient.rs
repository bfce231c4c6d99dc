use std::collections::HashMap;

use crate::transform::Matrix;
use crate::types::{GradientStop, Shader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GradientKind {
    Linear,
    Radial,
}

/// One gradient definition as authored. Geometry fields stay `None` until
/// the document sets them, so href inheritance can tell "unset" from
/// "explicitly zero".
#[derive(Debug, Clone)]
pub(crate) struct Gradient {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    pub kind: GradientKind,
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
    pub cx: Option<f32>,
    pub cy: Option<f32>,
    pub radius: Option<f32>,
    pub stops: Vec<GradientStop>,
    pub matrix: Option<Matrix>,
}

impl Gradient {
    pub fn new(kind: GradientKind) -> Self {
        Self {
            id: None,
            parent_id: None,
            kind,
            x1: None,
            y1: None,
            x2: None,
            y2: None,
            cx: None,
            cy: None,
            radius: None,
            stops: Vec::new(),
            matrix: None,
        }
    }

    /// Child inheritance: stops only when the child defines none of its
    /// own, geometry only where the child left it unset, matrices
    /// composed child-then-parent.
    fn inherit_from(mut self, parent: &Gradient) -> Gradient {
        if self.stops.is_empty() {
            self.stops = parent.stops.clone();
        }
        self.x1 = self.x1.or(parent.x1);
        self.y1 = self.y1.or(parent.y1);
        self.x2 = self.x2.or(parent.x2);
        self.y2 = self.y2.or(parent.y2);
        self.cx = self.cx.or(parent.cx);
        self.cy = self.cy.or(parent.cy);
        self.radius = self.radius.or(parent.radius);
        self.matrix = match (self.matrix, parent.matrix) {
            (Some(child), Some(parent)) => Some(child.mul(parent)),
            (child, parent) => child.or(parent),
        };
        self
    }

    fn shader(&self) -> Shader {
        match self.kind {
            GradientKind::Linear => Shader::Linear {
                x1: self.x1.unwrap_or(0.0),
                y1: self.y1.unwrap_or(0.0),
                x2: self.x2.unwrap_or(0.0),
                y2: self.y2.unwrap_or(0.0),
                stops: self.stops.clone(),
                matrix: self.matrix,
            },
            GradientKind::Radial => Shader::Radial {
                cx: self.cx.unwrap_or(0.0),
                cy: self.cy.unwrap_or(0.0),
                radius: self.radius.unwrap_or(0.0),
                stops: self.stops.clone(),
                matrix: self.matrix,
            },
        }
    }
}

/// Gradients accumulated over one pass, keyed by id. Inheritance resolves
/// eagerly at `define` time (when the gradient element closes); a parent
/// that appears later in the document is simply not found, and the child
/// keeps whatever it declared itself.
#[derive(Debug, Default)]
pub(crate) struct GradientRegistry {
    map: HashMap<String, Gradient>,
}

impl GradientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, gradient: Gradient) {
        let Some(id) = gradient.id.clone() else {
            return;
        };
        let resolved = match gradient
            .parent_id
            .as_deref()
            .and_then(|parent_id| self.map.get(parent_id))
        {
            Some(parent) => gradient.clone().inherit_from(parent),
            None => gradient,
        };
        self.map.insert(id, resolved);
    }

    pub fn resolve(&self, id: &str) -> Option<Shader> {
        self.map.get(id).map(Gradient::shader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    fn stop(offset: f32, r: u8) -> GradientStop {
        GradientStop {
            offset,
            color: Color::rgb(r, 0, 0),
        }
    }

    fn linear(id: &str) -> Gradient {
        let mut g = Gradient::new(GradientKind::Linear);
        g.id = Some(id.to_string());
        g
    }

    #[test]
    fn child_without_stops_inherits_parent_stops() {
        let mut reg = GradientRegistry::new();
        let mut parent = linear("base");
        parent.stops = vec![stop(0.0, 10), stop(1.0, 20)];
        reg.define(parent);

        let mut child = Gradient::new(GradientKind::Radial);
        child.id = Some("child".to_string());
        child.parent_id = Some("base".to_string());
        reg.define(child);

        let Some(Shader::Radial { stops, .. }) = reg.resolve("child") else {
            panic!("expected radial shader");
        };
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].color.r, 10);
    }

    #[test]
    fn child_with_own_stops_keeps_them() {
        let mut reg = GradientRegistry::new();
        let mut parent = linear("base");
        parent.stops = vec![stop(0.0, 10)];
        reg.define(parent);

        let mut child = linear("child");
        child.parent_id = Some("base".to_string());
        child.stops = vec![stop(0.0, 99), stop(0.5, 98), stop(1.0, 97)];
        reg.define(child);

        let Some(Shader::Linear { stops, .. }) = reg.resolve("child") else {
            panic!("expected linear shader");
        };
        assert_eq!(stops.len(), 3);
        assert_eq!(stops[0].color.r, 99);
    }

    #[test]
    fn forward_reference_fails_silently() {
        let mut reg = GradientRegistry::new();
        let mut child = linear("child");
        child.parent_id = Some("later".to_string());
        reg.define(child);

        let mut parent = linear("later");
        parent.stops = vec![stop(0.0, 10)];
        reg.define(parent);

        let Some(Shader::Linear { stops, .. }) = reg.resolve("child") else {
            panic!("expected linear shader");
        };
        assert!(stops.is_empty(), "link resolved at define time only");
    }

    #[test]
    fn geometry_inherited_only_where_unset() {
        let mut reg = GradientRegistry::new();
        let mut parent = linear("base");
        parent.x1 = Some(1.0);
        parent.x2 = Some(9.0);
        reg.define(parent);

        let mut child = linear("child");
        child.parent_id = Some("base".to_string());
        child.x2 = Some(4.0);
        reg.define(child);

        let Some(Shader::Linear { x1, x2, .. }) = reg.resolve("child") else {
            panic!("expected linear shader");
        };
        assert_eq!(x1, 1.0);
        assert_eq!(x2, 4.0);
    }

    #[test]
    fn matrices_compose_child_then_parent() {
        let mut reg = GradientRegistry::new();
        let mut parent = linear("base");
        parent.matrix = Some(Matrix::translate(10.0, 0.0));
        reg.define(parent);

        let mut child = linear("child");
        child.parent_id = Some("base".to_string());
        child.matrix = Some(Matrix::scale(2.0, 2.0));
        reg.define(child);

        let Some(Shader::Linear {
            matrix: Some(m), ..
        }) = reg.resolve("child")
        else {
            panic!("expected composed matrix");
        };
        // scale * translate: the parent translate runs in the scaled frame.
        assert_eq!(m.apply(0.0, 0.0), (20.0, 0.0));
    }

    #[test]
    fn unknown_id_resolves_to_none() {
        let reg = GradientRegistry::new();
        assert!(reg.resolve("ghost").is_none());
    }
}

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    UnresolvedColor,
    UnresolvedGradientReference,
    UnresolvedUseReference,
    InvalidTransformToken,
    UnrecognizedElement,
    InvalidPathCommand,
    UnsupportedImageSource,
    ImageDecode,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::UnresolvedColor => "unresolved-color",
            WarningKind::UnresolvedGradientReference => "unresolved-gradient-reference",
            WarningKind::UnresolvedUseReference => "unresolved-use-reference",
            WarningKind::InvalidTransformToken => "invalid-transform-token",
            WarningKind::UnrecognizedElement => "unrecognized-element",
            WarningKind::InvalidPathCommand => "invalid-path-command",
            WarningKind::UnsupportedImageSource => "unsupported-image-source",
            WarningKind::ImageDecode => "image-decode",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub detail: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

/// Collects the recoverable issues of one parse pass. Fatal failures go
/// through `PictorError` instead; everything here leaves a usable picture.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    warnings: Vec<Warning>,
    counters: HashMap<WarningKind, u64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: WarningKind, detail: impl Into<String>) {
        let entry = self.counters.entry(kind).or_insert(0);
        *entry = entry.saturating_add(1);
        self.warnings.push(Warning {
            kind,
            detail: detail.into(),
        });
    }

    pub fn count(&self, kind: WarningKind) -> u64 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

use std::fmt;

#[derive(Debug)]
pub enum PictorError {
    Xml(roxmltree::Error),
    MalformedNumber(String),
}

impl fmt::Display for PictorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PictorError::Xml(err) => write!(f, "malformed xml: {}", err),
            PictorError::MalformedNumber(token) => {
                write!(f, "malformed number: {:?}", token)
            }
        }
    }
}

impl std::error::Error for PictorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PictorError::Xml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<roxmltree::Error> for PictorError {
    fn from(value: roxmltree::Error) -> Self {
        PictorError::Xml(value)
    }
}

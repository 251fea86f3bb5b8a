use crate::openshift::DEFAULT_IMAGE_TAG;
use std::fmt;

/// `name:tag` reference to a tag of an image stream, as found in `imageChangeParams.from.name`.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageStreamTag {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    MissingName,
    MissingSeparator(String),
}

impl std::error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingName => write!(f, "image stream name is missing"),
            ParseError::MissingSeparator(reference) => {
                write!(f, "expected <name>:<tag>, got {:?}", reference)
            }
        }
    }
}

impl fmt::Display for ImageStreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl ImageStreamTag {
    /// Splits at the first colon. An empty tag resolves to `latest`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (name, tag) = s
            .split_once(':')
            .ok_or_else(|| ParseError::MissingSeparator(s.to_string()))?;

        if name.is_empty() {
            return Err(ParseError::MissingName);
        }

        let tag = if tag.is_empty() { DEFAULT_IMAGE_TAG } else { tag };

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

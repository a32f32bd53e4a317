use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Supported publishing targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "elpx")]
    Elpx,
    #[serde(rename = "html5")]
    Html5,
    #[serde(rename = "html5-sp")]
    Html5SinglePage,
    #[serde(rename = "scorm12")]
    Scorm12,
    #[serde(rename = "scorm2004")]
    Scorm2004,
    #[serde(rename = "ims")]
    Ims,
    #[serde(rename = "epub3")]
    Epub3,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 7] = [
        Self::Elpx,
        Self::Html5,
        Self::Html5SinglePage,
        Self::Scorm12,
        Self::Scorm2004,
        Self::Ims,
        Self::Epub3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elpx => "elpx",
            Self::Html5 => "html5",
            Self::Html5SinglePage => "html5-sp",
            Self::Scorm12 => "scorm12",
            Self::Scorm2004 => "scorm2004",
            Self::Ims => "ims",
            Self::Epub3 => "epub3",
        }
    }

    /// Whether the renderer always produces a single container file.
    pub fn is_packaged(self) -> bool {
        !matches!(self, Self::Html5 | Self::Html5SinglePage)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

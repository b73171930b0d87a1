// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Every failure a build can report, from loading sources to writing outputs.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No resume sources were given")]
    ResumeNotFound,

    #[error("Failed to read resume {}: {source}", file.display())]
    ReadError {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse resume {}: {source}", file.display())]
    ParseError {
        file: PathBuf,
        /// The text actually read from disk, possibly empty.
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unrecognized resume schema in {}", file.display())]
    UnknownSchema { file: PathBuf },

    #[error("Invalid date format encountered: {0}")]
    InvalidDate(String),

    #[error("Theme not found: {0}")]
    ThemeNotFound(String),

    #[error("Failed to load theme from {}: {source}", attempted.display())]
    ThemeLoad {
        attempted: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("No rendering engine registered under '{0}'")]
    UnregisteredEngine(String),

    #[error("Theme '{theme}' does not support output format(s): {}", formats.join(", "))]
    InvalidFormat { theme: String, formats: Vec<String> },

    #[error("Template compilation failed: {source}")]
    TemplateCompile {
        #[source]
        source: anyhow::Error,
    },

    #[error("Template invocation failed: {source}")]
    TemplateInvoke {
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to generate {}: {source}", file.display())]
    Generate {
        file: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Output {} would overwrite a source resume", file.display())]
    InputOutputParity { file: PathBuf },
}

impl BuildError {
    /// Short stable name, used in notifications and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::ResumeNotFound => "resumeNotFound",
            BuildError::ReadError { .. } => "readError",
            BuildError::ParseError { .. } => "parseError",
            BuildError::UnknownSchema { .. } => "unknownSchema",
            BuildError::InvalidDate(_) => "invalidDate",
            BuildError::ThemeNotFound(_) => "themeNotFound",
            BuildError::ThemeLoad { .. } => "themeLoad",
            BuildError::UnregisteredEngine(_) => "unregisteredEngine",
            BuildError::InvalidFormat { .. } => "invalidFormat",
            BuildError::TemplateCompile { .. } => "compileTemplate",
            BuildError::TemplateInvoke { .. } => "invokeTemplate",
            BuildError::Generate { .. } => "generateError",
            BuildError::InputOutputParity { .. } => "inputOutputParity",
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_invalid_format_lists_every_format() {
        let err = BuildError::InvalidFormat {
            theme: "modern".to_string(),
            formats: vec!["docx".to_string(), "rtf".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Theme 'modern' does not support output format(s): docx, rtf"
        );
        assert_eq!(err.code(), "invalidFormat");
    }

    #[test]
    fn test_theme_load_keeps_inner_cause() {
        let err = BuildError::ThemeLoad {
            attempted: PathBuf::from("node_modules/jsonresume-theme-modern"),
            source: anyhow::anyhow!("manifest.toml is malformed"),
        };
        let inner = err.source().map(|s| s.to_string());
        assert_eq!(inner.as_deref(), Some("manifest.toml is malformed"));
    }
}

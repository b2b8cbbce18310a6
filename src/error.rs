use std::{
    fmt::{self, Display},
    io,
    path::PathBuf,
    sync::Arc,
};

use thiserror::Error;

/// All bundling errors
///
/// `thiserror` is used to display meaningful error messages.
///
/// Hard failures only: anything recoverable is a [Diagnostic] collected on
/// the build session instead.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BundleError {
    #[error("{0}")]
    IOError(IOError),

    /// A module of a textual kind whose bytes are not valid UTF-8.
    #[error("File is not valid UTF-8: {0}")]
    InvalidUtf8(PathBuf),

    /// Entry file could not be found at all.
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    /// An option patch produced an options tree that no longer deserializes.
    #[error("Invalid options for '{0}': {1}")]
    InvalidOptions(/* pattern */ String, /* message */ String),
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IOError(Arc<io::Error>);

impl PartialEq for IOError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for BundleError {
    fn from(err: io::Error) -> Self {
        Self::IOError(IOError(Arc::new(err)))
    }
}

/// Severity of a [Diagnostic].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// A recoverable problem found while loading a module.
///
/// Diagnostics never abort the build; the session collects them and the host
/// decides what to do. `index` is a byte offset into the module's original
/// content.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub index: usize,
    pub severity: Severity,
    pub message: String,
    pub cause: Option<String>,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path.display(), self.severity, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

#[test]
fn io_errors_compare_by_kind() {
    use std::io::ErrorKind;
    let a = BundleError::from(io::Error::new(ErrorKind::NotFound, "a.js"));
    let b = BundleError::from(io::Error::new(ErrorKind::NotFound, "b.js"));
    let denied = BundleError::from(io::Error::new(ErrorKind::PermissionDenied, "a.js"));

    assert_eq!(a, b);
    assert_eq!(a.clone(), a);
    assert_ne!(a, denied);
}

#[test]
fn test_coverage() {
    let error = BundleError::NotFound("x".into());
    assert_eq!(format!("{error:?}"), r#"NotFound("x")"#);
    assert_eq!(error.clone(), error);
    assert_eq!(error.to_string(), "Cannot find module 'x'");

    let diagnostic = Diagnostic {
        path: PathBuf::from("a.js"),
        index: 0,
        severity: Severity::Warning,
        message: "Mismatched #endif".into(),
        cause: None,
    };
    assert_eq!(diagnostic.to_string(), "a.js: warning: Mismatched #endif");
}

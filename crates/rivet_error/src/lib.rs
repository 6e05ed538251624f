use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = RivetError> = std::result::Result<T, E>;

/// Broad category of an error.
///
/// Callers match on this to decide whether an operation is worth retrying
/// (e.g. re-opening a stream after an `Io` error) or should be aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    General,
    /// Bytes that don't follow the expected file layout (bad magic, malformed
    /// footer, truncated pages).
    InvalidFormat,
    UnsupportedEncoding,
    UnsupportedCompression,
    /// A value doesn't have the shape its schema declares.
    SchemaViolation,
    /// Bad limit/offset parameters, unknown column names, out of bounds
    /// indices, invalid configuration values.
    OutOfRange,
    Io,
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::General => "general",
            Self::InvalidFormat => "invalid format",
            Self::UnsupportedEncoding => "unsupported encoding",
            Self::UnsupportedCompression => "unsupported compression",
            Self::SchemaViolation => "schema violation",
            Self::OutOfRange => "out of range",
            Self::Io => "io",
            Self::NotImplemented => "not implemented",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
pub struct RivetError {
    inner: Box<RivetErrorInner>,
}

#[derive(Debug)]
struct RivetErrorInner {
    kind: ErrorKind,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl RivetError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::General, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        RivetError {
            inner: Box::new(RivetErrorInner {
                kind,
                msg: msg.into(),
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let kind = kind_of_source(source.as_ref());
        let mut err = Self::with_kind(kind, msg);
        err.inner.source = Some(source);
        err
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::InvalidFormat, msg)
    }

    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::SchemaViolation, msg)
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::OutOfRange, msg)
    }

    pub fn unsupported_encoding(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnsupportedEncoding, msg)
    }

    pub fn unsupported_compression(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnsupportedCompression, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_msg(&self) -> &str {
        self.inner.msg.as_str()
    }

    pub fn get_backtrace(&self) -> Option<&Backtrace> {
        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            Some(&self.inner.backtrace)
        } else {
            None
        }
    }

    /// Replace the kind of this error.
    pub fn into_kind(mut self, kind: ErrorKind) -> Self {
        self.inner.kind = kind;
        self
    }
}

/// Inherit the kind of a wrapped error where we can tell what it is.
fn kind_of_source(source: &(dyn Error + Send + Sync + 'static)) -> ErrorKind {
    if let Some(err) = source.downcast_ref::<RivetError>() {
        return err.kind();
    }
    if source.is::<std::io::Error>() {
        return ErrorKind::Io;
    }
    ErrorKind::General
}

impl fmt::Display for RivetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        if let Some(bt) = self.get_backtrace() {
            write!(f, "\nBacktrace: {bt}")?
        }

        Ok(())
    }
}

impl Error for RivetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for RivetError {
    fn from(value: std::io::Error) -> Self {
        RivetError::with_source("IO error", Box::new(value))
    }
}

impl From<std::str::Utf8Error> for RivetError {
    fn from(value: std::str::Utf8Error) -> Self {
        RivetError::with_source("Invalid utf8", Box::new(value)).into_kind(ErrorKind::InvalidFormat)
    }
}

impl From<std::string::FromUtf8Error> for RivetError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        RivetError::with_source("Invalid utf8", Box::new(value)).into_kind(ErrorKind::InvalidFormat)
    }
}

impl From<fmt::Error> for RivetError {
    fn from(value: fmt::Error) -> Self {
        RivetError::with_source("Format error", Box::new(value))
    }
}

/// Return early with a `NotImplemented` error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)+) => {{
        let msg = format!($($arg)+);
        return Err($crate::RivetError::with_kind(
            $crate::ErrorKind::NotImplemented,
            format!("Not yet implemented: {msg}"),
        ));
    }};
}

/// An extension trait for adding context to the Error variant of a result.
pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;

    /// Wrap an error with a static context string, forcing the resulting kind.
    fn context_kind(self, kind: ErrorKind, msg: &'static str) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RivetError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RivetError::with_source(f(), Box::new(e))),
        }
    }

    fn context_kind(self, kind: ErrorKind, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RivetError::with_source(msg, Box::new(e)).into_kind(kind)),
        }
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(RivetError::new(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_done() -> Result<()> {
        not_implemented!("thing {}", 4)
    }

    #[test]
    fn context_keeps_inner_kind() {
        let inner: Result<()> = Err(RivetError::invalid_format("bad magic"));
        let err = inner.context("failed to open").unwrap_err();

        assert_eq!(ErrorKind::InvalidFormat, err.kind());
        assert_eq!("failed to open", err.get_msg());
        assert!(err.source().is_some());
    }

    #[test]
    fn io_errors_are_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err = RivetError::from(io);
        assert_eq!(ErrorKind::Io, err.kind());
    }

    #[test]
    fn context_kind_overrides() {
        let r: std::result::Result<(), fmt::Error> = Err(fmt::Error);
        let err = r.context_kind(ErrorKind::SchemaViolation, "nope").unwrap_err();
        assert_eq!(ErrorKind::SchemaViolation, err.kind());
    }

    #[test]
    fn not_implemented_macro() {
        let err = not_done().unwrap_err();
        assert_eq!(ErrorKind::NotImplemented, err.kind());
        assert_eq!("Not yet implemented: thing 4", err.get_msg());
    }

    #[test]
    fn required_none() {
        let err = None::<i32>.required("missing thing").unwrap_err();
        assert_eq!("missing thing", err.get_msg());
    }
}

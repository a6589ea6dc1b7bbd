//! Defines error types and codes.

use std::io;
use std::path::PathBuf;

use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive as _;
use thiserror::Error;

/// An error raised while reading or writing a demo.
#[derive(Error, Debug)]
pub enum DemoError {
    /// The demo file could not be opened or created.
    #[error("cannot open file: {0}")]
    CannotOpen(#[source] io::Error),
    /// A structural invariant of the demo format was violated.
    #[error("corrupt demo: {0}")]
    Corrupt(String),
    /// The output file already exists and overwriting was not requested.
    #[error("demo file exists: {}", .0.display())]
    FileExists(PathBuf),
    /// Demo data could not be written to the sink.
    #[error("cannot write demo data to file: {0}")]
    CannotWrite(#[source] io::Error),
    /// The demo carries a protocol identifier this library does not
    /// understand.
    #[error("demo has unknown protocol: {0}")]
    UnknownProtocol(u32),
    /// The byte source ran out in the middle of a read.
    #[error("demo file ended unexpectedly")]
    UnexpectedEof,
}

/// Stable numeric error codes, for callers that persist or exchange error
/// values rather than `DemoError` itself.
///
/// The values are fixed; 2 is intentionally unassigned. `BadParams` and
/// `NoMemory` are reserved codes that the Rust API surface cannot itself
/// produce.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Primitive)]
pub enum ErrorCode {
    /// No error.
    Ok = 0,
    /// A demo file could not be opened or created.
    CannotOpenDemo = 1,
    /// A structural invariant of the demo format was violated.
    CorruptDemo = 3,
    /// The output file already exists.
    FileExists = 4,
    /// Demo data could not be written.
    CannotWrite = 5,
    /// The demo carries an unknown protocol identifier.
    UnknownProtocol = 6,
    /// The byte source ran out mid-read.
    UnexpectedEof = 7,
    /// Invalid parameters were supplied.
    BadParams = 8,
    /// Memory allocation failed.
    NoMemory = 9,
}

impl DemoError {
    /// The stable numeric code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DemoError::CannotOpen(_) => ErrorCode::CannotOpenDemo,
            DemoError::Corrupt(_) => ErrorCode::CorruptDemo,
            DemoError::FileExists(_) => ErrorCode::FileExists,
            DemoError::CannotWrite(_) => ErrorCode::CannotWrite,
            DemoError::UnknownProtocol(_) => ErrorCode::UnknownProtocol,
            DemoError::UnexpectedEof => ErrorCode::UnexpectedEof,
        }
    }
}

/// Translates a stable error code into a human readable description.
///
/// Unassigned values yield `"unknown demo error"`.
pub fn describe_error(code: u32) -> &'static str {
    match ErrorCode::from_u32(code) {
        Some(ErrorCode::Ok) => "no error",
        Some(ErrorCode::CannotOpenDemo) => "cannot open file",
        Some(ErrorCode::CorruptDemo) => "corrupt demo",
        Some(ErrorCode::FileExists) => "demo file exists",
        Some(ErrorCode::CannotWrite) => "cannot write demo data to file",
        Some(ErrorCode::UnknownProtocol) => "demo has unknown protocol",
        Some(ErrorCode::UnexpectedEof) => "demo file ended unexpectedly",
        Some(ErrorCode::BadParams) => "invalid parameters supplied",
        Some(ErrorCode::NoMemory) => "memory allocation failed",
        None => "unknown demo error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::Ok as u32, 0);
        assert_eq!(ErrorCode::CannotOpenDemo as u32, 1);
        assert_eq!(ErrorCode::CorruptDemo as u32, 3);
        assert_eq!(ErrorCode::FileExists as u32, 4);
        assert_eq!(ErrorCode::CannotWrite as u32, 5);
        assert_eq!(ErrorCode::UnknownProtocol as u32, 6);
        assert_eq!(ErrorCode::UnexpectedEof as u32, 7);
        assert_eq!(ErrorCode::BadParams as u32, 8);
        assert_eq!(ErrorCode::NoMemory as u32, 9);
    }

    #[test]
    fn unassigned_codes_are_unknown() {
        assert_eq!(describe_error(2), "unknown demo error");
        assert_eq!(describe_error(50), "unknown demo error");
        assert_eq!(describe_error(u32::MAX), "unknown demo error");
    }

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(
            DemoError::Corrupt("bad".into()).code(),
            ErrorCode::CorruptDemo
        );
        assert_eq!(DemoError::UnexpectedEof.code(), ErrorCode::UnexpectedEof);
        assert_eq!(
            DemoError::UnknownProtocol(42).code(),
            ErrorCode::UnknownProtocol
        );
    }

    #[test]
    fn descriptions_match_codes() {
        assert_eq!(describe_error(0), "no error");
        assert_eq!(describe_error(3), "corrupt demo");
        assert_eq!(describe_error(7), "demo file ended unexpectedly");
    }
}

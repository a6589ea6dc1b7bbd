//! A pure Rust codec for Quake demo (`.dem`) files, suitable for writing
//! editors, cutters, and analyzers of recorded game sessions.
//!
//! Demos recorded by NetQuake, FitzQuake, and the BJP3 engine variant are
//! supported. The codec parses a demo into [`format::Demo`], a sequence of
//! message blocks with their view angles, and writes it back out
//! byte-for-byte;
//! message payloads are captured verbatim rather than interpreted, so a
//! read/write round trip is exact.
//!
//! ```no_run
//! use qdem::format::Protocol;
//!
//! # fn main() -> Result<(), qdem::format::DemoError> {
//! let mut demo = qdem::read_demo_file("e1m1_0321.dem")?;
//! assert_eq!(demo.protocol, Protocol::NetQuake);
//!
//! // Drop every other block and declare the file rewritten.
//! let mut keep = false;
//! demo.blocks.retain(|_| {
//!     keep = !keep;
//!     keep
//! });
//! qdem::write_demo_file("e1m1_cut.dem", &demo, true)?;
//! # Ok(())
//! # }
//! ```
//!
//! In-memory byte sources and sinks work through [`format::read_demo`] and
//! [`format::write_demo`] directly.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

pub mod format;

use format::{Demo, DemoError};

/// Reads a demo from the file at `path`.
pub fn read_demo_file<P: AsRef<Path>>(path: P) -> Result<Demo, DemoError> {
    let file = File::open(path).map_err(DemoError::CannotOpen)?;
    format::read_demo(&mut BufReader::new(file))
}

/// Reads a demo from the file at `path`, reporting the consumed byte
/// offset to `progress` at coarse block intervals.
pub fn read_demo_file_with_progress<P, F>(path: P, progress: F) -> Result<Demo, DemoError>
where
    P: AsRef<Path>,
    F: FnMut(u64),
{
    let file = File::open(path).map_err(DemoError::CannotOpen)?;
    format::read_demo_with_progress(&mut BufReader::new(file), progress)
}

/// Writes `demo` to the file at `path`.
///
/// With `replace` unset, an existing file is left untouched and the call
/// fails with [`DemoError::FileExists`]. On any other failure the file may
/// be left partially written.
pub fn write_demo_file<P: AsRef<Path>>(
    path: P,
    demo: &Demo,
    replace: bool,
) -> Result<(), DemoError> {
    let path = path.as_ref();
    if !replace && path.exists() {
        return Err(DemoError::FileExists(path.to_path_buf()));
    }

    let file = File::create(path).map_err(DemoError::CannotOpen)?;
    let mut w = BufWriter::new(file);
    format::write_demo(&mut w, demo)?;
    w.flush().map_err(DemoError::CannotWrite)
}

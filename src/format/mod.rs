//! Reading and writing of Quake demo files.
//!
//! A demo file is an ASCII CD-track header line followed by blocks until
//! end of input. Each block carries a 32-bit payload length, three floats
//! of view angles, and a run of messages whose cumulative wire size must
//! match the declared length exactly. Messages themselves have no length
//! prefix; their sizes are computed by the [`message`] layer from the type
//! byte, the active protocol, and embedded mask bytes.
//!
//! The protocol dialect is not declared up front. It is inferred from the
//! first `SERVERINFO` or `VERSION` message; until one is seen, messages
//! are sized with the NetQuake-compatible defaults.

pub mod message;
pub mod wire;

mod error;
mod types;

use std::io::{BufRead, Write};

use num_traits::FromPrimitive as _;

pub use error::*;
pub use message::{message_name, read_message, write_message, MessageType};
pub use types::*;

use wire::{WireReader, WireWriter};

/// Largest legal block payload in bytes, message type bytes included.
pub const MAX_BLOCK_LENGTH: u32 = 65536;

/// Longest CD-track header, in characters before the newline.
const MAX_TRACK_CHARS: u32 = 6;

/// Invoke the progress sink every this many blocks.
const PROGRESS_BLOCK_INTERVAL: u32 = 72 * 30;

/// Reads a complete demo from `r`.
pub fn read_demo<R: BufRead>(r: &mut R) -> Result<Demo, DemoError> {
    read_demo_inner(&mut WireReader::new(r), None)
}

/// Reads a complete demo from `r`, reporting the consumed byte offset to
/// `progress` at coarse block intervals.
///
/// The sink is advisory; it must not assume any particular cadence.
pub fn read_demo_with_progress<R, F>(r: &mut R, mut progress: F) -> Result<Demo, DemoError>
where
    R: BufRead,
    F: FnMut(u64),
{
    read_demo_inner(&mut WireReader::new(r), Some(&mut progress))
}

fn read_demo_inner(
    r: &mut WireReader<'_>,
    mut progress: Option<&mut dyn FnMut(u64)>,
) -> Result<Demo, DemoError> {
    let track = read_cd_track(r)?;

    let mut protocol = Protocol::Unknown;
    let mut blocks = Vec::new();
    let mut since_progress = 0;

    while r.peek_u8()?.is_some() {
        blocks.push(read_block(r, &mut protocol)?);

        if let Some(cb) = progress.as_mut() {
            since_progress += 1;
            if since_progress >= PROGRESS_BLOCK_INTERVAL {
                since_progress = 0;
                cb(r.position());
            }
        }
    }

    log::debug!(
        "read demo: {} blocks, protocol {:?}, track {}",
        blocks.len(),
        protocol,
        track
    );

    Ok(Demo {
        protocol,
        track,
        blocks,
    })
}

/// Writes `demo` to `w` in wire format.
///
/// Blocks whose declared length is zero are skipped. For every other block
/// the declared length must match the wire size of its messages exactly;
/// a mismatch aborts the write with [`DemoError::Corrupt`], possibly
/// leaving a partial, unplayable file behind.
pub fn write_demo<W: Write>(w: &mut W, demo: &Demo) -> Result<(), DemoError> {
    let mut w = WireWriter::new(w);

    w.write_all(format!("{}\n", demo.track).as_bytes())?;

    let mut written_blocks = 0;
    for block in &demo.blocks {
        if block.length == 0 {
            continue;
        }
        write_block(&mut w, block)?;
        written_blocks += 1;
    }

    log::debug!(
        "wrote demo: {} blocks, protocol {:?}, track {}",
        written_blocks,
        demo.protocol,
        demo.track
    );

    Ok(())
}

/// Scans the CD-track header: an optional `-`, decimal digits, `\n`.
fn read_cd_track(r: &mut WireReader<'_>) -> Result<i32, DemoError> {
    let mut track: i32 = 0;
    let mut negative = false;
    let mut count = 0;

    loop {
        let b = r.read_u8()?;
        if b == b'\n' {
            break;
        }

        if b == b'-' {
            negative = true;
        } else {
            let digit = b.wrapping_sub(b'0');
            if digit > 9 {
                return Err(DemoError::Corrupt(format!(
                    "unexpected byte {:#04x} in cd track header",
                    b
                )));
            }
            track = track * 10 + i32::from(digit);
        }

        count += 1;
        if count > MAX_TRACK_CHARS {
            return Err(DemoError::Corrupt(format!(
                "cd track header longer than {} characters",
                MAX_TRACK_CHARS
            )));
        }
    }

    Ok(if negative { -track } else { track })
}

fn read_block(r: &mut WireReader<'_>, protocol: &mut Protocol) -> Result<Block, DemoError> {
    let length = r.read_u32()?;
    if length > MAX_BLOCK_LENGTH {
        return Err(DemoError::Corrupt(format!(
            "block length {} exceeds {}",
            length, MAX_BLOCK_LENGTH
        )));
    }

    let angles = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let messages = read_messages(r, protocol, length)?;

    Ok(Block {
        length,
        angles,
        messages,
    })
}

/// Reads messages until they fill exactly `length` wire bytes.
///
/// Also watches for the protocol announcement: the first `SERVERINFO` or
/// `VERSION` message fixes the dialect used to size everything after it.
fn read_messages(
    r: &mut WireReader<'_>,
    protocol: &mut Protocol,
    length: u32,
) -> Result<Vec<Message>, DemoError> {
    let mut messages = Vec::new();
    let mut consumed: u32 = 0;

    while consumed < length {
        let message = read_message(r, *protocol)?;
        consumed += message.wire_size();

        if *protocol == Protocol::Unknown {
            if let Some(id) = message.protocol_id() {
                match Protocol::from_u32(id) {
                    Some(Protocol::Unknown) | None => {
                        return Err(DemoError::UnknownProtocol(id));
                    }
                    Some(p) => *protocol = p,
                }
            }
        }

        messages.push(message);
    }

    if consumed != length {
        return Err(DemoError::Corrupt(format!(
            "block messages span {} bytes, expected {}",
            consumed, length
        )));
    }

    Ok(messages)
}

fn write_block(w: &mut WireWriter<'_>, block: &Block) -> Result<(), DemoError> {
    w.write_u32(block.length)?;
    for angle in block.angles {
        w.write_f32(angle)?;
    }

    let mut written: u64 = 0;
    for message in &block.messages {
        written += u64::from(write_message(w, message)?);
        if written > u64::from(block.length) {
            return Err(DemoError::Corrupt(format!(
                "block messages span more than the declared {} bytes",
                block.length
            )));
        }
    }

    if written != u64::from(block.length) {
        return Err(DemoError::Corrupt(format!(
            "block messages span {} bytes, declared {}",
            written, block.length
        )));
    }

    Ok(())
}

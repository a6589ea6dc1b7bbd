//! The in-memory representation of a demo: protocol, blocks, and messages.

use enum_primitive_derive::Primitive;

use super::message::MessageType;

/// The network protocol dialect a demo was recorded with.
///
/// The dialect decides how variable-length messages are sized; it is
/// inferred from the first `SERVERINFO` or `VERSION` message while reading
/// and is an attribute of the demo on write.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
pub enum Protocol {
    /// No `SERVERINFO` or `VERSION` message has been seen; messages are
    /// sized with the NetQuake-compatible defaults.
    Unknown = 0,
    /// Stock NetQuake.
    NetQuake = 15,
    /// FitzQuake, with extended mask bytes and extra message types.
    FitzQuake = 666,
    /// The BJP3 variant, with 16-bit model and sound indices.
    Bjp3 = 10002,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Unknown
    }
}

/// A complete recorded session: the CD-track header plus an ordered run of
/// blocks.
///
/// A demo exclusively owns its blocks; dropping it releases everything
/// recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct Demo {
    /// Protocol dialect inferred while reading, or `Unknown` if the demo
    /// carried no `SERVERINFO` or `VERSION` message.
    pub protocol: Protocol,
    /// CD track number from the header line; -1 means none.
    pub track: i32,
    /// Blocks in recorded order.
    pub blocks: Vec<Block>,
}

impl Demo {
    /// Creates an empty demo shell: no track (-1), unknown protocol, no
    /// blocks.
    pub fn new() -> Self {
        Demo {
            protocol: Protocol::Unknown,
            track: -1,
            blocks: Vec::new(),
        }
    }

    /// Drops all blocks (and, recursively, their messages) while keeping
    /// the demo shell for reuse.
    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
    }
}

impl Default for Demo {
    fn default() -> Self {
        Demo::new()
    }
}

/// One recorded frame: a declared message-run length, the view angles, and
/// the messages themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Declared wire size of the message run, type bytes included. The
    /// writer refuses blocks whose messages do not sum to exactly this.
    pub length: u32,
    /// View angles (pitch, yaw, roll) captured for the frame.
    pub angles: [f32; 3],
    /// Messages in wire order.
    pub messages: Vec<Message>,
}

impl Block {
    /// Builds a block around `messages`, declaring their exact wire size.
    pub fn from_messages(angles: [f32; 3], messages: Vec<Message>) -> Self {
        let length = messages.iter().map(Message::wire_size).sum();
        Block {
            length,
            angles,
            messages,
        }
    }

    /// The wire size of the current message run.
    ///
    /// Editing tools should store this back into `length` after splicing
    /// messages.
    pub fn wire_length(&self) -> u32 {
        self.messages.iter().map(Message::wire_size).sum()
    }
}

/// A single recorded game event: a one-byte type code and its raw payload.
///
/// The payload is kept as the exact bytes read from the wire; the codec
/// captures enough to re-emit the message verbatim and never re-encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message type byte. Values with the high bit set are entity updates.
    pub ty: u8,
    /// Raw payload, excluding the type byte.
    pub data: Vec<u8>,
}

impl Message {
    /// Creates a message from a type byte and payload.
    pub fn new(ty: u8, data: Vec<u8>) -> Self {
        Message { ty, data }
    }

    /// Payload length in bytes, excluding the type byte.
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Bytes this message occupies on the wire, type byte included.
    pub fn wire_size(&self) -> u32 {
        1 + self.size()
    }

    /// The protocol identifier carried by this message, if it is one of
    /// the two message types that announce it (`SERVERINFO`, `VERSION`).
    pub fn protocol_id(&self) -> Option<u32> {
        if self.ty != MessageType::ServerInfo as u8 && self.ty != MessageType::Version as u8 {
            return None;
        }

        let bytes = self.data.get(0..4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

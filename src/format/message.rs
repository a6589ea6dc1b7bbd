//! Message types and the per-type size decision tree.
//!
//! A message on the wire is a one-byte type code followed by a payload.
//! There is no length prefix: the payload size is computed from the type
//! byte, the active protocol, and (for several types) mask bytes embedded
//! in the payload itself. A wrong size computation desynchronizes every
//! message that follows, so this module is the load-bearing part of the
//! codec.
//!
//! Writes are oblivious to all of it: the reader captures exactly the bytes
//! needed to re-emit a message verbatim, and the writer puts them back.

use bitflags::bitflags;
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive as _;

use super::wire::{WireReader, WireWriter};
use super::{DemoError, Message, Protocol};

/// Known message type codes.
///
/// Type bytes with the high bit set are entity updates and never reach this
/// enum; a low byte that maps to no variant is corrupt.
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
pub enum MessageType {
    Bad = 0x00,
    Nop = 0x01,
    Disconnect = 0x02,
    UpdateStat = 0x03,
    Version = 0x04,
    SetView = 0x05,
    Sound = 0x06,
    Time = 0x07,
    Print = 0x08,
    StuffText = 0x09,
    SetAngle = 0x0A,
    ServerInfo = 0x0B,
    LightStyle = 0x0C,
    UpdateName = 0x0D,
    UpdateFrags = 0x0E,
    ClientData = 0x0F,
    StopSound = 0x10,
    UpdateColors = 0x11,
    Particle = 0x12,
    Damage = 0x13,
    SpawnStatic = 0x14,
    SpawnBinary = 0x15,
    SpawnBaseline = 0x16,
    TempEntity = 0x17,
    SetPause = 0x18,
    SignonNum = 0x19,
    CenterPrint = 0x1A,
    KilledMonster = 0x1B,
    FoundSecret = 0x1C,
    SpawnStaticSound = 0x1D,
    Intermission = 0x1E,
    Finale = 0x1F,
    CdTrack = 0x20,
    SellScreen = 0x21,
    Cutscene = 0x22,

    /* BJP3 */
    ShowLmp = 0x23,
    HideLmp = 0x24,

    /* FitzQuake; 0x25 is also the BJP3 skybox */
    Skybox = 0x25,
    Bf = 0x28,
    Fog = 0x29,
    SpawnBaseline2 = 0x2A,
    SpawnStatic2 = 0x2B,
    SpawnStaticSound2 = 0x2C,

    /* BJP3 */
    BjpFog = 0x33,
}

bitflags! {
    /// Optional-field bits in a SOUND message's leading mask byte.
    #[derive(Debug, Copy, Clone)]
    pub struct SoundFlags: u8 {
        /// One volume byte follows.
        const VOLUME = 0x01;
        /// One attenuation byte follows.
        const ATTENUATION = 0x02;
        /// FitzQuake: the entity/channel pair grows by one byte.
        const LARGEENTITY = 0x08;
        /// FitzQuake: the sound number is a short.
        const LARGESOUND = 0x10;
    }
}

bitflags! {
    /// Optional-field bits in a CLIENTDATA message's 16-bit mask, plus the
    /// FitzQuake extension bytes pulled in by `EXTEND1`/`EXTEND2`.
    #[derive(Debug, Copy, Clone)]
    pub struct ClientDataFlags: u32 {
        const VIEWHEIGHT = 0x0000_0001;
        const IDEALPITCH = 0x0000_0002;
        const PUNCH1 = 0x0000_0004;
        const PUNCH2 = 0x0000_0008;
        const PUNCH3 = 0x0000_0010;
        const VELOCITY1 = 0x0000_0020;
        const VELOCITY2 = 0x0000_0040;
        const VELOCITY3 = 0x0000_0080;
        const ITEMS = 0x0000_0200;
        const ONGROUND = 0x0000_0400;
        const INWATER = 0x0000_0800;
        const WEAPONFRAME = 0x0000_1000;
        const ARMOR = 0x0000_2000;
        const WEAPON = 0x0000_4000;
        /// A third mask byte follows the 16-bit mask (FitzQuake).
        const EXTEND1 = 0x0000_8000;

        /* FitzQuake extension bits */
        const WEAPON2 = 0x0001_0000;
        const ARMOR2 = 0x0002_0000;
        const AMMO2 = 0x0004_0000;
        const SHELLS2 = 0x0008_0000;
        const NAILS2 = 0x0010_0000;
        const ROCKETS2 = 0x0020_0000;
        const CELLS2 = 0x0040_0000;
        /// A fourth mask byte follows (FitzQuake).
        const EXTEND2 = 0x0080_0000;
        const WEAPONFRAME2 = 0x0100_0000;
        const WEAPONALPHA = 0x0200_0000;

        /// Bits that each add one payload byte under any protocol.
        const BYTE_FIELDS = Self::VIEWHEIGHT.bits()
            | Self::IDEALPITCH.bits()
            | Self::PUNCH1.bits()
            | Self::PUNCH2.bits()
            | Self::PUNCH3.bits()
            | Self::VELOCITY1.bits()
            | Self::VELOCITY2.bits()
            | Self::VELOCITY3.bits()
            | Self::WEAPONFRAME.bits()
            | Self::ARMOR.bits()
            | Self::WEAPON.bits();

        /// One-byte bits understood by FitzQuake, extension fields
        /// included.
        const BYTE_FIELDS_FITZQUAKE = Self::BYTE_FIELDS.bits()
            | Self::WEAPON2.bits()
            | Self::ARMOR2.bits()
            | Self::AMMO2.bits()
            | Self::SHELLS2.bits()
            | Self::NAILS2.bits()
            | Self::ROCKETS2.bits()
            | Self::CELLS2.bits()
            | Self::WEAPONFRAME2.bits()
            | Self::WEAPONALPHA.bits();
    }
}

bitflags! {
    /// Optional-field bits in an entity update.
    ///
    /// The low seven bits arrive in the type byte itself; `MOREBITS` and
    /// the FitzQuake `EXTEND` bits each pull in a further mask byte.
    #[derive(Debug, Copy, Clone)]
    pub struct UpdateFlags: u32 {
        /// A second mask byte follows the type byte.
        const MOREBITS = 0x0000_0001;
        const ORIGIN1 = 0x0000_0002;
        const ORIGIN2 = 0x0000_0004;
        const ORIGIN3 = 0x0000_0008;
        const ANGLE2 = 0x0000_0010;
        const STEP = 0x0000_0020;
        const FRAME = 0x0000_0040;

        /* second mask byte */
        const ANGLE1 = 0x0000_0100;
        const ANGLE3 = 0x0000_0200;
        const MODEL = 0x0000_0400;
        const COLORMAP = 0x0000_0800;
        const SKIN = 0x0000_1000;
        const EFFECTS = 0x0000_2000;
        const LONGENTITY = 0x0000_4000;
        /// A third mask byte follows (FitzQuake).
        const EXTEND1 = 0x0000_8000;

        /* third mask byte, FitzQuake */
        const ALPHA = 0x0001_0000;
        const FRAME2 = 0x0002_0000;
        const MODEL2 = 0x0004_0000;
        const LERPFINISH = 0x0008_0000;
        /// A fourth mask byte follows (FitzQuake).
        const EXTEND2 = 0x0080_0000;

        /// Bits that each add one payload byte under any protocol.
        const BYTE_FIELDS = Self::ANGLE2.bits()
            | Self::FRAME.bits()
            | Self::ANGLE1.bits()
            | Self::ANGLE3.bits()
            | Self::MODEL.bits()
            | Self::COLORMAP.bits()
            | Self::SKIN.bits()
            | Self::EFFECTS.bits()
            | Self::LONGENTITY.bits();

        /// One-byte bits understood by FitzQuake.
        const BYTE_FIELDS_FITZQUAKE = Self::BYTE_FIELDS.bits()
            | Self::ALPHA.bits()
            | Self::FRAME2.bits()
            | Self::MODEL2.bits()
            | Self::LERPFINISH.bits();

        /// Bits that each add a two-byte coordinate field.
        const COORD_FIELDS = Self::ORIGIN1.bits()
            | Self::ORIGIN2.bits()
            | Self::ORIGIN3.bits();
    }
}

bitflags! {
    /// Optional-field bits in FitzQuake SPAWNBASELINE2 / SPAWNSTATIC2.
    #[derive(Debug, Copy, Clone)]
    pub struct BaselineFlags: u8 {
        /// The model index is a short.
        const LARGEMODEL = 0x01;
        /// The frame number is a short.
        const LARGEFRAME = 0x02;
        /// An alpha byte follows.
        const ALPHA = 0x04;
    }
}

/// Minimum CLIENTDATA payload: the 16-bit mask plus the always-present
/// fixed fields.
const CLIENTDATA_BASE_SIZE: u32 = 14;

/// Minimum SOUND payload, mask byte included.
const SOUND_BASE_SIZE: u32 = 10;

/// How a message's payload length is determined once the type byte and
/// protocol are known.
enum Layout {
    /// The payload is a known byte count.
    Fixed(u32),
    /// One NUL-terminated string.
    Text,
    /// Two NUL-terminated strings followed by an x/y byte pair (BJP3
    /// SHOWLMP).
    Lmp,
    /// Enable byte, then seven density/color bytes when non-zero (BJP3
    /// FOG).
    FogVolume,
    /// Mask byte plus a popcount-sized remainder (FitzQuake SPAWNBASELINE2
    /// and SPAWNSTATIC2); `base` includes the mask byte.
    Baseline2 { base: u32 },
    /// Mask byte selecting optional sound fields.
    Sound,
    /// Fixed head plus the map title and the model and sound precache
    /// string runs.
    ServerInfo,
    /// One style/slot byte followed by a NUL-terminated string.
    Indexed,
    /// 16-bit mask, optional extension mask bytes, popcount-sized
    /// remainder.
    ClientData,
    /// Subtype byte selecting one of three fixed sizes.
    TempEntity,
}

fn protocol_mismatch(ty: MessageType, protocol: Protocol) -> DemoError {
    DemoError::Corrupt(format!(
        "message type {:?} is not valid under protocol {:?}",
        ty, protocol
    ))
}

/// Decides how to size a message of type `ty` under `protocol`, or rejects
/// the combination outright.
fn layout(ty: MessageType, protocol: Protocol) -> Result<Layout, DemoError> {
    use MessageType::*;

    let layout = match ty {
        Bad | Nop | Disconnect | SpawnBinary | KilledMonster | FoundSecret | Intermission
        | SellScreen => Layout::Fixed(0),
        SetPause | SignonNum => Layout::Fixed(1),
        SetView | StopSound | UpdateColors | CdTrack => Layout::Fixed(2),
        SetAngle | UpdateFrags => Layout::Fixed(3),
        Version | Time => Layout::Fixed(4),
        UpdateStat => Layout::Fixed(5),
        Damage => Layout::Fixed(8),
        SpawnStaticSound => Layout::Fixed(9),
        Particle => Layout::Fixed(11),
        // BJP3 model indices are shorts, one byte more than stock.
        SpawnStatic => Layout::Fixed(if protocol == Protocol::Bjp3 { 14 } else { 13 }),
        SpawnBaseline => Layout::Fixed(if protocol == Protocol::Bjp3 { 16 } else { 15 }),

        Print | StuffText | CenterPrint | Finale | Cutscene => Layout::Text,

        Skybox => match protocol {
            Protocol::FitzQuake | Protocol::Bjp3 => Layout::Text,
            _ => return Err(protocol_mismatch(ty, protocol)),
        },

        ShowLmp if protocol == Protocol::Bjp3 => Layout::Lmp,
        HideLmp if protocol == Protocol::Bjp3 => Layout::Text,
        BjpFog if protocol == Protocol::Bjp3 => Layout::FogVolume,
        ShowLmp | HideLmp | BjpFog => return Err(protocol_mismatch(ty, protocol)),

        Bf if protocol == Protocol::FitzQuake => Layout::Fixed(0),
        Fog if protocol == Protocol::FitzQuake => Layout::Fixed(6),
        SpawnStaticSound2 if protocol == Protocol::FitzQuake => Layout::Fixed(10),
        SpawnBaseline2 if protocol == Protocol::FitzQuake => Layout::Baseline2 { base: 16 },
        SpawnStatic2 if protocol == Protocol::FitzQuake => Layout::Baseline2 { base: 14 },
        Bf | Fog | SpawnStaticSound2 | SpawnBaseline2 | SpawnStatic2 => {
            return Err(protocol_mismatch(ty, protocol))
        }

        Sound => Layout::Sound,
        ServerInfo => Layout::ServerInfo,
        LightStyle | UpdateName => Layout::Indexed,
        ClientData => Layout::ClientData,
        TempEntity => Layout::TempEntity,
    };

    Ok(layout)
}

/// Reads one message from `r`, sizing it for `protocol`.
pub fn read_message(r: &mut WireReader<'_>, protocol: Protocol) -> Result<Message, DemoError> {
    let ty = r.read_u8()?;

    let message = if ty & 0x80 != 0 {
        read_entity_update(r, ty, protocol)?
    } else {
        let known = MessageType::from_u8(ty)
            .ok_or_else(|| DemoError::Corrupt(format!("invalid message type {:#04x}", ty)))?;

        let data = match layout(known, protocol)? {
            Layout::Fixed(size) => {
                let mut data = Vec::with_capacity(size as usize);
                r.append_exact(&mut data, size as usize)?;
                data
            }
            Layout::Text => {
                let mut data = Vec::new();
                r.read_cstring(&mut data)?;
                data
            }
            Layout::Lmp => {
                let mut data = Vec::new();
                r.read_cstring(&mut data)?;
                r.read_cstring(&mut data)?;
                r.append_exact(&mut data, 2)?;
                data
            }
            Layout::FogVolume => read_fog_volume(r)?,
            Layout::Baseline2 { base } => read_baseline2(r, base)?,
            Layout::Sound => read_sound(r, protocol)?,
            Layout::ServerInfo => read_server_info(r)?,
            Layout::Indexed => {
                let mut data = vec![r.read_u8()?];
                r.read_cstring(&mut data)?;
                data
            }
            Layout::ClientData => read_client_data(r, protocol)?,
            Layout::TempEntity => read_temp_entity(r)?,
        };

        Message::new(ty, data)
    };

    log::trace!(
        "read {} ({} payload bytes)",
        message_name(message.ty, protocol),
        message.data.len()
    );

    Ok(message)
}

/// Writes one message to `w` and returns its wire size.
///
/// Writes are byte-for-byte: the type code, then the stored payload.
pub fn write_message(w: &mut WireWriter<'_>, message: &Message) -> Result<u32, DemoError> {
    w.write_u8(message.ty)?;
    w.write_all(&message.data)?;
    Ok(message.wire_size())
}

/// BJP3 fog: an enable byte, then density and color only when enabled.
fn read_fog_volume(r: &mut WireReader<'_>) -> Result<Vec<u8>, DemoError> {
    let enable = r.read_u8()?;
    let mut data = vec![enable];
    if enable != 0 {
        r.append_exact(&mut data, 7)?;
    }

    Ok(data)
}

/// FitzQuake SPAWNBASELINE2 / SPAWNSTATIC2: a mask byte whose low three
/// bits each add one byte to the fixed base.
fn read_baseline2(r: &mut WireReader<'_>, base: u32) -> Result<Vec<u8>, DemoError> {
    let mask = r.read_u8()?;
    let size = base + BaselineFlags::from_bits_truncate(mask).bits().count_ones();

    let mut data = vec![mask];
    r.append_exact(&mut data, size as usize - 1)?;
    Ok(data)
}

fn read_sound(r: &mut WireReader<'_>, protocol: Protocol) -> Result<Vec<u8>, DemoError> {
    let mask = r.read_u8()?;
    let flags = SoundFlags::from_bits_retain(mask);

    let mut size = SOUND_BASE_SIZE;
    if flags.contains(SoundFlags::VOLUME) {
        size += 1;
    }
    if flags.contains(SoundFlags::ATTENUATION) {
        size += 1;
    }
    if protocol == Protocol::FitzQuake {
        if flags.contains(SoundFlags::LARGEENTITY) {
            size += 1;
        }
        if flags.contains(SoundFlags::LARGESOUND) {
            size += 1;
        }
    }
    if protocol == Protocol::Bjp3 {
        // sound_num is a short rather than a byte
        size += 1;
    }

    let mut data = vec![mask];
    r.append_exact(&mut data, size as usize - 1)?;
    Ok(data)
}

/// SERVERINFO: six fixed bytes (protocol id, max clients, game type), the
/// map title, then the model and sound precache lists, each terminated by
/// an empty string.
fn read_server_info(r: &mut WireReader<'_>) -> Result<Vec<u8>, DemoError> {
    let mut data = Vec::new();
    r.append_exact(&mut data, 6)?;

    // The map title is read unconditionally; it may be empty.
    r.read_cstring(&mut data)?;

    while r.read_cstring(&mut data)? > 1 {}
    while r.read_cstring(&mut data)? > 1 {}

    Ok(data)
}

fn read_client_data(r: &mut WireReader<'_>, protocol: Protocol) -> Result<Vec<u8>, DemoError> {
    let mask16 = r.read_u16()?;
    let mut mask = u32::from(mask16);
    let mut data = vec![(mask16 & 0x00FF) as u8, (mask16 >> 8) as u8];
    let mut size = CLIENTDATA_BASE_SIZE;

    if protocol == Protocol::FitzQuake {
        if mask & ClientDataFlags::EXTEND1.bits() != 0 {
            let extra = r.read_u8()?;
            mask |= u32::from(extra) << 16;
            data.push(extra);
            size += 1;
        }
        if mask & ClientDataFlags::EXTEND2.bits() != 0 {
            let extra = r.read_u8()?;
            mask |= u32::from(extra) << 24;
            data.push(extra);
            size += 1;
        }
    }

    let byte_fields = if protocol == Protocol::FitzQuake {
        ClientDataFlags::BYTE_FIELDS_FITZQUAKE
    } else {
        ClientDataFlags::BYTE_FIELDS
    };
    size += (mask & byte_fields.bits()).count_ones();

    if protocol == Protocol::Bjp3 && mask & ClientDataFlags::WEAPON.bits() != 0 {
        // the weapon model index is a short rather than a byte
        size += 1;
    }

    if mask & 0x8000_0000 != 0 {
        return Err(DemoError::Corrupt(format!(
            "unsupported clientdata mask {:#010x}",
            mask
        )));
    }

    let remainder = size as usize - data.len();
    r.append_exact(&mut data, remainder)?;
    Ok(data)
}

fn read_temp_entity(r: &mut WireReader<'_>) -> Result<Vec<u8>, DemoError> {
    let subtype = r.read_u8()?;
    let size: u32 = match subtype {
        0..=4 | 7 | 8 | 10 | 11 => 7,
        5 | 6 | 9 | 13 => 15,
        12 => 9,
        _ => {
            return Err(DemoError::Corrupt(format!(
                "unknown temp entity subtype {}",
                subtype
            )))
        }
    };

    let mut data = vec![subtype];
    r.append_exact(&mut data, size as usize - 1)?;
    Ok(data)
}

/// Entity update: the low seven type bits seed the mask, `MOREBITS` and
/// (under FitzQuake) the `EXTEND` bits pull in further mask bytes, and the
/// remaining set bits select one- or two-byte fields.
fn read_entity_update(
    r: &mut WireReader<'_>,
    ty: u8,
    protocol: Protocol,
) -> Result<Message, DemoError> {
    let mut mask = u32::from(ty & 0x7F);
    let mut data = Vec::new();
    // the entity number byte is always present
    let mut size: u32 = 1;

    if mask & UpdateFlags::MOREBITS.bits() != 0 {
        let extra = r.read_u8()?;
        mask |= u32::from(extra) << 8;
        data.push(extra);
        size += 1;
    }
    if protocol == Protocol::FitzQuake {
        if mask & UpdateFlags::EXTEND1.bits() != 0 {
            let extra = r.read_u8()?;
            mask |= u32::from(extra) << 16;
            data.push(extra);
            size += 1;
        }
        if mask & UpdateFlags::EXTEND2.bits() != 0 {
            let extra = r.read_u8()?;
            mask |= u32::from(extra) << 24;
            data.push(extra);
            size += 1;
        }
    }

    let byte_fields = if protocol == Protocol::FitzQuake {
        UpdateFlags::BYTE_FIELDS_FITZQUAKE
    } else {
        UpdateFlags::BYTE_FIELDS
    };
    size += (mask & byte_fields.bits()).count_ones();
    size += (mask & UpdateFlags::COORD_FIELDS.bits()).count_ones() * 2;

    if protocol == Protocol::Bjp3 && mask & UpdateFlags::MODEL.bits() != 0 {
        // the model index is a short rather than a byte
        size += 1;
    }

    let remainder = size as usize - data.len();
    r.append_exact(&mut data, remainder)?;
    Ok(Message::new(ty, data))
}

/// Debug name for a message type byte under the given protocol.
pub fn message_name(ty: u8, protocol: Protocol) -> &'static str {
    use MessageType::*;

    if ty & 0x80 != 0 {
        return "quick update";
    }

    let fitzquake = protocol == Protocol::FitzQuake;
    let bjp3 = protocol == Protocol::Bjp3;

    match MessageType::from_u8(ty) {
        Some(Bad) => "bad",
        Some(Nop) => "nop",
        Some(Disconnect) => "disconnect",
        Some(UpdateStat) => "updatestat",
        Some(Version) => "version",
        Some(SetView) => "setview",
        Some(Sound) => "sound",
        Some(Time) => "time",
        Some(Print) => "print",
        Some(StuffText) => "stufftext",
        Some(SetAngle) => "setangle",
        Some(ServerInfo) => "serverinfo",
        Some(LightStyle) => "lightstyle",
        Some(UpdateName) => "updatename",
        Some(UpdateFrags) => "updatefrags",
        Some(ClientData) => "clientdata",
        Some(StopSound) => "stopsound",
        Some(UpdateColors) => "updatecolors",
        Some(Particle) => "particle",
        Some(Damage) => "damage",
        Some(SpawnStatic) => "spawnstatic",
        Some(SpawnBinary) => "spawnbinary",
        Some(SpawnBaseline) => "spawnbaseline",
        Some(TempEntity) => "temp_entity",
        Some(SetPause) => "setpause",
        Some(SignonNum) => "signonnum",
        Some(CenterPrint) => "centerprint",
        Some(KilledMonster) => "killedmonster",
        Some(FoundSecret) => "foundsecret",
        Some(SpawnStaticSound) => "spawnstaticsound",
        Some(Intermission) => "intermission",
        Some(Finale) => "finale",
        Some(CdTrack) => "cdtrack",
        Some(SellScreen) => "sellscreen",
        Some(Cutscene) => "cutscene",
        Some(Skybox) if fitzquake || bjp3 => "skybox",
        Some(ShowLmp) if bjp3 => "showlmp",
        Some(HideLmp) if bjp3 => "hidelmp",
        Some(Bf) if fitzquake => "bf",
        Some(Fog) if fitzquake => "fog",
        Some(SpawnBaseline2) if fitzquake => "spawnbaseline2",
        Some(SpawnStatic2) if fitzquake => "spawnstatic2",
        Some(SpawnStaticSound2) if fitzquake => "spawnstaticsound2",
        Some(BjpFog) if bjp3 => "fog",
        _ => "unsupported message",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn read_one(bytes: &[u8], protocol: Protocol) -> Result<Message, DemoError> {
        let mut cursor = Cursor::new(bytes);
        let mut r = WireReader::new(&mut cursor);
        read_message(&mut r, protocol)
    }

    fn payload_size(bytes: &[u8], protocol: Protocol) -> u32 {
        read_one(bytes, protocol).expect("message should parse").size()
    }

    #[test]
    fn fixed_sizes() {
        // (type byte, payload size under NetQuake defaults)
        let table: &[(u8, u32)] = &[
            (0x00, 0),
            (0x01, 0),
            (0x02, 0),
            (0x15, 0),
            (0x1B, 0),
            (0x1C, 0),
            (0x1E, 0),
            (0x21, 0),
            (0x18, 1),
            (0x19, 1),
            (0x05, 2),
            (0x10, 2),
            (0x11, 2),
            (0x20, 2),
            (0x0A, 3),
            (0x0E, 3),
            (0x04, 4),
            (0x07, 4),
            (0x03, 5),
            (0x13, 8),
            (0x1D, 9),
            (0x12, 11),
            (0x14, 13),
            (0x16, 15),
        ];

        for &(ty, size) in table {
            let mut bytes = vec![ty];
            bytes.extend(std::iter::repeat(0xCC).take(size as usize));
            // VERSION carries a protocol id; make it a valid one.
            if ty == 0x04 {
                bytes[1..5].copy_from_slice(&15u32.to_le_bytes());
            }

            let message = read_one(&bytes, Protocol::Unknown).expect("fixed message");
            assert_eq!(message.size(), size, "type {:#04x}", ty);
            assert_eq!(message.wire_size(), 1 + size);
        }
    }

    #[test]
    fn cdtrack_size_is_protocol_independent() {
        for protocol in [
            Protocol::Unknown,
            Protocol::NetQuake,
            Protocol::FitzQuake,
            Protocol::Bjp3,
        ] {
            assert_eq!(payload_size(&[0x20, 2, 0], protocol), 2);
        }
    }

    #[test]
    fn bjp3_grows_spawn_messages() {
        let mut bytes = vec![0x16];
        bytes.extend([0u8; 16]);
        assert_eq!(payload_size(&bytes, Protocol::Bjp3), 16);

        let mut bytes = vec![0x14];
        bytes.extend([0u8; 14]);
        assert_eq!(payload_size(&bytes, Protocol::Bjp3), 14);
    }

    #[test]
    fn fitzquake_fixed_additions() {
        assert_eq!(payload_size(&[0x28], Protocol::FitzQuake), 0);
        assert_eq!(
            payload_size(&[0x29, 0, 0, 0, 0, 0, 0], Protocol::FitzQuake),
            6
        );
        let mut bytes = vec![0x2C];
        bytes.extend([0u8; 10]);
        assert_eq!(payload_size(&bytes, Protocol::FitzQuake), 10);

        // Under other protocols the same codes are rejected.
        assert_matches!(
            read_one(&[0x28], Protocol::NetQuake),
            Err(DemoError::Corrupt(_))
        );
        assert_matches!(read_one(&[0x29], Protocol::Bjp3), Err(DemoError::Corrupt(_)));
    }

    #[test]
    fn text_messages_capture_terminator() {
        let message = read_one(b"\x08hello\0", Protocol::Unknown).expect("print");
        assert_eq!(message.data, b"hello\0");

        // 0x25 is a string under FitzQuake and BJP3, corrupt elsewhere.
        let message = read_one(b"\x25unit1\0", Protocol::FitzQuake).expect("fq skybox");
        assert_eq!(message.data, b"unit1\0");
        let message = read_one(b"\x25unit1\0", Protocol::Bjp3).expect("bjp3 skybox");
        assert_eq!(message.data, b"unit1\0");
        assert_matches!(
            read_one(b"\x25unit1\0", Protocol::NetQuake),
            Err(DemoError::Corrupt(_))
        );
        assert_matches!(
            read_one(b"\x25unit1\0", Protocol::Unknown),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn show_and_hide_lmp_are_bjp3_only() {
        let message = read_one(b"\x23pic\0lmp\0\x05\x06", Protocol::Bjp3).expect("showlmp");
        assert_eq!(message.data, b"pic\0lmp\0\x05\x06");

        let message = read_one(b"\x24pic\0", Protocol::Bjp3).expect("hidelmp");
        assert_eq!(message.data, b"pic\0");

        assert_matches!(
            read_one(b"\x23pic\0lmp\0\x05\x06", Protocol::NetQuake),
            Err(DemoError::Corrupt(_))
        );
        assert_matches!(
            read_one(b"\x24pic\0", Protocol::FitzQuake),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn bjp3_fog_reads_settings_only_when_enabled() {
        let enabled = read_one(
            &[0x33, 1, 0x10, 0x20, 0x30, 0x40, 0xAA, 0xBB, 0xCC],
            Protocol::Bjp3,
        )
        .expect("fog on");
        assert_eq!(enabled.size(), 8);

        let disabled = read_one(&[0x33, 0], Protocol::Bjp3).expect("fog off");
        assert_eq!(disabled.data, [0]);

        assert_matches!(
            read_one(&[0x33, 0], Protocol::FitzQuake),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn baseline2_sizing() {
        // No flag bits: 16 bytes total, mask included.
        let mut bytes = vec![0x2A, 0x00];
        bytes.extend([0u8; 15]);
        let message = read_one(&bytes, Protocol::FitzQuake).expect("spawnbaseline2");
        assert_eq!(message.size(), 16);
        assert_eq!(message.data[0], 0x00);

        // All three flag bits add a byte each.
        let mut bytes = vec![0x2A, 0x07];
        bytes.extend([0u8; 18]);
        assert_eq!(payload_size(&bytes, Protocol::FitzQuake), 19);

        // SPAWNSTATIC2 has a two-byte smaller base.
        let mut bytes = vec![0x2B, 0x05];
        bytes.extend([0u8; 15]);
        assert_eq!(payload_size(&bytes, Protocol::FitzQuake), 16);

        assert_matches!(
            read_one(&[0x2A, 0x00], Protocol::NetQuake),
            Err(DemoError::Corrupt(_))
        );
        assert_matches!(
            read_one(&[0x2B, 0x00], Protocol::Bjp3),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn sound_sizing_per_protocol() {
        // Mask 0x1B sets VOLUME, ATTENUATION, LARGEENTITY, LARGESOUND.
        let mut bytes = vec![0x06, 0x1B];
        bytes.extend([0u8; 13]);
        assert_eq!(payload_size(&bytes, Protocol::FitzQuake), 14);

        // NetQuake ignores the large-entity/sound bits.
        let mut bytes = vec![0x06, 0x1B];
        bytes.extend([0u8; 11]);
        assert_eq!(payload_size(&bytes, Protocol::NetQuake), 12);

        // BJP3 always carries a 16-bit sound number.
        let mut bytes = vec![0x06, 0x00];
        bytes.extend([0u8; 10]);
        assert_eq!(payload_size(&bytes, Protocol::Bjp3), 11);

        let mut bytes = vec![0x06, 0x00];
        bytes.extend([0u8; 9]);
        assert_eq!(payload_size(&bytes, Protocol::Unknown), 10);
    }

    #[test]
    fn serverinfo_consumes_precache_lists() {
        let mut bytes = vec![0x0B];
        bytes.extend(15u32.to_le_bytes()); // protocol id
        bytes.extend([8, 0]); // max clients, game type
        bytes.extend(b"the Slipgate Complex\0");
        bytes.extend(b"maps/e1m1.bsp\0progs/player.mdl\0\0");
        bytes.extend(b"weapons/r_exp3.wav\0\0");

        let message = read_one(&bytes, Protocol::Unknown).expect("serverinfo");
        assert_eq!(message.size() as usize, bytes.len() - 1);
        assert_eq!(message.protocol_id(), Some(15));
    }

    #[test]
    fn serverinfo_title_may_be_empty() {
        let mut bytes = vec![0x0B];
        bytes.extend(666u32.to_le_bytes());
        bytes.extend([4, 1]);
        bytes.extend(b"\0"); // empty title
        bytes.extend(b"maps/start.bsp\0\0");
        bytes.extend(b"\0");

        let message = read_one(&bytes, Protocol::Unknown).expect("serverinfo");
        assert_eq!(message.size() as usize, bytes.len() - 1);
    }

    #[test]
    fn lightstyle_and_updatename_carry_index_and_string() {
        let message = read_one(b"\x0C\x07am\0", Protocol::Unknown).expect("lightstyle");
        assert_eq!(message.data, b"\x07am\0");

        let message = read_one(b"\x0D\x01player\0", Protocol::Unknown).expect("updatename");
        assert_eq!(message.data, b"\x01player\0");
    }

    #[test]
    fn clientdata_minimum() {
        let mut bytes = vec![0x0F, 0x00, 0x00];
        bytes.extend([0u8; 12]);
        assert_eq!(payload_size(&bytes, Protocol::NetQuake), 14);
    }

    #[test]
    fn clientdata_byte_fields() {
        // VIEWHEIGHT | WEAPON: two extra bytes under any protocol.
        let mask: u16 = 0x4001;
        let mut bytes = vec![0x0F];
        bytes.extend(mask.to_le_bytes());
        bytes.extend([0u8; 14]);
        assert_eq!(payload_size(&bytes, Protocol::NetQuake), 16);

        // BJP3 widens the weapon model index by one more byte.
        let mut bytes = vec![0x0F];
        bytes.extend(mask.to_le_bytes());
        bytes.extend([0u8; 15]);
        assert_eq!(payload_size(&bytes, Protocol::Bjp3), 17);
    }

    #[test]
    fn clientdata_fitzquake_extensions() {
        // EXTEND1 pulls in a third mask byte; its EXTEND2 bit pulls in a
        // fourth. extra1 = 0x81 sets WEAPON2 (one byte field) and bit 23.
        let mask: u16 = 0x8000;
        let extra1: u8 = 0x81;
        let extra2: u8 = 0x00;
        let mut bytes = vec![0x0F];
        bytes.extend(mask.to_le_bytes());
        bytes.push(extra1);
        bytes.push(extra2);
        bytes.extend([0u8; 13]);

        let message = read_one(&bytes, Protocol::FitzQuake).expect("clientdata");
        // 14 base + 2 extension bytes + 1 for WEAPON2
        assert_eq!(message.size(), 17);
        assert_eq!(&message.data[0..4], &[0x00, 0x80, extra1, extra2]);

        // The extension bit is inert outside FitzQuake.
        let mut bytes = vec![0x0F];
        bytes.extend(mask.to_le_bytes());
        bytes.extend([0u8; 12]);
        assert_eq!(payload_size(&bytes, Protocol::NetQuake), 14);
    }

    #[test]
    fn clientdata_rejects_top_bit() {
        let mask: u16 = 0x8000;
        let extra1: u8 = 0x80; // sets bit 23
        let extra2: u8 = 0x80; // sets bit 31
        let mut bytes = vec![0x0F];
        bytes.extend(mask.to_le_bytes());
        bytes.push(extra1);
        bytes.push(extra2);
        bytes.extend([0u8; 32]);

        assert_matches!(
            read_one(&bytes, Protocol::FitzQuake),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn temp_entity_sizing() {
        for (subtype, size) in [(0u8, 7u32), (4, 7), (11, 7), (5, 15), (13, 15), (12, 9)] {
            let mut bytes = vec![0x17, subtype];
            bytes.extend(std::iter::repeat(0).take(size as usize - 1));
            assert_eq!(payload_size(&bytes, Protocol::Unknown), size, "subtype {}", subtype);
        }

        assert_matches!(
            read_one(&[0x17, 14], Protocol::Unknown),
            Err(DemoError::Corrupt(_))
        );
        assert_matches!(
            read_one(&[0x17, 0xFF], Protocol::Unknown),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn entity_update_minimum() {
        // Type 0x80: no flag bits, just the entity number byte.
        assert_eq!(payload_size(&[0x80, 0x05], Protocol::NetQuake), 1);
    }

    #[test]
    fn entity_update_byte_and_coord_fields() {
        // 0x80 | ORIGIN1 | ORIGIN2 | ANGLE2: two coords (2 bytes each) and
        // one angle byte on top of the entity number.
        let ty = 0x80 | 0x02 | 0x04 | 0x10;
        let mut bytes = vec![ty];
        bytes.extend([0u8; 6]);
        assert_eq!(payload_size(&bytes, Protocol::NetQuake), 6);
    }

    #[test]
    fn entity_update_morebits() {
        // MOREBITS pulls in a second mask byte; 0x44 sets MODEL and
        // LONGENTITY, both one-byte fields.
        let ty = 0x80 | 0x01;
        let second: u8 = 0x44;
        let mut bytes = vec![ty, second];
        bytes.extend([0u8; 3]);

        let message = read_one(&bytes, Protocol::NetQuake).expect("quick update");
        assert_eq!(message.size(), 4);
        assert_eq!(message.data[0], second);
    }

    #[test]
    fn entity_update_fitzquake_extensions() {
        // MOREBITS -> second mask with EXTEND1 -> third mask with ALPHA and
        // EXTEND2 -> fourth mask, empty.
        let ty = 0x80 | 0x01;
        let second: u8 = 0x80; // EXTEND1
        let third: u8 = 0x81; // ALPHA | EXTEND2
        let fourth: u8 = 0x00;
        let bytes = vec![ty, second, third, fourth, 0xAA, 0xBB];

        let message = read_one(&bytes, Protocol::FitzQuake).expect("quick update");
        // entity byte + 3 mask bytes + alpha byte
        assert_eq!(message.size(), 5);
        assert_eq!(&message.data[0..3], &[second, third, fourth]);

        // Outside FitzQuake the extension bit is inert and costs nothing.
        let bytes = vec![ty, second, 0xAA];
        let message = read_one(&bytes, Protocol::NetQuake).expect("quick update");
        assert_eq!(message.size(), 2);
    }

    #[test]
    fn entity_update_bjp3_wide_model() {
        // MOREBITS -> MODEL set: BJP3 carries a 16-bit model index.
        let ty = 0x80 | 0x01;
        let second: u8 = 0x04;
        let mut bytes = vec![ty, second];
        bytes.extend([0u8; 3]);
        assert_eq!(payload_size(&bytes, Protocol::Bjp3), 4);

        let mut bytes = vec![ty, second];
        bytes.extend([0u8; 2]);
        assert_eq!(payload_size(&bytes, Protocol::NetQuake), 3);
    }

    #[test]
    fn low_type_with_no_meaning_is_corrupt() {
        assert_matches!(
            read_one(&[0x26], Protocol::FitzQuake),
            Err(DemoError::Corrupt(_))
        );
        assert_matches!(
            read_one(&[0x7F], Protocol::NetQuake),
            Err(DemoError::Corrupt(_))
        );
    }

    #[test]
    fn truncated_message_is_eof() {
        assert_matches!(
            read_one(&[0x07, 0x01, 0x02], Protocol::Unknown),
            Err(DemoError::UnexpectedEof)
        );
        assert_matches!(
            read_one(b"\x08no terminator", Protocol::Unknown),
            Err(DemoError::UnexpectedEof)
        );
    }

    #[test]
    fn write_is_verbatim() {
        let message = Message::new(0x06, vec![0x1B, 1, 2, 3]);
        let mut buf = Vec::new();
        {
            let mut w = WireWriter::new(&mut buf);
            assert_eq!(write_message(&mut w, &message).unwrap(), 5);
        }
        assert_eq!(buf, [0x06, 0x1B, 1, 2, 3]);
    }

    #[test]
    fn names_depend_on_protocol() {
        assert_eq!(message_name(0x01, Protocol::Unknown), "nop");
        assert_eq!(message_name(0x91, Protocol::NetQuake), "quick update");
        assert_eq!(message_name(0x25, Protocol::FitzQuake), "skybox");
        assert_eq!(message_name(0x25, Protocol::NetQuake), "unsupported message");
        assert_eq!(message_name(0x23, Protocol::Bjp3), "showlmp");
        assert_eq!(message_name(0x33, Protocol::Bjp3), "fog");
        assert_eq!(message_name(0x26, Protocol::FitzQuake), "unsupported message");
    }
}

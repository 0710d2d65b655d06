// Copyright 2025 ScopeDB <contact@scopedb.io>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The membership wire codec: packed little-endian frames with no padding
//! between fields, decoded with explicit `byteorder` reads rather than an
//! unsafe struct-cast.

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use quorumkv_core::Address;

pub const MSG_JOINREQ: u16 = 0;
pub const MSG_JOINRSP: u16 = 1;
pub const MSG_ADD_MEMBERS_REQ: u16 = 2;
pub const MSG_HEARTBEAT: u16 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("membership frame too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("unknown membership message type {0}")]
    UnknownType(u16),
}

/// A single `MemberData` payload element: `{ id: i32, port: i16, heartbeat: i64 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberEntryWire {
    pub addr: Address,
    pub heartbeat: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    JoinRequest {
        sender: Address,
        heartbeat: u64,
    },
    JoinResponse {
        sender: Address,
        heartbeat: u64,
        entries: Vec<MemberEntryWire>,
    },
    AddMembersRequest {
        sender: Address,
        heartbeat: u64,
        entries: Vec<MemberEntryWire>,
    },
    Heartbeat {
        sender: Address,
        heartbeat: u64,
    },
}

impl Message {
    pub fn sender(&self) -> Address {
        match self {
            Message::JoinRequest { sender, .. }
            | Message::JoinResponse { sender, .. }
            | Message::AddMembersRequest { sender, .. }
            | Message::Heartbeat { sender, .. } => *sender,
        }
    }

    pub fn heartbeat(&self) -> u64 {
        match self {
            Message::JoinRequest { heartbeat, .. }
            | Message::JoinResponse { heartbeat, .. }
            | Message::AddMembersRequest { heartbeat, .. }
            | Message::Heartbeat { heartbeat, .. } => *heartbeat,
        }
    }
}

/// True if `buf` looks like a membership frame rather than a DHT frame: the
/// DHT header's first byte is the fixed `0xDB` proto tag, which never
/// collides with a membership `msg_type` low byte (0..=3).
pub fn looks_like_membership_frame(buf: &[u8]) -> bool {
    buf.first().is_some_and(|&b| b != 0xDB)
}

pub fn encode(msg: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    match msg {
        Message::JoinRequest { sender, heartbeat } => {
            out.write_u16::<LittleEndian>(MSG_JOINREQ).unwrap();
            write_header(&mut out, *sender, *heartbeat);
        }
        Message::JoinResponse {
            sender,
            heartbeat,
            entries,
        } => {
            out.write_u16::<LittleEndian>(MSG_JOINRSP).unwrap();
            write_header(&mut out, *sender, *heartbeat);
            write_entries(&mut out, entries);
        }
        Message::AddMembersRequest {
            sender,
            heartbeat,
            entries,
        } => {
            out.write_u16::<LittleEndian>(MSG_ADD_MEMBERS_REQ).unwrap();
            write_header(&mut out, *sender, *heartbeat);
            write_entries(&mut out, entries);
        }
        Message::Heartbeat { sender, heartbeat } => {
            out.write_u16::<LittleEndian>(MSG_HEARTBEAT).unwrap();
            write_header(&mut out, *sender, *heartbeat);
        }
    }
    out
}

fn write_header(out: &mut Vec<u8>, sender: Address, heartbeat: u64) {
    out.write_i32::<LittleEndian>(sender.id as i32).unwrap();
    out.write_i16::<LittleEndian>(sender.port as i16).unwrap();
    out.write_i64::<LittleEndian>(heartbeat as i64).unwrap();
}

fn write_entries(out: &mut Vec<u8>, entries: &[MemberEntryWire]) {
    out.write_u64::<LittleEndian>(entries.len() as u64).unwrap();
    for entry in entries {
        out.write_i32::<LittleEndian>(entry.addr.id as i32).unwrap();
        out.write_i16::<LittleEndian>(entry.addr.port as i16).unwrap();
        out.write_i64::<LittleEndian>(entry.heartbeat as i64).unwrap();
    }
}

pub fn decode(buf: &[u8]) -> Result<Message, CodecError> {
    let mut cursor = std::io::Cursor::new(buf);
    let msg_type = read_u16(&mut cursor, buf.len())?;
    match msg_type {
        MSG_JOINREQ => {
            let (sender, heartbeat) = read_header(&mut cursor, buf.len())?;
            Ok(Message::JoinRequest { sender, heartbeat })
        }
        MSG_JOINRSP => {
            let (sender, heartbeat) = read_header(&mut cursor, buf.len())?;
            let entries = read_entries(&mut cursor, buf.len())?;
            Ok(Message::JoinResponse {
                sender,
                heartbeat,
                entries,
            })
        }
        MSG_ADD_MEMBERS_REQ => {
            let (sender, heartbeat) = read_header(&mut cursor, buf.len())?;
            let entries = read_entries(&mut cursor, buf.len())?;
            Ok(Message::AddMembersRequest {
                sender,
                heartbeat,
                entries,
            })
        }
        MSG_HEARTBEAT => {
            let (sender, heartbeat) = read_header(&mut cursor, buf.len())?;
            Ok(Message::Heartbeat { sender, heartbeat })
        }
        other => Err(CodecError::UnknownType(other)),
    }
}

fn read_u16(cursor: &mut std::io::Cursor<&[u8]>, len: usize) -> Result<u16, CodecError> {
    cursor.read_u16::<LittleEndian>().map_err(|_| CodecError::TooShort { need: 2, have: len })
}

fn read_header(
    cursor: &mut std::io::Cursor<&[u8]>,
    len: usize,
) -> Result<(Address, u64), CodecError> {
    let too_short = || CodecError::TooShort { need: 16, have: len };
    let id = cursor.read_i32::<LittleEndian>().map_err(|_| too_short())? as u32;
    let port = cursor.read_i16::<LittleEndian>().map_err(|_| too_short())? as u16;
    let heartbeat = cursor.read_i64::<LittleEndian>().map_err(|_| too_short())? as u64;
    Ok((Address::new(id, port), heartbeat))
}

fn read_entries(
    cursor: &mut std::io::Cursor<&[u8]>,
    len: usize,
) -> Result<Vec<MemberEntryWire>, CodecError> {
    let count = cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| CodecError::TooShort { need: 8, have: len })?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let too_short = || CodecError::TooShort { need: 14, have: len };
        let id = cursor.read_i32::<LittleEndian>().map_err(|_| too_short())? as u32;
        let port = cursor.read_i16::<LittleEndian>().map_err(|_| too_short())? as u16;
        let heartbeat = cursor.read_i64::<LittleEndian>().map_err(|_| too_short())? as u64;
        entries.push(MemberEntryWire {
            addr: Address::new(id, port),
            heartbeat,
        });
    }
    Ok(entries)
}

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

//! The DHT wire codec: a fixed 20-byte header plus a payload whose fields
//! are present iff their bit is set in `flags`.

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use quorumkv_core::Address;

pub const PROTO: u8 = 0xDB;
pub const VERSION: u8 = 0x01;

pub const FLAG_KEY: u8 = 0x80;
pub const FLAG_VAL: u8 = 0x40;
pub const FLAG_STATUS: u8 = 0x20;
pub const FLAG_REPLICA: u8 = 0x10;

pub const HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum MsgType {
    Create = 0,
    Read = 1,
    Update = 2,
    Delete = 3,
    CreateRsp = 4,
    ReadRsp = 5,
    UpdateRsp = 6,
    DeleteRsp = 7,
    SyncBegin = 8,
}

impl MsgType {
    fn from_u8(v: u8) -> Result<Self, CodecError> {
        Ok(match v {
            0 => MsgType::Create,
            1 => MsgType::Read,
            2 => MsgType::Update,
            3 => MsgType::Delete,
            4 => MsgType::CreateRsp,
            5 => MsgType::ReadRsp,
            6 => MsgType::UpdateRsp,
            7 => MsgType::DeleteRsp,
            8 => MsgType::SyncBegin,
            other => return Err(CodecError::UnknownType(other)),
        })
    }

    pub fn is_response(self) -> bool {
        matches!(
            self,
            MsgType::CreateRsp | MsgType::ReadRsp | MsgType::UpdateRsp | MsgType::DeleteRsp
        )
    }

    pub fn response_for(self) -> Option<MsgType> {
        Some(match self {
            MsgType::Create => MsgType::CreateRsp,
            MsgType::Read => MsgType::ReadRsp,
            MsgType::Update => MsgType::UpdateRsp,
            MsgType::Delete => MsgType::DeleteRsp,
            _ => return None,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("DHT frame too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("not a DHT frame: proto byte {0:#x}")]
    BadProto(u8),
    #[error("unsupported DHT protocol version {0:#x}")]
    BadVersion(u8),
    #[error("unknown DHT message type {0}")]
    UnknownType(u8),
}

pub const STATUS_OK: u8 = 0;
pub const STATUS_FAIL: u8 = 1;

/// One DHT request or response. `src` is the message's sender (a
/// coordinator on requests, a backend on responses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtMessage {
    pub msg_type: MsgType,
    pub transaction: u32,
    pub src: Address,
    pub status: Option<u8>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub replica: Option<Vec<(String, String)>>,
}

impl DhtMessage {
    pub fn request(msg_type: MsgType, transaction: u32, src: Address, key: String, value: Option<String>) -> Self {
        Self {
            msg_type,
            transaction,
            src,
            status: None,
            key: Some(key),
            value,
            replica: None,
        }
    }

    pub fn response(msg_type: MsgType, transaction: u32, src: Address, ok: bool, key: String, value: Option<String>) -> Self {
        Self {
            msg_type,
            transaction,
            src,
            status: Some(if ok { STATUS_OK } else { STATUS_FAIL }),
            key: Some(key),
            value,
            replica: None,
        }
    }

    pub fn sync_begin(src: Address, pairs: Vec<(String, String)>) -> Self {
        Self {
            msg_type: MsgType::SyncBegin,
            transaction: 0,
            src,
            status: None,
            key: None,
            value: None,
            replica: Some(pairs),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Some(STATUS_OK)
    }

    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.key.is_some() {
            flags |= FLAG_KEY;
        }
        if self.value.is_some() {
            flags |= FLAG_VAL;
        }
        if self.status.is_some() {
            flags |= FLAG_STATUS;
        }
        if self.replica.is_some() {
            flags |= FLAG_REPLICA;
        }
        flags
    }
}

/// True if `buf` starts with the DHT proto tag.
pub fn looks_like_dht_frame(buf: &[u8]) -> bool {
    buf.first() == Some(&PROTO)
}

pub fn encode(msg: &DhtMessage) -> Vec<u8> {
    let mut payload = Vec::new();
    if let Some(status) = msg.status {
        payload.write_u8(status).unwrap();
    }
    if let Some(key) = &msg.key {
        write_string(&mut payload, key);
    }
    if let Some(value) = &msg.value {
        write_string(&mut payload, value);
    }
    if let Some(replica) = &msg.replica {
        payload.write_u32::<LittleEndian>(replica.len() as u32).unwrap();
        for (k, v) in replica {
            write_string(&mut payload, k);
            write_string(&mut payload, v);
        }
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.write_u8(PROTO).unwrap();
    out.write_u8(VERSION).unwrap();
    out.write_u8(msg.msg_type as u8).unwrap();
    out.write_u8(msg.flags()).unwrap();
    out.write_u32::<LittleEndian>(msg.transaction).unwrap();
    out.write_u32::<LittleEndian>(msg.src.id).unwrap();
    out.write_u16::<LittleEndian>(msg.src.port).unwrap();
    out.write_u16::<LittleEndian>(crc16(&payload)).unwrap();
    out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
    out.extend_from_slice(&payload);
    out
}

pub fn decode(buf: &[u8]) -> Result<DhtMessage, CodecError> {
    if buf.len() < HEADER_LEN {
        return Err(CodecError::TooShort {
            need: HEADER_LEN,
            have: buf.len(),
        });
    }
    let mut cursor = std::io::Cursor::new(buf);
    let proto = cursor.read_u8().unwrap();
    if proto != PROTO {
        return Err(CodecError::BadProto(proto));
    }
    let version = cursor.read_u8().unwrap();
    if version != VERSION {
        return Err(CodecError::BadVersion(version));
    }
    let msg_type = MsgType::from_u8(cursor.read_u8().unwrap())?;
    let flags = cursor.read_u8().unwrap();
    let transaction = cursor.read_u32::<LittleEndian>().unwrap();
    let src_id = cursor.read_u32::<LittleEndian>().unwrap();
    let src_port = cursor.read_u16::<LittleEndian>().unwrap();
    let _crc = cursor.read_u16::<LittleEndian>().unwrap();
    let payload_size = cursor.read_u32::<LittleEndian>().unwrap() as usize;

    let too_short = || CodecError::TooShort {
        need: HEADER_LEN + payload_size,
        have: buf.len(),
    };

    let mut status = None;
    if flags & FLAG_STATUS != 0 {
        status = Some(cursor.read_u8().map_err(|_| too_short())?);
    }
    let mut key = None;
    if flags & FLAG_KEY != 0 {
        key = Some(read_string(&mut cursor).map_err(|_| too_short())?);
    }
    let mut value = None;
    if flags & FLAG_VAL != 0 {
        value = Some(read_string(&mut cursor).map_err(|_| too_short())?);
    }
    let mut replica = None;
    if flags & FLAG_REPLICA != 0 {
        let count = cursor.read_u32::<LittleEndian>().map_err(|_| too_short())?;
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let k = read_string(&mut cursor).map_err(|_| too_short())?;
            let v = read_string(&mut cursor).map_err(|_| too_short())?;
            pairs.push((k, v));
        }
        replica = Some(pairs);
    }

    Ok(DhtMessage {
        msg_type,
        transaction,
        src: Address::new(src_id, src_port),
        status,
        key,
        value,
        replica,
    })
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.write_u32::<LittleEndian>(s.len() as u32).unwrap();
    out.extend_from_slice(s.as_bytes());
}

fn read_string(cursor: &mut std::io::Cursor<&[u8]>) -> std::io::Result<String> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let start = cursor.position() as usize;
    let buf = cursor.get_ref();
    if start + len > buf.len() {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
    }
    let s = String::from_utf8_lossy(&buf[start..start + len]).into_owned();
    cursor.set_position((start + len) as u64);
    Ok(s)
}

/// CRC-16/CCITT-FALSE over the payload. The header reserves a slot for it
/// per spec.md §6; we fill it in rather than leaving it always-zero, but
/// nothing in this crate currently verifies it on decode — corruption
/// detection is left to the substrate/transport layer.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

use std::fmt;

use fxhash::FxHashMap;
use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::StreamError;

use super::{ControlFrame, ControlHead, Kind, StreamStatus, Version};

const FLAG_CLEAR_PERSISTED: u8 = 0x01;

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct SettingsFlags: u8 {
        const PERSIST_VALUE = 0x01;
        const PERSISTED = 0x02;
    }
}

/// A setting identifier together with its per-entry flags. The flags are
/// part of the key the way the wire packs them into the id word.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SettingKey {
    pub flags: SettingsFlags,
    pub id: u32,
}

impl SettingKey {
    pub const UPLOAD_BANDWIDTH: u32 = 1;
    pub const DOWNLOAD_BANDWIDTH: u32 = 2;
    pub const ROUND_TRIP_TIME: u32 = 3;
    pub const MAX_CONCURRENT_STREAMS: u32 = 4;
    pub const CURRENT_CWND: u32 = 5;
    pub const DOWNLOAD_RETRANS_RATE: u32 = 6;
    pub const INITIAL_WINDOW_SIZE: u32 = 7;
    pub const CLIENT_CERTIFICATE_VECTOR_SIZE: u32 = 8;

    pub fn new(id: u32) -> SettingKey {
        SettingKey {
            flags: SettingsFlags::empty(),
            id,
        }
    }
}

pub type SettingsMap = FxHashMap<SettingKey, u32>;

/// SETTINGS frame
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub version: Version,
    pub clear_persisted: bool,
    pub settings: SettingsMap,
}

impl Settings {
    pub fn new(version: Version) -> Settings {
        Settings {
            version,
            clear_persisted: false,
            settings: SettingsMap::default(),
        }
    }

    /// Value for the given id, whatever the entry flags.
    pub fn get(&self, id: u32) -> Option<u32> {
        self.settings
            .iter()
            .find(|(key, _)| key.id == id)
            .map(|(_, value)| *value)
    }

    pub fn load(version: Version, flags: u8, body: &mut BytesMut) -> Result<Settings, StreamError> {
        if flags & !FLAG_CLEAR_PERSISTED != 0 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                format!("invalid SETTINGS flags {:#04x}", flags),
            ));
        }
        if body.remaining() < 4 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "SETTINGS body too short",
            ));
        }
        let count = body.get_u32() as usize;
        if body.remaining() != count * 8 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "SETTINGS body length does not match entry count",
            ));
        }

        let mut settings = SettingsMap::default();
        for _ in 0..count {
            let word = body.get_u32();
            let key = SettingKey {
                flags: SettingsFlags::from_bits_truncate((word >> 24) as u8),
                id: word & 0x00FF_FFFF,
            };
            settings.insert(key, body.get_u32());
        }

        Ok(Settings {
            version,
            clear_persisted: flags & FLAG_CLEAR_PERSISTED != 0,
            settings,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!("encoding SETTINGS; len={}", self.settings.len());
        let flags = if self.clear_persisted {
            FLAG_CLEAR_PERSISTED
        } else {
            0
        };

        let head = ControlHead::new(Kind::Settings, self.version, flags);
        head.encode(4 + self.settings.len() * 8, dst);
        dst.put_u32(self.settings.len() as u32);
        for (key, value) in &self.settings {
            dst.put_u32(((key.flags.bits() as u32) << 24) | (key.id & 0x00FF_FFFF));
            dst.put_u32(*value);
        }
    }
}

impl From<Settings> for ControlFrame {
    fn from(src: Settings) -> ControlFrame {
        ControlFrame::Settings(src)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Settings")
            .field("version", &self.version)
            .field("clear_persisted", &self.clear_persisted)
            .field("settings", &self.settings)
            .finish()
    }
}

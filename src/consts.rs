// Constants
pub const HEADER_LENGTH: usize = 8;
pub const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;

pub const DEFAULT_INITIAL_WINDOW_SIZE: i32 = 65_536;

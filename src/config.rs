use crate::consts::DEFAULT_INITIAL_WINDOW_SIZE;
use crate::frame::Version;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial send window for new v3 streams. The peer can change the
    /// value for later streams via SETTINGS.
    pub(crate) initial_window_size: i32,

    /// Version stamped on RST_STREAM frames answering traffic for
    /// unknown streams, where no version can be discovered.
    pub(crate) unknown_stream_rst_version: Version,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            unknown_stream_rst_version: Version::V2,
        }
    }
}

impl Config {
    /// Sets the initial flow-control window for new streams.
    pub fn initial_window_size(mut self, size: i32) -> Self {
        self.initial_window_size = size;
        self
    }

    /// Sets the version used for resets on unknown streams.
    pub fn unknown_stream_rst_version(mut self, version: Version) -> Self {
        self.unknown_stream_rst_version = version;
        self
    }
}

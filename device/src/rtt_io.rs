//! RTT console: command bytes in, diagnostic text out

use core::fmt;

use rtt_target::{DownChannel, UpChannel};
use stepdrive_control::SymbolSource;

/// Command reader over the RTT down channel (host to device)
pub struct RttReader {
    down: DownChannel,
}

impl RttReader {
    pub fn new(down: DownChannel) -> Self {
        Self { down }
    }
}

impl SymbolSource for RttReader {
    fn try_read(&mut self) -> Option<u8> {
        // Non-blocking read from RTT down channel
        let mut byte = [0u8; 1];
        match self.down.read(&mut byte) {
            1 => Some(byte[0]),
            _ => None,
        }
    }
}

/// Diagnostic line writer over an RTT up channel (device to host)
pub struct RttWriter {
    channel: UpChannel,
}

impl RttWriter {
    pub fn new(channel: UpChannel) -> Self {
        Self { channel }
    }
}

impl fmt::Write for RttWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Trimmed instead of blocking when the host is not draining
        self.channel.write(s.as_bytes());
        Ok(())
    }
}

/// Combined RTT console
pub struct RttIo {
    reader: RttReader,
    writer: RttWriter,
}

impl RttIo {
    pub fn new(up_channel: UpChannel, down_channel: DownChannel) -> Self {
        Self {
            reader: RttReader::new(down_channel),
            writer: RttWriter::new(up_channel),
        }
    }

    pub fn split(self) -> (RttReader, RttWriter) {
        (self.reader, self.writer)
    }
}

//! Contains debug utilities for rendering decoded data in logs and text output.

use crate::frame::Frame;
use bitvec::prelude::*;

/// The number of bytes printed per row by [HexRows].
const BYTES_PER_ROW: usize = 16;
/// The number of bytes per space-separated group within a row.
const BYTES_PER_GROUP: usize = 8;

/// A wrapper whose [core::fmt::Display] implementation prints the data in rows of 16 bytes, each
/// row prefixed with its offset and split into two groups of 8, similar to how Wireshark prints
/// packets.
pub struct HexRows<'a>(pub &'a [u8]);

impl core::fmt::Display for HexRows<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (row_idx, row) in self.0.chunks(BYTES_PER_ROW).enumerate() {
            if row_idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{:04x}:", row_idx * BYTES_PER_ROW)?;
            for (group_idx, group) in row.chunks(BYTES_PER_GROUP).enumerate() {
                if group_idx > 0 {
                    write!(f, " ")?;
                }
                for byte in group {
                    write!(f, " {byte:02x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Logs the given data in the [HexRows] format, preceded by its length.
pub fn log_data_hex(log_level: log::Level, data: &[u8]) {
    log::log!(log_level, "Length: {} bytes\n{}", data.len(), HexRows(data));
}

/// A wrapper whose [core::fmt::Display] implementation prints bytes as the dibits they were
/// transferred as, in wire order: the first dibit printed for each byte is its bits 1:0, and bytes
/// are separated by `|`.
pub struct FormatDibits<'a>(pub &'a [u8]);

impl core::fmt::Display for FormatDibits<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (byte_idx, byte) in self.0.iter().enumerate() {
            if byte_idx > 0 {
                write!(f, " |")?;
            }
            for dibit in byte.view_bits::<Lsb0>().chunks(2) {
                write!(f, " {:02b}", dibit.load_le::<u8>())?;
            }
        }
        Ok(())
    }
}

/// The length of the destination and source addresses plus the EtherType.
const HEADER_SIZE: usize = 14;

/// A one-line summary of a frame: id, sample range, length, status, and the MAC header when enough
/// of it was received.
pub struct FormatFrameSummary<'a>(pub &'a Frame);

impl core::fmt::Display for FormatFrameSummary<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let frame = self.0;
        write!(f, "Frame #{} [{}..", frame.id, frame.start_index)?;
        if let Some(end_index) = frame.end_index {
            write!(f, "{end_index}")?;
        }
        write!(f, "] {} byte(s), {}", frame.bytes.len(), frame.status)?;

        let payload = frame.payload();
        if payload.len() >= HEADER_SIZE {
            write!(
                f,
                ", dst {}, src {}, type 0x{:02X}{:02X}",
                FormatMac(&payload[0..6]),
                FormatMac(&payload[6..12]),
                payload[12],
                payload[13],
            )?;
        }
        Ok(())
    }
}

struct FormatMac<'a>(&'a [u8]);

impl core::fmt::Display for FormatMac<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (idx, byte) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

use std::io::{Cursor, Read};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use byteorder::ReadBytesExt;

use crate::ofp_message::OfpSerializationError;

/// Six-byte Ethernet address.
pub type MacAddr = [u8; 6];

pub fn write_padding_bytes(bytes: &mut Vec<u8>, count: usize) {
    bytes.resize(bytes.len() + count, 0);
}

/// Pad `bytes` with zeros until its length is a multiple of eight.
pub fn pad_to_8(bytes: &mut Vec<u8>, start: usize) {
    let written = bytes.len() - start;
    write_padding_bytes(bytes, align_8(written) - written);
}

pub fn align_8(len: usize) -> usize {
    (len + 7) / 8 * 8
}

/// Number of bytes left to read in `bytes`.
pub fn remaining(bytes: &Cursor<&[u8]>) -> usize {
    let len = bytes.get_ref().len() as u64;
    len.saturating_sub(bytes.position()) as usize
}

/// Skip `count` bytes, failing if fewer are left.
pub fn skip(bytes: &mut Cursor<&[u8]>, count: usize) -> Result<(), OfpSerializationError> {
    if remaining(bytes) < count {
        return Err(OfpSerializationError::truncated("padding"));
    }
    bytes.set_position(bytes.position() + count as u64);
    Ok(())
}

/// Read exactly `count` bytes.
pub fn read_bytes(bytes: &mut Cursor<&[u8]>, count: usize) -> Result<Vec<u8>, OfpSerializationError> {
    let mut buf = vec![0; count];
    bytes.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read everything left in the cursor.
pub fn read_to_end(bytes: &mut Cursor<&[u8]>) -> Vec<u8> {
    let start = bytes.position() as usize;
    let rest = bytes.get_ref()[start..].to_vec();
    bytes.set_position(bytes.get_ref().len() as u64);
    rest
}

/// Read a NUL-padded string stored in a fixed-size field.
pub fn read_fixed_size_string(bytes: &mut Cursor<&[u8]>, max_capacity: usize)
                              -> Result<String, OfpSerializationError> {
    if remaining(bytes) < max_capacity {
        return Err(OfpSerializationError::truncated("fixed size string"));
    }
    let raw = read_bytes(bytes, max_capacity)?;
    let end = raw.iter().position(|c| *c == 0).unwrap_or(max_capacity);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// Write `value` into a fixed-size field, truncated and NUL padded.
pub fn write_fixed_size_string(bytes: &mut Vec<u8>, value: &str, max_capacity: usize) {
    let raw = value.as_bytes();
    let len = raw.len().min(max_capacity);
    bytes.extend_from_slice(&raw[..len]);
    write_padding_bytes(bytes, max_capacity - len);
}

pub fn read_mac(bytes: &mut Cursor<&[u8]>) -> Result<MacAddr, OfpSerializationError> {
    let mut mac = [0; 6];
    for byte in mac.iter_mut() {
        *byte = bytes.read_u8()?;
    }
    Ok(mac)
}

pub fn format_mac(mac: &MacAddr) -> String {
    mac.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Current time, read from the runtime clock so paused test clocks apply.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Lock `mutex`, recovering the guard if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size_string_stops_at_nul() {
        let mut raw = vec![];
        write_fixed_size_string(&mut raw, "eth1", 16);
        assert_eq!(raw.len(), 16);

        let mut bytes = Cursor::new(&raw[..]);
        assert_eq!(read_fixed_size_string(&mut bytes, 16).unwrap(), "eth1");
        assert_eq!(remaining(&bytes), 0);
    }

    #[test]
    fn test_fixed_size_string_requires_full_field() {
        let raw = [b'a'; 4];
        let mut bytes = Cursor::new(&raw[..]);
        assert!(read_fixed_size_string(&mut bytes, 16).is_err());
    }

    #[test]
    fn test_pad_to_8() {
        let mut bytes = vec![1, 2, 3];
        pad_to_8(&mut bytes, 0);
        assert_eq!(bytes.len(), 8);
        pad_to_8(&mut bytes, 0);
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn test_format_mac() {
        assert_eq!(format_mac(&[0, 0x1b, 0x21, 0xaa, 0xbb, 0x0c]), "00:1b:21:aa:bb:0c");
    }
}

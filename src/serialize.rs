//! Small binary-IO helpers shared by [`crate::connections::ConnectionsStore`]
//! and [`crate::stop_links::StopLinksDb`] so that the two on-disk formats in
//! §6 read and write with exactly the same primitives.

use std::io::{Read, Write};

use crate::error::{Error, Result};

pub(crate) fn write_u8<W: Write>(w: &mut W, value: u8) -> Result<()> {
    w.write_all(&[value])?;
    Ok(())
}

pub(crate) fn read_u8<R: Read>(r: &mut R, what: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|_| Error::Truncated(what))?;
    Ok(buf[0])
}

pub(crate) fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u32<R: Read>(r: &mut R, what: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| Error::Truncated(what))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn write_i64<W: Write>(w: &mut W, value: i64) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_i64<R: Read>(r: &mut R, what: &'static str) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| Error::Truncated(what))?;
    Ok(i64::from_le_bytes(buf))
}

pub(crate) fn write_guid<W: Write>(w: &mut W, guid: &[u8; 16]) -> Result<()> {
    w.write_all(guid)?;
    Ok(())
}

pub(crate) fn read_guid<R: Read>(r: &mut R) -> Result<[u8; 16]> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)
        .map_err(|_| Error::Truncated("road-network guid"))?;
    Ok(buf)
}

/// Writes a length-prefixed UTF-16 string: a `u32` code-unit count followed
/// by that many little-endian `u16`s, matching the profile-name field of the
/// `StopLinksDb` format.
pub(crate) fn write_utf16_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let units: Vec<u16> = s.encode_utf16().collect();
    write_u32(w, units.len() as u32)?;
    for unit in units {
        w.write_all(&unit.to_le_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_utf16_string<R: Read>(r: &mut R) -> Result<String> {
    let len = read_u32(r, "profile name length")? as usize;
    let mut units = Vec::with_capacity(len);
    for _ in 0..len {
        let mut buf = [0u8; 2];
        r.read_exact(&mut buf)
            .map_err(|_| Error::Truncated("profile name"))?;
        units.push(u16::from_le_bytes(buf));
    }
    String::from_utf16(&units).map_err(|_| Error::Truncated("profile name (invalid utf-16)"))
}

//! id Tech 3 BSP header and lump access (IBSP v46/v47)

use thiserror::Error;

pub const LUMP_COUNT: usize = 17;
pub const SUPPORTED_VERSIONS: [u32; 2] = [46, 47];
const HEADER_LEN: usize = 8 + LUMP_COUNT * 8;

/// Index of the entity string lump
pub const ENTITIES: usize = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BspError {
    #[error("invalid bsp header")]
    InvalidHeader,
    #[error("bsp data is truncated")]
    Truncated,
    #[error("unsupported bsp version {0}")]
    UnsupportedVersion(u32),
    #[error("bsp lump {0} out of bounds")]
    LumpOutOfBounds(usize),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Lump {
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BspHeader {
    pub version: u32,
    pub lumps: [Lump; LUMP_COUNT],
}

pub fn parse_header(data: &[u8]) -> Result<BspHeader, BspError> {
    if data.len() < 8 {
        return Err(BspError::Truncated);
    }
    if &data[0..4] != b"IBSP" {
        return Err(BspError::InvalidHeader);
    }
    let version = read_u32_le(&data[4..8]);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(BspError::UnsupportedVersion(version));
    }
    if data.len() < HEADER_LEN {
        return Err(BspError::Truncated);
    }

    let mut lumps = [Lump::default(); LUMP_COUNT];
    for (i, lump) in lumps.iter_mut().enumerate() {
        let base = 8 + i * 8;
        *lump = Lump {
            offset: read_u32_le(&data[base..base + 4]),
            length: read_u32_le(&data[base + 4..base + 8]),
        };
    }
    Ok(BspHeader { version, lumps })
}

/// Bytes of lump `index`, bounds-checked against `data`
pub fn lump_slice<'a>(data: &'a [u8], header: &BspHeader, index: usize) -> Result<&'a [u8], BspError> {
    let lump = header
        .lumps
        .get(index)
        .ok_or(BspError::LumpOutOfBounds(index))?;
    let start = lump.offset as usize;
    let end = start
        .checked_add(lump.length as usize)
        .ok_or(BspError::LumpOutOfBounds(index))?;
    data.get(start..end).ok_or(BspError::LumpOutOfBounds(index))
}

/// The entity string lump
pub fn entities_lump(data: &[u8]) -> Result<&[u8], BspError> {
    let header = parse_header(data)?;
    lump_slice(data, &header, ENTITIES)
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Minimal BSP whose only content is an entity lump
#[cfg(test)]
pub(crate) fn build_bsp(version: u32, entities: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; HEADER_LEN];
    data[0..4].copy_from_slice(b"IBSP");
    data[4..8].copy_from_slice(&version.to_le_bytes());
    data[8..12].copy_from_slice(&(HEADER_LEN as u32).to_le_bytes());
    data[12..16].copy_from_slice(&(entities.len() as u32).to_le_bytes());
    data.extend_from_slice(entities);
    data
}

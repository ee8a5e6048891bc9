//! Flat binary checkpoint for resuming long solves.
//!
//! Layout, all little-endian:
//! - width: u32
//! - height: u32
//! - iterations: u32
//! - potentials: width * height f64, row-major

use crate::error::{HarmonicError, Result};
use crate::field::HarmonicField;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const HEADER_SIZE: usize = 12;
// Upper bound on up-front allocation; the header is untrusted.
const MAX_PREALLOC: usize = 1 << 16;

/// Decoded checkpoint record.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub width: u32,
    pub height: u32,
    pub iterations: u32,
    pub values: Vec<f64>,
}

impl Checkpoint {
    pub fn from_field(field: &HarmonicField) -> Result<Self> {
        let width = u32::try_from(field.width())
            .map_err(|_| HarmonicError::Checkpoint("width exceeds u32".into()))?;
        let height = u32::try_from(field.height())
            .map_err(|_| HarmonicError::Checkpoint("height exceeds u32".into()))?;
        Ok(Self {
            width,
            height,
            iterations: field.sweeps(),
            values: field.values().to_vec(),
        })
    }
}

pub fn write_checkpoint<W: Write>(field: &HarmonicField, writer: &mut W) -> Result<()> {
    let checkpoint = Checkpoint::from_field(field)?;

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&checkpoint.width.to_le_bytes());
    header[4..8].copy_from_slice(&checkpoint.height.to_le_bytes());
    header[8..12].copy_from_slice(&checkpoint.iterations.to_le_bytes());
    writer.write_all(&header)?;

    for &v in &checkpoint.values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_checkpoint<R: Read>(reader: &mut R) -> Result<Checkpoint> {
    let mut header = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut header)
        .map_err(|e| HarmonicError::Checkpoint(format!("truncated header: {e}")))?;

    let word = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
    let width = word(0);
    let height = word(4);
    let iterations = word(8);

    if width == 0 || height == 0 {
        return Err(HarmonicError::Checkpoint(format!(
            "checkpoint has zero area ({width}x{height})"
        )));
    }
    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| HarmonicError::Checkpoint("dimensions overflow".into()))?;

    let mut values = Vec::with_capacity(count.min(MAX_PREALLOC));
    let mut buf = [0u8; 8];
    for i in 0..count {
        reader.read_exact(&mut buf).map_err(|e| {
            HarmonicError::Checkpoint(format!("truncated at potential {i} of {count}: {e}"))
        })?;
        values.push(f64::from_le_bytes(buf));
    }

    Ok(Checkpoint {
        width,
        height,
        iterations,
        values,
    })
}

pub fn save_checkpoint(field: &HarmonicField, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_checkpoint(field, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn load_checkpoint(path: &Path) -> Result<Checkpoint> {
    let mut reader = BufReader::new(File::open(path)?);
    read_checkpoint(&mut reader)
}

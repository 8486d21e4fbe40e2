use std::collections::BTreeMap;
use std::io::Write;

use super::{intervals_from_bits, Interval};
use crate::bits::BinnedBitset;
use crate::error::Result;

/// Writes `intervals` as tab-separated `chrom start end` lines
pub fn write_bed3<W: Write>(writer: &mut W, chrom: &str, intervals: &[Interval]) -> Result<()> {
    let mut buffer = itoa::Buffer::new();
    for iv in intervals {
        writer.write_all(chrom.as_bytes())?;
        writer.write_all(b"\t")?;
        writer.write_all(buffer.format(iv.start).as_bytes())?;
        writer.write_all(b"\t")?;
        writer.write_all(buffer.format(iv.end).as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Writes the set runs of every bitset, chromosomes in key order
pub fn write_bitsets_bed3<W: Write>(
    writer: &mut W,
    bitsets: &BTreeMap<String, BinnedBitset>,
) -> Result<()> {
    for (chrom, bits) in bitsets {
        write_bed3(writer, chrom, &intervals_from_bits(bits))?;
    }
    writer.flush()?;
    Ok(())
}

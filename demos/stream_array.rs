use std::fs::File;

use anyhow::Result;

use binspan::array::{BinnedArrayWriterBuilder, CacheMode, Codec, FileBinnedArray};

fn main() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("coverage.ba");

    // Stream a score for every tenth position, leaving the rest at the default
    let mut writer = BinnedArrayWriterBuilder::<f32>::default()
        .bin_size(1_024)
        .max_size(100_000)
        .codec(Codec::Zstd)
        .build(File::create(&path)?)?;
    for pos in 0..50_000 {
        if pos % 10 == 0 {
            writer.write(pos as f32 / 10.0)?;
        } else {
            writer.skip()?;
        }
    }
    writer.finish()?;
    eprintln!("Wrote {} positions to path: {}", writer.len(), path.display());
    drop(writer);

    // Read it back through a memory map, decompressing only the bins touched
    let mut array = FileBinnedArray::<f32, _>::open_mmap(&path, CacheMode::Lru(4))?;
    println!("Stored {} slots in bins of {}", array.max_size(), array.header().bin_size);
    for pos in [0, 10, 11, 49_990, 75_000] {
        println!("  position {pos}: {}", array.get(pos)?);
    }
    let window = array.get_range(1_000, 1_031)?;
    let scored = window.iter().filter(|v| !v.is_nan()).count();
    println!("{scored} of {} positions in [1000, 1031) carry a score", window.len());
    Ok(())
}

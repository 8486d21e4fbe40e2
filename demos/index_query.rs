use anyhow::Result;

use binspan::index::{IndexFile, Indexes};

fn main() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("features.idx");

    // Index a few features per chromosome, with a row number as payload
    let features = [
        ("chr1", 11_873, 14_409),
        ("chr1", 14_361, 29_370),
        ("chr1", 65_418, 71_585),
        ("chr2", 38_813, 46_870),
        ("chrX", 100_627, 100_639),
    ];
    let mut indexes = Indexes::new();
    for (row, &(name, start, end)) in features.iter().enumerate() {
        indexes.add(name, start, end, row as u32)?;
    }
    indexes.to_path(&path)?;
    eprintln!("Wrote {} sources to path: {}", indexes.len(), path.display());

    // Only the header and source table are read on open
    let mut file = IndexFile::open(&path)?;
    for (name, start, end) in [("chr1", 14_000, 15_000), ("chr2", 0, 1_000), ("chrY", 0, 10)] {
        let hits = file.find(name, start, end)?;
        println!("{name}:{start}-{end} -> {} hits", hits.len());
        for entry in hits {
            let (feature, _, _) = features[entry.payload as usize];
            println!("  {feature}:{}-{}", entry.start, entry.end);
        }
    }
    Ok(())
}

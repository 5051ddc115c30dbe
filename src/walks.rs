//! Walk codec (§6): a length-delimited binary message stream whose logical
//! content is a list of oriented `(node_id, is_reverse)` steps per named
//! walk.
//!
//! Grounded on `AssembleByAlignment.cpp`'s `outputRemappedReads` (which
//! writes one record per surviving subpath, `is_reverse = !end`) and
//! `ResolveSmallTangles.cpp`'s `loadAlignmentsAsPaths` (which reads them back
//! with the same negation). The original uses a protobuf message stream
//! (`vg::Alignment` via `stream::write_buffered`); that framing is an
//! external collaborator per SPEC_FULL.md §1, so this crate frames with
//! `bincode` the same way the overlap stream codec does.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::graph::{NodePos, Path};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalkRecord {
    name: String,
    steps: Vec<(usize, bool)>,
}

impl From<&Path> for WalkRecord {
    fn from(p: &Path) -> Self {
        WalkRecord {
            name: p.name.clone(),
            steps: p.position.iter().map(|pos| (pos.id, !pos.end)).collect(),
        }
    }
}

impl From<WalkRecord> for Path {
    fn from(r: WalkRecord) -> Self {
        Path {
            name: r.name,
            position: r
                .steps
                .into_iter()
                .map(|(id, is_reverse)| NodePos::new(id, !is_reverse))
                .collect(),
        }
    }
}

pub fn load_walks(path: &FsPath) -> Result<Vec<Path>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut result = Vec::new();
    loop {
        let mut len_buf = [0u8; 8];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let len = u64::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        let record: WalkRecord = bincode::deserialize(&buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        result.push(record.into());
    }
    Ok(result)
}

pub fn save_walks(paths: &[Path], path: &FsPath) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for p in paths {
        let record = WalkRecord::from(p);
        let bytes = bincode::serialize(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
        writer.write_all(&bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn walk_round_trips_byte_for_byte_semantics() {
        let path = temp_dir().join("tangleweave_test_walks.bin");
        let paths = vec![
            Path {
                name: "read1".to_string(),
                position: vec![NodePos::new(1, true), NodePos::new(2, false)],
            },
            Path {
                name: "read2".to_string(),
                position: vec![NodePos::new(5, true)],
            },
        ];
        save_walks(&paths, &path).unwrap();
        let loaded = load_walks(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "read1");
        assert_eq!(loaded[0].position, paths[0].position);
        assert_eq!(loaded[1].position, paths[1].position);
        let _ = std::fs::remove_file(&path);
    }
}

//! CSV point persistence
//!
//! One point per line, coordinates comma-separated with six decimals:
//!
//! ```text
//! 0.123457,0.987654,0.500000
//! 0.000001,0.250000,0.750000
//! ```
//!
//! Used for shard export, centroid output, and `--input` point sets. There is
//! no header row.

use crate::cluster::{CentroidSet, Shard};
use crate::Result;
use anyhow::Context;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write row-major `values` as CSV rows of `dim` coordinates
pub fn write_points(path: &Path, dim: usize, values: &[f64]) -> Result<()> {
    if dim == 0 {
        anyhow::bail!("Cannot write points with dim 0");
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for point in values.chunks_exact(dim) {
        let mut first = true;
        for value in point {
            if !first {
                write!(writer, ",")?;
            }
            write!(writer, "{:.6}", value)?;
            first = false;
        }
        writeln!(writer)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Read a CSV point set
///
/// Returns `(dim, values)` with `dim` taken from the first row. Blank lines
/// are skipped; a row with a different column count is an error.
pub fn read_points(path: &Path) -> Result<(usize, Vec<f64>)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut dim = 0;
    let mut values = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let before = values.len();
        for field in line.split(',') {
            let value: f64 = field.trim().parse().with_context(|| {
                format!("{}:{}: invalid coordinate '{}'", path.display(), index + 1, field.trim())
            })?;
            values.push(value);
        }

        let columns = values.len() - before;
        if dim == 0 {
            dim = columns;
        } else if columns != dim {
            anyhow::bail!(
                "{}:{}: expected {} columns, found {}",
                path.display(),
                index + 1,
                dim,
                columns
            );
        }
    }

    if dim == 0 {
        anyhow::bail!("{} contains no points", path.display());
    }

    Ok((dim, values))
}

/// Write the final centroids, one per row in cluster order
pub fn write_centroids(path: &Path, centroids: &CentroidSet) -> Result<()> {
    write_points(path, centroids.dim(), centroids.values())
}

/// Path of worker `rank`'s shard file inside `dir`
pub fn shard_path(dir: &Path, rank: usize) -> PathBuf {
    dir.join(format!("shard_{}.csv", rank))
}

/// Write a worker's shard to `dir/shard_<rank>.csv`, creating `dir` if needed
pub fn write_shard(dir: &Path, rank: usize, shard: &Shard) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;
    let path = shard_path(dir, rank);
    write_points(&path, shard.dim(), shard.values())?;
    Ok(path)
}

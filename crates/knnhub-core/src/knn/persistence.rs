//! Line-oriented text format for stored neighbor sets.
//!
//! ```text
//! size:<n>
//! k:<k>
//! <neighbor indices of instance 0, space separated>
//! <neighbor distances of instance 0, space separated>
//! ...
//! ```
//!
//! Sets are written at their stored width. A partially filled set (after
//! tabu exclusions) writes fewer than `k` entries; an empty set writes two
//! empty lines.

use super::neighbor_set::NeighborSet;
use super::NeighborSetEngine;
use crate::dataset::Labels;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const SIZE_PREFIX: &str = "size:";
const K_PREFIX: &str = "k:";

/// Neighbor sets parsed from the text format, before label validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborFile {
    /// Declared width.
    pub k: usize,
    /// One set per instance.
    pub sets: Vec<NeighborSet>,
}

impl NeighborSetEngine {
    /// Writes the stored neighbor sets to `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        tracing::info!(path = %path.as_ref().display(), n = self.len(), k = self.stored_k, "Neighbor sets saved");
        Ok(())
    }

    /// Writes the stored neighbor sets to any writer.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::Io`] on write failure.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.ensure_computed()?;
        writeln!(writer, "{SIZE_PREFIX}{}", self.len())?;
        writeln!(writer, "{K_PREFIX}{}", self.stored_k)?;
        for set in &self.sets {
            writeln!(writer, "{}", join(set.indices()))?;
            writeln!(writer, "{}", join(set.distances()))?;
        }
        Ok(())
    }

    /// Reads neighbor sets from `path` and rebuilds reverse sets and statistics.
    ///
    /// No distance matrix is attached; see
    /// [`NeighborSetEngine::with_distance_matrix`].
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read.
    /// - [`Error::Parse`] on a malformed file.
    /// - [`Error::SizeMismatch`] if the file and `labels` disagree on `n`.
    /// - [`Error::InvalidParameter`] on self or out-of-range neighbors.
    pub fn load(path: impl AsRef<Path>, labels: Labels) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let engine = Self::read_from(BufReader::new(file), labels)?;
        tracing::info!(path = %path.as_ref().display(), n = engine.len(), k = engine.k(), "Neighbor sets loaded");
        Ok(engine)
    }

    /// Reads neighbor sets from any buffered reader.
    ///
    /// # Errors
    ///
    /// Same as [`NeighborSetEngine::load`].
    pub fn read_from<R: BufRead>(reader: R, labels: Labels) -> Result<Self> {
        let file = read_neighbor_file(reader)?;
        if file.sets.len() != labels.len() {
            return Err(Error::SizeMismatch {
                expected: labels.len(),
                actual: file.sets.len(),
            });
        }
        Self::from_neighbor_sets(labels, file.sets, file.k)
    }
}

fn join<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses the text format.
///
/// Checks the headers (`k` must be below `size`), the entry counts,
/// ascending distances and duplicate neighbors. Index ranges are checked
/// against `n` as well, but not against the owner;
/// [`NeighborSetEngine::read_from`] does that.
///
/// # Errors
///
/// - [`Error::Io`] on read failure.
/// - [`Error::Parse`] with the 1-based line number of the first problem.
pub fn read_neighbor_file<R: BufRead>(reader: R) -> Result<NeighborFile> {
    let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));
    let mut next_line = |what: &str| -> Result<(usize, String)> {
        match lines.next() {
            Some((no, line)) => Ok((no, line?)),
            None => Err(Error::parse(0, format!("unexpected end of file, expected {what}"))),
        }
    };

    let (no, line) = next_line("size header")?;
    let n = header(&line, SIZE_PREFIX, no)?;
    let (no, line) = next_line("k header")?;
    let k = header(&line, K_PREFIX, no)?;
    if k == 0 {
        return Err(Error::parse(no, "k must be at least 1"));
    }
    if k >= n {
        return Err(Error::parse(no, format!("k = {k} needs more than {n} instances")));
    }

    let mut sets = Vec::new();
    for owner in 0..n {
        let (idx_no, idx_line) = next_line("neighbor indices")?;
        let (dist_no, dist_line) = next_line("neighbor distances")?;
        let indices: Vec<usize> = values(&idx_line, idx_no)?;
        let distances: Vec<f32> = values(&dist_line, dist_no)?;
        if indices.len() != distances.len() {
            return Err(Error::parse(
                dist_no,
                format!("{} indices but {} distances", indices.len(), distances.len()),
            ));
        }
        if indices.len() > k {
            return Err(Error::parse(idx_no, format!("{} neighbors exceed k = {k}", indices.len())));
        }
        if let Some(&bad) = indices.iter().find(|&&j| j >= n) {
            return Err(Error::parse(idx_no, format!("neighbor {bad} out of range for {n} instances")));
        }
        if distances.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(Error::parse(dist_no, "distances must be finite and non-negative"));
        }
        let set = NeighborSet::from_sorted(indices, distances, k).ok_or_else(|| {
            Error::parse(idx_no, format!("set {owner} is unsorted or repeats a neighbor"))
        })?;
        sets.push(set);
    }

    for (no, line) in lines {
        if !line?.trim().is_empty() {
            return Err(Error::parse(no, "trailing content after the last set"));
        }
    }
    Ok(NeighborFile { k, sets })
}

fn header(line: &str, prefix: &str, no: usize) -> Result<usize> {
    let value = line
        .trim()
        .strip_prefix(prefix)
        .ok_or_else(|| Error::parse(no, format!("expected '{prefix}<count>'")))?;
    value
        .trim()
        .parse()
        .map_err(|e| Error::parse(no, format!("invalid count '{value}': {e}")))
}

fn values<T>(line: &str, no: usize) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    line.split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|e| Error::parse(no, format!("invalid value '{token}': {e}")))
        })
        .collect()
}

//! External sort: sorted runs spilled to temp files, merged lazily with a heap.
//!
//! Run format: a sequence of entries, each a little-endian `u32` byte length followed by
//! the postcard encoding of `(KeyTuple, Row)`. Temp files are anonymous and vanish when
//! their reader is dropped.

use super::sort::Sort;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::stream::RowStream;
use crate::value::KeyTuple;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

type Keyed = (KeyTuple, Row);

fn spill_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Spill(format!("{context}: {e}"))
}

fn write_run(run: &[Keyed], dir: Option<&Path>) -> Result<File> {
    let file = match dir {
        Some(d) => tempfile::tempfile_in(d),
        None => tempfile::tempfile(),
    }
    .map_err(|e| spill_err("creating spill file", e))?;
    let mut w = BufWriter::new(file);
    for entry in run {
        let bytes = postcard::to_allocvec(entry).map_err(|e| spill_err("encoding row", e))?;
        let len = u32::try_from(bytes.len()).map_err(|e| spill_err("row too large", e))?;
        w.write_all(&len.to_le_bytes())
            .and_then(|()| w.write_all(&bytes))
            .map_err(|e| spill_err("writing spill file", e))?;
    }
    let mut file = w
        .into_inner()
        .map_err(|e| spill_err("flushing spill file", e.error()))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| spill_err("rewinding spill file", e))?;
    Ok(file)
}

struct RunReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl RunReader {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::new(file),
            buf: Vec::new(),
        }
    }

    fn read_entry(&mut self) -> Result<Option<Keyed>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(spill_err("reading spill file", e)),
        }
        self.buf.resize(u32::from_le_bytes(len) as usize, 0);
        self.reader
            .read_exact(&mut self.buf)
            .map_err(|e| spill_err("reading spill file", e))?;
        postcard::from_bytes(&self.buf)
            .map(Some)
            .map_err(|e| spill_err("decoding row", e))
    }
}

/// Heap entry; the greatest entry is the next one to emit.
struct HeapEntry {
    key: KeyTuple,
    row: Row,
    run: usize,
    descending: bool,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_key = if self.descending {
            self.key.cmp(&other.key)
        } else {
            other.key.cmp(&self.key)
        };
        // earlier runs first keeps equal keys in arrival order
        by_key.then_with(|| other.run.cmp(&self.run))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

struct MergeRuns {
    runs: Vec<RunReader>,
    heap: BinaryHeap<HeapEntry>,
    descending: bool,
    failed: bool,
}

impl MergeRuns {
    fn new(files: Vec<File>, descending: bool) -> Result<Self> {
        let mut merge = Self {
            runs: files.into_iter().map(RunReader::new).collect(),
            heap: BinaryHeap::new(),
            descending,
            failed: false,
        };
        for run in 0..merge.runs.len() {
            merge.refill(run)?;
        }
        Ok(merge)
    }

    fn refill(&mut self, run: usize) -> Result<()> {
        if let Some((key, row)) = self.runs[run].read_entry()? {
            self.heap.push(HeapEntry {
                key,
                row,
                run,
                descending: self.descending,
            });
        }
        Ok(())
    }
}

impl Iterator for MergeRuns {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        if self.failed {
            return None;
        }
        let entry = self.heap.pop()?;
        if let Err(e) = self.refill(entry.run) {
            self.failed = true;
            return Some(Err(e));
        }
        Some(Ok(entry.row))
    }
}

/// Sort `input` in runs of at most `threshold` rows, spilling each full run to disk.
///
/// Input that never exceeds `threshold` rows is sorted in memory without touching disk.
pub(crate) fn external_sort<'a>(
    sort: &Sort,
    input: RowStream<'a>,
    threshold: usize,
    dir: Option<&Path>,
) -> Result<RowStream<'a>> {
    let threshold = threshold.max(1);
    let mut files = Vec::new();
    let mut run: Vec<Keyed> = Vec::with_capacity(threshold.min(1 << 16));
    let mut total = 0usize;

    for row in input {
        let row = row?;
        run.push((row.key(sort.keys())?, row));
        total += 1;
        if run.len() == threshold {
            run.sort_by(|(a, _), (b, _)| sort.compare(a, b));
            files.push(write_run(&run, dir)?);
            debug!(run = files.len(), rows = run.len(), "spilled sorted run");
            run.clear();
        }
    }

    if files.is_empty() {
        run.sort_by(|(a, _), (b, _)| sort.compare(a, b));
        return Ok(Box::new(run.into_iter().map(|(_, row)| Ok(row))));
    }
    if !run.is_empty() {
        run.sort_by(|(a, _), (b, _)| sort.compare(a, b));
        files.push(write_run(&run, dir)?);
    }
    info!(rows = total, runs = files.len(), "merging spilled sort runs");
    Ok(Box::new(MergeRuns::new(files, sort.is_descending())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn run_file_round_trips_entries() -> Result<()> {
        let entries: Vec<Keyed> = (0..3)
            .map(|i| (KeyTuple(vec![i.into()]), row! { "i" => i, "s" => "x" }))
            .collect();
        let mut reader = RunReader::new(write_run(&entries, None)?);
        for expected in &entries {
            assert_eq!(reader.read_entry()?.as_ref(), Some(expected));
        }
        assert!(reader.read_entry()?.is_none());
        Ok(())
    }

    #[test]
    fn heap_breaks_ties_by_run() {
        let mut heap = BinaryHeap::new();
        for run in [2, 0, 1] {
            heap.push(HeapEntry {
                key: KeyTuple(vec![1.into()]),
                row: row! { "run" => run },
                run,
                descending: false,
            });
        }
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|e| e.run)).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}

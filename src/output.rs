use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::solver::Snapshot;

/// One persisted block of a case's trajectory. Segments of a case carry
/// strictly increasing indices; concatenating their records in index
/// order reproduces the append sequence exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSegment {
    pub case: String,
    pub index: u64,
    pub records: Vec<Snapshot>,
}

/// Serialization view over the buffered records, so a failed flush keeps
/// the buffer intact. Field names must match `ResultSegment`.
#[derive(Serialize)]
struct SegmentRef<'a> {
    case: &'a str,
    index: u64,
    records: &'a [Snapshot],
}

/// Buffers snapshots for one case and writes them out as CBOR segment
/// files, rolling to a new segment whenever the estimated serialized size
/// reaches the configured threshold. Files land as
/// `<case>_<index>.cbor` via a temporary name and an atomic rename, so a
/// crash or write failure never leaves a truncated segment behind and
/// never touches segments already on disk.
///
/// Each writer belongs to exactly one solver.
pub struct ResultWriter {
    dir: PathBuf,
    case: String,
    segment_bytes: usize,
    records: Vec<Snapshot>,
    estimated_bytes: usize,
    next_index: u64,
}

impl ResultWriter {
    pub fn new<P: Into<PathBuf>>(dir: P, case: &str, segment_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            case: case.to_string(),
            segment_bytes,
            records: Vec::new(),
            estimated_bytes: 0,
            next_index: 0,
        }
    }

    /// Buffer one record, flushing if the running size estimate has
    /// reached the segment threshold. The estimate counts 8 bytes per
    /// stored float.
    pub fn append(&mut self, snapshot: Snapshot) -> Result<(), Error> {
        self.estimated_bytes += 8 * (1 + snapshot.values.len());
        self.records.push(snapshot);
        if self.estimated_bytes >= self.segment_bytes {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the buffered records as the next segment. A writer with an
    /// empty buffer writes nothing.
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.records.is_empty() {
            return Ok(());
        }
        let path = self.segment_path(self.next_index);
        let tmp = self.dir.join(format!("{}_{:04}.cbor.tmp", self.case, self.next_index));
        let segment = SegmentRef {
            case: &self.case,
            index: self.next_index,
            records: &self.records,
        };

        let written = (|| -> io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let file = File::create(&tmp)?;
            let mut buffer = BufWriter::new(file);
            ciborium::ser::into_writer(&segment, &mut buffer).map_err(|e| match e {
                ciborium::ser::Error::Io(err) => err,
                other => io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", other)),
            })?;
            buffer.flush()?;
            fs::rename(&tmp, &path)
        })();

        if let Err(source) = written {
            return Err(Error::Io {
                case: self.case.clone(),
                path,
                source,
            });
        }
        debug!(
            "[{}] flushed segment {} with {} records to {}",
            self.case,
            self.next_index,
            self.records.len(),
            path.display()
        );
        self.records.clear();
        self.estimated_bytes = 0;
        self.next_index += 1;
        Ok(())
    }

    /// Flush the residual partial segment and report how many segments
    /// this writer produced in total.
    pub fn finalize(mut self) -> Result<u64, Error> {
        self.flush()?;
        Ok(self.next_index)
    }

    pub fn segments_written(&self) -> u64 {
        self.next_index
    }

    pub fn pending(&self) -> usize {
        self.records.len()
    }

    fn segment_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}_{:04}.cbor", self.case, index))
    }
}

/// Read one segment file back.
pub fn read_segment(path: &Path) -> Result<ResultSegment, Error> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("segment")
        .to_string();
    let wrap = |source: io::Error| Error::Io {
        case: stem.clone(),
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(wrap)?;
    ciborium::de::from_reader(file).map_err(|e| match e {
        ciborium::de::Error::Io(err) => wrap(err),
        other => wrap(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{:?}", other),
        )),
    })
}

/// Concatenate every segment of a case, in index order, back into the
/// original append sequence.
pub fn load_case(dir: &Path, case: &str) -> Result<Vec<Snapshot>, Error> {
    let wrap = |source: io::Error| Error::Io {
        case: case.to_string(),
        path: dir.to_path_buf(),
        source,
    };
    let prefix = format!("{}_", case);

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(wrap)? {
        let entry = entry.map_err(wrap)?;
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };
        let digits = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".cbor"));
        if let Some(digits) = digits {
            if let Ok(index) = digits.parse::<u64>() {
                paths.push((index, entry.path()));
            }
        }
    }
    paths.sort();

    let mut records = Vec::new();
    for (_, path) in &paths {
        let segment = read_segment(path)?;
        records.extend(segment.records);
    }
    Ok(records)
}

// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::config::SolveConfig;
    use crate::geometry::GeometryProfile;
    use crate::series::{BoundaryCondition, FlowFieldSeries};
    use crate::solver::AdvectionSolver;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn snap(time: f64) -> Snapshot {
        Snapshot {
            time,
            values: vec![time, time + 1.0],
        }
    }

    #[test]
    fn segments_roll_exactly_at_the_size_threshold() {
        let dir = TempDir::new().unwrap();

        // two-value snapshots estimate to 24 bytes each
        let mut writer = ResultWriter::new(dir.path(), "rho", 72);
        writer.append(snap(0.0)).unwrap();
        writer.append(snap(1.0)).unwrap();
        assert_eq!(writer.segments_written(), 0);
        assert_eq!(writer.pending(), 2);

        writer.append(snap(2.0)).unwrap();
        assert_eq!(writer.segments_written(), 1);
        assert_eq!(writer.pending(), 0);
        assert!(dir.path().join("rho_0000.cbor").exists());

        writer.append(snap(3.0)).unwrap();
        let segments = writer.finalize().unwrap();
        assert_eq!(segments, 2);
        assert!(dir.path().join("rho_0001.cbor").exists());

        // nothing half-written stays behind
        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().into_string().unwrap();
            assert!(name.ends_with(".cbor"), "unexpected file {}", name);
        }
    }

    #[test]
    fn concatenated_segments_reproduce_the_append_sequence() {
        let dir = TempDir::new().unwrap();
        let mut writer = ResultWriter::new(dir.path(), "mu", 3 * 24);
        let appended: Vec<Snapshot> = (0..8).map(|k| snap(k as f64 * 0.25)).collect();
        for record in &appended {
            writer.append(record.clone()).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = load_case(dir.path(), "mu").unwrap();
        assert_eq!(loaded, appended);
    }

    #[test]
    fn an_empty_writer_finalizes_to_no_files() {
        let dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(dir.path(), "rho", 1024);
        assert_eq!(writer.finalize().unwrap(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn loading_a_case_skips_other_cases_and_leftover_tmp_files() {
        let dir = TempDir::new().unwrap();

        let mut rho = ResultWriter::new(dir.path(), "rho", 1024);
        rho.append(snap(0.0)).unwrap();
        rho.finalize().unwrap();

        let mut other = ResultWriter::new(dir.path(), "rho_extra", 1024);
        other.append(snap(9.0)).unwrap();
        other.finalize().unwrap();

        fs::write(dir.path().join("rho_0001.cbor.tmp"), b"partial").unwrap();

        let loaded = load_case(dir.path(), "rho").unwrap();
        assert_eq!(loaded, vec![snap(0.0)]);
    }

    #[test]
    fn a_segment_file_round_trips_through_cbor() {
        let dir = TempDir::new().unwrap();
        let mut writer = ResultWriter::new(dir.path(), "tref", 1024);
        writer.append(snap(1.5)).unwrap();
        writer.append(snap(2.5)).unwrap();
        writer.finalize().unwrap();

        let segment = read_segment(&dir.path().join("tref_0000.cbor")).unwrap();
        assert_eq!(segment.case, "tref");
        assert_eq!(segment.index, 0);
        assert_eq!(segment.records, vec![snap(1.5), snap(2.5)]);
    }

    #[test]
    fn a_solver_trajectory_survives_persistence_bit_for_bit() {
        let dir = TempDir::new().unwrap();
        let geometry = Arc::new(GeometryProfile::build(1000.0, 100.0, |_| 1.0).unwrap());
        let samples: Vec<_> = (0..5).map(|k| (k as f64 * 600.0, 0.4)).collect();
        let flow = Arc::new(FlowFieldSeries::build(&samples, 1000.0).unwrap());
        let boundary = BoundaryCondition::build(&[(0.0, 850.0)]).unwrap();
        let config = SolveConfig::new("rho")
            .with_uniform_initial(870.0)
            .with_log_levels(vec![])
            .with_segment_bytes(2 * 88)
            .with_output_dir(dir.path());

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();
        let stats = solver.run().unwrap();
        assert_eq!(stats.macro_steps, 4);
        assert_eq!(stats.snapshots, 5);
        assert!(stats.segments >= 2);

        let loaded = load_case(dir.path(), "rho").unwrap();
        assert_eq!(loaded.len(), 5);
        let times: Vec<f64> = loaded.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 600.0, 1200.0, 1800.0, 2400.0]);
        for record in &loaded {
            assert_eq!(record.values.len(), 10);
        }
        assert_eq!(loaded[0].values, vec![870.0; 10]);
    }
}

// Timing profiler
// Collects decode and frame timings and writes a summary when the viewer exits

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub struct Profiler {
    path: PathBuf,
    out: BufWriter<File>,
    measurements: BTreeMap<String, Vec<Duration>>,
    counters: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementStats {
    pub count: usize,
    pub total_time: Duration,
    pub average_time: Duration,
    pub min_time: Duration,
    pub max_time: Duration,
}

impl Profiler {
    /// Create the output file up front so a bad path fails before any work is done
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create profile file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            measurements: BTreeMap::new(),
            counters: BTreeMap::new(),
        })
    }

    pub fn add_measurement(&mut self, name: &str, duration: Duration) {
        debug!("profile {}: {:?}", name, duration);
        self.measurements
            .entry(name.to_string())
            .or_default()
            .push(duration);
    }

    pub fn increment_counter(&mut self, name: &str) {
        *self.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn stats(&self, name: &str) -> Option<MeasurementStats> {
        let measurements = self.measurements.get(name)?;
        let min_time = *measurements.iter().min()?;
        let max_time = *measurements.iter().max()?;
        let total_time: Duration = measurements.iter().sum();
        Some(MeasurementStats {
            count: measurements.len(),
            total_time,
            average_time: total_time / measurements.len() as u32,
            min_time,
            max_time,
        })
    }

    /// Write the summary and flush the file
    pub fn finish(mut self) -> Result<()> {
        let names: Vec<String> = self.measurements.keys().cloned().collect();
        for name in names {
            if let Some(s) = self.stats(&name) {
                writeln!(
                    self.out,
                    "{} count={} total={:?} avg={:?} min={:?} max={:?}",
                    name, s.count, s.total_time, s.average_time, s.min_time, s.max_time
                )?;
            }
        }
        for (name, value) in &self.counters {
            writeln!(self.out, "{} {}", name, value)?;
        }
        self.out
            .flush()
            .with_context(|| format!("Failed to write profile file: {}", self.path.display()))?;
        info!("Profile written to {}", self.path.display());
        Ok(())
    }
}

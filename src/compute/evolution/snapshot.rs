//! Snapshots of the best render, handed to a sink for persistence.

use std::fs;
use std::path::PathBuf;

use crate::compute::Canvas;
use crate::schema::SnapshotConfig;

/// Errors raised while persisting a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    Encode(#[from] image::ImageError),
}

/// Best genome of a generation, rendered onto the background.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Generation number (1-based).
    pub generation: usize,
    /// Raw fitness of the rendered genome.
    pub fitness: f64,
    pub canvas: Canvas,
}

/// Receives snapshots as the run produces them.
pub trait SnapshotSink {
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
}

/// Collects snapshots in memory.
impl SnapshotSink for Vec<Snapshot> {
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.push(snapshot.clone());
        Ok(())
    }
}

/// Writes each snapshot to `<output_dir>/<prefix><generation>.png`.
#[derive(Debug, Clone)]
pub struct PngSnapshotWriter {
    output_dir: PathBuf,
    prefix: String,
}

impl PngSnapshotWriter {
    /// Create the writer, creating `output_dir` if needed.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Result<Self, SnapshotError> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            prefix: prefix.into(),
        })
    }

    pub fn from_config(config: &SnapshotConfig) -> Result<Self, SnapshotError> {
        Self::new(&config.output_dir, config.prefix.clone())
    }

    /// Path the snapshot for `generation` is written to.
    pub fn path_for(&self, generation: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}{generation}.png", self.prefix))
    }
}

impl SnapshotSink for PngSnapshotWriter {
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let path = self.path_for(snapshot.generation);
        snapshot.canvas.to_rgb_image().save(&path)?;
        log::info!(
            "Wrote snapshot {} (fitness {:.6})",
            path.display(),
            snapshot.fitness
        );
        Ok(())
    }
}

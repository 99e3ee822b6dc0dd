/// Pipeline Module
///
/// Orchestrates the complete ETL run: every song file, then every log file,
/// each file extracted, transformed, loaded and committed before the next one
/// starts, with statistics tracking.
use crate::{
    error::EtlError,
    etl::{
        self,
        load::{LoadCounts, Warehouse},
        locate, DataKind,
    },
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Where a run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    SchemaReady,
    Loading(DataKind),
    Done,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Uninitialized => write!(f, "Uninitialized"),
            PipelineState::SchemaReady => write!(f, "SchemaReady"),
            PipelineState::Loading(kind) => write!(f, "Loading({})", kind),
            PipelineState::Done => write!(f, "Done"),
            PipelineState::Failed => write!(f, "Failed"),
        }
    }
}

/// File counters for one phase
#[derive(Debug, Clone, Default)]
pub struct PhaseStats {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
}

/// Pipeline execution statistics
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub songs: PhaseStats,
    pub logs: PhaseStats,
    pub rows: LoadCounts,
    pub elapsed_time: Duration,
    pub errors: Vec<PipelineError>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase_mut(&mut self, kind: DataKind) -> &mut PhaseStats {
        match kind {
            DataKind::Song => &mut self.songs,
            DataKind::Log => &mut self.logs,
        }
    }

    pub fn match_rate(&self) -> f64 {
        if self.rows.songplays == 0 {
            0.0
        } else {
            (self.rows.songplays_matched as f64 / self.rows.songplays as f64) * 100.0
        }
    }
}

/// A file that was skipped, with the reason
#[derive(Debug, Clone)]
pub struct PipelineError {
    pub kind: DataKind,
    pub path: PathBuf,
    pub message: String,
}

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub song_root: PathBuf,
    pub log_root: PathBuf,
    /// Skip files that fail to parse instead of aborting the run
    pub skip_invalid_files: bool,
}

/// Main ETL Pipeline
pub struct Pipeline<W> {
    warehouse: W,
    config: PipelineConfig,
    state: PipelineState,
}

impl<W: Warehouse> Pipeline<W> {
    /// Create a new pipeline instance
    pub fn new(warehouse: W, config: PipelineConfig) -> Self {
        Self { warehouse, config, state: PipelineState::Uninitialized }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Record that the schema has been created or verified
    pub fn schema_ready(&mut self) -> Result<(), EtlError> {
        if self.state != PipelineState::Uninitialized {
            return Err(EtlError::InvalidState(format!("schema cannot become ready from state {}", self.state)));
        }

        self.state = PipelineState::SchemaReady;
        Ok(())
    }

    #[allow(dead_code)]
    pub fn into_warehouse(self) -> W {
        self.warehouse
    }

    /// Run the song phase, then the log phase. The first error ends the run.
    pub async fn run(&mut self) -> Result<PipelineStats, EtlError> {
        if self.state != PipelineState::SchemaReady {
            return Err(EtlError::InvalidState(format!("cannot start loading from state {}", self.state)));
        }

        let start_time = Instant::now();
        let mut stats = PipelineStats::new();

        tracing::info!(
            "Starting pipeline: songs from {}, logs from {}",
            self.config.song_root.display(),
            self.config.log_root.display()
        );

        for kind in [DataKind::Song, DataKind::Log] {
            self.state = PipelineState::Loading(kind);
            let root = match kind {
                DataKind::Song => self.config.song_root.clone(),
                DataKind::Log => self.config.log_root.clone(),
            };

            if let Err(err) = self.run_phase(kind, &root, &mut stats).await {
                self.state = PipelineState::Failed;
                tracing::error!("Pipeline failed while loading {} files: {}", kind, err);
                return Err(err);
            }
        }

        self.state = PipelineState::Done;
        stats.elapsed_time = start_time.elapsed();

        self.print_final_stats(&stats);
        Ok(stats)
    }

    async fn run_phase(&mut self, kind: DataKind, root: &Path, stats: &mut PipelineStats) -> Result<(), EtlError> {
        let files = locate::find_data_files(root)?;
        let total = files.len();
        stats.phase_mut(kind).files_found = total;

        println!("{} files found in {}", total, root.display());

        for (i, path) in files.iter().enumerate() {
            self.load_file(kind, path, stats).await?;
            println!("{}/{} files processed.", i + 1, total);
        }

        Ok(())
    }

    /// Load one file inside its own transaction
    async fn load_file(&mut self, kind: DataKind, path: &Path, stats: &mut PipelineStats) -> Result<(), EtlError> {
        match etl::process_file(&mut self.warehouse, kind, path).await {
            Ok(counts) => {
                self.warehouse.commit_file().await?;
                stats.rows += counts;
                stats.phase_mut(kind).files_processed += 1;
                tracing::debug!("Committed {} file {}", kind, path.display());
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self.warehouse.rollback_file().await {
                    tracing::warn!("Rollback after failed file {} also failed: {}", path.display(), rollback_err);
                }

                if err.is_parse() && self.config.skip_invalid_files {
                    tracing::warn!("Skipping {} file: {}", kind, err);
                    stats.phase_mut(kind).files_skipped += 1;
                    stats.errors.push(PipelineError { kind, path: path.to_path_buf(), message: err.to_string() });
                    return Ok(());
                }

                Err(err)
            }
        }
    }

    /// Print final statistics
    fn print_final_stats(&self, stats: &PipelineStats) {
        println!("\n📊 Pipeline Statistics:");
        println!("   ⏱️  Total time: {:.2}s", stats.elapsed_time.as_secs_f64());
        println!(
            "   🎵 Song files: {} found, {} processed, {} skipped",
            stats.songs.files_found, stats.songs.files_processed, stats.songs.files_skipped
        );
        println!(
            "   📜 Log files: {} found, {} processed, {} skipped",
            stats.logs.files_found, stats.logs.files_processed, stats.logs.files_skipped
        );
        println!(
            "   💾 Rows: {} songs, {} artists, {} users, {} time, {} songplays",
            stats.rows.songs, stats.rows.artists, stats.rows.users, stats.rows.time_rows, stats.rows.songplays
        );
        println!("   🔗 Songplays with a known song: {} ({:.1}%)", stats.rows.songplays_matched, stats.match_rate());

        if !stats.errors.is_empty() {
            println!("\n❌ Files skipped: {}", stats.errors.len());
            for (i, error) in stats.errors.iter().take(5).enumerate() {
                println!("   {}. [{}] {}: {}", i + 1, error.kind, error.path.display(), error.message);
            }
            if stats.errors.len() > 5 {
                println!("   ... and {} more errors", stats.errors.len() - 5);
            }
        }
    }
}

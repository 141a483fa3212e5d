use super::{HookContext, ParameterServerHook, Stage};
use anyhow::Result;
use log::{info, warn};
use mava_core::parameters::ParameterSnapshot;
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Name of the checkpoint file in the checkpoint directory.
pub const CHECKPOINT_FILE: &str = "parameters.bin";

/// Saves and restores the parameter store.
///
/// At [`Stage::InitCheckpointer`] the store is restored from
/// `<dir>/parameters.bin` if the file exists. At
/// [`Stage::RunLoopCheckpoint`] the store is saved when the interval has
/// elapsed since the last save. Failures to save are logged and do not
/// interrupt the server.
pub struct Checkpointer {
    dir: PathBuf,
    interval: Duration,
    last_save: Instant,
    n_saved: usize,
}

impl Checkpointer {
    /// Creates a checkpointer saving every `minutes` into `dir`.
    pub fn new(dir: impl Into<PathBuf>, minutes: f64) -> Self {
        Self {
            dir: dir.into(),
            interval: Duration::from_secs_f64(minutes.max(0.0) * 60.0),
            last_save: Instant::now(),
            n_saved: 0,
        }
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Number of checkpoints written.
    pub fn n_saved(&self) -> usize {
        self.n_saved
    }

    /// Writes a snapshot through a temporary file renamed into place.
    pub fn save(&self, snapshot: &ParameterSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{}.tmp", CHECKPOINT_FILE));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, self.path())?;
        Ok(())
    }

    /// Reads the snapshot of a checkpoint file.
    pub fn load(path: impl AsRef<Path>) -> Result<ParameterSnapshot> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(rdr)?)
    }

    fn restore(&self, ctx: &mut HookContext<'_>) {
        let path = self.path();
        if !path.exists() {
            info!("No checkpoint in {:?}, starting from initial parameters", self.dir);
            return;
        }
        match Self::load(&path) {
            Ok(snapshot) => {
                let version = snapshot.version;
                let n = ctx.store.restore(snapshot);
                info!(
                    "Restored {} parameters of version {} from {:?}",
                    n, version, path
                );
            }
            Err(e) => warn!("Failed to read checkpoint {:?}: {}", path, e),
        }
    }
}

impl ParameterServerHook for Checkpointer {
    fn name(&self) -> &str {
        "checkpointer"
    }

    fn on_stage(&mut self, stage: Stage, ctx: &mut HookContext<'_>) -> Result<()> {
        match stage {
            Stage::InitCheckpointer => {
                self.restore(ctx);
                self.last_save = Instant::now();
            }
            Stage::RunLoopCheckpoint
                if ctx.force_checkpoint || self.last_save.elapsed() >= self.interval =>
            {
                match self.save(&ctx.store.snapshot()) {
                    Ok(()) => {
                        self.n_saved += 1;
                        info!(
                            "Saved parameters of version {} to {:?}",
                            ctx.store.version(),
                            self.path()
                        );
                    }
                    Err(e) => warn!("Failed to save checkpoint to {:?}: {}", self.path(), e),
                }
                self.last_save = Instant::now();
            }
            _ => {}
        }
        Ok(())
    }
}

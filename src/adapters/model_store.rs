//! Saved-model directory layout: `<dir>/<name>/<name>.json` plus
//! `<dir>/<name>/<name>_metadata.json`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::error::PipsentryError;
use crate::ports::agent_port::Agent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub agent: String,
    pub pair: String,
    pub timeframe: String,
    pub trained_at: NaiveDateTime,
    pub timesteps: usize,
}

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ModelStore { dir: dir.into() }
    }

    /// Conventional model name for a pair, e.g. `q_table_EURUSD`.
    pub fn default_name(agent: &str, pair: &str) -> String {
        format!("{}_{}", agent, pair)
    }

    pub fn model_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join(format!("{}.json", name))
    }

    pub fn metadata_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join(format!("{}_metadata.json", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.model_path(name).is_file()
    }

    pub fn save(
        &self,
        agent: &dyn Agent,
        name: &str,
        metadata: &ModelMetadata,
    ) -> Result<PathBuf, PipsentryError> {
        fs::create_dir_all(self.dir.join(name))?;
        let model_path = self.model_path(name);
        agent.save(&model_path)?;

        let metadata_path = self.metadata_path(name);
        let writer = BufWriter::new(File::create(&metadata_path)?);
        serde_json::to_writer_pretty(writer, metadata).map_err(|e| {
            PipsentryError::ModelFormat {
                path: metadata_path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        info!(path = %model_path.display(), agent = agent.name(), "model saved");
        Ok(model_path)
    }

    pub fn load(&self, agent: &mut dyn Agent, name: &str) -> Result<(), PipsentryError> {
        let model_path = self.model_path(name);
        if !model_path.is_file() {
            return Err(PipsentryError::ModelNotFound {
                path: model_path.display().to_string(),
            });
        }
        agent.load(&model_path)
    }

    pub fn load_metadata(&self, name: &str) -> Result<ModelMetadata, PipsentryError> {
        read_metadata(&self.metadata_path(name))
    }
}

fn read_metadata(path: &Path) -> Result<ModelMetadata, PipsentryError> {
    if !path.is_file() {
        return Err(PipsentryError::ModelNotFound {
            path: path.display().to_string(),
        });
    }
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|e| PipsentryError::ModelFormat {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

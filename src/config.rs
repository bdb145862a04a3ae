use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use glimmer_runtime::SchedulerConfig;
use glimmer_world::WorldConfig;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub world: WorldConfig,
    /// Block table; the built-in table is used when absent.
    pub blocks: Option<PathBuf>,
    pub scenario: ScenarioConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Chunks loaded in each direction around the origin chunk.
    pub radius: i32,
    pub ground_y: i32,
    pub ground: String,
    pub torches: Vec<[i32; 3]>,
    pub lanterns: Vec<[i32; 3]>,
    /// Column (x, z) dug down from the surface and then capped.
    pub shaft: Option<[i32; 2]>,
    pub shaft_depth: i32,
    pub max_ticks: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            ground_y: 40,
            ground: "stone".into(),
            torches: vec![[4, 40, 4], [15, 40, 8]],
            lanterns: Vec::new(),
            shaft: Some([8, 8]),
            shaft_depth: 6,
            max_ticks: 256,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&text)?;
        Ok(cfg)
    }
}

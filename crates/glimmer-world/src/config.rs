use glimmer_geom::WorldHeight;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorldConfig {
    pub min_y: i32,
    pub height: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let h = WorldHeight::default();
        Self {
            min_y: h.min_y,
            height: h.height,
        }
    }
}

impl WorldConfig {
    pub fn world_height(&self) -> WorldHeight {
        WorldHeight::new(self.min_y, self.height)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

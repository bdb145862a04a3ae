use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BlocksConfig {
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    /// Defaults to fully opaque.
    #[serde(default)]
    pub opacity: Option<u8>,
    #[serde(default)]
    pub emission: Option<u8>,
}

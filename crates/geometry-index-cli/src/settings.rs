use clap::Parser;
use geometry_index::IndexConfig;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Geometry Index - Load georeferenced documents and run bounding-box queries against them
pub struct Settings {
    /// Document files to index (one "<id><TAB><WKT>" per line)
    #[clap(short, long, value_name = "FILE")]
    pub documents: Vec<PathBuf>,

    /// Bounding boxes to query, as "minx,miny,maxx,maxy" (repeatable)
    #[clap(short, long, value_name = "BBOX", allow_hyphen_values = true)]
    pub bbox: Vec<String>,

    /// Predicate: equals, intersects, touches, crosses, within, contains, overlaps
    #[clap(short, long)]
    pub operator: Option<String>,

    /// JSON file with the index configuration
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Index name (overrides the configuration file)
    #[clap(long)]
    pub name: Option<String>,

    /// Maximum entries per R-tree node (overrides the configuration file)
    #[clap(long)]
    pub max_node_entries: Option<usize>,

    /// Print the stored WKT of every match
    #[clap(long, default_value = "false")]
    pub show_geometry: bool,

    /// Print results as JSON
    #[clap(long, default_value = "false")]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Settings {
    /// Parse the process arguments
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Index configuration: file (if any), then command line overrides
    pub fn index_config(&self) -> Result<IndexConfig, SettingsError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => IndexConfig::default(),
        };

        if let Some(name) = &self.name {
            config = config.with_name(name.clone());
        }
        if let Some(max_node_entries) = self.max_node_entries {
            config = config.with_max_node_entries(max_node_entries);
        }

        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<IndexConfig, SettingsError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

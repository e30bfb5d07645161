//! geometry-index command line front-end
//!
//! Loads document files into a [`GeometryIndex`] and answers each `--bbox` with the
//! ids of the documents that satisfy the requested predicate.

mod logging;
mod settings;

use geometry_index::{DocumentId, GeometryIndex, IndexError, loader};
use serde::Serialize;
use settings::{Settings, SettingsError};
use std::collections::BTreeMap;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("{path}: {source}")]
    Load {
        path: String,
        source: IndexError,
    },

    #[error("Query '{bbox}' rejected: {source}")]
    Query { bbox: String, source: IndexError },

    #[error("Cannot encode results: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result of one bounding-box query
#[derive(Debug, Serialize)]
struct QueryOutput {
    bbox: String,
    operator: String,
    ids: Vec<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometries: Option<BTreeMap<DocumentId, String>>,
}

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::from_cli();

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<(), CliError> {
    let config = settings.index_config()?;
    let mut index = GeometryIndex::new(config);

    for path in &settings.documents {
        loader::load_file(&mut index, path).map_err(|source| CliError::Load {
            path: path.display().to_string(),
            source,
        })?;
    }

    if settings.bbox.is_empty() {
        tracing::info!("{} documents indexed in '{}', no query given", index.len(), index.name());
        return Ok(());
    }

    let outputs = settings
        .bbox
        .iter()
        .map(|bbox| run_query(&index, settings, bbox))
        .collect::<Result<Vec<_>, _>>()?;

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        for output in &outputs {
            print_plain(output);
        }
    }

    Ok(())
}

fn run_query(index: &GeometryIndex, settings: &Settings, bbox: &str) -> Result<QueryOutput, CliError> {
    let ids = index
        .query(bbox, settings.operator.as_deref())
        .map_err(|source| CliError::Query {
            bbox: bbox.to_string(),
            source,
        })?;

    let operator = settings
        .operator
        .clone()
        .unwrap_or_else(|| index.config().default_operator.to_string());

    let geometries = settings.show_geometry.then(|| {
        ids.iter()
            .filter_map(|id| index.get_geometry(*id).map(|wkt| (*id, wkt.to_string())))
            .collect()
    });

    tracing::debug!("{} documents {} {}", ids.len(), operator, bbox);

    Ok(QueryOutput {
        bbox: bbox.to_string(),
        operator,
        ids: ids.into_iter().collect(),
        geometries,
    })
}

fn print_plain(output: &QueryOutput) {
    println!("# {} {} ({} matches)", output.operator, output.bbox, output.ids.len());
    for id in &output.ids {
        match output.geometries.as_ref().and_then(|g| g.get(id)) {
            Some(wkt) => println!("{id}\t{wkt}"),
            None => println!("{id}"),
        }
    }
}

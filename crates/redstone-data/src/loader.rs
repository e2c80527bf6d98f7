//! Loading pipeline: reads data files, detects their format and deserializes
//! engine configuration and circuit fixtures.
//!
//! A data directory holds an optional `engine` file (an [`EngineConfig`])
//! and a required `circuit` file (a [`CircuitData`]), each in RON, TOML or
//! JSON.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use redstone_core::config::EngineConfig;
use redstone_core::engine::EngineError;
use serde::de::DeserializeOwned;

use crate::circuit::ResolvedCircuit;
use crate::schema::CircuitData;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A value is out of range for the engine.
    #[error("invalid value in {file}: {detail}")]
    Invalid { file: PathBuf, detail: String },

    /// The engine refused a placement while building the circuit.
    #[error("circuit '{circuit}' rejected by engine: {source}")]
    Engine {
        circuit: String,
        #[source]
        source: EngineError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in `format`. `file` is only used for error messages.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Loading
// ===========================================================================

/// Engine configuration from a file. Missing fields take their defaults.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    let config: EngineConfig = deserialize_file(path)?;
    validate_config(&config, path)?;
    Ok(config)
}

fn validate_config(config: &EngineConfig, file: &Path) -> Result<(), DataLoadError> {
    let invalid = |detail: &str| DataLoadError::Invalid {
        file: file.to_path_buf(),
        detail: detail.to_string(),
    };
    if config.max_recent_toggles == 0 {
        return Err(invalid("max_recent_toggles must be at least 1"));
    }
    if config.max_chained_updates == 0 {
        return Err(invalid("max_chained_updates must be at least 1"));
    }
    if config.max_actions_per_step == 0 {
        return Err(invalid("max_actions_per_step must be at least 1"));
    }
    if config.event_capacity == 0 {
        return Err(invalid("event_capacity must be at least 1"));
    }
    Ok(())
}

/// Read and resolve a circuit file.
pub fn load_circuit(path: &Path) -> Result<ResolvedCircuit, DataLoadError> {
    let data: CircuitData = deserialize_file(path)?;
    ResolvedCircuit::resolve(&data, path)
}

/// Parse and resolve a circuit held in memory. `name` stands in for the file
/// name in error messages.
pub fn parse_circuit(
    content: &str,
    format: Format,
    name: &str,
) -> Result<ResolvedCircuit, DataLoadError> {
    let file = Path::new(name);
    let data: CircuitData = deserialize_str(content, format, file)?;
    ResolvedCircuit::resolve(&data, file)
}

/// Everything a data directory describes.
#[derive(Debug, Clone)]
pub struct CircuitBundle {
    pub config: EngineConfig,
    pub circuit: ResolvedCircuit,
}

/// Load `engine.*` (optional) and `circuit.*` (required) from `dir`.
pub fn load_circuit_dir(dir: &Path) -> Result<CircuitBundle, DataLoadError> {
    let config = match find_data_file(dir, "engine")? {
        Some(path) => load_engine_config(&path)?,
        None => EngineConfig::default(),
    };
    let circuit_path = require_data_file(dir, "circuit")?;
    let circuit = load_circuit(&circuit_path)?;
    log::debug!(
        "loaded circuit '{}' ({} blocks) from {}",
        circuit.name,
        circuit.placements.len(),
        dir.display()
    );
    Ok(CircuitBundle { config, circuit })
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

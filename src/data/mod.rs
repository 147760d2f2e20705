//! Results loading: container on disk -> `SimulationResults`.
//!
//! A missing file is not an error, it simply yields empty channels. A file
//! that exists but cannot be decoded is an error and is returned as such.

pub mod container;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::series::{Channel, SimulationResults};
use container::{parse_container, ChannelSource, ContainerFormat};

/// Which stored key fed a logical channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub channel: Channel,
    pub key: Option<String>,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsManifest {
    pub path: String,
    pub exists: bool,
    pub format: Option<ContainerFormat>,
    pub hash_sha256: Option<String>,
    pub keys: Vec<String>,
    pub channels: Vec<ResolvedChannel>,
    pub warnings: Vec<String>,
}

/// Return the first candidate the lookup answers for, with its value.
pub fn resolve<'c, T>(
    candidates: &[&'c str],
    lookup: impl Fn(&str) -> Option<T>,
) -> Option<(&'c str, T)> {
    candidates
        .iter()
        .find_map(|key| lookup(key).map(|v| (*key, v)))
}

/// Pull every logical channel out of a container via its alias list.
pub fn extract(source: &dyn ChannelSource) -> Result<(SimulationResults, Vec<ResolvedChannel>)> {
    let mut results = SimulationResults::default();
    let mut resolved = Vec::with_capacity(Channel::ALL.len());

    for channel in Channel::ALL {
        match resolve(channel.aliases(), |key| source.array(key)) {
            Some((key, values)) => {
                let values = values
                    .with_context(|| format!("channel {} (key {:?})", channel.as_str(), key))?;
                resolved.push(ResolvedChannel {
                    channel,
                    key: Some(key.to_string()),
                    samples: values.len(),
                });
                *results.channel_mut(channel) = values;
            }
            None => resolved.push(ResolvedChannel {
                channel,
                key: None,
                samples: 0,
            }),
        }
    }

    Ok((results, resolved))
}

pub fn alignment_warnings(results: &SimulationResults) -> Vec<String> {
    let n_t = results.t.len();
    Channel::ALL
        .iter()
        .filter(|c| **c != Channel::Time)
        .filter_map(|c| {
            let n = results.channel(*c).len();
            (n != 0 && n_t != 0 && n != n_t)
                .then(|| format!("length_mismatch: {}={} t={}", c.as_str(), n, n_t))
        })
        .collect()
}

// =============================================================================
// Loader
// =============================================================================

#[derive(Debug, Clone)]
pub struct SeriesLoader {
    path: PathBuf,
}

impl SeriesLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist.
    fn open(&self) -> Result<Option<(Box<dyn ChannelSource>, String)>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let format = ContainerFormat::from_path(&self.path)?;
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let hash = hex::encode(Sha256::digest(&bytes));
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", self.path.display()))?;
        let source = parse_container(format, &text)
            .with_context(|| format!("decoding {}", self.path.display()))?;
        Ok(Some((source, hash)))
    }

    pub fn load(&self) -> Result<SimulationResults> {
        let Some((source, _)) = self.open()? else {
            log(
                Level::Info,
                Domain::Loader,
                "results.absent",
                obj(&[("path", v_str(&self.path.display().to_string()))]),
            );
            return Ok(SimulationResults::default());
        };

        let (results, resolved) = extract(source.as_ref())?;
        let missing: Vec<&str> = resolved
            .iter()
            .filter(|r| r.key.is_none())
            .map(|r| r.channel.as_str())
            .collect();
        log(
            Level::Debug,
            Domain::Loader,
            "results.loaded",
            obj(&[
                ("path", v_str(&self.path.display().to_string())),
                ("samples", json!(results.glucose.len())),
                ("missing_channels", json!(missing)),
            ]),
        );
        for warning in alignment_warnings(&results) {
            log(
                Level::Warn,
                Domain::Loader,
                "results.misaligned",
                obj(&[("msg", v_str(&warning))]),
            );
        }
        Ok(results)
    }

    pub fn manifest(&self) -> Result<ResultsManifest> {
        let path = self.path.display().to_string();
        let Some((source, hash)) = self.open()? else {
            return Ok(ResultsManifest {
                path,
                exists: false,
                format: None,
                hash_sha256: None,
                keys: Vec::new(),
                channels: Channel::ALL
                    .iter()
                    .map(|c| ResolvedChannel {
                        channel: *c,
                        key: None,
                        samples: 0,
                    })
                    .collect(),
                warnings: vec!["missing_file".to_string()],
            });
        };

        let (results, channels) = extract(source.as_ref())?;
        let mut warnings = alignment_warnings(&results);
        if results.time_series().is_absent() {
            warnings.push("no_glucose_series".to_string());
        }
        Ok(ResultsManifest {
            path,
            exists: true,
            format: Some(source.format()),
            hash_sha256: Some(hash),
            keys: source.keys(),
            channels,
            warnings,
        })
    }
}

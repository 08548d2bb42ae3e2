use crate::Pose;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Named navigation targets ("kitchen" -> pose).
///
/// Names are case-insensitive and whitespace-normalized. Inserting a name
/// that already exists replaces the previous pose (last write wins) and logs
/// the overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Pose>", into = "BTreeMap<String, Pose>")]
pub struct NamedLocations {
    entries: BTreeMap<String, Pose>,
}

impl NamedLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations the robot knows out of the box
    pub fn with_defaults() -> Self {
        let mut locations = Self::new();
        locations.insert("kitchen", Pose::new(3.0, 2.0, 0.0));
        locations.insert("living room", Pose::new(1.0, 1.0, 1.57));
        locations.insert("bedroom", Pose::new(2.0, 3.0, -1.57));
        locations.insert("entrance", Pose::origin());
        locations.insert("home", Pose::origin());
        locations
    }

    /// Add or replace a location. Returns the pose that was replaced, if any.
    pub fn insert(&mut self, name: &str, pose: Pose) -> Option<Pose> {
        let key = normalize_name(name);
        let previous = self.entries.insert(key.clone(), pose);
        if let Some(old) = previous {
            if old != pose {
                tracing::warn!(location = %key, old = %old, new = %pose, "Location overwritten");
            }
        }
        previous
    }

    pub fn remove(&mut self, name: &str) -> Option<Pose> {
        self.entries.remove(&normalize_name(name))
    }

    pub fn get(&self, name: &str) -> Option<Pose> {
        self.entries.get(&normalize_name(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pose)> {
        self.entries.iter().map(|(name, pose)| (name.as_str(), pose))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, Pose>> for NamedLocations {
    fn from(map: BTreeMap<String, Pose>) -> Self {
        let mut locations = Self::new();
        for (name, pose) in map {
            locations.insert(&name, pose);
        }
        locations
    }
}

impl From<NamedLocations> for BTreeMap<String, Pose> {
    fn from(locations: NamedLocations) -> Self {
        locations.entries
    }
}

/// Lowercase and collapse internal whitespace ("Living  Room" -> "living room")
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// External key-value store the location map is loaded from and saved to.
pub trait LocationStore {
    fn load(&self) -> Result<NamedLocations>;
    fn save(&self, locations: &NamedLocations) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct LocationFile {
    #[serde(default)]
    locations: NamedLocations,
}

/// Stores locations in a TOML file under a `[locations]` table.
#[derive(Debug, Clone)]
pub struct TomlLocationStore {
    path: PathBuf,
}

impl TomlLocationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocationStore for TomlLocationStore {
    fn load(&self) -> Result<NamedLocations> {
        let content = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("reading locations from {}", self.path.display()))?;
        let file: LocationFile = toml::from_str(&content)
            .wrap_err_with(|| format!("parsing locations in {}", self.path.display()))?;
        tracing::info!("Loaded {} locations from {}", file.locations.len(), self.path.display());
        Ok(file.locations)
    }

    fn save(&self, locations: &NamedLocations) -> Result<()> {
        let file = LocationFile {
            locations: locations.clone(),
        };
        let content = toml::to_string_pretty(&file)?;
        fs::write(&self.path, content)
            .wrap_err_with(|| format!("writing locations to {}", self.path.display()))?;
        tracing::info!("Saved {} locations to {}", locations.len(), self.path.display());
        Ok(())
    }
}

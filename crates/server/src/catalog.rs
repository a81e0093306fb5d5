//! Disease, recipe and chemical reference data.
//!
//! Built-in tables are compiled into the binary. A data directory may
//! override any of the three files; files missing there fall back to the
//! built-in copy.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use shared::domain::{DiseaseId, DiseaseInfo, OrganicRecipe};
use thiserror::Error;
use tracing::info;

pub const DISEASES_FILE: &str = "diseases.json";
pub const ORGANIC_RECIPES_FILE: &str = "organic_recipes.json";
pub const INORGANIC_CHEMICALS_FILE: &str = "inorganic_chemicals.json";

const BUILTIN_DISEASES: &str = include_str!("../data/diseases.json");
const BUILTIN_ORGANIC_RECIPES: &str = include_str!("../data/organic_recipes.json");
const BUILTIN_INORGANIC_CHEMICALS: &str = include_str!("../data/inorganic_chemicals.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixingRatio {
    /// `"<chemical parts>:<water parts>"`, e.g. `"1:400"`.
    pub chemical_to_water: String,
}

/// A chemical as stored in the catalog, with everything needed to size a dose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemicalEntry {
    pub name: String,
    pub active_ingredient: String,
    pub concentration: String,
    pub recommended_dose_per_liter: String,
    pub mixing_ratio: MixingRatio,
    #[serde(default)]
    pub safety_precautions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiseaseTable {
    diseases: Vec<DiseaseInfo>,
}

#[derive(Debug, Deserialize)]
struct RecipeTable {
    recipes: HashMap<String, OrganicRecipe>,
}

#[derive(Debug, Deserialize)]
struct ChemicalTable {
    chemicals: HashMap<String, Vec<ChemicalEntry>>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    diseases: Vec<DiseaseInfo>,
    recipes: HashMap<String, OrganicRecipe>,
    chemicals: HashMap<String, Vec<ChemicalEntry>>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_sources(
            BUILTIN_DISEASES,
            BUILTIN_ORGANIC_RECIPES,
            BUILTIN_INORGANIC_CHEMICALS,
        )
    }

    pub fn load(data_dir: Option<&Path>) -> Result<Self, CatalogError> {
        let Some(dir) = data_dir else {
            return Self::builtin();
        };
        let diseases = read_override(dir, DISEASES_FILE)?;
        let recipes = read_override(dir, ORGANIC_RECIPES_FILE)?;
        let chemicals = read_override(dir, INORGANIC_CHEMICALS_FILE)?;
        Self::from_sources(
            diseases.as_deref().unwrap_or(BUILTIN_DISEASES),
            recipes.as_deref().unwrap_or(BUILTIN_ORGANIC_RECIPES),
            chemicals.as_deref().unwrap_or(BUILTIN_INORGANIC_CHEMICALS),
        )
    }

    fn from_sources(diseases: &str, recipes: &str, chemicals: &str) -> Result<Self, CatalogError> {
        let diseases: DiseaseTable = parse(DISEASES_FILE, diseases)?;
        let recipes: RecipeTable = parse(ORGANIC_RECIPES_FILE, recipes)?;
        let chemicals: ChemicalTable = parse(INORGANIC_CHEMICALS_FILE, chemicals)?;
        Ok(Self {
            diseases: diseases.diseases,
            recipes: recipes.recipes,
            chemicals: chemicals.chemicals,
        })
    }

    pub fn diseases(&self) -> &[DiseaseInfo] {
        &self.diseases
    }

    pub fn disease(&self, disease_id: &DiseaseId) -> Option<&DiseaseInfo> {
        let key = disease_id.as_key();
        self.diseases
            .iter()
            .find(|disease| disease.id.as_key() == key)
    }

    pub fn organic_recipe(&self, disease_id: &DiseaseId) -> Option<&OrganicRecipe> {
        self.recipes.get(&disease_id.as_key())
    }

    /// Chemicals registered for a disease; empty when none are.
    pub fn chemicals(&self, disease_id: &DiseaseId) -> &[ChemicalEntry] {
        self.chemicals
            .get(&disease_id.as_key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn read_override(dir: &Path, file: &'static str) -> Result<Option<String>, CatalogError> {
    let path = dir.join(file);
    match fs::read_to_string(&path) {
        Ok(raw) => {
            info!(path = %path.display(), "loaded catalog override");
            Ok(Some(raw))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CatalogError::Read { path, source }),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(file: &'static str, raw: &str) -> Result<T, CatalogError> {
    serde_json::from_str(raw).map_err(|source| CatalogError::Parse { file, source })
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;

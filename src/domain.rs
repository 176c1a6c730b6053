use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AssemblyError;

static SPECIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N} ._()'-]+$").expect("species pattern compiles"));

/// Organism name as typed by the user, e.g. `Homo sapiens`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeciesName(String);

impl SpeciesName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased name with spaces turned into underscores, used for output file names.
    pub fn file_stem(&self) -> String {
        self.0.to_lowercase().replace(' ', "_")
    }

    /// Entrez search term restricted to the Organism field.
    pub fn organism_term(&self) -> String {
        format!("{}[Organism]", self.0)
    }
}

impl fmt::Display for SpeciesName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesName {
    type Err = AssemblyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() || !SPECIES_RE.is_match(normalized) {
            return Err(AssemblyError::InvalidSpecies(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Entrez UID of one assembly record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblyId(String);

impl AssemblyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssemblyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssemblyId {
    type Err = AssemblyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() || normalized.chars().any(|ch| ch.is_whitespace()) {
            return Err(AssemblyError::InvalidAssemblyId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Dotted lookup path into a document summary, e.g. `Biosource.Sex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|seg| seg.trim().is_empty()) {
            return None;
        }
        Some(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = AssemblyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FieldPath::new(value.trim().split('.').map(str::trim)).ok_or_else(|| {
            AssemblyError::InvalidFieldPath {
                name: value.to_string(),
                path: value.to_string(),
            }
        })
    }
}

impl TryFrom<String> for FieldPath {
    type Error = AssemblyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.to_string()
    }
}

/// One output column: header name plus where to find its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub path: FieldPath,
}

/// Column names that live under the nested `Biosource` record.
pub const BIOSOURCE_FIELDS: &[&str] = &["Sex", "Isolate"];

impl FieldSpec {
    pub fn new(name: impl Into<String>, path: FieldPath) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    /// Resolves a bare column name to its default path.
    pub fn shorthand(name: &str) -> Result<Self, AssemblyError> {
        let name = name.trim();
        let path = if BIOSOURCE_FIELDS.contains(&name) {
            FieldPath::new(["Biosource", name])
        } else {
            FieldPath::new([name])
        };
        let path = path.ok_or_else(|| AssemblyError::InvalidFieldPath {
            name: name.to_string(),
            path: name.to_string(),
        })?;
        Ok(Self::new(name, path))
    }
}

pub const DEFAULT_COLUMNS: &[&str] = &[
    "ContigN50",
    "ScaffoldN50",
    "Coverage",
    "Sex",
    "Isolate",
    "BioSampleId",
    "AsmReleaseDate_GenBank",
    "FtpPath_GenBank",
];

pub fn default_columns() -> Vec<FieldSpec> {
    DEFAULT_COLUMNS
        .iter()
        .filter_map(|name| FieldSpec::shorthand(name).ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecompressorKind {
    #[default]
    Gunzip,
    Builtin,
}

impl fmt::Display for DecompressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompressorKind::Gunzip => write!(f, "gunzip"),
            DecompressorKind::Builtin => write!(f, "builtin"),
        }
    }
}

/// What to do when the archive server answers with a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingArchivePolicy {
    #[default]
    Fail,
    Skip,
}

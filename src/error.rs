use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AssemblyError {
    #[error("invalid species name: {0}")]
    InvalidSpecies(String),

    #[error("invalid assembly identifier: {0}")]
    InvalidAssemblyId(String),

    #[error("invalid field path for column {name}: {path}")]
    InvalidFieldPath { name: String, path: String },

    #[error("column name {name:?} cannot be written with delimiter {delimiter:?}")]
    #[diagnostic(help("rename the column or choose another delimiter"))]
    InvalidColumnName { name: String, delimiter: char },

    #[error("invalid delimiter: {0:?}")]
    #[diagnostic(help("the delimiter must be exactly one character and not a line break"))]
    InvalidDelimiter(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("E-utilities request failed: {0}")]
    EutilsHttp(String),

    #[error("E-utilities returned status {status}: {message}")]
    EutilsStatus { status: u16, message: String },

    #[error("unexpected E-utilities response: {0}")]
    MalformedResponse(String),

    #[error("no assembly summary returned for identifier {0}")]
    EmptySummary(String),

    #[error("no assemblies found for species {0}")]
    #[diagnostic(help("check the organism name spelling against NCBI Taxonomy"))]
    NoAssemblies(String),

    #[error("assembly {id} has no field {field}")]
    MissingField { id: String, field: String },

    #[error("assembly {0} has no GenBank FTP path")]
    MissingFtpPath(String),

    #[error("download request failed: {0}")]
    DownloadHttp(String),

    #[error("download of {url} returned status {status}")]
    DownloadStatus { status: u16, url: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, SearchResult, SummaryResult};
use crate::dataset::DatasetReport;
use crate::sequence::SequenceReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_dataset(result: &DatasetReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_sequence(result: &SequenceReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_summary(result: &SummaryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text output: progress lines on stderr, results on stdout.
pub struct TextOutput;

impl TextOutput {
    pub fn print_dataset(result: &DatasetReport) {
        println!(
            "{} assemblies for {} written to {}",
            result.identifiers.len(),
            result.species,
            result.path
        );
        println!("columns: {}", result.columns.join(", "));
    }

    pub fn print_sequence(result: &SequenceReport) {
        println!("assembly {} for {}", result.assembly_id, result.species);
        println!("source: {}", result.url);
        match (&result.sequence_path, result.skipped_status) {
            (Some(path), _) => println!("sequence: {path}"),
            (None, Some(status)) => {
                println!("download skipped: server answered {status}, nothing written")
            }
            (None, None) => println!("nothing written"),
        }
    }

    pub fn print_search(result: &SearchResult) {
        for id in &result.identifiers {
            println!("{id}");
        }
    }

    pub fn print_summary(result: &SummaryResult) {
        let width = result
            .fields
            .iter()
            .map(|field| field.name.len())
            .max()
            .unwrap_or(0);
        println!("assembly {}", result.id);
        for field in &result.fields {
            println!("  {:<width$}  {}", field.name, field.value);
        }
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}

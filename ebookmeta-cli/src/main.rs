//! Ebookmeta CLI - inspect and edit ebook metadata

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse a `field=value` assignment
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{}' is not of the form field=value", s))?;
    if field.trim().is_empty() {
        return Err("field name must not be empty".to_string());
    }
    Ok((field.trim().to_string(), value.to_string()))
}

#[derive(Parser)]
#[command(name = "ebookmeta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the metadata of one or more ebooks
    Info {
        /// Input files (EPUB, PDF, CBZ)
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// List native properties instead of the canonical record
        #[arg(long)]
        native: bool,
    },

    /// Set metadata fields on one or more ebooks
    Set {
        /// Input files (EPUB, PDF, CBZ)
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Assignment such as title="Dune" (repeatable)
        #[arg(short, long = "field", value_parser = parse_assignment, required = true)]
        fields: Vec<(String, String)>,
    },

    /// Extract or replace cover images
    Cover {
        /// Input files (EPUB, PDF, CBZ)
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Image file to embed as the cover of every input
        #[arg(long, conflicts_with = "output")]
        set: Option<String>,

        /// Write the cover of the (single) input to this path
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export or store the raw metadata document (OPF, XMP, ComicInfo.xml)
    Plain {
        /// Input file (EPUB, PDF, CBZ)
        input: String,

        /// Replace the metadata document with the contents of this file
        #[arg(long)]
        store: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "ebookmeta_cli=debug,ebookmeta_core=debug"
    } else {
        "ebookmeta_cli=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Info {
            inputs,
            json,
            native,
        } => commands::info(&inputs, json, native),

        Commands::Set { inputs, fields } => commands::set(&inputs, &fields),

        Commands::Cover {
            inputs,
            set,
            output,
        } => commands::cover(&inputs, set.as_deref(), output.as_deref()),

        Commands::Plain { input, store } => commands::plain(&input, store.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("title=Dune = Messiah"),
            Ok(("title".to_string(), "Dune = Messiah".to_string()))
        );
        assert_eq!(
            parse_assignment("rating="),
            Ok(("rating".to_string(), String::new()))
        );
        assert!(parse_assignment("title").is_err());
        assert!(parse_assignment("=x").is_err());
    }
}

use clap::Parser;
use fs_err as fs;
use log::{error, info, warn};
use mentionrule::{
    export::{self, StandoffExporter},
    pipeline::{Annotator, DocumentRecord},
    types::TokenInput,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON config to build the annotator from.
    #[clap(long, short, conflicts_with = "binary", required_unless_present = "binary")]
    config: Option<PathBuf>,
    /// Annotator binary created with `compile`.
    #[clap(long, short)]
    binary: Option<PathBuf>,
    /// A JSON token file or a directory of them.
    #[clap(long, short)]
    input: PathBuf,
    /// Directory for the eHOST XML files. Nothing is written if omitted.
    #[clap(long, short)]
    output_dir: Option<PathBuf>,
    /// Also append export failures to this file.
    #[clap(long)]
    error_log: Option<PathBuf>,
    /// Print every token with its attributes.
    #[clap(long, short)]
    verbose: bool,
}

fn inputs(path: &Path) -> Result<Vec<PathBuf>, mentionrule::Error> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(path)? {
        let path = entry?.path();
        if path.extension().map_or(false, |x| x == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths)
}

fn load(path: &Path) -> Result<Vec<TokenInput>, mentionrule::Error> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Reads every token file, skipping the ones which can not be read or parsed.
fn documents(paths: &[PathBuf]) -> Vec<(String, Vec<TokenInput>)> {
    paths
        .iter()
        .filter_map(|path| {
            let name = path
                .file_stem()
                .map_or_else(String::new, |x| x.to_string_lossy().into_owned());

            match load(path) {
                Ok(tokens) => Some((name, tokens)),
                Err(error) => {
                    warn!("skipping {}: {}", path.display(), error);
                    None
                }
            }
        })
        .collect()
}

fn main() -> Result<(), mentionrule::Error> {
    env_logger::init();
    let opts = Opts::parse();

    let annotator = match (&opts.config, &opts.binary) {
        (Some(config), _) => Annotator::from_config(config)?,
        (None, Some(binary)) => Annotator::new(binary)?,
        (None, None) => unreachable!("clap requires --config or --binary"),
    };

    let exporter = match &opts.error_log {
        Some(path) => StandoffExporter::with_error_log(path),
        None => StandoffExporter::new(),
    };

    let documents = documents(&inputs(&opts.input)?);
    info!("annotating {} documents", documents.len());

    if opts.verbose {
        for (name, tokens) in &documents {
            // failures are reported by the batch below
            if let Ok(doc) = annotator.process(tokens.clone()) {
                println!("{}\n{}", name, doc);
            }
        }
    }

    for DocumentRecord { name, result } in annotator.process_batch(documents) {
        let records = match result {
            Ok(records) => records,
            Err(error) => {
                error!("{}: {}", name, error);
                continue;
            }
        };

        for record in &records {
            println!(
                "{}\t{}\t{}\t{}\t{}",
                name, record.start, record.end, record.class, record.text
            );
        }

        if let Some(dir) = &opts.output_dir {
            let exported = exporter.export(name.clone(), records);
            if let Some(xml) = exported.xml() {
                if let Err(error) = export::write(dir, &name, xml) {
                    error!("unable to write {}: {}", name, error);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_unreadable_documents() {
        let dir = std::env::temp_dir().join(format!("mentionrule-run-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("good.json"),
            r#"[{"text": "Facebook", "lemma": "facebook", "idx": 0}]"#,
        )
        .unwrap();
        fs::write(dir.join("bad.json"), "[{").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut paths = inputs(&dir).unwrap();
        paths.push(dir.join("missing.json"));
        let documents = documents(&paths);
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].0, "good");
        assert_eq!(documents[0].1[0].text, "Facebook");
    }
}

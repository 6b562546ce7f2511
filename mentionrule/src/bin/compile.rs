use clap::Parser;
use fs_err::File;
use mentionrule::pipeline::Annotator;
use std::{io::BufWriter, path::PathBuf};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON config listing lexicons and rule tables.
    #[clap(long, short)]
    config: PathBuf,
    /// Where to write the binary.
    #[clap(long, short)]
    out: PathBuf,
}

fn main() -> Result<(), mentionrule::Error> {
    env_logger::init();
    let opts = Opts::parse();

    let annotator = Annotator::from_config(&opts.config)?;
    annotator.to_writer(BufWriter::new(File::create(&opts.out)?))
}

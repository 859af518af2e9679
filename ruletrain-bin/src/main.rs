use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use gumdrop::Options;

use ruletrain::aligner::{Aligner, AlignerConfig};
use ruletrain::corpus;
use ruletrain::engine::mem::MemoryEngine;
use ruletrain::escape::EscapeTable;
use ruletrain::features::{extract_corpus, FeatureConfig};
use ruletrain::record;
use ruletrain::rules::{induce, InductionConfig};

#[derive(Debug, Options)]
struct Args {
    #[options(help = "print help message")]
    help: bool,

    #[options(command)]
    command: Option<Command>,
}

#[derive(Debug, Options)]
enum Command {
    #[options(help = "align a corpus of tab-separated string pairs")]
    Align(AlignArgs),

    #[options(help = "extract context features from alignment records")]
    Features(FeaturesArgs),

    #[options(help = "induce weighted replace rules from feature records")]
    Rules(RulesArgs),
}

#[derive(Debug, Options)]
struct AlignArgs {
    #[options(help = "print help message")]
    help: bool,

    #[options(help = "number of alignment iterations", meta = "N")]
    iters: Option<usize>,

    #[options(help = "minimum corpus support for a costed pair", meta = "N")]
    smooth: Option<u64>,

    #[options(no_short, long = "json", help = "output in JSON format")]
    use_json: bool,

    #[options(free, help = "corpus file (stdin if omitted)")]
    input: Option<PathBuf>,
}

#[derive(Debug, Options)]
struct FeaturesArgs {
    #[options(help = "print help message")]
    help: bool,

    #[options(no_short, long = "json", help = "output in JSON format")]
    use_json: bool,

    #[options(free, help = "alignment record file (stdin if omitted)")]
    input: Option<PathBuf>,
}

#[derive(Debug, Options)]
struct RulesArgs {
    #[options(help = "print help message")]
    help: bool,

    #[options(help = "minimum feature frequency", meta = "N")]
    threshold: Option<u64>,

    #[options(free, help = "feature record file (stdin if omitted)")]
    input: Option<PathBuf>,
}

fn reader(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn align(args: AlignArgs) -> anyhow::Result<()> {
    let mut config = AlignerConfig::default();
    if let Some(iters) = args.iters {
        config.iterations = iters;
    }
    if let Some(smooth) = args.smooth {
        config.smoothing = smooth;
    }

    let pairs = corpus::read_pairs(reader(args.input.as_deref())?)?;
    let aligner = Aligner::with_config(MemoryEngine::new(), config);
    let aligned = aligner.align_corpus(&pairs)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for sequence in &aligned {
        if args.use_json {
            writeln!(out, "{}", serde_json::to_string(sequence)?)?;
        } else {
            writeln!(out, "{}", sequence)?;
        }
    }
    Ok(())
}

fn features(args: FeaturesArgs) -> anyhow::Result<()> {
    let mut aligned = Vec::new();
    for line in reader(args.input.as_deref())?.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        aligned.push(record::parse_alignment(&line)?);
    }

    let features = extract_corpus(&aligned, &FeatureConfig::default());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for feature in &features {
        if args.use_json {
            writeln!(out, "{}", serde_json::to_string(feature)?)?;
        } else {
            writeln!(out, "{}", feature)?;
        }
    }
    Ok(())
}

fn rules(args: RulesArgs) -> anyhow::Result<()> {
    let mut config = InductionConfig::default();
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }

    let mut features = Vec::new();
    for line in reader(args.input.as_deref())?.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        features.push(record::parse_feature(&line)?);
    }

    let rules = induce(&features, &config);
    let regex = rules.to_regex(&EscapeTable::rules());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", regex)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = Args::parse_args_default_or_exit();

    match args.command {
        None => Ok(()),
        Some(Command::Align(args)) => align(args),
        Some(Command::Features(args)) => features(args),
        Some(Command::Rules(args)) => rules(args),
    }
}

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leafcare_probe::config::Overrides;
use leafcare_probe::{ProbeConfig, TransformationPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the leaf disease classifier against sample images")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ONNX model to load
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Folder holding the category sub-folders
    #[arg(long)]
    test_root: Option<PathBuf>,

    /// Images to test per category
    #[arg(short, long)]
    limit: Option<usize>,
}

fn load_config(args: Args) -> anyhow::Result<ProbeConfig> {
    let mut config = match &args.config {
        Some(path) => ProbeConfig::from_file(path)?,
        None => ProbeConfig::default(),
    };
    Overrides {
        model: args.model,
        test_root: args.test_root,
        limit: args.limit,
    }
    .apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leafcare_probe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(args)?;

    let pipeline = match TransformationPipeline::from_config(&config) {
        Ok(pipeline) => {
            println!("✅ Model loaded successfully from {}", config.model_path.display());
            pipeline
        }
        Err(err) => {
            let err = anyhow::Error::from(err);
            println!("❌ Error loading model: {err:#}");
            tracing::error!(error = ?err, "cannot load model");
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut stdout = io::stdout().lock();
    leafcare_probe::run(&config, &pipeline, &mut stdout)?;
    Ok(ExitCode::SUCCESS)
}

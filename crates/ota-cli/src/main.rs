//! OTA Catalog Parser CLI
//!
//! Command-line tool for turning OTA update catalogs into text reports and
//! wiki tables.

mod source;

use clap::{ArgAction, Args, Parser, Subcommand};
use ota_core::{
    CatalogKind, Context, CorrectionTable, DeviceCatalog, FilterOptions, OutputFormat,
    OverrideLookup, Pipeline, Query, Version,
};
use source::{CatalogSource, InstalledBuild, PallasConfig, PallasSource};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ota-cli")]
#[command(about = "OTA Catalog Parser", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a Mesu catalog
    Mesu {
        /// Local property list, or a mesu.apple.com URL
        #[arg(short, long)]
        file: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Ask Pallas for the updates offered to a device
    Pallas {
        /// Build the device is running, as BUILD or BUILD:VERSION (repeatable)
        #[arg(short = 'p', long = "build", required = true)]
        builds: Vec<String>,

        /// JSON file mapping OS names to asset audiences
        #[arg(long)]
        audiences: Option<PathBuf>,

        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Device identifier (e.g. iPhone8,1)
    #[arg(short, long)]
    device: Option<String>,

    /// Model identifier (e.g. N71mAP), needed for some devices
    #[arg(short, long)]
    model: Option<String>,

    /// Include betas and other pre-releases
    #[arg(short, long)]
    beta: bool,

    /// Lowest marketing version to list (e.g. 8.4.1)
    #[arg(long)]
    min: Option<String>,

    /// Highest marketing version to list (e.g. 9.0.2)
    #[arg(long)]
    max: Option<String>,

    /// Format the output as wiki markup
    #[arg(short, long)]
    wiki: bool,

    /// Emit a whole wiki table, with heading and column headers
    #[arg(long, requires = "wiki")]
    full_table: bool,

    /// Leave out packages the OS may not install
    #[arg(long)]
    remove_stubs: bool,

    /// Override lookup (plist or JSON)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Correction table (JSON), replacing the built-in one
    #[arg(long)]
    corrections: Option<PathBuf>,

    /// Device catalog used for wiki headings (plist or JSON)
    #[arg(long)]
    device_info: Option<PathBuf>,
}

impl RenderArgs {
    fn query(&self) -> ota_core::Result<Query> {
        let bound = |v: &Option<String>| v.as_deref().map(str::parse::<Version>).transpose();

        Ok(Query {
            device: self.device.clone(),
            model: self.model.clone(),
            filter: FilterOptions {
                show_beta: self.beta,
                remove_stubs: self.remove_stubs,
                minimum: bound(&self.min)?,
                maximum: bound(&self.max)?,
            },
            format: if self.wiki {
                OutputFormat::Wiki {
                    full_table: self.full_table,
                }
            } else {
                OutputFormat::Text
            },
        })
    }

    fn pipeline(&self) -> ota_core::Result<Pipeline> {
        let overrides = match &self.overrides {
            Some(path) => OverrideLookup::load(path)?,
            None => OverrideLookup::new(),
        };
        let corrections = match &self.corrections {
            Some(path) => CorrectionTable::load(path)?,
            None => CorrectionTable::default(),
        };
        let devices = match &self.device_info {
            Some(path) => DeviceCatalog::load(path)?,
            None => DeviceCatalog::new(),
        };

        Ok(Pipeline::new(Context {
            overrides,
            corrections,
            devices,
        }))
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        match e.condition() {
            Some(condition) => {
                eprintln!("Argument error!");
                eprintln!("{}", hint(condition, &e));
            }
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn hint(condition: &str, error: &ota_core::Error) -> String {
    match condition {
        "device" => "You did not specify a device to search for. Use the \"-d\" argument to specify, e.g. \"iPhone8,1\"".to_string(),
        "model" => "You need to specify a model for this device. Use the \"-m\" argument to specify, e.g. \"N71AP\"".to_string(),
        "nofile" => "You did not specify a catalog. Use the \"-f\" argument with a file path or mesu.apple.com URL.".to_string(),
        "notmesu" => "The URL supplied should belong to mesu.apple.com.".to_string(),
        "badbuild" => format!("{error}. Builds look like \"17A577\"."),
        "needspallas" => "This device's updates are only listed by Pallas. Use the \"pallas\" subcommand.".to_string(),
        _ => error.to_string(),
    }
}

fn run(command: Commands) -> ota_core::Result<()> {
    let output = match command {
        Commands::Mesu { file, render } => cmd_mesu(file.as_deref(), &render)?,
        Commands::Pallas {
            builds,
            audiences,
            render,
        } => cmd_pallas(&builds, audiences.as_deref(), &render)?,
    };

    println!("{}", output);
    Ok(())
}

fn cmd_mesu(file: Option<&str>, render: &RenderArgs) -> ota_core::Result<String> {
    let query = render.query()?;
    let pipeline = render.pipeline()?;
    pipeline.validate(&query, CatalogKind::Mesu)?;

    let records = match file {
        Some(locator) => Some(source::for_locator(locator)?.fetch()?),
        None => None,
    };

    pipeline.run(&query, CatalogKind::Mesu, records)
}

fn cmd_pallas(
    builds: &[String],
    audiences: Option<&std::path::Path>,
    render: &RenderArgs,
) -> ota_core::Result<String> {
    let query = render.query()?;
    let pipeline = render.pipeline()?;
    let device = pipeline.validate(&query, CatalogKind::Pallas)?;

    let installed = builds
        .iter()
        .map(|b| InstalledBuild::parse(b))
        .collect::<ota_core::Result<Vec<_>>>()?;
    let config = match audiences {
        Some(path) => PallasConfig::load(path)?,
        None => PallasConfig::default(),
    };

    let records = PallasSource::new(device, installed, config).fetch()?;
    pipeline.run(&query, CatalogKind::Pallas, Some(records))
}

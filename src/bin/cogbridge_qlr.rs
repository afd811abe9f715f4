//! Generate a QGIS layer file from the command line
//!
//! `url` may also be a local path or `file://` URL. Without `output`
//! the file is written to `<layer name>.qlr` in the current directory.
//! Template locations follow `QLR_TEMPLATE_DIR` / `QLR_TEMPLATE_CONFIG`.

use clap::Parser;
use cogbridge::core::qlr::{create_qlr, write_qlr_file, TemplateRegistry};
use cogbridge::providers::cog::CogReader;
use cogbridge::providers::http::build_client;
use cogbridge::ServiceConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "cogbridge-qlr")]
#[command(about = "Write a QGIS layer file (QLR) for a Cloud-Optimized GeoTIFF")]
struct Args {
    /// Raster URL, `file://` URL or local path
    url: String,

    /// Collection name from template_config.json
    collection: String,

    /// Output file (default: `<layer name>.qlr`)
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = ServiceConfig::from_env();
    let client = build_client(config.http_timeout)?;
    let reader = CogReader::new(client, &config).with_local_files();
    let registry = TemplateRegistry::new(&config.qlr_template_config, &config.qlr_template_dir);

    let document = create_qlr(&reader, &registry, &args.url, &args.collection).await?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(document.file_name()));
    write_qlr_file(&document.xml, &output).await?;

    info!("QLR written to {}", output.display());
    println!("{}", output.display());
    Ok(())
}

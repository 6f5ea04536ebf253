use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Command-line client for the CAD bridge", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000", env = "BRIDGE_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a part with feature parameters and fetch the regenerated model
    FetchModel {
        file: PathBuf,
        /// JSON document sent as `features`
        #[arg(short, long, default_value = "[]")]
        features: String,
        /// Requested export format
        #[arg(short, long)]
        export_type: Option<String>,
    },
    /// Upload a part and report its info and exported file
    Model { file: PathBuf },
    /// Query attributes of a file known to the backend
    Attributes { file_path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::FetchModel {
            file,
            features,
            export_type,
        } => {
            let form = Form::new()
                .part("file", file_part(&file).await?)
                .text("features", features);
            let mut req = client.post(format!("{base}/fetch-model")).multipart(form);
            if let Some(export_type) = export_type {
                req = req.query(&[("exportType", export_type)]);
            }
            print_response(req.send().await?).await?;
        }
        Commands::Model { file } => {
            let form = Form::new().part("file", file_part(&file).await?);
            let res = client
                .post(format!("{base}/api/model"))
                .multipart(form)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Attributes { file_path } => {
            let res = client
                .get(format!("{base}/api/getattributes"))
                .query(&[("filePath", file_path)])
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn file_part(path: &Path) -> Result<Part, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| format!("{} has no file name", path.display()))?;
    Ok(Part::bytes(bytes)
        .file_name(filename)
        .mime_str("application/octet-stream")?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: bridge returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

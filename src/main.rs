// src/main.rs
use anyhow::{Context, Result};
use assembler_rs::config::{AssemblyConfig, ServerConfig, EMU_PER_CM};
use assembler_rs::core::layout::SectionLayout;
use assembler_rs::core::outline::{read_outline, OutlineEntry, OutlineSummary};
use assembler_rs::server::start_server;
use assembler_rs::utils::document_processor::DocumentProcessor;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "assembler-rs", version, about = "Assemble screenshot manuals into a Word template")]
struct Cli {
    #[command(flatten)]
    assembly: AssemblyArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct AssemblyArgs {
    /// JSON file overriding chapter number, image width and fonts
    #[arg(long, global = true, env = "ASSEMBLER_CONFIG")]
    assembly_config: Option<PathBuf>,

    /// JSON file replacing the built-in section layout
    #[arg(long, global = true, env = "ASSEMBLER_LAYOUT")]
    layout: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the upload/download web service
    Serve(ServerConfig),

    /// Generate a document from local files
    Generate {
        /// Word template (.docx)
        #[arg(long)]
        template: PathBuf,
        /// Configuration sheet (.xlsx)
        #[arg(long)]
        config: PathBuf,
        /// Screenshot archive (.zip) or an already extracted directory
        #[arg(long)]
        images: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Print the block outline of a generated document
    Inspect {
        path: PathBuf,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl AssemblyArgs {
    fn load(&self) -> Result<(AssemblyConfig, SectionLayout)> {
        let config = match &self.assembly_config {
            Some(path) => AssemblyConfig::from_json_file(path)?,
            None => AssemblyConfig::default(),
        };
        let layout = match &self.layout {
            Some(path) => SectionLayout::from_json_file(path)?,
            None => SectionLayout::builtin(),
        };
        Ok((config, layout))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let (config, layout) = cli.assembly.load()?;

    match cli.command {
        Command::Serve(server) => {
            info!("Starting document assembly server");
            start_server(&server, DocumentProcessor::new(config, layout)).await?;
        }
        Command::Generate { template, config: sheet, images, output } => {
            let processor = DocumentProcessor::new(config, layout);
            let report = tokio::task::spawn_blocking(move || {
                if images.is_dir() {
                    processor.process(&template, &sheet, &images, &output)
                } else {
                    let stem = output
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "output".to_string());
                    let extract_dir = output.with_file_name(format!("{}_images", stem));
                    processor.process_archive(&template, &sheet, &images, &extract_dir, &output)
                }
            })
            .await?
            .context("document generation failed")?;

            println!(
                "✅ {} section(s), {} image(s), {} warning(s)",
                report.sections, report.images, report.warnings
            );
        }
        Command::Inspect { path, json } => {
            let outline = read_outline(&path, &config.heading_style_prefix)?;
            let summary = OutlineSummary::of(&outline);
            if json {
                let out = serde_json::json!({ "summary": summary, "outline": outline });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for entry in &outline {
                    println!("{}", describe(entry));
                }
                println!(
                    "-- {} heading(s), {} paragraph(s), {} image(s), {} page break(s), {} warning(s)",
                    summary.headings, summary.paragraphs, summary.images, summary.page_breaks, summary.warnings
                );
            }
        }
    }

    Ok(())
}

fn describe(entry: &OutlineEntry) -> String {
    match entry {
        OutlineEntry::Heading { level, text } => format!("{} {}", "#".repeat(*level as usize), text),
        OutlineEntry::Paragraph { text, .. } => text.clone(),
        OutlineEntry::Image { width_emu, .. } => format!("[image {:.2} cm]", *width_emu as f64 / EMU_PER_CM),
        OutlineEntry::PageBreak => "--- page break ---".to_string(),
        OutlineEntry::Table => "[table]".to_string(),
    }
}

//! pagemd CLI - structure extracted page geometry into Markdown

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pagemd::{
    render, Conversion, ConvertOptions, ImagePlacement, JsonFormat, Pipeline,
    ProgressEvent, RawDocument,
};

#[derive(Parser)]
#[command(name = "pagemd")]
#[command(version)]
#[command(about = "Turn extracted page geometry into Markdown", long_about = None)]
struct Cli {
    /// Input raw document (JSON from an extraction adapter)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output Markdown file (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Raise log output to debug
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a raw document to Markdown
    #[command(alias = "md")]
    Markdown {
        /// Input raw document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the image manifest as JSON to this file
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,

        /// Print conversion statistics
        #[arg(long)]
        stats: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Output the structured document as JSON
    Json {
        /// Input raw document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Show document information and structure statistics
    Info {
        /// Input raw document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the information as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Placement {
    /// Where the image appears
    Inline,
    /// Grouped by page at the end
    End,
}

impl From<Placement> for ImagePlacement {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Inline => ImagePlacement::Inline,
            Placement::End => ImagePlacement::DocumentEnd,
        }
    }
}

/// Conversion flags shared by every command that runs the pipeline.
#[derive(Args, Clone)]
struct OptionArgs {
    /// Font-size multiplier over body size for headings
    #[arg(long, env = "PAGEMD_HEADING_RATIO", default_value_t = 1.15)]
    heading_ratio: f32,

    /// Character ceiling for orphan merging
    #[arg(long, env = "PAGEMD_ORPHAN_MAX_LEN", default_value_t = 45)]
    orphan_max_len: usize,

    /// Do not promote ALL-CAPS lines to headings
    #[arg(long)]
    no_caps_headings: bool,

    /// Keep repeating headers and footers
    #[arg(long)]
    keep_headers_footers: bool,

    /// Also unwrap hyphens before TitleCase words
    #[arg(long, env = "PAGEMD_AGGRESSIVE_HYPHEN")]
    aggressive_hyphen: bool,

    /// Reflow text inside ``` fences too
    #[arg(long)]
    no_code_protection: bool,

    /// Insert '---' between pages
    #[arg(long, env = "PAGEMD_PAGE_BREAKS")]
    page_breaks: bool,

    /// Keep image blocks and fill the image manifest
    #[arg(long, env = "PAGEMD_EXPORT_IMAGES")]
    images: bool,

    /// Directory prefix for relative image paths
    #[arg(long, env = "PAGEMD_IMAGE_DIR", default_value = "assets")]
    image_dir: String,

    /// Where image references go
    #[arg(long, value_enum, default_value = "inline")]
    image_placement: Placement,

    /// Only process the first 3 pages
    #[arg(long)]
    preview: bool,

    /// Leave "Note:" style paragraphs as plain text
    #[arg(long)]
    no_callouts: bool,

    /// Include YAML frontmatter
    #[arg(short, long)]
    frontmatter: bool,
}

impl OptionArgs {
    fn to_options(&self) -> ConvertOptions {
        ConvertOptions::new()
            .with_heading_size_ratio(self.heading_ratio)
            .with_orphan_max_len(self.orphan_max_len)
            .with_caps_to_headings(!self.no_caps_headings)
            .with_remove_headers_footers(!self.keep_headers_footers)
            .with_aggressive_hyphen(self.aggressive_hyphen)
            .with_protect_code_blocks(!self.no_code_protection)
            .with_page_breaks(self.page_breaks)
            .with_images(self.images)
            .with_image_dir(self.image_dir.clone())
            .with_image_placement(self.image_placement.into())
            .with_preview(self.preview)
            .with_callouts(!self.no_callouts)
            .with_frontmatter(self.frontmatter)
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Some(Commands::Markdown {
            input,
            output,
            manifest,
            stats,
            options,
        }) => cmd_markdown(
            &input,
            output.as_deref(),
            manifest.as_deref(),
            stats,
            &options.to_options(),
        ),
        Some(Commands::Json {
            input,
            output,
            compact,
            options,
        }) => cmd_json(&input, output.as_deref(), compact, &options.to_options()),
        Some(Commands::Info { input, json }) => cmd_info(&input, json),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_markdown(
                    &input,
                    cli.output.as_deref(),
                    None,
                    false,
                    &cli.options.to_options(),
                )
            } else {
                println!("{}", "Usage: pagemd <FILE> [-o OUTPUT]".yellow());
                println!("       pagemd --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Run the pipeline on a worker thread and drive a progress bar from its events.
fn run_with_progress(
    doc: RawDocument,
    options: ConvertOptions,
) -> Result<Conversion, pagemd::Error> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let worker = thread::spawn(move || Pipeline::new(options).with_progress(tx).run(&doc));

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for event in rx.iter() {
        match event {
            ProgressEvent::PageDone { page, total } => {
                pb.set_length(total as u64);
                pb.set_position(page as u64);
            }
            ProgressEvent::Finished => pb.finish_with_message("done"),
            ProgressEvent::Cancelled => pb.abandon_with_message("cancelled"),
        }
    }
    if !pb.is_finished() {
        pb.finish_and_clear();
    }

    worker
        .join()
        .map_err(|_| pagemd::Error::Other("conversion thread panicked".to_string()))?
}

fn cmd_markdown(
    input: &Path,
    output: Option<&Path>,
    manifest: Option<&Path>,
    show_stats: bool,
    options: &ConvertOptions,
) -> CliResult {
    let doc = RawDocument::from_path(input)?;
    log::debug!("CLI: loaded {} pages from {}", doc.page_count(), input.display());
    let conversion = run_with_progress(doc, options.clone())?;
    let result = render::render(&conversion.document, options);

    if let Some(path) = output {
        fs::write(path, &result.markdown)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        print!("{}", result.markdown);
    }

    if let Some(path) = manifest {
        fs::write(path, result.manifest_json()?)?;
        println!(
            "{} {} ({} images)",
            "Manifest".green(),
            path.display(),
            result.image_count()
        );
    }

    if show_stats {
        let s = &result.stats;
        eprintln!("{}", "Conversion Statistics".cyan().bold());
        eprintln!("{}", "─".repeat(40).dimmed());
        eprintln!("{}: {}", "Pages".bold(), s.page_count);
        eprintln!("{}: {}", "Headings".bold(), s.heading_count);
        eprintln!("{}: {}", "Paragraphs".bold(), s.paragraph_count);
        eprintln!("{}: {}", "List items".bold(), s.list_item_count);
        eprintln!("{}: {}", "Tables".bold(), s.table_count);
        eprintln!("{}: {}", "Equations".bold(), s.equation_count);
        eprintln!("{}: {}", "Images".bold(), s.image_count);
        eprintln!("{}: {}", "Skipped pages".bold(), s.placeholder_count);
        eprintln!("{}: {}", "Words".bold(), s.word_count);
    }

    Ok(())
}

fn cmd_json(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    options: &ConvertOptions,
) -> CliResult {
    let doc = RawDocument::from_path(input)?;
    let conversion = run_with_progress(doc, options.clone())?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = render::to_json(&conversion.document, format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_info(input: &Path, as_json: bool) -> CliResult {
    let doc = RawDocument::from_path(input)?;

    let broken = doc.pages.iter().filter(|p| p.defect().is_some()).count();
    let blocks: usize = doc.pages.iter().map(|p| p.blocks.len()).sum();
    let images = doc
        .pages
        .iter()
        .flat_map(|p| &p.blocks)
        .filter(|b| b.is_image())
        .count();
    let structured = pagemd::structure(&doc, &ConvertOptions::default())?;

    if as_json {
        let info = serde_json::json!({
            "file": input.display().to_string(),
            "pages": doc.page_count(),
            "metadata": doc.metadata,
            "blocks": blocks,
            "image_blocks": images,
            "unusable_pages": broken,
            "headings": structured.headings().count(),
            "tables": structured.tables().count(),
            "equations": structured.equations().count(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), doc.page_count());
    if let Some(ref title) = doc.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = doc.metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref source) = doc.metadata.source {
        println!("{}: {}", "Source".bold(), source);
    }
    if let Some(ref created) = doc.metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Blocks".bold(), blocks);
    println!("{}: {}", "Image blocks".bold(), images);
    if broken > 0 {
        println!("{}: {}", "Unusable pages".bold().yellow(), broken);
    }
    println!("{}: {}", "Headings".bold(), structured.headings().count());
    println!("{}: {}", "Tables".bold(), structured.tables().count());
    println!("{}: {}", "Equations".bold(), structured.equations().count());

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pagemd".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Structured Markdown from extracted page geometry");
    println!();
    println!("License: MIT");
}

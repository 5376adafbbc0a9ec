use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod error;
mod logging;
mod media;
mod shelf;
mod state;

use config::Config;
use shelf::ProjectShelf;
use state::directory::DirectoryEvent;

/// Recent-projects shelf for YMM4 project files
#[derive(Debug, Parser)]
#[command(name = "ymmp-shelf", version, about)]
struct Cli {
    /// Directory holding projects.json, Images/ and the log
    #[arg(long, env = "YMMP_SHELF_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// ffmpeg binary used for thumbnails
    #[arg(long, env = "YMMP_SHELF_FFMPEG", global = true)]
    ffmpeg: Option<PathBuf>,

    /// Editor install directory; its bundled ffmpeg is used when present
    #[arg(long, env = "YMMP_SHELF_HOST_DIR", global = true)]
    host_dir: Option<PathBuf>,

    /// Log decoder output and other debug detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the shelf, refresh thumbnails and print projects, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Add project files; paths without the .ymmp extension are ignored
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Add every project file under a folder, recursively
    Import { folder: PathBuf },
    /// Open a project (by path or name) with the default application
    Open { query: String },
    /// Generate the thumbnail for one project file and print its path
    Thumbnail { path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::resolve(cli.data_dir, cli.ffmpeg, cli.host_dir);
    logging::init(&config.log_path(), cli.verbose);
    log::info!("data directory: {}", config.data_dir.display());

    let mut shelf = ProjectShelf::new(&config);

    match cli.command {
        Command::List { json } => {
            let mut events = shelf.directory_mut().subscribe();
            shelf.load().await;
            shelf.directory_mut().settle_thumbnails().await;

            let mut ready = 0;
            while let Ok(event) = events.try_recv() {
                if let DirectoryEvent::ThumbnailChanged { .. } = event {
                    ready += 1;
                }
            }
            log::debug!("{} thumbnails settled", ready);

            print_projects(&shelf, json);
        }
        Command::Add { paths } => {
            shelf.load().await;
            let added = shelf.add_dropped(&paths).await;
            shelf.directory_mut().settle_thumbnails().await;
            println!("added {} of {} path(s)", added, paths.len());
        }
        Command::Import { folder } => {
            shelf.load().await;
            let result = shelf.import_folder(&folder).await;
            shelf.directory_mut().settle_thumbnails().await;
            println!(
                "imported {} project(s), skipped {}; {} on the shelf",
                result.imported_count,
                result.skipped_count,
                shelf.directory().len()
            );
        }
        Command::Open { query } => {
            shelf.load().await;
            let Some(record) = shelf.find(&query) else {
                eprintln!("no project matches {:?}", query);
                return ExitCode::FAILURE;
            };
            if !shelf.open_project(record) {
                eprintln!("could not open {}", record.path.display());
            }
        }
        Command::Thumbnail { path } => {
            let extractor = shelf.directory().extractor();
            match extractor.generate(&path).await {
                Ok(thumb) if thumb.exists() => println!("{}", thumb.display()),
                Ok(thumb) => eprintln!("ffmpeg did not produce {}", thumb.display()),
                Err(e) => {
                    log::error!("{}", e);
                    eprintln!("{}", e);
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_projects(shelf: &ProjectShelf, json: bool) {
    let records = shelf.directory().records();

    if json {
        let summaries: Vec<_> = records.iter().map(|r| r.summary()).collect();
        match serde_json::to_string_pretty(&summaries) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("failed to serialize project list: {}", e),
        }
        return;
    }

    if shelf.directory().is_empty() {
        println!(
            "No projects yet. Add some with `ymmp-shelf add <file.ymmp>` ({}).",
            shelf.directory().store().path().display()
        );
        return;
    }

    for record in records {
        println!(
            "{:<16}  {:<11}  {}  ({})",
            record.last_modified_display(),
            record.thumbnail.label(),
            record.name,
            record.path.display()
        );
    }
}

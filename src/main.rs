use clap::{Parser, Subcommand};
use imgvault::batch::{BatchOptions, DownloadOutput, Orchestrator};
use imgvault::imaging::RustBackend;
use imgvault::imaging::payload::to_base64;
use imgvault::signature::{SelectionVector, Signature};
use imgvault::store::VersionStore;
use imgvault::{archive, config, naming, output};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgvault")]
#[command(about = "Per-user image store with histogram and intensity transforms")]
#[command(long_about = "\
Per-user image store with histogram and intensity transforms

Images are stored per user as originals, plus any number of processed
variants. A variant is identified by a five-character signature, one
flag per position:

  position  0         1                       2                    3                4
            Original  Histogram Equalization  Contrast Stretching  Log Compression  Reverse Video

  10000  the original upload
  01100  histogram-equalized, then contrast-stretched
  00001  negative

Transforms always run in the order above.

Run 'imgvault gen-config' to generate a documented imgvault.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "imgvault.toml", global = true)]
    config: PathBuf,

    /// Store file (overrides [store] path from the config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Which stored version of each file a command refers to.
#[derive(clap::Args, Clone)]
struct SelectionArgs {
    /// Five-character signature, e.g. 10000 or 01100
    #[arg(long, conflicts_with = "step")]
    signature: Option<Signature>,

    /// A single step by name, e.g. "Reverse Video"
    #[arg(long)]
    step: Option<String>,
}

impl SelectionArgs {
    fn selection(&self) -> Result<SelectionVector, Box<dyn std::error::Error>> {
        match (&self.signature, &self.step) {
            (Some(sig), _) => Ok(sig.selection()),
            (None, Some(name)) => Ok(SelectionVector::from_step_name(name)?),
            (None, None) => Ok(SelectionVector::ORIGINAL),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Register a new user
    NewUser { username: String },
    /// Delete a user and everything they stored
    DeleteUser { username: String },
    /// Delete a file's original and all of its variants
    DeleteFile { username: String, filename: String },
    /// Upload images (comma-separated; .zip files are expanded)
    Upload {
        username: String,
        paths: Vec<String>,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Download stored images; several results are packaged into a zip
    Download {
        username: String,
        filenames: Vec<String>,
        #[command(flatten)]
        selection: SelectionArgs,
        /// Encoding of the downloaded files: .jpg, .png or .tiff
        #[arg(long, default_value = ".png")]
        ext: String,
        /// Directory to write results into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Archive file name (defaults to [download] archive_name)
        #[arg(long)]
        archive: Option<String>,
    },
    /// List users, or everything stored for one user
    List { username: Option<String> },
    /// Print a stock imgvault.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imgvault=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let app_config = config::load_config(&cli.config)?;
    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| app_config.store.path.clone());
    let mut store = VersionStore::open(&store_path)?;
    let backend = RustBackend::new();
    let options = BatchOptions::from(&app_config);

    match cli.command {
        Command::NewUser { username } => {
            store.create_user(&username)?;
            println!("Registered {username}");
        }
        Command::DeleteUser { username } => {
            store.delete_user(&username)?;
            println!("Deleted {username}");
        }
        Command::DeleteFile { username, filename } => {
            let removed = store.delete_filename(&username, &filename)?;
            println!("Deleted {filename} ({removed} entries)");
        }
        Command::Upload {
            username,
            paths,
            selection,
        } => {
            let flags = selection.selection()?.flags();
            let mut labels = Vec::new();
            let mut items = Vec::new();
            for (name, bytes) in read_upload_files(&paths)? {
                items.push(json!([name.as_str(), to_base64(&bytes), flags]));
                labels.push(name);
            }
            let report = Orchestrator::new(&mut store, &backend, options).upload_batch(&username, &items);
            output::print_upload_report(&labels, &report);
        }
        Command::Download {
            username,
            filenames,
            selection,
            ext,
            out_dir,
            archive,
        } => {
            let selection = selection.selection()?;
            let signature = selection.signature();
            let filenames: Vec<String> = filenames.iter().flat_map(|f| naming::split_path_list(f)).collect();
            let items: Vec<Value> = filenames
                .iter()
                .map(|f| json!([f, ext, selection.flags()]))
                .collect();
            let labels: Vec<String> = filenames.iter().map(|f| format!("{f} [{signature}]")).collect();
            let archive_name = archive.unwrap_or_else(|| app_config.download.archive_name.clone());
            let destination = out_dir.join(archive_name);

            let orchestrator = Orchestrator::new(&mut store, &backend, options);
            let report = orchestrator.download_batch(&username, &items, &destination)?;
            let saved = match &report.output {
                DownloadOutput::Single(image) => {
                    let path = out_dir.join(naming::archive_entry_name(
                        &image.filename,
                        &image.signature,
                        image.extension,
                    ));
                    std::fs::write(&path, &image.bytes)?;
                    Some(path)
                }
                _ => None,
            };
            output::print_download_report(&labels, &report, saved.as_deref());
        }
        Command::List { username } => match username {
            Some(name) => output::print_user_listing(store.user(&name)?),
            None => output::print_user_names(store.usernames()),
        },
        Command::GenConfig => {}
    }

    store.close()?;
    Ok(())
}

/// Read every upload path, expanding comma-separated lists and zip archives.
fn read_upload_files(args: &[String]) -> Result<Vec<(String, Vec<u8>)>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in args.iter().flat_map(|a| naming::split_path_list(a)) {
        let path = Path::new(&path);
        let bytes = std::fs::read(path)?;
        let is_zip = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if is_zip {
            let images = archive::unzip_images(&bytes)?;
            info!(archive = %path.display(), images = images.len(), "expanded zip upload");
            files.extend(images);
        } else {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            if naming::image_extension(&name).is_none() {
                warn!(file = %name, "uploading file without an image extension");
            }
            files.push((name, bytes));
        }
    }
    Ok(files)
}

use clap::{Parser, Subcommand};
use recap::{config, output, pipeline};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("RECAP_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("RECAP_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "recap")]
#[command(about = "Stamp and composite exported photo-pair posts")]
#[command(long_about = "\
Stamp and composite exported photo-pair posts

Reads the export's posts.json and, for every post, brings both shots into the
output folder as JPEG (WEBP is re-encoded) stamped with the capture time,
caption and location, then pastes the secondary shot over the primary into a
single composite.

Layout (defaults):

  posts.json                        # manifest: JSON array of posts
  Photos/post/
  ├── front.webp                    # sources, matched by file name
  ├── back.webp
  ├── __processed/                  # stamped copies / conversions
  │   ├── front.jpg
  │   └── back.jpg
  └── __combined/                   # one composite per post
      └── 20240714_093005_combined.jpg

Existing files are never overwritten; a numeric suffix is added instead.

Run 'recap gen-config' to generate a documented recap.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file [default: recap.toml, if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the exported images
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Folder for stamped copies of the source images
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Folder for the per-post composites
    #[arg(long, global = true)]
    combined: Option<PathBuf>,

    /// Manifest of posts (JSON array)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Disable colored log output (also honors NO_COLOR)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process every post in the manifest (default)
    Run,
    /// Parse the manifest and report what a run would do, writing nothing
    Check,
    /// Print a stock recap.toml with all options documented
    GenConfig,
}

impl Cli {
    /// Config file, then CLI flags on top.
    fn resolve_config(&self) -> Result<config::RecapConfig, config::ConfigError> {
        let (path, required) = match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(config::DEFAULT_CONFIG_FILE), false),
        };
        let mut config = config::load_config(&path, required)?;

        let overrides = [
            (&self.input, &mut config.input_folder),
            (&self.output, &mut config.output_folder),
            (&self.combined, &mut config.combined_folder),
            (&self.manifest, &mut config.manifest_path),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Run => {
            let config = cli.resolve_config()?;
            let palette = output::Palette::detect(cli.no_color);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_event(&event, palette);
                }
            });
            let result = pipeline::run(&config, Some(tx));
            printer.join().unwrap();
            result?;
        }
        Command::Check => {
            let config = cli.resolve_config()?;
            let report = pipeline::check(&config)?;
            output::print_check_output(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

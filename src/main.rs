use clap::{Parser, Subcommand};
use pumlview::cli::CommonArgs;
use pumlview::library::DiagramLibrary;
use pumlview::render::LayoutHelperInstall;
use pumlview::{OutputFormat, Pipeline, RenderOptions, RenderRequest};
use std::path::PathBuf;

/// Render PlantUML diagrams through an external renderer with layered fallbacks
#[derive(Parser, Debug)]
#[command(name = "pumlview")]
#[command(version)]
#[command(about = "Render PlantUML diagrams to SVG, PNG or JPEG", long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one diagram to a file
    Render {
        /// Input .puml file (use "-" for stdin)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path (extension determines format unless --format is given)
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        /// Output format (svg, png, jpeg, or anything the renderer accepts)
        #[arg(short, long, value_name = "FORMAT")]
        format: Option<String>,

        /// Scale the diagram up and force a white background before rendering
        #[arg(long)]
        enlarge_fonts: bool,

        /// Fail instead of writing the simplified fallback view
        #[arg(long)]
        strict: bool,
    },
    /// List the .puml files in the diagram directory
    List {
        /// Print JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },
    /// Show which layout helpers (Graphviz dot) were found
    Helpers,
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    args.common.init_logging()?;
    let config = args.common.config()?;

    match args.command {
        Command::Render {
            input,
            output,
            format,
            enlarge_fonts,
            strict,
        } => {
            let format = match format {
                Some(name) => name.parse::<OutputFormat>()?,
                None => OutputFormat::from_path(&output)
                    .ok_or("Output file has no usable extension; pass --format")?,
            };

            let source = if input.to_str() == Some("-") {
                let mut buffer = String::new();
                std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
                    .map_err(|e| format!("Failed to read from stdin: {}", e))?;
                buffer
            } else {
                std::fs::read_to_string(&input)
                    .map_err(|e| format!("Failed to read input file: {}", e))?
            };

            let pipeline = Pipeline::new(config);
            let request =
                RenderRequest::new(source, format).with_options(RenderOptions { enlarge_fonts });
            let result = pipeline.render(&request).map_err(|e| e.to_string())?;

            if result.is_fallback {
                if strict {
                    return Err(format!(
                        "Renderer failed after {} attempts; refusing to write the fallback view",
                        result.attempts.len()
                    ));
                }
                eprintln!("Warning: renderer unavailable, wrote a simplified view");
            }

            std::fs::write(&output, &result.content)
                .map_err(|e| format!("Failed to write {}: {}", result.format, e))?;
            eprintln!(
                "{} saved to: {} ({})",
                result.format.to_string().to_ascii_uppercase(),
                output.display(),
                result.method
            );
        }
        Command::List { json } => {
            let library = DiagramLibrary::new(&config.diagram_dir);
            let entries = library.list().map_err(|e| e.to_string())?;
            if json {
                let text = serde_json::to_string_pretty(&entries)
                    .map_err(|e| format!("Failed to serialize listing: {}", e))?;
                println!("{}", text);
            } else {
                for entry in entries {
                    println!("{}", entry.filename);
                }
            }
        }
        Command::Helpers => {
            let pipeline = Pipeline::new(config);
            let helpers = pipeline.layout_helpers();
            if helpers.is_empty() {
                println!("No layout helper found");
            }
            for LayoutHelperInstall { path, version } in helpers {
                println!(
                    "{}\t{}",
                    path.display(),
                    version.as_deref().unwrap_or("unknown version")
                );
            }
        }
    }

    Ok(())
}

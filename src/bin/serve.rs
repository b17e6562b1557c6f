use clap::Parser;
use pumlview::Pipeline;
use pumlview::cli::CommonArgs;
use pumlview::library::DiagramLibrary;
use pumlview::server::Server;

/// Line-delimited JSON render server over stdio
#[derive(Parser, Debug)]
#[command(name = "pumlview-serve")]
#[command(version)]
#[command(about = "Serve render, list and read requests as JSON lines on stdin/stdout", long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    args.common.init_logging()?;
    let config = args.common.config()?;

    let library = DiagramLibrary::new(&config.diagram_dir);
    let pipeline = Pipeline::new(config);
    log::info!(
        "Serving diagrams from {} with {} layout helper(s)",
        library.dir().display(),
        pipeline.layout_helpers().len()
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    Server::new(&pipeline, library)
        .serve(stdin.lock(), stdout.lock())
        .map_err(|e| format!("I/O error: {}", e))
}

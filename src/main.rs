use axis::cli::{Cli, Commands};
use clap::Parser;
use miette::Result;

fn main() -> Result<()> {
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = &cli.global;
    match cli.command {
        Commands::Init(args) => axis::cli::commands::init::run(args, global),
        Commands::Feat(cmd) => axis::cli::commands::feat::run(cmd, global),
        Commands::Wo(cmd) => axis::cli::commands::wo::run(cmd, global),
        Commands::Tol(cmd) => axis::cli::commands::tol::run(cmd, global),
        Commands::Spc(args) => axis::cli::commands::spc::run(args, global),
        Commands::Undo(args) => axis::cli::commands::undo::run(args, global),
        Commands::Export(args) => axis::cli::commands::export::run(args, global),
    }
}

/// Log level from `-v` flags; `RUST_LOG` still wins when set
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

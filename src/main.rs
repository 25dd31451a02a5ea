use clap::Parser;
use clap::Subcommand;
use git_testament::git_testament;
use git_testament::render_testament;
use maple::demux::command::demux;
use maple::demux::command::DemuxArgs;
use maple::mutations::command::mutations;
use maple::mutations::command::MutationsArgs;

git_testament!(TESTAMENT);

#[derive(Parser)]
#[command(name = "maple", version = render_testament!(TESTAMENT), propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Only errors are printed to the stderr stream.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// All available information, including debug information, is printed to
    /// stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Splits aligned reads into one BAM file per barcode group.
    Demux(DemuxArgs),

    /// Calls and tabulates the mutations of aligned reads.
    Mutations(MutationsArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut level = tracing::Level::INFO;
    if cli.quiet {
        level = tracing::Level::ERROR;
    } else if cli.verbose {
        level = tracing::Level::DEBUG;
    }

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Demux(args) => demux(args),
        Commands::Mutations(args) => mutations(args),
    }
}

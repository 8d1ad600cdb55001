use std::process::ExitCode;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use misra::app::App;
use misra::client::ProfilerHttpClient;
use misra::config::ConfigLoader;
use misra::domain::TaxonId;
use misra::error::MisraError;
use misra::example_config::{ANNOTATED_CONFIG, write_example};
use misra::materialize::{ResultBundle, SUMMARY_FILE};
use misra::output::{ConsoleOutput, JsonOutput, OutputMode, ProgressSink};
use misra::poll::{PollPolicy, ThreadSleeper};
use misra::prompt::{FixedPrompter, Prompter, TerminalPrompter};
use misra::stats::{StatFile, download_db_stat, download_taxon_stat};

#[derive(Parser)]
#[command(name = "misra")]
#[command(
    about = "Profile small RNA-seq samples from the Sequence Read Archive on the miSRA server"
)]
#[command(version, author)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Print machine-readable JSON and never prompt (declines overwrites unless --yes)"
    )]
    non_interactive: bool,

    #[arg(long, short = 'y', global = true, help = "Answer yes to every prompt")]
    yes: bool,

    #[arg(
        long,
        global = true,
        value_name = "SECS",
        help = "Give up following a job after this many seconds (default: wait indefinitely)"
    )]
    max_wait: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Submit a profiling job described by a config file")]
    Run(RunArgs),
    #[command(about = "Follow a submitted job by its identifier and download its results")]
    Resume(ResumeArgs),
    #[command(about = "Download database statistics to the current directory")]
    DbStat,
    #[command(about = "Download the studies and samples available for one species")]
    TaxonStat(TaxonStatArgs),
    #[command(about = "Write an example config file to the current directory")]
    ExampleConfig,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, short = 'c')]
    config: String,
}

#[derive(Args)]
struct ResumeArgs {
    job_id: String,
}

#[derive(Args)]
struct TaxonStatArgs {
    taxon_id: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MisraError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MisraError) -> u8 {
    match error {
        MisraError::JobFailed(_)
        | MisraError::NoData(_)
        | MisraError::UnexpectedResponse { .. }
        | MisraError::MissingJobId => 2,
        MisraError::Http(_)
        | MisraError::PollTransport { .. }
        | MisraError::PollTimeout { .. }
        | MisraError::DownloadStatus { .. } => 3,
        MisraError::Filesystem(_)
        | MisraError::OverwriteDeclined(_)
        | MisraError::DestinationChoice(_)
        | MisraError::MalformedArchive(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let prompter: Box<dyn Prompter> = match (cli.yes, output_mode) {
        (true, _) => Box::new(FixedPrompter::accept_all()),
        (false, OutputMode::NonInteractive) => Box::new(FixedPrompter::decline_all()),
        (false, OutputMode::Interactive) => Box::new(TerminalPrompter),
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &ConsoleOutput,
        OutputMode::NonInteractive => &JsonOutput,
    };
    let policy = PollPolicy {
        max_wait: cli.max_wait.map(Duration::from_secs),
        ..PollPolicy::default()
    };

    match cli.command {
        Commands::Run(args) => {
            let request = ConfigLoader::load(&Utf8PathBuf::from(args.config))?;
            let app = App::new(ProfilerHttpClient::new()?, ThreadSleeper, policy);
            let bundle = app.run(&request, prompter.as_ref(), sink)?;
            print_bundle(&bundle, output_mode)
        }
        Commands::Resume(args) => {
            let app = App::new(ProfilerHttpClient::new()?, ThreadSleeper, policy);
            let bundle = app.resume(&args.job_id, prompter.as_ref(), sink)?;
            print_bundle(&bundle, output_mode)
        }
        Commands::DbStat => {
            let client = ProfilerHttpClient::new()?;
            let stat = download_db_stat(&client, Utf8Path::new("."))?;
            print_stat(&stat, output_mode, "Database statistics")
        }
        Commands::TaxonStat(args) => {
            let taxon: TaxonId = args.taxon_id.parse()?;
            let client = ProfilerHttpClient::new()?;
            let stat = download_taxon_stat(&client, &taxon, Utf8Path::new("."))?;
            print_stat(&stat, output_mode, &format!("Statistics for taxon {taxon}"))
        }
        Commands::ExampleConfig => {
            let path = write_example(Utf8Path::new("."))?;
            println!("{ANNOTATED_CONFIG}");
            println!("Example config written to {path}");
            Ok(())
        }
    }
}

fn print_bundle(bundle: &ResultBundle, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_bundle(bundle).into_diagnostic(),
        OutputMode::Interactive => {
            match &bundle.summary {
                Some(summary) => {
                    println!("Successfully received the output. Summary can be found in {summary}")
                }
                None => println!(
                    "Received {} files in {}, but no {SUMMARY_FILE} was among them",
                    bundle.files.len(),
                    bundle.destination
                ),
            }
            Ok(())
        }
    }
}

fn print_stat(stat: &StatFile, output_mode: OutputMode, title: &str) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_stat(stat).into_diagnostic(),
        OutputMode::Interactive => {
            println!("{title} written to {}", stat.path);
            if !stat.preview.is_empty() {
                println!("\nPreview:\n");
                for line in &stat.preview {
                    println!("{line}");
                }
            }
            Ok(())
        }
    }
}

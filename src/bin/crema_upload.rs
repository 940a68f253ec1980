use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use crema_upload::app::{App, SubmitRequest, SubmitResult};
use crema_upload::config::ConfigLoader;
use crema_upload::domain::{DataType, JobParameters, Organism};
use crema_upload::error::UploadError;
use crema_upload::output::{JsonOutput, OutputMode, TracingSink};
use crema_upload::server::CremaHttpClient;
use crema_upload::upload::ThreadSleep;

#[derive(Parser)]
#[command(name = "crema-upload")]
#[command(about = "Uploads files to the CREMA web server and starts the analysis")]
#[command(version, author)]
struct Cli {
    #[arg(
        long = "file-list",
        value_name = "TSV_FILE",
        help = "TSV file with sample, sample type and file path columns (needs `fq1`)"
    )]
    file_list: String,

    #[arg(short = 'e', help = "email address", default_value = "")]
    email: String,

    #[arg(short = 'p', help = "project name", default_value = "")]
    project: String,

    #[arg(short = 't', long = "data-type", value_enum, default_value_t = DataType::ChipSeq)]
    data_type: DataType,

    #[arg(
        short = 'o',
        help = "organism: hg19 for human, mm10 for mouse, rn6 for rat",
        value_enum,
        default_value_t = Organism::Hg19
    )]
    organism: Organism,

    #[arg(long, help = "JSON config file (defaults to ./crema-upload.json if present)")]
    config: Option<String>,

    #[arg(long, help = "override the base URL of every server endpoint")]
    server: Option<String>,

    #[arg(long, help = "do not start the job if any file failed to upload")]
    strict: bool,

    #[arg(long, help = "print the submission result as JSON")]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<UploadError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &UploadError) -> u8 {
    match error {
        UploadError::MalformedManifest { .. }
        | UploadError::ManifestRead(_)
        | UploadError::MissingInputFile(_)
        | UploadError::ConfigRead(_)
        | UploadError::ConfigParse(_)
        | UploadError::InvalidConfig(_) => 2,
        error if error.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        resolved.client.session_url = server.clone();
        resolved.client.base_url = server;
    }
    if cli.strict {
        resolved.settings.fail_on_incomplete = true;
    }

    let scratch_root = std::env::current_dir().into_diagnostic()?;
    let request = SubmitRequest {
        manifest: Utf8PathBuf::from(cli.file_list),
        parameters: JobParameters::new(cli.email, cli.project, cli.organism, cli.data_type),
        scratch_root,
    };

    let server = CremaHttpClient::new(&resolved.client)?;
    let app = App::new(server, ThreadSleep, resolved.settings);
    let result = app.submit(&request, &TracingSink)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_submit(&result).into_diagnostic()?,
        OutputMode::Human => print_summary(&result),
    }
    Ok(())
}

fn print_summary(result: &SubmitResult) {
    let yellow = "\x1b[33m";
    let reset = "\x1b[0m";

    if !result.incomplete_files.is_empty() {
        println!(
            "{yellow}Some files could not be uploaded (session {}):{reset}",
            result.session_id
        );
        for path in &result.incomplete_files {
            println!("{yellow}    {path}{reset}");
        }
    }
    println!(
        "\n>>>>>>>>>>\nHere is link to your results:\n    {}",
        result.result_link
    );
}

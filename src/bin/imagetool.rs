//! BACnet device image tool
//!
//! Displays header fields of a device image, reformats its NPDUs into a capture
//! file for Wireshark, or replays them to a live device.

use std::{
    error::Error as StdError,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use bacnet_imagetool::{
    capture, datalink, util::parse_dotted_quad, FieldName, FieldQuery, RawImage, ReplayConfig,
    BACNET_IP_PORT,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(
    name = "imagetool",
    version,
    about = "Inspect, convert and replay BACnet device image files"
)]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Display the image header, or a single field of it
    Header {
        /// Image file, relative to the current directory
        file: PathBuf,

        /// Field to display (entire header when omitted)
        #[arg(short, long, value_enum)]
        field: Option<Field>,
    },

    /// Reformat the image NPDUs into a Wireshark readable capture file
    Convert {
        /// Image file, relative to the current directory
        file: PathBuf,

        /// Output path (default IFConversion.pcapng in the current directory);
        /// an existing file is overwritten
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send the image NPDUs to the BACnet/IP port of a device
    Replay {
        /// Image file, relative to the current directory
        file: PathBuf,

        /// IPv4 address of the device
        ip: String,

        /// Destination UDP port
        #[arg(long, default_value_t = BACNET_IP_PORT)]
        port: u16,

        /// Pause between datagrams in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Field {
    ModelName,
    MinScriptVersion,
    MinFbVersion,
    Type,
}

impl From<Field> for FieldName {
    fn from(field: Field) -> Self {
        match field {
            Field::ModelName => FieldName::ModelName,
            Field::MinScriptVersion => FieldName::MinScriptVersion,
            Field::MinFbVersion => FieldName::MinFbVersion,
            Field::Type => FieldName::Type,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("The file provided does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Image(#[from] bacnet_imagetool::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::MissingFile(_) | CliError::InvalidAddress(_) => ExitCode::from(2),
            CliError::Image(_) => ExitCode::FAILURE,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level.as_str()),
    );
    if verbose > 0 || quiet {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

fn open_image(file: &Path) -> Result<RawImage, CliError> {
    if !file.is_file() {
        return Err(CliError::MissingFile(file.to_path_buf()));
    }
    Ok(RawImage::open(file)?)
}

fn run(command: Command) -> Result<String, CliError> {
    match command {
        Command::Header { file, field } => {
            let image = open_image(&file)?;
            let query = field.map_or(FieldQuery::All, |f| FieldQuery::Single(f.into()));
            let lines: Vec<String> = image
                .header(query)?
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(lines.join("\n"))
        }
        Command::Convert { file, output } => {
            let image = open_image(&file)?;
            info!("Extracting NPDUs from {}", file.display());
            let records = match output {
                Some(path) => capture::convert_to_file(&image, path)?,
                None => capture::convert(&image)?.1,
            };
            Ok(format!(
                "Finished Conversion - {} instructions converted",
                records
            ))
        }
        Command::Replay {
            file,
            ip,
            port,
            interval_ms,
        } => {
            let addr = parse_dotted_quad(&ip).ok_or_else(|| CliError::InvalidAddress(ip))?;
            let image = open_image(&file)?;
            let config = ReplayConfig {
                port,
                interval: Duration::from_millis(interval_ms),
            };
            let sent = datalink::replay(&image, addr, &config)?;
            Ok(format!("Finished Replay - {} instructions sent", sent))
        }
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.ends_with(&cause_text) {
            message.push_str(&format!("\n  caused by: {}", cause_text));
        }
        source = cause.source();
    }
    message
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(message) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR - {}", error_chain(&err));
            err.exit_code()
        }
    }
}

//! Back up the running configuration of a network device.
//!
//! ```text
//! netbackup -d 192.168.1.1 -u admin -t cisco_ios -P telnet
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dialoguer::Password;
use flexi_logger::{DeferredNow, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle};
use log::{Record, error};

use netbackup::event::SessionEvent;
use netbackup::{BackupWriter, DeviceFamily, EventSink, LogSink, SessionBuilder, TransportKind};

#[derive(Parser, Debug)]
#[command(name = "netbackup", version, about = "Network Device Configuration Backup Tool")]
struct Args {
    /// Device IP address or hostname
    #[arg(short = 'd', long = "device")]
    device: String,

    /// Username for authentication
    #[arg(short = 'u', long)]
    username: String,

    /// Password (prompted if not provided)
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Enable password (Cisco only)
    #[arg(short = 'e', long = "enable")]
    enable: Option<String>,

    /// Connection protocol: telnet or ssh
    #[arg(short = 'P', long, default_value = "ssh")]
    protocol: TransportKind,

    /// Device type: cisco_ios, cisco_nxos or juniper
    #[arg(short = 't', long = "device-type", default_value = "cisco_ios")]
    device_type: String,

    /// Output directory for backups
    #[arg(short = 'o', long = "output-dir", default_value = "./backups")]
    output_dir: PathBuf,

    /// Port (defaults to 23 for telnet, 22 for ssh)
    #[arg(long)]
    port: Option<u16>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Log file, appended to on every run
    #[arg(long = "log-file", default_value = "network_backup.log")]
    log_file: PathBuf,

    /// Save whatever was captured when a backup fails
    #[arg(long = "keep-partial")]
    keep_partial: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logger = match init_logging(&args) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: cannot log to {}: {}", args.log_file.display(), e);
            None
        }
    };

    let sink: Arc<dyn EventSink> = Arc::new(LogSink);
    let code = backup(&args, &sink).await;
    if let Some(logger) = logger {
        logger.flush();
    }
    code
}

/// Log to `--log-file`, echoing warnings (or, with `--verbose`, the
/// session's progress and device output) to stderr.
fn init_logging(args: &Args) -> Result<LoggerHandle, FlexiLoggerError> {
    let directory = args
        .log_file
        .parent()
        .map(PathBuf::from)
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    let basename = args
        .log_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("network_backup")
        .to_string();
    let suffix = args
        .log_file
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("log")
        .to_string();

    let (spec, duplicate) = if args.verbose {
        ("info, netbackup=debug", Duplicate::Debug)
    } else {
        ("info", Duplicate::Warn)
    };

    Logger::try_with_env_or_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(directory)
                .basename(basename)
                .suffix(suffix)
                .suppress_timestamp(),
        )
        .append()
        .format_for_files(log_line)
        .duplicate_to_stderr(duplicate)
        .start()
}

/// `2024-05-01 12:00:00 - INFO - message`
fn log_line(w: &mut dyn Write, now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
    write!(
        w,
        "{} - {} - {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.args()
    )
}

async fn backup(args: &Args, sink: &Arc<dyn EventSink>) -> ExitCode {
    // Reject an unknown family before prompting for anything.
    let family: DeviceFamily = match args.device_type.parse() {
        Ok(family) => family,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let password = match &args.password {
        Some(password) => password.clone(),
        None => match Password::new()
            .with_prompt(format!("Password for {}@{}", args.username, args.device))
            .allow_empty_password(true)
            .interact()
        {
            Ok(password) => password,
            Err(e) => {
                eprintln!("Error: cannot read password: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let mut builder = SessionBuilder::new(&args.device)
        .username(&args.username)
        .password(password)
        .device_family(family)
        .transport(args.protocol)
        .timeout(Duration::from_secs(args.timeout))
        .event_sink(Arc::clone(sink));
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(enable) = &args.enable {
        builder = builder.enable_secret(enable);
    }

    let driver = match builder.build() {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let writer = BackupWriter::new(&args.output_dir);
    match writer.ensure_dir() {
        Ok(true) => sink.record(&SessionEvent::DirectoryCreated {
            path: writer.output_dir(),
        }),
        Ok(false) => {}
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if args.verbose {
        println!(
            "Backing up {} ({}) over {}...",
            args.device, family, args.protocol
        );
    }

    match driver.run().await {
        Ok(artifact) => match writer.write(&artifact) {
            Ok(path) => {
                sink.record(&SessionEvent::Saved {
                    address: &artifact.address,
                    path: &path,
                });
                if args.verbose {
                    println!(
                        "Captured {} lines in {:.1}s",
                        artifact.line_count(),
                        artifact.elapsed.as_secs_f64()
                    );
                }
                println!("Backup saved to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Backup failed: {}", e);
            if args.keep_partial && !e.partial().is_empty() {
                match writer.write_partial(&args.device, e.partial()) {
                    Ok(path) => {
                        sink.record(&SessionEvent::Saved {
                            address: &args.device,
                            path: &path,
                        });
                        eprintln!("Partial capture saved to {}", path.display());
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            ExitCode::FAILURE
        }
    }
}

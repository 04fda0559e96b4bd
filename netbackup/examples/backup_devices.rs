//! Back up several devices one after another.
//!
//! Each device is handled by its own session; a failure on one device is
//! reported and the loop moves on to the next.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example backup_devices -- admin secret \
//!     10.0.0.1:cisco_ios:ssh 10.0.0.2:juniper:ssh 10.0.0.3:cisco_nxos:telnet
//! ```

use std::env;
use std::sync::Arc;

use netbackup::{BackupWriter, LogSink, SessionBuilder, TransportKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let (Some(username), Some(password)) = (args.next(), args.next()) else {
        eprintln!("Usage: backup_devices <username> <password> <address:family:transport>...");
        std::process::exit(2);
    };

    let sink = Arc::new(LogSink);
    let writer = BackupWriter::new("./backups");
    writer.ensure_dir()?;

    let mut failures = 0;
    for target in args {
        let mut parts = target.splitn(3, ':');
        let address = parts.next().unwrap_or_default();
        let family = parts.next().unwrap_or("cisco_ios");
        let transport: TransportKind = parts.next().unwrap_or("ssh").parse()?;

        let driver = SessionBuilder::new(address)
            .username(&username)
            .password(&password)
            .family(family)
            .transport(transport)
            .event_sink(sink.clone())
            .build()?;

        match driver.run().await {
            Ok(artifact) => {
                let path = writer.write(&artifact)?;
                println!(
                    "{}: {} lines -> {}",
                    address,
                    artifact.line_count(),
                    path.display()
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", address, e);
            }
        }
    }

    println!("{} failure(s)", failures);
    Ok(())
}

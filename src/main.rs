//! ntrip-relay - relay an NTRIP correction stream between two casters

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ntrip_relay::config::Config;
use ntrip_relay::error::Result;
use ntrip_relay::pidfile::PidFile;
use ntrip_relay::Relay;

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        print_version();
        return Ok(());
    }

    if args.gen_config {
        let json = serde_json::to_string_pretty(&Config::example())
            .map_err(|e| ntrip_relay::Error::Config(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        process::exit(1);
    }

    init_logging(config.log.level());

    if config.log.debug {
        if let Ok(dump) = serde_json::to_string_pretty(&config.redacted()) {
            info!("Settings:\n{}", dump);
        }
    }

    let pid_file = match &config.pid_file {
        Some(path) => Some(PidFile::create(path)?),
        None => None,
    };

    info!("NTRIP relay v{} starting...", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(config));

    // Relay tasks must be gone before the pid-file is
    drop(rt);
    drop(pid_file);

    if let Err(e) = result {
        error!("Relay error: {}", e);
        process::exit(1);
    }

    info!("Goodbye!");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let mut relay = Relay::new(
        config.source.address(),
        &config.source.mountpoint,
        config.destination.address(),
        &config.destination.mountpoint,
    );

    if let Some((login, password)) = config.source.credentials() {
        relay.set_source_credentials(login, password);
    }
    if let Some((login, password)) = config.destination.credentials() {
        relay.set_destination_credentials(login, password);
    }
    if let Some(gga) = config.gga() {
        relay.set_gga(gga);
    }

    tokio::select! {
        result = relay.run_with_timeout(config.timeout()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over the configured level
fn init_logging(level: Level) {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(level);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Command line. Every flag overrides the matching value from `--config`.
#[derive(Parser, Debug)]
#[command(
    name = "ntrip-relay",
    about = "Relay an NTRIP correction stream from a source caster to a destination caster",
    disable_version_flag = true
)]
struct Args {
    /// JSON settings file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print an example settings file and exit
    #[arg(long)]
    gen_config: bool,

    /// Source caster host
    #[arg(short = 'S', long)]
    src_server: Option<String>,

    /// Source caster port [default: 2101]
    #[arg(short = 'P', long)]
    src_port: Option<u16>,

    /// Source mountpoint
    #[arg(short = 'M', long)]
    src_mountpoint: Option<String>,

    /// Source login
    #[arg(short = 'L', long)]
    src_login: Option<String>,

    /// Source password
    #[arg(short = 'W', long)]
    src_password: Option<String>,

    /// Destination caster host
    #[arg(short = 's', long)]
    dst_server: Option<String>,

    /// Destination caster port [default: 2101]
    #[arg(short = 'p', long)]
    dst_port: Option<u16>,

    /// Destination mountpoint
    #[arg(short = 'm', long)]
    dst_mountpoint: Option<String>,

    /// Destination login
    #[arg(short = 'l', long)]
    dst_login: Option<String>,

    /// Destination password
    #[arg(short = 'w', long)]
    dst_password: Option<String>,

    /// NMEA GGA sentence sent to the source caster
    #[arg(short = 'g', long)]
    gga: Option<String>,

    /// Idle timeout in seconds, 0 disables it [default: 120]
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Debug mode
    #[arg(short = 'd', long)]
    debug: bool,

    /// Verbosity 0..2 [default: 1]
    #[arg(short = 'V', long, allow_negative_numbers = true)]
    verbosity: Option<i64>,

    /// Write the process id to this file while running
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Print version information
    #[arg(short = 'v', long)]
    version: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        let src = &mut config.source;
        override_with(&mut src.server, &self.src_server);
        override_with(&mut src.port, &self.src_port);
        override_with(&mut src.mountpoint, &self.src_mountpoint);
        if self.src_login.is_some() {
            src.login = self.src_login.clone();
        }
        if self.src_password.is_some() {
            src.password = self.src_password.clone();
        }

        let dst = &mut config.destination;
        override_with(&mut dst.server, &self.dst_server);
        override_with(&mut dst.port, &self.dst_port);
        override_with(&mut dst.mountpoint, &self.dst_mountpoint);
        if self.dst_login.is_some() {
            dst.login = self.dst_login.clone();
        }
        if self.dst_password.is_some() {
            dst.password = self.dst_password.clone();
        }

        if self.gga.is_some() {
            config.gga = self.gga.clone();
        }
        override_with(&mut config.timeout_secs, &self.timeout);
        if self.debug {
            config.log.debug = true;
        }
        if let Some(verbosity) = self.verbosity {
            config.log.verbosity = verbosity.clamp(0, 2) as u8;
        }
        if self.pid_file.is_some() {
            config.pid_file = self.pid_file.clone();
        }
    }
}

fn override_with<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

fn print_version() {
    println!("ntrip-relay {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "ntrip-relay",
            "-S", "src.example", "-M", "RTCM3", "-L", "user",
            "-s", "dst.example", "-p", "2102", "-m", "OUT",
            "-t", "0", "-d", "-V", "7",
        ])
        .unwrap();

        let mut config = Config::default();
        config.source.port = 9999;
        args.apply(&mut config);

        assert_eq!(config.source.server, "src.example");
        assert_eq!(config.source.port, 9999);
        assert_eq!(config.source.mountpoint, "RTCM3");
        assert_eq!(config.source.credentials(), Some(("user".to_string(), String::new())));
        assert_eq!(config.destination.port, 2102);
        assert!(config.destination.credentials().is_none());
        assert_eq!(config.timeout_secs, 0);
        assert!(config.log.debug);
        assert_eq!(config.log.verbosity, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::try_parse_from(["ntrip-relay"]).unwrap();
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.log.verbosity, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_verbosity_clamped() {
        let args = Args::try_parse_from(["ntrip-relay", "-V", "-3"]).unwrap();
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.log.verbosity, 0);
    }
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use scroll_accel::backends::{self, BackendKind, BackendOptions};
use scroll_accel::config::{self, AppConfig, Overrides};
use scroll_accel::{signals, Controller, Error, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "scroll-accel")]
#[command(version, about = "Velocity-dependent scroll wheel acceleration")]
struct Args {
    /// Log every accelerated scroll (-v), or debug output (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Curve exponent: factor = multiplier * speed^exp
    #[arg(long)]
    exp: Option<f64>,

    /// Flat factor applied on top of the curve
    #[arg(long)]
    multiplier: Option<f64>,

    /// Config file (default: <config dir>/scroll-accel/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Idle gap that starts a new gesture
    #[arg(long, value_name = "MS")]
    idle_window_ms: Option<u64>,

    /// Largest delta (notches) emitted for one input event
    #[arg(long)]
    max_delta: Option<f64>,

    /// Input backend
    #[arg(long, value_enum, default_value_t = BackendKind::Auto)]
    backend: BackendKind,

    /// Input device node to grab (evdev, repeatable)
    #[arg(long = "device", value_name = "PATH")]
    devices: Vec<PathBuf>,

    /// Emit high-resolution wheel events (evdev)
    #[arg(long)]
    hi_res: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            exp: self.exp,
            multiplier: self.multiplier,
            verbose: self.verbose > 0,
            idle_window: self.idle_window_ms.map(Duration::from_millis),
            max_delta: self.max_delta,
            devices: self.devices.clone(),
            hi_res: self.hi_res,
        }
    }
}

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_logging(verbose: u8) -> FilterHandle {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::new(level(verbose)),
    };
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    handle
}

fn run(args: Args, filter: FilterHandle) -> Result<(), Error> {
    let file = config::load_file(args.config.as_deref())?;
    let config = AppConfig::resolve(file, args.overrides())?;

    // `verbose = true` in the file raises the default level like a single -v.
    if config.settings.verbose && args.verbose == 0 && std::env::var_os("RUST_LOG").is_none() {
        let _ = filter.reload(EnvFilter::new(level(1)));
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let options = BackendOptions {
        devices: config.devices.clone(),
        hi_res: config.hi_res,
    };
    let (mut source, mut sink) = backends::open(args.backend, &options)?;

    let mut controller = Controller::for_sink(
        config.settings,
        config.estimator,
        config.synth,
        sink.as_ref(),
    );

    let mut shutdown = Shutdown::new();
    if let Some(secs) = args.timeout {
        shutdown = shutdown.with_timeout(Duration::from_secs(secs));
    }
    signals::install(&shutdown)?;

    let stats = controller.run(source.as_mut(), sink.as_mut(), &shutdown)?;
    info!(
        "stopped: {} seen, {} emitted, {} accumulated, {} ignored, {} self, {} malformed, {} sink failures",
        stats.seen,
        stats.emitted,
        stats.accumulated,
        stats.ignored,
        stats.discarded_self,
        stats.dropped_malformed,
        stats.sink_failures
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter = init_logging(args.verbose);

    match run(args, filter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

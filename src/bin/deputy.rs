// Deputy CLI
// Holds newly attached keyboards until the release key is pressed on them

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use deputy_core::input::{classify, Classification};
use deputy_core::{Config, Engine, LinuxHost, MatchLevel, Notice, SessionSummary};

/// BadUSB keyboard guard
#[derive(Parser, Debug)]
#[command(name = "deputy")]
#[command(version)]
#[command(
    about = "Seizes newly attached keyboards until you press the release key on them",
    long_about = None
)]
struct Args {
    /// TOML configuration file (default: ~/.config/deputy/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Key that releases a seized keyboard (e.g. "a", "f12", "escape")
    #[arg(short, long, value_name = "KEY")]
    release_key: Option<String>,

    /// Match keyboards by "device" or "interface" descriptors
    #[arg(short, long, value_name = "LEVEL")]
    match_level: Option<String>,

    /// Hold at most one device at a time
    #[arg(short, long)]
    single: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List input devices and how they classify, without seizing anything
    #[arg(long)]
    list_devices: bool,
}

/// Main application state
struct Application {
    config: Config,
    /// Flag to signal the run loop to stop
    running: Arc<AtomicBool>,
}

impl Application {
    fn new(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::load_default().context("loading default config")?,
        };

        if let Some(key) = &args.release_key {
            config.set_release_key(key)?;
        }
        if let Some(level) = &args.match_level {
            config.set_match_level(level)?;
        }
        if args.single {
            config.set_single();
        }

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    fn describe(&self) {
        let config = &self.config;
        println!("Configuration is valid");
        match config.source_path() {
            Some(path) => println!("  file:          {}", path.display()),
            None => println!("  file:          (defaults)"),
        }
        println!("  release key:   {}", config.release_key);
        println!("  match level:   {}", config.match_level);
        match config.max_sessions {
            Some(max) => println!("  max sessions:  {}", max),
            None => println!("  max sessions:  unlimited"),
        }
        println!("  poll timeout:  {:?}", config.poll_timeout);
    }

    /// List input devices with their classification at both levels
    fn list_devices() -> anyhow::Result<()> {
        let candidates = deputy_core::enumerate_candidates()?;
        println!("Found {} input device(s):", candidates.len());
        for candidate in &candidates {
            let descriptor = &candidate.descriptor;
            let verdict = |level| match classify(descriptor, level) {
                Classification::Keyboard => "keyboard",
                Classification::NotKeyboard => "-",
            };
            println!(
                "  {:<20} {:<9} {:<9} {} {}",
                descriptor.location.to_string(),
                verdict(MatchLevel::Device),
                verdict(MatchLevel::Interface),
                format_ids(descriptor.vendor_id, descriptor.product_id),
                descriptor.name.as_deref().unwrap_or("Unknown"),
            );
        }
        Ok(())
    }

    fn install_signal_handler(&self) -> anyhow::Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handler")?;
        let running = self.running.clone();
        std::thread::spawn(move || {
            if signals.forever().next().is_some() {
                println!("\nReceived signal, releasing devices and shutting down...");
                running.store(false, Ordering::SeqCst);
            }
        });
        Ok(())
    }

    /// Run the engine until a signal arrives
    fn run(&self) -> anyhow::Result<()> {
        self.install_signal_handler()?;

        let mut engine = Engine::new(LinuxHost::new(), self.config.engine_config());
        engine.start().context("starting device discovery")?;

        println!(
            "deputy is running ({} level). Press {} on a new keyboard to release it. Ctrl+C to exit.",
            self.config.match_level, self.config.release_key
        );

        let result = self.run_main_loop(&mut engine);

        // Every seized device is closed even if the loop failed
        engine.shutdown();
        print_notices(engine.drain_notices());

        result
    }

    fn run_main_loop(&self, engine: &mut Engine<LinuxHost>) -> anyhow::Result<()> {
        let watch = engine.watch();
        let mut shown = Vec::new();

        print_notices(engine.drain_notices());
        while self.running.load(Ordering::SeqCst) {
            engine
                .pump(self.config.poll_timeout)
                .context("run loop failed")?;

            print_notices(engine.drain_notices());
            let snapshot = watch.snapshot();
            if snapshot != shown {
                print_sessions(&snapshot);
                shown = snapshot;
            }
        }
        Ok(())
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        if notice.is_warning() {
            eprintln!("warning: {}", notice);
        } else {
            println!("{}", notice);
        }
    }
}

fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("No devices held.");
        return;
    }
    println!("Held devices:");
    for session in sessions {
        println!("  {}", format_session(session));
    }
}

fn format_session(session: &SessionSummary) -> String {
    format!(
        "{:<5} {:<18} {:<20} {} {} (swallowed {})",
        session.id.to_string(),
        session.state.to_string(),
        session.location.to_string(),
        format_ids(session.vendor_id, session.product_id),
        session.name.as_deref().unwrap_or("Unknown"),
        session.reports_swallowed
    )
}

fn format_ids(vendor: Option<u16>, product: Option<u16>) -> String {
    match (vendor, product) {
        (Some(vendor), Some(product)) => format!("{:04x}:{:04x}", vendor, product),
        _ => "----:----".to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Handle list-devices flag (doesn't need config)
    if args.list_devices {
        return Application::list_devices();
    }

    let app = Application::new(&args)?;

    if args.check_config {
        app.describe();
        return Ok(());
    }

    if !is_root() {
        log::warn!("Not running as root; grabbing input devices will probably fail");
    }

    app.run()
}

fn is_root() -> bool {
    std::fs::metadata("/proc/self")
        .map(|meta| std::os::unix::fs::MetadataExt::uid(&meta) == 0)
        .unwrap_or(false)
}

//! ctx tracker daemon.
//!
//! Polls git context for the directory the shell last reported, keeps one
//! session open per (repository, branch), and watches the active repository
//! for file modifications. All state lives in the shared store; the daemon
//! can be killed and restarted at any time and will adopt the open session.

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ctx_core::{
    ActivityAggregator, CancellationToken, CtxConfig, GitCli, IgnoreSet, NotifyWatchFactory,
    PollLoop, StorageConfig, Store, SystemClock, Tracker, TrackerSettings,
};

const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(200);

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

fn main() {
    init_logging();

    let token = CancellationToken::new();
    install_signal_handlers();
    spawn_signal_bridge(token.clone());

    let storage = match StorageConfig::resolve() {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "Failed to resolve ctx data directory");
            std::process::exit(1);
        }
    };

    let config = match CtxConfig::load(&storage.config_file()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            CtxConfig::default()
        }
    };

    let store = match Store::open_with(
        storage.db_file(),
        config.busy_timeout(),
        Arc::new(SystemClock),
    ) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, path = %storage.db_file().display(), "Failed to open session store");
            std::process::exit(1);
        }
    };

    let aggregator = ActivityAggregator::new(
        store.clone(),
        IgnoreSet::with_defaults(&config.ignore),
        config.context_lines,
    );
    let tracker = Tracker::new(
        aggregator,
        Box::new(NotifyWatchFactory::new(config.event_queue_capacity)),
        TrackerSettings::from_config(&config),
    );
    let resolver = GitCli::new(config.git_timeout());
    let fallback_cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));

    info!(
        db = %storage.db_file().display(),
        poll_interval_secs = config.poll_interval().as_secs(),
        inactivity_threshold_mins = config.inactivity_threshold_mins,
        "ctx daemon started"
    );

    PollLoop {
        tracker,
        store,
        resolver: &resolver,
        interval: config.poll_interval(),
        fallback_cwd,
    }
    .run(&token);

    info!("ctx daemon exiting");
}

fn init_logging() {
    let debug_enabled = env::var("CTX_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        let previous = unsafe {
            libc::signal(
                signal,
                request_shutdown as extern "C" fn(libc::c_int) as libc::sighandler_t,
            )
        };
        if previous == libc::SIG_ERR {
            warn!(signal, "Failed to install signal handler");
        }
    }
}

/// Turns the signal flag into a cancellation the poll loop can sleep on.
fn spawn_signal_bridge(token: CancellationToken) {
    let spawned = thread::Builder::new()
        .name("ctx-signals".to_string())
        .spawn(move || loop {
            if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                info!("Shutdown requested");
                token.cancel();
                return;
            }
            thread::sleep(SIGNAL_POLL_INTERVAL);
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Failed to spawn signal bridge; signals will not stop the daemon cleanly");
    }
}

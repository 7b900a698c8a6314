//! Host-side daemon process.
//!
//! Wires together the session broker, signaling relay, activity feed,
//! entity cache, and upstream client into one process, the way
//! `xeno-broker-bin` wires the LSP/AI broker core into a single daemon.
//! The adaptive poller and peer channel runtime are started per-session by
//! the embedding application once it supplies a concrete `DeltaSource` and
//! `PeerTransport` (GraphQL schema and WebRTC data channel respectively are
//! external collaborators per the component design, not fixed at daemon
//! startup).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tandem_activity::ActivityService;
use tandem_broker::BrokerService;
use tandem_cache::EntityCache;
use tandem_core::config::Config;
use tandem_ratelimit::RateLimitTracker;
use tandem_signaling::RelayService;
use tandem_telemetry::TracingEmitter;
use tandem_upstream::UpstreamClient;
use tracing::info;

/// Daemon command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tandem-daemon")]
#[command(about = "Collaboration core: session broker, signaling relay, cache, and upstream client")]
struct Args {
	/// Path to a TOML config file; defaults are used when omitted.
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging.
	#[arg(short, long)]
	verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> Config {
	let Some(path) = path else {
		return Config::default();
	};
	match std::fs::read_to_string(path) {
		Ok(text) => Config::from_toml(&text).unwrap_or_else(|err| {
			tracing::warn!(error = %err, path = %path.display(), "failed to parse config, using defaults");
			Config::default()
		}),
		Err(err) => {
			tracing::warn!(error = %err, path = %path.display(), "failed to read config, using defaults");
			Config::default()
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
		.init();

	info!("starting tandem-daemon");

	let config = load_config(args.config.as_ref());

	let cache = Arc::new(EntityCache::new(config.cache.ttl));
	let tracker = RateLimitTracker::new();
	let upstream = Arc::new(UpstreamClient::with_emitter(tracker.clone(), Arc::new(TracingEmitter))?);
	let broker = BrokerService::start(config.session.guest_pending_timeout, config.session.ended_grace_period);
	let relay = RelayService::start();
	let activity = ActivityService::start(config.activity.buffer_capacity, config.activity.dedup_window);

	info!("broker, signaling relay, and activity feed are running");

	// The poller and peer runtime are session-scoped; they attach once a
	// guest joins and the embedding application hands in a transport and
	// delta source. Nothing further to drive here beyond process
	// lifetime, so park until asked to shut down.
	let _ = (&cache, &upstream, &broker, &relay, &activity);
	tokio::signal::ctrl_c().await?;
	info!("shutdown signal received");

	Ok(())
}

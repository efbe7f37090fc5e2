//! sessionguard - inactivity session monitor daemon
//!
//! Runs the monitor for a dashboard session and exposes it over HTTP and
//! WebSocket. Every daemon sharing the same database file shares activity.

use sessionguard::config::MonitorConfig;
use sessionguard::database::Database;
use sessionguard::server::state::AppState;
use sessionguard::server::{run_server, DEFAULT_PORT};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sessionguard=info")),
        )
        .init();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              sessionguard - Inactivity Monitor             ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    println!("🔧 Opening database...");
    let database = Arc::new(Database::open_default()?);
    let config = MonitorConfig::from_database(&database);
    println!("   ✓ Database ready at {}", Database::default_path().display());
    println!(
        "   ✓ Timeout {} min, warning {} min before, monitoring {}",
        config.timeout_minutes,
        config.warning_minutes,
        if config.is_active() { "on" } else { "off" }
    );

    // Shutdown signal
    let shutdown = Arc::new(Notify::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        println!("\n🛑 Shutdown signal received...");
        shutdown_ctrlc.notify_one();
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (tx, _) = broadcast::channel::<String>(100);
        let state = AppState::new(tx, database)?;

        if config.is_active() {
            state.start_session();
            println!("   ✓ Session monitor started");
        }

        println!();
        println!("🌐 API available at http://127.0.0.1:{}", DEFAULT_PORT);
        println!("   • POST /api/activity      - Report user input");
        println!("   • POST /api/session/start - Log in");
        println!("   • GET  /api/session       - Timer state");
        println!("   • WS   /ws                - Session notices");
        println!();

        let signal = Arc::clone(&shutdown);
        run_server(Arc::clone(&state), DEFAULT_PORT, async move {
            signal.notified().await;
        })
        .await?;

        println!("\n⏳ Shutting down...");
        state.monitor.stop();
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    println!("👋 sessionguard has exited. Goodbye!");
    Ok(())
}

//! Loan concierge — service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Load the customer dataset and build the LLM provider
//!   6. Build the loan desk
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Run comms subsystem (drives console / HTTP until shutdown)

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use loan_concierge::config::{self, Config};
use loan_concierge::error::AppError;
use loan_concierge::llm::providers;
use loan_concierge::logger;
use loan_concierge::subsystems::comms;
use loan_concierge::subsystems::desk::LoanDesk;
use loan_concierge::subsystems::tools::CustomerDirectory;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let mut config = config::load(args.config_path.as_deref())?;

    config.gate_console(args.interactive);

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level)?;

    info!(
        app_name = %config.app_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = %args.interactive,
        "config loaded"
    );

    let directory = Arc::new(CustomerDirectory::load(&config.dataset_path)?);
    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Llm(e.to_string()))?;
    info!(customers = directory.len(), model = %provider.model(), "back-office ready");

    let desk = Arc::new(LoanDesk::from_config(&config, directory.clone(), Some(provider)));

    // Shared shutdown token — Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, directory.len(), args.interactive);

    let handle = comms::start(&config, desk, shutdown.clone());
    handle.join().await?;

    // If comms exited due to EOF (not Ctrl-C), still signal everything to stop.
    shutdown.cancel();

    if args.interactive {
        use std::io::Write as _;
        println!("\nBye :) ...");
        let _ = std::io::stdout().flush();
    }
    Ok(())
}

fn print_startup_summary(config: &Config, customers: usize, interactive: bool) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let mode_text = if interactive { "interactive" } else { "daemon" };
    let http_line = if config.comms.http.enabled {
        format!("🌐 http: {}", config.comms.http.bind)
    } else {
        "🌐 http: disabled".to_string()
    };
    let pty_line = format!(
        "⌨️  pty: {}",
        if config.comms.pty.enabled { "enabled" } else { "disabled" }
    );
    let llm_line = format!(
        "provider={} model={} voice={}",
        config.llm.provider, config.llm.openai.model, config.llm.voice_replies
    );

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 💬 Loan Concierge Status                                     ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("🧾 App: {}", config.app_name)));
    println!("║   {}║", fit(format!("🧠 PID: {}", std::process::id())));
    println!("║   {}║", fit(format!("🛰️  Mode: {mode_text}")));
    println!("║   {}║", fit(format!("👥 Customers: {customers}")));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📡 Comms                                                     ║");
    println!("║   {}║", fit(pty_line));
    println!("║   {}║", fit(http_line));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧠 LLM                                                       ║");
    println!("║   {}║", fit(llm_line));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: loan-concierge [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Run a chat session on the console");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}

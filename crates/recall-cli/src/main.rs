//! `recall` – a chat shell with long-term memory.
//!
//! On start-up this binary:
//!
//! 1. Checks for `~/.recall/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Opens the SQLite snapshot database and restores the configured session.
//! 3. Probes the local Ollama instance and picks a responder.
//! 4. Drops the user into an **interactive REPL**; every plain line is a turn
//!    routed to a conversation context.
//! 5. Intercepts **Ctrl-C** to save the session before exiting.

mod config;
mod ollama;
mod repl;
mod responder;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use recall_context::response::ResponseGenerator;
use recall_context::session::Session;
use recall_memory::SqliteSnapshotStore;
use tracing::warn;

use crate::config::{Config, Responder};
use crate::ollama::OllamaGenerator;
use crate::responder::{FallbackGenerator, TemplateResponder};

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters, RECALL_LOG_FORMAT=json switches to JSON lines and
    // OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    let _telemetry = recall_context::telemetry::init_tracing("recall");

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Snapshot store and session ────────────────────────────────────────
    let store = match open_store(&cfg.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("{}: {}", "Cannot open session database".red().bold(), e);
            std::process::exit(1);
        }
    };

    let session = match Session::load(&cfg.session, cfg.session_config(), store.as_ref()) {
        Ok(session) => session,
        Err(e) => {
            warn!(session = %cfg.session, error = %e, "snapshot unusable, starting a fresh session");
            println!("  {} {}", "Could not restore the last session:".yellow(), e);
            Session::new(&cfg.session, cfg.session_config())
        }
    };
    let session = Arc::new(session);
    println!(
        "  Session {} ({} memories, {} active contexts)",
        session.id().bold(),
        session.memory_len(),
        session.active_contexts().len()
    );

    // ── Responder ─────────────────────────────────────────────────────────
    let generator = build_generator(&cfg);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let session_ctrlc = session.clone();
    let store_ctrlc = store.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – saving session …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
        match session_ctrlc.save(store_ctrlc.as_ref()) {
            Ok(()) => println!("{}", "  ✓ Session saved.".green()),
            Err(e) => println!("  {}: {}", "Save failed".red(), e),
        }
        std::process::exit(0);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the session is only saved on /quit");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(session, store, generator, shutdown);
}

fn open_store(db_path: &str) -> Result<SqliteSnapshotStore, String> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        config::ensure_private_dir(parent).map_err(|e| e.to_string())?;
    }
    SqliteSnapshotStore::open(db_path).map_err(|e| e.to_string())
}

fn build_generator(cfg: &Config) -> Box<dyn ResponseGenerator> {
    if cfg.responder == Responder::Template {
        println!("\n  Responder: {}", cfg.responder.to_string().bold());
        return Box::new(TemplateResponder);
    }

    print!("\n  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            if !models.iter().any(|m| m.name.starts_with(&cfg.active_model)) {
                println!(
                    "  {} model {} is not pulled; replies will fall back to templates.",
                    "⚠".yellow(),
                    cfg.active_model.bold()
                );
            }
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Run `{}` to enable model replies.",
                "Using template replies until Ollama is up.".dimmed(),
                "ollama serve".bold()
            );
        }
    }

    match OllamaGenerator::new(&cfg.ollama_url, &cfg.active_model) {
        Ok(ollama) => Box::new(FallbackGenerator::new(ollama, TemplateResponder)),
        Err(e) => {
            warn!(error = %e, "cannot build Ollama client, using templates");
            Box::new(TemplateResponder)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       Recall First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Recall.\n");

    let mut cfg = Config::default();

    println!("  How should replies be produced?");
    println!("    1) Local AI via Ollama  (default, falls back to templates)");
    println!("    2) Offline templates only");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.responder = match choice.trim() {
        "2" => Responder::Template,
        _ => Responder::Ollama,
    };

    if cfg.responder == Responder::Ollama {
        cfg.active_model = prompt_line(
            &format!("  Ollama model [{}]: ", cfg.active_model),
            &cfg.active_model,
        );
    }

    cfg.session = prompt_line(&format!("  Session name [{}]: ", cfg.session), &cfg.session);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                 ____"#.bold().cyan());
    println!("{}", r#"  / _ \___ _______ _  / / /"#.bold().cyan());
    println!("{}", r#" / , _/ -_) __/ _ `/ / / / "#.bold().cyan());
    println!("{}", r#"/_/|_|\__/\__/\_,_/_/_/_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Recall".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Conversations that remember");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

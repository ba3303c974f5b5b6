//! REPL – the interactive chat shell.
//!
//! Plain text is a conversational turn. Slash-commands inspect and steer the
//! session:
//!   /help                         – show this list
//!   /remember <key> <prio> <text> – store a memory (priority 0-100)
//!   /recall <key>                 – read a memory
//!   /search <query>               – contextual recall against the current topic
//!   /related <key> [depth]        – walk the memory graph
//!   /top [n]                      – highest scoring memories
//!   /contexts                     – list active contexts
//!   /switch <id>                  – make a context current (id prefix ok)
//!   /merge <id,id,...> <topic>    – merge contexts
//!   /important <id> <0-1>         – set a context's importance
//!   /pending                      – queued follow-up topics
//!   /profile                      – learned preferences and style
//!   /prune                        – drop decayed memories
//!   /save                         – write the session snapshot
//!   /quit | /exit                 – save and exit

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use recall_context::response::ResponseGenerator;
use recall_context::session::Session;
use recall_memory::{MemoryItem, SqliteSnapshotStore};
use recall_types::{ConversationContext, Metadata};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const DEFAULT_LIST_LIMIT: usize = 5;
const DEFAULT_RELATED_DEPTH: usize = 2;
const SHORT_ID_LEN: usize = 8;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Remember { key: String, priority: f64, value: String },
    Recall(String),
    Search(String),
    Related { key: String, depth: usize },
    Top(usize),
    Contexts,
    Switch(String),
    Merge { ids: Vec<String>, topic: String },
    Important { id: String, importance: f64 },
    Pending,
    Profile,
    Prune,
    Save,
    Quit,
    Say(String),
    Invalid(String),
}

/// Parse one trimmed, non-empty line.
pub fn parse_command(line: &str) -> Command {
    if !line.starts_with('/') {
        return Command::Say(line.to_string());
    }
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();
    match name {
        "/help" => Command::Help,
        "/remember" => {
            let (Some(key), Some(priority)) = (args.next(), args.next()) else {
                return Command::Invalid("usage: /remember <key> <priority> <text>".into());
            };
            let Ok(priority) = priority.parse::<f64>() else {
                return Command::Invalid(format!("'{priority}' is not a number"));
            };
            let value = args.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Command::Invalid("usage: /remember <key> <priority> <text>".into());
            }
            Command::Remember {
                key: key.to_string(),
                priority,
                value,
            }
        }
        "/recall" => match args.next() {
            Some(key) => Command::Recall(key.to_string()),
            None => Command::Invalid("usage: /recall <key>".into()),
        },
        "/search" if !rest.is_empty() => Command::Search(rest.to_string()),
        "/search" => Command::Invalid("usage: /search <query>".into()),
        "/related" => match (args.next(), args.next()) {
            (Some(key), None) => Command::Related {
                key: key.to_string(),
                depth: DEFAULT_RELATED_DEPTH,
            },
            (Some(key), Some(depth)) => match depth.parse() {
                Ok(depth) => Command::Related {
                    key: key.to_string(),
                    depth,
                },
                Err(_) => Command::Invalid(format!("'{depth}' is not a depth")),
            },
            _ => Command::Invalid("usage: /related <key> [depth]".into()),
        },
        "/top" => match args.next().map(str::parse) {
            None => Command::Top(DEFAULT_LIST_LIMIT),
            Some(Ok(n)) => Command::Top(n),
            Some(Err(_)) => Command::Invalid("usage: /top [n]".into()),
        },
        "/contexts" => Command::Contexts,
        "/switch" => match args.next() {
            Some(id) => Command::Switch(id.to_string()),
            None => Command::Invalid("usage: /switch <id>".into()),
        },
        "/merge" => {
            let ids: Vec<String> = args
                .next()
                .map(|list| list.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default();
            let topic = args.collect::<Vec<_>>().join(" ");
            if ids.len() < 2 || topic.is_empty() {
                return Command::Invalid("usage: /merge <id,id,...> <topic>".into());
            }
            Command::Merge { ids, topic }
        }
        "/important" => match (args.next(), args.next().map(str::parse::<f64>)) {
            (Some(id), Some(Ok(importance))) => Command::Important {
                id: id.to_string(),
                importance,
            },
            _ => Command::Invalid("usage: /important <id> <0-1>".into()),
        },
        "/pending" => Command::Pending,
        "/profile" => Command::Profile,
        "/prune" => Command::Prune,
        "/save" => Command::Save,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Invalid(format!("Unknown command '{other}'")),
    }
}

/// Resolve a full id or unique prefix against `contexts`.
pub fn resolve_context_id(contexts: &[ConversationContext], needle: &str) -> Result<String, String> {
    let matches: Vec<&ConversationContext> = contexts.iter().filter(|c| c.id.starts_with(needle)).collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(format!("no active context matches '{needle}'")),
        _ => Err(format!("'{needle}' is ambiguous ({} matches)", matches.len())),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(
    session: Arc<Session>,
    store: Arc<SqliteSnapshotStore>,
    generator: Box<dyn ResponseGenerator>,
    shutdown: Arc<AtomicBool>,
) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", format!("{}>", session.id()).bold().cyan());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                save_session(&session, &store);
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match parse_command(line) {
            Command::Help => cmd_help(),
            Command::Say(text) => cmd_say(&session, generator.as_ref(), &text),
            Command::Remember { key, priority, value } => {
                match session.remember(&key, &value, priority, "note", "", 0.0) {
                    Ok(()) => println!("{} {}", "✓ Remembered".green(), key.bold()),
                    Err(e) => println!("{}: {}", "Memory error".red(), e),
                }
            }
            Command::Recall(key) => match session.recall(&key) {
                Some(value) => println!("  {} {}", format!("{key}:").bold(), value),
                None => println!("  {}", "nothing stored under that key".dimmed()),
            },
            Command::Search(query) => {
                let topic = session.current_context().map(|c| c.topic).unwrap_or_default();
                print_memories(&session.contextual_recall(&query, &topic, DEFAULT_LIST_LIMIT));
            }
            Command::Related { key, depth } => print_memories(&session.find_related_memories(&key, depth)),
            Command::Top(n) => print_memories(&session.top_memories(n)),
            Command::Contexts => cmd_contexts(&session),
            Command::Switch(needle) => match resolve_context_id(&session.active_contexts(), &needle) {
                Ok(id) => match session.switch_context(&id) {
                    Some(ctx) => println!("{} {}", "✓ Switched to".green(), ctx.topic.bold()),
                    None => println!("{}", "Context is no longer active".red()),
                },
                Err(e) => println!("{}", e.red()),
            },
            Command::Merge { ids, topic } => cmd_merge(&session, &ids, &topic),
            Command::Important { id, importance } => {
                match resolve_context_id(&session.active_contexts(), &id) {
                    Ok(id) => match session.set_context_importance(&id, importance) {
                        Some(ctx) => println!(
                            "{} {} → {:.2}",
                            "✓ Importance of".green(),
                            ctx.topic.bold(),
                            ctx.metadata.importance
                        ),
                        None => println!("{}", "Context is no longer active".red()),
                    },
                    Err(e) => println!("{}", e.red()),
                }
            }
            Command::Pending => cmd_pending(&session),
            Command::Profile => cmd_profile(&session),
            Command::Prune => println!("  Pruned {} decayed memories.", session.prune_aged()),
            Command::Save => save_session(&session, &store),
            Command::Quit => {
                save_session(&session, &store);
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Invalid(reason) => {
                println!("{} Type {} for available commands.", reason.red(), "/help".bold());
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Recall Commands".bold().underline());
    for (cmd, what) in [
        ("/remember <key> <prio> <text>", "store a memory"),
        ("/recall <key>", "read a memory"),
        ("/search <query>", "memories relevant to the query"),
        ("/related <key> [depth]", "walk the memory graph"),
        ("/top [n]", "highest scoring memories"),
        ("/contexts", "list active contexts"),
        ("/switch <id>", "make a context current"),
        ("/merge <id,id,...> <topic>", "merge contexts"),
        ("/important <id> <0-1>", "set context importance"),
        ("/pending", "queued follow-up topics"),
        ("/profile", "what has been learned about you"),
        ("/prune", "drop decayed memories"),
        ("/save", "save the session"),
        ("/quit  /exit", "save and exit"),
    ] {
        println!("  {:<30} – {}", cmd.bold().cyan(), what);
    }
    println!("  Anything else is sent as a message.");
    println!();
}

fn cmd_say(session: &Session, generator: &dyn ResponseGenerator, text: &str) {
    match session.respond(text, Metadata::new(), generator) {
        Ok((ctx, response)) => {
            println!("  {} {}", format!("[{}]", ctx.topic).dimmed(), response.text);
        }
        Err(e) => println!("{}: {}", "Turn failed".red(), e),
    }
}

fn cmd_contexts(session: &Session) {
    let current = session.current_context().map(|c| c.id);
    let contexts = session.active_contexts();
    if contexts.is_empty() {
        println!("  {}", "no contexts yet".dimmed());
        return;
    }
    println!("{}", "Active contexts".bold().underline());
    for ctx in &contexts {
        let marker = if current.as_deref() == Some(ctx.id.as_str()) { "▶" } else { " " };
        println!(
            "  {} {} {} ({} messages, importance {:.2})",
            marker.green(),
            short_id(&ctx.id).yellow(),
            ctx.topic.bold(),
            ctx.message_count(),
            ctx.metadata.importance
        );
    }
}

fn cmd_merge(session: &Session, ids: &[String], topic: &str) {
    let contexts = session.active_contexts();
    let mut resolved = Vec::with_capacity(ids.len());
    for needle in ids {
        match resolve_context_id(&contexts, needle) {
            Ok(id) => resolved.push(id),
            Err(e) => {
                println!("{}", e.red());
                return;
            }
        }
    }
    let refs: Vec<&str> = resolved.iter().map(String::as_str).collect();
    match session.merge_contexts(&refs, topic) {
        Some(ctx) => println!(
            "{} {} ({} messages)",
            "✓ Merged into".green(),
            ctx.topic.bold(),
            ctx.message_count()
        ),
        None => println!("{}", "Need at least two distinct active contexts".red()),
    }
}

fn cmd_pending(session: &Session) {
    let topics = session.pending_topics();
    if topics.is_empty() {
        println!("  {}", "nothing queued".dimmed());
        return;
    }
    for topic in topics {
        println!(
            "  {:.2}  {} {}",
            topic.importance,
            topic.topic.bold(),
            format!("(added {})", topic.added_at.format("%Y-%m-%d %H:%M")).dimmed()
        );
    }
}

fn cmd_profile(session: &Session) {
    let profile = session.profile();
    println!("{}", "Profile".bold().underline());
    let prefs = profile.top_preferences(DEFAULT_LIST_LIMIT);
    if prefs.is_empty() {
        println!("  preferences : {}", "none yet".dimmed());
    } else {
        let rendered: Vec<String> = prefs.iter().map(|(p, w)| format!("{p} ({w:+.1})")).collect();
        println!("  preferences : {}", rendered.join(", "));
    }
    println!("  style       : {}", profile.dominant_style().unwrap_or("-"));
    println!("  main task   : {}", profile.dominant_task().unwrap_or("-"));
    let mut emotions: Vec<(&String, &f64)> = profile.emotional_patterns.iter().collect();
    emotions.sort_by(|a, b| b.1.total_cmp(a.1));
    if let Some((emotion, count)) = emotions.first() {
        println!("  mood        : {emotion} ({count} times)");
    }
}

fn print_memories(items: &[MemoryItem]) {
    if items.is_empty() {
        println!("  {}", "no memories found".dimmed());
        return;
    }
    for item in items {
        println!(
            "  {:>6.1}  {} {} {}",
            item.effective_score(),
            item.key.bold(),
            item.value,
            format!("[{}]", item.category).dimmed()
        );
    }
}

fn save_session(session: &Session, store: &SqliteSnapshotStore) {
    match session.save(store) {
        Ok(()) => println!("{}", "✓ Session saved.".green()),
        Err(e) => println!("{}: {} (continuing in memory)", "Save failed".red(), e),
    }
}

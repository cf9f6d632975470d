//! Console renderer for the contact directory.
//!
//! # Responsibility
//! - Load the directory from the configured service and print the visible set.
//! - Forward `--search`/`--tag` into the core as user criteria.
//! - In `--watch` mode, keep refreshing and re-print until Ctrl-C.

use clap::Parser;
use contactbook_core::{
    init_logging, Classification, Contact, DirectoryConfig, DirectoryCore, DirectoryObserver,
    DirectorySnapshot, FilterCriteria, Presentation,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "contactbook", version, about = "Browse a remote contact directory")]
struct Cli {
    /// JSON config file; environment overrides still apply
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Service root, e.g. http://localhost:3000/api
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Show only contacts whose name contains this text
    #[arg(short, long, value_name = "TEXT")]
    search: Option<String>,

    /// Show only contacts carrying this tag (repeatable, any tag matches)
    #[arg(short, long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Keep refreshing in the background and re-print on every change
    #[arg(short, long)]
    watch: bool,
}

/// Prints whatever the core reports to stdout/stderr.
struct ConsoleRenderer;

impl ConsoleRenderer {
    fn print_contacts(&self, visible: &[Contact]) {
        if visible.is_empty() {
            println!("(no matching contacts)");
            return;
        }
        for contact in visible {
            let tags = contact
                .tags()
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "{:>6}  {:<30} {:<32} {:<16} {}",
                contact.id(),
                contact.full_name(),
                contact.email().unwrap_or("-"),
                contact.phone_number().unwrap_or("-"),
                tags
            );
        }
    }

    fn print_vocabulary(&self, snapshot: &DirectorySnapshot) {
        if snapshot.tag_vocabulary().is_empty() {
            println!("tags: (none)");
        } else {
            println!("tags: {}", snapshot.tag_vocabulary().join(", "));
        }
    }
}

impl DirectoryObserver for ConsoleRenderer {
    fn directory_replaced(&self, snapshot: &DirectorySnapshot, visible: &[Contact]) {
        println!(
            "-- directory generation {} ({} of {} shown) --",
            snapshot.generation(),
            visible.len(),
            snapshot.contacts().len()
        );
        self.print_vocabulary(snapshot);
        self.print_contacts(visible);
    }

    fn criteria_changed(&self, criteria: &FilterCriteria, visible: &[Contact]) {
        let tags = criteria
            .selected_tags()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "-- filter name=\"{}\" tags=[{}] ({} shown) --",
            criteria.name_substring(),
            tags,
            visible.len()
        );
        self.print_contacts(visible);
    }

    fn failure_reported(&self, classification: &Classification) {
        let Some(message) = classification.user_message.as_deref() else {
            return;
        };
        match classification.presentation {
            Presentation::Notice => println!("{message}"),
            _ => eprintln!("error: {message}"),
        }
    }

    fn user_message(&self, message: &str) {
        println!("{message}");
    }
}

fn load_config(cli: &Cli) -> Result<DirectoryConfig, String> {
    let config = match cli.config.as_deref() {
        Some(path) => DirectoryConfig::from_file(path).map_err(|err| err.to_string())?,
        None => DirectoryConfig::default(),
    };
    let mut config = config.with_env_overrides().map_err(|err| err.to_string())?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config.base_url = base_url.trim().to_string();
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let core = DirectoryCore::from_config(&config, Arc::new(ConsoleRenderer));
    // The renderer already printed the fatal message.
    if core.load().await.is_err() {
        return ExitCode::FAILURE;
    }

    if let Some(search) = cli.search.as_deref() {
        core.set_name_filter(search);
    }
    if !cli.tags.is_empty() {
        core.set_selected_tags(&cli.tags);
    }

    if cli.watch {
        core.start_refresh();
        info!(
            "event=watch_started module=cli status=ok period_ms={}",
            config.refresh_interval_ms
        );
        if let Err(err) = tokio::signal::ctrl_c().await {
            eprintln!("error: cannot listen for Ctrl-C: {err}");
        }
    }

    core.shutdown().await;
    ExitCode::SUCCESS
}

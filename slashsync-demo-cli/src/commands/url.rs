//! URL commands - parse, validate and route slashtags URLs

use anyhow::{Context, Result};
use colored::Colorize;
use slashsync_lib::router::{handle_slashtag_url, Navigator, Route};
use slashsync_lib::{parse_url, validate_url};

use crate::ui;

/// Prints the screen a URL would open.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        let screen = match &route {
            Route::ContactEdit { .. } => "ContactEdit",
            Route::FeedEdit { .. } => "WidgetFeedEdit",
        };
        println!("  {} {}", "→".green().bold(), screen.bold());
    }
}

pub async fn parse(url: &str, _verbose: bool) -> Result<()> {
    ui::header("Parse URL");

    let parsed = parse_url(url).context("Invalid slashtags URL")?;
    ui::key_value("Protocol", parsed.protocol.as_str());
    ui::key_value("Id", &parsed.id());
    ui::key_value("Key", &parsed.key.to_hex());
    if !parsed.path.is_empty() {
        ui::key_value("Path", &parsed.path);
    }
    if let Some(query) = &parsed.query {
        ui::key_value("Query", query);
    }
    if let Some(fragment) = &parsed.fragment {
        ui::key_value("Fragment", fragment);
    }

    Ok(())
}

pub async fn validate(url: &str, _verbose: bool) -> Result<()> {
    if validate_url(url) {
        ui::success(&format!("{} is a valid identity URL", url));
    } else {
        ui::warning(&format!("{} is not a valid identity URL", url));
    }
    Ok(())
}

pub async fn open(url: &str, verbose: bool) -> Result<()> {
    ui::header("Open URL");

    match handle_slashtag_url(url, &TerminalNavigator) {
        Ok(url) => {
            if verbose {
                ui::info(&format!("Routed {}", url));
            }
            Ok(())
        }
        Err(err) => {
            ui::error(&err.reason());
            Err(err).context("URL was not routed")
        }
    }
}

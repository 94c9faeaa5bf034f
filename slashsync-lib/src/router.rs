//! Routing of pasted or scanned slashtags URLs.
//!
//! `slash:` URLs open the contact editor, `slashfeed:` URLs open the feed
//! editor. Navigation itself belongs to the UI and is injected through
//! [`Navigator`].

use crate::url::{parse, Protocol};
use crate::Result;

/// Local action a URL resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Open the contact editor for an identity URL.
    ContactEdit {
        /// The URL as provided by the user.
        url: String,
    },
    /// Open the feed widget editor for a feed URL.
    FeedEdit {
        /// The URL as provided by the user.
        url: String,
    },
}

impl Route {
    /// The URL carried by the route.
    pub fn url(&self) -> &str {
        match self {
            Self::ContactEdit { url } | Self::FeedEdit { url } => url,
        }
    }
}

/// UI navigation sink.
pub trait Navigator: Send + Sync {
    /// Navigate to the screen for `route`.
    fn navigate(&self, route: Route);
}

/// Resolve a URL to its route without navigating.
///
/// Fails with `SlashError::InvalidUrl` on malformed input or schemes other
/// than `slash:` and `slashfeed:`.
pub fn route(url: &str) -> Result<Route> {
    let parsed = parse(url)?;
    let url = url.to_string();
    Ok(match parsed.protocol {
        Protocol::Slash => Route::ContactEdit { url },
        Protocol::SlashFeed => Route::FeedEdit { url },
    })
}

/// Parse, route and navigate.
///
/// Returns the handled URL on success. On failure nothing is navigated and
/// the parse error is returned to the caller (typically shown as a
/// validation message).
#[tracing::instrument(skip(navigator))]
pub fn handle_slashtag_url<N: Navigator + ?Sized>(url: &str, navigator: &N) -> Result<String> {
    match route(url) {
        Ok(route) => {
            tracing::debug!(?route, "routing slashtags url");
            navigator.navigate(route);
            Ok(url.to_string())
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected slashtags url");
            Err(err)
        }
    }
}

//! Test utilities for slashsync.
//!
//! - [`MockWallet`] and [`MockLightningNode`] with scriptable behaviour
//! - [`RecordingNotifier`] capturing user notifications
//! - Fixtures for keys, URLs and addresses
//!
//! ## Usage
//!
//! ```rust,ignore
//! use slashsync_lib::test_utils::{MockLightningNode, MockWallet};
//!
//! let wallet = MockWallet::new("bc1q...");
//! let node = MockLightningNode::new();
//! let invoice = node.add_invoice("lnbc1...");
//! node.expire(&invoice);
//! ```

mod fixtures;
mod mocks;

pub use fixtures::{random_key, test_address, test_url, TestFixtures};
pub use mocks::{InvoiceRequest, MockLightningNode, MockWallet, RecordingNotifier};

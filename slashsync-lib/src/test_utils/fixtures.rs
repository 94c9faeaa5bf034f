//! Test fixtures and data generators.

use crate::url::format_identity_url;
use crate::DriveKey;

/// Collection of commonly used test fixtures.
pub struct TestFixtures;

impl TestFixtures {
    /// Valid mainnet P2WPKH addresses.
    pub const MAINNET_ADDRESSES: &'static [&'static str] = &[
        "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
        "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
        "bc1q7efa5rjlceuzy34z8g7u7xnr9k6hqfmt9xz9y2",
    ];

    /// Placeholder payment requests. They are not valid BOLT11.
    pub const INVOICES: &'static [&'static str] = &["lnbc1qqqfixture0", "lnbc1qqqfixture1"];
}

/// A random key.
pub fn random_key() -> DriveKey {
    DriveKey::random()
}

/// A `slash:` URL for a random identity.
pub fn test_url() -> String {
    format_identity_url(&random_key())
}

/// One of the fixture addresses, cycling through the list.
pub fn test_address(index: usize) -> &'static str {
    TestFixtures::MAINNET_ADDRESSES[index % TestFixtures::MAINNET_ADDRESSES.len()]
}

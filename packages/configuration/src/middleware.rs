use serde::{Deserialize, Serialize};

/// One middleware entry in an announce or scrape chain.
///
/// The `name` selects a constructor from the registry the tracker was built
/// with; the `options` table is handed to that constructor verbatim. The
/// tracker core does not interpret the options.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Middleware {
    /// Registered name of the middleware constructor.
    pub name: String,

    /// Opaque configuration for the middleware.
    #[serde(default)]
    pub options: toml::Table,
}

impl Middleware {
    /// A middleware entry with an empty options table.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            options: toml::Table::new(),
        }
    }
}

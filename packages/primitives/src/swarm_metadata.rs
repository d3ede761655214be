/// Swarm statistics for one torrent.
///
/// This is both the per-torrent entry in the scrape response and the
/// seeder/leecher summary attached to an announce response.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct SwarmMetadata {
    /// (i.e. `completed`): The number of peers that have ever completed downloading.
    pub downloaded: u32,
    /// (i.e. `seeders`): The number of active peers that have completed downloading.
    pub complete: u32,
    /// (i.e. `leechers`): The number of active peers that have not completed downloading.
    pub incomplete: u32,
}

impl SwarmMetadata {
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }
}

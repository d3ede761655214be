use serde::{Deserialize, Serialize};

/// Announce events. Described on the
/// [BEP 15. UDP Tracker Protocol for `BitTorrent`](https://www.bittorrent.org/beps/bep_0015.html)
#[derive(Hash, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnnounceEvent {
    /// This is one of the announcements done at regular intervals.
    #[default]
    None,
    /// The peer has completed downloading the torrent.
    Completed,
    /// The peer has started downloading the torrent.
    Started,
    /// The peer has ceased downloading the torrent.
    Stopped,
}

impl AnnounceEvent {
    /// Builds the event from the identifier used on the UDP wire.
    ///
    /// Identifiers greater than 3 are not valid events; the wire codec
    /// rejects them before calling this function.
    #[inline]
    #[must_use]
    pub fn from_event_id(i: u8) -> Self {
        match i {
            1 => Self::Completed,
            2 => Self::Started,
            3 => Self::Stopped,
            _ => Self::None,
        }
    }

    /// Returns the identifier used for this event on the UDP wire.
    #[inline]
    #[must_use]
    pub fn to_event_id(self) -> u8 {
        match self {
            AnnounceEvent::None => 0,
            AnnounceEvent::Completed => 1,
            AnnounceEvent::Started => 2,
            AnnounceEvent::Stopped => 3,
        }
    }
}

//! Wire front-ends for the tracker core. Only the UDP tracker (BEP 15)
//! lives in this crate.
pub mod signals;
pub mod udp;

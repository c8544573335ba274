//! A web form front end that hands submissions to a separate ingestion
//! listener over a loopback datagram.
//!
//! The HTTP side never talks to storage. A form POST is forwarded as one UDP
//! datagram to the relay listener, which decodes it, stamps it with its own
//! receipt time and persists it through a [`Sink`]. Delivery is best-effort:
//! there is no acknowledgment, retry or backpressure between the two units.
//!
//! # Example
//!
//! ```no_run
//! use form_relay::{Config, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let supervisor = Supervisor::start(&config).await?;
//!     supervisor.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod listener;
pub mod models;
pub mod relay;
pub mod storage;
pub mod supervisor;

pub use codec::{decode, Clock, LocalClock};
pub use config::Config;
pub use error::Error;
pub use listener::{RelayListener, MAX_DATAGRAM_SIZE};
pub use models::Record;
pub use relay::DatagramRelay;
pub use storage::{MemorySink, Sink, SqliteSink};
pub use supervisor::Supervisor;

//! # Course Sync
//!
//! Incrementally mirrors course material from the BITS CMS portal onto
//! local disk.
//!
//! A run logs in as guest, finds the configured courses on the portal's
//! course index, walks each course's file tree and downloads every file not
//! downloaded before. Each course directory keeps a hidden `.log` of the
//! files it already holds, so repeated runs only fetch new material.
//!
//! ## Example
//!
//! ```no_run
//! use coursesync::{Config, Synchronizer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_home()?;
//!     let report = Synchronizer::new(config)?.run().await?;
//!     println!("Downloaded {} new files", report.downloaded());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod course;
pub mod download_log;
pub mod error;
pub mod identity;
pub mod listing;
pub mod materializer;
pub mod session;
pub mod sync;
pub mod walker;

pub use config::Config;
pub use course::{CourseCode, CourseList};
pub use download_log::DownloadLog;
pub use error::{Error, Result};
pub use identity::{FileIdentity, file_identity};
pub use listing::CourseEntry;
pub use session::Session;
pub use sync::{SyncReport, Synchronizer};
pub use walker::{CourseReport, walk_course};

//! Collaborators around the retrieval engine: playlist fetching with a TTL
//! cache, destination-directory scanning, tag writing, and the two failure
//! stores (CSV ledger, JSON skip-cache).

pub mod cache;
pub mod error;
pub mod error_cache;
pub mod ledger;
pub mod playlist;
pub mod scanner;
pub mod tags;

pub use cache::PlaylistCache;
pub use error::LibraryError;
pub use error_cache::SkipCache;
pub use ledger::CsvLedger;
pub use playlist::{PlaylistClient, PlaylistCredentials};
pub use scanner::{LibraryScanner, output_file_name, sanitize_filename};
pub use tags::LoftyTagWriter;

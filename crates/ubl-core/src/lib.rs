pub mod config;
pub mod conflict;
pub mod date;
pub mod decision;
pub mod diagnostic;
pub mod feed;
pub mod identity;
pub mod record;
mod text;

pub use config::{ConfigError, UblConfig};
pub use conflict::{Resolution, resolve};
pub use decision::{AccessPolicy, Decision};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use feed::{ColumnNameMapping, FeedParser, ParseError, ParseOutcome, RowError};
pub use identity::{IdentityError, parse_identity};
pub use record::{BanRecord, RecordSet, Snapshot};

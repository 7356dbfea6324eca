//! Declarative table reconciliation for Postgres.
//!
//! Describe the table you want, hand pqm a connection (ideally a
//! transaction), and it emits the `ALTER TABLE` statements that get the live
//! table there:
//!
//! ```ignore
//! use pqm::schema::*;
//!
//! let user = Table::new("users")
//!     .column("email", varchar(None, 320, true))
//!     .column("age", integer(0, true))
//!     .key("uq_users_email", unique(["email"]));
//!
//! let tx = client.transaction().await?;
//! let outcome = pqm::reconcile(&tx, &user, &ReconcileOptions::default()).await?;
//! tx.commit().await?;
//! println!("{}", outcome.diff);
//! ```
//!
//! One call is one catalog query, one diff, and one statement batch. The
//! engine keeps no state between calls and does no locking: two callers
//! reconciling the same table concurrently must be serialized externally.

mod diff;
mod error;
mod introspect;
mod options;
mod reconcile;
pub mod schema;
mod traced;

pub use diff::{Change, TableDiff, diff};
pub use error::Error;
pub use introspect::read_live_schema;
pub use options::ReconcileOptions;
pub use reconcile::{Reconciled, plan, reconcile};
pub use traced::{Connection, ConnectionExt, TracedConn};

/// Result type for pqm operations.
pub type Result<T> = std::result::Result<T, Error>;

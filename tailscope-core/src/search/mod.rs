//! Query parsing and execution.
//!
//! [`parse`] compiles a user query into a [`Query`]; [`exec`] runs it over an
//! [`Index`] snapshot with the default [`Executor`] limits. Neither step
//! fails: a bad regex only disables its own clause, and a slow scan returns a
//! truncated [`Response`].
//!
//! ```rust,no_run
//! use tailscope_core::search::{self, Scope};
//! # fn demo(index: &tailscope_core::Index) {
//! let query = search::parse("role:assistant /cargo\\s+test/ OR \"make check\"", Scope::All);
//! for hit in search::exec(index, &query, 10, 0).hits {
//!     println!("{} {}:{} [{}] {}", hit.session_id, hit.source, hit.line_no, hit.field, hit.content);
//! }
//! # }
//! ```

mod exec;
mod query;
mod tools;

pub use exec::{Executor, Hit, MatchField, Response, PREVIEW_CHARS};
pub use query::{parse, Clause, ClauseKind, FilterField, Query, Scope};
pub use tools::ToolText;

use crate::index::Index;

/// Execute `query` with the default budget and page limits.
///
/// A `limit` of zero or below selects the default page size.
pub fn exec(index: &Index, query: &Query, limit: i64, offset: usize) -> Response {
    Executor::default().exec(index, query, limit, offset)
}

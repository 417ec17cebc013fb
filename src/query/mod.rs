//! Search, filter, sort and pagination over the record collection.
//!
//! The filtered view is a list of positions into the store's record
//! vector. It is recomputed from scratch whenever the records or the
//! query change, so it never outlives the collection it points into.

mod filter;
mod pagination;

pub use filter::{apply, matches_search, QueryState, SortKey, SortOrder};
pub use pagination::Pagination;

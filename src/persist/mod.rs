//! Writing computed results back into the graph.
//!
//! Results are stored as ownerships of a result attribute type: a vertex's
//! degree becomes an owned `degree` attribute, its cluster label an owned
//! `cluster` attribute. Writing replaces a stale value and never appends a
//! second one.

pub mod writer;

pub use writer::BatchedResultWriter;

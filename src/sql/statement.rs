use crate::storage::row::Row;

/// Statements the shell can execute, produced by
/// [`parser::prepare`](super::parser::prepare).
#[derive(Debug)]
pub enum Statement {
    /// Insert one row; the row is fully validated at prepare time.
    Insert(Row),
    /// Scan the whole table in ascending key order.
    Select,
}

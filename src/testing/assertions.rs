//! Assertion functions for comparing pipeline output rows.

use crate::row::Row;
use crate::value::KeyTuple;

/// Field-order-independent rendering used to compare and sort rows.
fn canonical(row: &Row) -> String {
    let mut fields: Vec<_> = row.iter().map(|(k, v)| format!("{k:?}:{v}")).collect();
    fields.sort();
    fields.join(",")
}

/// Assert that two row sequences are equal in order and content.
///
/// # Panics
///
/// Panics if the sequences differ in length or at any index.
///
/// # Example
///
/// ```
/// use compgraph::row;
/// use compgraph::testing::assert_rows_equal;
///
/// assert_rows_equal(&[row! { "a" => 1, "b" => 2 }], &[row! { "b" => 2, "a" => 1 }]);
/// ```
pub fn assert_rows_equal(actual: &[Row], expected: &[Row]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected: {}\n  Actual: {}\n  Expected rows: {expected:?}\n  Actual rows: {actual:?}",
        expected.len(),
        actual.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "Row mismatch at index {i}:\n  Expected: {e}\n  Actual: {a}");
    }
}

/// Assert that two row sequences hold the same rows, ignoring order.
///
/// # Panics
///
/// Panics if the multisets of rows differ.
pub fn assert_rows_unordered_equal(actual: &[Row], expected: &[Row]) {
    let mut a: Vec<String> = actual.iter().map(canonical).collect();
    let mut e: Vec<String> = expected.iter().map(canonical).collect();
    a.sort();
    e.sort();
    if a != e {
        let missing: Vec<_> = e.iter().filter(|r| !a.contains(r)).collect();
        let extra: Vec<_> = a.iter().filter(|r| !e.contains(r)).collect();
        panic!(
            "Row content mismatch:\n  Missing rows: {missing:?}\n  Extra rows: {extra:?}\n  Expected count: {}\n  Actual count: {}",
            e.len(),
            a.len()
        );
    }
}

/// Assert that `rows` are ordered by `keys` (ascending unless `descending`).
///
/// # Panics
///
/// Panics if a row lacks a key field or two adjacent rows are out of order.
pub fn assert_sorted_by(rows: &[Row], keys: &[&str], descending: bool) {
    let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
    let tuples: Vec<KeyTuple> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.key(&keys)
                .unwrap_or_else(|e| panic!("Row {i} has no sort key: {e}\n  Row: {r}"))
        })
        .collect();
    for (i, pair) in tuples.windows(2).enumerate() {
        let ordered = if descending { pair[0] >= pair[1] } else { pair[0] <= pair[1] };
        assert!(
            ordered,
            "Rows {i} and {} out of order by {keys:?}:\n  {} then {}",
            i + 1,
            pair[0],
            pair[1]
        );
    }
}

/// Assert that `column` holds, row by row, floats within `epsilon` of `expected`.
///
/// # Panics
///
/// Panics on a length mismatch, a missing or non-numeric field, or a value out of tolerance.
pub fn assert_column_approx(rows: &[Row], column: &str, expected: &[f64], epsilon: f64) {
    assert_eq!(
        rows.len(),
        expected.len(),
        "Row count mismatch for column `{column}`: expected {}, got {}",
        expected.len(),
        rows.len()
    );
    for (i, (row, want)) in rows.iter().zip(expected).enumerate() {
        let got = row
            .get(column)
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|e| panic!("Row {i}: {e}\n  Row: {row}"));
        assert!(
            (got - want).abs() <= epsilon,
            "Row {i}: `{column}` = {got}, expected {want} (eps {epsilon})\n  Row: {row}"
        );
    }
}

/// Assert that every row satisfies `predicate`.
///
/// # Panics
///
/// Panics at the first row that does not.
pub fn assert_all_rows(rows: &[Row], predicate: impl Fn(&Row) -> bool) {
    for (i, row) in rows.iter().enumerate() {
        assert!(predicate(row), "Predicate failed for row {i}: {row}");
    }
}

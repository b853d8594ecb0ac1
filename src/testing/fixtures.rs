//! Small input tables shaped like the inputs of the stock pipelines.

use crate::row;
use crate::row::Row;

/// Six short documents `{doc_id, text}`.
///
/// # Example
///
/// ```
/// use compgraph::testing::sample_documents;
///
/// assert_eq!(sample_documents().len(), 6);
/// ```
#[must_use]
pub fn sample_documents() -> Vec<Row> {
    vec![
        row! { "doc_id" => 1, "text" => "hello, little world" },
        row! { "doc_id" => 2, "text" => "little" },
        row! { "doc_id" => 3, "text" => "little little little" },
        row! { "doc_id" => 4, "text" => "little? hello little world" },
        row! { "doc_id" => 5, "text" => "HELLO HELLO! WORLD..." },
        row! { "doc_id" => 6, "text" => "world? world... world!!! WORLD!!! HELLO!!!" },
    ]
}

/// Travel records `{edge_id, enter_time, leave_time}` over two edges.
#[must_use]
pub fn sample_travel_times() -> Vec<Row> {
    vec![
        row! { "edge_id" => 1, "enter_time" => "20171020T112238.723000", "leave_time" => "20171020T112239.723000" },
        row! { "edge_id" => 1, "enter_time" => "20171020T113000.000000", "leave_time" => "20171020T113002.000000" },
        row! { "edge_id" => 2, "enter_time" => "20171022T224500.000000", "leave_time" => "20171022T224510.000000" },
    ]
}

/// Edge geometry `{edge_id, start, end}` with `[lon, lat]` coordinates.
#[must_use]
pub fn sample_edge_lengths() -> Vec<Row> {
    vec![
        row! { "edge_id" => 1, "start" => vec![37.84870, 55.73853], "end" => vec![37.8490, 55.73896] },
        row! { "edge_id" => 2, "start" => vec![37.52428, 55.68780], "end" => vec![37.52480, 55.68778] },
    ]
}

//! Analytics pipelines composed purely from graph primitives.
//!
//! Every builder reads named sources, so the same graph can run against in-memory rows in
//! tests and against files in the CLI. Every sort in a pipeline uses the given
//! [`SortConfig`].
//!
//! Input layouts:
//! - documents: `{"doc_id": .., "text": ".."}`
//! - travel times: `{"edge_id": .., "enter_time": "20171020T112238.723000", "leave_time": ..}`
//! - edge lengths: `{"edge_id": .., "start": [lon, lat], "end": [lon, lat]}`

use crate::graph::{Graph, NO_KEYS};
use crate::operations::joiners::InnerJoiner;
use crate::operations::mappers::{
    Filter, FilterPunctuation, Haversine, Log, LowerCase, MathMapper, Product, Project, Rename,
    Split, TimestampDiff, ToDatetime, Zone,
};
use crate::operations::reducers::{Count, Sum, TermFrequency, TopN};
use crate::operations::{Sort, SortConfig};

pub const DOC_COLUMN: &str = "doc_id";
pub const TEXT_COLUMN: &str = "text";

fn sort(graph: &Graph, keys: &[&str], config: &SortConfig) -> Graph {
    graph.sort_by(Sort::new(keys.iter().copied()).with_config(config.clone()))
}

fn sort_desc(graph: &Graph, keys: &[&str], config: &SortConfig) -> Graph {
    graph.sort_by(
        Sort::new(keys.iter().copied())
            .descending()
            .with_config(config.clone()),
    )
}

/// Punctuation stripped, lowercased, one row per word.
fn words(source: &Graph) -> Graph {
    source
        .map(FilterPunctuation::new(TEXT_COLUMN))
        .map(LowerCase::new(TEXT_COLUMN))
        .map(Split::new(TEXT_COLUMN))
}

/// `{text, count}` for every word of every document, ordered by `(count, text)`,
/// ascending unless `descending`.
pub fn word_count_graph(input: &str, descending: bool, config: &SortConfig) -> Graph {
    let counted = sort(&words(&Graph::from_source(input)), &[TEXT_COLUMN], config)
        .reduce(Count::new("count"), [TEXT_COLUMN]);
    if descending {
        sort_desc(&counted, &["count", TEXT_COLUMN], config)
    } else {
        sort(&counted, &["count", TEXT_COLUMN], config)
    }
}

/// `{doc_id, text, tf_idf}`: for every word, the three documents where it scores the
/// highest tf-idf (more on ties). Output is grouped by word.
pub fn inverted_index_graph(input: &str, config: &SortConfig) -> Graph {
    let docs = Graph::from_source(input);
    let doc_count = docs.reduce(Count::new("count"), NO_KEYS);

    let tf = sort(&words(&docs), &[DOC_COLUMN], config)
        .reduce(TermFrequency::with_result(TEXT_COLUMN, "tf"), [DOC_COLUMN]);
    let tf = sort(&tf, &[TEXT_COLUMN], config);

    let idf = tf
        .reduce(Count::new("count"), [TEXT_COLUMN])
        .join(InnerJoiner::with_suffixes("_word", "_doc"), &doc_count, NO_KEYS)
        .map(MathMapper::new("idf", "count_doc / count_word"))
        .map(Log::new("idf"))
        .map(Project::new(["idf", TEXT_COLUMN]));

    tf.join(InnerJoiner::new(), &idf, [TEXT_COLUMN])
        .map(Product::with_result(["idf", "tf"], "tf_idf"))
        .map(Project::new([DOC_COLUMN, TEXT_COLUMN, "tf_idf"]))
        .reduce(TopN::new("tf_idf", 3), [TEXT_COLUMN])
}

/// `{doc_id, text, pmi}`: for every document, the ten words (longer than four characters,
/// seen at least twice there) with the highest pointwise mutual information.
pub fn pmi_graph(input: &str, config: &SortConfig) -> Graph {
    let long_words = words(&Graph::from_source(input)).map(Filter::new(|row| {
        Ok(row.get(TEXT_COLUMN)?.as_str()?.chars().count() > 4)
    }));
    let words = sort(&long_words, &[DOC_COLUMN, TEXT_COLUMN], config)
        .reduce(Count::new("doc_count"), [DOC_COLUMN, TEXT_COLUMN])
        .map(Filter::new(|row| Ok(row.get("doc_count")?.as_i64()? > 1)));

    let per_doc = words.reduce(Sum::new("doc_count"), [DOC_COLUMN]);
    let tf = words
        .join(InnerJoiner::with_suffixes("", "_overall"), &per_doc, [DOC_COLUMN])
        .map(MathMapper::new("tf", "doc_count / doc_count_overall"))
        .map(Project::new([DOC_COLUMN, TEXT_COLUMN, "tf"]));
    let tf = sort(&tf, &[TEXT_COLUMN], config);

    let total = words.reduce(Sum::new("doc_count"), NO_KEYS);
    let idf = sort(&words, &[TEXT_COLUMN], config)
        .reduce(Sum::new("doc_count"), [TEXT_COLUMN])
        .map(Rename::new("doc_count", "overall_count"))
        .join(InnerJoiner::new(), &total, NO_KEYS)
        .map(MathMapper::new("idf", "overall_count / doc_count"))
        .map(Project::new(["idf", TEXT_COLUMN]));

    let pmi = tf
        .join(InnerJoiner::new(), &idf, [TEXT_COLUMN])
        .map(MathMapper::new("pmi", "tf / idf"))
        .map(Log::new("pmi"))
        .map(Project::new([DOC_COLUMN, TEXT_COLUMN, "pmi"]));
    let by_doc = sort(&sort_desc(&pmi, &["pmi"], config), &[DOC_COLUMN], config);
    by_doc.reduce(TopN::new("pmi", 10), [DOC_COLUMN])
}

/// `{weekday, hour, speed}`: average speed in km/h per weekday and hour of `timezone`.
/// A named zone buckets each trip by the offset in force when it entered the edge.
pub fn yandex_maps_graph(
    times: &str,
    lengths: &str,
    timezone: impl Into<Zone>,
    config: &SortConfig,
) -> Graph {
    let edges = Graph::from_source(lengths)
        .map(Haversine::new("start", "end", "distance"))
        .map(Project::new(["distance", "edge_id"]));
    let edges = sort(&edges, &["edge_id"], config);

    let trips = Graph::from_source(times)
        .map(
            ToDatetime::new("enter_time")
                .timezone(timezone.into())
                .weekday("weekday")
                .hour("hour"),
        )
        .map(TimestampDiff::new("leave_time", "enter_time", "total_time"))
        .map(MathMapper::new("total_time", "total_time / 3600"));
    let trips = sort(&trips, &["edge_id"], config).join(InnerJoiner::new(), &edges, ["edge_id"]);
    let trips = sort(&trips, &["weekday", "hour"], config);

    let total_time = trips.reduce(Sum::new("total_time"), ["weekday", "hour"]);
    let total_distance = trips.reduce(Sum::new("distance"), ["weekday", "hour"]);

    total_time
        .join(InnerJoiner::new(), &total_distance, ["weekday", "hour"])
        .map(MathMapper::new("speed", "distance / total_time"))
        .map(Project::new(["weekday", "hour", "speed"]))
}

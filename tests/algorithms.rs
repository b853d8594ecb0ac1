//! End-to-end runs of the stock pipelines over the bundled fixtures.

use anyhow::Result;
use chrono::FixedOffset;
use compgraph::algorithms::{inverted_index_graph, pmi_graph, word_count_graph, yandex_maps_graph};
use compgraph::assert_approx_eq;
use compgraph::operations::SortConfig;
use compgraph::operations::mappers::{Haversine, parse_timezone};
use compgraph::testing::*;
use compgraph::*;

fn docs() -> Sources {
    Sources::new().bind_rows("docs", sample_documents())
}

fn column<'r>(rows: &'r [Row], field: &str) -> compgraph::Result<Vec<&'r Value>> {
    rows.iter().map(|r| r.get(field)).collect()
}

#[test]
fn word_count_orders_by_count_then_text() -> Result<()> {
    let sources = Sources::new().bind_rows(
        "docs",
        vec![
            row! { "doc_id" => 1, "text" => "GOD I LOVE ANIME!" },
            row! { "doc_id" => 2, "text" => "I HATE ANIME SO MUCH!!!!!!" },
        ],
    );
    let out = run_collect(&word_count_graph("docs", false, &SortConfig::default()), &sources)?;

    assert_rows_equal(
        &out,
        &[
            row! { "text" => "god", "count" => 1 },
            row! { "text" => "hate", "count" => 1 },
            row! { "text" => "love", "count" => 1 },
            row! { "text" => "much", "count" => 1 },
            row! { "text" => "so", "count" => 1 },
            row! { "text" => "anime", "count" => 2 },
            row! { "text" => "i", "count" => 2 },
        ],
    );
    Ok(())
}

#[test]
fn word_count_can_order_descending() -> Result<()> {
    let sources = Sources::new().bind_rows(
        "docs",
        vec![
            row! { "doc_id" => 1, "text" => "GOD I LOVE ANIME!" },
            row! { "doc_id" => 2, "text" => "I HATE ANIME SO MUCH!!!!!!" },
        ],
    );
    let out = run_collect(&word_count_graph("docs", true, &SortConfig::default()), &sources)?;

    assert_rows_equal(
        &out,
        &[
            row! { "text" => "i", "count" => 2 },
            row! { "text" => "anime", "count" => 2 },
            row! { "text" => "so", "count" => 1 },
            row! { "text" => "much", "count" => 1 },
            row! { "text" => "love", "count" => 1 },
            row! { "text" => "hate", "count" => 1 },
            row! { "text" => "god", "count" => 1 },
        ],
    );
    assert_sorted_by(&out, &["count", "text"], true);
    Ok(())
}

#[test]
fn word_count_over_fixture_documents() -> Result<()> {
    let out = run_collect(&word_count_graph("docs", false, &SortConfig::default()), &docs())?;
    assert_rows_equal(
        &out,
        &[
            row! { "text" => "hello", "count" => 5 },
            row! { "text" => "little", "count" => 7 },
            row! { "text" => "world", "count" => 7 },
        ],
    );
    Ok(())
}

#[test]
fn inverted_index_keeps_top_three_per_word_with_ties() -> Result<()> {
    let out = run_collect(&inverted_index_graph("docs", &SortConfig::default()), &docs())?;
    let idf = (6.0_f64 / 4.0).ln();

    let texts: Vec<&str> = out
        .iter()
        .map(|r| r.get("text").and_then(Value::as_str))
        .collect::<compgraph::Result<_>>()?;
    assert_eq!(
        texts,
        vec!["hello", "hello", "hello", "little", "little", "little", "world", "world", "world"]
    );
    assert_eq!(
        column(&out, "doc_id")?,
        [5, 1, 4, 2, 3, 4, 6, 1, 5].map(Value::from).iter().collect::<Vec<_>>()
    );
    assert_column_approx(
        &out,
        "tf_idf",
        &[
            idf * 2.0 / 3.0,
            idf / 3.0,
            idf / 4.0,
            idf,
            idf,
            idf / 2.0,
            idf * 4.0 / 5.0,
            idf / 3.0,
            idf / 3.0,
        ],
        1e-9,
    );
    assert_all_rows(&out, |r| r.len() == 3);
    Ok(())
}

#[test]
fn pmi_ranks_repeated_long_words_per_document() -> Result<()> {
    let out = run_collect(&pmi_graph("docs", &SortConfig::default()), &docs())?;

    assert_rows_unordered_equal(
        &out.iter()
            .map(|r| r.project(&["doc_id".to_string(), "text".to_string()]))
            .collect::<compgraph::Result<Vec<_>>>()?,
        &[
            row! { "doc_id" => 3, "text" => "little" },
            row! { "doc_id" => 4, "text" => "little" },
            row! { "doc_id" => 5, "text" => "hello" },
            row! { "doc_id" => 6, "text" => "world" },
        ],
    );
    assert_sorted_by(&out, &["doc_id"], false);
    assert_column_approx(
        &out,
        "pmi",
        &[(11.0_f64 / 5.0).ln(), (11.0_f64 / 5.0).ln(), (11.0_f64 / 2.0).ln(), (11.0_f64 / 4.0).ln()],
        1e-9,
    );
    Ok(())
}

fn maps_sources() -> Sources {
    Sources::new()
        .bind_rows("times", sample_travel_times())
        .bind_rows("lengths", sample_edge_lengths())
}

#[test]
fn yandex_maps_average_speed_per_weekday_and_hour() -> Result<()> {
    let graph = yandex_maps_graph("times", "lengths", FixedOffset::east_opt(0).unwrap(), &SortConfig::default());
    let out = run_collect(&graph, &maps_sources())?;

    let edge1 = Haversine::distance((37.84870, 55.73853), (37.8490, 55.73896));
    let edge2 = Haversine::distance((37.52428, 55.68780), (37.52480, 55.68778));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].get("weekday")?, &Value::from("Fri"));
    assert_eq!(out[0].get("hour")?, &Value::Int(11));
    assert_eq!(out[1].get("weekday")?, &Value::from("Sun"));
    assert_eq!(out[1].get("hour")?, &Value::Int(22));
    assert_approx_eq!(out[0].get("speed")?.as_f64()?, 2.0 * edge1 / (3.0 / 3600.0), 1e-6);
    assert_approx_eq!(out[1].get("speed")?.as_f64()?, edge2 / (10.0 / 3600.0), 1e-6);
    Ok(())
}

#[test]
fn yandex_maps_buckets_in_the_requested_timezone() -> Result<()> {
    let moscow = FixedOffset::east_opt(3 * 3600).unwrap();
    let out = run_collect(&yandex_maps_graph("times", "lengths", moscow, &SortConfig::default()), &maps_sources())?;

    let buckets: Vec<(String, i64)> = out
        .iter()
        .map(|r| Ok((r.get("weekday")?.as_str()?.to_string(), r.get("hour")?.as_i64()?)))
        .collect::<compgraph::Result<_>>()?;
    assert_eq!(buckets, vec![("Fri".to_string(), 14), ("Mon".to_string(), 1)]);
    Ok(())
}

#[test]
fn yandex_maps_accepts_named_timezones() -> Result<()> {
    let moscow = parse_timezone("Europe/Moscow")?;
    let fixed = FixedOffset::east_opt(3 * 3600).unwrap();
    let named = run_collect(&yandex_maps_graph("times", "lengths", moscow, &SortConfig::default()), &maps_sources())?;
    let offset = run_collect(&yandex_maps_graph("times", "lengths", fixed, &SortConfig::default()), &maps_sources())?;
    // no daylight saving in Moscow since 2014
    assert_rows_equal(&named, &offset);
    Ok(())
}

#[cfg(feature = "spilling")]
#[test]
fn pipelines_agree_when_sorts_spill() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let spilling = SortConfig::default()
        .with_spill_threshold(2)
        .with_spill_dir(dir.path());

    for (plain, spilled) in [
        (word_count_graph("docs", false, &SortConfig::default()), word_count_graph("docs", false, &spilling)),
        (word_count_graph("docs", true, &SortConfig::default()), word_count_graph("docs", true, &spilling)),
        (inverted_index_graph("docs", &SortConfig::default()), inverted_index_graph("docs", &spilling)),
        (pmi_graph("docs", &SortConfig::default()), pmi_graph("docs", &spilling)),
    ] {
        assert_rows_equal(&run_collect(&spilled, &docs())?, &run_collect(&plain, &docs())?);
    }
    Ok(())
}

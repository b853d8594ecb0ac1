//! Sort ordering, stability, spilling, and the sorted-input contract downstream of it.

use anyhow::Result;
use compgraph::operations::reducers::Count;
use compgraph::operations::{Sort, SortConfig};
use compgraph::testing::*;
use compgraph::*;

fn shuffled(n: i64) -> Vec<Row> {
    // deterministic permutation of 0..n with duplicate keys
    (0..n)
        .map(|i| row! { "k" => (i * 7919) % 13, "seq" => i })
        .collect()
}

#[test]
fn sort_is_total_and_stable() -> Result<()> {
    let sources = Sources::new().bind_rows("in", shuffled(200));
    let out = run_collect(&Graph::from_source("in").sort(["k"]), &sources)?;

    assert_eq!(out.len(), 200);
    assert_sorted_by(&out, &["k"], false);
    // stable: arrival order survives within equal keys
    assert_sorted_by(&out, &["k", "seq"], false);
    Ok(())
}

#[test]
fn descending_sort_keeps_arrival_order_within_ties() -> Result<()> {
    let sources = Sources::new().bind_rows("in", shuffled(100));
    let out = run_collect(&Graph::from_source("in").sort_desc(["k"]), &sources)?;

    assert_sorted_by(&out, &["k"], true);
    for pair in out.windows(2) {
        if pair[0].get("k")? == pair[1].get("k")? {
            assert!(pair[0].get("seq")? < pair[1].get("seq")?);
        }
    }
    Ok(())
}

#[test]
fn multi_key_sort_compares_key_tuples() -> Result<()> {
    let sources = Sources::new().bind_rows(
        "in",
        vec![
            row! { "a" => 2, "b" => "x" },
            row! { "a" => 1, "b" => "z" },
            row! { "a" => 2, "b" => "a" },
            row! { "a" => 1.5, "b" => "m" },
        ],
    );
    let out = run_collect(&Graph::from_source("in").sort(["a", "b"]), &sources)?;
    assert_rows_equal(
        &out,
        &[
            row! { "a" => 1, "b" => "z" },
            row! { "a" => 1.5, "b" => "m" },
            row! { "a" => 2, "b" => "a" },
            row! { "a" => 2, "b" => "x" },
        ],
    );
    Ok(())
}

#[test]
fn mixed_kinds_have_a_fixed_order() -> Result<()> {
    let sources = Sources::new().bind_rows(
        "in",
        vec![
            row! { "v" => vec![1] },
            row! { "v" => "text" },
            row! { "v" => 3 },
            row! { "v" => true },
        ],
    );
    let out = run_collect(&Graph::from_source("in").sort(["v"]), &sources)?;
    let kinds: Vec<&str> = out.iter().map(|r| r.get("v").map(Value::kind)).collect::<compgraph::Result<_>>()?;
    assert_eq!(kinds.first(), Some(&Value::Bool(true).kind()));
    assert_eq!(kinds.last(), Some(&Value::from(vec![1]).kind()));
    assert_eq!(out[0].get("v")?, &Value::Bool(true));
    assert_eq!(out[1].get("v")?, &Value::Int(3));
    assert_eq!(out[2].get("v")?, &Value::from("text"));
    Ok(())
}

#[test]
fn sort_then_reduce_is_accepted() -> Result<()> {
    let sources = Sources::new().bind_rows("in", shuffled(50));
    let graph = Graph::from_source("in").sort(["k"]).reduce(Count::new("n"), ["k"]);
    let out = run_collect(&graph, &sources)?;

    assert_eq!(out.len(), 13);
    assert_sorted_by(&out, &["k"], false);
    Ok(())
}

#[test]
fn large_integers_and_floats_sort_into_valid_groups() -> Result<()> {
    let two_53 = 1_i64 << 53;
    let sources = Sources::new().bind_rows(
        "in",
        vec![
            row! { "k" => two_53 + 1 },
            row! { "k" => two_53 as f64 },
            row! { "k" => two_53 },
        ],
    );
    let sorted = Graph::from_source("in").sort(["k"]);
    let out = run_collect(&sorted, &sources)?;
    assert_eq!(out[2].get("k")?, &Value::Int(two_53 + 1));

    let counts = run_collect(&sorted.reduce(Count::new("n"), ["k"]), &sources)?;
    let sizes: Vec<i64> = counts
        .iter()
        .map(|r| r.get("n").and_then(Value::as_i64))
        .collect::<compgraph::Result<_>>()?;
    // 2^53 as int and float are one group
    assert_eq!(sizes, vec![2, 1]);
    Ok(())
}

#[test]
fn descending_sort_does_not_satisfy_reduce() {
    let sources = Sources::new().bind_rows("in", shuffled(50));
    let graph = Graph::from_source("in").sort_desc(["k"]).reduce(Count::new("n"), ["k"]);
    assert!(matches!(run_collect(&graph, &sources), Err(Error::StreamNotSorted { .. })));
}

#[test]
fn sort_on_missing_field_fails() {
    let sources = Sources::new().bind_rows("in", vec![row! { "k" => 1 }, row! { "j" => 2 }]);
    let result = run_collect(&Graph::from_source("in").sort(["k"]), &sources);
    assert!(matches!(result, Err(Error::MissingField(f)) if f == "k"));
}

#[cfg(feature = "spilling")]
#[test]
fn spilled_sort_matches_in_memory_sort() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let sources = Sources::new().bind_rows("in", shuffled(1000));
    let in_memory = Graph::from_source("in").sort(["k"]);
    let spilled = Graph::from_source("in").sort_by(
        Sort::new(["k"]).with_config(
            SortConfig::default()
                .with_spill_threshold(64)
                .with_spill_dir(dir.path()),
        ),
    );

    let expected = run_collect(&in_memory, &sources)?;
    assert_rows_equal(&run_collect(&spilled, &sources)?, &expected);
    // and again, from fresh runs
    assert_rows_equal(&run_collect(&spilled, &sources)?, &expected);
    Ok(())
}

#[cfg(feature = "spilling")]
#[test]
fn spilled_descending_sort_is_stable() -> Result<()> {
    let sources = Sources::new().bind_rows("in", shuffled(300));
    let graph = Graph::from_source("in").sort_by(
        Sort::new(["k"])
            .descending()
            .with_config(SortConfig::default().with_spill_threshold(17)),
    );
    let in_memory = Graph::from_source("in").sort_desc(["k"]);
    assert_rows_equal(&run_collect(&graph, &sources)?, &run_collect(&in_memory, &sources)?);
    Ok(())
}

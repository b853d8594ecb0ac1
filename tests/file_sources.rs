//! File-backed leaves: restartability, parsing errors, globs, compression, JSONL output.

use anyhow::Result;
use compgraph::io::compression::auto_detect_writer;
use compgraph::io::{ParsedLines, parse_json_row, write_jsonl};
use compgraph::operations::reducers::Count;
use compgraph::testing::*;
use compgraph::*;
use std::fs::{File, create_dir_all, write};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_lines(path: &Path, lines: &[&str]) -> Result<()> {
    let mut w = auto_detect_writer(File::create(path)?, path)?;
    for line in lines {
        writeln!(w, "{line}")?;
    }
    w.flush()?;
    Ok(())
}

#[test]
fn file_source_restarts_on_every_run() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("docs.jsonl");
    write_lines(
        &path,
        &[
            r#"{"doc_id": 1, "text": "a b"}"#,
            r#"{"doc_id": 2, "text": "c"}"#,
            r#"{"doc_id": 3, "text": "d e f"}"#,
        ],
    )?;
    let graph = Graph::from_file(&path, parse_json_row).sort_desc(["doc_id"]);
    let sources = Sources::new();

    let runs = (0..3)
        .map(|_| run_collect(&graph, &sources))
        .collect::<compgraph::Result<Vec<_>>>()?;
    assert_eq!(runs[0].len(), 3);
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
    assert_eq!(runs[0][0].get("doc_id")?, &Value::Int(3));
    Ok(())
}

#[test]
fn blank_lines_are_skipped() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("in.jsonl");
    write(&path, "{\"a\": 1}\n\n   \n{\"a\": 2}\n")?;

    let out = run_collect(&Graph::from_file(&path, parse_json_row), &Sources::new())?;
    assert_rows_equal(&out, &[row! { "a" => 1 }, row! { "a" => 2 }]);
    Ok(())
}

#[test]
fn parse_errors_carry_path_and_line() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bad.jsonl");
    write(&path, "{\"a\": 1}\n\n{\"a\": \n{\"a\": 3}\n")?;
    let graph = Graph::from_file(&path, parse_json_row);
    let mut stream = graph.run(&Sources::new())?;

    assert_eq!(stream.next().transpose()?, Some(row! { "a" => 1 }));
    match stream.next() {
        Some(Err(Error::Parse { path: p, line, .. })) => {
            assert_eq!(p, path);
            assert_eq!(line, 3);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
    assert!(stream.next().is_none());
    Ok(())
}

#[test]
fn missing_file_fails_on_first_pull() -> Result<()> {
    let dir = TempDir::new()?;
    let graph = Graph::from_file(dir.path().join("absent.jsonl"), parse_json_row);
    // building the stream opens nothing
    let mut stream = graph.run(&Sources::new())?;
    assert!(matches!(stream.next(), Some(Err(Error::Io { .. }))));
    Ok(())
}

#[test]
fn custom_line_parser() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("words.txt");
    write(&path, "b\na\nb\n")?;
    let graph = Graph::from_file(&path, |line: &str| Ok(row! { "word" => line.trim() }))
        .sort(["word"])
        .reduce(Count::new("n"), ["word"]);

    assert_rows_equal(
        &run_collect(&graph, &Sources::new())?,
        &[row! { "word" => "a", "n" => 1 }, row! { "word" => "b", "n" => 2 }],
    );
    Ok(())
}

#[test]
fn glob_reads_matching_files_in_path_order() -> Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path();
    create_dir_all(base.join("sub.jsonl"))?;
    write_lines(&base.join("part-2.jsonl"), &[r#"{"n": 2}"#])?;
    write_lines(&base.join("part-1.jsonl"), &[r#"{"n": 1}"#, r#"{"n": 10}"#])?;
    write_lines(&base.join("other.txt"), &[r#"{"n": 99}"#])?;

    let pattern = format!("{}/*.jsonl", base.display());
    let graph = Graph::from_glob(pattern, parse_json_row);
    let out = run_collect(&graph, &Sources::new())?;
    assert_rows_equal(&out, &[row! { "n" => 1 }, row! { "n" => 10 }, row! { "n" => 2 }]);

    // the pattern is expanded again on the next run
    write_lines(&base.join("part-3.jsonl"), &[r#"{"n": 3}"#])?;
    assert_eq!(run_collect(&graph, &Sources::new())?.len(), 4);
    Ok(())
}

#[test]
fn glob_without_matches_is_empty() -> Result<()> {
    let dir = TempDir::new()?;
    let graph = Graph::from_glob(format!("{}/*.jsonl", dir.path().display()), parse_json_row);
    assert!(run_collect(&graph, &Sources::new())?.is_empty());
    Ok(())
}

#[test]
fn invalid_glob_is_a_pattern_error() {
    let graph = Graph::from_glob("[", parse_json_row);
    assert!(matches!(graph.run(&Sources::new()).err(), Some(Error::Pattern { .. })));
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_files_are_decompressed() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("in.jsonl.gz");
    write_lines(&path, &[r#"{"a": 1}"#, r#"{"a": 2}"#])?;

    let out = run_collect(&Graph::from_file(&path, parse_json_row), &Sources::new())?;
    assert_rows_equal(&out, &[row! { "a" => 1 }, row! { "a" => 2 }]);
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_detected_by_magic_bytes() -> Result<()> {
    let dir = TempDir::new()?;
    let compressed = dir.path().join("in.jsonl.zst");
    write_lines(&compressed, &[r#"{"a": "z"}"#])?;
    // same bytes under a name that says nothing about the codec
    let renamed = dir.path().join("in.data");
    std::fs::rename(&compressed, &renamed)?;

    let out = run_collect(&Graph::from_file(&renamed, parse_json_row), &Sources::new())?;
    assert_rows_equal(&out, &[row! { "a" => "z" }]);
    Ok(())
}

#[test]
fn write_jsonl_round_trips_through_a_file_source() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("out.jsonl");
    let rows = vec![
        row! { "doc_id" => 1, "score" => 0.25, "tags" => vec!["x", "y"], "ok" => true },
        row! { "doc_id" => 2, "score" => 1.0, "tags" => Vec::<String>::new(), "ok" => false },
    ];

    let written = write_jsonl(&path, rows.clone().into_iter().map(Ok))?;
    assert_eq!(written, 2);
    let back = run_collect(&Graph::from_file(&path, parse_json_row), &Sources::new())?;
    assert_rows_equal(&back, &rows);
    Ok(())
}

#[test]
fn write_jsonl_stops_at_the_first_upstream_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("partial.jsonl");
    let rows = vec![Ok(row! { "a" => 1 }), Err(Error::MissingField("b".into())), Ok(row! { "a" => 3 })];

    assert!(matches!(write_jsonl(&path, rows), Err(Error::MissingField(_))));
    let kept = run_collect(&Graph::from_file(&path, parse_json_row), &Sources::new())?;
    assert_rows_equal(&kept, &[row! { "a" => 1 }]);
    Ok(())
}

#[test]
fn parsed_lines_as_a_named_source() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("in.jsonl");
    write_lines(&path, &[r#"{"k": 2}"#, r#"{"k": 1}"#])?;
    let paths = vec![path.clone(), path];
    let parser: compgraph::io::LineParser = Arc::new(parse_json_row);
    let sources = Sources::new().bind("in", move || ParsedLines::new(paths.clone(), Arc::clone(&parser)));

    let out = run_collect(&Graph::from_source("in").sort(["k"]), &sources)?;
    assert_eq!(out.len(), 4);
    assert_sorted_by(&out, &["k"], false);
    Ok(())
}

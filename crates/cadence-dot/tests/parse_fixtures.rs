use std::path::PathBuf;

use cadence_core::{analyze, AnalysisOptions, Heuristic};
use cadence_dot::{parse, parse_file, ParseError};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn ring_matches_hand_built_bounds() {
    let mut g = parse_file(fixture("ring.dot")).unwrap();
    assert_eq!(g.block_count(), 1);
    for (len, traffic) in [(1, 6), (2, 10), (11, 16), (12, 20), (21, 26), (22, 30)] {
        assert_eq!(g.max_traffic(len).unwrap(), traffic, "len {len}");
    }
}

#[test]
fn alternating_blocks_follow_each_other() {
    let mut g = parse_file(fixture("alternating.dot")).unwrap();
    let mut a = g.query("A").unwrap();
    assert_eq!(a.max_prefix(8).unwrap(), 8);
    assert_eq!(a.max_prefix(12).unwrap(), 11);
    let mut c = g.query("C").unwrap();
    assert_eq!(c.max_suffix(9).unwrap(), 13);
}

#[test]
fn superframe_model_structure() {
    let g = parse_file(fixture("superframe.dot")).unwrap();
    let labels: Vec<&str> = g.blocks().map(|b| b.label()).collect();
    assert_eq!(labels, vec!["join", "beacon", "data"]);
    assert_eq!(g.longest_block_period(), 9);
    assert_eq!(g.shortest_block_period(), 4);
    assert_eq!(g.highest_block_traffic(), 11);

    let data = g.block_id("data").unwrap();
    let beacon = g.block_id("beacon").unwrap();
    let mut next: Vec<_> = g.block(data).unwrap().next_blocks().collect();
    next.sort_by_key(|id| id.index());
    assert_eq!(next, vec![beacon, data]);
}

#[test]
fn superframe_analysis_runs_for_every_heuristic() {
    for heuristic in Heuristic::ALL {
        let mut g = parse_file(fixture("superframe.dot")).unwrap();
        let options = AnalysisOptions::new(heuristic).with_num_blocks(2);
        let analysis = analyze(&mut g, &options).unwrap();
        assert!(analysis.curve.is_concave(), "{heuristic}");
        assert!(analysis.curve.segment_count() >= 2, "{heuristic}");
    }
}

#[test]
fn block_to_block_fixture_is_rejected() {
    let err = parse_file(fixture("block_to_block.dot")).unwrap_err();
    assert!(matches!(err, ParseError::BlockToBlock { .. }), "{err}");
    assert_eq!(err.to_string(), "Block to block link: A -> B");
}

#[test]
fn truncated_fixture_is_a_syntax_error() {
    let err = parse_file(fixture("truncated.dot")).unwrap_err();
    match err {
        ParseError::Syntax { src, .. } => assert!(src.name().ends_with("truncated.dot")),
        other => panic!("expected syntax error, got {other}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let err = parse_file(fixture("does_not_exist.dot")).unwrap_err();
    assert!(matches!(err, ParseError::Io { .. }));
    assert!(err.to_string().contains("does_not_exist.dot"));
}

#[test]
fn empty_model_has_no_blocks() {
    let g = parse("digraph {}", "empty.dot").unwrap();
    assert!(g.is_empty());
}

#![no_main]
use cadence_core::{analyze, AnalysisOptions, Heuristic};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(s) = std::str::from_utf8(rest) else {
        return;
    };
    let Ok(mut graph) = cadence_dot::parse(s, "fuzz.dot") else {
        return;
    };
    // Keep runs short; large periods are valid but slow.
    if graph.block_count() > 6 || graph.longest_block_period() > 64 {
        return;
    }
    let heuristic = Heuristic::ALL[usize::from(selector) % Heuristic::ALL.len()];
    let options = AnalysisOptions::new(heuristic).with_num_blocks(2);
    if let Ok(analysis) = analyze(&mut graph, &options) {
        assert!(analysis.curve.is_concave(), "{}", analysis.curve);
    }
});

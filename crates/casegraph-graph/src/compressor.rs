use crate::analyzer::{AnalysisResult, CaseSummary, ConnectedNode};
use serde::{Deserialize, Serialize};

/// Bounds for the compressed payload; both are clamped to at least 1.
#[derive(Debug, Clone, Copy)]
pub struct CompressOptions {
    pub max_cases: usize,
    pub max_nodes: usize,
}

/// Size-bounded summary safe to embed in a model prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedPayload {
    pub open_deadline_count: usize,
    pub priority_cases: Vec<CaseSummary>,
    pub bottlenecks: Vec<CaseSummary>,
    pub hot_nodes: Vec<ConnectedNode>,
}

/// Priority ordering key for a case, compared descending.
///
/// Outstanding open deadlines rank first, then active status;
/// connectivity only breaks ties among equally urgent cases, so a
/// well-connected but dormant case never outranks live work.
pub fn priority_key(summary: &CaseSummary) -> (usize, bool, usize) {
    (
        summary.counts.open_deadlines,
        summary.is_active(),
        summary.connectivity,
    )
}

/// Reduce an analysis result to a bounded prompt payload.
///
/// `open_deadline_count` is summed over every case summary in scope and
/// is unaffected by `max_cases`. `hot_nodes` is ranked purely by degree
/// and never exceeds the nodes actually supplied.
pub fn compress_analysis(analysis: &AnalysisResult, options: &CompressOptions) -> CompressedPayload {
    let max_cases = options.max_cases.max(1);
    let max_nodes = options.max_nodes.max(1);

    let open_deadline_count = analysis
        .case_summaries
        .iter()
        .map(|summary| summary.counts.open_deadlines)
        .sum();

    let mut ranked = analysis.case_summaries.clone();
    ranked.sort_by(|a, b| priority_key(b).cmp(&priority_key(a)));
    ranked.truncate(max_cases);

    let mut hot_nodes = analysis.top_connected_nodes.clone();
    hot_nodes.sort_by(|a, b| b.degree.cmp(&a.degree));
    hot_nodes.truncate(max_nodes);

    CompressedPayload {
        open_deadline_count,
        priority_cases: ranked.clone(),
        bottlenecks: ranked,
        hot_nodes,
    }
}

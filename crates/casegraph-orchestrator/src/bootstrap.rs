// ABOUTME: Deterministic graph bootstrap assembled before any tool-calling happens
// ABOUTME: Gated by a keyword heuristic so unrelated turns skip the analysis entirely

use casegraph_core::{CaseSnapshot, OrchestratorConfig, Result};
use casegraph_graph::{analyze_case_graph, compress_analysis, AnalyzeOptions, CompressOptions};
use tracing::debug;

const GRAPH_KEYWORDS: &[&str] = &[
    "case",
    "deadline",
    "priorit",
    "overview",
    "workload",
    "bottleneck",
    "graph",
    "connected",
    "status",
    "summar",
    "docket",
];

/// Whether a turn's content implies graph analysis.
pub fn turn_implies_graph_analysis(text: &str) -> bool {
    let lower = text.to_lowercase();
    GRAPH_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Run the analyzer and compressor over the snapshot and render the
/// bounded payload as bootstrap prompt content.
pub fn build_bootstrap_context(snapshot: &CaseSnapshot, config: &OrchestratorConfig) -> Result<String> {
    let analysis = analyze_case_graph(
        snapshot,
        &AnalyzeOptions {
            case_id: None,
            top_k: Some(config.bootstrap_top_k),
        },
    );
    let payload = compress_analysis(
        &analysis,
        &CompressOptions {
            max_cases: config.bootstrap_max_cases,
            max_nodes: config.bootstrap_max_nodes,
        },
    );
    debug!(
        cases = analysis.scope.case_count,
        nodes = analysis.totals.nodes,
        open_deadlines = payload.open_deadline_count,
        "built graph bootstrap context"
    );

    let rendered = serde_json::to_string_pretty(&payload)?;
    Ok(format!("Case graph bootstrap context:\n{rendered}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegraph_core::Case;

    #[test]
    fn workload_questions_imply_graph_analysis() {
        assert!(turn_implies_graph_analysis(
            "Which of my cases has the most urgent deadlines?"
        ));
        assert!(turn_implies_graph_analysis("Give me a docket overview"));
    }

    #[test]
    fn unrelated_questions_skip_the_bootstrap() {
        assert!(!turn_implies_graph_analysis(
            "What does adverse possession mean?"
        ));
    }

    #[test]
    fn bootstrap_context_embeds_the_compressed_payload() {
        let snapshot = CaseSnapshot {
            cases: vec![Case {
                id: "a".into(),
                name: "Smith v. Jones".into(),
                number: "CL-1".into(),
                status: "active".into(),
                parties: vec![],
            }],
            ..CaseSnapshot::default()
        };
        let context =
            build_bootstrap_context(&snapshot, &OrchestratorConfig::default()).unwrap();
        assert!(context.starts_with("Case graph bootstrap context:"));
        assert!(context.contains("openDeadlineCount"));
        assert!(context.contains("Smith v. Jones"));
    }
}

use casegraph_core::CaseSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const WORKSPACE_NODE_ID: &str = "workspace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Workspace,
    Case,
    Party,
    Deadline,
    Contact,
    Filing,
    Evidence,
    Note,
    Document,
}

/// A graph node together with its connectivity (edge count).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNode {
    pub id: String,
    pub label: String,
    pub kind: EntityKind,
    pub degree: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    pub case_count: usize,
}

/// Entity counts for the analyzed graph. Parties contribute to
/// `nodes`/`edges` but carry no dedicated field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTotals {
    pub cases: usize,
    pub deadlines: usize,
    pub contacts: usize,
    pub filings: usize,
    pub evidences: usize,
    pub notes: usize,
    pub documents: usize,
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseCounts {
    pub deadlines: usize,
    pub open_deadlines: usize,
    pub contacts: usize,
    pub filings: usize,
    pub evidences: usize,
    pub notes: usize,
    pub documents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub case_id: String,
    pub case_name: String,
    pub case_number: String,
    pub status: String,
    /// Degree of this case's node.
    pub connectivity: usize,
    pub counts: CaseCounts,
}

impl CaseSummary {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scope: AnalysisScope,
    pub totals: GraphTotals,
    pub top_connected_nodes: Vec<ConnectedNode>,
    pub case_summaries: Vec<CaseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Restrict the graph to a single case.
    pub case_id: Option<String>,
    /// Bound on `top_connected_nodes`; `None` leaves it unbounded.
    pub top_k: Option<usize>,
}

fn attach(
    nodes: &mut Vec<ConnectedNode>,
    edges: &mut usize,
    parent: usize,
    id: String,
    label: String,
    kind: EntityKind,
) {
    nodes.push(ConnectedNode {
        id,
        label,
        kind,
        degree: 1,
    });
    nodes[parent].degree += 1;
    *edges += 1;
}

/// Build the entity graph for a snapshot and compute connectivity and
/// per-case summaries.
///
/// Pure and deterministic: no side effects, safe to call repeatedly on
/// the same snapshot. The graph is a tree rooted at a synthetic
/// workspace node, so `edges == nodes - 1` always holds. Records whose
/// `caseId` does not resolve within the (possibly filtered) case set are
/// dropped entirely, not merely left unlinked.
pub fn analyze_case_graph(snapshot: &CaseSnapshot, options: &AnalyzeOptions) -> AnalysisResult {
    let cases: Vec<_> = match &options.case_id {
        Some(id) => snapshot.cases.iter().filter(|c| &c.id == id).collect(),
        None => snapshot.cases.iter().collect(),
    };

    if let Some(id) = &options.case_id {
        if cases.is_empty() {
            debug!(case_id = %id, "scoped analysis matched no case");
            let workspace = ConnectedNode {
                id: WORKSPACE_NODE_ID.to_string(),
                label: "Workspace".to_string(),
                kind: EntityKind::Workspace,
                degree: 0,
            };
            let mut top_connected_nodes = vec![workspace];
            if let Some(k) = options.top_k {
                top_connected_nodes.truncate(k);
            }
            return AnalysisResult {
                scope: AnalysisScope {
                    case_id: Some(id.clone()),
                    case_count: 0,
                },
                totals: GraphTotals {
                    nodes: 1,
                    ..GraphTotals::default()
                },
                top_connected_nodes,
                case_summaries: Vec::new(),
                warning: Some(format!("No case found for caseId \"{id}\".")),
            };
        }
    }

    let mut nodes = vec![ConnectedNode {
        id: WORKSPACE_NODE_ID.to_string(),
        label: "Workspace".to_string(),
        kind: EntityKind::Workspace,
        degree: 0,
    }];
    let mut edges = 0usize;
    let mut case_index: HashMap<String, usize> = HashMap::new();
    let mut case_counts: HashMap<String, CaseCounts> = HashMap::new();

    for case in &cases {
        let idx = nodes.len();
        attach(
            &mut nodes,
            &mut edges,
            0,
            format!("case:{}", case.id),
            case.name.clone(),
            EntityKind::Case,
        );
        case_index.insert(case.id.clone(), idx);
        case_counts.insert(case.id.clone(), CaseCounts::default());
    }

    for case in &cases {
        let parent = case_index[&case.id];
        for (i, party) in case.parties.iter().enumerate() {
            attach(
                &mut nodes,
                &mut edges,
                parent,
                format!("party:{}:{}", case.id, i),
                party.name.clone(),
                EntityKind::Party,
            );
        }
    }

    let mut totals = GraphTotals {
        cases: cases.len(),
        ..GraphTotals::default()
    };

    for deadline in &snapshot.deadlines {
        let Some((case_id, parent)) = resolve(&case_index, &deadline.case_id) else {
            continue;
        };
        attach(
            &mut nodes,
            &mut edges,
            parent,
            format!("deadline:{}", deadline.id),
            deadline.title.clone(),
            EntityKind::Deadline,
        );
        totals.deadlines += 1;
        let counts = case_counts.entry(case_id).or_default();
        counts.deadlines += 1;
        if !deadline.completed {
            counts.open_deadlines += 1;
        }
    }

    for contact in &snapshot.contacts {
        let Some((case_id, parent)) = resolve(&case_index, &contact.case_id) else {
            continue;
        };
        attach(
            &mut nodes,
            &mut edges,
            parent,
            format!("contact:{}", contact.id),
            contact.name.clone(),
            EntityKind::Contact,
        );
        totals.contacts += 1;
        case_counts.entry(case_id).or_default().contacts += 1;
    }

    for filing in &snapshot.filings {
        let Some((case_id, parent)) = resolve(&case_index, &filing.case_id) else {
            continue;
        };
        attach(
            &mut nodes,
            &mut edges,
            parent,
            format!("filing:{}", filing.id),
            filing.title.clone(),
            EntityKind::Filing,
        );
        totals.filings += 1;
        case_counts.entry(case_id).or_default().filings += 1;
    }

    for evidence in &snapshot.evidences {
        let Some((case_id, parent)) = resolve(&case_index, &evidence.case_id) else {
            continue;
        };
        attach(
            &mut nodes,
            &mut edges,
            parent,
            format!("evidence:{}", evidence.id),
            evidence.label.clone(),
            EntityKind::Evidence,
        );
        totals.evidences += 1;
        case_counts.entry(case_id).or_default().evidences += 1;
    }

    for note in &snapshot.notes {
        let Some((case_id, parent)) = resolve(&case_index, &note.case_id) else {
            continue;
        };
        attach(
            &mut nodes,
            &mut edges,
            parent,
            format!("note:{}", note.id),
            note.content.chars().take(48).collect(),
            EntityKind::Note,
        );
        totals.notes += 1;
        case_counts.entry(case_id).or_default().notes += 1;
    }

    for document in &snapshot.documents {
        let Some((case_id, parent)) = resolve(&case_index, &document.case_id) else {
            continue;
        };
        attach(
            &mut nodes,
            &mut edges,
            parent,
            format!("document:{}", document.id),
            document.title.clone(),
            EntityKind::Document,
        );
        totals.documents += 1;
        case_counts.entry(case_id).or_default().documents += 1;
    }

    totals.nodes = nodes.len();
    totals.edges = edges;

    let case_summaries: Vec<CaseSummary> = cases
        .iter()
        .map(|case| CaseSummary {
            case_id: case.id.clone(),
            case_name: case.name.clone(),
            case_number: case.number.clone(),
            status: case.status.clone(),
            connectivity: nodes[case_index[&case.id]].degree,
            counts: case_counts.remove(&case.id).unwrap_or_default(),
        })
        .collect();

    let mut top_connected_nodes = nodes;
    top_connected_nodes.sort_by(|a, b| b.degree.cmp(&a.degree));
    if let Some(k) = options.top_k {
        top_connected_nodes.truncate(k);
    }

    AnalysisResult {
        scope: AnalysisScope {
            case_id: options.case_id.clone(),
            case_count: cases.len(),
        },
        totals,
        top_connected_nodes,
        case_summaries,
        warning: None,
    }
}

fn resolve(case_index: &HashMap<String, usize>, case_id: &Option<String>) -> Option<(String, usize)> {
    let id = case_id.as_ref()?;
    let parent = case_index.get(id)?;
    Some((id.clone(), *parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegraph_core::{Case, Contact, Deadline, Document, Evidence, Filing, Note, Party};

    fn party(name: &str) -> Party {
        Party {
            name: name.to_string(),
            role: None,
        }
    }

    fn deadline(id: &str, case_id: Option<&str>, completed: bool) -> Deadline {
        Deadline {
            id: id.to_string(),
            case_id: case_id.map(String::from),
            title: format!("deadline {id}"),
            due_date: None,
            completed,
        }
    }

    /// Two cases; one dangling deadline and one unlinked document that
    /// must be dropped from the graph.
    fn sample_snapshot() -> CaseSnapshot {
        CaseSnapshot {
            cases: vec![
                Case {
                    id: "alpha".into(),
                    name: "Smith v. Jones".into(),
                    number: "CL-2024-001".into(),
                    status: "active".into(),
                    parties: vec![party("Smith"), party("Jones")],
                },
                Case {
                    id: "beta".into(),
                    name: "In re Estate of Doe".into(),
                    number: "CL-2024-002".into(),
                    status: "pending".into(),
                    parties: vec![party("Doe Estate")],
                },
            ],
            deadlines: vec![
                deadline("d1", Some("alpha"), false),
                deadline("d2", Some("alpha"), true),
                deadline("d3", Some("beta"), false),
                deadline("d4", Some("ghost"), false),
            ],
            contacts: vec![
                Contact {
                    id: "c1".into(),
                    case_id: Some("alpha".into()),
                    name: "Clerk".into(),
                    role: None,
                },
                Contact {
                    id: "c2".into(),
                    case_id: Some("beta".into()),
                    name: "Opposing counsel".into(),
                    role: None,
                },
            ],
            filings: vec![Filing {
                id: "f1".into(),
                case_id: Some("alpha".into()),
                title: "Complaint".into(),
                filed_date: None,
            }],
            evidences: vec![
                Evidence {
                    id: "e1".into(),
                    case_id: Some("alpha".into()),
                    label: "Exhibit A".into(),
                },
                Evidence {
                    id: "e2".into(),
                    case_id: Some("beta".into()),
                    label: "Exhibit B".into(),
                },
            ],
            notes: vec![
                Note {
                    id: "n1".into(),
                    case_id: Some("alpha".into()),
                    content: "call clerk".into(),
                },
                Note {
                    id: "n2".into(),
                    case_id: Some("beta".into()),
                    content: "draft motion".into(),
                },
            ],
            documents: vec![
                Document {
                    id: "doc1".into(),
                    case_id: Some("alpha".into()),
                    title: "Answer".into(),
                    filename: None,
                },
                Document {
                    id: "doc2".into(),
                    case_id: Some("beta".into()),
                    title: "Will".into(),
                    filename: None,
                },
                Document {
                    id: "doc3".into(),
                    case_id: None,
                    title: "Orphan scan".into(),
                    filename: None,
                },
            ],
        }
    }

    #[test]
    fn worked_example_totals() {
        let result = analyze_case_graph(&sample_snapshot(), &AnalyzeOptions::default());
        assert_eq!(
            result.totals,
            GraphTotals {
                cases: 2,
                deadlines: 3,
                contacts: 2,
                filings: 1,
                evidences: 2,
                notes: 2,
                documents: 2,
                nodes: 18,
                edges: 17,
            }
        );
        assert_eq!(result.scope.case_count, 2);
        assert!(result.warning.is_none());
    }

    #[test]
    fn graph_is_always_a_tree() {
        let snapshots = [CaseSnapshot::default(), sample_snapshot()];
        for snapshot in &snapshots {
            let result = analyze_case_graph(snapshot, &AnalyzeOptions::default());
            assert_eq!(result.totals.edges, result.totals.nodes - 1);
        }
        let scoped = analyze_case_graph(
            &sample_snapshot(),
            &AnalyzeOptions {
                case_id: Some("beta".into()),
                top_k: Some(10),
            },
        );
        assert_eq!(scoped.totals.edges, scoped.totals.nodes - 1);
    }

    #[test]
    fn scoping_to_existing_case_restricts_totals() {
        let result = analyze_case_graph(
            &sample_snapshot(),
            &AnalyzeOptions {
                case_id: Some("alpha".into()),
                top_k: Some(99),
            },
        );
        assert_eq!(result.scope.case_count, 1);
        assert_eq!(
            result.totals,
            GraphTotals {
                cases: 1,
                deadlines: 2,
                contacts: 1,
                filings: 1,
                evidences: 1,
                notes: 1,
                documents: 1,
                nodes: 11,
                edges: 10,
            }
        );
        assert_eq!(result.case_summaries.len(), 1);
        assert_eq!(result.case_summaries[0].counts.open_deadlines, 1);
    }

    #[test]
    fn scoping_to_unknown_case_short_circuits_with_warning() {
        let result = analyze_case_graph(
            &sample_snapshot(),
            &AnalyzeOptions {
                case_id: Some("nope".into()),
                top_k: Some(5),
            },
        );
        assert_eq!(
            result.warning.as_deref(),
            Some("No case found for caseId \"nope\".")
        );
        assert_eq!(result.scope.case_count, 0);
        assert_eq!(result.totals.nodes, 1);
        assert_eq!(result.totals.edges, 0);
        assert_eq!(result.totals.cases, 0);
        assert!(result.case_summaries.is_empty());
    }

    #[test]
    fn top_connected_nodes_are_degree_sorted_and_bounded() {
        let snapshot = sample_snapshot();
        let bounded = analyze_case_graph(
            &snapshot,
            &AnalyzeOptions {
                case_id: None,
                top_k: Some(5),
            },
        );
        assert_eq!(bounded.top_connected_nodes.len(), 5);
        assert_eq!(bounded.top_connected_nodes[0].id, "case:alpha");
        assert!(bounded
            .top_connected_nodes
            .windows(2)
            .all(|w| w[0].degree >= w[1].degree));

        let unbounded = analyze_case_graph(
            &snapshot,
            &AnalyzeOptions {
                case_id: None,
                top_k: Some(99),
            },
        );
        assert_eq!(unbounded.top_connected_nodes.len(), 18);
    }

    #[test]
    fn case_summaries_report_connectivity_and_counts() {
        let result = analyze_case_graph(&sample_snapshot(), &AnalyzeOptions::default());
        let alpha = &result.case_summaries[0];
        assert_eq!(alpha.case_id, "alpha");
        // workspace + 2 parties + 2 deadlines + contact + filing + evidence + note + document
        assert_eq!(alpha.connectivity, 10);
        assert_eq!(alpha.counts.deadlines, 2);
        assert_eq!(alpha.counts.open_deadlines, 1);

        let beta = &result.case_summaries[1];
        assert_eq!(beta.connectivity, 7);
        assert_eq!(beta.counts.open_deadlines, 1);
    }
}

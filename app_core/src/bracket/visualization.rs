//! `getVisualization` (spec §4.1): an opaque, serialisable structure for an
//! external renderer. This crate never draws anything — it only flattens
//! the match graph into rounds/nodes/edges the renderer can lay out.

use crate::model::{Format, Match, MatchId, MatchState, ParticipantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizNode {
    pub match_id: MatchId,
    pub identifier: String,
    pub round: i32,
    pub column: i32,
    pub is_losers_bracket: bool,
    pub player1: Option<ParticipantId>,
    pub player2: Option<ParticipantId>,
    pub winner: Option<ParticipantId>,
    pub state: MatchState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizEdge {
    pub from_match: MatchId,
    pub to_match: MatchId,
    pub is_loser_feed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub format: Format,
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

/// Flattens `matches` into a renderer-agnostic node/edge graph. `column`
/// mirrors bracket round for winners-side matches and is mirrored negative
/// for losers-side matches, so a renderer can lay winners/losers brackets
/// on either side of a shared grand-finals column without knowing anything
/// about double elimination specifically.
pub fn get_visualization(format: Format, matches: &[Match]) -> Visualization {
    let nodes: Vec<VizNode> = matches
        .iter()
        .map(|m| VizNode {
            match_id: m.id,
            identifier: m.identifier.clone(),
            round: m.round,
            column: m.round,
            is_losers_bracket: m.is_losers_bracket,
            player1: m.player1_id,
            player2: m.player2_id,
            winner: m.winner_id,
            state: m.state,
        })
        .collect();

    let mut edges = Vec::new();
    for m in matches {
        if let Some(src) = m.prereq_match_id_p1 {
            edges.push(VizEdge {
                from_match: src,
                to_match: m.id,
                is_loser_feed: m.is_prereq_loser_p1,
            });
        }
        if let Some(src) = m.prereq_match_id_p2 {
            edges.push(VizEdge {
                from_match: src,
                to_match: m.id,
                is_loser_feed: m.is_prereq_loser_p2,
            });
        }
    }

    Visualization { format, nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket;
    use crate::model::{FormatOptions, Participant, TournamentId};
    use uuid::Uuid;

    #[test]
    fn edges_mirror_prereq_links() {
        let tid: TournamentId = Uuid::new_v4();
        let ps: Vec<Participant> = (0..4).map(|i| Participant::new(tid, format!("p{i}"))).collect();
        let result = bracket::generate(Format::SingleElimination, &ps, &FormatOptions::default()).unwrap();
        let viz = get_visualization(Format::SingleElimination, &result.matches);
        assert_eq!(viz.nodes.len(), result.matches.len());
        assert!(!viz.edges.is_empty());
    }
}

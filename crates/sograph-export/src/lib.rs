//! Writes crawled answer graphs as node and edge tables ready to be imported
//! in Gephi.

mod writer;

use std::io;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use sograph_crawler::{AnswerEdge, AnswerId, Graph, User, UserId};

pub use writer::{open_csv, CsvTerminator, CsvWriterConfig, FileMode};

pub const NODE_HEADERS: [&str; 4] = ["Id", "Label", "Question_Tag", "Weight"];
pub const EDGE_HEADERS: [&str; 5] = ["Source", "Target", "Type", "Weight", "Ans_ID"];

#[derive(Debug, Serialize)]
struct NodeRecord<'a> {
    id: UserId,
    label: &'a str,
    question_tag: Option<&'a str>,
    weight: u64,
}

impl<'a> From<&'a User> for NodeRecord<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: user.user_id,
            label: &user.display_name,
            question_tag: user.top_tag.as_deref(),
            weight: user.reputation,
        }
    }
}

#[derive(Debug, Serialize)]
struct EdgeRecord {
    source: UserId,
    target: UserId,
    kind: &'static str,
    weight: i64,
    ans_id: AnswerId,
}

impl From<&AnswerEdge> for EdgeRecord {
    fn from(edge: &AnswerEdge) -> Self {
        Self {
            source: edge.source,
            target: edge.target,
            kind: "Directed",
            weight: edge.score,
            ans_id: edge.answer_id,
        }
    }
}

pub fn write_nodes<W: io::Write>(wtr: &mut csv::Writer<W>, nodes: &[User]) -> csv::Result<()> {
    wtr.write_record(NODE_HEADERS)?;
    for node in nodes {
        wtr.serialize(NodeRecord::from(node))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_edges<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    edges: &[AnswerEdge],
) -> csv::Result<()> {
    wtr.write_record(EDGE_HEADERS)?;
    for edge in edges {
        wtr.serialize(EdgeRecord::from(edge))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `graph` nodes and edges to their own CSV files.
///
/// Both files are opened before anything is written, so a file that can't be
/// created leaves no table behind.
pub fn export_graph(
    graph: &Graph,
    nodes_file: &Path,
    edges_file: &Path,
    mode: FileMode,
    config: &CsvWriterConfig,
) -> anyhow::Result<()> {
    let mut nodes_wtr = open_csv(nodes_file, mode, config)?;
    let mut edges_wtr = match open_csv(edges_file, mode, config) {
        Ok(wtr) => wtr,
        Err(e) => {
            drop(nodes_wtr);
            if let Err(rm) = fs_err::remove_file(nodes_file) {
                log::warn!("Couldn't clean up after failed export: {rm}");
            }
            return Err(e.into());
        }
    };

    write_nodes(&mut nodes_wtr, &graph.nodes)
        .with_context(|| format!("Couldn't write nodes to {}", nodes_file.display()))?;
    log::info!(
        "Successfully wrote {} nodes to {}",
        graph.nodes.len(),
        nodes_file.display()
    );

    write_edges(&mut edges_wtr, &graph.edges)
        .with_context(|| format!("Couldn't write edges to {}", edges_file.display()))?;
    log::info!(
        "Successfully wrote {} edges to {}",
        graph.edges.len(),
        edges_file.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(f: impl FnOnce(&mut csv::Writer<Vec<u8>>) -> csv::Result<()>) -> String {
        let mut wtr = csv::WriterBuilder::from(&CsvWriterConfig::default()).from_writer(vec![]);
        f(&mut wtr).unwrap();
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn nodes_table() {
        let nodes = vec![
            User {
                user_id: UserId(4357115),
                display_name: "Doe, John".into(),
                reputation: 1234,
                top_tag: Some("c#".into()),
            },
            User {
                user_id: UserId(7),
                display_name: "lurker".into(),
                reputation: 1,
                top_tag: None,
            },
        ];

        let csv = to_string(|wtr| write_nodes(wtr, &nodes));
        assert_eq!(
            csv,
            "Id,Label,Question_Tag,Weight\r\n4357115,\"Doe, John\",c#,1234\r\n7,lurker,,1\r\n"
        );
    }

    #[test]
    fn edges_table() {
        let edges = vec![
            AnswerEdge {
                source: UserId(1),
                target: UserId(2),
                score: 10,
                answer_id: AnswerId(100),
            },
            AnswerEdge {
                source: UserId(1),
                target: UserId(2),
                score: -2,
                answer_id: AnswerId(101),
            },
        ];

        let csv = to_string(|wtr| write_edges(wtr, &edges));
        assert_eq!(
            csv,
            "Source,Target,Type,Weight,Ans_ID\r\n1,2,Directed,10,100\r\n1,2,Directed,-2,101\r\n"
        );
    }

    #[test]
    fn empty_tables_keep_headers() {
        assert_eq!(to_string(|wtr| write_nodes(wtr, &[])), "Id,Label,Question_Tag,Weight\r\n");
        assert_eq!(to_string(|wtr| write_edges(wtr, &[])), "Source,Target,Type,Weight,Ans_ID\r\n");
    }

    #[test]
    fn custom_delimiter() {
        let config: CsvWriterConfig =
            serde_yaml::from_str("delimiter: \"\\t\"\nterminator:\n  Any: \"\\n\"\n").unwrap();
        let mut wtr = csv::WriterBuilder::from(&config).from_writer(vec![]);
        write_edges(&mut wtr, &[]).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(out, "Source\tTarget\tType\tWeight\tAns_ID\n");
    }
}

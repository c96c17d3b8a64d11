use std::{collections::BTreeMap, fs::File, io::{BufReader, Read}, path::Path};

use anyhow::{Context, Result};
use gradgraph_array::NdArray;

use crate::{graph::Graph, session::FeedEntry};

/// Read named arrays from a JSON object such as
/// `{ "x": { "shape": [2, 2], "values": [1, 2, 3, 4] } }`.
pub fn read_feeds_json<R: Read>(reader: R) -> Result<Vec<(String, NdArray)>> {
    let named: BTreeMap<String, NdArray> =
        serde_json::from_reader(reader).context("malformed feed file")?;
    Ok(named.into_iter().collect())
}

pub fn load_feeds<P: AsRef<Path>>(path: P) -> Result<Vec<(String, NdArray)>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    read_feeds_json(BufReader::new(file)).with_context(|| format!("reading {}", path.display()))
}

/// Match named arrays to the graph's placeholders.
pub fn resolve_feeds(graph: &Graph, named: Vec<(String, NdArray)>) -> Result<Vec<FeedEntry>> {
    named
        .into_iter()
        .map(|(name, data)| {
            let tensor = graph.placeholder_by_name(&name)?;
            Ok(FeedEntry::new(tensor, data))
        })
        .collect()
}

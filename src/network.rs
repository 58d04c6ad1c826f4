// This file contains the code for the metmodels network and network-from-list subcommands, which
// turn exchange results into node and edge tables for graph drawing tools. Edges run from a
// producing taxon to a metabolite and from a metabolite to a consuming taxon.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::exchanges::{Direction, Exchange, find_exchange_file_for_prefix, find_exchange_files,
                       load_exchange_files, set_thread_count};
use crate::frame::Frame;
use crate::log::{section_header, explanation, warning};
use crate::lookup::{load_bin_lineages, load_health_status, load_metabolite_names,
                    phylum_from_lineage, strip_cat, translate};
use crate::misc::{check_if_dir_exists, check_if_file_exists, check_threads, format_float,
                  format_optional, load_file_lines, mean, quit_with_error};


// Metabolite nodes get these in place of group statistics so they draw as the largest nodes.
const METABOLITE_NODE_SIZE: f64 = 10.0;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeType {
    Mag,
    Metabolite,
}

impl NodeType {
    fn label(&self) -> &'static str {
        match self {
            NodeType::Mag        => "mag",
            NodeType::Metabolite => "metab",
        }
    }

    fn number(&self) -> usize {
        match self {
            NodeType::Mag        => 0,
            NodeType::Metabolite => 1,
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
struct Edge {
    source: String,
    target: String,
}

impl Edge {
    fn new(taxon: &str, metabolite: &str, direction: Direction) -> Edge {
        match direction {
            Direction::Export => Edge { source: taxon.to_string(), target: metabolite.to_string() },
            Direction::Import => Edge { source: metabolite.to_string(), target: taxon.to_string() },
        }
    }
}


fn unique_nodes<'a, I>(endpoints: I) -> Vec<(String, NodeType)>
        where I: Iterator<Item = (&'a str, NodeType)> {
    // Distinct endpoints in order of first appearance.
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for (node, node_type) in endpoints {
        if seen.insert(node.to_string()) {
            nodes.push((node.to_string(), node_type));
        }
    }
    nodes
}


fn endpoints(edge: &Edge, direction: Direction) -> [(&str, NodeType); 2] {
    let source_type = match direction {
        Direction::Export => NodeType::Mag,
        Direction::Import => NodeType::Metabolite,
    };
    let target_type = match direction {
        Direction::Export => NodeType::Metabolite,
        Direction::Import => NodeType::Mag,
    };
    [(edge.source.as_str(), source_type), (edge.target.as_str(), target_type)]
}


pub fn network(in_dir: PathBuf, metadata_file: PathBuf, classification_file: PathBuf,
               bigg_file: PathBuf, out_base: String, status: String, threads: usize) {
    check_if_dir_exists(&in_dir);
    check_if_file_exists(&metadata_file);
    check_if_file_exists(&classification_file);
    check_if_file_exists(&bigg_file);
    check_threads(threads);
    section_header("Starting metmodels network");
    explanation("This command collects the distinct exchange links between taxa and metabolites \
                 over all samples with the given health status, and writes them as node and \
                 edge tables. Taxon nodes are named by phylum and metabolite nodes by their \
                 full name.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --metadata {}", metadata_file.display());
    eprintln!("  --spp_classification {}", classification_file.display());
    eprintln!("  --bigg {}", bigg_file.display());
    eprintln!("  --output {}", out_base);
    eprintln!("  --status {}", status);
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let lineages = load_bin_lineages(&classification_file);
    let names = load_metabolite_names(&bigg_file);
    let statuses: HashMap<String, String> = load_health_status(&metadata_file).into_iter()
        .collect();
    let exchanges = load_exchange_files(&find_exchange_files(&in_dir));
    let links = distinct_links(&exchanges, &statuses, &status);
    if links.is_empty() {
        warning(&format!("no exchanges found for samples with status {}", status));
    }
    let out_nodes = PathBuf::from(format!("{}_nodes.csv", out_base));
    let out_edges = PathBuf::from(format!("{}_edges.csv", out_base));
    save_status_edges(&links, &status, &out_edges);
    save_status_nodes(&links, &lineages, &names, &out_nodes);
    section_header("Finished!");
    eprintln!("Edges: {}", out_edges.display());
    eprintln!("Nodes: {}", out_nodes.display());
    eprintln!();
}


#[derive(Clone, Debug, PartialEq)]
struct Link {
    edge: Edge,
    metabolite: String,
    direction: Direction,
}


fn distinct_links(exchanges: &[Exchange], statuses: &HashMap<String, String>, status: &str)
        -> Vec<Link> {
    // Producer links come first, then consumer links, each in order of first appearance.
    let mut seen = HashSet::new();
    let mut links: Vec<Link> = Vec::new();
    for e in exchanges.iter().filter(|e| !e.is_medium()) {
        let sample = strip_cat(&e.sample_id);
        if statuses.get(&sample).map(|s| s.as_str()) != Some(status) { continue; }
        let reaction = e.reaction.replacen("EX_", "", 1);
        let key = (e.taxon.clone(), reaction.clone(), e.metabolite.clone(), e.direction);
        if seen.insert(key) {
            links.push(Link { edge: Edge::new(&e.taxon, &reaction, e.direction),
                              metabolite: e.metabolite.clone(), direction: e.direction });
        }
    }
    let (mut producers, consumers): (Vec<Link>, Vec<Link>) = links.into_iter()
        .partition(|l| l.direction == Direction::Export);
    producers.extend(consumers);
    producers
}


fn save_status_edges(links: &[Link], status: &str, out_edges: &Path) {
    let mut frame = Frame::new(["source", "target", "metabolite", "direction", "HD"]
                               .iter().map(|h| h.to_string()).collect());
    for l in links {
        frame.rows.push(vec![l.edge.source.clone(), l.edge.target.clone(), l.metabolite.clone(),
                             l.direction.to_string(), status.to_string()]);
    }
    frame.save_csv(out_edges);
}


fn save_status_nodes(links: &[Link], lineages: &HashMap<String, String>,
                     names: &HashMap<String, String>, out_nodes: &Path) {
    let nodes = unique_nodes(links.iter().flat_map(|l| endpoints(&l.edge, l.direction)));
    let mut named: Vec<(String, NodeType, String)> = nodes.into_iter().map(|(node, node_type)| {
        let name = match node_type {
            NodeType::Metabolite => translate(&node, names, "metabolite names").to_string(),
            NodeType::Mag => phylum_from_lineage(translate(&node, lineages, "bin lineages")),
        };
        (node, node_type, name)
    }).collect();
    named.sort_by(|a, b| (a.1.number(), &a.2).cmp(&(b.1.number(), &b.2)));
    let mut frame = Frame::new(["node", "type", "type_numb", "name"]
                               .iter().map(|h| h.to_string()).collect());
    for (node, node_type, name) in named {
        frame.rows.push(vec![node, node_type.label().to_string(), node_type.number().to_string(),
                             name]);
    }
    frame.save_csv(out_nodes);
}


pub fn network_from_list(in_dir: PathBuf, samples_file: PathBuf, classification_file: PathBuf,
                         metabolite: Option<String>, out_nodes: PathBuf, out_edges: PathBuf,
                         threads: usize) {
    check_if_dir_exists(&in_dir);
    check_if_file_exists(&samples_file);
    check_if_file_exists(&classification_file);
    check_threads(threads);
    section_header("Starting metmodels network-from-list");
    explanation("This command summarises the exchanges of a chosen list of samples as node and \
                 edge tables. Each taxon appears as a producer node and/or a consumer node, \
                 carrying its mean abundance, mean flux, number of occurrences and summed \
                 abundance-weighted flux.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --samples {}", samples_file.display());
    eprintln!("  --spp_classification {}", classification_file.display());
    eprintln!("  --metabolite {}", metabolite.as_deref().unwrap_or("all"));
    eprintln!("  --out_nodes {}", out_nodes.display());
    eprintln!("  --out_edges {}", out_edges.display());
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let lineages = load_bin_lineages(&classification_file);
    let files = files_for_prefixes(&in_dir, &samples_file);
    if files.is_empty() {
        quit_with_error("none of the listed samples has an exchange file");
    }
    let exchanges: Vec<Exchange> = load_exchange_files(&files).into_iter()
        .filter(|e| match &metabolite { Some(m) => &e.metabolite == m, None => true })
        .filter(|e| !e.is_medium()).collect();
    let groups = group_exchanges(&exchanges);
    save_group_edges(&groups, &out_edges);
    save_group_nodes(&groups, &lineages, &out_nodes);
    section_header("Finished!");
    eprintln!("Edges: {}", out_edges.display());
    eprintln!("Nodes: {}", out_nodes.display());
    eprintln!();
}


fn files_for_prefixes(in_dir: &Path, samples_file: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for prefix in load_file_lines(samples_file) {
        let prefix = prefix.trim();
        if prefix.is_empty() { continue; }
        match find_exchange_file_for_prefix(in_dir, prefix) {
            Some(f) => files.push(f),
            None    => warning(&format!("sample {} not found, skipping", prefix)),
        }
    }
    files
}


#[derive(Clone, Debug, PartialEq)]
struct ExchangeGroup {
    taxon: String,
    metabolite: String,
    direction: Direction,
    rel_abundance_mean: Option<f64>,
    flux_mean: f64,
    occurrences: usize,
    flux_weighted_sum: f64,
}

impl ExchangeGroup {
    fn edge(&self) -> Edge {
        Edge::new(&self.role_node(), &self.metabolite, self.direction)
    }

    fn role(&self) -> &'static str {
        match self.direction {
            Direction::Export => "p",
            Direction::Import => "c",
        }
    }

    fn role_node(&self) -> String {
        format!("{}_{}", self.taxon, self.role())
    }
}


fn group_exchanges(exchanges: &[Exchange]) -> Vec<ExchangeGroup> {
    // Groups by (taxon, metabolite, direction). Producer groups come first, then consumer
    // groups, each sorted by taxon and metabolite.
    let mut grouped: BTreeMap<(Direction, String, String), Vec<&Exchange>> = BTreeMap::new();
    for e in exchanges {
        grouped.entry((e.direction, e.taxon.clone(), e.metabolite.clone())).or_default().push(e);
    }
    let mut groups = Vec::new();
    for direction in [Direction::Export, Direction::Import] {
        for ((_, taxon, metabolite), members) in grouped.iter()
                .filter(|((d, _, _), _)| *d == direction) {
            let abundances: Vec<f64> = members.iter().filter_map(|e| e.abundance).collect();
            let fluxes: Vec<f64> = members.iter().map(|e| e.flux).collect();
            let flux_weighted_sum = members.iter()
                .filter_map(|e| e.abundance.map(|a| e.flux.abs() * a)).sum();
            groups.push(ExchangeGroup { taxon: taxon.clone(), metabolite: metabolite.clone(),
                                        direction, rel_abundance_mean: mean(&abundances),
                                        flux_mean: mean(&fluxes).unwrap_or(0.0),
                                        occurrences: members.len(), flux_weighted_sum });
        }
    }
    groups
}


fn save_group_edges(groups: &[ExchangeGroup], out_edges: &Path) {
    let mut frame = Frame::new(["source", "target", "direction", "rel_abundance_mean",
                                "flux_mean", "occurrences", "flux_weighted_sum"]
                               .iter().map(|h| h.to_string()).collect());
    for g in groups {
        let edge = g.edge();
        frame.rows.push(vec![edge.source, edge.target, g.direction.to_string(),
                             format_optional(g.rel_abundance_mean), format_float(g.flux_mean),
                             g.occurrences.to_string(), format_float(g.flux_weighted_sum)]);
    }
    frame.save_csv(out_edges);
}


fn save_group_nodes(groups: &[ExchangeGroup], lineages: &HashMap<String, String>,
                    out_nodes: &Path) {
    // A taxon's role node takes the statistics of its last group, which is its only group when
    // the exchanges were filtered to one metabolite.
    let stats: HashMap<String, &ExchangeGroup> = groups.iter().map(|g| (g.role_node(), g))
        .collect();
    let edges: Vec<(Edge, Direction)> = groups.iter().map(|g| (g.edge(), g.direction)).collect();
    let nodes = unique_nodes(edges.iter().flat_map(|(e, d)| endpoints(e, *d)));
    let mut frame = Frame::new(["node", "type", "type_numb", "lineage", "prod_cons",
                                "rel_abundance_mean", "flux_mean", "occurrences",
                                "flux_weighted_sum"].iter().map(|h| h.to_string()).collect());
    let size = format_float(METABOLITE_NODE_SIZE);
    for (node, node_type) in nodes {
        let mut row = vec![node.clone(), node_type.label().to_string(),
                           node_type.number().to_string()];
        match node_type {
            NodeType::Metabolite => {
                row.extend(["metab".to_string(), "metab".to_string()]);
                row.extend(vec![size.clone(); 4]);
            }
            NodeType::Mag => {
                let g = stats[&node];
                row.push(translate(&g.taxon, lineages, "bin lineages").to_string());
                row.push(g.role().to_string());
                row.extend([format_optional(g.rel_abundance_mean), format_float(g.flux_mean),
                            g.occurrences.to_string(), format_float(g.flux_weighted_sum)]);
            }
        }
        frame.rows.push(row);
    }
    frame.save_csv(out_nodes);
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::{make_exchange_dir, make_test_file};

    fn make_classification(dir: &Path) -> PathBuf {
        let path = dir.join("spp_classification.tsv");
        make_test_file(&path, "b1\td__Bacteria;p__Bacteroidota;c__Bacteroidia\n\
                               b2\td__Bacteria;p__Firmicutes_A;c__Clostridia\n\
                               b3\td__Bacteria;p__Actinobacteriota;c__Coriobacteriia\n");
        path
    }

    #[test]
    fn test_network() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let classification = make_classification(dir.path());
        let bigg = dir.path().join("bigg.tsv");
        make_test_file(&bigg, "bigg_id\tname\nac_e\tAcetate\nh2s_e\tHydrogen sulfide\n\
                               but_e\tButyrate\n");
        let metadata = dir.path().join("metadata.csv");
        make_test_file(&metadata, "Sample,HD\nS1,healthy\nS2,healthy\nS3,diseased\n");
        let out_base = dir.path().join("healthy").display().to_string();
        network(in_dir, metadata, classification, bigg, out_base.clone(),
                "healthy".to_string(), 1);
        assert_eq!(std::fs::read_to_string(format!("{}_edges.csv", out_base)).unwrap(),
                   "source,target,metabolite,direction,HD\n\
                    b1,ac_e,ac_e,export,healthy\n\
                    ac_e,b2,ac_e,import,healthy\n\
                    h2s_e,b1,h2s_e,import,healthy\n");
        assert_eq!(std::fs::read_to_string(format!("{}_nodes.csv", out_base)).unwrap(),
                   "node,type,type_numb,name\n\
                    b1,mag,0,Bacteroidota\n\
                    b2,mag,0,Firmicutes_A\n\
                    ac_e,metab,1,Acetate\n\
                    h2s_e,metab,1,Hydrogen sulfide\n");
    }

    #[test]
    fn test_network_from_list() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let classification = make_classification(dir.path());
        let samples = dir.path().join("samples.txt");
        make_test_file(&samples, "S1\nS2\nS7\n");
        let out_nodes = dir.path().join("nodes.csv");
        let out_edges = dir.path().join("edges.csv");
        network_from_list(in_dir, samples, classification, Some("ac_e".to_string()),
                          out_nodes.clone(), out_edges.clone(), 1);
        assert_eq!(std::fs::read_to_string(&out_edges).unwrap(),
                   "source,target,direction,rel_abundance_mean,flux_mean,occurrences,\
                    flux_weighted_sum\n\
                    b1_p,ac_e,export,0.55,2.25,2,2.5\n\
                    ac_e,b2_c,import,0.45,-1.25,2,1.15\n");
        assert_eq!(std::fs::read_to_string(&out_nodes).unwrap(),
                   "node,type,type_numb,lineage,prod_cons,rel_abundance_mean,flux_mean,\
                    occurrences,flux_weighted_sum\n\
                    b1_p,mag,0,d__Bacteria;p__Bacteroidota;c__Bacteroidia,p,0.55,2.25,2,2.5\n\
                    ac_e,metab,1,metab,metab,10,10,10,10\n\
                    b2_c,mag,0,d__Bacteria;p__Firmicutes_A;c__Clostridia,c,0.45,-1.25,2,1.15\n");
    }

    #[test]
    fn test_group_exchanges_keeps_medium_out() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let exchanges: Vec<Exchange> = load_exchange_files(&find_exchange_files(&in_dir))
            .into_iter().filter(|e| !e.is_medium()).collect();
        let groups = group_exchanges(&exchanges);
        assert_eq!(groups.iter().filter(|g| g.direction == Direction::Export).count(), 2);
        assert_eq!(groups.iter().filter(|g| g.direction == Direction::Import).count(), 2);
        assert!(groups.iter().all(|g| g.taxon != "medium"));
    }

    #[test]
    fn test_edge_direction() {
        let export = Edge::new("b1", "ac_e", Direction::Export);
        assert_eq!((export.source.as_str(), export.target.as_str()), ("b1", "ac_e"));
        let import = Edge::new("b1", "ac_e", Direction::Import);
        assert_eq!((import.source.as_str(), import.target.as_str()), ("ac_e", "b1"));
    }
}

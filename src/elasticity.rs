// This file contains the code for the metmodels elasticity subcommand, which merges per-sample
// elasticity results into one table. Elasticities say how much an exchange flux changes when an
// effector (a taxon's abundance or a medium component) changes.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::frame::{cell, Aggregate, Frame, Matrix};
use crate::log::{section_header, explanation};
use crate::lookup::load_bin_to_taxonomy;
use crate::misc::{check_if_dir_exists, check_if_file_exists, file_name, find_files,
                  parse_number, quit_with_error, sample_name_field};


#[derive(Clone, Debug, PartialEq)]
enum Summary {
    ByReaction { bigg_file: PathBuf },
    ByEffector { lineages_file: PathBuf },
}


const ELASTICITY_FIELDS: [&str; 6] = ["reaction", "taxon", "effector", "direction", "elasticity",
                                      "type"];


#[derive(Clone, Debug, PartialEq)]
struct Elasticity {
    reaction: String,
    effector: String,
    direction: String,
    value: f64,
    kind: String,
}


pub fn elasticity(in_dir: PathBuf, out_file: PathBuf, bigg_file: Option<PathBuf>,
                  lineages_file: Option<PathBuf>, name_field: usize) {
    let summary = check_settings(&in_dir, bigg_file, lineages_file);
    starting_message(&summary);
    print_settings(&in_dir, &out_file, &summary, name_field);
    let files = find_files(&in_dir, "", ".csv");
    if files.is_empty() {
        quit_with_error(&format!("no .csv files found in {}", in_dir.display()));
    }
    let triples = files.iter().flat_map(|f| {
        let sample = sample_name_field(f, name_field);
        let elasticities = load_elasticities(f);
        eprintln!("  {}: {} ({} elasticities)", sample, file_name(f), elasticities.len());
        summarise_sample(elasticities, &summary).into_iter()
            .map(move |(key, value)| (key, sample.clone(), value))
    });
    let matrix = match &summary {
        Summary::ByReaction { .. } => Matrix::pivot("reaction", triples, Aggregate::Sum),
        Summary::ByEffector { .. } => Matrix::pivot("effector", triples, Aggregate::Sum),
    };
    let annotation = annotate(&matrix, &summary);
    let column_name = match &summary {
        Summary::ByReaction { .. } => "met_name",
        Summary::ByEffector { .. } => "lineage",
    };
    matrix.save_with_extra_column(&out_file, Some((column_name, &annotation)));
    section_header("Finished!");
    eprintln!("{} rows for {} samples: {}", matrix.row_count(), matrix.col_count(),
              out_file.display());
    eprintln!();
}


fn check_settings(in_dir: &Path, bigg_file: Option<PathBuf>, lineages_file: Option<PathBuf>)
        -> Summary {
    check_if_dir_exists(in_dir);
    match (bigg_file, lineages_file) {
        (Some(bigg_file), None) => {
            check_if_file_exists(&bigg_file);
            Summary::ByReaction { bigg_file }
        }
        (None, Some(lineages_file)) => {
            check_if_file_exists(&lineages_file);
            Summary::ByEffector { lineages_file }
        }
        _ => quit_with_error("exactly one of --bigg and --lineages is required"),
    }
}


fn starting_message(summary: &Summary) {
    section_header("Starting metmodels elasticity");
    match summary {
        Summary::ByReaction { .. } => explanation("This command sums each sample's elasticities \
            per exchange reaction, giving one row per reaction and one column per sample, \
            annotated with metabolite names."),
        Summary::ByEffector { .. } => explanation("This command sums each sample's forward \
            abundance elasticities per effector taxon, giving one row per taxon and one column \
            per sample, annotated with lineages."),
    }
}


fn print_settings(in_dir: &Path, out_file: &Path, summary: &Summary, name_field: usize) {
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --out_file {}", out_file.display());
    match summary {
        Summary::ByReaction { bigg_file } => eprintln!("  --bigg {}", bigg_file.display()),
        Summary::ByEffector { lineages_file } => {
            eprintln!("  --lineages {}", lineages_file.display())
        }
    }
    eprintln!("  --name_field {}", name_field);
    eprintln!();
}


fn load_elasticities(filename: &Path) -> Vec<Elasticity> {
    // Files may have a header and may start with an unnamed index column. Without a header the
    // fields are read by position.
    let mut frame = Frame::load(filename, b',', false);
    let Some(first) = frame.rows.first() else { return Vec::new() };
    let offset = if first.len() > ELASTICITY_FIELDS.len() { 1 } else { 0 };
    let has_header = parse_number(cell(first, offset + 4)).is_none();
    frame.header = if has_header {
        frame.rows.remove(0).iter().map(|h| h.trim().to_string()).collect()
    } else {
        let mut header = vec![String::new(); offset];
        header.extend(ELASTICITY_FIELDS.iter().map(|f| f.to_string()));
        header
    };
    let reaction_col = frame.column("reaction", filename);
    let effector_col = frame.column("effector", filename);
    let direction_col = frame.column("direction", filename);
    let value_col = frame.column("elasticity", filename);
    let type_col = frame.column("type", filename);
    frame.rows.iter().map(|row| {
        let value = parse_number(cell(row, value_col)).unwrap_or_else(|| {
            quit_with_error(&format!("bad elasticity in {}: {}", file_name(filename),
                                     cell(row, value_col)));
        });
        Elasticity { reaction: cell(row, reaction_col).to_string(),
                     effector: cell(row, effector_col).to_string(),
                     direction: cell(row, direction_col).to_string(), value,
                     kind: cell(row, type_col).to_string() }
    }).collect()
}


fn summarise_sample(elasticities: Vec<Elasticity>, summary: &Summary) -> Vec<(String, f64)> {
    // Returns (row key, elasticity) pairs, to be summed per key.
    match summary {
        Summary::ByReaction { .. } => {
            elasticities.into_iter().map(|e| (e.reaction, e.value)).collect()
        }
        Summary::ByEffector { .. } => {
            elasticities.into_iter().filter(|e| e.kind == "abundance" && e.direction == "forward")
                .map(|e| (e.effector, e.value)).collect()
        }
    }
}


fn annotate(matrix: &Matrix, summary: &Summary) -> Vec<String> {
    let names = match summary {
        Summary::ByReaction { bigg_file } => load_exchange_names(bigg_file),
        Summary::ByEffector { lineages_file } => load_bin_to_taxonomy(lineages_file),
    };
    matrix.row_names.iter().map(|r| names.get(r).cloned().unwrap_or_default()).collect()
}


fn load_exchange_names(bigg_file: &Path) -> HashMap<String, String> {
    // Both the taxon exchange (EX_ac_e) and the medium exchange (EX_ac_e_m) get the name.
    let bigg = Frame::load_tsv(bigg_file, true);
    let mut names = HashMap::new();
    for row in &bigg.rows {
        let exchange = format!("EX_{}", cell(row, 0));
        names.insert(format!("{}_m", exchange), cell(row, 1).to_string());
        names.insert(exchange, cell(row, 1).to_string());
    }
    names
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::make_test_file;

    fn make_elasticity_dir(dir: &Path) -> PathBuf {
        let in_dir = dir.join("elasticities");
        make_test_file(&in_dir.join("elasticities_S2.csv"),
                       ",reaction,taxon,effector,direction,elasticity,type\n\
                        0,EX_ac_e,b1,b2,forward,0.5,abundance\n\
                        1,EX_ac_e,b1,b2,reverse,0.25,abundance\n\
                        2,EX_ac_e_m,medium,EX_glc_m,forward,-1,flux\n");
        make_test_file(&in_dir.join("elasticities_S1.csv"),
                       ",reaction,taxon,effector,direction,elasticity,type\n\
                        0,EX_h2s_e,b2,b1,forward,2,abundance\n\
                        1,EX_ac_e,b2,b1,forward,1,abundance\n");
        in_dir
    }

    #[test]
    fn test_elasticity_by_reaction() {
        let dir = tempdir().unwrap();
        let in_dir = make_elasticity_dir(dir.path());
        let bigg = dir.path().join("bigg.tsv");
        make_test_file(&bigg, "bigg_id\tname\nac_e\tAcetate\nh2s_e\tHydrogen sulfide\n");
        let out_file = dir.path().join("elasticity_all_samples.csv");
        elasticity(in_dir, out_file.clone(), Some(bigg), None, 1);
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "reaction,S1,S2,met_name\n\
                    EX_ac_e,1,0.75,Acetate\n\
                    EX_ac_e_m,0,-1,Acetate\n\
                    EX_h2s_e,2,0,Hydrogen sulfide\n");
    }

    #[test]
    fn test_elasticity_by_effector() {
        let dir = tempdir().unwrap();
        let in_dir = make_elasticity_dir(dir.path());
        let lineages = dir.path().join("HQ_bins.csv");
        make_test_file(&lineages, "binID,classification\nb1,Bacteroides dorei\nb2,Alistipes sp\n");
        let out_file = dir.path().join("elasticity_by_effector.csv");
        elasticity(in_dir, out_file.clone(), None, Some(lineages), 1);
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "effector,S1,S2,lineage\n\
                    b1,3,0,Bacteroides dorei\n\
                    b2,0,0.5,Alistipes sp\n");
    }

    #[test]
    fn test_load_elasticities_headerless() {
        let dir = tempdir().unwrap();
        let with_index = dir.path().join("elasticities_S1.csv");
        make_test_file(&with_index, "0,EX_ac_e,b1,b2,forward,0.5,abundance\n\
                                     1,EX_h2s_e,b2,b1,reverse,-2,abundance\n");
        let without_index = dir.path().join("elasticities_S2.csv");
        make_test_file(&without_index, "EX_ac_e,b1,b2,forward,0.5,abundance\n\
                                        EX_h2s_e,b2,b1,reverse,-2,abundance\n");
        let expected = vec![Elasticity { reaction: "EX_ac_e".to_string(),
                                         effector: "b2".to_string(),
                                         direction: "forward".to_string(), value: 0.5,
                                         kind: "abundance".to_string() },
                            Elasticity { reaction: "EX_h2s_e".to_string(),
                                         effector: "b1".to_string(),
                                         direction: "reverse".to_string(), value: -2.0,
                                         kind: "abundance".to_string() }];
        assert_eq!(load_elasticities(&with_index), expected);
        assert_eq!(load_elasticities(&without_index), expected);
    }

    #[test]
    fn test_elasticity_headerless_by_effector() {
        let dir = tempdir().unwrap();
        let in_dir = dir.path().join("elasticities");
        make_test_file(&in_dir.join("elasticities_S1.csv"),
                       "0,EX_ac_e,b1,b2,forward,0.5,abundance\n\
                        1,EX_ac_e,b2,b1,forward,1,abundance\n\
                        2,EX_ac_e,b2,b1,reverse,4,abundance\n");
        let lineages = dir.path().join("HQ_bins.csv");
        make_test_file(&lineages, "binID,classification\nb1,Bacteroides dorei\nb2,Alistipes sp\n");
        let out_file = dir.path().join("elasticity_by_effector.csv");
        elasticity(in_dir, out_file.clone(), None, Some(lineages), 1);
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "effector,S1,lineage\nb1,1,Bacteroides dorei\nb2,0.5,Alistipes sp\n");
    }

    #[test]
    fn test_elasticity_needs_one_annotation() {
        let dir = tempdir().unwrap();
        let in_dir = make_elasticity_dir(dir.path());
        let out_file = dir.path().join("out.csv");
        assert!(std::panic::catch_unwind(|| {
            elasticity(in_dir, out_file, None, None, 1);
        }).is_err());
    }
}

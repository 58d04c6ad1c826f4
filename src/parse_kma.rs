// This file contains the code for the metmodels parse-kma subcommand, which merges per-sample
// read-mapping results (KMA .res files against a bin database) into one abundance table.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::abundance::AbundanceTable;
use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_dir_exists, file_name, find_files, format_float, parse_number,
                  quit_with_error};


// Depth summed over a bin's contigs, plus the first taxonomy seen for that bin.
type SampleDepths = BTreeMap<String, (f64, String)>;


pub fn parse_kma(in_dir: PathBuf, out_file: PathBuf) {
    check_settings(&in_dir);
    starting_message();
    print_settings(&in_dir, &out_file);
    let res_files = find_files(&in_dir, "", ".res");
    if res_files.is_empty() {
        quit_with_error(&format!("no .res files found in {}", in_dir.display()));
    }
    let mut samples = BTreeMap::new();
    for res_file in &res_files {
        let sample = sample_name(res_file);
        let depths = load_res_file(res_file);
        save_sample_summary(&summary_path(res_file), &sample, &depths);
        eprintln!("  {}: {} bins", sample, depths.len());
        if samples.insert(sample.clone(), depths).is_some() {
            quit_with_error(&format!("sample {} appears in more than one .res file", sample));
        }
    }
    eprintln!();
    let merged = merge_samples(&samples);
    merged.save(&out_file);
    finished_message(&out_file, merged.row_ids.len(), merged.samples.len());
}


fn check_settings(in_dir: &Path) {
    check_if_dir_exists(in_dir);
}


fn starting_message() {
    section_header("Starting metmodels parse-kma");
    explanation("This command merges KMA read-mapping results (one .res file per sample) into a \
                 single table of bin depths, with one column per sample.");
}


fn print_settings(in_dir: &Path, out_file: &Path) {
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
}


fn sample_name(res_file: &Path) -> String {
    let name = file_name(res_file);
    match name.split_once("_mags.res") {
        Some((sample, _)) => sample.to_string(),
        None              => name.trim_end_matches(".res").to_string(),
    }
}


fn summary_path(res_file: &Path) -> PathBuf {
    let mut name = res_file.as_os_str().to_owned();
    name.push(".summary.csv");
    PathBuf::from(name)
}


fn load_res_file(res_file: &Path) -> SampleDepths {
    let frame = Frame::load_tsv(res_file, true);
    let template_col = frame.column("#Template", res_file);
    let depth_col = frame.column("Depth", res_file);
    let mut depths = SampleDepths::new();
    for row in &frame.rows {
        let (bin_id, taxonomy) = split_template(cell(row, template_col));
        let depth = parse_number(cell(row, depth_col)).unwrap_or_else(|| {
            quit_with_error(&format!("bad depth in {}: {}", res_file.display(),
                                     cell(row, depth_col)));
        });
        let entry = depths.entry(bin_id).or_insert((0.0, taxonomy));
        entry.0 += depth;
    }
    depths
}


fn split_template(template: &str) -> (String, String) {
    // Templates look like bin|contig|taxonomy.
    let mut parts = template.splitn(3, '|');
    let bin_id = parts.next().unwrap_or_default().trim().to_string();
    let _contig_id = parts.next();
    let taxonomy = parts.next().unwrap_or_default().trim().to_string();
    (bin_id, taxonomy)
}


fn save_sample_summary(filename: &Path, sample: &str, depths: &SampleDepths) {
    let mut frame = Frame::new(vec!["BinID".to_string(), sample.to_string(),
                                    "Taxonomy".to_string()]);
    for (bin_id, (depth, taxonomy)) in depths {
        frame.rows.push(vec![bin_id.clone(), format_float(*depth), taxonomy.clone()]);
    }
    frame.save_csv(filename);
}


fn merge_samples(samples: &BTreeMap<String, SampleDepths>) -> AbundanceTable {
    // Bins and samples come out sorted. A bin's taxonomy is the first non-empty one found when
    // going through samples in order.
    let bin_ids: Vec<String> = samples.values().flat_map(|d| d.keys().cloned())
        .collect::<BTreeSet<_>>().into_iter().collect();
    let sample_names: Vec<String> = samples.keys().cloned().collect();
    let mut values = Vec::with_capacity(bin_ids.len());
    let mut taxonomy = Vec::with_capacity(bin_ids.len());
    for bin_id in &bin_ids {
        values.push(samples.values()
            .map(|d| d.get(bin_id).map(|(depth, _)| *depth).unwrap_or(0.0)).collect());
        taxonomy.push(samples.values().filter_map(|d| d.get(bin_id))
            .map(|(_, t)| t.clone()).find(|t| !t.is_empty()).unwrap_or_default());
    }
    AbundanceTable { index_name: "BinID".to_string(), row_ids: bin_ids, samples: sample_names,
                     values, taxonomy: Some(taxonomy) }
}


fn finished_message(out_file: &Path, bin_count: usize, sample_count: usize) {
    section_header("Finished!");
    eprintln!("Merged {} bins across {} samples", bin_count, sample_count);
    eprintln!("Abundance table: {}", out_file.display());
    eprintln!();
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::make_test_file;

    const RES_HEADER: &str = "#Template\tScore\tExpected\tTemplate_length\tTemplate_Identity\t\
                              Template_Coverage\tQuery_Identity\tQuery_Coverage\tDepth\tq_value\t\
                              p_value\n";

    #[test]
    fn test_sample_name() {
        assert_eq!(sample_name(Path::new("dir/ERR1_mags.res")), "ERR1");
        assert_eq!(sample_name(Path::new("dir/ERR2.res")), "ERR2");
    }

    #[test]
    fn test_split_template() {
        assert_eq!(split_template("S1C1|S1C1_12|Bacteroides dorei"),
                   ("S1C1".to_string(), "Bacteroides dorei".to_string()));
        assert_eq!(split_template("S1C1"), ("S1C1".to_string(), String::new()));
    }

    #[test]
    fn test_parse_kma() {
        let dir = tempdir().unwrap();
        let in_dir = dir.path().join("kma");
        make_test_file(&in_dir.join("S2_mags.res"),
                       &format!("{}b2|c1|Alistipes\t1\t1\t1\t1\t1\t1\t1\t4.0\t1\t1\n", RES_HEADER));
        make_test_file(&in_dir.join("S1_mags.res"),
                       &format!("{}b1|c1|Bacteroides dorei\t1\t1\t1\t1\t1\t1\t1\t2.5\t1\t1\n\
                                  b1|c2|Bacteroides dorei\t1\t1\t1\t1\t1\t1\t1\t1.5\t1\t1\n\
                                  b2|c3|Alistipes\t1\t1\t1\t1\t1\t1\t1\t1\t1\t1\n", RES_HEADER));
        let out_file = dir.path().join("merged.csv");
        parse_kma(in_dir.clone(), out_file.clone());
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "BinID,S1,S2,Taxonomy\nb1,4,0,Bacteroides dorei\nb2,1,4,Alistipes\n");
        assert_eq!(std::fs::read_to_string(in_dir.join("S1_mags.res.summary.csv")).unwrap(),
                   "BinID,S1,Taxonomy\nb1,4,Bacteroides dorei\nb2,1,Alistipes\n");
    }

    #[test]
    fn test_parse_kma_empty_dir() {
        let dir = tempdir().unwrap();
        let out_file = dir.path().join("merged.csv");
        let in_dir = dir.path().to_path_buf();
        assert!(std::panic::catch_unwind(|| { parse_kma(in_dir, out_file); }).is_err());
    }
}

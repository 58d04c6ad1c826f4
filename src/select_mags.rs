// This file contains the code for the metmodels select-mags subcommand, which picks the most
// complete genome bin for each species-level classification.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::path::PathBuf;

use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_file_exists, format_optional, load_file_lines, parse_number,
                  quit_with_error};


pub fn select_mags(gtdb_file: PathBuf, checkm_file: PathBuf, out_all: PathBuf,
                   out_best: PathBuf) {
    check_settings(&gtdb_file, &checkm_file);
    starting_message();
    print_settings(&gtdb_file, &checkm_file, &out_all, &out_best);
    let mut bins = Frame::load_tsv(&gtdb_file, true);
    let completeness = load_checkm_completeness(&checkm_file);
    add_completeness_column(&mut bins, &completeness, &gtdb_file);
    bins.save_csv(&out_all);
    let best = best_bin_per_classification(&bins, &gtdb_file);
    best.save_csv(&out_best);
    finished_message(&out_all, &out_best, bins.rows.len(), best.rows.len());
}


fn check_settings(gtdb_file: &Path, checkm_file: &Path) {
    check_if_file_exists(gtdb_file);
    check_if_file_exists(checkm_file);
}


fn starting_message() {
    section_header("Starting metmodels select-mags");
    explanation("This command adds CheckM completeness to the GTDB classification of each bin and \
                 then keeps the most complete bin for each classification.");
}


fn print_settings(gtdb_file: &Path, checkm_file: &Path, out_all: &Path, out_best: &Path) {
    eprintln!("Settings:");
    eprintln!("  --gtdb {}", gtdb_file.display());
    eprintln!("  --checkm {}", checkm_file.display());
    eprintln!("  --out_all {}", out_all.display());
    eprintln!("  --out_best {}", out_best.display());
    eprintln!();
}


fn load_checkm_completeness(checkm_file: &Path) -> Vec<(String, f64)> {
    // CheckM results are whitespace-separated: bin in field 0, completeness in field 12. Lines
    // without a numeric completeness (e.g. a header) are skipped.
    let mut completeness = Vec::new();
    for line in load_file_lines(checkm_file) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 13 { continue; }
        if let Some(c) = parse_number(fields[12]) {
            completeness.push((fields[0].to_string(), c));
        }
    }
    completeness
}


fn add_completeness_column(bins: &mut Frame, completeness: &[(String, f64)], gtdb_file: &Path) {
    // A bin listed more than once takes its last completeness. Bins only found in the CheckM
    // results are appended with an empty classification.
    let bin_col = bins.column("binID", gtdb_file);
    let by_bin: HashMap<&str, f64> = completeness.iter().map(|(b, c)| (b.as_str(), *c)).collect();
    let mut known: HashSet<String> = bins.rows.iter().map(|r| cell(r, bin_col).to_string())
        .collect();
    let width = bins.header.len();
    bins.header.push("Completeness".to_string());
    for row in bins.rows.iter_mut() {
        row.truncate(width);
        while row.len() < width { row.push(String::new()); }
        let value = by_bin.get(cell(row, bin_col)).copied();
        row.push(format_optional(value));
    }
    for (bin, _) in completeness {
        if !known.insert(bin.clone()) { continue; }
        let mut row = vec![String::new(); width];
        row[bin_col] = bin.clone();
        row.push(format_optional(by_bin.get(bin.as_str()).copied()));
        bins.rows.push(row);
    }
}


fn best_bin_per_classification(bins: &Frame, gtdb_file: &Path) -> Frame {
    // Sorts by decreasing completeness (missing values last, ties in input order) and then keeps
    // the first bin for each classification.
    let class_col = bins.column("classification", gtdb_file);
    let completeness_col = bins.header.len() - 1;
    let mut order: Vec<(usize, Option<f64>)> = bins.rows.iter().enumerate()
        .map(|(i, row)| (i, parse_number(cell(row, completeness_col)))).collect();
    order.sort_by(|(i_a, c_a), (i_b, c_b)| {
        match (c_a, c_b) {
            (Some(a), Some(b)) => b.total_cmp(a).then(i_a.cmp(i_b)),
            (Some(_), None)    => std::cmp::Ordering::Less,
            (None, Some(_))    => std::cmp::Ordering::Greater,
            (None, None)       => i_a.cmp(i_b),
        }
    });
    let mut seen = HashSet::new();
    let mut best = Frame::new(bins.header.clone());
    for (i, _) in order {
        let row = &bins.rows[i];
        if seen.insert(cell(row, class_col).to_string()) {
            best.rows.push(row.clone());
        }
    }
    if best.rows.is_empty() {
        quit_with_error(&format!("no bins found in {}", gtdb_file.display()));
    }
    best
}


fn finished_message(out_all: &Path, out_best: &Path, all_count: usize, best_count: usize) {
    section_header("Finished!");
    eprintln!("All bins ({}): {}", all_count, out_all.display());
    eprintln!("Best bin per classification ({}): {}", best_count, out_best.display());
    eprintln!();
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::make_test_file;

    fn checkm_line(bin: &str, completeness: &str) -> String {
        format!("{} k__Bacteria (UID1) 100 50 30 0 1 2 3 4 5 {} 1.2 0.0\n", bin, completeness)
    }

    #[test]
    fn test_select_mags() {
        let dir = tempdir().unwrap();
        let gtdb = dir.path().join("gtdb.tsv");
        let checkm = dir.path().join("checkm.tsv");
        make_test_file(&gtdb, "binID\tclassification\n\
                               b1\tBacteroides dorei\n\
                               b2\tBacteroides dorei\n\
                               b3\tAlistipes\n\
                               b4\tAlistipes\n\
                               b5\tAkkermansia\n");
        make_test_file(&checkm, &format!("{}{}{}{}", checkm_line("b1", "91.5"),
                                         checkm_line("b2", "98.0"), checkm_line("b3", "95"),
                                         checkm_line("b4", "95")));
        let out_all = dir.path().join("all_bins_with_compl.csv");
        let out_best = dir.path().join("HQ_bins_with_compl.csv");
        select_mags(gtdb, checkm, out_all.clone(), out_best.clone());
        assert_eq!(std::fs::read_to_string(&out_all).unwrap(),
                   "binID,classification,Completeness\n\
                    b1,Bacteroides dorei,91.5\n\
                    b2,Bacteroides dorei,98\n\
                    b3,Alistipes,95\n\
                    b4,Alistipes,95\n\
                    b5,Akkermansia,\n");
        assert_eq!(std::fs::read_to_string(&out_best).unwrap(),
                   "binID,classification,Completeness\n\
                    b2,Bacteroides dorei,98\n\
                    b3,Alistipes,95\n\
                    b5,Akkermansia,\n");
    }

    #[test]
    fn test_select_mags_checkm_only_bins() {
        // Bins missing from the GTDB table are still reported, sharing one empty classification.
        let dir = tempdir().unwrap();
        let gtdb = dir.path().join("gtdb.tsv");
        let checkm = dir.path().join("checkm.tsv");
        make_test_file(&gtdb, "binID\tclassification\nb1\tBacteroides dorei\n");
        make_test_file(&checkm, &format!("{}{}{}{}", checkm_line("b1", "91.5"),
                                         checkm_line("b7", "80"), checkm_line("b8", "99"),
                                         checkm_line("b7", "85")));
        let out_all = dir.path().join("all_bins_with_compl.csv");
        let out_best = dir.path().join("HQ_bins_with_compl.csv");
        select_mags(gtdb, checkm, out_all.clone(), out_best.clone());
        assert_eq!(std::fs::read_to_string(&out_all).unwrap(),
                   "binID,classification,Completeness\n\
                    b1,Bacteroides dorei,91.5\n\
                    b7,,85\n\
                    b8,,99\n");
        assert_eq!(std::fs::read_to_string(&out_best).unwrap(),
                   "binID,classification,Completeness\n\
                    b8,,99\n\
                    b1,Bacteroides dorei,91.5\n");
    }
}

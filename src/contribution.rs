// This file contains the code for the metmodels contribution subcommand, which shows how much
// each taxon contributes to the production or consumption of one metabolite across samples.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::frame::{cell, Aggregate, Frame, Matrix};
use crate::log::{section_header, explanation, warning};
use crate::lookup::load_bin_to_taxonomy;
use crate::merge_fluxes::COMPARTMENT;
use crate::misc::{check_if_dir_exists, check_if_file_exists, file_name, find_files,
                  parse_number, quit_with_error, sample_name_field};


pub fn contribution(in_dir: PathBuf, metabolite: String, lineages_file: PathBuf,
                    out_file: PathBuf, name_field: usize) {
    check_if_dir_exists(&in_dir);
    check_if_file_exists(&lineages_file);
    section_header("Starting metmodels contribution");
    explanation("This command collects one exchange reaction's flux for every taxon in every \
                 sample. Taxa with no flux in any sample are dropped and the rest are sorted by \
                 their net production (negative values are net consumption).");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --metabolite {}", metabolite);
    eprintln!("  --lineages {}", lineages_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!("  --name_field {}", name_field);
    eprintln!();
    let files = find_files(&in_dir, "", ".csv");
    if files.is_empty() {
        quit_with_error(&format!("no .csv files found in {}", in_dir.display()));
    }
    let mut triples = Vec::new();
    for f in &files {
        let sample = sample_name_field(f, name_field);
        triples.extend(metabolite_fluxes(f, &metabolite).into_iter()
                           .map(|(taxon, flux)| (taxon, sample.clone(), flux)));
    }
    let matrix = contribution_matrix(triples);
    let taxonomy = load_bin_to_taxonomy(&lineages_file);
    let lineages: Vec<String> = matrix.row_names.iter()
        .map(|taxon| taxonomy.get(taxon).cloned().unwrap_or_default()).collect();
    matrix.save_with_extra_column(&out_file, Some(("lineage", &lineages)));
    section_header("Finished!");
    eprintln!("{} taxa exchange {}: {}", matrix.row_count(), metabolite, out_file.display());
    eprintln!();
}


fn metabolite_fluxes(filename: &Path, metabolite: &str) -> Vec<(String, f64)> {
    // A file without the reaction has no flux for it (zero columns are dropped upstream).
    let frame = Frame::load_csv(filename);
    let Some(flux_col) = frame.find_column(metabolite) else {
        warning(&format!("{} has no {} column", file_name(filename), metabolite));
        return Vec::new();
    };
    let taxon_col = frame.find_column(COMPARTMENT).unwrap_or(0);
    frame.rows.iter().map(|row| {
        let text = cell(row, flux_col);
        let flux = if text.trim().is_empty() { 0.0 } else {
            parse_number(text).unwrap_or_else(|| {
                quit_with_error(&format!("bad flux in {}: {}", file_name(filename), text));
            })
        };
        (cell(row, taxon_col).to_string(), flux)
    }).collect()
}


fn contribution_matrix(triples: Vec<(String, String, f64)>) -> Matrix {
    // Taxa by samples with a trailing net_prod_cons column. Rows are sorted by net production,
    // ascending, and ties stay in taxon order.
    let mut matrix = Matrix::pivot(COMPARTMENT, triples, Aggregate::Sum);
    matrix.retain_rows(|row| row.iter().any(|v| *v != 0.0));
    let net = matrix.row_sums();
    let mut order: Vec<usize> = (0..matrix.row_count()).collect();
    order.sort_by(|&a, &b| net[a].total_cmp(&net[b]));
    matrix.push_column("net_prod_cons", &net);
    matrix.reorder_rows(&order);
    matrix
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::make_test_file;

    #[test]
    fn test_contribution() {
        let dir = tempdir().unwrap();
        let in_dir = dir.path().join("fluxes");
        make_test_file(&in_dir.join("minimal_fluxes_exchange_S1.csv"),
                       "compartment,EX_acald_e,EX_ac_e,sample\nb1,2,1,S1\nb2,-3,0,S1\nb3,0,1,S1\n");
        make_test_file(&in_dir.join("minimal_fluxes_exchange_S2.csv"),
                       "compartment,EX_acald_e,sample\nb1,0.5,S2\nb4,,S2\n");
        make_test_file(&in_dir.join("minimal_fluxes_exchange_S3.csv"),
                       "compartment,EX_ac_e,sample\nb1,4,S3\n");
        let lineages = dir.path().join("HQ_bins.csv");
        make_test_file(&lineages, "binID,classification\nb1,Bacteroides dorei\nb2,Alistipes sp\n");
        let out_file = dir.path().join("all_samples_EX_acald_e.csv");
        contribution(in_dir, "EX_acald_e".to_string(), lineages, out_file.clone(), 3);
        // b3 and b4 never exchange acetaldehyde, and S3 has no acetaldehyde column.
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "compartment,S1,S2,net_prod_cons,lineage\n\
                    b2,-3,0,-3,Alistipes sp\n\
                    b1,2,0.5,2.5,Bacteroides dorei\n");
    }

    #[test]
    fn test_contribution_matrix_order() {
        let triples = vec![("b1".to_string(), "S1".to_string(), 1.0),
                           ("b2".to_string(), "S1".to_string(), 1.0),
                           ("b3".to_string(), "S1".to_string(), -1.0)];
        let matrix = contribution_matrix(triples);
        assert_eq!(matrix.row_names, vec!["b3", "b1", "b2"]);
        assert_eq!(matrix.col_names, vec!["S1", "net_prod_cons"]);
    }
}

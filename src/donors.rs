// This file contains the code for the metmodels donors subcommand. A donor link is a metabolite
// that a bin exports and at least one other bin in the same sample takes up. Links are weighted
// by the metabolite's centrality (the number of bins taking it up).

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

use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation, warning};
use crate::lookup::load_health_status;
use crate::merge_fluxes::{COMPARTMENT, SAMPLE};
use crate::misc::{check_if_file_exists, format_float, parse_number};


#[derive(Clone, Debug, PartialEq)]
pub struct DonorLinks {
    pub sample: String,
    pub bin_id: String,
    pub n_donor_links: usize,
    pub bin_centrality: usize,
    pub weighted_bin_centrality: f64,
    pub health_status: String,
    pub n_bins: usize,
}

impl DonorLinks {
    pub fn donor_score(&self) -> usize {
        self.n_donor_links * self.bin_centrality
    }

    pub fn weighted_donor_score(&self) -> f64 {
        self.n_donor_links as f64 * self.weighted_bin_centrality
    }
}


pub fn donors(fluxes_file: PathBuf, metadata_file: PathBuf, out_file: PathBuf) {
    check_if_file_exists(&fluxes_file);
    check_if_file_exists(&metadata_file);
    section_header("Starting metmodels donors");
    explanation("This command counts each bin's donor links: exported metabolites that other bins \
                 in the same sample take up. Each link is weighted by the centrality of its \
                 metabolite, i.e. the number of bins consuming it.");
    eprintln!("Settings:");
    eprintln!("  --in_file {}", fluxes_file.display());
    eprintln!("  --metadata {}", metadata_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let fluxes = Frame::load_csv(&fluxes_file);
    let statuses = load_health_status(&metadata_file);
    let links = donor_links(&fluxes, &statuses, &fluxes_file);
    save_donor_links(&links, &out_file);
    section_header("Finished!");
    eprintln!("Donor links for {} bins: {}", links.len(), out_file.display());
    eprintln!();
}


fn donor_links(fluxes: &Frame, statuses: &[(String, String)], fluxes_file: &Path)
        -> Vec<DonorLinks> {
    let bin_col = fluxes.column(COMPARTMENT, fluxes_file);
    let sample_col = fluxes.column(SAMPLE, fluxes_file);
    let exchange_cols: Vec<usize> = (0..fluxes.header.len())
        .filter(|&c| fluxes.header[c].starts_with("EX_")).collect();
    let mut links = Vec::new();
    for (sample, status) in unique_samples(statuses) {
        let rows: Vec<&Vec<String>> = fluxes.rows.iter()
            .filter(|row| cell(row, sample_col) == sample).collect();
        if rows.is_empty() {
            warning(&format!("no fluxes found for sample {}", sample));
            continue;
        }
        let flux = |row: &[String], c: usize| parse_number(cell(row, c)).unwrap_or(0.0);
        let centrality: Vec<(usize, usize)> = exchange_cols.iter().map(|&c| {
            (c, rows.iter().filter(|row| flux(row, c) < 0.0).count())
        }).filter(|(_, n)| *n > 0).collect();
        for row in &rows {
            let mut link = DonorLinks { sample: sample.clone(),
                                        bin_id: cell(row, bin_col).to_string(),
                                        n_donor_links: 0, bin_centrality: 0,
                                        weighted_bin_centrality: 0.0,
                                        health_status: status.clone(), n_bins: rows.len() };
            for &(c, n) in &centrality {
                let f = flux(row, c);
                if f > 0.0 {
                    link.n_donor_links += 1;
                    link.bin_centrality += n;
                    link.weighted_bin_centrality += n as f64 * f;
                }
            }
            links.push(link);
        }
    }
    links
}


fn unique_samples(statuses: &[(String, String)]) -> Vec<(String, String)> {
    // A sample listed more than once keeps its first position and its last health status.
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<(String, String)> = Vec::new();
    for (sample, status) in statuses {
        match positions.get(sample.as_str()) {
            Some(&i) => unique[i].1 = status.clone(),
            None => {
                positions.insert(sample, unique.len());
                unique.push((sample.clone(), status.clone()));
            }
        }
    }
    unique
}


fn save_donor_links(links: &[DonorLinks], out_file: &Path) {
    let header = ["sample", "binID", "n_donor_links", "bin_centrality", "weighted_bin_centrality",
                  "HD", "n_bins", "donor_score", "weighted_donor_score"];
    let mut frame = Frame::new(header.iter().map(|h| h.to_string()).collect());
    for l in links {
        frame.rows.push(vec![l.sample.clone(), l.bin_id.clone(), l.n_donor_links.to_string(),
                             l.bin_centrality.to_string(), format_float(l.weighted_bin_centrality),
                             l.health_status.clone(), l.n_bins.to_string(),
                             l.donor_score().to_string(), format_float(l.weighted_donor_score())]);
    }
    frame.save_csv(out_file);
}

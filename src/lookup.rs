// This file contains loaders for the small key-value tables MetModels uses to translate IDs:
// species to bin, sample to community type, bin to lineage, metabolite to name and sample to
// health status.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::HashMap;
use std::path::Path;

use crate::frame::{cell, Frame};
use crate::misc::quit_with_error;


pub fn load_species_to_bin(filename: &Path) -> HashMap<String, String> {
    // The high-quality bin table has the bin ID in its first column and the GTDB classification
    // in its second. Species names in abundance tables use underscores instead of spaces.
    let frame = Frame::load_csv(filename);
    check_width(&frame, 2, filename);
    frame.rows.iter().filter(|row| !cell(row, 0).is_empty())
        .map(|row| (cell(row, 1).replace(' ', "_"), cell(row, 0).to_string())).collect()
}


pub fn load_bin_to_taxonomy(filename: &Path) -> HashMap<String, String> {
    // The same high-quality bin table, keyed the other way round.
    let frame = Frame::load_csv(filename);
    check_width(&frame, 2, filename);
    frame.rows.iter().filter(|row| !cell(row, 0).is_empty())
        .map(|row| (cell(row, 0).to_string(), cell(row, 1).to_string())).collect()
}


pub fn load_community_types(filename: &Path) -> HashMap<String, String> {
    // Sample assignments from the Dirichlet multinomial mixture clustering. Sample names may
    // carry the suffix of the abundance file they came from.
    let frame = Frame::load_csv(filename);
    check_width(&frame, 2, filename);
    frame.rows.iter().filter(|row| !cell(row, 0).is_empty())
        .map(|row| (clean_dmm_sample_name(cell(row, 0)), cell(row, 1).trim().to_string()))
        .collect()
}


fn clean_dmm_sample_name(name: &str) -> String {
    name.replace("_straindb.ccm.csv", "").replace('"', "").trim().to_string()
}


pub fn load_bin_lineages(filename: &Path) -> HashMap<String, String> {
    // Headerless TSV of bin ID and lineage. Model IDs use underscores where bin IDs have dots.
    let frame = Frame::load_tsv(filename, false);
    frame.rows.iter().filter(|row| row.len() >= 2)
        .map(|row| (bin_id_to_model_id(cell(row, 0)), cell(row, 1).trim().to_string())).collect()
}


pub fn bin_id_to_model_id(bin_id: &str) -> String {
    bin_id.replace('.', "_")
}


pub fn phylum_from_lineage(lineage: &str) -> String {
    // d__Bacteria;p__Bacteroidota;c__... -> Bacteroidota
    match lineage.split(';').nth(1) {
        Some(phylum) => phylum.trim().trim_start_matches("p__").to_string(),
        None => quit_with_error(&format!("lineage has no phylum: {}", lineage)),
    }
}


pub fn load_metabolite_names(filename: &Path) -> HashMap<String, String> {
    let frame = Frame::load_tsv(filename, false);
    frame.rows.iter().filter(|row| row.len() >= 2)
        .map(|row| (cell(row, 0).to_string(), cell(row, 1).to_string())).collect()
}


pub fn load_health_status(filename: &Path) -> Vec<(String, String)> {
    // Returns (sample, health status) pairs in file order.
    let frame = Frame::load_csv(filename);
    let sample_col = frame.column("Sample", filename);
    let status_col = frame.column("HD", filename);
    frame.rows.iter()
        .map(|row| (cell(row, sample_col).to_string(), cell(row, status_col).to_string()))
        .collect()
}


pub fn strip_cat(sample: &str) -> String {
    // Samples built from concatenated runs carry a _cat suffix in some file names.
    sample.replace("_cat", "")
}


pub fn translate<'a>(id: &str, map: &'a HashMap<String, String>, what: &str) -> &'a str {
    match map.get(id) {
        Some(value) => value,
        None => quit_with_error(&format!("{} not found in {}", id, what)),
    }
}


fn check_width(frame: &Frame, min_columns: usize, filename: &Path) {
    if frame.header.len() < min_columns {
        quit_with_error(&format!("{} must have at least {} columns", filename.display(),
                                 min_columns));
    }
}

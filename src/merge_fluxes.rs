// This file contains the code for the metmodels merge-fluxes and extract-exchanges subcommands,
// which handle the wide minimal-flux tables (one row per taxon, one column per reaction) written
// by cooperative trade-off runs.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::exchanges::MEDIUM;
use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_dir_exists, check_if_file_exists, file_name, find_files,
                  parse_number, quit_with_error};


pub const COMPARTMENT: &str = "compartment";
pub const SAMPLE: &str = "sample";


pub fn merge_fluxes(in_dir: PathBuf, out_file: PathBuf) {
    check_if_dir_exists(&in_dir);
    section_header("Starting metmodels merge-fluxes");
    explanation("This command concatenates the per-sample minimal exchange flux tables into one \
                 table. Reactions missing from a sample get a flux of zero.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let files = find_files(&in_dir, "minimal_fluxes_exchange_", ".csv");
    if files.is_empty() {
        quit_with_error(&format!("no minimal_fluxes_exchange_*.csv files found in {}",
                                 in_dir.display()));
    }
    let tables: Vec<Frame> = files.iter().map(|f| {
        let frame = Frame::load_csv(f);
        eprintln!("  {}: {} rows", file_name(f), frame.rows.len());
        frame
    }).collect();
    let merged = concat_tables(&tables);
    merged.save_csv(&out_file);
    section_header("Finished!");
    eprintln!("Merged {} tables ({} rows)", tables.len(), merged.rows.len());
    eprintln!("Merged table: {}", out_file.display());
    eprintln!();
}


pub fn extract_exchanges(in_file: PathBuf, out_file: PathBuf) {
    check_if_file_exists(&in_file);
    section_header("Starting metmodels extract-exchanges");
    explanation("This command keeps only the exchange reactions between taxa and the shared \
                 environment from a table of all minimal fluxes, and drops the medium row.");
    eprintln!("Settings:");
    eprintln!("  --in_file {}", in_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let all = Frame::load_csv(&in_file);
    let exchanges = exchange_columns(&all, &in_file);
    exchanges.save_csv(&out_file);
    section_header("Finished!");
    eprintln!("Kept {} exchange reactions for {} taxa", exchanges.header.len().saturating_sub(2),
              exchanges.rows.len());
    eprintln!("Exchange fluxes: {}", out_file.display());
    eprintln!();
}


fn concat_tables(tables: &[Frame]) -> Frame {
    // Columns are the sorted union of all headers with compartment first. Missing cells are
    // zero, and .pickle is dropped from sample names.
    let mut columns: Vec<String> = tables.iter().flat_map(|t| t.header.iter().cloned())
        .filter(|h| !h.is_empty()).collect::<BTreeSet<_>>().into_iter().collect();
    if let Some(i) = columns.iter().position(|c| c == COMPARTMENT) {
        let compartment = columns.remove(i);
        columns.insert(0, compartment);
    }
    let mut merged = Frame::new(columns.clone());
    for table in tables {
        let positions: Vec<Option<usize>> = columns.iter().map(|c| table.find_column(c))
            .collect();
        for row in &table.rows {
            merged.rows.push(columns.iter().zip(positions.iter()).map(|(name, pos)| {
                let value = pos.map(|p| cell(row, p)).unwrap_or("");
                if name == SAMPLE { value.replace(".pickle", "") }
                else if value.is_empty() { "0".to_string() }
                else { value.to_string() }
            }).collect());
        }
    }
    merged
}


fn is_exchange_column(name: &str) -> bool {
    // EX_ reactions ending in e are exchanges with the extracellular space. Medium exchanges end
    // in _m and are left out.
    name.starts_with("EX_") && name.ends_with('e')
}


fn exchange_columns(all: &Frame, in_file: &Path) -> Frame {
    let compartment_col = all.find_column(COMPARTMENT).unwrap_or(0);
    let sample_col = all.column(SAMPLE, in_file);
    let exchange_cols: Vec<usize> = (0..all.header.len())
        .filter(|&c| is_exchange_column(&all.header[c])).collect();

    // Empty cells become zero before checking for all-zero columns (including the medium row).
    let value = |row: &[String], c: usize| -> String {
        let text = cell(row, c);
        if text.trim().is_empty() { "0".to_string() } else { text.to_string() }
    };
    let kept_cols: Vec<usize> = exchange_cols.into_iter().filter(|&c| {
        all.rows.iter().any(|row| parse_number(&value(row, c)).unwrap_or(0.0) != 0.0)
    }).collect();

    let mut header = vec![all.header[compartment_col].clone()];
    header.extend(kept_cols.iter().map(|&c| all.header[c].clone()));
    header.push(SAMPLE.to_string());
    let mut out = Frame::new(header);
    for row in all.rows.iter().filter(|row| cell(row, compartment_col) != MEDIUM) {
        let mut new_row = vec![cell(row, compartment_col).to_string()];
        new_row.extend(kept_cols.iter().map(|&c| value(row, c)));
        new_row.push(cell(row, sample_col).to_string());
        out.rows.push(new_row);
    }
    out
}

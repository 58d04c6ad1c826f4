// This file contains the code for finding and loading the exchange files written by community
// growth simulations (exchanges_grow_<sample>.csv).

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::frame::{cell, Frame};
use crate::misc::{file_name, find_files, parse_number, quit_with_error, spinner};


pub const MEDIUM: &str = "medium";
const FILE_PREFIX: &str = "exchanges_grow_";


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Import,
    Export,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Direction> {
        match text.trim() {
            "import" => Some(Direction::Import),
            "export" => Some(Direction::Export),
            _        => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Import => write!(f, "import"),
            Direction::Export => write!(f, "export"),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Exchange {
    pub taxon: String,
    pub sample_id: String,
    pub reaction: String,
    pub metabolite: String,
    pub direction: Direction,
    pub flux: f64,
    pub abundance: Option<f64>,
    pub tolerance: Option<f64>,
}

impl Exchange {
    pub fn is_medium(&self) -> bool {
        self.taxon == MEDIUM
    }
}


pub fn find_exchange_files(in_dir: &Path) -> Vec<PathBuf> {
    let files = find_files(in_dir, FILE_PREFIX, ".csv");
    if files.is_empty() {
        quit_with_error(&format!("no {}*.csv files found in {}", FILE_PREFIX, in_dir.display()));
    }
    files
}


pub fn find_exchange_file_for_prefix(in_dir: &Path, prefix: &str) -> Option<PathBuf> {
    // The first (sorted) exchange file whose sample part starts with the prefix.
    find_files(in_dir, &format!("{}{}", FILE_PREFIX, prefix), "csv").into_iter().next()
}


pub fn set_thread_count(threads: usize) {
    // The global pool can only be built once per process. A command builds it once, but a test
    // binary runs many commands, so a second build is only an error outside of tests.
    if let Err(e) = ThreadPoolBuilder::new().num_threads(threads).build_global() {
        if !cfg!(test) {
            quit_with_error(&format!("failed to start {} threads\n{}", threads, e));
        }
    }
}


pub fn load_exchange_files(files: &[PathBuf]) -> Vec<Exchange> {
    // Files are parsed in parallel, but the result keeps the order of the input files.
    let pb = spinner(&format!("loading {} exchange files...", files.len()));
    let per_file: Vec<Vec<Exchange>> = files.par_iter()
        .map(|f| load_exchange_file(f)).collect();
    pb.finish_and_clear();
    let exchanges: Vec<Exchange> = per_file.into_iter().flatten().collect();
    eprintln!("{} exchanges loaded from {} file{}", exchanges.len(), files.len(),
              if files.len() == 1 { "" } else { "s" });
    exchanges
}


pub fn load_exchange_file(filename: &Path) -> Vec<Exchange> {
    let frame = Frame::load_csv(filename);
    exchanges_from_frame(&frame, filename)
}


fn exchanges_from_frame(frame: &Frame, filename: &Path) -> Vec<Exchange> {
    let taxon_col = frame.column("taxon", filename);
    let sample_col = frame.column("sample_id", filename);
    let reaction_col = frame.column("reaction", filename);
    let metabolite_col = frame.column("metabolite", filename);
    let direction_col = frame.column("direction", filename);
    let flux_col = frame.column("flux", filename);
    let abundance_col = frame.find_column("abundance");
    let tolerance_col = frame.find_column("tolerance");
    frame.rows.iter().map(|row| {
        let direction = Direction::parse(cell(row, direction_col)).unwrap_or_else(|| {
            quit_with_error(&format!("bad direction in {}: {}", file_name(filename),
                                     cell(row, direction_col)));
        });
        let flux = parse_number(cell(row, flux_col)).unwrap_or_else(|| {
            quit_with_error(&format!("bad flux in {}: {}", file_name(filename),
                                     cell(row, flux_col)));
        });
        Exchange {
            taxon: cell(row, taxon_col).to_string(),
            sample_id: cell(row, sample_col).to_string(),
            reaction: cell(row, reaction_col).to_string(),
            metabolite: cell(row, metabolite_col).to_string(),
            direction,
            flux,
            abundance: abundance_col.and_then(|c| parse_number(cell(row, c))),
            tolerance: tolerance_col.and_then(|c| parse_number(cell(row, c))),
        }
    }).collect()
}

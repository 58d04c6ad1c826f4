// This file contains the code for the metmodels net-production and total-production
// subcommands, which summarise how much of each metabolite a community releases or takes up.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use fxhash::FxHashMap;
use std::path::PathBuf;

use crate::abundance::AbundanceTable;
use crate::exchanges::{Direction, Exchange, find_exchange_files, load_exchange_files,
                       set_thread_count};
use crate::frame::{Aggregate, Matrix};
use crate::log::{section_header, explanation};
use crate::lookup::load_species_to_bin;
use crate::misc::{check_if_dir_exists, check_if_file_exists, check_threads};


pub fn net_production(in_dir: PathBuf, out_file: PathBuf, threads: usize) {
    check_if_dir_exists(&in_dir);
    check_threads(threads);
    section_header("Starting metmodels net-production");
    explanation("This command collects the exchanges between the community and the medium. These \
                 give the net production (positive) or consumption (negative) of each \
                 metabolite by the whole community, already scaled by taxon abundances.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let exchanges = load_exchange_files(&find_exchange_files(&in_dir));
    let net = net_matrix(&exchanges);
    net.save_csv(&out_file);
    section_header("Finished!");
    eprintln!("Net production of {} metabolites in {} samples: {}", net.col_count(),
              net.row_count(), out_file.display());
    eprintln!();
}


pub fn total_production(in_dir: PathBuf, kma_file: PathBuf, sp2bin_file: Option<PathBuf>,
                        out_production: PathBuf, out_consumption: PathBuf, threads: usize) {
    check_if_dir_exists(&in_dir);
    check_if_file_exists(&kma_file);
    if let Some(f) = &sp2bin_file { check_if_file_exists(f); }
    check_threads(threads);
    section_header("Starting metmodels total-production");
    explanation("This command weights every taxon's exchange flux by the taxon's abundance in the \
                 sample and sums the result per metabolite, separately for production (exports) \
                 and consumption (imports).");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --kma {}", kma_file.display());
    if let Some(f) = &sp2bin_file { eprintln!("  --sp2bin {}", f.display()); }
    eprintln!("  --output_production {}", out_production.display());
    eprintln!("  --output_consumption {}", out_consumption.display());
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let abundance = AbundanceTable::load(&kma_file);
    let bin_rows = bin_row_index(&abundance, &sp2bin_file);
    let exchanges: Vec<Exchange> = load_exchange_files(&find_exchange_files(&in_dir))
        .into_iter().filter(|e| !e.is_medium()).collect();
    let production = weighted_matrix(&exchanges, &abundance, &bin_rows, Direction::Export);
    let consumption = weighted_matrix(&exchanges, &abundance, &bin_rows, Direction::Import);
    production.save_csv(&out_production);
    consumption.save_csv(&out_consumption);
    section_header("Finished!");
    eprintln!("Total production:  {}", out_production.display());
    eprintln!("Total consumption: {}", out_consumption.display());
    eprintln!();
}


fn net_matrix(exchanges: &[Exchange]) -> Matrix {
    Matrix::pivot("sample_id", exchanges.iter().filter(|e| e.is_medium())
                      .map(|e| (e.sample_id.clone(), e.metabolite.clone(), e.flux)),
                  Aggregate::Unique)
}


fn bin_row_index(abundance: &AbundanceTable, sp2bin_file: &Option<PathBuf>)
        -> FxHashMap<String, usize> {
    // Maps each bin to its abundance row. With a species-to-bin table, species rows are looked up
    // through their representative bin.
    match sp2bin_file {
        Some(f) => {
            let sp2bin = load_species_to_bin(f);
            abundance.row_ids.iter().enumerate()
                .filter_map(|(r, species)| sp2bin.get(species).map(|bin| (bin.clone(), r)))
                .collect()
        }
        None => abundance.row_ids.iter().enumerate().map(|(r, bin)| (bin.clone(), r)).collect(),
    }
}


fn weighted_matrix(exchanges: &[Exchange], abundance: &AbundanceTable,
                   bin_rows: &FxHashMap<String, usize>, direction: Direction) -> Matrix {
    // An exchange whose taxon or sample has no abundance contributes zero.
    let sample_cols: FxHashMap<&str, usize> = abundance.samples.iter().enumerate()
        .map(|(s, sample)| (sample.as_str(), s)).collect();
    Matrix::pivot("sample_id", exchanges.iter().filter(|e| e.direction == direction).map(|e| {
        let weight = match (bin_rows.get(&e.taxon), sample_cols.get(e.sample_id.as_str())) {
            (Some(&r), Some(&s)) => abundance.values[r][s],
            _                    => 0.0,
        };
        (e.sample_id.clone(), e.metabolite.clone(), e.flux * weight)
    }), Aggregate::Sum)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::{make_exchange_dir, make_test_file};

    #[test]
    fn test_net_production() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let out_file = dir.path().join("net.csv");
        net_production(in_dir, out_file.clone(), 1);
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "sample_id,ac_m,but_m\nS1,1.5,0\nS2,0.5,0\nS3,0,-0.3\n");
    }

    #[test]
    fn test_total_production() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let kma = dir.path().join("species.csv");
        make_test_file(&kma, "species,S1,S2\nsp_one,10,20\nsp_two,2,0\n");
        let sp2bin = dir.path().join("HQ.csv");
        make_test_file(&sp2bin, "binID,classification\nb1,sp one\nb2,sp two\n");
        let out_prod = dir.path().join("total_production.csv");
        let out_cons = dir.path().join("total_consumption.csv");
        total_production(in_dir, kma, Some(sp2bin), out_prod.clone(), out_cons.clone(), 1);
        // S3 has no abundance column and b3 has no abundance row, so both contribute zero.
        assert_eq!(std::fs::read_to_string(&out_prod).unwrap(),
                   "sample_id,ac_e,but_e\nS1,25,0\nS2,40,0\nS3,0,0\n");
        assert_eq!(std::fs::read_to_string(&out_cons).unwrap(),
                   "sample_id,ac_e,h2s_e\nS1,-2,0\nS2,0,-10\n");
    }
}

// This file contains the code for the metmodels micom-tables subcommand, which writes the
// taxonomy tables that community growth simulations take as input: one table per sample, or one
// per community type with abundances averaged over the type's samples.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::abundance::AbundanceTable;
use crate::frame::Frame;
use crate::log::{section_header, explanation};
use crate::lookup::{load_community_types, load_species_to_bin};
use crate::misc::{check_if_dir_is_not_dir, check_if_file_exists, create_dir, format_float,
                  mean, quit_with_error, round_decimals};


const HEADER: [&str; 5] = ["id", "species", "sample_id", "file", "abundance"];


#[derive(Clone, Debug, PartialEq)]
struct TableRow {
    id: String,
    species: String,
    file: String,
}


pub fn micom_tables(kma_file: PathBuf, gems_dir: PathBuf, sp2bin_file: Option<PathBuf>,
                    dmm_file: Option<PathBuf>, out_dir: PathBuf) {
    check_settings(&kma_file, &sp2bin_file, &dmm_file, &out_dir);
    starting_message(dmm_file.is_some());
    print_settings(&kma_file, &gems_dir, &sp2bin_file, &dmm_file, &out_dir);
    let abundance = AbundanceTable::load(&kma_file);
    let rows = table_rows(&abundance, &gems_dir, &sp2bin_file, &kma_file);
    create_dir(&out_dir);
    let written = match &dmm_file {
        Some(dmm_file) => save_per_community_type(&abundance, &rows, dmm_file, &out_dir),
        None           => save_per_sample(&abundance, &rows, &out_dir),
    };
    finished_message(&out_dir, written);
}


fn check_settings(kma_file: &Path, sp2bin_file: &Option<PathBuf>, dmm_file: &Option<PathBuf>,
                  out_dir: &Path) {
    check_if_file_exists(kma_file);
    if let Some(f) = sp2bin_file { check_if_file_exists(f); }
    if let Some(f) = dmm_file { check_if_file_exists(f); }
    check_if_dir_is_not_dir(out_dir);
}


fn starting_message(per_community_type: bool) {
    section_header("Starting metmodels micom-tables");
    if per_community_type {
        explanation("This command writes one simulation input table per community type. Each \
                     bin's abundance is the mean over the samples of that type where the bin is \
                     present.");
    } else {
        explanation("This command writes one simulation input table per sample, listing each \
                     present bin with its metabolic model file and abundance.");
    }
}


fn print_settings(kma_file: &Path, gems_dir: &Path, sp2bin_file: &Option<PathBuf>,
                  dmm_file: &Option<PathBuf>, out_dir: &Path) {
    eprintln!("Settings:");
    eprintln!("  --kma {}", kma_file.display());
    eprintln!("  --gems {}", gems_dir.display());
    if let Some(f) = sp2bin_file { eprintln!("  --sp2bin {}", f.display()); }
    if let Some(f) = dmm_file { eprintln!("  --dmm {}", f.display()); }
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!();
}


fn table_rows(abundance: &AbundanceTable, gems_dir: &Path, sp2bin_file: &Option<PathBuf>,
              kma_file: &Path) -> Vec<Option<TableRow>> {
    // One entry per abundance row. With a species-to-bin table, rows are species and the id is
    // the species' bin (None if the species has no bin). Otherwise rows are bins and the species
    // comes from the Taxonomy column.
    match sp2bin_file {
        Some(f) => {
            let sp2bin = load_species_to_bin(f);
            abundance.row_ids.iter().map(|species| {
                sp2bin.get(species).map(|bin_id| TableRow {
                    id: bin_id.clone(), species: species.clone(),
                    file: model_path(gems_dir, bin_id) })
            }).collect()
        }
        None => {
            if abundance.taxonomy.is_none() {
                quit_with_error(&format!("{} has no Taxonomy column (use --sp2bin for \
                                          species-level tables)", kma_file.display()));
            }
            abundance.row_ids.iter().enumerate().map(|(r, bin_id)| {
                Some(TableRow { id: bin_id.clone(),
                                species: abundance.taxonomy_of(r).unwrap_or_default().to_string(),
                                file: model_path(gems_dir, bin_id) })
            }).collect()
        }
    }
}


fn model_path(gems_dir: &Path, bin_id: &str) -> String {
    gems_dir.join(format!("{}.xml", bin_id)).display().to_string()
}


fn row_or_quit<'a>(row: &'a Option<TableRow>, row_id: &str) -> &'a TableRow {
    row.as_ref().unwrap_or_else(|| {
        quit_with_error(&format!("{} is not in the species-to-bin table", row_id));
    })
}


fn save_per_sample(abundance: &AbundanceTable, rows: &[Option<TableRow>], out_dir: &Path)
        -> usize {
    for (s, sample) in abundance.samples.iter().enumerate() {
        let mut frame = Frame::new(HEADER.iter().map(|h| h.to_string()).collect());
        for (r, row) in rows.iter().enumerate() {
            let value = abundance.values[r][s];
            if value == 0.0 { continue; }
            let row = row_or_quit(row, &abundance.row_ids[r]);
            frame.rows.push(vec![row.id.clone(), row.species.clone(), sample.clone(),
                                 row.file.clone(), format_float(value)]);
        }
        frame.save_csv(&out_dir.join(format!("{}.csv", sample)));
    }
    abundance.samples.len()
}


fn save_per_community_type(abundance: &AbundanceTable, rows: &[Option<TableRow>],
                           dmm_file: &Path, out_dir: &Path) -> usize {
    let comm_types = load_community_types(dmm_file);
    let groups = group_by_community_type(abundance, rows, &comm_types);
    for (comm_type, members) in &groups {
        let sample_id = format!("sample_{}", comm_type);
        let mut frame = Frame::new(HEADER.iter().map(|h| h.to_string()).collect());
        for ((id, species, file), values) in members {
            let avg = round_decimals(mean(values).unwrap_or(0.0), 2);
            frame.rows.push(vec![id.clone(), species.clone(), sample_id.clone(), file.clone(),
                                 format_float(avg)]);
        }
        frame.save_csv(&out_dir.join(format!("{}.csv", sample_id)));
    }
    groups.len()
}


type GroupKey = (String, String, String);


fn group_by_community_type(abundance: &AbundanceTable, rows: &[Option<TableRow>],
                           comm_types: &HashMap<String, String>)
        -> BTreeMap<String, BTreeMap<GroupKey, Vec<f64>>> {
    // Collects the non-zero abundances of each (id, species, file) within each community type.
    // BTreeMaps keep the output sorted by community type and then by (id, species, file).
    let mut groups: BTreeMap<String, BTreeMap<GroupKey, Vec<f64>>> = BTreeMap::new();
    for (s, sample) in abundance.samples.iter().enumerate() {
        let comm_type = comm_types.get(sample).unwrap_or_else(|| {
            quit_with_error(&format!("sample {} has no community type assignment", sample));
        });
        for (r, row) in rows.iter().enumerate() {
            let value = abundance.values[r][s];
            if value <= 0.0 { continue; }
            let row = row_or_quit(row, &abundance.row_ids[r]);
            groups.entry(comm_type.clone()).or_default()
                .entry((row.id.clone(), row.species.clone(), row.file.clone())).or_default()
                .push(value);
        }
    }
    groups
}


fn finished_message(out_dir: &Path, written: usize) {
    section_header("Finished!");
    eprintln!("{} tables written to: {}", written, out_dir.display());
    eprintln!();
}

// This file contains the code for the metmodels commtypes subcommand. It labels every present bin
// with its sample's community type and copies the bin's metabolic model into one folder per
// community type (or per community type and sample).

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::abundance::{AbundanceTable, TAXONOMY_COLUMN};
use crate::frame::Frame;
use crate::log::{section_header, explanation};
use crate::lookup::{load_community_types, load_species_to_bin};
use crate::misc::{check_if_dir_exists, check_if_dir_is_not_dir, check_if_file_exists,
                  copy_file, create_dir, quit_with_error};


pub fn commtypes(kma_file: PathBuf, dmm_file: PathBuf, gems_dir: PathBuf,
                 sp2bin_file: Option<PathBuf>, per_sample: bool, top: usize, out_table: PathBuf,
                 out_dir: PathBuf) {
    check_settings(&kma_file, &dmm_file, &gems_dir, &sp2bin_file, top, &out_dir);
    starting_message(per_sample);
    print_settings(&kma_file, &dmm_file, &gems_dir, &sp2bin_file, per_sample, top, &out_table,
                   &out_dir);
    let abundance = AbundanceTable::load(&kma_file);
    let comm_types = load_community_types(&dmm_file);
    check_samples_assigned(&abundance, &comm_types);
    let bin_ids = bin_ids_for_rows(&abundance, &sp2bin_file);
    let selected = if per_sample { top_rows_per_sample(&abundance, top) }
                   else { present_rows_per_sample(&abundance) };
    let labels = label_table(&abundance, &selected, &comm_types);
    save_label_table(&abundance, &labels, &bin_ids, sp2bin_file.is_some(), &out_table);
    create_dir(&out_dir);
    let copied = copy_models(&abundance, &selected, &comm_types, &bin_ids, &gems_dir, &out_dir,
                             per_sample);
    finished_message(&out_table, &out_dir, copied);
}


fn check_settings(kma_file: &Path, dmm_file: &Path, gems_dir: &Path,
                  sp2bin_file: &Option<PathBuf>, top: usize, out_dir: &Path) {
    check_if_file_exists(kma_file);
    check_if_file_exists(dmm_file);
    check_if_dir_exists(gems_dir);
    if let Some(f) = sp2bin_file { check_if_file_exists(f); }
    check_if_dir_is_not_dir(out_dir);
    if top < 1 { quit_with_error("--top must be at least 1"); }
}


fn starting_message(per_sample: bool) {
    section_header("Starting metmodels commtypes");
    if per_sample {
        explanation("This command assigns the most abundant bins of each sample to the sample's \
                     community type and copies their metabolic models into one folder per \
                     sample.");
    } else {
        explanation("This command assigns each bin to the community types of the samples it was \
                     found in and copies its metabolic model into one folder per community \
                     type.");
    }
}


fn print_settings(kma_file: &Path, dmm_file: &Path, gems_dir: &Path,
                  sp2bin_file: &Option<PathBuf>, per_sample: bool, top: usize, out_table: &Path,
                  out_dir: &Path) {
    eprintln!("Settings:");
    eprintln!("  --kma {}", kma_file.display());
    eprintln!("  --dmm {}", dmm_file.display());
    eprintln!("  --gems {}", gems_dir.display());
    if let Some(f) = sp2bin_file { eprintln!("  --sp2bin {}", f.display()); }
    if per_sample {
        eprintln!("  --per_sample");
        eprintln!("  --top {}", top);
    }
    eprintln!("  --out_table {}", out_table.display());
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!();
}


fn check_samples_assigned(abundance: &AbundanceTable, comm_types: &HashMap<String, String>) {
    for sample in &abundance.samples {
        if !comm_types.contains_key(sample) {
            quit_with_error(&format!("sample {} has no community type assignment", sample));
        }
    }
}


fn bin_ids_for_rows(abundance: &AbundanceTable, sp2bin_file: &Option<PathBuf>)
        -> Vec<Option<String>> {
    // Without a species-to-bin table, rows are already bins.
    match sp2bin_file {
        Some(f) => {
            let sp2bin = load_species_to_bin(f);
            abundance.row_ids.iter().map(|species| sp2bin.get(species).cloned()).collect()
        }
        None => abundance.row_ids.iter().map(|id| Some(id.clone())).collect(),
    }
}


fn present_rows_per_sample(abundance: &AbundanceTable) -> Vec<Vec<bool>> {
    // selected[row][sample] is true for every cell with abundance > 0.
    abundance.values.iter().map(|row| row.iter().map(|&v| v > 0.0).collect()).collect()
}


fn top_rows_per_sample(abundance: &AbundanceTable, top: usize) -> Vec<Vec<bool>> {
    // Keeps only the top most abundant rows of each sample (ties broken by input order) that are
    // also present in that sample.
    let mut selected = vec![vec![false; abundance.samples.len()]; abundance.row_ids.len()];
    for s in 0..abundance.samples.len() {
        let mut order: Vec<usize> = (0..abundance.row_ids.len()).collect();
        order.sort_by(|&a, &b| abundance.values[b][s].total_cmp(&abundance.values[a][s]));
        for &r in order.iter().take(top) {
            selected[r][s] = abundance.values[r][s] > 0.0;
        }
    }
    selected
}


fn label_table(abundance: &AbundanceTable, selected: &[Vec<bool>],
               comm_types: &HashMap<String, String>) -> Vec<Vec<String>> {
    abundance.row_ids.iter().enumerate().map(|(r, _)| {
        abundance.samples.iter().enumerate().map(|(s, sample)| {
            if selected[r][s] { comm_types[sample].clone() } else { "0".to_string() }
        }).collect()
    }).collect()
}


fn save_label_table(abundance: &AbundanceTable, labels: &[Vec<String>],
                    bin_ids: &[Option<String>], add_bin_column: bool, out_table: &Path) {
    let mut header = vec![abundance.index_name.clone()];
    header.extend(abundance.samples.iter().cloned());
    if abundance.taxonomy.is_some() { header.push(TAXONOMY_COLUMN.to_string()); }
    if add_bin_column { header.push("binID".to_string()); }
    let mut frame = Frame::new(header);
    for (r, row_id) in abundance.row_ids.iter().enumerate() {
        let mut row = vec![row_id.clone()];
        row.extend(labels[r].iter().cloned());
        if let Some(taxonomy) = abundance.taxonomy_of(r) { row.push(taxonomy.to_string()); }
        if add_bin_column { row.push(bin_ids[r].clone().unwrap_or_default()); }
        frame.rows.push(row);
    }
    frame.save_csv(out_table);
}


fn copy_models(abundance: &AbundanceTable, selected: &[Vec<bool>],
               comm_types: &HashMap<String, String>, bin_ids: &[Option<String>],
               gems_dir: &Path, out_dir: &Path, per_sample: bool) -> usize {
    // Creates the folder layout first, so every community type (or every assigned sample) gets a
    // folder even if nothing is copied into it. Returns the number of models copied.
    if per_sample {
        for (sample, comm_type) in comm_types {
            create_dir(&out_dir.join(comm_type).join(sample));
        }
    } else {
        for comm_type in comm_types.values().collect::<BTreeSet<_>>() {
            create_dir(&out_dir.join(comm_type));
        }
    }
    let mut copied = 0;
    for (r, row_id) in abundance.row_ids.iter().enumerate() {
        for (s, sample) in abundance.samples.iter().enumerate() {
            if !selected[r][s] { continue; }
            let bin_id = bin_ids[r].as_ref().unwrap_or_else(|| {
                quit_with_error(&format!("{} is not in the species-to-bin table", row_id));
            });
            let model_name = format!("{}.xml", bin_id);
            let mut target = out_dir.join(&comm_types[sample]);
            if per_sample { target = target.join(sample); }
            copy_file(&gems_dir.join(&model_name), &target.join(&model_name));
            copied += 1;
        }
    }
    copied
}


fn finished_message(out_table: &Path, out_dir: &Path, copied: usize) {
    section_header("Finished!");
    eprintln!("Community type table: {}", out_table.display());
    eprintln!("{} models copied to: {}", copied, out_dir.display());
    eprintln!();
}

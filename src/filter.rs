// This file contains the code for the metmodels filter-clusters and filter-samples2domain
// subcommands, which keep only the lines of a TSV that belong to high-quality bins.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_dir_exists, check_if_file_exists, create_parent_dir,
                  find_subdirectories, load_file_lines, quit_with_error};


pub fn filter_clusters(bins_dir: PathBuf, clusters_file: PathBuf, out_file: PathBuf) {
    check_if_dir_exists(&bins_dir);
    check_if_file_exists(&clusters_file);
    section_header("Starting metmodels filter-clusters");
    explanation("This command keeps the lines of a VAMB clusters file whose bin has a directory \
                 in the high-quality bins directory.");
    eprintln!("Settings:");
    eprintln!("  --bins_dir {}", bins_dir.display());
    eprintln!("  --clusters {}", clusters_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let wanted: HashSet<String> = find_subdirectories(&bins_dir).into_iter().collect();
    eprintln!("{} high-quality bins found", wanted.len());
    let (kept, total) = filter_lines(&clusters_file, &wanted, &out_file);
    finished_message(&out_file, kept, total);
}


pub fn filter_samples2domain(hq_bins: PathBuf, samples2domain: PathBuf, out_file: PathBuf) {
    check_if_file_exists(&hq_bins);
    check_if_file_exists(&samples2domain);
    section_header("Starting metmodels filter-samples2domain");
    explanation("This command keeps the lines of a samples-to-domain file whose bin is in the \
                 high-quality bin table, so only one bin per species gets a metabolic model.");
    eprintln!("Settings:");
    eprintln!("  --hq_bins {}", hq_bins.display());
    eprintln!("  --samples2domain {}", samples2domain.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let wanted: HashSet<String> = Frame::load_csv(&hq_bins).rows.iter()
        .map(|row| cell(row, 0).to_string()).collect();
    eprintln!("{} high-quality bins found", wanted.len());
    let (kept, total) = filter_lines(&samples2domain, &wanted, &out_file);
    finished_message(&out_file, kept, total);
}


fn filter_lines(in_file: &Path, wanted: &HashSet<String>, out_file: &Path) -> (usize, usize) {
    // Writes the lines whose first tab-delimited field is wanted. Returns the number of lines
    // kept and the total number of lines.
    let lines = load_file_lines(in_file);
    create_parent_dir(out_file);
    match write_wanted_lines(&lines, wanted, out_file) {
        Ok(kept) => (kept, lines.len()),
        Err(e)   => quit_with_error(&format!("failed to write {}\n{}", out_file.display(), e)),
    }
}


fn write_wanted_lines(lines: &[String], wanted: &HashSet<String>, out_file: &Path)
        -> io::Result<usize> {
    let mut writer = BufWriter::new(File::create(out_file)?);
    let mut kept = 0;
    for line in lines {
        let first = line.split('\t').next().unwrap_or_default();
        if wanted.contains(first) {
            writeln!(writer, "{}", line)?;
            kept += 1;
        }
    }
    writer.flush()?;
    Ok(kept)
}


fn finished_message(out_file: &Path, kept: usize, total: usize) {
    section_header("Finished!");
    eprintln!("Kept {} of {} lines", kept, total);
    eprintln!("Filtered file: {}", out_file.display());
    eprintln!();
}

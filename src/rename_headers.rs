// This file contains the code for the metmodels rename-headers subcommand, which labels each
// contig in a FASTA of binned contigs with its bin and taxonomy (bin|contig|taxonomy).

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use seq_io::fasta::{Reader, Record};
use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_file_exists, create_parent_dir, load_file_lines, open_reader,
                  quit_with_error};


pub fn rename_headers(in_fasta: PathBuf, clusters_file: PathBuf, gtdb_file: PathBuf,
                      out_fasta: PathBuf) {
    check_settings(&in_fasta, &clusters_file, &gtdb_file);
    starting_message();
    print_settings(&in_fasta, &clusters_file, &gtdb_file, &out_fasta);
    let taxonomy = load_bin_taxonomy(&gtdb_file);
    let new_names = load_new_names(&clusters_file, &taxonomy);
    eprintln!("{} contigs listed in {}", new_names.len(), clusters_file.display());
    create_parent_dir(&out_fasta);
    let (renamed, total) = match rename_fasta(&in_fasta, &out_fasta, &new_names) {
        Ok(counts) => counts,
        Err(e)     => quit_with_error(&format!("failed to rename {}\n{}", in_fasta.display(), e)),
    };
    finished_message(&out_fasta, renamed, total - renamed);
}


fn check_settings(in_fasta: &Path, clusters_file: &Path, gtdb_file: &Path) {
    check_if_file_exists(in_fasta);
    check_if_file_exists(clusters_file);
    check_if_file_exists(gtdb_file);
}


fn starting_message() {
    section_header("Starting metmodels rename-headers");
    explanation("This command renames contigs to bin|contig|taxonomy so read-mapping results can \
                 be traced back to bins. Sequences are written on a single line.");
}


fn print_settings(in_fasta: &Path, clusters_file: &Path, gtdb_file: &Path, out_fasta: &Path) {
    eprintln!("Settings:");
    eprintln!("  --in_fasta {}", in_fasta.display());
    eprintln!("  --clusters {}", clusters_file.display());
    eprintln!("  --gtdb {}", gtdb_file.display());
    eprintln!("  --out_fasta {}", out_fasta.display());
    eprintln!();
}


fn load_bin_taxonomy(gtdb_file: &Path) -> HashMap<String, String> {
    // GTDB summary: bin then classification. Spaces in species names become underscores.
    Frame::load_tsv(gtdb_file, true).rows.iter()
        .map(|row| (cell(row, 0).to_string(), cell(row, 1).trim().replace(' ', "_"))).collect()
}


fn load_new_names(clusters_file: &Path, taxonomy: &HashMap<String, String>)
        -> HashMap<String, String> {
    // Maps each full contig name in the clusters file to its new header. The contig ID is the
    // part of the full name before the first dash.
    let mut new_names = HashMap::new();
    for line in load_file_lines(clusters_file) {
        let mut parts = line.split('\t');
        let (Some(bin_id), Some(full_name)) = (parts.next(), parts.next()) else { continue; };
        let full_name = full_name.trim();
        let contig_id = full_name.split('-').next().unwrap_or_default();
        let bin_taxonomy = taxonomy.get(bin_id).unwrap_or_else(|| {
            quit_with_error(&format!("bin {} has no taxonomy", bin_id));
        });
        new_names.insert(full_name.to_string(),
                         format!("{}|{}|{}", bin_id, contig_id, bin_taxonomy));
    }
    new_names
}


fn rename_fasta(in_fasta: &Path, out_fasta: &Path, new_names: &HashMap<String, String>)
        -> Result<(usize, usize), Box<dyn Error>> {
    // Returns the number of renamed contigs and the total number of contigs.
    let mut reader = Reader::new(open_reader(in_fasta));
    let mut writer = BufWriter::new(File::create(out_fasta)?);
    let (mut renamed, mut total) = (0, 0);
    while let Some(record) = reader.next() {
        let record = record?;
        let old_name = String::from_utf8_lossy(record.head()).trim().to_string();
        let new_name = match new_names.get(&old_name) {
            Some(name) => { renamed += 1; name.clone() }
            None       => format!("not_renamed_{}", old_name),
        };
        total += 1;
        writeln!(writer, ">{}", new_name)?;
        writer.write_all(&record.full_seq())?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok((renamed, total))
}


fn finished_message(out_fasta: &Path, renamed: usize, not_found: usize) {
    section_header("Finished!");
    eprintln!("{} contigs renamed, {} contigs not found", renamed, not_found);
    eprintln!("Renamed FASTA: {}", out_fasta.display());
    eprintln!();
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::{make_gzipped_test_file, make_test_file};

    #[test]
    fn test_rename_headers() {
        let dir = tempdir().unwrap();
        let in_fasta = dir.path().join("bins.fna.gz");
        let clusters = dir.path().join("clusters_filtered.tsv");
        let gtdb = dir.path().join("gtdb.tsv");
        let out_fasta = dir.path().join("renamed.fasta");
        make_gzipped_test_file(&in_fasta, ">S1C1_k141_1-a\nACGT\nACG\n>S1C1_k141_2\nGG\n\
                                           >other\nTTTT\n");
        make_test_file(&clusters, "S1C1\tS1C1_k141_1-a\nS1C1\tS1C1_k141_2\n");
        make_test_file(&gtdb, "user_genome\tclassification\nS1C1\tBacteroides dorei\n");
        rename_headers(in_fasta, clusters, gtdb, out_fasta.clone());
        assert_eq!(std::fs::read_to_string(&out_fasta).unwrap(),
                   ">S1C1|S1C1_k141_1|Bacteroides_dorei\nACGTACG\n\
                    >S1C1|S1C1_k141_2|Bacteroides_dorei\nGG\n\
                    >not_renamed_other\nTTTT\n");
    }

    #[test]
    fn test_missing_taxonomy() {
        let dir = tempdir().unwrap();
        let clusters = dir.path().join("clusters_filtered.tsv");
        make_test_file(&clusters, "S9C9\tS9C9_k141_1\n");
        let taxonomy = HashMap::new();
        assert!(std::panic::catch_unwind(|| { load_new_names(&clusters, &taxonomy); }).is_err());
    }
}

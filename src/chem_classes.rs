// This file contains the code for the metmodels parse-bigg and parse-hmdb subcommands, which
// annotate BiGG metabolites with their HMDB chemical taxonomy (super class, class, sub class).

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_file_exists, load_file_lines, open_reader, quit_with_error, spinner};


pub const HMDB_COLUMN: &str = "hmdb_id";
pub const NO_HMDB_ID: &str = "no_hmdbID_found";
const NO_SUPER_CLASS: &str = "no super class";
const NO_CLASS: &str = "no class";
const NO_SUB_CLASS: &str = "no sub class";


pub fn parse_bigg(in_file: PathBuf, out_file: PathBuf) {
    check_if_file_exists(&in_file);
    section_header("Starting metmodels parse-bigg");
    explanation("This command simplifies the BiGG metabolite table to the metabolite ID, its \
                 name and its HMDB ID (taken from the database links).");
    eprintln!("Settings:");
    eprintln!("  --in_file {}", in_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let simplified = simplify_bigg(&load_file_lines(&in_file), &in_file);
    simplified.save(&out_file, b'\t');
    let with_hmdb = simplified.rows.iter().filter(|row| cell(row, 2) != NO_HMDB_ID).count();
    section_header("Finished!");
    eprintln!("{} metabolites, {} with an HMDB ID", simplified.rows.len(), with_hmdb);
    eprintln!("Simplified table: {}", out_file.display());
    eprintln!();
}


fn simplify_bigg(lines: &[String], in_file: &Path) -> Frame {
    // The first line is a header. Field 0 is the BiGG ID and field 2 the name. The HMDB ID is
    // found in the database links field as hmdb/<id>; followed by the next link.
    let hmdb_re = Regex::new(r"hmdb/(.*?); ").unwrap();
    let mut frame = Frame::new(vec!["bigg_id".to_string(), "name".to_string(),
                                    HMDB_COLUMN.to_string()]);
    for line in lines.iter().skip(1).filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            quit_with_error(&format!("BiGG line in {} has fewer than three fields: {}",
                                     in_file.display(), line));
        }
        let hmdb_id = match hmdb_re.captures(line) {
            Some(c) => c[1].to_string(),
            None    => NO_HMDB_ID.to_string(),
        };
        frame.rows.push(vec![parts[0].to_string(), parts[2].to_string(), hmdb_id]);
    }
    frame
}


#[derive(Clone, Debug, Default, PartialEq)]
struct ChemicalClasses {
    super_class: Option<String>,
    class: Option<String>,
    sub_class: Option<String>,
}

impl ChemicalClasses {
    fn columns(&self) -> [String; 3] {
        [self.super_class.clone().unwrap_or_else(|| NO_SUPER_CLASS.to_string()),
         self.class.clone().unwrap_or_else(|| NO_CLASS.to_string()),
         self.sub_class.clone().unwrap_or_else(|| NO_SUB_CLASS.to_string())]
    }
}


pub fn parse_hmdb(bigg_file: PathBuf, hmdb_file: PathBuf, out_file: PathBuf) {
    check_if_file_exists(&bigg_file);
    check_if_file_exists(&hmdb_file);
    section_header("Starting metmodels parse-hmdb");
    explanation("This command streams through the HMDB metabolite XML and adds the chemical \
                 super class, class and sub class to each BiGG metabolite with an HMDB ID.");
    eprintln!("Settings:");
    eprintln!("  --bigg {}", bigg_file.display());
    eprintln!("  --hmdb {}", hmdb_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!();
    let bigg = Frame::load_tsv(&bigg_file, true);
    let hmdb_col = bigg.column(HMDB_COLUMN, &bigg_file);
    let wanted: HashSet<String> = bigg.rows.iter().map(|row| cell(row, hmdb_col).to_string())
        .filter(|id| id != NO_HMDB_ID && !id.is_empty()).collect();
    let pb = spinner("reading HMDB metabolites...");
    let classes = load_hmdb_classes(open_reader(&hmdb_file), &wanted, &hmdb_file);
    pb.finish_and_clear();
    eprintln!("{} of {} wanted HMDB IDs found", classes.len(), wanted.len());
    let annotated = annotate(&bigg, hmdb_col, &classes);
    annotated.save(&out_file, b'\t');
    section_header("Finished!");
    eprintln!("Annotated table: {}", out_file.display());
    eprintln!();
}


fn load_hmdb_classes<R: BufRead>(reader: R, wanted: &HashSet<String>, hmdb_file: &Path)
        -> HashMap<String, ChemicalClasses> {
    // Each <metabolite> element gives all of its accessions (primary and secondary) and the first
    // of each class tag. Every wanted accession of the metabolite gets its classes.
    let tag_re = Regex::new(r"<(accession|super_class|class|sub_class)>([^<]*)</").unwrap();
    let mut classes = HashMap::new();
    let mut accessions: Vec<String> = Vec::new();
    let mut current = ChemicalClasses::default();
    for line in reader.split(b'\n') {
        let line = line.unwrap_or_else(|e| {
            quit_with_error(&format!("failed to read {}\n{}", hmdb_file.display(), e));
        });
        let line = String::from_utf8_lossy(&line);
        let line = line.trim();
        if line.starts_with("<metabolite>") {
            accessions.clear();
            current = ChemicalClasses::default();
        } else if line.starts_with("</metabolite>") {
            for id in accessions.drain(..).filter(|id| wanted.contains(id)) {
                classes.insert(id, current.clone());
            }
            continue;
        }
        let Some(captures) = tag_re.captures(line) else { continue };
        let value = unescape_xml(&captures[2]);
        let slot = match &captures[1] {
            "accession"   => { accessions.push(value); continue; }
            "super_class" => &mut current.super_class,
            "class"       => &mut current.class,
            _             => &mut current.sub_class,
        };
        if slot.is_none() { *slot = Some(value); }
    }
    classes
}


fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"")
        .replace("&apos;", "'").replace("&amp;", "&")
}


fn annotate(bigg: &Frame, hmdb_col: usize, classes: &HashMap<String, ChemicalClasses>)
        -> Frame {
    let mut header = bigg.header.clone();
    header.extend(["SuperClass", "Class", "SubClass"].iter().map(|h| h.to_string()));
    let mut annotated = Frame::new(header);
    let unclassified = ChemicalClasses::default();
    for row in &bigg.rows {
        let mut new_row = row.clone();
        new_row.truncate(bigg.header.len());
        let c = classes.get(cell(row, hmdb_col)).unwrap_or(&unclassified);
        new_row.extend(c.columns());
        annotated.rows.push(new_row);
    }
    annotated
}

// This file contains miscellaneous functions used by various parts of MetModels.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use flate2::read::MultiGzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{File, copy, create_dir_all, read_dir};
use std::io::{prelude::*, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;


pub fn create_dir(dir_path: &Path) {
    match create_dir_all(dir_path) {
        Ok(_) => {},
        Err(e) => quit_with_error(&format!("failed to create directory {}\n{}", dir_path.display(), e)),
    }
}


pub fn copy_file(source: &Path, destination: &Path) {
    if let Err(e) = copy(source, destination) {
        quit_with_error(&format!("failed to copy {} to {}\n{}",
                                 source.display(), destination.display(), e));
    }
}


pub fn open_reader(filename: &Path) -> Box<dyn BufRead> {
    // Returns a buffered reader that works on both unzipped and gzipped files.
    let file = File::open(filename).unwrap_or_else(|e| {
        quit_with_error(&format!("unable to open {}\n{}", filename.display(), e));
    });
    if is_file_gzipped(filename) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    }
}


pub fn load_file_lines(filename: &Path) -> Vec<String> {
    // Lines are decoded lossily, so latin-1 text (common in abundance tables) doesn't fail.
    let mut reader = open_reader(filename);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let bytes = reader.read_until(b'\n', &mut buf).unwrap_or_else(|e| {
            quit_with_error(&format!("failed to read line from {}\n{}", filename.display(), e));
        });
        if bytes == 0 { break; }
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') { buf.pop(); }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
    lines
}


pub fn find_files(in_dir: &Path, prefix: &str, suffix: &str) -> Vec<PathBuf> {
    // Returns all files in the directory whose names start with the prefix and end with the
    // suffix, in sorted order.
    let paths = match read_dir(in_dir) {
        Ok(paths) => paths,
        Err(e) => {
            quit_with_error(&format!("unable to read directory {}\n{}", in_dir.display(), e));
        },
    };
    let mut found: Vec<PathBuf> = paths.flatten().map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = file_name(path);
            name.starts_with(prefix) && name.ends_with(suffix) &&
                name.len() >= prefix.len() + suffix.len()
        }).collect();
    found.sort_unstable();
    found
}


pub fn find_subdirectories(in_dir: &Path) -> Vec<String> {
    let paths = match read_dir(in_dir) {
        Ok(paths) => paths,
        Err(e) => {
            quit_with_error(&format!("unable to read directory {}\n{}", in_dir.display(), e));
        },
    };
    let mut names: Vec<String> = paths.flatten().map(|entry| entry.path())
        .filter(|path| path.is_dir()).map(|path| file_name(&path)).collect();
    names.sort_unstable();
    names
}


pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().into_owned()
}


pub fn sample_name_field(path: &Path, field: usize) -> String {
    // Sample names are embedded in file names, e.g. field 3 of minimal_fluxes_exchange_S1.csv.
    let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    match stem.split('_').nth(field) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => quit_with_error(&format!("{} has no _-separated field {}", file_name(path), field)),
    }
}


pub fn check_if_file_exists(filename: &Path) {
    // Quits with an error if the given path is not an existing file.
    if !filename.exists() {
        quit_with_error(&format!("file does not exist: {}", filename.display()));
    }
    if !filename.is_file() {
        quit_with_error(&format!("{} is not a file", filename.display()));
    }
}


pub fn check_if_dir_exists(dir: &Path) {
    // Quits with an error if the given path is not an existing directory.
    if !dir.exists() {
        quit_with_error(&format!("directory does not exist: {}", dir.display()));
    }
    if !dir.is_dir() {
        quit_with_error(&format!("{} is not a directory", dir.display()));
    }
}


pub fn check_if_dir_is_not_dir(dir: &Path) {
    // Quits with an error if the given path exists but is not a directory (not existing is okay).
    if dir.exists() && !dir.is_dir() {
        quit_with_error(&format!("{} exists but is not a directory", dir.display()));
    }
}


pub fn create_parent_dir(filename: &Path) {
    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir(parent);
        }
    }
}


#[cfg(not(test))]
pub fn quit_with_error(text: &str) -> ! {
    // For friendly error messages, this function normally just prints the error and quits.
    eprintln!();
    eprintln!("Error: {}", text);
    std::process::exit(1);
}
#[cfg(test)]
pub fn quit_with_error(text: &str) -> ! {
    // But when running unit tests, this function instead panics so I can catch it for the test.
    panic!("{}", text);
}


fn is_file_gzipped(filename: &Path) -> bool {
    // Returns true if the file appears to be gzipped (based on the first two bytes). Files too
    // small to hold the magic bytes are treated as plain text.
    let mut file = match File::open(filename) {
        Ok(file) => file,
        Err(e)   => quit_with_error(&format!("unable to open {}\n{}", filename.display(), e)),
    };
    let mut buf = [0u8; 2];
    match file.read_exact(&mut buf) {
        Ok(_)  => buf[0] == 31 && buf[1] == 139,
        Err(_) => false,
    }
}


pub fn check_threads(threads: usize) {
    if threads < 1 {
        quit_with_error("--threads must be at least 1");
    }
}


pub fn parse_number(text: &str) -> Option<f64> {
    // Empty cells and NaN cells (as written by pandas) both count as missing.
    let text = text.trim();
    if text.is_empty() { return None; }
    match text.parse::<f64>() {
        Ok(v) if v.is_nan() => None,
        Ok(v)               => Some(v),
        Err(_)              => None,
    }
}


pub fn format_float(num: f64) -> String {
    // The shortest decimal that reads back as the same float, so small fluxes are never written
    // as zero. Whole numbers have no decimal point.
    if num == 0.0 { return "0".to_string() }
    format!("{}", num)
}


pub fn format_optional(num: Option<f64>) -> String {
    num.map(format_float).unwrap_or_default()
}


pub fn round_decimals(num: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (num * factor).round() / factor
}


pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() { return None; }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}


pub fn sample_std(values: &[f64]) -> Option<f64> {
    // Standard deviation with one degree of freedom removed, undefined for fewer than two values.
    if values.len() < 2 { return None; }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}


pub fn format_list(items: &[String]) -> String {
    format!("[{}]", items.join(","))
}


pub fn spinner(message: &str) -> ProgressBar {
    if cfg!(test) {
        ProgressBar::hidden() // don't show a spinner during unit tests
    } else {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
                .template("{spinner} {msg}").unwrap(),
        );
        pb.set_message(message.to_string());
        pb
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::{assert_almost_eq, make_gzipped_test_file, make_test_file};

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(0.111111), "0.111111");
        assert_eq!(format_float(0.1111111), "0.1111111");
        assert_eq!(format_float(10.0), "10");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_format_float_small_values() {
        assert_eq!(format_float(5e-7), "0.0000005");
        assert_eq!(format_float(-0.0000001), "-0.0000001");
        assert_eq!(format_float(1.23e-8), "0.0000000123");
        assert_eq!(parse_number(&format_float(1.23e-8)), Some(1.23e-8));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1.5"), Some(1.5));
        assert_eq!(parse_number(" -3 "), Some(-3.0));
        assert_eq!(parse_number("1e-3"), Some(0.001));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_almost_eq(mean(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5, 1e-12);
        assert_eq!(sample_std(&[5.0]), None);
        assert_almost_eq(sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(),
                         2.138089935299395, 1e-12);
    }

    #[test]
    fn test_round_decimals() {
        assert_almost_eq(round_decimals(1.23456, 2), 1.23, 1e-12);
        assert_almost_eq(round_decimals(2.5, 0), 3.0, 1e-12);
        assert_almost_eq(round_decimals(-0.126, 2), -0.13, 1e-12);
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(&[]), "[]");
        assert_eq!(format_list(&["a".to_string(), "b".to_string()]), "[a,b]");
    }

    #[test]
    fn test_find_files() {
        let dir = tempdir().unwrap();
        make_test_file(&dir.path().join("exchanges_grow_b.csv"), "x");
        make_test_file(&dir.path().join("exchanges_grow_a.csv"), "x");
        make_test_file(&dir.path().join("exchanges_grow_a.tsv"), "x");
        make_test_file(&dir.path().join("other_a.csv"), "x");
        let found = find_files(dir.path(), "exchanges_grow_", ".csv");
        let names: Vec<String> = found.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["exchanges_grow_a.csv", "exchanges_grow_b.csv"]);
    }

    #[test]
    fn test_sample_name_field() {
        let path = Path::new("flux/minimal_fluxes_exchange_SRR123.csv");
        assert_eq!(sample_name_field(path, 3), "SRR123");
        assert_eq!(sample_name_field(path, 0), "minimal");
        assert!(std::panic::catch_unwind(|| { sample_name_field(path, 4); }).is_err());
    }

    #[test]
    fn test_load_file_lines() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let gzipped = dir.path().join("gzipped.txt.gz");
        make_test_file(&plain, "a\r\nb\n\nc");
        make_gzipped_test_file(&gzipped, "a\nb\n");
        assert_eq!(load_file_lines(&plain), vec!["a", "b", "", "c"]);
        assert_eq!(load_file_lines(&gzipped), vec!["a", "b"]);
    }

    #[test]
    fn test_check_if_file_exists() {
        let dir = tempdir().unwrap();
        assert!(std::panic::catch_unwind(|| {
            check_if_file_exists(&dir.path().join("missing.csv"));
        }).is_err());
        assert!(std::panic::catch_unwind(|| {
            check_if_file_exists(dir.path());
        }).is_err());
    }
}

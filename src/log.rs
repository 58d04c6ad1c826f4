// This file contains functions for formatting MetModels's stderr output.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use chrono::Local;
use colored::Colorize;


pub fn section_header(text: &str) {
    let date = Local::now().format("%Y-%m-%d %H:%M:%S");
    let header = format!("{} {}", text.bold().bright_yellow().underline(),
                         format!("({})", date).dimmed());
    eprintln!();
    eprintln!("{}", header);
}


pub fn explanation(text: &str) {
    let width = terminal_width();
    for line in textwrap::wrap(text, width) {
        eprintln!("{}", line.dimmed());
    }
    eprintln!();
}


pub fn warning(text: &str) {
    eprintln!("{}", format!("WARNING: {}", text).yellow());
}


fn terminal_width() -> usize {
    // Wraps at the terminal width, but never wider than 100 columns and falls back to 80 when
    // stderr isn't a terminal.
    match term_size::dimensions_stderr() {
        Some((w, _)) if w > 0 => w.min(100),
        _ => 80,
    }
}

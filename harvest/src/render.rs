// harvest/src/render.rs
//
// Terminal output: comfy-table for tabular reports, miette for diagnostics.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use miette::Diagnostic;
use serde::Serialize;

pub fn table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<comfy_table::Cell>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Prints a diagnostic with its code and help, then exits with status 1.
pub fn fail<E>(err: E) -> !
where
    E: Diagnostic + Send + Sync + 'static,
{
    eprintln!("{:?}", miette::Report::new(err));
    std::process::exit(1);
}

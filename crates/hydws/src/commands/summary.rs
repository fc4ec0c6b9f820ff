use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use hydws_core::record::format_timestamp;
use hydws_core::HydraulicStore;

use super::query::load_store;

pub fn run(input: &Path) -> Result<()> {
    let store = load_store(input)?;
    println!("{}", summary_table(&store));
    Ok(())
}

pub fn summary_table(store: &HydraulicStore) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![
            "Borehole", "Section", "Public ID", "Rows", "Columns", "First", "Last",
        ]);

    for borehole in store.boreholes() {
        let borehole_name = borehole.name.as_deref().unwrap_or("-");
        if borehole.is_empty() {
            table.add_row(vec![
                borehole_name.to_string(),
                "-".to_string(),
                borehole.id().to_string(),
                "0".to_string(),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }
        for section in borehole.sections() {
            let series = section.series();
            let columns: Vec<&str> = series.columns().map(|field| field.canonical_name()).collect();
            let stamp = |ts: Option<NaiveDateTime>| {
                ts.as_ref().map(format_timestamp).unwrap_or_default()
            };
            table.add_row(vec![
                borehole_name.to_string(),
                section.name().unwrap_or("-").to_string(),
                section.id().to_string(),
                series.len().to_string(),
                columns.join(", "),
                stamp(series.first_timestamp()),
                stamp(series.last_timestamp()),
            ]);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydws_core::Borehole;

    #[test]
    fn lists_every_section_of_a_borehole() {
        let borehole = Borehole::placeholder(2);
        let ids: Vec<String> = borehole.sections().map(|s| s.id().to_string()).collect();
        let mut store = HydraulicStore::new();
        store.insert_borehole(borehole).unwrap();

        let rendered = summary_table(&store).to_string();
        for id in ids {
            assert!(rendered.contains(&id));
        }
    }
}

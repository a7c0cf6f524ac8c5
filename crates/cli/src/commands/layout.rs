use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use photojournal_core::Journal;

use super::{resolve_folder, short_id};

pub async fn run(
    journal: &Journal,
    width: f64,
    padding: f64,
    folder: Option<&str>,
    json: bool,
) -> Result<()> {
    let folder = match folder {
        Some(f) => Some(resolve_folder(journal, f).await?),
        None => None,
    };
    let (entries, layout) = journal
        .gallery_layout(folder.as_ref().map(|f| f.id), width, padding)
        .await?;

    if json {
        let cells: Vec<_> = entries
            .iter()
            .zip(&layout.placements)
            .map(|(entry, placement)| {
                serde_json::json!({
                    "id": entry.id,
                    "column": placement.column,
                    "rect": placement.rect,
                })
            })
            .collect();
        let out = serde_json::json!({
            "width": width,
            "padding": padding,
            "content_height": layout.content_height,
            "cells": cells,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Col"),
        Cell::new("X"),
        Cell::new("Y"),
        Cell::new("W"),
        Cell::new("H"),
    ]);
    for (entry, placement) in entries.iter().zip(&layout.placements) {
        let rect = placement.rect;
        table.add_row(vec![
            Cell::new(short_id(&entry.id)),
            Cell::new(placement.column),
            Cell::new(format!("{:.1}", rect.x)),
            Cell::new(format!("{:.1}", rect.y)),
            Cell::new(format!("{:.1}", rect.width)),
            Cell::new(format!("{:.1}", rect.height)),
        ]);
    }
    println!("{table}");
    println!("Content height: {:.1}", layout.content_height);
    Ok(())
}

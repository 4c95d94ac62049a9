//! Worksheet outline files.
//!
//! A worksheet outline is a flat JSON list of cells in document order:
//!
//! ```json
//! { "cells": [ { "kind": "section", "text": "Setup", "folded": true },
//!              { "kind": "input", "text": "a: 1" } ] }
//! ```
//!
//! Headings marked `folded` are folded after loading, innermost first, so a
//! folded section may contain folded subsections.

use std::path::Path;

use anyhow::Context;
use quill_core::{CellKind, Worksheet};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct OutlineFile {
    cells: Vec<OutlineCell>,
}

#[derive(Debug, Deserialize)]
struct OutlineCell {
    kind: CellKind,
    #[serde(default)]
    text: String,
    #[serde(default)]
    folded: bool,
}

/// Load a worksheet outline from disk.
pub fn load(path: &Path) -> anyhow::Result<Worksheet> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read worksheet {}", path.display()))?;
    parse(&source).with_context(|| format!("Invalid worksheet {}", path.display()))
}

/// Build a worksheet from outline JSON.
pub fn parse(source: &str) -> anyhow::Result<Worksheet> {
    let outline: OutlineFile = serde_json::from_str(source)?;

    let mut sheet = Worksheet::new();
    let mut folds = Vec::new();
    for cell in outline.cells {
        let id = sheet.push(cell.kind, cell.text);
        if cell.folded {
            if cell.kind.heading_level().is_none() {
                anyhow::bail!("only headings can be folded, found a folded {:?} cell", cell.kind);
            }
            folds.push(id);
        }
    }

    // Later headings first: they are still top level when folded
    for id in folds.into_iter().rev() {
        sheet.fold(id)?;
    }
    Ok(sheet)
}

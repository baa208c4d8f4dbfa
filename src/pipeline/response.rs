//! Typed model of a document-analysis response.
//!
//! The service answers with a flat list of blocks that reference each other
//! by id: a `TABLE` lists its `CELL`s, a cell lists its `WORD`s, a `KEY`
//! lists its words and points at a `VALUE` block, and so on. This module
//! deserialises that wire shape ([`RawResponse`]), converts it into a tagged
//! union ([`Block`]) indexed by id ([`AnalysisDocument`]), and exposes the
//! two lookups the mapper needs: form key/value pairs and table grids.
//!
//! The wire shape matches the JSON the service returns, so a response saved
//! with `--save-responses` (or downloaded from the console) can be re-mapped
//! offline.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Wire shape ───────────────────────────────────────────────────────────

/// The analysis result as returned by the service (all pages merged).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawBlock {
    pub block_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RawRelationship>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawRelationship {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

impl RawBlock {
    fn related(&self, kind: &str) -> Vec<String> {
        self.relationships
            .iter()
            .filter(|r| r.kind == kind)
            .flat_map(|r| r.ids.iter().cloned())
            .collect()
    }
}

// ── Typed tree ───────────────────────────────────────────────────────────

/// Which side of a form field a key/value block is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvKind {
    Key,
    Value,
}

/// One block of the analysis result.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Page { children: Vec<String> },
    Line { text: String, children: Vec<String> },
    Word { text: String },
    /// A form key or value. Keys point at their value via `values`.
    KeyValue {
        kind: KvKind,
        children: Vec<String>,
        values: Vec<String>,
    },
    Table { cells: Vec<String> },
    /// A table cell; `row` and `column` are 1-based.
    Cell {
        row: u32,
        column: u32,
        children: Vec<String>,
    },
    SelectionElement { selected: bool },
    Other,
}

/// A form field: key text and value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// A table as a dense grid of raw cell texts, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// An id-indexed analysis result.
#[derive(Debug, Clone, Default)]
pub struct AnalysisDocument {
    blocks: HashMap<String, Block>,
    order: Vec<String>,
}

impl AnalysisDocument {
    /// Build the typed tree, rejecting dangling references.
    pub fn from_raw(raw: &RawResponse) -> Result<Self, InvoiceError> {
        let mut doc = AnalysisDocument {
            blocks: HashMap::with_capacity(raw.blocks.len()),
            order: Vec::with_capacity(raw.blocks.len()),
        };

        for b in &raw.blocks {
            let block = convert_block(b)?;
            if doc.blocks.insert(b.id.clone(), block).is_none() {
                doc.order.push(b.id.clone());
            }
        }

        for b in &raw.blocks {
            for rel in &b.relationships {
                if let Some(missing) = rel.ids.iter().find(|id| !doc.blocks.contains_key(*id)) {
                    return Err(InvoiceError::InvalidResponse(format!(
                        "block {} references unknown block {}",
                        b.id, missing
                    )));
                }
            }
        }

        Ok(doc)
    }

    /// Parse and index a JSON response.
    pub fn from_json(json: &str) -> Result<Self, InvoiceError> {
        let raw: RawResponse = serde_json::from_str(json)
            .map_err(|e| InvoiceError::InvalidResponse(format!("not an analysis response: {e}")))?;
        Self::from_raw(&raw)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Blocks in response order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.order.iter().filter_map(|id| self.blocks.get(id))
    }

    /// Text of the given child blocks, words joined by single spaces.
    ///
    /// Selection elements render as `[X]` / `[ ]`.
    pub fn text_of(&self, ids: &[String]) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for id in ids {
            match self.blocks.get(id) {
                Some(Block::Word { text }) | Some(Block::Line { text, .. }) => parts.push(text),
                Some(Block::SelectionElement { selected: true }) => parts.push("[X]"),
                Some(Block::SelectionElement { selected: false }) => parts.push("[ ]"),
                _ => {}
            }
        }
        parts.join(" ")
    }

    /// Form key/value pairs in document order.
    pub fn key_values(&self) -> Vec<KeyValue> {
        self.iter()
            .filter_map(|block| match block {
                Block::KeyValue {
                    kind: KvKind::Key,
                    children,
                    values,
                } => {
                    let value = values
                        .iter()
                        .filter_map(|id| match self.blocks.get(id) {
                            Some(Block::KeyValue { children, .. }) => Some(self.text_of(children)),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    Some(KeyValue {
                        key: self.text_of(children),
                        value,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Every table as a grid, in document order.
    pub fn tables(&self) -> Vec<Table> {
        self.iter()
            .filter_map(|block| match block {
                Block::Table { cells } => Some(self.table_grid(cells)),
                _ => None,
            })
            .collect()
    }

    fn table_grid(&self, cell_ids: &[String]) -> Table {
        let cells: Vec<(u32, u32, String)> = cell_ids
            .iter()
            .filter_map(|id| match self.blocks.get(id) {
                Some(Block::Cell { row, column, children }) => {
                    Some((*row, *column, self.text_of(children)))
                }
                _ => None,
            })
            .collect();

        let rows = cells.iter().map(|c| c.0).max().unwrap_or(0) as usize;
        let cols = cells.iter().map(|c| c.1).max().unwrap_or(0) as usize;
        let mut grid = vec![vec![String::new(); cols]; rows];
        for (row, col, text) in cells {
            grid[row as usize - 1][col as usize - 1] = text;
        }
        Table { rows: grid }
    }
}

/// Upper bound on a cell's row or column index. Grids are allocated from
/// these, so a corrupt response must not size them.
const MAX_TABLE_INDEX: u32 = 10_000;

fn convert_block(b: &RawBlock) -> Result<Block, InvoiceError> {
    let block = match b.block_type.as_str() {
        "PAGE" => Block::Page {
            children: b.related("CHILD"),
        },
        "LINE" => Block::Line {
            text: b.text.clone().unwrap_or_default(),
            children: b.related("CHILD"),
        },
        "WORD" => Block::Word {
            text: b.text.clone().unwrap_or_default(),
        },
        "KEY_VALUE_SET" => {
            let kind = if b.entity_types.iter().any(|t| t == "KEY") {
                KvKind::Key
            } else {
                KvKind::Value
            };
            Block::KeyValue {
                kind,
                children: b.related("CHILD"),
                values: b.related("VALUE"),
            }
        }
        "TABLE" => Block::Table {
            cells: b.related("CHILD"),
        },
        "CELL" => {
            let (row, column) = match (b.row_index, b.column_index) {
                (Some(r), Some(c))
                    if (1..=MAX_TABLE_INDEX).contains(&r) && (1..=MAX_TABLE_INDEX).contains(&c) =>
                {
                    (r, c)
                }
                _ => {
                    return Err(InvoiceError::InvalidResponse(format!(
                        "cell {} has no valid row/column index (1..={})",
                        b.id, MAX_TABLE_INDEX
                    )))
                }
            };
            Block::Cell {
                row,
                column,
                children: b.related("CHILD"),
            }
        }
        "SELECTION_ELEMENT" => Block::SelectionElement {
            selected: b.selection_status.as_deref() == Some("SELECTED"),
        },
        _ => Block::Other,
    };
    Ok(block)
}

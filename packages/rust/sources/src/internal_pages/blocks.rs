//! Typed views over workspace page records.
//!
//! Blocks and page properties are tagged by a `type` field whose value
//! names a sibling payload field. Both are decoded into closed enums with a
//! catch-all variant, so unknown kinds map to "no text" rather than failing
//! the page.

use serde::Deserialize;

/// Glyph prefixed to list items.
const BULLET: &str = "• ";

/// A rich-text run; only the plain rendering matters here.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

fn join_runs(runs: &[RichText]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TextPayload {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TableRowPayload {
    #[serde(default)]
    pub cells: Vec<Vec<RichText>>,
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// One structural block of a page body.
#[derive(Debug, Deserialize)]
pub(crate) struct Block {
    pub id: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub content: BlockContent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum BlockContent {
    #[serde(rename = "paragraph")]
    Paragraph { paragraph: TextPayload },
    #[serde(rename = "heading_1")]
    Heading1 { heading_1: TextPayload },
    #[serde(rename = "heading_2")]
    Heading2 { heading_2: TextPayload },
    #[serde(rename = "heading_3")]
    Heading3 { heading_3: TextPayload },
    #[serde(rename = "bulleted_list_item")]
    BulletedListItem { bulleted_list_item: TextPayload },
    #[serde(rename = "numbered_list_item")]
    NumberedListItem { numbered_list_item: TextPayload },
    #[serde(rename = "to_do")]
    ToDo { to_do: TextPayload },
    #[serde(rename = "toggle")]
    Toggle { toggle: TextPayload },
    #[serde(rename = "quote")]
    Quote { quote: TextPayload },
    #[serde(rename = "callout")]
    Callout { callout: TextPayload },
    #[serde(rename = "code")]
    Code { code: TextPayload },
    #[serde(rename = "table_row")]
    TableRow { table_row: TableRowPayload },
    #[serde(other)]
    Unsupported,
}

impl Block {
    /// Plain text for this block; empty when the block carries none.
    ///
    /// Headings are wrapped in `【】`, list items get a bullet, table cells
    /// are joined with ` | `.
    pub fn text(&self) -> String {
        match &self.content {
            BlockContent::Paragraph { paragraph: p }
            | BlockContent::ToDo { to_do: p }
            | BlockContent::Toggle { toggle: p }
            | BlockContent::Quote { quote: p }
            | BlockContent::Callout { callout: p }
            | BlockContent::Code { code: p } => join_runs(&p.rich_text),
            BlockContent::Heading1 { heading_1: p }
            | BlockContent::Heading2 { heading_2: p }
            | BlockContent::Heading3 { heading_3: p } => {
                let text = join_runs(&p.rich_text);
                if text.is_empty() {
                    text
                } else {
                    format!("【{text}】")
                }
            }
            BlockContent::BulletedListItem { bulleted_list_item: p }
            | BlockContent::NumberedListItem { numbered_list_item: p } => {
                let text = join_runs(&p.rich_text);
                if text.is_empty() {
                    text
                } else {
                    format!("{BULLET}{text}")
                }
            }
            BlockContent::TableRow { table_row } => {
                let cells: Vec<String> = table_row.cells.iter().map(|c| join_runs(c)).collect();
                if cells.iter().all(String::is_empty) {
                    String::new()
                } else {
                    cells.join(" | ")
                }
            }
            BlockContent::Unsupported => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Page properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SelectOption {
    #[serde(default)]
    pub name: String,
}

/// A page property value.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    #[serde(other)]
    Unknown,
}

impl PropertyValue {
    /// Decode one raw property; anything unrecognized becomes [`PropertyValue::Unknown`].
    pub fn decode(raw: serde_json::Value) -> Self {
        serde_json::from_value(raw).unwrap_or(Self::Unknown)
    }

    pub fn is_title(&self) -> bool {
        matches!(self, Self::Title { .. })
    }

    pub fn text(&self) -> String {
        match self {
            Self::Title { title: runs } | Self::RichText { rich_text: runs } => join_runs(runs),
            Self::Select { select } => select.as_ref().map(|s| s.name.clone()).unwrap_or_default(),
            Self::Unknown => String::new(),
        }
    }
}

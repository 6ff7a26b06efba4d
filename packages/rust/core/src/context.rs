//! Grounding text handed to the completion collaborator.

use serde::Serialize;

use groundwork_shared::{Passage, SourceKind};

/// Rendered in place of sections when nothing was retrieved.
pub const NO_GROUNDING: &str = "参考情報は見つかりませんでした。";

/// Date format for ticket creation timestamps.
const TICKET_DATE_FORMAT: &str = "%Y/%m/%d";

/// The `{title, locator, body}` triple surfaced to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub title: String,
    pub locator: String,
    pub body: String,
    pub source: SourceKind,
}

impl From<&Passage> for Citation {
    fn from(passage: &Passage) -> Self {
        Self {
            title: passage.title.clone(),
            locator: passage.locator.clone(),
            body: passage.body.clone(),
            source: passage.source,
        }
    }
}

fn section_heading(source: SourceKind) -> &'static str {
    match source {
        SourceKind::PublicDocs => "【参考情報（ヘルプセンター）】",
        SourceKind::InternalPages => "【参考情報（社内ページ）】",
        SourceKind::TicketHistory => "【参考情報（過去の問い合わせ）】",
    }
}

/// Retrieved passages grouped by source, in ranked order within each group.
#[derive(Debug, Clone, Default)]
pub struct GroundingContext {
    sections: Vec<(SourceKind, Vec<Passage>)>,
}

impl GroundingContext {
    pub fn new(passages: &[Passage]) -> Self {
        let sections = SourceKind::ALL
            .iter()
            .map(|&source| {
                let group: Vec<Passage> = passages
                    .iter()
                    .filter(|p| p.source == source)
                    .cloned()
                    .collect();
                (source, group)
            })
            .filter(|(_, group)| !group.is_empty())
            .collect();
        Self { sections }
    }

    /// `true` means no grounding was found; callers must not guess.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> impl Iterator<Item = (SourceKind, &[Passage])> {
        self.sections.iter().map(|(s, g)| (*s, g.as_slice()))
    }

    pub fn render(&self) -> String {
        if self.is_empty() {
            return NO_GROUNDING.to_string();
        }

        self.sections
            .iter()
            .map(|(source, group)| {
                let entries: Vec<String> = group
                    .iter()
                    .enumerate()
                    .map(|(i, p)| render_entry(i + 1, p))
                    .collect();
                format!("{}\n{}", section_heading(*source), entries.join("\n\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn render_entry(number: usize, passage: &Passage) -> String {
    let mut lines = vec![
        format!("{number}. {}", passage.title),
        format!("URL: {}", passage.locator),
    ];

    let mut facts = Vec::new();
    if let Some(status) = &passage.ticket_status {
        facts.push(format!("ステータス: {status}"));
    }
    if let Some(created) = passage.created_at {
        facts.push(format!("作成日: {}", created.format(TICKET_DATE_FORMAT)));
    }
    if !facts.is_empty() {
        lines.push(facts.join(" / "));
    }

    if !passage.body.is_empty() {
        lines.push(format!("内容: {}", passage.body));
    }
    lines.join("\n")
}

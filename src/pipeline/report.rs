//! Per-scene batch outcomes and the plain-text summary table.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::assets::AssetKind;
use crate::scene::Scene;

const TITLE_WIDTH: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneOutcome {
    Generated(PathBuf),
    /// The asset already existed and was left alone.
    Skipped,
    Failed(String),
    /// The batch stopped before reaching this scene.
    NotAttempted,
}

impl SceneOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SceneOutcome::Generated(_) => "Generated",
            SceneOutcome::Skipped => "Skipped",
            SceneOutcome::Failed(_) => "Failed",
            SceneOutcome::NotAttempted => "Not attempted",
        }
    }
}

/// Results of one batch run, in scene order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    kind: AssetKind,
    rows: Vec<(Scene, SceneOutcome)>,
}

impl BatchReport {
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, scene: &Scene, outcome: SceneOutcome) {
        self.rows.push((scene.clone(), outcome));
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn outcome(&self, scene_id: u32) -> Option<&SceneOutcome> {
        self.rows
            .iter()
            .find(|(scene, _)| scene.id == scene_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn generated(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::Generated(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::Failed(_)))
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::NotAttempted))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&SceneOutcome) -> bool) -> usize {
        self.rows.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Paths produced in this run, by scene id.
    pub fn generated_paths(&self) -> BTreeMap<u32, PathBuf> {
        self.rows
            .iter()
            .filter_map(|(scene, outcome)| match outcome {
                SceneOutcome::Generated(path) => Some((scene.id, path.clone())),
                _ => None,
            })
            .collect()
    }

    /// Render the summary table. Verbose adds characters and tone columns.
    pub fn render_table(&self, verbose: bool) -> String {
        let mut header = vec!["Scene", "Title", "Status"];
        if verbose {
            header.extend(["Characters", "Tone"]);
        }

        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|(scene, outcome)| {
                let mut row = vec![
                    scene.id.to_string(),
                    truncate_title(&scene.title),
                    outcome.label().to_string(),
                ];
                if verbose {
                    row.push(character_preview(&scene.characters));
                    row.push(scene.tone.clone());
                }
                row
            })
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let kind = match self.kind {
            AssetKind::Image => "Image",
            AssetKind::Video => "Video",
        };
        let mut out = format!("Scene {} Processing Summary\n", kind);
        push_row(&mut out, header.iter().map(|h| h.to_string()), &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_row(&mut out, rule.into_iter(), &widths);
        for row in rows {
            push_row(&mut out, row.into_iter(), &widths);
        }
        out
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    let _ = writeln!(out, "{}", line.join(" | ").trim_end());
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let head: String = title.chars().take(TITLE_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

fn character_preview(characters: &[String]) -> String {
    if characters.is_empty() {
        return "None".to_string();
    }
    let mut preview = characters
        .iter()
        .take(2)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if characters.len() > 2 {
        preview.push_str("...");
    }
    preview
}

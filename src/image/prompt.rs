//! Image prompt construction.

use crate::scene::Scene;

/// Style used for tones outside the known table.
pub const DEFAULT_STYLE: &str = "cinematic and atmospheric";

const TONE_STYLES: [(&str, &str); 15] = [
    ("suspenseful", "dramatic lighting with deep shadows and tension"),
    ("mysterious", "atmospheric with fog and hidden details"),
    ("romantic", "warm golden lighting and soft focus"),
    ("comedic", "bright, colorful, and whimsical style"),
    ("dramatic", "intense lighting and strong contrasts"),
    ("eerie", "dark, unsettling atmosphere with cold colors"),
    ("peaceful", "soft, calming colors and gentle lighting"),
    ("chaotic", "dynamic composition with bold colors"),
    ("melancholic", "muted colors and soft, diffused lighting"),
    ("triumphant", "bright, heroic lighting with warm tones"),
    ("tense", "sharp contrasts and angular compositions"),
    ("whimsical", "playful colors and fantastical elements"),
    ("dark", "low-key lighting with stark shadows"),
    ("hopeful", "warm, uplifting lighting and bright colors"),
    ("nostalgic", "vintage tones and soft, dreamy quality"),
];

const QUALITY_CLAUSES: [&str; 2] = [
    "High quality, detailed, professional photography",
    "16:9 aspect ratio, cinematic composition",
];

/// Visual style for a tone, matched case-insensitively.
pub fn tone_style(tone: &str) -> &'static str {
    let tone = tone.trim().to_lowercase();
    TONE_STYLES
        .iter()
        .find(|(name, _)| *name == tone)
        .map(|(_, style)| *style)
        .unwrap_or(DEFAULT_STYLE)
}

pub fn build_image_prompt(scene: &Scene) -> String {
    let mut parts = vec![
        format!("A cinematic scene titled '{}'", scene.title),
        format!("Setting: {}", scene.setting),
    ];
    if !scene.characters.is_empty() {
        parts.push(format!("Characters: {}", scene.characters.join(", ")));
    }
    parts.push(format!("Style: {}", tone_style(&scene.tone)));
    parts.extend(QUALITY_CLAUSES.iter().map(|s| s.to_string()));

    let mut prompt = parts.join(". ");
    prompt.push('.');
    prompt
}

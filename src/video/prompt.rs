//! Deterministic video prompt construction.

use std::path::Path;

use crate::scene::Scene;

const SEPARATOR: &str = ". ";

/// Technical directives appended to every video prompt.
const STYLE_DIRECTIVES: [&str; 4] = [
    "Style: Cinematic, high quality, professional lighting",
    "Camera: Dynamic cinematography with smooth movements",
    "Duration: 8-12 seconds",
    "Quality: 1080p resolution, 24fps",
];

/// Build the video prompt for `scene`.
///
/// Order is fixed: title, setting, characters (omitted when empty), action,
/// tone verbatim, then the style directives. The reference image is accepted
/// but never rendered into the text, so it does not change the cache key.
pub fn build_video_prompt(scene: &Scene, _reference_image: Option<&Path>) -> String {
    let mut parts = vec![
        format!("Scene: {}", scene.title),
        format!("Setting: {}", scene.setting),
    ];

    if !scene.characters.is_empty() {
        parts.push(format!("Characters: {}", scene.characters.join(", ")));
    }

    parts.push(format!("Action: {}", scene.summary));
    parts.push(format!("Tone: {}", scene.tone));
    parts.extend(STYLE_DIRECTIVES.iter().map(|s| s.to_string()));

    parts.join(SEPARATOR)
}

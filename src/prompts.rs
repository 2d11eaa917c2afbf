//! Prompt text for the four modes and the input checks that run before any
//! service call.

use crate::codec::SourceImage;
use crate::error::{LabError, LabResult};

pub const DEFAULT_ANALYSIS_PROMPT: &str = "Describe this image in detail.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickFilter {
    pub name: &'static str,
    pub prompt: &'static str,
}

pub const QUICK_FILTERS: &[QuickFilter] = &[
    QuickFilter {
        name: "Grayscale",
        prompt: "Convert the image to black and white grayscale.",
    },
    QuickFilter {
        name: "Sepia",
        prompt: "Apply a warm, brownish sepia tone to the image.",
    },
    QuickFilter {
        name: "Vintage",
        prompt: "Give the image a faded, vintage photograph look from the 1970s.",
    },
    QuickFilter {
        name: "Cinematic",
        prompt: "Apply a cinematic color grade with high contrast and teal and orange tones.",
    },
    QuickFilter {
        name: "Vibrant",
        prompt: "Enhance the colors to make them more vibrant and saturated.",
    },
    QuickFilter {
        name: "Watercolor",
        prompt: "Transform the image to look like a watercolor painting.",
    },
];

pub const FONT_FAMILIES: &[&str] = &["sans-serif", "serif", "monospace", "cursive"];
pub const FONT_SIZES: &[&str] = &["small", "medium", "large", "extra large"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPosition {
    TopLeft,
    TopCenter,
    TopRight,
    Center,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl TextPosition {
    pub const ALL: &'static [TextPosition] = &[
        TextPosition::TopLeft,
        TextPosition::TopCenter,
        TextPosition::TopRight,
        TextPosition::Center,
        TextPosition::BottomLeft,
        TextPosition::BottomCenter,
        TextPosition::BottomRight,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TextPosition::TopLeft => "Top-Left",
            TextPosition::TopCenter => "Top-Center",
            TextPosition::TopRight => "Top-Right",
            TextPosition::Center => "Center",
            TextPosition::BottomLeft => "Bottom-Left",
            TextPosition::BottomCenter => "Bottom-Center",
            TextPosition::BottomRight => "Bottom-Right",
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            TextPosition::TopLeft => "top left",
            TextPosition::TopCenter => "top center",
            TextPosition::TopRight => "top right",
            TextPosition::Center => "center",
            TextPosition::BottomLeft => "bottom left",
            TextPosition::BottomCenter => "bottom center",
            TextPosition::BottomRight => "bottom right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOverlay {
    pub enabled: bool,
    pub text: String,
    pub font_family: String,
    pub font_size: String,
    pub color: String,
    pub position: TextPosition,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            font_family: FONT_FAMILIES[0].to_string(),
            font_size: FONT_SIZES[1].to_string(),
            color: "white".to_string(),
            position: TextPosition::Center,
        }
    }
}

/// Appends a quick filter's instruction to whatever the user already typed.
pub fn append_filter(prompt: &str, filter: &QuickFilter) -> String {
    if prompt.is_empty() {
        filter.prompt.to_string()
    } else {
        format!("{} {}", prompt.trim(), filter.prompt)
    }
}

pub fn compose_edit_prompt(prompt: &str, overlay: &TextOverlay) -> String {
    let mut composed = prompt.trim().to_string();
    let text = overlay.text.trim();
    if overlay.enabled && !text.is_empty() {
        composed.push_str(&format!(
            " Also, add the text \"{text}\" at the {} of the image. The text should be in a {} color, with a {} size, and a {} font style.",
            overlay.position.phrase(),
            overlay.color,
            overlay.font_size,
            overlay.font_family,
        ));
    }
    composed
}

pub const SCENES: &[&str] = &[
    "A Vedic-era Gurukul",
    "The court of Emperor Ashoka",
    "A bustling bazaar in the Gupta Empire",
    "Carving deities at a Chola temple",
    "A scene from the Ramayana",
    "A vibrant Holi festival in Mathura",
    "Meditating under the Bodhi tree",
    "On the battlefield of Kurukshetra",
    "Celebrating Diwali in ancient Ayodhya",
    "A royal procession in the Mughal court",
    "Trading spices on the ancient Silk Road",
    "At a concert in a Maharaja's palace",
    "Walking the streets of Mohenjo-Daro",
    "In the grand court of Shivaji Maharaj",
    "Studying astronomy at Nalanda University",
    "Witnessing the splendor of the Vijayanagara Empire",
    "At the serene Golden Temple in Amritsar",
];

pub fn filter_scenes(query: &str) -> Vec<&'static str> {
    let needle = query.to_lowercase();
    SCENES
        .iter()
        .copied()
        .filter(|scene| scene.to_lowercase().contains(&needle))
        .collect()
}

pub fn time_travel_prompt(scene: &str) -> String {
    format!(
        "Take the person in this photo and place them in a realistic scene from {scene}. The style should be like a photograph from that era. Ensure their clothing, hairstyle, and the background are historically accurate and seamlessly blended."
    )
}

pub fn require_prompt(prompt: &str, message: &str) -> LabResult<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(LabError::InputValidation(message.to_string()));
    }
    Ok(trimmed.to_string())
}

pub fn require_image<'a>(
    image: Option<&'a SourceImage>,
    message: &str,
) -> LabResult<&'a SourceImage> {
    image.ok_or_else(|| LabError::InputValidation(message.to_string()))
}

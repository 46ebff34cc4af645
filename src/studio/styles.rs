pub const STYLE_PRESETS: &[&str] = &[
    "photorealistic",
    "Tech-noir cinematic atmosphere",
    "high detail",
    "sharp edges",
    "dramatic lighting",
    "deep shadows",
    "realistic digital art",
    "Painted Anime",
    "Casual Photo",
    "Cinematic",
    "Digital Painting",
    "Concept Art",
    "3D Disney Character",
    "2D Disney Character",
    "Disney Sketch",
    "Concept Sketch",
    "Painterly",
    "Oil Painting",
    "Oil Painting - Realism",
    "Oil Painting - Old",
    "Oil Painting - 70s Pulp",
    "Professional Photo",
    "Anime",
    "Drawn Anime",
    "Anime Screencap",
    "Cute Anime",
    "Soft Anime",
    "Fantasy Painting",
    "Fantasy Landscape",
    "Fantasy Portrait",
    "Studio Ghibli",
    "50s Enamel Sign",
    "Vintage Comic",
    "Franco-Belgian Comic",
    "Tintin Comic",
    "Medieval",
    "Pixel Art",
    "Furry - Oil",
    "Furry - Cinematic",
    "Furry - Painted",
    "Furry - Drawn",
    "Cute Figurine",
    "3D Emoji",
    "Illustration",
    "Cute Illustration",
    "Flat Illustration",
    "Watercolor",
    "1990s Photo",
    "1980s Photo",
    "1970s Photo",
    "1960s Photo",
    "1950s Photo",
    "1940s Photo",
    "1930s Photo",
    "1920s Photo",
    "Vintage Pulp Art",
    "50s Infomercial Anime",
    "3D Pokemon",
    "Painted Pokemon",
    "2D Pokemon",
    "Vintage Anime",
    "Neon Vintage Anime",
    "Manga",
    "Fantasy World Map",
    "Fantasy City Map",
    "Old World Map",
    "3D Isometric Icon",
    "Flat Style Icon",
    "Flat Style Logo",
    "Game Art Icon",
    "Digital Painting Icon",
    "Concept Art Icon",
    "Cute 3D Icon",
    "Cute 3D Icon Set",
    "Crayon Drawing",
    "Pencil",
    "Tattoo Design",
    "Waifu",
    "YuGiOh Art",
    "Traditional Japanese",
    "Nihonga Painting",
    "Claymation",
    "Cartoon",
    "Cursed Photo",
    "MTG Card",
];

/// Case-insensitive lookup by name, or by 1-based position in the catalogue.
pub fn find_preset(query: &str) -> Option<&'static str> {
    let query = query.trim();
    if let Ok(index) = query.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| STYLE_PRESETS.get(i)).copied();
    }
    STYLE_PRESETS
        .iter()
        .find(|preset| preset.eq_ignore_ascii_case(query))
        .copied()
}

pub fn apply_style_preset(current: &str, preset: &str) -> String {
    let mut updated = current.trim().to_string();
    if updated.is_empty() {
        return format!("Style: {preset}");
    }
    if !updated.ends_with(',') && !updated.ends_with('.') {
        updated.push(',');
    }
    updated.push(' ');
    updated.push_str(preset);
    updated
}

use super::VoiceDescriptor;

/// Substitute languages tried for Serbian after Croatian, in priority order.
const SLAVIC_FALLBACKS: [&str; 7] = ["bs", "sl", "mk", "bg", "cs", "sk", "pl"];

/// True when the primary subtag of `language` is Serbian (`sr`, `sr-RS`, `sr_Latn`).
pub fn is_serbian(language: &str) -> bool {
    language
        .split(['-', '_'])
        .next()
        .map(|primary| primary.eq_ignore_ascii_case("sr"))
        .unwrap_or(false)
}

/// Language tag applied directly when no voice could be resolved.
pub fn fallback_lang(language: &str) -> &'static str {
    if is_serbian(language) {
        "sr-RS"
    } else {
        "en-US"
    }
}

/// Pick the best voice for `language` from an inventory snapshot.
///
/// Serbian requests walk Serbian, then Croatian, then the other Slavic
/// languages before falling back to English. Anything else goes straight to
/// English. The first voice in the inventory is the last resort.
pub fn select_voice<'a>(voices: &'a [VoiceDescriptor], language: &str) -> Option<&'a VoiceDescriptor> {
    if is_serbian(language) {
        if let Some(voice) = find_serbian(voices) {
            tracing::debug!("Found Serbian voice: {}", voice.label());
            return Some(voice);
        }

        if let Some(voice) = find_croatian(voices) {
            tracing::debug!("Using Croatian voice for Serbian: {}", voice.label());
            return Some(voice);
        }

        if let Some(voice) = find_slavic(voices) {
            tracing::debug!("Using Slavic voice for Serbian: {}", voice.label());
            return Some(voice);
        }
    }

    voices
        .iter()
        .find(|voice| voice.lang.to_lowercase().starts_with("en"))
        .or_else(|| voices.first())
}

fn find_serbian(voices: &[VoiceDescriptor]) -> Option<&VoiceDescriptor> {
    voices.iter().find(|voice| {
        let name = voice.name.to_lowercase();
        voice.lang.to_lowercase().contains("sr")
            || name.contains("serbian")
            || name.contains("srpski")
    })
}

fn find_croatian(voices: &[VoiceDescriptor]) -> Option<&VoiceDescriptor> {
    voices.iter().find(|voice| {
        let name = voice.name.to_lowercase();
        voice.lang.to_lowercase().contains("hr")
            || name.contains("croatian")
            || name.contains("hrvatski")
    })
}

// Prefix priority decides, not inventory order.
fn find_slavic(voices: &[VoiceDescriptor]) -> Option<&VoiceDescriptor> {
    SLAVIC_FALLBACKS.iter().find_map(|code| {
        voices
            .iter()
            .find(|voice| voice.lang.to_lowercase().starts_with(code))
    })
}

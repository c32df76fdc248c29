//! Subtitle file naming.
//!
//! Names derive from the language tag plus the forced disposition, with
//! independent per-language collision counters for each of the two kinds:
//! `en.vtt`, `en_2.vtt`, `forced-en.vtt`, `forced-en_2.vtt`, ...

use std::collections::HashMap;

pub const SUBTITLE_EXTENSION: &str = "vtt";

#[derive(Debug, Default)]
pub struct SubtitleNamer {
    normal: HashMap<String, u32>,
    forced: HashMap<String, u32>,
}

impl SubtitleNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier (file stem, no extension) for a stream of the given
    /// language and disposition.
    pub fn next_stem(&mut self, language: &str, forced: bool) -> String {
        let counter = if forced { &mut self.forced } else { &mut self.normal };
        let n = counter.entry(language.to_string()).or_insert(0);
        *n += 1;

        let base = if forced {
            format!("forced-{}", language)
        } else {
            language.to_string()
        };

        if *n > 1 {
            format!("{}_{}", base, n)
        } else {
            base
        }
    }

    pub fn file_name(stem: &str) -> String {
        format!("{}.{}", stem, SUBTITLE_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_and_normal_counters_are_independent() {
        let mut namer = SubtitleNamer::new();
        assert_eq!(namer.next_stem("en", false), "en");
        assert_eq!(namer.next_stem("en", false), "en_2");
        assert_eq!(namer.next_stem("en", true), "forced-en");
    }

    #[test]
    fn test_collision_counter_keeps_incrementing() {
        let mut namer = SubtitleNamer::new();
        assert_eq!(namer.next_stem("es", false), "es");
        assert_eq!(namer.next_stem("es", false), "es_2");
        assert_eq!(namer.next_stem("es", false), "es_3");
        assert_eq!(namer.next_stem("es", true), "forced-es");
        assert_eq!(namer.next_stem("es", true), "forced-es_2");
    }

    #[test]
    fn test_languages_do_not_interfere() {
        let mut namer = SubtitleNamer::new();
        assert_eq!(namer.next_stem("en", false), "en");
        assert_eq!(namer.next_stem("fr", false), "fr");
        assert_eq!(namer.next_stem("en", false), "en_2");
        assert_eq!(namer.next_stem("fr", false), "fr_2");
    }

    #[test]
    fn test_file_name_gets_vtt_extension() {
        assert_eq!(SubtitleNamer::file_name("forced-en"), "forced-en.vtt");
    }
}

/// Region rotation schedule
///
/// Maps the current UTC hour onto a fixed 24-slot rotation of target
/// regions and languages. Pure table lookups - nothing here touches the
/// database or the network, so any two processes agree at the same instant.

use chrono::{Timelike, Utc};

/// One hour's entry in the daily rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub hour: u32,
    /// Region name used for trend lookups and reply logging
    pub region: &'static str,
    /// Location label the driver types into the location switcher
    pub location: &'static str,
    /// ISO 639-1 language code
    pub lang: &'static str,
    /// ISO 3166-1 country code passed to the content source
    pub content_region: &'static str,
}

/// 24-hour daily rotation schedule (UTC), one slot per hour
const DAILY_SCHEDULE: [Slot; 24] = [
    Slot { hour: 0, region: "Los Angeles", location: "Los Angeles", lang: "en", content_region: "US" },
    Slot { hour: 1, region: "Mexico City", location: "Mexico City", lang: "es", content_region: "MX" },
    Slot { hour: 2, region: "Lima", location: "Lima", lang: "es", content_region: "PE" },
    Slot { hour: 3, region: "Buenos Aires", location: "Buenos Aires", lang: "es", content_region: "AR" },
    Slot { hour: 4, region: "São Paulo", location: "São Paulo", lang: "pt", content_region: "BR" },
    Slot { hour: 5, region: "Rio de Janeiro", location: "Rio de Janeiro", lang: "pt", content_region: "BR" },
    Slot { hour: 6, region: "Sydney", location: "Sydney", lang: "en", content_region: "AU" },
    Slot { hour: 7, region: "Melbourne", location: "Melbourne", lang: "en", content_region: "AU" },
    Slot { hour: 8, region: "Tokyo", location: "Tokyo", lang: "ja", content_region: "JP" },
    Slot { hour: 9, region: "Seoul", location: "Seoul", lang: "ko", content_region: "KR" },
    Slot { hour: 10, region: "Jakarta", location: "Jakarta", lang: "id", content_region: "ID" },
    Slot { hour: 11, region: "Singapore", location: "Singapore", lang: "en", content_region: "SG" },
    Slot { hour: 12, region: "Paris", location: "Paris", lang: "fr", content_region: "FR" },
    Slot { hour: 13, region: "Amsterdam", location: "Amsterdam", lang: "nl", content_region: "NL" },
    Slot { hour: 14, region: "Berlin", location: "Berlin", lang: "de", content_region: "DE" },
    Slot { hour: 15, region: "Warsaw", location: "Warsaw", lang: "pl", content_region: "PL" },
    Slot { hour: 16, region: "Rome", location: "Rome", lang: "it", content_region: "IT" },
    Slot { hour: 17, region: "Madrid", location: "Madrid", lang: "es", content_region: "ES" },
    Slot { hour: 18, region: "Lisbon", location: "Lisbon", lang: "pt", content_region: "PT" },
    Slot { hour: 19, region: "London", location: "London", lang: "en", content_region: "GB" },
    Slot { hour: 20, region: "Dublin", location: "Dublin", lang: "en", content_region: "IE" },
    Slot { hour: 21, region: "Toronto", location: "Toronto", lang: "en", content_region: "CA" },
    Slot { hour: 22, region: "New York", location: "New York", lang: "en", content_region: "US" },
    Slot { hour: 23, region: "Chicago", location: "Chicago", lang: "en", content_region: "US" },
];

/// Get the slot for a given UTC hour (0-23)
pub fn slot_for_hour(hour: u32) -> Slot {
    DAILY_SCHEDULE[(hour % 24) as usize]
}

/// Get the current target based on the wall-clock UTC hour
pub fn current_target() -> Slot {
    slot_for_hour(Utc::now().hour())
}

/// Full language name for a language code, for the generator prompt
pub fn language_name(lang: &str) -> &'static str {
    match lang {
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "pt" => "Portuguese",
        "it" => "Italian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "ja" => "Japanese",
        "ko" => "Korean",
        "id" => "Indonesian",
        _ => "English",
    }
}

/// Native evergreen search queries per language
///
/// These are the list-style / recommendation-style queries that stay
/// productive regardless of what is currently trending. Unknown languages
/// fall back to the English list.
pub fn keywords_for(lang: &str) -> &'static [&'static str] {
    match lang {
        "en" => &[
            "\"where to watch\" free",
            "\"best free streaming\" site",
            "\"netflix alternative\" free",
            "\"netflix too expensive\"",
            "\"streaming site\" no ads",
        ],
        "fr" => &[
            "\"où regarder\" film gratuit",
            "\"site streaming gratuit\"",
            "\"alternative netflix gratuit\"",
            "\"netflix trop cher\"",
        ],
        "de" => &[
            "\"wo kann ich schauen\" kostenlos",
            "\"streaming seite kostenlos\"",
            "\"netflix alternative kostenlos\"",
            "\"netflix zu teuer\"",
        ],
        "es" => &[
            "\"dónde ver\" películas gratis",
            "\"sitio streaming gratis\"",
            "\"alternativa netflix gratis\"",
            "\"netflix muy caro\"",
        ],
        "pt" => &[
            "\"onde assistir\" filme grátis",
            "\"site streaming grátis\"",
            "\"alternativa netflix grátis\"",
            "\"netflix muito caro\"",
        ],
        "it" => &[
            "\"dove guardare\" film gratis",
            "\"sito streaming gratuito\"",
            "\"alternativa netflix gratis\"",
        ],
        "nl" => &[
            "\"waar kijken\" gratis",
            "\"gratis streaming site\"",
            "\"netflix alternatief gratis\"",
        ],
        "pl" => &[
            "\"gdzie oglądać\" za darmo",
            "\"darmowy streaming\"",
            "\"alternatywa netflix\"",
        ],
        "ja" => &[
            "映画 無料 視聴",
            "無料 ストリーミング サイト",
            "Netflix 代替 無料",
            "どこで見れる 映画",
            "無料で映画を見る方法",
        ],
        "ko" => &[
            "영화 무료 보기",
            "무료 스트리밍 사이트",
            "넷플릭스 대안 무료",
            "어디서 볼 수 있어",
            "드라마 무료 시청",
        ],
        "id" => &[
            "nonton film gratis",
            "situs streaming gratis",
            "alternatif netflix gratis",
            "dimana nonton film",
        ],
        _ => keywords_for("en"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_hour_has_exactly_one_slot() {
        for hour in 0..24u32 {
            let slot = slot_for_hour(hour);
            assert_eq!(slot.hour, hour);
            assert!(!slot.region.is_empty());
            assert!(!slot.lang.is_empty());
            assert!(!slot.content_region.is_empty());
        }
    }

    #[test]
    fn lookup_is_deterministic_within_an_hour() {
        let a = slot_for_hour(12);
        let b = slot_for_hour(12);
        assert_eq!(a, b);
        assert_eq!(a.region, "Paris");
        assert_eq!(a.lang, "fr");
    }

    #[test]
    fn wrap_around_from_23_to_0() {
        let last = slot_for_hour(23);
        let first = slot_for_hour(0);
        assert_eq!(last.region, "Chicago");
        assert_eq!(first.region, "Los Angeles");
        assert_ne!(last.region, first.region);
        // An out-of-range hour wraps instead of panicking
        assert_eq!(slot_for_hour(24).region, "Los Angeles");
    }

    #[test]
    fn language_names_cover_all_scheduled_languages() {
        for slot in (0..24).map(slot_for_hour) {
            assert_ne!(language_name(slot.lang), "");
        }
        assert_eq!(language_name("fr"), "French");
        assert_eq!(language_name("xx"), "English");
    }

    #[test]
    fn keywords_never_empty() {
        for slot in (0..24).map(slot_for_hour) {
            assert!(!keywords_for(slot.lang).is_empty());
        }
        assert!(!keywords_for("unknown").is_empty());
    }
}

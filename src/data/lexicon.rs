use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

const ZODIAC_SIGNS: &[&str] = &[
    "aries", "taurus", "gemini", "cancer", "leo", "virgo", "libra", "scorpio", "sagittarius",
    "capricorn", "aquarius", "pisces",
];

const CELESTIAL_BODIES: &[&str] = &[
    "sun", "moon", "mercury", "venus", "mars", "jupiter", "saturn", "uranus", "neptune", "pluto",
    "chiron", "ceres", "pallas", "juno", "vesta", "north node", "south node", "true node",
    "mean node", "lilith", "fortuna",
];

const CHART_POINTS: &[&str] = &[
    "ascendant", "midheaven", "descendant", "imum coeli", "vertex", "part of fortune",
];

const ASPECTS: &[&str] = &[
    "conjunction", "opposition", "trine", "square", "sextile", "quincunx", "semisextile",
    "semisquare", "sesquiquadrate", "quintile", "biquintile",
];

const HOUSES: &[&str] = &[
    "first house", "second house", "third house", "fourth house", "fifth house", "sixth house",
    "seventh house", "eighth house", "ninth house", "tenth house", "eleventh house",
    "twelfth house",
];

const GENERAL_TERMS: &[&str] = &[
    "natal", "transit", "progression", "direction", "return", "synastry", "composite",
    "retrograde", "direct", "stationary", "combust", "cazimi", "void of course", "detriment",
    "fall", "exaltation", "rulership", "domicile", "peregrine", "horoscope", "chart",
    "ephemeris", "zodiac", "ecliptic", "equinox", "solstice",
];

const QUALITIES: &[&str] = &["fire", "earth", "air", "water", "cardinal", "fixed", "mutable"];

const VEDIC_TERMS: &[&str] = &["nakshatra", "rashi", "dasha", "bhava", "graha", "yoga", "karana"];

const TRADITIONS: &[&str] = &[
    "astrology", "tropical", "sidereal", "heliocentric", "geocentric", "vedic", "jyotish",
    "hellenistic", "medieval", "horary", "electional",
];

const LUNAR_AND_CYCLE_PHRASES: &[&str] = &[
    "new moon", "full moon", "first quarter", "last quarter", "waxing crescent",
    "waning crescent", "waxing gibbous", "waning gibbous", "solar eclipse", "lunar eclipse",
    "solar return", "lunar return", "venus return", "mercury retrograde", "venus retrograde",
    "mars retrograde", "jupiter retrograde", "saturn retrograde",
];

/// Shorthand found in chart tables and ephemerides.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("ari", "aries"),
    ("tau", "taurus"),
    ("gem", "gemini"),
    ("vir", "virgo"),
    ("lib", "libra"),
    ("sco", "scorpio"),
    ("sag", "sagittarius"),
    ("cap", "capricorn"),
    ("aqu", "aquarius"),
    ("pis", "pisces"),
    ("moo", "moon"),
    ("mer", "mercury"),
    ("ven", "venus"),
    ("mar", "mars"),
    ("jup", "jupiter"),
    ("ura", "uranus"),
    ("nep", "neptune"),
    ("plu", "pluto"),
    ("conj", "conjunction"),
    ("opp", "opposition"),
    ("squ", "square"),
    ("tri", "trine"),
    ("qui", "quincunx"),
    ("asc", "ascendant"),
    ("des", "descendant"),
    ("mc", "midheaven"),
    ("ic", "imum coeli"),
    ("ret", "retrograde"),
    ("prog", "progression"),
    ("tran", "transit"),
    ("nat", "natal"),
    ("syn", "synastry"),
    ("horo", "horoscope"),
    ("ast", "astrology"),
];

/// Shorthand that is also an ordinary English word. Only the title-cased form inside a
/// sentence is expanded, as in "Mars Sex Ven" or "Moon in Can".
const TITLED_ABBREVIATIONS: &[(&str, &str)] =
    &[("Can", "cancer"), ("Sat", "saturn"), ("Sex", "sextile")];

/// NLTK's English stopword list.
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Domain vocabulary: terms exempt from stopword filtering, phrases that tokenize as one
/// unit, and an abbreviation table. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct TermLexicon {
    all_terms: HashSet<String>,
    multi_word_terms: Vec<String>,
    abbreviations: HashMap<String, String>,
    stopwords: HashSet<String>,
    titled_abbreviations: HashMap<String, String>,
    abbreviation_pattern: Option<Regex>,
    titled_pattern: Option<Regex>,
    phrase_pattern: Option<Regex>,
}

impl TermLexicon {
    /// Build a lexicon. Terms and abbreviation keys are matched lower-cased.
    pub fn new<T, A, S>(terms: T, abbreviations: A, stopwords: S) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        A: IntoIterator<Item = (String, String)>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let all_terms: HashSet<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut multi_word_terms: Vec<String> =
            all_terms.iter().filter(|t| t.contains(' ')).cloned().collect();
        // Longest first so "mercury retrograde" wins over any shorter overlap.
        multi_word_terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let abbreviations: HashMap<String, String> = abbreviations
            .into_iter()
            .map(|(short, full)| (short.to_lowercase(), full))
            .filter(|(short, full)| *short != full.to_lowercase())
            .collect();

        let mut keys: Vec<&String> = abbreviations.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let abbreviation_pattern = word_alternation(&keys, true);
        let phrase_pattern = word_alternation(&multi_word_terms, false);

        let stopwords = stopwords
            .into_iter()
            .map(|w| w.as_ref().to_lowercase())
            .filter(|w| !all_terms.contains(w))
            .collect();

        Self {
            all_terms,
            multi_word_terms,
            abbreviations,
            stopwords,
            titled_abbreviations: HashMap::new(),
            abbreviation_pattern,
            titled_pattern: None,
            phrase_pattern,
        }
    }

    /// Add abbreviations matched case-sensitively and never at the start of a sentence.
    pub fn with_titled_abbreviations<A>(mut self, abbreviations: A) -> Self
    where
        A: IntoIterator<Item = (String, String)>,
    {
        self.titled_abbreviations.extend(abbreviations);
        let mut keys: Vec<&String> = self.titled_abbreviations.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self.titled_pattern = word_alternation(&keys, false);
        self
    }

    /// The astrological vocabulary with NLTK English stopwords.
    pub fn astrological() -> Self {
        let terms = [
            ZODIAC_SIGNS,
            CELESTIAL_BODIES,
            CHART_POINTS,
            ASPECTS,
            HOUSES,
            GENERAL_TERMS,
            QUALITIES,
            VEDIC_TERMS,
            TRADITIONS,
            LUNAR_AND_CYCLE_PHRASES,
        ]
        .concat();

        let abbreviations = ABBREVIATIONS
            .iter()
            .map(|(short, full)| (short.to_string(), full.to_string()));

        let titled = TITLED_ABBREVIATIONS
            .iter()
            .map(|(short, full)| (short.to_string(), full.to_string()));

        Self::new(terms, abbreviations, ENGLISH_STOPWORDS.iter()).with_titled_abbreviations(titled)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.all_terms.contains(term)
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    pub fn multi_word_terms(&self) -> &[String] {
        &self.multi_word_terms
    }

    pub fn len(&self) -> usize {
        self.all_terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_terms.is_empty()
    }

    /// Replace whole-word abbreviations, case-insensitively. A capitalised abbreviation
    /// gets a capitalised expansion.
    pub fn expand_abbreviations(&self, text: &str) -> String {
        let expanded = match &self.abbreviation_pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &Captures| {
                    let found = &caps[0];
                    match self.abbreviations.get(&found.to_lowercase()) {
                        Some(full) if found.starts_with(char::is_uppercase) => capitalize(full),
                        Some(full) => full.clone(),
                        None => found.to_string(),
                    }
                })
                .into_owned(),
            None => text.to_string(),
        };

        let Some(pattern) = &self.titled_pattern else {
            return expanded;
        };

        pattern
            .replace_all(&expanded, |caps: &Captures| {
                let found = caps.get(0).map_or("", |m| m.as_str());
                let start = caps.get(0).map_or(0, |m| m.start());
                match self.titled_abbreviations.get(found) {
                    Some(full) if !starts_sentence(&expanded[..start]) => capitalize(full),
                    _ => found.to_string(),
                }
            })
            .into_owned()
    }

    /// Join every multi-word term in lower-cased text with underscores.
    pub fn join_phrases(&self, lowered: &str) -> String {
        let Some(pattern) = &self.phrase_pattern else {
            return lowered.to_string();
        };

        pattern
            .replace_all(lowered, |caps: &Captures| caps[0].replace(' ', "_"))
            .into_owned()
    }

    /// The spaced multi-word term behind an underscored token, if it is one.
    pub fn restore_phrase(&self, token: &str) -> Option<String> {
        if !token.contains('_') {
            return None;
        }
        let phrase = token.replace('_', " ");
        self.all_terms.contains(&phrase).then_some(phrase)
    }
}

fn word_alternation<S: AsRef<str>>(words: &[S], case_insensitive: bool) -> Option<Regex> {
    if words.is_empty() {
        return None;
    }
    let body = words
        .iter()
        .map(|w| regex::escape(w.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    let flags = if case_insensitive { "(?i)" } else { "" };
    Regex::new(&format!(r"{flags}\b(?:{body})\b")).ok()
}

fn starts_sentence(preceding: &str) -> bool {
    match preceding.trim_end().chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | ':' | ';'),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_abbreviations_preserving_case() {
        let lexicon = TermLexicon::astrological();
        assert_eq!(
            lexicon.expand_abbreviations("Sun conj Jup in Leo"),
            "Sun conjunction Jupiter in Leo"
        );
        assert_eq!(
            lexicon.expand_abbreviations("moo opp SAT, MC in sco"),
            "moon opposition SAT, Midheaven in scorpio"
        );
    }

    #[test]
    fn test_expansion_is_whole_word_only() {
        let lexicon = TermLexicon::astrological();
        assert_eq!(
            lexicon.expand_abbreviations("a capable ascetic can triumph"),
            "a capable ascetic can triumph"
        );
    }

    #[test]
    fn test_titled_shorthand_expands_only_mid_sentence() {
        let lexicon = TermLexicon::astrological();
        assert_eq!(
            lexicon.expand_abbreviations("Sun conj Sat in Can"),
            "Sun conjunction Saturn in Cancer"
        );
        assert_eq!(lexicon.expand_abbreviations("Mars Sex Ven"), "Mars Sextile Venus");
        assert_eq!(
            lexicon.expand_abbreviations("Can it last? Sat by the sea, we can rest."),
            "Can it last? Sat by the sea, we can rest."
        );
        assert_eq!(lexicon.expand_abbreviations("they sat down"), "they sat down");
    }

    #[test]
    fn test_multi_word_terms_come_from_the_term_sets() {
        let lexicon = TermLexicon::astrological();
        let phrases = lexicon.multi_word_terms();
        assert!(phrases.iter().any(|p| p == "north node"));
        assert!(phrases.iter().any(|p| p == "twelfth house"));
        assert!(phrases.iter().all(|p| p.contains(' ')));
        assert!(phrases.windows(2).all(|w| w[0].len() >= w[1].len()));
    }

    #[test]
    fn test_join_and_restore_phrases() {
        let lexicon = TermLexicon::astrological();
        let joined = lexicon.join_phrases("the full moon squares mercury retrograde today");
        assert_eq!(joined, "the full_moon squares mercury_retrograde today");
        assert_eq!(lexicon.restore_phrase("full_moon").as_deref(), Some("full moon"));
        assert_eq!(lexicon.restore_phrase("snake_case"), None);
        assert_eq!(lexicon.restore_phrase("moon"), None);
    }

    #[test]
    fn test_domain_terms_are_never_stopwords() {
        let lexicon = TermLexicon::astrological();
        assert!(lexicon.is_stopword("the"));
        assert!(lexicon.is_stopword("don't"));
        assert!(!lexicon.is_stopword("moon"));
        assert!(lexicon.contains("leo"));
        assert!(lexicon.contains("part of fortune"));
    }

    #[test]
    fn test_empty_lexicon_is_inert() {
        let lexicon = TermLexicon::new(Vec::<String>::new(), Vec::new(), Vec::<String>::new());
        assert!(lexicon.is_empty());
        assert_eq!(lexicon.expand_abbreviations("conj"), "conj");
        assert_eq!(lexicon.join_phrases("new moon"), "new moon");
    }
}

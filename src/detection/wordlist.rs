use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Script families the matcher distinguishes. Each family gets its own
/// matching rule built only from that family's terms, so a rule can never
/// fire on text written in another script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScriptFamily {
    /// Latin-script terms (English, Spanish, French, German, romanized
    /// Hindi/Urdu). Whole-word, case-insensitive matching.
    Latin,
    /// Devanagari-script terms. Whole-word matching.
    Devanagari,
    /// Arabic-script terms (Arabic, Urdu). Matched by substring containment
    /// because word boundaries are unreliable in this range; this trades
    /// higher false-positive risk for recall on the few terms listed.
    Arabic,
}

impl ScriptFamily {
    /// Classify a term by the script its characters belong to
    pub fn of_term(term: &str) -> ScriptFamily {
        if term.chars().any(is_devanagari) {
            ScriptFamily::Devanagari
        } else if term.chars().any(is_arabic) {
            ScriptFamily::Arabic
        } else {
            ScriptFamily::Latin
        }
    }
}

fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
        || ('\u{0750}'..='\u{077F}').contains(&c)
        || ('\u{08A0}'..='\u{08FF}').contains(&c)
        || ('\u{FB50}'..='\u{FDFF}').contains(&c)
        || ('\u{FE70}'..='\u{FEFF}').contains(&c)
}

/// Named, immutable mapping from script family to explicit terms. Built once
/// from the conservative built-in lists plus optional custom terms, then
/// compiled into a `CompiledMatcher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordList {
    terms: BTreeMap<ScriptFamily, BTreeSet<String>>,
}

impl WordList {
    /// Built-in lists: only the most explicit terms per language, on purpose.
    /// Borderline or easily-misheard words are excluded to keep precision high.
    pub fn conservative() -> Self {
        let english = [
            "fuck", "fucking", "motherfucker", "cocksucker", "shit", "bullshit",
            "bitch", "asshole", "dickhead", "cunt", "whore", "slut",
        ];
        let hindi_urdu = [
            "भोसड़ी", "भोसड़ा", "मादरचोद", "रंडी", "चूतिया", "बहनचोद",
            "madarchod", "bhosda", "bhosdike", "randi", "behenchod",
            "بوصری", "رنڈی",
            "chutiya", "gandu",
        ];
        let spanish = ["puta", "hijo de puta", "joder", "coño"];
        let french = ["putain", "salope", "fils de pute", "enculé"];
        let german = ["scheiße", "hurensohn", "arschloch"];
        let arabic = ["كس", "زب"];

        let mut list = Self {
            terms: BTreeMap::new(),
        };

        for term in english
            .iter()
            .chain(hindi_urdu.iter())
            .chain(spanish.iter())
            .chain(french.iter())
            .chain(german.iter())
            .chain(arabic.iter())
        {
            list.insert(term);
        }

        list
    }

    fn insert(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        self.terms
            .entry(ScriptFamily::of_term(term))
            .or_default()
            .insert(term.to_string());
    }

    /// Return a new list with the given custom terms unioned in, each routed
    /// to the family matching its character range. The receiver is unchanged;
    /// callers must compile a fresh matcher from the result.
    pub fn with_custom_terms<'a, I>(&self, custom: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut list = self.clone();
        for term in custom {
            list.insert(term);
        }
        list
    }

    pub fn terms_for(&self, family: ScriptFamily) -> Option<&BTreeSet<String>> {
        self.terms.get(&family)
    }

    pub fn total_terms(&self) -> usize {
        self.terms.values().map(|s| s.len()).sum()
    }

    /// Compile one matching rule per script family. Compilation happens once
    /// per run; adding custom terms means building a new matcher, never
    /// mutating an existing one.
    pub fn compile(&self) -> Result<CompiledMatcher> {
        let mut rules = Vec::new();

        for (family, terms) in &self.terms {
            if terms.is_empty() {
                continue;
            }

            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");

            let pattern = match family {
                ScriptFamily::Latin => format!(r"(?i)\b({})\b", alternation),
                ScriptFamily::Devanagari => format!(r"\b({})\b", alternation),
                ScriptFamily::Arabic => format!("({})", alternation),
            };

            let regex = Regex::new(&pattern)
                .map_err(|e| anyhow!("Failed to compile {:?} rule: {}", family, e))?;
            rules.push((*family, regex));
        }

        debug!(
            "Compiled matcher: {} rules, {} terms",
            rules.len(),
            self.total_terms()
        );

        Ok(CompiledMatcher { rules })
    }
}

impl Default for WordList {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Immutable matching artifact derived from a `WordList`: one regex per
/// script family. Matching is a pure function of the input text.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    rules: Vec<(ScriptFamily, Regex)>,
}

impl CompiledMatcher {
    /// Match text against every script-family rule and return the set of
    /// matched terms. Cased-script matches are reported lowercased so the
    /// same term never appears twice under different casing.
    pub fn find_matches(&self, text: &str) -> BTreeSet<String> {
        let mut matched = BTreeSet::new();

        for (family, regex) in &self.rules {
            for m in regex.find_iter(text) {
                let term = match family {
                    ScriptFamily::Latin => m.as_str().to_lowercase(),
                    _ => m.as_str().to_string(),
                };
                matched.insert(term);
            }
        }

        matched
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

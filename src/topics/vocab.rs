use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::select::tokenize::tokenize;

/// The fixed topic enumeration the pack is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topic {
    Pricing,
    LegalCompliance,
    MarketingFirstClients,
    ReferralsPhysicians,
    TechStack,
    CeuCoursesCerts,
    EmbeddedInGym,
    ScalingHiring,
    FailuresBurnout,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::Pricing,
        Topic::LegalCompliance,
        Topic::MarketingFirstClients,
        Topic::ReferralsPhysicians,
        Topic::TechStack,
        Topic::CeuCoursesCerts,
        Topic::EmbeddedInGym,
        Topic::ScalingHiring,
        Topic::FailuresBurnout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Pricing => "pricing",
            Topic::LegalCompliance => "legal_compliance",
            Topic::MarketingFirstClients => "marketing_first_clients",
            Topic::ReferralsPhysicians => "referrals_physicians",
            Topic::TechStack => "tech_stack",
            Topic::CeuCoursesCerts => "ceu_courses_certs",
            Topic::EmbeddedInGym => "embedded_in_gym",
            Topic::ScalingHiring => "scaling_hiring",
            Topic::FailuresBurnout => "failures_burnout",
        }
    }

    fn default_keywords(&self) -> &'static [&'static str] {
        match self {
            Topic::Pricing => &[
                "price", "pricing", "cost", "rate", "rates", "charge", "fee", "fees",
                "cash pay", "cash-pay", "cash based", "out of pocket", "oop", "eval",
                "evaluation", "follow up", "follow-up", "followup", "package", "packages",
                "membership", "subscription", "per session", "per visit", "per hour", "hourly",
                "what do you charge", "how much", "billing",
            ],
            Topic::LegalCompliance => &[
                "legal", "compliance", "hipaa", "ada", "liability", "malpractice",
                "insurance requirement", "license", "licensing", "regulations", "medicare",
                "medicaid", "pllc", "llc", "s-corp", "s corp", "lawyer", "attorney",
                "contract", "lawsuit", "sued", "audit", "npi", "ein", "business entity",
                "incorporation",
            ],
            Topic::MarketingFirstClients => &[
                "first client", "first patients", "getting started", "starting out",
                "new practice", "launch", "opening", "grand opening", "build caseload",
                "fill schedule", "grow practice", "patient acquisition", "marketing",
                "advertising", "facebook ads", "google ads", "seo", "social media",
                "instagram", "content", "blog", "website",
            ],
            Topic::ReferralsPhysicians => &[
                "referral", "referrals", "physician", "doctor", "md", "primary care", "pcp",
                "orthopedic", "ortho", "specialist", "direct access", "self-refer", "script",
                "prescription", "networking", "relationship", "lunch and learn",
            ],
            Topic::TechStack => &[
                "emr", "ehr", "software", "app", "scheduling", "intake", "payment processing",
                "stripe", "square", "venmo", "paypal", "telehealth", "video", "zoom",
                "jane app", "practice better", "hint health", "healthie", "simple practice",
                "intakeq", "google workspace", "slack", "notion", "asana", "trello",
            ],
            Topic::CeuCoursesCerts => &[
                "ceu", "ceus", "continuing education", "course", "courses", "certification",
                "certificate", "certified", "credential", "ocs", "scs", "faaompt",
                "dry needling", "idn", "trigger point", "manual therapy", "manipulation",
                "thrust", "mckenzie", "mdt", "pelvic", "vestibular", "concussion", "sports",
                "orthopedic", "naiomt", "maitland", "mulligan", "iastm", "graston", "cupping",
            ],
            Topic::EmbeddedInGym => &[
                "gym", "crossfit", "fitness", "trainer", "personal training", "box",
                "strength", "conditioning", "weightlifting", "powerlifting", "athletic",
                "sports performance", "embedded", "on-site", "onsite", "co-located",
                "rent space", "sublease", "gym owner",
            ],
            Topic::ScalingHiring => &[
                "hire", "hiring", "employee", "contractor", "1099", "w2", "w-2", "scale",
                "scaling", "grow", "growth", "expand", "expansion", "staff", "staffing",
                "team", "associate", "partner", "partnership", "multiple locations",
                "second location", "franchise",
            ],
            Topic::FailuresBurnout => &[
                "fail", "failed", "failure", "mistake", "regret", "lesson learned", "burnout",
                "burned out", "burnt out", "stress", "overwhelm", "quit", "quitting",
                "closing", "close practice", "give up", "struggle", "struggling", "hard time",
                "difficult", "challenge", "work life balance", "work-life",
            ],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("unknown topic '{}'", s))
    }
}

/// Keyword table per topic, stored pre-tokenized. Built once per run and
/// only ever read afterwards.
#[derive(Debug, Clone)]
pub struct TopicVocabulary {
    keywords: BTreeMap<Topic, BTreeSet<Vec<String>>>,
}

impl Default for TopicVocabulary {
    fn default() -> Self {
        let mut vocab = Self {
            keywords: BTreeMap::new(),
        };
        for topic in Topic::ALL {
            vocab.extend(topic, topic.default_keywords().iter().copied());
        }
        vocab
    }
}

impl TopicVocabulary {
    /// Built-in table extended with keywords carried by a topic index.
    pub fn with_extra<'a>(
        extra: impl IntoIterator<Item = (Topic, &'a [String])>,
    ) -> Self {
        let mut vocab = Self::default();
        for (topic, words) in extra {
            vocab.extend(topic, words.iter().map(String::as_str));
        }
        vocab
    }

    fn extend<'a>(&mut self, topic: Topic, words: impl IntoIterator<Item = &'a str>) {
        let entry = self.keywords.entry(topic).or_default();
        for word in words {
            let phrase = tokenize(word);
            if !phrase.is_empty() {
                entry.insert(phrase);
            }
        }
    }

    /// Topics with at least one keyword present in `query_tokens`, in
    /// enumeration order. Multi-word keywords must appear as a consecutive run.
    pub fn match_query(&self, query_tokens: &[String]) -> Vec<Topic> {
        self.keywords
            .iter()
            .filter(|(_, phrases)| {
                phrases
                    .iter()
                    .any(|phrase| contains_phrase(query_tokens, phrase))
            })
            .map(|(topic, _)| *topic)
            .collect()
    }
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return false;
    }
    tokens.windows(phrase.len()).any(|w| w == phrase)
}

//! Lexicon polarity scoring for social posts.
//!
//! Scores are in `[-1, 1]`: the balance of positive and negative words,
//! with a preceding negation flipping a word's polarity.

const POSITIVE: &[&str] = &[
    "good", "great", "protect", "protected", "protecting", "restore", "restored", "restoration",
    "conserve", "conservation", "success", "successful", "win", "hope", "hopeful", "improve",
    "improved", "recovery", "recovering", "sustainable", "saved", "save", "clean", "thriving",
    "healthy", "positive", "progress", "support", "commend", "reforestation", "rescue",
];

const NEGATIVE: &[&str] = &[
    "illegal", "destroy", "destroyed", "destruction", "deforestation", "loss", "lost", "crime",
    "criminal", "corrupt", "corruption", "pollution", "polluted", "toxic", "fire", "fires",
    "burning", "smoke", "haze", "poaching", "trafficking", "threat", "threatened", "damage",
    "damaged", "devastating", "devastation", "disaster", "bad", "terrible", "worse", "worst",
    "angry", "sad", "violation", "violations", "clearing", "encroachment", "flood", "collapse",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "isn't", "aren't", "wasn't", "don't"];

/// Polarity of `text` in `[-1, 1]`; `0.0` when no lexicon word appears.
pub fn polarity(text: &str) -> f64 {
    let mut positive = 0i32;
    let mut negative = 0i32;
    let mut negate = false;

    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        let sign = if POSITIVE.contains(&word.as_str()) {
            1
        } else if NEGATIVE.contains(&word.as_str()) {
            -1
        } else {
            negate = NEGATIONS.contains(&word.as_str());
            continue;
        };

        let sign = if negate { -sign } else { sign };
        negate = false;
        if sign > 0 {
            positive += 1;
        } else {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    f64::from(positive - negative) / f64::from(total)
}

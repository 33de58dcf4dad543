//! Text helpers: reading time, slugs and length sampling.

use rand::Rng;

const VOWELS: &str = "aeiouy";
const ABBREVIATIONS: [&str; 4] = ["Mr.", "Mrs.", "Ms.", "Dr."];

/// Rough syllable count for one English word.
pub fn count_syllables(word: &str) -> usize {
    let word: Vec<char> = word.to_lowercase().chars().collect();
    if word.is_empty() {
        return 1;
    }
    let is_vowel = |c: char| VOWELS.contains(c);

    let mut count: isize = 0;
    if is_vowel(word[0]) {
        count += 1;
    }
    for i in 1..word.len() {
        if is_vowel(word[i]) && !is_vowel(word[i - 1]) {
            count += 1;
        }
    }
    if word.last() == Some(&'e') {
        count -= 1;
    }
    let n = word.len();
    if n > 2 && word[n - 2] == 'l' && word[n - 1] == 'e' && !is_vowel(word[n - 3]) {
        count += 1;
    }
    count.max(1) as usize
}

fn ends_sentence(token: &str) -> bool {
    let mut rev = token.chars().rev();
    matches!(
        (rev.next(), rev.next()),
        (Some('.' | '!' | '?'), Some(c)) if c.is_alphanumeric() || c == '_'
    )
}

/// Number of sentence-ending tokens, ignoring common honorifics and
/// two-letter capitalised abbreviations such as `St.`.
pub fn count_sentences(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| ends_sentence(token))
        .filter(|token| !ABBREVIATIONS.iter().any(|abbr| token.ends_with(abbr)))
        .filter(|token| {
            let chars: Vec<char> = token.chars().collect();
            let n = chars.len();
            !(n >= 3
                && chars[n - 1] == '.'
                && chars[n - 3].is_ascii_uppercase()
                && chars[n - 2].is_ascii_lowercase())
        })
        .count()
}

/// Minutes to read `text` at `words_per_minute`, stretched by the
/// Flesch-Kincaid grade level. `None` for blank input.
pub fn estimate_reading_time(text: &str, words_per_minute: u32) -> Option<f64> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words_per_minute == 0 {
        return None;
    }
    let word_count = words.len() as f64;
    let base = word_count / f64::from(words_per_minute);

    let sentences = count_sentences(text) as f64;
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
    let grade = if sentences == 0.0 {
        0.0
    } else {
        0.39 * (word_count / sentences) + 11.8 * (syllables as f64 / word_count) - 15.59
    };

    Some(base * (1.0 + grade.max(0.0) / 100.0))
}

/// Lowercase, strip punctuation, join words with dashes.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == '-')
        .collect::<String>()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Slug with a short random suffix so equal titles do not collide.
pub fn article_slug(title: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let base = slugify(title);
    if base.is_empty() {
        format!("article-{}", &suffix[..6])
    } else {
        format!("{base}-{}", &suffix[..4])
    }
}

/// Normal sample via Box-Muller.
pub fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return mean;
    }
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_syllables() {
        assert_eq!(count_syllables("rat"), 1);
        assert_eq!(count_syllables("cheese"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("rhythm"), 1);
        assert_eq!(count_syllables("journalism"), 3);
    }

    #[test]
    fn test_sentences_skip_honorifics() {
        let text = "Dr. Whiskers spoke. Mr. Nibbles agreed! Did anyone object? Nope.";
        assert_eq!(count_sentences(text), 4);
        assert_eq!(count_sentences("no terminator here"), 0);
    }

    #[test]
    fn test_reading_time_scales_with_length() {
        assert_eq!(estimate_reading_time("   ", 200), None);
        let short = estimate_reading_time("The rat ran. It was fast.", 200).unwrap();
        let long_text = "The rat ran. It was fast. ".repeat(100);
        let long = estimate_reading_time(&long_text, 200).unwrap();
        assert!(long > short * 50.0);
        // 600 words at 200 wpm
        assert!(long >= 3.0);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Rats Seize City Hall!"), "rats-seize-city-hall");
        assert_eq!(slugify("  Cheese -- Prices   Soar?? "), "cheese-prices-soar");
        let slug = article_slug("Sewer Gridlock");
        assert!(slug.starts_with("sewer-gridlock-"));
        assert_eq!(slug.len(), "sewer-gridlock-".len() + 4);
        assert!(article_slug("!!!").starts_with("article-"));
    }

    #[test]
    fn test_gaussian_zero_spread_is_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_gaussian(&mut rng, 450.0, 0.0), 450.0);
        let mean: f64 = (0..2000)
            .map(|_| sample_gaussian(&mut rng, 450.0, 150.0))
            .sum::<f64>()
            / 2000.0;
        assert!((mean - 450.0).abs() < 20.0, "mean was {mean}");
    }
}

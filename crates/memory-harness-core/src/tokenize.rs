//! Language-aware tokenizer shared by indexing and querying.
//!
//! Latin-script (and any other non-CJK alphanumeric) runs become one
//! lowercase token each. CJK runs have no word boundaries, so they are
//! segmented into overlapping character bigrams; an isolated CJK
//! character becomes a unigram. Everything else is a separator.
//!
//! ```rust
//! use memory_harness_core::tokenize::tokenize;
//!
//! assert_eq!(tokenize("SQLite 数据库"), vec!["sqlite", "数据", "据库"]);
//! ```

/// Returns `true` for CJK ideographs, kana, and hangul syllables.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF     // hiragana + katakana
        | 0x3400..=0x4DBF   // CJK extension A
        | 0x4E00..=0x9FFF   // CJK unified ideographs
        | 0xAC00..=0xD7AF   // hangul syllables
        | 0xF900..=0xFAFF   // CJK compatibility ideographs
        | 0x20000..=0x2A6DF // CJK extension B
    )
}

/// Tokenize `text` into lowercase terms.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    for c in text.chars() {
        if is_cjk(c) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(c);
        } else if c.is_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.extend(c.to_lowercase());
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);

    tokens
}

fn flush_word(word: &mut String, tokens: &mut Vec<String>) {
    if !word.is_empty() {
        tokens.push(std::mem::take(word));
    }
}

fn flush_cjk(run: &mut Vec<char>, tokens: &mut Vec<String>) {
    match run.len() {
        0 => {}
        1 => tokens.push(run[0].to_string()),
        _ => {
            for pair in run.windows(2) {
                tokens.push(pair.iter().collect());
            }
        }
    }
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_words_lowercased() {
        assert_eq!(tokenize("Vue 3 Composition-API"), vec!["vue", "3", "composition", "api"]);
    }

    #[test]
    fn test_cjk_bigrams() {
        assert_eq!(tokenize("数据库优化"), vec!["数据", "据库", "库优", "优化"]);
    }

    #[test]
    fn test_single_cjk_char_is_unigram() {
        assert_eq!(tokenize("用 Rust"), vec!["用", "rust"]);
    }

    #[test]
    fn test_mixed_script_boundaries() {
        assert_eq!(
            tokenize("如何优化SQLite查询"),
            vec!["如何", "何优", "优化", "sqlite", "查询"]
        );
    }

    #[test]
    fn test_extra_whitespace_is_ignored() {
        assert_eq!(tokenize("  alpha \t\n beta  "), tokenize("alpha beta"));
    }

    #[test]
    fn test_punctuation_and_emoji_are_separators() {
        assert_eq!(tokenize("🐛 bug, fix!"), vec!["bug", "fix"]);
        assert!(tokenize("!!! ... ---").is_empty());
    }
}

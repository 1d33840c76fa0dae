//! Kokoro phoneme vocabulary.
//!
//! The v1.0 release assets carry no vocabulary file, so the table lives
//! here. A `tokenizer.json` in the Hugging Face layout (`model.vocab`) can
//! replace it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::SpeechError;

const KOKORO_VOCAB: &[(char, i64)] = &[
    (';', 1), (':', 2), (',', 3), ('.', 4), ('!', 5), ('?', 6),
    ('—', 9), ('…', 10), ('"', 11), ('(', 12), (')', 13), ('“', 14), ('”', 15),
    (' ', 16), ('\u{0303}', 17), ('ʣ', 18), ('ʥ', 19), ('ʦ', 20), ('ʨ', 21),
    ('ᵝ', 22), ('\u{AB67}', 23),
    ('A', 24), ('I', 25), ('O', 31), ('Q', 33), ('S', 35), ('T', 36),
    ('W', 39), ('Y', 41), ('ᵊ', 42),
    ('a', 43), ('b', 44), ('c', 45), ('d', 46), ('e', 47), ('f', 48),
    ('h', 50), ('i', 51), ('j', 52), ('k', 53), ('l', 54), ('m', 55),
    ('n', 56), ('o', 57), ('p', 58), ('q', 59), ('r', 60), ('s', 61),
    ('t', 62), ('u', 63), ('v', 64), ('w', 65), ('x', 66), ('y', 67),
    ('z', 68),
    ('ɑ', 69), ('ɐ', 70), ('ɒ', 71), ('æ', 72), ('β', 75), ('ɔ', 76),
    ('ɕ', 77), ('ç', 78), ('ɖ', 80), ('ð', 81), ('ʤ', 82), ('ə', 83),
    ('ɚ', 85), ('ɛ', 86), ('ɜ', 87), ('ɟ', 90), ('ɡ', 92), ('ɥ', 99),
    ('ɨ', 101), ('ɪ', 102), ('ʝ', 103), ('ɯ', 110), ('ɰ', 111), ('ŋ', 112),
    ('ɳ', 113), ('ɲ', 114), ('ɴ', 115), ('ø', 116), ('ɸ', 118), ('θ', 119),
    ('œ', 120), ('ɹ', 123), ('ɾ', 125), ('ɻ', 126), ('ʁ', 128), ('ɽ', 129),
    ('ʂ', 130), ('ʃ', 131), ('ʈ', 132), ('ʧ', 133), ('ʊ', 135), ('ʋ', 136),
    ('ʌ', 138), ('ɣ', 139), ('ɤ', 140), ('χ', 142), ('ʎ', 143), ('ʒ', 147),
    ('ʔ', 148), ('ˈ', 156), ('ˌ', 157), ('ː', 158), ('ʰ', 162), ('ʲ', 164),
    ('↓', 169), ('→', 171), ('↗', 172), ('↘', 173), ('ᵻ', 177),
];

pub type Vocab = HashMap<char, i64>;

pub fn builtin() -> Vocab {
    KOKORO_VOCAB.iter().copied().collect()
}

/// Use the tokenizer file when one is configured, else the built-in table.
pub fn load(tokenizer_path: Option<&Path>) -> Result<Vocab, SpeechError> {
    match tokenizer_path {
        Some(path) => load_tokenizer(path),
        None => Ok(builtin()),
    }
}

/// Load tokenizer vocabulary from tokenizer.json.
fn load_tokenizer(path: &Path) -> Result<Vocab, SpeechError> {
    let contents = fs::read_to_string(path)?;
    parse_tokenizer(&contents)
}

fn parse_tokenizer(contents: &str) -> Result<Vocab, SpeechError> {
    let data: serde_json::Value = serde_json::from_str(contents)
        .map_err(|e| SpeechError::ModelLoad(format!("Failed to parse tokenizer JSON: {e}")))?;

    let vocab = data["model"]["vocab"]
        .as_object()
        .ok_or_else(|| SpeechError::ModelLoad("Missing model.vocab in tokenizer.json".into()))?;

    let mut map = HashMap::new();
    for (token, id) in vocab {
        let id = id
            .as_i64()
            .ok_or_else(|| SpeechError::ModelLoad(format!("Token ID for {token:?} is not an integer")))?;
        // Each token should be a single character
        if let Some(ch) = token.chars().next() {
            map.insert(ch, id);
        }
    }

    Ok(map)
}

/// Map phonemes to token ids, split into model-sized batches.
///
/// Each batch is padded with 0 on both ends and is at most `max_tokens`
/// long. A batch that would overflow is cut after its last word boundary
/// when it has one. Unknown symbols are dropped, and a string with no known
/// symbols yields no batches.
pub fn tokenize(vocab: &Vocab, phonemes: &str, max_tokens: usize) -> Vec<Vec<i64>> {
    let ids: Vec<i64> = phonemes.chars().filter_map(|ch| vocab.get(&ch).copied()).collect();
    let limit = max_tokens.saturating_sub(2).max(1);
    let space = vocab.get(&' ').copied();

    let mut batches = Vec::new();
    let mut rest = ids.as_slice();
    while !rest.is_empty() {
        let cut = if rest.len() <= limit {
            rest.len()
        } else {
            rest[..limit]
                .iter()
                .rposition(|id| Some(*id) == space)
                .filter(|&pos| pos > 0)
                .map_or(limit, |pos| pos + 1)
        };
        let (batch, tail) = rest.split_at(cut);
        batches.push(padded(batch));
        rest = tail;
    }
    batches
}

fn padded(ids: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len() + 2);
    out.push(0);
    out.extend_from_slice(ids);
    out.push(0);
    out
}

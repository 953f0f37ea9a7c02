//! Tokenization of source files and bug-report text.
//!
//! The ranking core only ever sees normalized token strings. Producing them
//! is the job of a [`SourceTokenizer`]; a full AST-based tokenizer can be
//! plugged in by implementing the trait. [`RegexTokenizer`] is the built-in
//! implementation: identifier extraction, camelCase and snake_case
//! splitting, lowercasing, stopword and keyword removal, Snowball English
//! stemming, and brace-matched method extraction for C-family sources.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

use crate::error::TokenizeError;

// ---------------------------------------------------------------------------
// Trait (extensibility point)
// ---------------------------------------------------------------------------

/// Tokens of one source file, plus the tokens of each method it declares.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedSource {
    pub tokens: Vec<String>,
    pub methods: Vec<Vec<String>>,
}

/// Turns raw file content and free text into normalized tokens.
///
/// Implementations must be thread-safe: files are tokenized in parallel.
pub trait SourceTokenizer: Send + Sync {
    /// Tokenize a source file. `path` is only used for diagnostics.
    fn tokenize_source(&self, path: &str, raw: &[u8]) -> Result<ParsedSource, TokenizeError>;

    /// Tokenize natural-language text such as a bug report.
    fn tokenize_text(&self, text: &str) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Regex-based implementation
// ---------------------------------------------------------------------------

/// Heuristic tokenizer for Java-like sources and English text.
#[derive(Debug, Clone, Default)]
pub struct RegexTokenizer;

impl SourceTokenizer for RegexTokenizer {
    fn tokenize_source(&self, path: &str, raw: &[u8]) -> Result<ParsedSource, TokenizeError> {
        let content = std::str::from_utf8(raw)
            .map_err(|e| TokenizeError::new(path, format!("not valid UTF-8: {e}")))?;
        if content.contains('\0') {
            return Err(TokenizeError::new(path, "binary content"));
        }
        let methods = extract_method_bodies(content)
            .into_iter()
            .map(normalize)
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Ok(ParsedSource {
            tokens: normalize(content),
            methods,
        })
    }

    fn tokenize_text(&self, text: &str) -> Vec<String> {
        normalize(text)
    }
}

/// Extract, split, lowercase, filter, and stem every identifier in `text`.
pub fn normalize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in identifier_regex().find_iter(text) {
        let parts = split_identifier(word.as_str());
        if parts.len() > 1 {
            push_token(&mut tokens, &word.as_str().to_lowercase());
        }
        for part in parts {
            push_token(&mut tokens, &part);
        }
    }
    tokens
}

fn push_token(tokens: &mut Vec<String>, word: &str) {
    if word.len() < 2 || stopwords().contains(word) {
        return;
    }
    let stemmed = stem(word);
    if stemmed.len() >= 2 {
        tokens.push(stemmed);
    }
}

/// Split `parseHTTPRequest_v2` into `parse`, `http`, `request`, `v2`.
pub fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for chunk in word.split('_').filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0
                && c.is_uppercase()
                && (chars[i - 1].is_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
            if boundary && !current.is_empty() {
                parts.push(current.to_lowercase());
                current.clear();
            }
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current.to_lowercase());
        }
    }
    parts
}

/// Reduce a lowercase word to its Snowball English stem.
pub fn stem(word: &str) -> String {
    stemmer().stem(word).into_owned()
}

/// Find method declarations and return each one's header and body text.
pub fn extract_method_bodies(content: &str) -> Vec<&str> {
    let mut bodies = Vec::new();
    let mut resume_at = 0;
    for caps in method_header_regex().captures_iter(content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() < resume_at || CONTROL_WORDS.contains(&name.as_str()) {
            continue;
        }
        let open = whole.end() - 1;
        if let Some(close) = matching_brace(content, open) {
            bodies.push(&content[whole.start()..=close]);
            resume_at = close + 1;
        }
    }
    bodies
}

fn matching_brace(content: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, b) in content.as_bytes()[open..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

const CONTROL_WORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "synchronized", "return", "new", "else", "try", "do",
];

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9_]*").expect("identifier pattern is valid"))
}

fn method_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:(?:public|protected|private|static|final|synchronized|abstract|native|default)\s+)*[\w<>\[\],.?]+\s+(\w+)\s*\([^;{}()]*\)\s*(?:throws\s+[\w.,\s]+)?\{",
        )
        .expect("method header pattern is valid")
    })
}

fn stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

fn stopwords() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            // English
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could", "did", "do",
            "does", "for", "from", "had", "has", "have", "he", "her", "his", "how", "if", "in",
            "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our", "she",
            "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
            "there", "these", "they", "this", "those", "to", "too", "us", "was", "we", "were",
            "what", "when", "where", "which", "while", "who", "why", "will", "with", "would",
            "you", "your",
            // Java keywords and ubiquitous identifiers
            "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
            "const", "continue", "default", "double", "else", "enum", "extends", "final",
            "finally", "float", "goto", "implements", "import", "instanceof", "int",
            "interface", "long", "native", "new", "null", "package", "private", "protected",
            "public", "return", "short", "static", "super", "switch", "synchronized", "throw",
            "throws", "transient", "true", "false", "try", "void", "volatile", "string",
            "override", "java", "org", "com",
        ]
        .into_iter()
        .collect()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// src/utils/text.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::{
    config::MIN_ANSWERS_PER_QUESTION,
    models::question::{ImportAnswer, NewAnswer},
};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Answer rows that actually hold the explanation ("Objašnjenje: ...").
static EXPLANATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^obja[šs]n[jј]?en").expect("valid regex"));

/// Something that looks like an opening, closing or comment tag.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z!/][^>]*>").expect("valid regex"));

/// Removes HTML tags pasted along with question text, keeping the plain text.
///
/// Text without tags is returned untouched, so `a < b` or `50 km/h & kiša`
/// stay as typed. When tags are present, ammonia drops all of them
/// (`<script>`/`<style>` with their content) and the entities it emits for
/// text are decoded back.
pub fn strip_markup(input: &str) -> String {
    if !MARKUP.is_match(input) {
        return input.to_string();
    }

    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input)
        .to_string();

    cleaned
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

/// Drops carriage returns, turns non-breaking spaces into spaces, collapses
/// runs of whitespace and trims.
pub fn collapse_whitespace(raw: &str) -> String {
    let without_cr = raw.replace('\r', "").replace('\u{00A0}', " ");
    WHITESPACE.replace_all(&without_cr, " ").trim().to_string()
}

/// Normalised answer text; empty when the row is an explanation line.
pub fn normalize_answer_text(raw: &str) -> String {
    let text = collapse_whitespace(&strip_markup(raw));
    if EXPLANATION.is_match(&text) {
        return String::new();
    }
    text
}

/// Normalises and merges answers.
///
/// Empty answers are dropped; answers with the same text collapse into one,
/// correct if any copy was correct. First-seen order is kept.
pub fn normalize_answers(answers: &[ImportAnswer]) -> Result<Vec<NewAnswer>, String> {
    let mut out: Vec<NewAnswer> = Vec::with_capacity(answers.len());

    for answer in answers {
        let text = normalize_answer_text(answer.text.as_deref().unwrap_or_default());
        if text.is_empty() {
            continue;
        }
        match out.iter_mut().find(|a| a.text == text) {
            Some(existing) => existing.is_correct |= answer.is_correct,
            None => out.push(NewAnswer {
                text,
                is_correct: answer.is_correct,
            }),
        }
    }

    if out.len() < MIN_ANSWERS_PER_QUESTION {
        return Err(format!(
            "A question needs at least {} answers.",
            MIN_ANSWERS_PER_QUESTION
        ));
    }
    if !out.iter().any(|a| a.is_correct) {
        return Err("At least one answer must be correct.".to_string());
    }
    Ok(out)
}

/// Accepts absolute http(s) URLs only.
pub fn validate_image_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid image_url: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(format!("Invalid image_url scheme: {}", other)),
    }
}

/// First `max` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

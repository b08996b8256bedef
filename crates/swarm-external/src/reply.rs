//! Free-text bid replies.
//!
//! Model-backed bidders are asked to answer with an object such as
//! `{"bid_score": 0.8, "reasoning": "..."}`, but replies often arrive
//! wrapped in prose or code fences. The whole reply is tried as JSON first,
//! then the first `"bid_score": <number>` anywhere in the text is used.

use regex::Regex;
use serde_json::Value;

/// Bid value and optional explanation recovered from a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// As written in the reply. Not clamped.
    pub bid: f64,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReplyParser {
    bid_score: Regex,
    reasoning: Regex,
}

impl ReplyParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bid_score: Regex::new(r#""bid_score"\s*:\s*([0-9]*\.?[0-9]+)"#)?,
            reasoning: Regex::new(r#""reasoning"\s*:\s*"((?:[^"\\]|\\.)*)""#)?,
        })
    }

    /// `None` when the reply carries no usable bid.
    pub fn parse(&self, reply: &str) -> Option<ParsedReply> {
        if let Some(parsed) = parse_object(reply.trim()) {
            return Some(parsed);
        }

        let captures = self.bid_score.captures(reply)?;
        let bid: f64 = captures.get(1)?.as_str().parse().ok()?;
        let reasoning = self
            .reasoning
            .captures(reply)
            .and_then(|c| c.get(1))
            .map(|m| unescape(m.as_str()));

        Some(ParsedReply { bid, reasoning })
    }
}

fn parse_object(reply: &str) -> Option<ParsedReply> {
    let Value::Object(fields) = serde_json::from_str::<Value>(reply).ok()? else {
        return None;
    };
    let bid = fields.get("bid_score")?.as_f64()?;
    let reasoning = fields.get("reasoning").and_then(Value::as_str).map(str::to_string);
    Some(ParsedReply { bid, reasoning })
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ReplyParser {
        ReplyParser::new().unwrap()
    }

    #[test]
    fn parses_plain_object() {
        let parsed = parser()
            .parse(r#"{"bid_score": 0.8, "reasoning": "plenty of free nodes"}"#)
            .unwrap();
        assert_eq!(parsed.bid, 0.8);
        assert_eq!(parsed.reasoning.as_deref(), Some("plenty of free nodes"));
    }

    #[test]
    fn finds_score_inside_prose() {
        let reply = concat!(
            "Sure! Here is my answer:\n```json\n",
            "{\"bid_score\": .35, \"reasoning\": \"queue is \\\"long\\\"\"}\n```",
        );
        let parsed = parser().parse(reply).unwrap();
        assert_eq!(parsed.bid, 0.35);
        assert_eq!(parsed.reasoning.as_deref(), Some("queue is \"long\""));
    }

    #[test]
    fn out_of_range_values_are_returned_unclamped() {
        assert_eq!(parser().parse(r#"{"bid_score": 1.7}"#).unwrap().bid, 1.7);
    }

    #[test]
    fn first_score_wins() {
        let reply = r#"draft "bid_score": 0.2 ... final "bid_score": 0.9"#;
        assert_eq!(parser().parse(reply).unwrap().bid, 0.2);
    }

    #[test]
    fn unusable_replies_yield_none() {
        let p = parser();
        assert_eq!(p.parse("I cannot answer that."), None);
        assert_eq!(p.parse(r#"{"bid_score": "high"}"#), None);
        assert_eq!(p.parse(r#"{"score": 0.5}"#), None);
        assert_eq!(p.parse(""), None);
    }
}

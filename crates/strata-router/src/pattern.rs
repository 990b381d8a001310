// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic pattern complexity for request text.
//!
//! Produces the `pattern_complexity` confidence feature from the request
//! text and recent conversation using zero-cost rules. No model call, no
//! network, no latency.

/// Short acknowledgements (exact match, case-insensitive).
const TRIVIAL_EXACT: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay",
    "yes", "no", "sure", "good", "great", "cool", "nice", "yep", "nope",
    "yeah", "nah",
];

/// Lookup-style questions (contains, case-insensitive).
const LOOKUP_QUESTIONS: &[&str] = &[
    "what time", "what day", "what date", "how are you",
    "who are you", "what's your name", "what is the time", "what is the date",
];

/// Phrases that usually mean multi-step reasoning (contains, case-insensitive).
const REASONING_INDICATORS: &[&str] = &[
    "analyze", "compare", "evaluate", "implement", "design",
    "architecture", "trade-off", "tradeoff", "pros and cons",
    "step by step", "explain in detail", "debug", "refactor",
    "code review", "write a function", "write code", "write a program",
    "optimize", "algorithm", "strategy", "in depth", "comprehensive",
    "prove", "derive",
];

/// Signal score range mapped onto `[0, 1]`.
const SCORE_SPAN: i32 = 5;

/// Pattern complexity of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternScore {
    /// Complexity in `[0, 1]`; higher means harder.
    pub complexity: f64,
    /// Raw signal sum before mapping.
    pub signals: i32,
    pub reason: &'static str,
}

/// Rule-based complexity estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Estimate how intricate `message` is, given up to three recent messages.
    pub fn analyze(&self, message: &str, recent_context: &[&str]) -> PatternScore {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return PatternScore {
                complexity: 0.0,
                signals: -SCORE_SPAN,
                reason: "empty message",
            };
        }

        let lower = trimmed.to_lowercase();
        let mut score = Self::length_score(trimmed.split_whitespace().count());

        if TRIVIAL_EXACT.iter().any(|p| lower == *p) {
            score -= 3;
        }
        if LOOKUP_QUESTIONS.iter().any(|q| lower.contains(q)) {
            score -= 2;
        }
        if REASONING_INDICATORS.iter().any(|c| lower.contains(c)) {
            score += 2;
        }
        if trimmed.contains("```") {
            score += 3;
        }
        if Self::count_sentences(trimmed) >= 3 {
            score += 1;
        }
        score += Self::momentum_score(recent_context);

        let reason = if score <= -2 {
            "trivial request indicators"
        } else if score >= 2 {
            "reasoning indicators"
        } else {
            "moderate request"
        };
        PatternScore {
            complexity: Self::normalize(score),
            signals: score,
            reason,
        }
    }

    fn normalize(score: i32) -> f64 {
        let clamped = score.clamp(-SCORE_SPAN, SCORE_SPAN);
        f64::from(clamped + SCORE_SPAN) / f64::from(2 * SCORE_SPAN)
    }

    fn length_score(word_count: usize) -> i32 {
        match word_count {
            0..=3 => -2,
            4..=15 => 0,
            16..=50 => 1,
            _ => 2,
        }
    }

    fn count_sentences(text: &str) -> usize {
        text.chars()
            .filter(|c| matches!(c, '.' | '?' | '!'))
            .count()
            .max(1)
    }

    fn momentum_score(recent_context: &[&str]) -> i32 {
        let limit = recent_context.len().min(3);
        let recent = &recent_context[recent_context.len() - limit..];

        let heavy = recent
            .iter()
            .filter(|m| {
                let lower = m.to_lowercase();
                REASONING_INDICATORS.iter().any(|c| lower.contains(c)) || m.contains("```")
            })
            .count();

        if heavy >= 2 { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_are_trivial() {
        let a = PatternAnalyzer::new();
        for text in ["hi", "hello", "thanks", "bye", "ok"] {
            let score = a.analyze(text, &[]);
            assert!(score.complexity < 0.2, "{text}: {}", score.complexity);
        }
    }

    #[test]
    fn lookup_questions_are_simple() {
        let score = PatternAnalyzer::new().analyze("what time is it?", &[]);
        assert!(score.complexity <= 0.3);
    }

    #[test]
    fn analysis_requests_are_complex() {
        let score = PatternAnalyzer::new().analyze(
            "analyze this code and refactor it for better performance",
            &[],
        );
        assert!(score.complexity >= 0.7);
        assert_eq!(score.reason, "reasoning indicators");
    }

    #[test]
    fn code_blocks_raise_complexity() {
        let plain = PatternAnalyzer::new().analyze("can you fix this?", &[]);
        let code =
            PatternAnalyzer::new().analyze("can you fix this?\n```\nfn main() { panic!() }\n```", &[]);
        assert!(code.complexity > plain.complexity);
    }

    #[test]
    fn moderate_questions_sit_in_the_middle() {
        let score = PatternAnalyzer::new().analyze("what's the weather like today?", &[]);
        assert_eq!(score.reason, "moderate request");
        assert!((0.3..=0.7).contains(&score.complexity));
    }

    #[test]
    fn conversation_momentum_biases_upward() {
        let a = PatternAnalyzer::new();
        let recent = &[
            "can you analyze the performance bottleneck?",
            "let me implement a better algorithm for this",
            "now debug the edge case",
        ];
        let alone = a.analyze("what about this?", &[]);
        let in_context = a.analyze("what about this?", recent);
        assert_eq!(in_context.signals, alone.signals + 1);
    }

    #[test]
    fn empty_message_has_zero_complexity() {
        let a = PatternAnalyzer::new();
        assert_eq!(a.analyze("", &[]).complexity, 0.0);
        assert_eq!(a.analyze("   ", &[]).complexity, 0.0);
    }

    #[test]
    fn complexity_stays_in_unit_range() {
        let long = "analyze ".repeat(200) + "```code``` step by step. why? how!";
        let score = PatternAnalyzer::new().analyze(&long, &[]);
        assert_eq!(score.complexity, 1.0);
    }
}

//! Best-effort recovery of sync counts from the fetch task's text output.
//!
//! The fetch task reports its result only as human-readable lines, so the
//! counts are pattern-matched out of stdout. Rules are tried in a fixed
//! priority order and the first match wins:
//!
//! 1. "processed P, inserted I" (`处理了 P 封邮件，新增 I 封`) → `(P, I)`
//! 2. "fetched N new" (`获取到 N 封新邮件`) → `(N, N)`
//! 3. "nothing fetched" (`没有获取到任何邮件`) → `(0, 0)`
//! 4. the last number anywhere in the text → `(n, n)`, or `(0, 0)` without digits
//!
//! Extraction never fails.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

/// Counts reported by one fetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncCounts {
    /// Items the source reported seeing.
    pub processed: u64,
    /// Items newly persisted.
    pub inserted: u64,
}

impl SyncCounts {
    /// Creates a pair of counts.
    #[must_use]
    pub const fn new(processed: u64, inserted: u64) -> Self {
        Self {
            processed,
            inserted,
        }
    }

    /// Both counts set to `n`.
    #[must_use]
    pub const fn uniform(n: u64) -> Self {
        Self::new(n, n)
    }
}

/// Which extraction rule produced the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedRule {
    /// "processed P, inserted I".
    ProcessedInserted,
    /// "fetched N new".
    FetchedNew,
    /// "nothing fetched".
    NothingFetched,
    /// Fallback on the last number in the text.
    LastNumber,
    /// No rule matched and the text had no digits.
    NoDigits,
}

/// Result of running the extraction rules over a piece of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    /// Recovered counts.
    pub counts: SyncCounts,
    /// Rule that produced them.
    pub rule: MatchedRule,
}

#[allow(clippy::expect_used)]
fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extraction pattern must compile")
}

static PROCESSED_INSERTED: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        regex(r"处理了?\s*([0-9]+)\s*封邮件\s*[，,;；]?\s*新增\s*([0-9]+)\s*封"),
        regex(r"(?i)processed\s+([0-9]+)\s+\w+\s*[,;]?\s*(?:inserted|new)\s+([0-9]+)"),
    ]
});

static FETCHED_NEW: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        regex(r"获取到\s*([0-9]+)\s*封新邮件"),
        regex(r"(?i)fetched\s+([0-9]+)\s+new\b"),
    ]
});

static NOTHING_FETCHED: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        regex(r"没有获取到任何邮件"),
        regex(r"(?i)no\s+(?:new\s+)?(?:emails|items|messages)\s+(?:were\s+)?fetched"),
    ]
});

static DIGITS: LazyLock<Regex> = LazyLock::new(|| regex(r"[0-9]+"));

/// Oversized numbers saturate rather than fail.
fn parse_count(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Runs the extraction rules over `text`, reporting which rule matched.
#[must_use]
pub fn extract(text: &str) -> Extraction {
    info!(raw_output = %text, "Extracting sync counts from fetch output");

    for pattern in PROCESSED_INSERTED.iter() {
        if let Some(caps) = pattern.captures(text) {
            let counts = SyncCounts::new(parse_count(&caps[1]), parse_count(&caps[2]));
            debug!(?counts, "Matched processed/inserted pattern");
            return Extraction {
                counts,
                rule: MatchedRule::ProcessedInserted,
            };
        }
    }

    for pattern in FETCHED_NEW.iter() {
        if let Some(caps) = pattern.captures(text) {
            let counts = SyncCounts::uniform(parse_count(&caps[1]));
            debug!(?counts, "Matched fetched-new pattern");
            return Extraction {
                counts,
                rule: MatchedRule::FetchedNew,
            };
        }
    }

    if NOTHING_FETCHED.iter().any(|pattern| pattern.is_match(text)) {
        debug!("Matched nothing-fetched pattern");
        return Extraction {
            counts: SyncCounts::default(),
            rule: MatchedRule::NothingFetched,
        };
    }

    match DIGITS.find_iter(text).last() {
        Some(last) => {
            let counts = SyncCounts::uniform(parse_count(last.as_str()));
            warn!(?counts, "No known pattern in fetch output, using last number");
            Extraction {
                counts,
                rule: MatchedRule::LastNumber,
            }
        }
        None => {
            warn!("No known pattern and no digits in fetch output, assuming zero");
            Extraction {
                counts: SyncCounts::default(),
                rule: MatchedRule::NoDigits,
            }
        }
    }
}

/// Shorthand for [`extract`] when only the counts matter.
#[must_use]
pub fn extract_counts(text: &str) -> SyncCounts {
    extract(text).counts
}

/// Renders counts in the highest-priority form [`extract`] understands.
#[must_use]
pub fn summary_line(counts: SyncCounts) -> String {
    format!(
        "处理了 {} 封邮件，新增 {} 封",
        counts.processed, counts.inserted
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_processed_and_inserted() {
        let result = extract("同步结束：处理了 12 封邮件，新增 3 封");
        assert_eq!(result.counts, SyncCounts::new(12, 3));
        assert_eq!(result.rule, MatchedRule::ProcessedInserted);
    }

    #[test]
    fn test_processed_and_inserted_english() {
        let counts = extract_counts("done: processed 40 items, inserted 7 items");
        assert_eq!(counts, SyncCounts::new(40, 7));
    }

    #[test]
    fn test_fetched_new() {
        let result = extract("获取到 5 封新邮件");
        assert_eq!(result.counts, SyncCounts::new(5, 5));
        assert_eq!(result.rule, MatchedRule::FetchedNew);
    }

    #[test]
    fn test_fetched_new_english() {
        assert_eq!(
            extract_counts("Fetched 9 new items from INBOX"),
            SyncCounts::uniform(9)
        );
    }

    #[test]
    fn test_nothing_fetched() {
        let result = extract("没有获取到任何邮件\n脚本执行完成，返回值: 0");
        assert_eq!(result.counts, SyncCounts::default());
        assert_eq!(result.rule, MatchedRule::NothingFetched);
    }

    #[test]
    fn test_fallback_takes_last_number() {
        let result = extract("batch 1 of 2 done ... 42 ...");
        assert_eq!(result.counts, SyncCounts::new(42, 42));
        assert_eq!(result.rule, MatchedRule::LastNumber);
    }

    #[test]
    fn test_fallback_on_insert_report() {
        // "成功插入 N 封邮件" has no dedicated rule; the trailing return value wins.
        let counts = extract_counts("成功插入 3 封邮件\n脚本执行完成，返回值: 3\n");
        assert_eq!(counts, SyncCounts::uniform(3));
    }

    #[test]
    fn test_no_digits() {
        let result = extract("connection reset by peer");
        assert_eq!(result.counts, SyncCounts::default());
        assert_eq!(result.rule, MatchedRule::NoDigits);
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(extract_counts(""), SyncCounts::default());
    }

    #[test]
    fn test_rule_priority() {
        // Rule 1 wins even when rule 2 text appears first.
        let text = "获取到 8 封新邮件\n处理了 8 封邮件，新增 2 封";
        assert_eq!(extract_counts(text), SyncCounts::new(8, 2));
    }

    #[test]
    fn test_oversized_number_saturates() {
        let counts = extract_counts("total 99999999999999999999999");
        assert_eq!(counts, SyncCounts::uniform(u64::MAX));
    }

    #[test]
    fn test_summary_line_is_recognized() {
        let counts = SyncCounts::new(17, 4);
        let result = extract(&summary_line(counts));
        assert_eq!(result.counts, counts);
        assert_eq!(result.rule, MatchedRule::ProcessedInserted);
    }

    proptest! {
        #[test]
        fn prop_text_without_digits_yields_zero(text in "[^0-9]*") {
            let result = extract(&text);
            if result.rule != MatchedRule::NothingFetched {
                prop_assert_eq!(result.rule, MatchedRule::NoDigits);
            }
            prop_assert_eq!(result.counts, SyncCounts::default());
        }

        #[test]
        fn prop_unrecognized_text_uses_last_number(
            prefix in "[a-z ]{0,20}",
            n in 0u64..1_000_000,
            suffix in "[a-z ]{0,20}",
        ) {
            let text = format!("{prefix}#{n}#{suffix}");
            let result = extract(&text);
            if result.rule == MatchedRule::LastNumber {
                prop_assert_eq!(result.counts, SyncCounts::uniform(n));
            }
        }
    }
}

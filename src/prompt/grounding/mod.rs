// Grounding check for generated answers
// Flags numeric metrics that the model stated but the retrieved context never mentions

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;
use tracing::debug;

static METRIC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?<![\w.])\$?(\d+(?:[.,]\d+)*)(\s?(?:%|×|x(?!\w)|ms(?!\w)|s(?!\w)|k(?!\w)|K(?!\w)|M(?!\w)|GB(?!\w)|MB(?!\w)|TB(?!\w)|hours?(?!\w)|minutes?(?!\w)|seconds?(?!\w)|days?(?!\w)|weeks?(?!\w)|users(?!\w)))?",
    )
    .expect("valid metric regex")
});

/// A number found in text, with the unit that followed it if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Text as it appeared, e.g. `"40%"` or `"$1,200"`
    pub text: String,
    /// Normalized numeric value, e.g. `"40"` or `"1200"`
    pub value: String,
    pub has_unit: bool,
}

impl Metric {
    /// Bare single-digit numbers are usually list markers or counts, not metrics
    fn is_significant(&self) -> bool {
        self.has_unit || self.text.starts_with('$') || self.value.replace('.', "").len() >= 2
    }
}

/// Extract every number (with optional unit) from `text`
#[inline]
pub fn extract_metrics(text: &str) -> Vec<Metric> {
    METRIC_REGEX
        .captures_iter(text)
        .filter_map(|captures| captures.ok())
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let number = captures.get(1)?;
            Some(Metric {
                text: whole.as_str().trim().to_string(),
                value: number.as_str().replace(',', ""),
                has_unit: captures.get(2).is_some(),
            })
        })
        .collect()
}

/// Significant metrics in `answer` whose numeric value never appears in `context`.
///
/// Returned in order of first appearance, without duplicates. An empty result
/// means every stated number can be traced back to the retrieved chunks.
#[inline]
pub fn unsupported_metrics(answer: &str, context: &str) -> Vec<String> {
    let known: HashSet<String> = extract_metrics(context)
        .into_iter()
        .map(|metric| metric.value)
        .collect();

    let unsupported: Vec<String> = extract_metrics(answer)
        .into_iter()
        .filter(Metric::is_significant)
        .filter(|metric| !known.contains(&metric.value))
        .map(|metric| metric.text)
        .unique()
        .collect();

    if !unsupported.is_empty() {
        debug!("Answer contains unsupported metrics: {:?}", unsupported);
    }

    unsupported
}

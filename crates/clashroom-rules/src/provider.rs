//! Rule provider seam and custom-rule resolution.

use std::collections::BTreeSet;
use std::future::Future;

use crate::{HttpRuleProvider, RuleError, RuleSet};

/// Produces rule sets for free-form options.
///
/// Implementations talk to whatever invents the relations (an LLM behind
/// HTTP in production, canned answers in tests). They must not panic on
/// bad upstream data: every failure is a [`RuleError`].
///
/// The returned future must be `Send` because room actors run the call on
/// a spawned task.
pub trait RuleProvider: Send + Sync + 'static {
    /// Generates a validated rule set covering `options`.
    fn generate(
        &self,
        options: &[String],
    ) -> impl Future<Output = Result<RuleSet, RuleError>> + Send;
}

/// Lowercases, trims, and deduplicates options. The result is sorted so
/// the same set of choices always produces the same request.
pub fn distinct_options<S: AsRef<str>>(options: &[S]) -> Vec<String> {
    options
        .iter()
        .map(|o| o.as_ref().trim().to_lowercase())
        .filter(|o| !o.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Asks `provider` for a rule set covering the distinct `options` and
/// checks that every option made it into the result.
///
/// The result may contain extra types the provider added to close a
/// cycle; units are only ever spawned for chosen options.
pub async fn resolve_custom<P: RuleProvider>(
    provider: &P,
    options: &[String],
) -> Result<RuleSet, RuleError> {
    let distinct = distinct_options(options);
    if distinct.is_empty() {
        return Err(RuleError::NoOptions);
    }

    tracing::debug!(options = ?distinct, "requesting custom rules");
    let rules = provider.generate(&distinct).await?;

    if let Some(missing) = distinct.iter().find(|o| rules.index_of(o).is_none()) {
        return Err(RuleError::MissingOption(missing.clone()));
    }

    tracing::info!(
        options = ?distinct,
        types = rules.len(),
        "custom rules resolved"
    );
    Ok(rules)
}

// ---------------------------------------------------------------------------
// RuleGenerator
// ---------------------------------------------------------------------------

/// The server's rule provider, chosen at startup.
///
/// Enum dispatch keeps the server generic over one concrete type while
/// still letting configuration decide whether custom options work.
pub enum RuleGenerator {
    /// An OpenAI-compatible chat-completions endpoint.
    Http(HttpRuleProvider),
    /// No generator configured; custom options always fail.
    Disabled,
}

impl RuleGenerator {
    /// Human-readable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Disabled => "disabled",
        }
    }
}

impl RuleProvider for RuleGenerator {
    async fn generate(&self, options: &[String]) -> Result<RuleSet, RuleError> {
        match self {
            Self::Http(provider) => provider.generate(options).await,
            Self::Disabled => Err(RuleError::Unavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleEntry;

    /// Always answers with the same three-cycle over dragon/knight/wizard.
    struct FixedProvider;

    impl RuleProvider for FixedProvider {
        async fn generate(&self, _options: &[String]) -> Result<RuleSet, RuleError> {
            Ok(RuleSet::from_entries(vec![
                RuleEntry::new("dragon", "🐉", &["knight"]),
                RuleEntry::new("knight", "🛡️", &["wizard"]),
                RuleEntry::new("wizard", "🧙", &["dragon"]),
            ])?)
        }
    }

    #[test]
    fn test_distinct_options_dedupes_case_insensitively() {
        let options = distinct_options(&["Dragon", "knight", "dragon", " Knight "]);
        assert_eq!(options, vec!["dragon".to_string(), "knight".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_custom_returns_covering_rules() {
        let rules = resolve_custom(&FixedProvider, &["Dragon".into(), "knight".into()])
            .await
            .unwrap();
        assert_eq!(rules.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_custom_missing_option_fails() {
        let result = resolve_custom(&FixedProvider, &["dragon".into(), "unicorn".into()]).await;
        assert!(matches!(result, Err(RuleError::MissingOption(o)) if o == "unicorn"));
    }

    #[tokio::test]
    async fn test_resolve_custom_without_options_fails_before_calling() {
        let result = resolve_custom(&RuleGenerator::Disabled, &[]).await;
        assert!(matches!(result, Err(RuleError::NoOptions)));
    }

    #[tokio::test]
    async fn test_disabled_generator_is_unavailable() {
        let result = resolve_custom(&RuleGenerator::Disabled, &["dragon".into()]).await;
        assert!(matches!(result, Err(RuleError::Unavailable)));
    }
}

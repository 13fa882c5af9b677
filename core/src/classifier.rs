//! Failure classification for exception filtering
//!
//! A policy reacts to a failure only if one of its `FailureRule`s selects it.
//! Rules select by category (including sub-categories) and may narrow the
//! selection with a predicate over the failure value. Rules are OR-combined:
//! "handle X or Y" is two rules, "handle X only if ..." is one rule with a
//! predicate.

use std::fmt;
use std::sync::Arc;

/// A node in a failure category hierarchy
///
/// Each category names its parent; a rule written for a parent category also
/// selects every category below it.
///
/// # Examples
///
/// ```rust
/// use retry_machines::FailureCategory;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Kind {
///     Io,
///     Timeout,
///     ConnectTimeout,
/// }
///
/// impl FailureCategory for Kind {
///     fn parent(self) -> Option<Self> {
///         match self {
///             Kind::Io => None,
///             Kind::Timeout => Some(Kind::Io),
///             Kind::ConnectTimeout => Some(Kind::Timeout),
///         }
///     }
/// }
///
/// assert!(Kind::ConnectTimeout.is_a(Kind::Io));
/// assert!(!Kind::Io.is_a(Kind::Timeout));
/// ```
pub trait FailureCategory: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Direct parent of this category, `None` for a root
    fn parent(self) -> Option<Self>;

    /// True if `self` is `ancestor` or lies below it
    fn is_a(self, ancestor: Self) -> bool {
        let mut current = Some(self);
        while let Some(category) = current {
            if category == ancestor {
                return true;
            }
            current = category.parent();
        }
        false
    }
}

/// Errors that expose a category tag for rule matching
pub trait Categorized {
    type Category: FailureCategory;

    fn category(&self) -> Self::Category;
}

type Selector<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A single "handle this failure" rule
pub struct FailureRule<E> {
    label: String,
    selector: Option<Selector<E>>,
    predicate: Option<Selector<E>>,
}

impl<E> FailureRule<E> {
    /// Rule selecting every failure
    pub fn any() -> Self {
        Self {
            label: "any".to_string(),
            selector: None,
            predicate: None,
        }
    }

    /// Rule selecting failures accepted by `predicate`, regardless of category
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::any().when(predicate)
    }

    /// Narrow this rule with a predicate over the failure value
    ///
    /// Calling `when` twice replaces the earlier predicate.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Check the failure against selector and predicate
    pub fn matches(&self, error: &E) -> bool {
        let selected = self.selector.as_ref().is_none_or(|select| select(error));
        selected && self.predicate.as_ref().is_none_or(|accept| accept(error))
    }
}

impl<E> FailureRule<E>
where
    E: Categorized + 'static,
{
    /// Rule selecting `category` and all of its sub-categories
    pub fn of(category: E::Category) -> Self {
        Self {
            label: format!("{:?}", category),
            selector: Some(Arc::new(move |error: &E| error.category().is_a(category))),
            predicate: None,
        }
    }
}

impl<E> Clone for FailureRule<E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            selector: self.selector.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<E> fmt::Debug for FailureRule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureRule")
            .field("selects", &self.label)
            .field("predicate", &self.predicate.as_ref().map(|_| "<closure>"))
            .finish()
    }
}

/// OR-combination of failure rules owned by a policy
pub struct FailureMatcher<E> {
    rules: Vec<FailureRule<E>>,
}

impl<E> FailureMatcher<E> {
    /// Build a matcher; an empty rule list falls back to a catch-all rule
    pub fn new(rules: Vec<FailureRule<E>>) -> Self {
        if rules.is_empty() {
            return Self::any();
        }
        Self { rules }
    }

    /// Matcher that selects every failure
    pub fn any() -> Self {
        Self {
            rules: vec![FailureRule::any()],
        }
    }

    /// True if any rule selects the failure
    pub fn matches(&self, error: &E) -> bool {
        self.rules.iter().any(|rule| rule.matches(error))
    }

    pub fn rules(&self) -> &[FailureRule<E>] {
        &self.rules
    }
}

impl<E> Default for FailureMatcher<E> {
    fn default() -> Self {
        Self::any()
    }
}

impl<E> Clone for FailureMatcher<E> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<E> fmt::Debug for FailureMatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rules.iter()).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Kind {
        Network,
        Timeout,
        Refused,
        Validation,
    }

    impl FailureCategory for Kind {
        fn parent(self) -> Option<Self> {
            match self {
                Kind::Network | Kind::Validation => None,
                Kind::Timeout | Kind::Refused => Some(Kind::Network),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct ApiError {
        pub kind: Kind,
        pub status: u16,
    }

    impl ApiError {
        pub(crate) fn new(kind: Kind, status: u16) -> Self {
            Self { kind, status }
        }
    }

    impl Categorized for ApiError {
        type Category = Kind;

        fn category(&self) -> Kind {
            self.kind
        }
    }

    #[test]
    fn test_category_ancestry() {
        assert!(Kind::Timeout.is_a(Kind::Timeout));
        assert!(Kind::Timeout.is_a(Kind::Network));
        assert!(!Kind::Network.is_a(Kind::Timeout));
        assert!(!Kind::Validation.is_a(Kind::Network));
    }

    #[test]
    fn test_rule_matches_sub_categories() {
        let rule = FailureRule::<ApiError>::of(Kind::Network);

        assert!(rule.matches(&ApiError::new(Kind::Network, 0)));
        assert!(rule.matches(&ApiError::new(Kind::Timeout, 0)));
        assert!(rule.matches(&ApiError::new(Kind::Refused, 0)));
        assert!(!rule.matches(&ApiError::new(Kind::Validation, 422)));
    }

    #[test]
    fn test_rule_predicate_narrows_selection() {
        let rule = FailureRule::<ApiError>::of(Kind::Network).when(|e| e.status >= 500);

        assert!(rule.matches(&ApiError::new(Kind::Timeout, 503)));
        assert!(!rule.matches(&ApiError::new(Kind::Timeout, 404)));
        // predicate alone does not widen the category
        assert!(!rule.matches(&ApiError::new(Kind::Validation, 503)));
    }

    #[test]
    fn test_matcher_is_or_combination() {
        let matcher = FailureMatcher::new(vec![
            FailureRule::<ApiError>::of(Kind::Timeout),
            FailureRule::<ApiError>::of(Kind::Validation).when(|e| e.status == 429),
        ]);

        assert!(matcher.matches(&ApiError::new(Kind::Timeout, 0)));
        assert!(matcher.matches(&ApiError::new(Kind::Validation, 429)));
        assert!(!matcher.matches(&ApiError::new(Kind::Validation, 400)));
        assert!(!matcher.matches(&ApiError::new(Kind::Refused, 0)));
    }

    #[test]
    fn test_empty_matcher_selects_everything() {
        let matcher = FailureMatcher::<&str>::new(Vec::new());

        assert_eq!(matcher.rules().len(), 1);
        assert!(matcher.matches(&"anything"));
    }

    #[test]
    fn test_matching_rule_without_category() {
        let rule = FailureRule::<&str>::matching(|e| e.contains("server"));

        assert!(rule.matches(&"server_error"));
        assert!(!rule.matches(&"client_error"));
    }

    #[test]
    fn test_rule_debug_hides_closures() {
        let rule = FailureRule::<ApiError>::of(Kind::Refused).when(|_| true);
        let debug = format!("{:?}", rule);

        assert!(debug.contains("Refused"));
        assert!(debug.contains("<closure>"));
    }
}

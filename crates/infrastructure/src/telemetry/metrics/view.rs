//! Views: rename, filter, or re-aggregate instruments before export.
//!
//! Views are matched against the instrument's registered name, in registration
//! order. When several views match, each action type is taken from the last
//! view that sets it. The SDK would instead export one stream per matching
//! view, so [`ViewSelector`] folds every view into a single SDK stream.

use std::collections::HashMap;

use opentelemetry::Key;
use opentelemetry_sdk::metrics::Stream;
use tracing::warn;

use super::aggregation::Aggregation;
use super::instrument::{InstrumentDescriptor, InstrumentKind, InstrumentSpec, validate_instrument_name};
use crate::telemetry::error::MetricsError;

/// Which attribute keys survive into the exported stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeFilter {
    /// Keep only these keys; an empty list drops every attribute
    RetainOnly(Vec<String>),
    /// Remove these keys
    Drop(Vec<String>),
}

impl AttributeFilter {
    /// Keys allowed through, given the keys an instrument declares
    ///
    /// The SDK only filters by an allow-list, so dropping keys is expressed as
    /// keeping every declared key that is not dropped.
    pub fn allowed_keys(&self, declared: &[String]) -> Vec<String> {
        match self {
            Self::RetainOnly(keys) => keys.clone(),
            Self::Drop(keys) => declared
                .iter()
                .filter(|k| !keys.contains(k))
                .cloned()
                .collect(),
        }
    }
}

/// One transformation a view performs
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    /// Export under a different name
    Rename(String),
    /// Filter attribute keys
    FilterAttributes(AttributeFilter),
    /// Override the aggregation
    SetAggregation(Aggregation),
}

/// A view: selection criteria plus actions
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pattern: String,
    kind: Option<InstrumentKind>,
    actions: Vec<ViewAction>,
}

impl View {
    /// View selecting instruments whose name matches the pattern
    ///
    /// `*` matches any run of characters and `?` matches exactly one.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: None,
            actions: Vec::new(),
        }
    }

    /// Only select instruments of this kind
    #[must_use]
    pub const fn for_kind(mut self, kind: InstrumentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Export under a new name
    #[must_use]
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.actions.push(ViewAction::Rename(name.into()));
        self
    }

    /// Keep only the given attribute keys
    #[must_use]
    pub fn retain_attributes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.push(ViewAction::FilterAttributes(AttributeFilter::RetainOnly(
            keys.into_iter().map(Into::into).collect(),
        )));
        self
    }

    /// Remove the given attribute keys
    #[must_use]
    pub fn drop_attributes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.push(ViewAction::FilterAttributes(AttributeFilter::Drop(
            keys.into_iter().map(Into::into).collect(),
        )));
        self
    }

    /// Override the aggregation
    #[must_use]
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.actions.push(ViewAction::SetAggregation(aggregation));
        self
    }

    /// Name pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Actions in declaration order
    pub fn actions(&self) -> &[ViewAction] {
        &self.actions
    }

    /// Check the view can be applied
    pub fn validate(&self) -> Result<(), MetricsError> {
        let invalid = |reason: &str| MetricsError::InvalidView {
            pattern: self.pattern.clone(),
            reason: reason.to_string(),
        };

        if self.pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let wildcard = self.pattern.contains(['*', '?']);
        for action in &self.actions {
            match action {
                ViewAction::Rename(name) => {
                    if wildcard {
                        return Err(invalid("cannot rename a wildcard selection"));
                    }
                    validate_instrument_name(name)
                        .map_err(|_| invalid("rename target is not a valid instrument name"))?;
                },
                ViewAction::SetAggregation(aggregation) => aggregation.validate()?,
                ViewAction::FilterAttributes(_) => {},
            }
        }
        Ok(())
    }

    /// Whether the view selects the instrument
    pub fn matches(&self, descriptor: &InstrumentDescriptor) -> bool {
        self.kind.is_none_or(|k| k == descriptor.kind) && glob_match(&self.pattern, &descriptor.name)
    }
}

/// Resolved export settings for one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Exported name
    pub name: String,
    /// Attribute filter, if any
    pub filter: Option<AttributeFilter>,
    /// Aggregation override; `Default` keeps the instrument's own
    pub aggregation: Aggregation,
}

/// Fold all matching views into the stream settings for an instrument
///
/// `None` when no view selects the instrument.
pub fn resolve_stream(descriptor: &InstrumentDescriptor, views: &[View]) -> Option<StreamConfig> {
    let mut matched = views.iter().filter(|v| v.matches(descriptor)).peekable();
    matched.peek()?;

    let mut stream = StreamConfig {
        name: descriptor.name.clone(),
        filter: None,
        aggregation: Aggregation::Default,
    };
    for view in matched {
        for action in &view.actions {
            match action {
                ViewAction::Rename(new_name) => stream.name.clone_from(new_name),
                ViewAction::FilterAttributes(f) => stream.filter = Some(f.clone()),
                ViewAction::SetAggregation(a) => stream.aggregation = a.clone(),
            }
        }
    }
    Some(stream)
}

/// Turns the configured views into the one SDK view of a meter provider
///
/// Instruments are looked up by name in a catalog built from their specs,
/// which supplies the kind and declared attribute keys the views need.
#[derive(Debug, Clone, Default)]
pub struct ViewSelector {
    views: Vec<View>,
    catalog: HashMap<String, (InstrumentDescriptor, Vec<String>)>,
}

impl ViewSelector {
    /// Validate the views and index the instrument specs
    pub fn new<'a>(
        views: impl IntoIterator<Item = View>,
        specs: impl IntoIterator<Item = &'a InstrumentSpec>,
    ) -> Result<Self, MetricsError> {
        let views: Vec<View> = views.into_iter().collect();
        for view in &views {
            view.validate()?;
        }
        let catalog = specs
            .into_iter()
            .map(|spec| {
                (
                    spec.descriptor.name.clone(),
                    (spec.descriptor.clone(), spec.attribute_keys.clone()),
                )
            })
            .collect();
        Ok(Self { views, catalog })
    }

    /// Whether there are no views at all
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Resolved settings for an instrument name
    pub fn resolve(&self, name: &str) -> Option<StreamConfig> {
        let (descriptor, _) = self.catalog.get(name)?;
        resolve_stream(descriptor, &self.views)
    }

    /// The SDK stream for an instrument; `None` keeps the SDK default
    pub fn select(&self, name: &str) -> Option<Stream> {
        let (_, declared) = self.catalog.get(name)?;
        let config = self.resolve(name)?;

        let mut builder = Stream::builder();
        if config.name != name {
            builder = builder.with_name(config.name.clone());
        }
        if let Some(filter) = &config.filter {
            builder = builder.with_allowed_attribute_keys(
                filter.allowed_keys(declared).into_iter().map(Key::new),
            );
        }
        if let Some(aggregation) = config.aggregation.to_sdk() {
            builder = builder.with_aggregation(aggregation);
        }

        match builder.build() {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(instrument = %name, error = %e, "View produced an invalid stream, keeping defaults");
                None
            },
        }
    }
}

fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, kind: InstrumentKind) -> InstrumentDescriptor {
        InstrumentDescriptor {
            name: name.to_string(),
            kind,
            unit: "1".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("http.*", "http.server.request.duration"));
        assert!(glob_match("error_?ate", "error_rate"));
        assert!(glob_match("*rate", "error_rate"));
        assert!(!glob_match("http.*", "traffic_volume"));
        assert!(!glob_match("error_rate", "error_rates"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
    }

    #[test]
    fn no_views_keeps_definition() {
        let d = descriptor("traffic_volume", InstrumentKind::Counter);
        assert!(resolve_stream(&d, &[]).is_none());
    }

    #[test]
    fn rename_twice_equals_once() {
        let d = descriptor("error_rate", InstrumentKind::Counter);
        let view = View::new("error_rate").rename("errors");
        let once = resolve_stream(&d, std::slice::from_ref(&view)).unwrap();
        let twice = resolve_stream(&d, &[view.clone(), view]).unwrap();
        assert_eq!(once.name, "errors");
        assert_eq!(once, twice);
    }

    #[test]
    fn later_view_wins_per_action() {
        let d = descriptor("error_rate", InstrumentKind::Counter);
        let views = [
            View::new("error_rate").rename("first").retain_attributes(["state"]),
            View::new("error_*").aggregation(Aggregation::LastValue),
            View::new("error_rate").rename("second"),
        ];
        let stream = resolve_stream(&d, &views).unwrap();
        assert_eq!(stream.name, "second");
        assert_eq!(stream.aggregation, Aggregation::LastValue);
        assert_eq!(
            stream.filter,
            Some(AttributeFilter::RetainOnly(vec!["state".to_string()]))
        );
    }

    #[test]
    fn matching_uses_original_name() {
        let d = descriptor("error_rate", InstrumentKind::Counter);
        let views = [
            View::new("error_rate").rename("errors"),
            View::new("errors").aggregation(Aggregation::Drop),
        ];
        let stream = resolve_stream(&d, &views).unwrap();
        assert_eq!(stream.name, "errors");
        assert_eq!(stream.aggregation, Aggregation::Default);
    }

    #[test]
    fn kind_restricts_selection() {
        let view = View::new("*").for_kind(InstrumentKind::Histogram).aggregation(Aggregation::Drop);
        let counter = descriptor("c", InstrumentKind::Counter);
        let histogram = descriptor("h", InstrumentKind::Histogram);
        assert!(!view.matches(&counter));
        assert!(view.matches(&histogram));
    }

    #[test]
    fn drop_keeps_remaining_declared_keys() {
        let declared = vec!["http.route".to_string(), "state".to_string()];
        let filter = AttributeFilter::Drop(vec!["http.route".to_string()]);
        assert_eq!(filter.allowed_keys(&declared), vec!["state".to_string()]);
        assert!(AttributeFilter::RetainOnly(Vec::new()).allowed_keys(&declared).is_empty());
    }

    #[test]
    fn selector_ignores_unknown_instruments() {
        let spec = InstrumentSpec::counter("known", "1", "");
        assert!(ViewSelector::new([View::new("*").rename("all")], [&spec]).is_err());

        let selector = ViewSelector::new([View::new("k*").aggregation(Aggregation::Drop)], [&spec]).unwrap();
        assert!(selector.resolve("known").is_some());
        assert!(selector.resolve("unknown").is_none());
        assert!(selector.select("unknown").is_none());
    }

    #[test]
    fn validation() {
        assert!(View::new("").validate().is_err());
        assert!(View::new("http.*").rename("x").validate().is_err());
        assert!(View::new("a").rename("9bad").validate().is_err());
        assert!(
            View::new("a")
                .aggregation(Aggregation::ExplicitBucketHistogram {
                    boundaries: vec![2.0, 1.0],
                    record_min_max: true,
                })
                .validate()
                .is_err()
        );
        assert!(View::new("a").rename("b").validate().is_ok());
    }
}

//! Resource-template URI matching (spec §9's "incomplete source behavior"
//! resolution: a minimal but real `{placeholder}` matcher rather than the
//! unfinished guesswork left in the teacher).

use std::collections::HashMap;

/// Matches a concrete URI against a `{placeholder}` template and extracts
/// the placeholder values, e.g. template `file:///{category}/{id}` against
/// `file:///docs/42` yields `{"category": "docs", "id": "42"}`.
///
/// Placeholders match one path segment (no `/`) at a time; the template
/// and the candidate must have the same number of `/`-delimited segments.
pub trait TemplateResolver: Send + Sync {
    fn matches(&self, template: &str, uri: &str) -> Option<HashMap<String, String>>;
}

#[derive(Default)]
pub struct SegmentTemplateResolver;

impl TemplateResolver for SegmentTemplateResolver {
    fn matches(&self, template: &str, uri: &str) -> Option<HashMap<String, String>> {
        let template_segments: Vec<&str> = template.split('/').collect();
        let uri_segments: Vec<&str> = uri.split('/').collect();
        if template_segments.len() != uri_segments.len() {
            return None;
        }

        let mut extracted = HashMap::new();
        for (template_segment, uri_segment) in template_segments.iter().zip(uri_segments.iter()) {
            if let Some(name) = template_segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
            {
                extracted.insert(name.to_string(), (*uri_segment).to_string());
            } else if template_segment != uri_segment {
                return None;
            }
        }
        Some(extracted)
    }
}

/// Finds the first registered template that matches `uri`, if any.
pub fn resolve<'a>(
    resolver: &dyn TemplateResolver,
    templates: impl Iterator<Item = &'a str>,
    uri: &str,
) -> Option<(&'a str, HashMap<String, String>)> {
    templates.into_iter().find_map(|template| {
        resolver.matches(template, uri).map(|extracted| (template, extracted))
    })
}

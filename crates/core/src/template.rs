//! Prompt template formatting.
//!
//! Substitutes `{variable}` placeholders by literal replacement. Unmatched
//! placeholders are left untouched so that partially-specified templates
//! degrade gracefully instead of failing a whole turn.

/// Render a template, replacing each `{name}` with the matching value.
///
/// A placeholder whose name is not in `vars` is emitted verbatim, braces
/// included. An unclosed `{` is also emitted verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                let key = &after_open[..close];
                match vars.iter().find(|(name, _)| *name == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

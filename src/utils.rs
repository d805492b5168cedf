//! Small text helpers shared across the crate.

use serde::Serialize;
use thiserror;
use tinytemplate;
use tinytemplate::{format_unescaped, TinyTemplate};

/// Template rendering errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("template error: {0}")]
    TemplateError(#[from] tinytemplate::error::Error),
}

type Result<T> = core::result::Result<T, Error>;

/// Render `template` with the fields of `context` bound to its placeholders.
pub fn render_template(template: &str, context: &impl Serialize) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("x", template)
        .map_err(Error::TemplateError)?;
    tt.render("x", &context).map_err(Error::TemplateError)
}

/// Join the parts that are non-empty after trimming.
pub fn join_nonempty<'a>(parts: impl IntoIterator<Item = &'a str>, separator: &str) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Context {
        name: String,
    }

    #[test]
    fn renders_placeholders() {
        let rendered = render_template(
            "hello {name}",
            &Context {
                name: "world".to_string(),
            },
        )
        .unwrap();
        assert_eq!(rendered, "hello world");
    }

    #[test]
    fn joins_skipping_blanks() {
        assert_eq!(join_nonempty(["a", "", "  ", "b", "c "], ", "), "a, b, c");
    }
}

//! Placeholder substitution for the bootstrap manifest template
//!
//! The committed template is a Ninja file whose environment-specific values
//! are written as `@@Key@@` tokens. Only the seven keys of [`Placeholder`]
//! are recognized. Substitution is a single pass: inserted values are never
//! rescanned.
//!
//! Bindings that the template never references are accepted silently. An
//! `@@Ident@@` token whose identifier is not a recognized key is an error.
//! A bound value can still form a token together with the text around it
//! (`/x@@` followed by `Key@@`), so the result is scanned once more and any
//! token left in it is an error: a successful result never contains one.

use crate::errors::TemplateError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const DELIMITER: &str = "@@";

/// The closed set of placeholder keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    SrcDir,
    BuildDir,
    GoRoot,
    GoCompile,
    GoLink,
    Bootstrap,
    BootstrapManifest,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::SrcDir,
        Placeholder::BuildDir,
        Placeholder::GoRoot,
        Placeholder::GoCompile,
        Placeholder::GoLink,
        Placeholder::Bootstrap,
        Placeholder::BootstrapManifest,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Placeholder::SrcDir => "SrcDir",
            Placeholder::BuildDir => "BuildDir",
            Placeholder::GoRoot => "GoRoot",
            Placeholder::GoCompile => "GoCompile",
            Placeholder::GoLink => "GoLink",
            Placeholder::Bootstrap => "Bootstrap",
            Placeholder::BootstrapManifest => "BootstrapManifest",
        }
    }

    /// The token as it appears in a template, e.g. `@@SrcDir@@`
    pub fn token(self) -> String {
        format!("{DELIMITER}{}{DELIMITER}", self.key())
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Placeholder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Placeholder::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or(())
    }
}

/// Placeholder values for one bootstrap invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<Placeholder, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every key to its own token; substituting with these is the identity.
    ///
    /// The canonical generator uses this when it writes the template itself.
    pub fn placeholders() -> Self {
        Placeholder::ALL
            .into_iter()
            .fold(Self::new(), |bindings, p| bindings.with(p, p.token()))
    }

    pub fn with(mut self, key: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn get(&self, key: Placeholder) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Replace every `@@Key@@` token of `template` with its binding.
pub fn substitute(template: &str, bindings: &Bindings) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    let mut line = 1;

    while let Some(start) = rest.find(DELIMITER) {
        let before = &rest[..start];
        output.push_str(before);
        line += before.matches('\n').count();

        let after_open = &rest[start + DELIMITER.len()..];
        match token_key(after_open) {
            Some(key) => {
                let token = format!("{DELIMITER}{key}{DELIMITER}");
                let placeholder = key
                    .parse::<Placeholder>()
                    .map_err(|()| TemplateError::UnknownToken {
                        token: token.clone(),
                        line,
                    })?;
                let value = bindings
                    .get(placeholder)
                    .ok_or(TemplateError::MissingBinding { token, line })?;
                output.push_str(value);
                rest = &after_open[key.len() + DELIMITER.len()..];
            }
            None => {
                // Not a token; keep one '@' and rescan from the next character
                output.push('@');
                rest = &rest[start + 1..];
            }
        }
    }

    output.push_str(rest);
    if let Some((token, line)) = first_token(&output) {
        return Err(TemplateError::ResidualToken { token, line });
    }
    Ok(output)
}

/// True if `text` still contains anything shaped like `@@Ident@@`
pub fn contains_placeholders(text: &str) -> bool {
    first_token(text).is_some()
}

/// The first `@@Ident@@` token of `text` and its 1-based line
fn first_token(text: &str) -> Option<(String, usize)> {
    let mut offset = 0;
    while let Some(found) = text[offset..].find(DELIMITER) {
        let start = offset + found;
        if let Some(key) = token_key(&text[start + DELIMITER.len()..]) {
            let line = text[..start].matches('\n').count() + 1;
            return Some((format!("{DELIMITER}{key}{DELIMITER}"), line));
        }
        offset = start + 1;
    }
    None
}

/// Identifier between an opening delimiter (already consumed) and the closing one
fn token_key(after_open: &str) -> Option<&str> {
    let end = after_open.find(DELIMITER)?;
    let key = &after_open[..end];
    (!key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric())).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_bindings() -> Bindings {
        Bindings::new()
            .with(Placeholder::SrcDir, "/src")
            .with(Placeholder::BuildDir, "/out")
            .with(Placeholder::GoRoot, "/usr/lib/go")
            .with(Placeholder::GoCompile, "/usr/lib/go/pkg/tool/linux_amd64/compile")
            .with(Placeholder::GoLink, "/usr/lib/go/pkg/tool/linux_amd64/link")
            .with(Placeholder::Bootstrap, "/src/bootstrap.bash")
            .with(Placeholder::BootstrapManifest, "/src/build.ninja.in")
    }

    #[test]
    fn test_substitutes_every_recognized_token() {
        let template: String = Placeholder::ALL
            .iter()
            .map(|p| format!("{} = {}\n", p.key(), p.token()))
            .collect();
        let output = match substitute(&template, &full_bindings()) {
            Ok(output) => output,
            Err(err) => panic!("substitution with full bindings failed: {err}"),
        };
        assert!(!contains_placeholders(&output));
        assert!(output.contains("SrcDir = /src\n"));
        assert!(output.contains("BootstrapManifest = /src/build.ninja.in\n"));
    }

    #[test]
    fn test_missing_binding_fails() {
        let bindings = Bindings::new().with(Placeholder::SrcDir, "/src");
        let result = substitute("@@SrcDir@@/@@GoRoot@@", &bindings);
        assert_eq!(
            result,
            Err(TemplateError::MissingBinding {
                token: "@@GoRoot@@".to_string(),
                line: 1
            })
        );
    }

    #[test]
    fn test_unknown_token_reports_line() {
        let result = substitute("a\nb\nx = @@Nope@@\n", &full_bindings());
        assert_eq!(
            result,
            Err(TemplateError::UnknownToken {
                token: "@@Nope@@".to_string(),
                line: 3
            })
        );
    }

    #[test]
    fn test_unused_bindings_pass() {
        let result = substitute("builddir = @@BuildDir@@\n", &full_bindings());
        assert_eq!(result, Ok("builddir = /out\n".to_string()));
    }

    #[test]
    fn test_lone_delimiters_are_literal() {
        let bindings = full_bindings();
        assert_eq!(
            substitute("user@@host and @@ end", &bindings),
            Ok("user@@host and @@ end".to_string())
        );
        assert_eq!(
            substitute("@@@SrcDir@@", &bindings),
            Ok("@/src".to_string())
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let bindings = Bindings::new()
            .with(Placeholder::SrcDir, "/x@@Build")
            .with(Placeholder::BuildDir, "/out");
        assert_eq!(
            substitute("@@SrcDir@@ @@BuildDir@@", &bindings),
            Ok("/x@@Build /out".to_string())
        );
    }

    #[test]
    fn test_value_forming_a_token_fails() {
        let bindings = Bindings::new()
            .with(Placeholder::SrcDir, "/x@@")
            .with(Placeholder::BuildDir, "/out");
        let result = substitute("a\n@@SrcDir@@BuildDir@@", &bindings);
        assert_eq!(
            result,
            Err(TemplateError::ResidualToken {
                token: "@@BuildDir@@".to_string(),
                line: 2
            })
        );

        let bindings = Bindings::new().with(Placeholder::SrcDir, "@@BuildDir@@");
        assert!(matches!(
            substitute("@@SrcDir@@", &bindings),
            Err(TemplateError::ResidualToken { .. })
        ));
    }

    #[test]
    fn test_placeholder_bindings_are_tokens() {
        let bindings = Bindings::placeholders();
        assert_eq!(bindings.len(), Placeholder::ALL.len());
        assert!(Placeholder::ALL
            .iter()
            .all(|p| bindings.get(*p) == Some(p.token().as_str())));
    }

    #[test]
    fn test_placeholder_parse() {
        assert_eq!("GoCompile".parse::<Placeholder>(), Ok(Placeholder::GoCompile));
        assert!("gocompile".parse::<Placeholder>().is_err());
    }
}

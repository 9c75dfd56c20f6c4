use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use exampaper_core::{Error, Result};

/// A prompt file with `{name}` placeholders. `{{` and `}}` are literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    path: PathBuf,
    text: String,
}

impl PromptTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::TemplateMissing {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let template = Self { path: path.to_path_buf(), text };
        // surface malformed braces at load time, not mid-request
        template.scan(|_| Ok(()))?;
        tracing::debug!(path = %path.display(), placeholders = ?template.placeholders(), "prompt template loaded");
        Ok(template)
    }

    pub fn from_text(name: &str, text: impl Into<String>) -> Result<Self> {
        let template = Self { path: PathBuf::from(name), text: text.into() };
        template.scan(|_| Ok(()))?;
        Ok(template)
    }

    /// Distinct placeholder names, sorted.
    pub fn placeholders(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let _ = self.scan(|name| {
            names.insert(name.to_string());
            Ok(())
        });
        names
    }

    /// Substitute every placeholder. A placeholder without a value is an error.
    pub fn fill(&self, vars: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.text.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
        self.scan_spans(|span| {
            match span {
                Span::Literal(s) => out.push_str(s),
                Span::Placeholder(name) => {
                    let value = vars.iter().find(|(k, _)| *k == name).map(|(_, v)| *v).ok_or_else(|| {
                        Error::Template(format!("{}: no value for placeholder '{{{name}}}'", self.path.display()))
                    })?;
                    out.push_str(value);
                }
            }
            Ok(())
        })?;
        Ok(out)
    }

    fn scan(&self, mut on_placeholder: impl FnMut(&str) -> Result<()>) -> Result<()> {
        self.scan_spans(|span| match span {
            Span::Placeholder(name) => on_placeholder(name),
            Span::Literal(_) => Ok(()),
        })
    }

    fn scan_spans<'a>(&'a self, mut emit: impl FnMut(Span<'a>) -> Result<()>) -> Result<()> {
        let text = self.text.as_str();
        let bytes = text.as_bytes();
        let mut i = 0;
        let mut lit_start = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                    emit(Span::Literal(&text[lit_start..=i]))?;
                    i += 2;
                    lit_start = i;
                }
                b'{' => {
                    let close = text[i + 1..].find('}').map(|off| i + 1 + off).ok_or_else(|| {
                        Error::Template(format!("{}: unclosed '{{' at byte {i}", self.path.display()))
                    })?;
                    let name = text[i + 1..close].trim();
                    if name.is_empty() || name.contains('{') {
                        return Err(Error::Template(format!("{}: malformed placeholder at byte {i}", self.path.display())));
                    }
                    emit(Span::Literal(&text[lit_start..i]))?;
                    emit(Span::Placeholder(name))?;
                    i = close + 1;
                    lit_start = i;
                }
                b'}' => {
                    return Err(Error::Template(format!("{}: unmatched '}}' at byte {i}", self.path.display())));
                }
                _ => i += 1,
            }
        }
        emit(Span::Literal(&text[lit_start..]))
    }
}

enum Span<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

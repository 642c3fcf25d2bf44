/*!
 * Whitespace handling around translatable fragments.
 */

/// A fragment split into leading whitespace, translatable core and trailing whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitText<'a> {
    /// Whitespace before the core
    pub leading: &'a str,
    /// Text sent to the provider
    pub core: &'a str,
    /// Whitespace after the core
    pub trailing: &'a str,
}

impl<'a> SplitText<'a> {
    /// Split `text` around its trimmed core
    pub fn new(text: &'a str) -> Self {
        let start = text.len() - text.trim_start().len();
        let end = text.trim_end().len().max(start);
        Self {
            leading: &text[..start],
            core: &text[start..end],
            trailing: &text[end..],
        }
    }

    /// Whether there is anything to translate
    pub fn is_blank(&self) -> bool {
        self.core.is_empty()
    }

    /// Put the original surrounding whitespace back around `translated`
    pub fn reattach(&self, translated: &str) -> String {
        format!("{}{}{}", self.leading, translated.trim(), self.trailing)
    }
}

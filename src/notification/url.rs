/// Builds absolute action URLs from the configured application base URL.
#[derive(Debug, Clone, Default)]
pub struct ActionUrlBuilder {
    base: String,
}

impl ActionUrlBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// `base + path`, with `path` made to start with `/`.
    ///
    /// Empty when no base is configured; the bare base when `path` is empty.
    pub fn build(&self, path: &str) -> String {
        if self.base.is_empty() {
            return String::new();
        }
        let path = path.trim();
        if path.is_empty() {
            return self.base.clone();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_action_url() {
        let urls = ActionUrlBuilder::new(" https://backoffice.example.com/ ");
        assert_eq!(
            urls.build("/expenses/e1/details"),
            "https://backoffice.example.com/expenses/e1/details"
        );
        assert_eq!(urls.build("pos/list"), "https://backoffice.example.com/pos/list");
        assert_eq!(urls.build(""), "https://backoffice.example.com");
    }

    #[test]
    fn test_empty_base_yields_empty_url() {
        let urls = ActionUrlBuilder::new("");
        assert_eq!(urls.build("/time/sheets/pending"), "");
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown diagram type: {first_word}")]
    NotAFlowchart { first_word: String },

    #[error("invalid flowchart document: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds [`Error::NotAFlowchart`] from the rejected source text.
    pub fn not_a_flowchart(input: &str) -> Self {
        let first_word = input
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("%%"))
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("(empty)");
        Error::NotAFlowchart {
            first_word: first_word.to_string(),
        }
    }
}

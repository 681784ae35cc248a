//! Pulls the chosen comic id out of the model's free-text reply.

/// What the model's reply yielded. Not finding an id is an ordinary outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Text between the first `[` and the first `]` after it.
    Parsed(String),
    /// No bracketed id; holds the reply unchanged.
    Unparsed(String),
}

impl Selection {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Parsed(id) => Some(id),
            Self::Unparsed(_) => None,
        }
    }
}

/// Finds the first `[`, then the first `]` after it. The id is not checked
/// against the corpus or for being numeric.
pub fn parse_selection(output: &str) -> Selection {
    let Some(open) = output.find('[') else {
        return Selection::Unparsed(output.to_string());
    };
    let rest = &output[open + 1..];
    match rest.find(']') {
        Some(close) => Selection::Parsed(rest[..close].to_string()),
        None => Selection::Unparsed(output.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_format() {
        assert_eq!(
            parse_selection("[844] https://xkcd.com/844/\n\nExplanation..."),
            Selection::Parsed("844".into())
        );
    }

    #[test]
    fn id_on_an_indented_later_line() {
        let reply = "\n    [844] https://xkcd.com/844/\n\n    This comic fits best because...\n";
        assert_eq!(parse_selection(reply).id(), Some("844"));
    }

    #[test]
    fn no_brackets() {
        let text = "I think it's comic 844 about debugging.";
        assert_eq!(parse_selection(text), Selection::Unparsed(text.into()));
    }

    #[test]
    fn closing_before_opening() {
        assert_eq!(parse_selection("] 844 ["), Selection::Unparsed("] 844 [".into()));
    }

    #[test]
    fn first_pair_wins() {
        assert_eq!(parse_selection("x] [12] or [13]"), Selection::Parsed("12".into()));
    }

    #[test]
    fn empty_reply() {
        assert_eq!(parse_selection(""), Selection::Unparsed(String::new()));
    }

    #[test]
    fn id_is_not_validated() {
        assert_eq!(parse_selection("[not-a-number]").id(), Some("not-a-number"));
    }
}

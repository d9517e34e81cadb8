use crate::output::LogMessage;

/// A parsed message format template.
///
/// The template is literal text with `{field}` placeholders; rendering
/// substitutes each placeholder with the named field's value, or empty text
/// when the field is absent. Parsing is total and rendering never fails.
///
/// Tokenization is an explicit left-to-right scan rather than a regex: a
/// `{` starts a placeholder only when it is followed by one or more word
/// characters and a closing `}`; otherwise it is literal. This matches
/// "first `{word}` token wins" semantics, so `{a{b}` renders as the literal
/// `{a` followed by the value of `b`. There is no escaping of literal
/// braces.
///
/// # Example
///
/// ```
/// use xmpp_output::output::LogMessage;
/// use xmpp_output::relay::MessageTemplate;
///
/// let template = MessageTemplate::parse("{source} {message}");
/// let message = LogMessage::new()
///     .with_field("source", "web1")
///     .with_field("message", "disk full");
/// assert_eq!(template.render(&message), "web1 disk full");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl MessageTemplate {
    /// Tokenize a template string. Total: any input is a valid template.
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }

            // Look ahead for `word}`; on anything else the brace is literal
            // and scanning resumes right after it.
            let mut name = String::new();
            let mut lookahead = chars.clone();
            while let Some(&next) = lookahead.peek() {
                if is_word_char(next) {
                    name.push(next);
                    lookahead.next();
                } else {
                    break;
                }
            }
            if !name.is_empty() && lookahead.peek() == Some(&'}') {
                lookahead.next();
                chars = lookahead;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(name));
            } else {
                literal.push('{');
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Substitute fields from `message` into the template.
    pub fn render(&self, message: &LogMessage) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Field(name) => output.push_str(message.field(name).unwrap_or("")),
            }
        }
        output
    }

    /// Names of the fields the template references, in order of appearance.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

//! The tokenizer boundary: SAX-style callbacks, and the html5gum-backed default.

use crate::error::CompileError;
use crate::tracing_macros::trace;

use html5gum::{State, Token, Tokenizer};

/// One attribute of an open tag, as reported by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value with character references already decoded.
    pub value: String,
}

impl Attribute {
    /// Create an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Receiver of tokenizer events, called once per event in document order.
///
/// Every callback may abort tokenization by returning an error.
pub trait TokenSink {
    /// `<name attr=...>`. Self-closing tags are followed by a matching [`close_tag`](Self::close_tag).
    fn open_tag(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), CompileError>;
    /// `</name>`.
    fn close_tag(&mut self, name: &str) -> Result<(), CompileError>;
    /// Text content with character references decoded (except inside raw-text elements).
    fn text(&mut self, text: &str) -> Result<(), CompileError>;
    /// `<!--data-->`.
    fn comment(&mut self, data: &str) -> Result<(), CompileError>;
    /// `<![CDATA[`.
    fn cdata_start(&mut self) -> Result<(), CompileError>;
    /// `]]>`.
    fn cdata_end(&mut self) -> Result<(), CompileError>;
    /// `<?name rest?>`; `data` is everything between `<` and `>`.
    fn processing_instruction(&mut self, name: &str, data: &str) -> Result<(), CompileError>;
    /// `<!DOCTYPE name>`.
    fn doctype(&mut self, name: &str) -> Result<(), CompileError>;
    /// End of input.
    fn end(&mut self) -> Result<(), CompileError>;
}

/// Something that turns markup into [`TokenSink`] events.
pub trait HtmlTokenizer: Send + Sync {
    /// Tokenize `input`, feeding every event to `sink`.
    fn tokenize(&self, input: &str, sink: &mut dyn TokenSink) -> Result<(), CompileError>;
}

/// WHATWG tokenizer backed by html5gum.
///
/// Parse errors html5gum recovers from are ignored; it always produces a token
/// stream. CDATA sections and processing instructions, which an HTML tokenizer
/// reports as bogus comments, are forwarded as their own events.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html5gumTokenizer;

impl HtmlTokenizer for Html5gumTokenizer {
    fn tokenize(&self, input: &str, sink: &mut dyn TokenSink) -> Result<(), CompileError> {
        let mut tokenizer = Tokenizer::new(input);

        while let Some(token_result) = tokenizer.next() {
            let token = token_result.map_err(|_| CompileError::Tokenize("tokenizer error".into()))?;

            match token {
                Token::StartTag(tag) => {
                    let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                    let attributes: Vec<Attribute> = tag
                        .attributes
                        .iter()
                        .map(|(k, v)| {
                            Attribute::new(String::from_utf8_lossy(k), String::from_utf8_lossy(v))
                        })
                        .collect();

                    sink.open_tag(&name, &attributes)?;

                    if tag.self_closing {
                        sink.close_tag(&name)?;
                    } else {
                        // Raw text elements switch the tokenizer state
                        match name.as_str() {
                            "script" | "style" => tokenizer.set_state(State::ScriptData),
                            "textarea" | "title" => tokenizer.set_state(State::RcData),
                            _ => {}
                        }
                    }
                }
                Token::EndTag(tag) => {
                    let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                    sink.close_tag(&name)?;
                }
                Token::String(text) => {
                    sink.text(&String::from_utf8_lossy(&text))?;
                }
                Token::Comment(data) => {
                    let data = String::from_utf8_lossy(&data);
                    if let Some(cdata) = data
                        .strip_prefix("[CDATA[")
                        .and_then(|rest| rest.strip_suffix("]]"))
                    {
                        sink.cdata_start()?;
                        if !cdata.is_empty() {
                            sink.text(cdata)?;
                        }
                        sink.cdata_end()?;
                    } else if let Some(instruction) = data.strip_prefix('?') {
                        let name = instruction
                            .split(|c: char| c.is_ascii_whitespace() || c == '?')
                            .next()
                            .unwrap_or_default();
                        sink.processing_instruction(name, &data)?;
                    } else {
                        sink.comment(&data)?;
                    }
                }
                Token::Doctype(doctype) => {
                    let name = String::from_utf8_lossy(&doctype.name).to_ascii_lowercase();
                    sink.doctype(&name)?;
                }
                Token::Error(_error) => {
                    trace!(error = ?_error, "recoverable tokenizer error");
                }
            }
        }

        sink.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records events as compact strings.
    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl TokenSink for Recorder {
        fn open_tag(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), CompileError> {
            let attrs: Vec<String> = attributes
                .iter()
                .map(|a| format!("{}={}", a.name, a.value))
                .collect();
            self.0.push(format!("open {name} [{}]", attrs.join(" ")));
            Ok(())
        }
        fn close_tag(&mut self, name: &str) -> Result<(), CompileError> {
            self.0.push(format!("close {name}"));
            Ok(())
        }
        fn text(&mut self, text: &str) -> Result<(), CompileError> {
            self.0.push(format!("text {text:?}"));
            Ok(())
        }
        fn comment(&mut self, data: &str) -> Result<(), CompileError> {
            self.0.push(format!("comment {data:?}"));
            Ok(())
        }
        fn cdata_start(&mut self) -> Result<(), CompileError> {
            self.0.push("cdata-start".into());
            Ok(())
        }
        fn cdata_end(&mut self) -> Result<(), CompileError> {
            self.0.push("cdata-end".into());
            Ok(())
        }
        fn processing_instruction(&mut self, name: &str, data: &str) -> Result<(), CompileError> {
            self.0.push(format!("pi {name} {data:?}"));
            Ok(())
        }
        fn doctype(&mut self, name: &str) -> Result<(), CompileError> {
            self.0.push(format!("doctype {name}"));
            Ok(())
        }
        fn end(&mut self) -> Result<(), CompileError> {
            self.0.push("end".into());
            Ok(())
        }
    }

    fn events(html: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        Html5gumTokenizer.tokenize(html, &mut recorder).unwrap();
        recorder.0
    }

    #[test]
    fn test_simple_element() {
        assert_eq!(
            events(r#"<div class="foo">hello</div>"#),
            vec!["open div [class=foo]", "text \"hello\"", "close div", "end"]
        );
    }

    #[test]
    fn test_self_closing_reports_close() {
        assert_eq!(
            events("<br/><x-icon/>"),
            vec!["open br []", "close br", "open x-icon []", "close x-icon", "end"]
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(events("<!--hi-->"), vec!["comment \"hi\"", "end"]);
    }

    #[test]
    fn test_script_is_raw_text() {
        assert_eq!(
            events("<script>if (a < b) { x = '<p>' }</script>"),
            vec![
                "open script []",
                "text \"if (a < b) { x = '<p>' }\"",
                "close script",
                "end"
            ]
        );
    }

    #[test]
    fn test_doctype() {
        assert_eq!(
            events("<!DOCTYPE html><p></p>"),
            vec!["doctype html", "open p []", "close p", "end"]
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(
            events(r#"<a title="x &amp; y">1 &lt; 2</a>"#),
            vec!["open a [title=x & y]", "text \"1 < 2\"", "close a", "end"]
        );
    }
}

//! Declarative voice-response markup.
//!
//! Responses are XML documents of verbs executed in order by the telephony
//! provider, e.g.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Response><Say>Hello</Say><Gather input="speech" action="/telephony/speech-result"/></Response>
//! ```

use std::fmt::Write;

/// Content type returned for markup responses.
pub const CONTENT_TYPE: &str = "application/xml";

/// Escape text for use in XML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    Say(String),
    Play { url: String, loop_count: Option<u32> },
    Pause(u32),
    Gather(Gather),
    Record(Record),
    Hangup,
}

/// Speech gather whose nested prompts can be interrupted by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    action: String,
    timeout_secs: u32,
    speech_timeout: String,
    language: Option<String>,
    prompts: Vec<Verb>,
}

impl Gather {
    pub fn new(action: impl Into<String>, timeout_secs: u32) -> Self {
        Self {
            action: action.into(),
            timeout_secs,
            speech_timeout: "auto".to_string(),
            language: None,
            prompts: Vec::new(),
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.prompts.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.prompts.push(Verb::Play {
            url: url.into(),
            loop_count: None,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Record {
    action: String,
    max_length_secs: u32,
    transcribe_callback: Option<String>,
}

/// Builder for a `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play {
            url: url.into(),
            loop_count: None,
        });
        self
    }

    /// Play `url` repeatedly; `0` loops until the call leaves this response.
    pub fn play_loop(mut self, url: impl Into<String>, loop_count: u32) -> Self {
        self.verbs.push(Verb::Play {
            url: url.into(),
            loop_count: Some(loop_count),
        });
        self
    }

    pub fn pause(mut self, seconds: u32) -> Self {
        self.verbs.push(Verb::Pause(seconds));
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn record(
        mut self,
        action: impl Into<String>,
        max_length_secs: u32,
        transcribe_callback: Option<String>,
    ) -> Self {
        self.verbs.push(Verb::Record(Record {
            action: action.into(),
            max_length_secs,
            transcribe_callback,
        }));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn has_hangup(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Hangup))
    }

    pub fn has_gather(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Gather(_)))
    }

    pub fn render(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            write_verb(&mut xml, verb);
        }
        xml.push_str("</Response>");
        xml
    }
}

fn write_verb(xml: &mut String, verb: &Verb) {
    // Writing to a String cannot fail
    let _ = match verb {
        Verb::Say(text) => write!(xml, "<Say>{}</Say>", escape(text)),
        Verb::Play {
            url,
            loop_count: Some(n),
        } => write!(xml, r#"<Play loop="{n}">{}</Play>"#, escape(url)),
        Verb::Play { url, .. } => write!(xml, "<Play>{}</Play>", escape(url)),
        Verb::Pause(seconds) => write!(xml, r#"<Pause length="{seconds}"/>"#),
        Verb::Hangup => write!(xml, "<Hangup/>"),
        Verb::Record(record) => {
            let _ = write!(
                xml,
                r#"<Record action="{}" method="POST" maxLength="{}" playBeep="true""#,
                escape(&record.action),
                record.max_length_secs
            );
            if let Some(callback) = &record.transcribe_callback {
                let _ = write!(
                    xml,
                    r#" transcribe="true" transcribeCallback="{}""#,
                    escape(callback)
                );
            }
            write!(xml, "/>")
        }
        Verb::Gather(gather) => {
            let _ = write!(
                xml,
                r#"<Gather input="speech" action="{}" method="POST" timeout="{}" speechTimeout="{}" actionOnEmptyResult="true""#,
                escape(&gather.action),
                gather.timeout_secs,
                escape(&gather.speech_timeout)
            );
            if let Some(language) = &gather.language {
                let _ = write!(xml, r#" language="{}""#, escape(language));
            }
            if gather.prompts.is_empty() {
                write!(xml, "/>")
            } else {
                xml.push('>');
                for prompt in &gather.prompts {
                    write_verb(xml, prompt);
                }
                write!(xml, "</Gather>")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"Tom & "Jerry" <3 'x'"#),
            "Tom &amp; &quot;Jerry&quot; &lt;3 &apos;x&apos;"
        );
    }

    #[test]
    fn test_say_then_gather() {
        let xml = VoiceResponse::new()
            .say("Hello")
            .gather(Gather::new("/telephony/speech-result", 5))
            .render();

        assert_eq!(
            xml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#,
                "<Say>Hello</Say>",
                r#"<Gather input="speech" action="/telephony/speech-result" method="POST" timeout="5" speechTimeout="auto" actionOnEmptyResult="true"/>"#,
                "</Response>"
            )
        );
    }

    #[test]
    fn test_nested_gather_prompts() {
        let xml = VoiceResponse::new()
            .gather(
                Gather::new("/a?x=1&y=2", 3)
                    .language("en-US")
                    .play("https://host/clip"),
            )
            .render();
        assert!(xml.contains(r#"action="/a?x=1&amp;y=2""#));
        assert!(xml.contains(r#"language="en-US">"#));
        assert!(xml.contains("<Play>https://host/clip</Play></Gather>"));
    }

    #[test]
    fn test_record_and_hangup() {
        let response = VoiceResponse::new()
            .say("Leave a message")
            .record("/vm", 120, Some("/vm-t".into()))
            .hangup();
        let xml = response.render();

        assert!(response.has_hangup());
        assert!(!response.has_gather());
        assert!(xml.contains(
            r#"<Record action="/vm" method="POST" maxLength="120" playBeep="true" transcribe="true" transcribeCallback="/vm-t"/>"#
        ));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }

    #[test]
    fn test_play_loop_and_pause() {
        let xml = VoiceResponse::new()
            .play_loop("https://music", 0)
            .pause(2)
            .render();
        assert!(xml.contains(r#"<Play loop="0">https://music</Play><Pause length="2"/>"#));
    }
}

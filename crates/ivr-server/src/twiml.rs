//! TwiML rendering for [`CallInstruction`]s.

use ivr_types::{CallInstruction, CaptureDirective, CaptureMode, RecordingCapture, SpeechCapture};

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Escapes text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn push_say(out: &mut String, voice: &str, text: &str) {
    out.push_str(&format!(
        r#"<Say voice="{}">{}</Say>"#,
        escape_xml(voice),
        escape_xml(text)
    ));
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!(r#" {}="{}""#, name, escape_xml(value)));
}

fn gather_open(action: &str, speech: &SpeechCapture) -> String {
    let mut tag = String::from("<Gather");
    push_attr(&mut tag, "input", "speech");
    push_attr(&mut tag, "action", action);
    push_attr(&mut tag, "method", "POST");
    push_attr(&mut tag, "speechTimeout", &speech.speech_timeout);
    push_attr(&mut tag, "speechModel", &speech.speech_model);
    push_attr(&mut tag, "enhanced", if speech.enhanced { "true" } else { "false" });
    if let Some(language) = &speech.language {
        push_attr(&mut tag, "language", language);
    }
    if let Some(hints) = &speech.hints {
        push_attr(&mut tag, "hints", hints);
    }
    tag
}

fn record_tag(action: &str, recording: &RecordingCapture) -> String {
    let mut tag = String::from("<Record");
    push_attr(&mut tag, "action", action);
    push_attr(&mut tag, "method", "POST");
    push_attr(&mut tag, "timeout", &recording.timeout_seconds.to_string());
    push_attr(&mut tag, "maxLength", &recording.max_length_seconds.to_string());
    push_attr(&mut tag, "playBeep", if recording.play_beep { "true" } else { "false" });
    push_attr(&mut tag, "finishOnKey", &recording.finish_on_key);
    push_attr(&mut tag, "transcribe", "true");
    tag.push_str("/>");
    tag
}

fn push_capture(
    out: &mut String,
    voice: &str,
    segments: &[String],
    barge_in: bool,
    capture: &CaptureDirective,
) {
    match &capture.mode {
        CaptureMode::Speech(speech) if barge_in => {
            out.push_str(&gather_open(&capture.action, speech));
            out.push('>');
            for segment in segments {
                push_say(out, voice, segment);
            }
            out.push_str("</Gather>");
        }
        CaptureMode::Speech(speech) => {
            for segment in segments {
                push_say(out, voice, segment);
            }
            out.push_str(&gather_open(&capture.action, speech));
            out.push_str("/>");
        }
        // A recording cannot start while the prompt is still playing.
        CaptureMode::Recording(recording) => {
            for segment in segments {
                push_say(out, voice, segment);
            }
            out.push_str(&record_tag(&capture.action, recording));
        }
    }
}

/// Renders `instruction` as a complete TwiML document, speaking with `voice`.
pub fn render(instruction: &CallInstruction, voice: &str) -> String {
    let mut out = String::from(XML_HEADER);
    out.push_str("<Response>");

    match instruction {
        CallInstruction::Respond {
            segments,
            barge_in,
            capture,
        } => push_capture(&mut out, voice, segments, *barge_in, capture),
        CallInstruction::Hangup { segments } => {
            for segment in segments {
                push_say(&mut out, voice, segment);
            }
            out.push_str("<Hangup/>");
        }
    }

    out.push_str("</Response>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech_directive() -> CaptureDirective {
        CaptureDirective {
            action: "/voice/speech".to_string(),
            mode: CaptureMode::Speech(SpeechCapture::default()),
        }
    }

    #[test]
    fn greeting_says_before_gather() {
        let xml = render(
            &CallInstruction::Respond {
                segments: vec!["Welcome.".to_string()],
                barge_in: false,
                capture: speech_directive(),
            },
            "Polly.Joanna",
        );

        assert_eq!(
            xml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#,
                r#"<Say voice="Polly.Joanna">Welcome.</Say>"#,
                r#"<Gather input="speech" action="/voice/speech" method="POST" speechTimeout="auto" speechModel="experimental_conversations" enhanced="true"/>"#,
                "</Response>"
            )
        );
    }

    #[test]
    fn barge_in_nests_say_inside_gather() {
        let xml = render(
            &CallInstruction::Respond {
                segments: vec!["We open at 8.".to_string(), "Anything else?".to_string()],
                barge_in: true,
                capture: speech_directive(),
            },
            "Polly.Joanna",
        );

        let gather = xml.find("<Gather").unwrap();
        let first_say = xml.find("<Say").unwrap();
        let close = xml.find("</Gather>").unwrap();
        assert!(gather < first_say && first_say < close);
        assert_eq!(xml.matches("<Say ").count(), 2);
        assert!(xml.find("We open at 8.").unwrap() < xml.find("Anything else?").unwrap());
    }

    #[test]
    fn text_is_escaped() {
        let xml = render(
            &CallInstruction::Hangup {
                segments: vec![r#"Tom & Jerry's <clinic> "open""#.to_string()],
            },
            "Polly.Joanna",
        );
        assert!(xml.contains("Tom &amp; Jerry&apos;s &lt;clinic&gt; &quot;open&quot;"));
        assert!(!xml.contains("<clinic>"));
    }

    #[test]
    fn hangup_ends_with_hangup_verb() {
        let xml = render(
            &CallInstruction::Hangup {
                segments: vec!["Goodbye!".to_string()],
            },
            "Polly.Joanna",
        );
        assert!(xml.ends_with(r#"<Say voice="Polly.Joanna">Goodbye!</Say><Hangup/></Response>"#));

        let silent = render(&CallInstruction::Hangup { segments: vec![] }, "Polly.Joanna");
        assert!(silent.ends_with("<Response><Hangup/></Response>"));
    }

    #[test]
    fn recording_mode_renders_record() {
        let xml = render(
            &CallInstruction::Respond {
                segments: vec!["Hello.".to_string()],
                barge_in: true,
                capture: CaptureDirective {
                    action: "/voice/recording".to_string(),
                    mode: CaptureMode::Recording(RecordingCapture::default()),
                },
            },
            "Polly.Joanna",
        );
        assert!(xml.contains(
            r##"<Record action="/voice/recording" method="POST" timeout="2" maxLength="10" playBeep="true" finishOnKey="#" transcribe="true"/>"##
        ));
        assert!(xml.find("<Say").unwrap() < xml.find("<Record").unwrap());
        assert!(!xml.contains("<Gather"));
    }

    #[test]
    fn optional_speech_settings_pass_through() {
        let speech = SpeechCapture {
            language: Some("en-GB".to_string()),
            hints: Some("cardiology, radiology".to_string()),
            enhanced: false,
            ..SpeechCapture::default()
        };
        let xml = render(
            &CallInstruction::Respond {
                segments: vec![],
                barge_in: false,
                capture: CaptureDirective {
                    action: "/voice/speech".to_string(),
                    mode: CaptureMode::Speech(speech),
                },
            },
            "Polly.Joanna",
        );
        assert!(xml.contains(r#"enhanced="false""#));
        assert!(xml.contains(r#"language="en-GB""#));
        assert!(xml.contains(r#"hints="cardiology, radiology""#));
    }
}

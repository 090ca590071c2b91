//! Subtitle rewriting between SRT, WebVTT, ASS and plain text.
//!
//! Rules are matched on the (source, target) pair and the first match wins.
//! Pairs without a rule are returned unchanged. Parsing is line and pattern
//! based, so malformed input yields partial or empty output rather than an
//! error.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::str::FromStr;

/// Header that opens every WebVTT file.
pub const VTT_HEADER: &str = "WEBVTT\n\n";

/// Seconds each synthesized cue lasts when converting from plain text.
pub const TEXT_CUE_SECS: usize = 5;

static SRT_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap());

static VTT_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}):(\d{2}):(\d{2})\.(\d{3})").unwrap());

static TIMING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}:\d{2}:\d{2}[.,]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[.,]\d{3}").unwrap()
});

static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Subtitle formats understood by the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    Txt,
}

impl FromStr for SubtitleFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" => Ok(Self::Vtt),
            "ass" => Ok(Self::Ass),
            "txt" => Ok(Self::Txt),
            _ => Err(()),
        }
    }
}

/// Rewrites subtitle `text` from `source_ext` to `target`.
pub fn convert(text: &str, source_ext: &str, target: &str) -> String {
    let source = source_ext.parse::<SubtitleFormat>().ok();
    let Ok(target) = target.parse::<SubtitleFormat>() else {
        return text.to_string();
    };

    use SubtitleFormat::*;
    match (source, target) {
        (Some(Srt), Vtt) => srt_to_vtt(text),
        (Some(Vtt), Srt) => vtt_to_srt(text),
        (_, Txt) => to_plain_text(text),
        (Some(Ass), Srt) => ass_to_srt(text),
        (Some(Txt), Srt) => text_to_cues(text, false),
        (Some(Txt), Vtt) => text_to_cues(text, true),
        _ => text.to_string(),
    }
}

fn srt_to_vtt(text: &str) -> String {
    format!("{}{}", VTT_HEADER, SRT_TIMESTAMP.replace_all(text, "$1:$2:$3.$4"))
}

fn vtt_to_srt(text: &str) -> String {
    let body = text.strip_prefix(VTT_HEADER).unwrap_or(text);
    VTT_TIMESTAMP.replace_all(body, "$1:$2:$3,$4").into_owned()
}

fn to_plain_text(text: &str) -> String {
    let body = text.strip_prefix(VTT_HEADER).unwrap_or(text);

    let mut kept = String::with_capacity(body.len());
    for segment in body.split_inclusive('\n') {
        if segment.ends_with('\n') {
            let line = segment.trim_end_matches(['\n', '\r']);
            let is_index = !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit());
            if is_index || TIMING_LINE.is_match(line) {
                continue;
            }
        }
        kept.push_str(segment);
    }

    BLANK_RUN.replace_all(&kept, "\n\n").trim().to_string()
}

fn ass_to_srt(text: &str) -> String {
    let mut output = String::new();
    let mut counter = 1;

    for line in text.split('\n').map(|l| l.trim_end_matches('\r')) {
        if !line.starts_with("Dialogue:") {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 10 {
            continue;
        }

        let start = fields[1].trim().replacen('.', ",", 1);
        let end = fields[2].trim().replacen('.', ",", 1);
        let body = fields[9..].join(",").replace("\\N", "\n");

        output.push_str(&format!("{}\n{} --> {}\n{}\n\n", counter, start, end, body));
        counter += 1;
    }

    output
}

fn text_to_cues(text: &str, vtt: bool) -> String {
    let separator = if vtt { '.' } else { ',' };
    let mut output = if vtt {
        VTT_HEADER.to_string()
    } else {
        String::new()
    };

    let lines = text.split('\n').filter(|l| !l.trim().is_empty());
    for (i, line) in lines.enumerate() {
        let index = i + 1;
        output.push_str(&format!(
            "{}\n00:00:{:02}{sep}000 --> 00:00:{:02}{sep}000\n{}\n\n",
            index,
            index * TEXT_CUE_SECS,
            (index + 1) * TEXT_CUE_SECS,
            line,
            sep = separator,
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CUE_SRT: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:04,250\nWorld\n";

    #[test]
    fn test_srt_to_vtt() {
        let vtt = convert(TWO_CUE_SRT, "srt", "vtt");
        assert!(vtt.starts_with("WEBVTT\n\n1\n"));
        assert!(vtt.contains("00:00:01.000 --> 00:00:02.500"));
        assert!(vtt.contains("00:00:03.000 --> 00:00:04.250"));
        assert!(!vtt.contains(",000"));
    }

    #[test]
    fn test_srt_vtt_round_trip() {
        let vtt = convert(TWO_CUE_SRT, "srt", "vtt");
        let srt = convert(&vtt, "vtt", "srt");
        assert_eq!(srt, TWO_CUE_SRT);
    }

    #[test]
    fn test_vtt_to_srt_without_header() {
        let srt = convert("00:01:02.003 --> 00:01:04.000\nHi\n", "vtt", "srt");
        assert_eq!(srt, "00:01:02,003 --> 00:01:04,000\nHi\n");
    }

    #[test]
    fn test_to_txt_keeps_only_text() {
        let txt = convert(TWO_CUE_SRT, "srt", "txt");
        assert_eq!(txt, "Hello\n\nWorld");
    }

    #[test]
    fn test_vtt_to_txt_strips_header_and_cue_settings() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000 align:start\nFirst\n\n\n\n00:00:03.000 --> 00:00:04.000\nSecond\n";
        assert_eq!(convert(vtt, "vtt", "txt"), "First\n\nSecond");
    }

    #[test]
    fn test_ass_to_srt_single_dialogue() {
        let ass = "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,Hello\\NWorld\n";
        let srt = convert(ass, "ass", "srt");
        assert_eq!(srt, "1\n0:00:01,00 --> 0:00:02,50\nHello\nWorld\n\n");
    }

    #[test]
    fn test_ass_to_srt_keeps_commas_in_text() {
        let ass = "Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Well, well\r\nDialogue: short,line\n";
        let srt = convert(ass, "ass", "srt");
        assert_eq!(srt, "1\n0:00:01,00 --> 0:00:02,00\nWell, well\n\n");
    }

    #[test]
    fn test_txt_to_srt_windows() {
        let srt = convert("first line\n\n  \nsecond line\n", "txt", "srt");
        assert_eq!(
            srt,
            "1\n00:00:05,000 --> 00:00:10,000\nfirst line\n\n2\n00:00:10,000 --> 00:00:15,000\nsecond line\n\n"
        );
    }

    #[test]
    fn test_txt_to_vtt_uses_header_and_periods() {
        let vtt = convert("only\n", "txt", "vtt");
        assert_eq!(vtt, "WEBVTT\n\n1\n00:00:05.000 --> 00:00:10.000\nonly\n\n");
    }

    #[test]
    fn test_unmatched_pair_is_identity() {
        assert_eq!(convert("anything", "srt", "ass"), "anything");
        assert_eq!(convert("anything", "vtt", "pdf"), "anything");
        assert_eq!(convert("anything", "doc", "srt"), "anything");
    }

    #[test]
    fn test_garbage_input_does_not_panic() {
        let inputs = [
            "",
            "\n\n\n",
            "Dialogue:",
            "Dialogue: ,,,,,,,,,",
            "99:99:99,999 --> ",
            "\u{0}\u{feff}WEBVTT",
            "1\n2\n3",
        ];
        for input in inputs {
            for source in ["srt", "vtt", "ass", "txt"] {
                for target in ["srt", "vtt", "ass", "txt"] {
                    let _ = convert(input, source, target);
                }
            }
        }
    }
}

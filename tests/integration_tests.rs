//! Integration tests for the sheet convertor
//!
//! Tests the full pipeline: unlabeled input, parser race, formatter by label.

use sheets::{
    convert, create_hit_actions, default_convertor, Format, FormatOptions, KeyLayout, ParseOptions, Rate,
    SheetError,
};

const EVENT_SHEET: &str = r#"[{
    "name": "Chord", "author": "", "transcribedBy": "",
    "bitsPerPage": 16, "pitchLevel": 0, "bpm": 120,
    "songNotes": [
        {"time": 0, "key": "1Key0"},
        {"time": 0, "key": "2Key4"},
        {"time": 480, "key": "1Key0"}
    ]
}]"#;

#[test]
fn test_event_chord_then_note() {
    let notation = default_convertor().parse(EVENT_SHEET, &ParseOptions::default()).unwrap();
    assert_eq!(notation.bpm, 120);
    assert_eq!(notation.beats.len(), 2);
    // Key 4 is the fifth white key
    assert_eq!(notation.beats[0].tones, vec![0, 7]);
    // 480 ms against a 500 ms beat
    assert_eq!(notation.beats[0].rate.simplified(), Rate::new(24, 25).unwrap());
    assert_eq!(notation.beats[1].tones, vec![0]);
}

#[test]
fn test_cipher_to_timeline() {
    let opts = ParseOptions {
        filename: Some("scale.yp.txt".to_string()),
    };
    let output = convert("[1=C,4/4,120]1,2,3,", Format::FengxuGenshin2, &opts).unwrap();
    assert_eq!(
        output,
        "parseGenshinImpactMusic(\"scale\", \"{C3}<500>{D3}<500>{E3}<500>\", 2)\n"
    );
}

#[test]
fn test_timeline_back_to_cipher_keeps_beats() {
    let convertor = default_convertor();
    let original = convertor
        .parse("[1=C,4/4,120]1,2,3,", &ParseOptions::default())
        .unwrap();
    let timeline = convertor
        .format(Format::FengxuGenshin2.label(), &original, &FormatOptions::default())
        .unwrap();
    let again = convertor.parse(&timeline, &ParseOptions::default()).unwrap();
    assert_eq!(again.bpm, original.bpm);
    assert_eq!(again.beats, original.beats);
}

#[test]
fn test_letter_to_cipher() {
    let source = "<DontCopyThisLine> 240 0 16 a b\nA1 . A2 . A3 . . . ";
    let output = convert(source, Format::PianoWizardYp, &ParseOptions::default()).unwrap();
    assert!(output.contains(" * author: a\n"));
    assert!(output.contains(" * transcribedBy: b\n"));
    assert!(output.ends_with("[1=C,4/4,240]\n1*2,2*2,3*4,"), "{}", output);
}

#[test]
fn test_event_to_letter_scales_tempo() {
    let convertor = default_convertor();
    let letter = convert(EVENT_SHEET, Format::SkyStudioAbc, &ParseOptions::default()).unwrap();
    // 24/25 and 4/1 share a denominator of 25
    assert!(letter.starts_with("<DontCopyThisLine> 3000 0 16"), "{}", letter);

    let notation = convertor.parse(&letter, &ParseOptions::default()).unwrap();
    assert_eq!(notation.bpm, 3000);
    assert_eq!(notation.beats[0].tones, vec![0, 7]);
    assert_eq!(notation.beats[0].rate, Rate::whole(24));
    assert_eq!(notation.beats[1].rate, Rate::whole(100));
}

#[test]
fn test_timeline_to_event() {
    let source = "parseGenshinImpactMusic(\"demo\", \"250 {C2}<250>{D2}<500>{E2}<750>\", 2)";
    let output = convert(source, Format::SkyStudioJson, &ParseOptions::default()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value[0]["name"], "demo");
    assert_eq!(value[0]["bpm"], 240);
    assert_eq!(
        value[0]["songNotes"],
        serde_json::json!([
            {"time": 250, "key": "1Key0"},
            {"time": 500, "key": "1Key1"},
            {"time": 1000, "key": "1Key2"}
        ])
    );

    let notation = default_convertor().parse(&output, &ParseOptions::default()).unwrap();
    assert!(notation.beats[0].is_rest());
    assert_eq!(notation.beats[2].rate.simplified(), Rate::whole(2));
}

#[test]
fn test_unrecognized_input_reports_every_parser() {
    let convertor = default_convertor();
    match convertor.parse("hello", &ParseOptions::default()) {
        Err(SheetError::NoParserAccepted(failures)) => {
            let labels: Vec<&str> = failures.iter().map(|f| f.label.as_str()).collect();
            assert_eq!(labels, convertor.parser_labels());
            assert_eq!(labels.len(), Format::ALL.len());
        }
        other => panic!("Expected NoParserAccepted, got {:?}", other),
    }
}

#[test]
fn test_unknown_target_format() {
    let result = default_convertor().convert(
        "midi",
        "[1=C,4/4,120]1,",
        &ParseOptions::default(),
        &FormatOptions::default(),
    );
    assert!(matches!(result, Err(SheetError::UnknownFormat(label)) if label == "midi"));
}

#[test]
fn test_unplayable_cluster_is_missing_key() {
    // Three adjacent semitones never fit on white keys
    let result = convert("[1=C,4/4,120]1&1#&2,", Format::SkyStudioJson, &ParseOptions::default());
    assert!(matches!(result, Err(SheetError::MissingKey)));
}

#[test]
fn test_hit_actions_on_custom_layout() {
    let notation = default_convertor()
        .parse("[1=C,4/4,60]1,3,5/2,", &ParseOptions::default())
        .unwrap();
    let layout = KeyLayout::indexed(7, 0, false);
    let actions = create_hit_actions(&notation, &layout).unwrap();
    let locations: Vec<Vec<usize>> = actions.iter().map(|a| a.locations.clone()).collect();
    let delays: Vec<u64> = actions.iter().map(|a| a.post_delay).collect();
    assert_eq!(locations, vec![vec![0], vec![2], vec![4]]);
    assert_eq!(delays, vec![1000, 1000, 500]);
}

#[test]
fn test_every_format_is_registered() {
    let convertor = default_convertor();
    let labels: Vec<&str> = Format::ALL.iter().map(|f| f.label()).collect();
    assert_eq!(convertor.parser_labels(), labels);
    let mut sorted = labels.clone();
    sorted.sort_unstable();
    assert_eq!(convertor.formatter_labels(), sorted);
}

#[test]
fn test_long_cipher_beat_to_timeline() {
    let output = convert("[1=C,4/4,120]1*1000000000000000,", Format::FengxuGenshin2, &ParseOptions::default()).unwrap();
    assert!(output.contains("{C3}<500000000000000000>"), "{}", output);
}

#[test]
fn test_overflowing_beat_fails_instead_of_panicking() {
    let result = convert(
        "[1=C,4/4,120]1*9223372036854775807,",
        Format::SkyStudioJson,
        &ParseOptions::default(),
    );
    assert!(matches!(result, Err(SheetError::Range(_))));
}

#[test]
fn test_huge_event_time_stays_a_parse_failure() {
    let sheet = r#"[{"pitchLevel": 0, "bpm": 120, "songNotes": [
        {"time": 0, "key": "1Key0"},
        {"time": 9000000000000000000, "key": "1Key1"}
    ]}]"#;
    match default_convertor().parse(sheet, &ParseOptions::default()) {
        Err(SheetError::NoParserAccepted(failures)) => {
            assert_eq!(failures[0].label, Format::SkyStudioJson.label());
            assert!(matches!(failures[0].error, SheetError::Range(_)));
        }
        other => panic!("Expected NoParserAccepted, got {:?}", other),
    }
}

//! Instructions sent to the judgement service

use crate::taxonomy::ReferenceData;
use crate::types::VisualResult;

/// Characters of transcript / OCR text embedded in the risk prompt
pub const CONTENT_CHAR_LIMIT: usize = 5000;

pub const TRANSCRIPTION_INSTRUCTION: &str = "\
Transcribe every line of dialogue and narration in this audio or video exactly as spoken. \
Mark anything you cannot hear clearly as [inaudible] instead of guessing.";

pub const OCR_INSTRUCTION: &str = "\
Extract all text shown on screen in this video or image. Include titles and large captions, \
and also small annotations, footnotes, disclaimers, parenthetical notes and footnote markers (※). \
Output one item per line, even when the text is short.";

pub const VIDEO_ANALYSIS_INSTRUCTION: &str = "\
Analyse the main cuts and scenes of this video and group them by shared expression technique. \
Reply with JSON of this shape:
{\"summary\": \"<overall summary>\", \"segments\": [{\"label\": \"<pattern name>\", \
\"description\": \"<what the pattern shows>\", \"shots\": [{\"timecode\": \"<start-end>\", \
\"description\": \"<concrete content>\"}]}], \"risk_flags\": [\"<notable risk element>\"]}
Approximate timecodes in seconds are acceptable.";

pub const IMAGE_ANALYSIS_INSTRUCTION: &str = "\
Analyse the composition, subjects and background of this still image and identify any element \
that may carry social-sensitivity or legal risk. Reply with JSON of this shape:
{\"summary\": \"<overall summary>\", \"segments\": [{\"label\": \"<region of interest>\", \
\"description\": \"<characteristics>\", \"shots\": [{\"timecode\": \"still\", \
\"description\": \"<detail>\"}]}], \"risk_flags\": [\"<notable risk element>\"]}";

pub const RISK_INSTRUCTION: &str = "\
You are a compliance analyst for Japanese media content. Using the transcript, OCR captions, \
structured visual analysis and the reference material (social cases, tag taxonomy, legal \
guidelines), evaluate the content for Social Sensitivity and Legal Compliance. Do not cite \
specific past case titles; explain the underlying risk factors instead. Reply with JSON that \
strictly follows this schema:
{
  \"social\": {\"grade\": \"A|B|C|D|E\", \"reason\": \"<Japanese explanation>\",
             \"findings\": [{\"timecode\": \"<mm:ss or 静止画>\", \"detail\": \"<problematic expression>\"}]},
  \"legal\": {\"grade\": \"抵触していない|抵触する可能性がある|抵触している\",
            \"reason\": \"<Japanese explanation naming the guideline concerned>\",
            \"recommendations\": \"<concrete improvement proposals>\",
            \"violations\": [{\"reference\": \"<law or guideline>\", \"expression\": \"<wording or technique>\", \"severity\": \"高|中|低\"}],
            \"findings\": [{\"timecode\": \"<mm:ss or 静止画>\", \"detail\": \"<potential conflict>\"}]},
  \"matrix\": {\"x_axis\": \"法務評価\", \"y_axis\": \"社会的感度\", \"position\": [<x 0-2>, <y 0-4>]},
  \"tags\": [{\"name\": \"<tag>\", \"grade\": \"A|B|C|D|E\", \"reason\": \"<why this category is a risk>\",
            \"detected_text\": \"<quoted expression>\", \"detected_timecode\": \"<mm:ss>\",
            \"related_sub_tags\": [{\"name\": \"<sub-tag>\", \"grade\": \"A|B|C|D|E\", \"reason\": \"<short reason>\"}]}]
}
Include only relevant sub-tags. Grades must use the enumerated values exactly, with E the most \
severe. Always give the approximate timecode of each problematic expression in mm:ss; use \
'静止画' or 'N/A' when no timing is available.";

/// Content block for one risk judgement run
pub fn risk_content(
    reference: &ReferenceData,
    transcript: &str,
    ocr_text: &str,
    visual: &VisualResult,
) -> String {
    let visual_json = serde_json::to_string_pretty(visual).unwrap_or_default();
    let transcript: String = transcript.chars().take(CONTENT_CHAR_LIMIT).collect();
    let ocr_text: String = ocr_text.chars().take(CONTENT_CHAR_LIMIT).collect();

    format!(
        "## Transcript\n{}\n\n\
         ## OCR\n{}\n\n\
         ## Visual Segments\n{}\n\n\
         ## Tag Taxonomy (JSON)\n{}\n\n\
         ## Tag Taxonomy Summary\n{}\n\n\
         ## Social Sensitivity Cases Digest\n{}\n\n\
         ## Incident Digest\n{}\n\n\
         ## Tag List Digest\n{}\n\n\
         ## Legal Reference Digest\n{}\n",
        transcript,
        ocr_text,
        visual_json,
        reference.taxonomy.to_json(),
        reference.taxonomy.summary(),
        reference.digests.social_cases,
        reference.digests.incidents,
        reference.digests.tag_list,
        reference.digests.legal,
    )
}

/// Arbitration prompt asking which of two extraction runs is more complete
///
/// The reply's last line must be `1` or `2`.
pub fn arbitration_prompt(kind: &str, first: &str, second: &str, preview_chars: usize) -> String {
    let len1 = first.trim().chars().count();
    let len2 = second.trim().chars().count();
    let preview1: String = first.chars().take(preview_chars).collect();
    let preview2: String = second.chars().take(preview_chars).collect();

    format!(
        "Compare the two {kind} results below and choose the one that is more complete and \
         contextually accurate.\n\n\
         ## {kind} result 1 (length: {len1} chars)\n{preview1}\n\n\
         ## {kind} result 2 (length: {len2} chars)\n{preview2}\n\n\
         Briefly explain your reasoning, then write only the number 1 or 2 on the last line.\n"
    )
}

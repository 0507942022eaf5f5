// Walks a native result handle into the owned OcrResult tree.

use crate::error::Result;
use crate::ffi::handle::{Line, RecognitionResult};
use crate::model::{OcrLine, OcrResult, OcrWord};

/// Copies every line and word out of `result`, in the order the engine
/// reports them. Nothing is sorted, filtered or merged.
pub fn extract_result(result: &RecognitionResult<'_>) -> Result<OcrResult> {
    let image_angle = result.image_angle()?;
    let line_count = result.line_count()?;

    let mut lines = Vec::new();
    for i in 0..line_count {
        let line = result.line(i)?;
        lines.push(extract_line(&line)?);
    }

    Ok(OcrResult { image_angle, lines })
}

fn extract_line(line: &Line<'_>) -> Result<OcrLine> {
    let bounding_rect = line.bounding_box()?;
    let text = line.content()?;
    let word_count = line.word_count()?;

    let mut words = Vec::new();
    for j in 0..word_count {
        let word = line.word(j)?;
        words.push(OcrWord {
            text: word.content()?,
            bounding_rect: word.bounding_box()?,
            confidence: word.confidence()?,
        });
    }

    Ok(OcrLine {
        text,
        bounding_rect,
        words,
    })
}

use leptess::tesseract;
use leptess::tesseract::TessApi;

use opencv::core::Point;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;

use tesseract_plumbing::Text;

use std::ffi::CStr;
use std::ffi::CString;

use crate::config::RecognizerConfig;
use crate::error::PlateError;

/// One recognized line of text inside a plate region.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Corners of the span in region coordinates, clockwise from top-left.
    pub geometry: Vec<Point>,
    pub text: String,
    pub confidence: f32,
}

/// Spans in reading order. Only the first span feeds the vote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionResult {
    pub spans: Vec<TextSpan>,
}

impl RecognitionResult {
    pub fn new(spans: Vec<TextSpan>) -> Self {
        return Self { spans };
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Trimmed text of the first span, if it has any.
    pub fn first_text(&self) -> Option<&str> {
        self.spans
            .first()
            .map(|span| span.text.trim())
            .filter(|text| !text.is_empty())
    }
}

pub trait TextRecognizer {
    fn recognize(&mut self, region: &Mat) -> Result<RecognitionResult, PlateError>;
}

/// Builds one recognizer per worker. Called on the worker's own thread, so
/// the recognizer itself does not need to be `Send`.
pub trait RecognizerFactory: Send + Sync {
    type Recognizer: TextRecognizer;

    fn create(&self) -> Result<Self::Recognizer, PlateError>;
}

impl<F, R> RecognizerFactory for F
where
    F: Fn() -> Result<R, PlateError> + Send + Sync,
    R: TextRecognizer,
{
    type Recognizer = R;

    fn create(&self) -> Result<R, PlateError> {
        self()
    }
}

pub struct TesseractRecognizer {
    ocr: TessApi,
}

impl TesseractRecognizer {
    pub fn new(config: &RecognizerConfig) -> Result<Self, PlateError> {
        let data_path = match &config.data_path {
            Some(path) => Some(
                path.to_str()
                    .ok_or_else(|| {
                        PlateError::Config(format!("tessdata path {:?} is not UTF-8", path))
                    })?
                    .to_string(),
            ),
            None => None,
        };

        let mut api = tesseract::TessApi::new(data_path.as_deref(), &config.language)
            .map_err(|err| engine_error("init", err))?;

        let lang = c_string(&config.language)?;
        let data_path_cstr = match &data_path {
            Some(path) => Some(c_string(path)?),
            None => None,
        };
        api.raw
            .init_4(
                data_path_cstr.as_deref(),
                Some(lang.as_ref()),
                config.engine_mode,
            )
            .map_err(|err| engine_error("init engine mode", err))?;

        if let Some(mode) = config.page_seg_mode {
            api.raw
                .set_variable(
                    &c_string("tessedit_pageseg_mode")?,
                    &c_string(&mode.to_string())?,
                )
                .map_err(|err| engine_error("tessedit_pageseg_mode", err))?;
        }
        if let Some(whitelist) = &config.char_whitelist {
            api.raw
                .set_variable(
                    &c_string("tessedit_char_whitelist")?,
                    &c_string(whitelist)?,
                )
                .map_err(|err| engine_error("tessedit_char_whitelist", err))?;
        }

        log::debug!(
            "tesseract engine ready (lang {}, oem {})",
            config.language,
            config.engine_mode
        );
        Ok(Self { ocr: api })
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&mut self, region: &Mat) -> Result<RecognitionResult, PlateError> {
        if region.empty() || region.channels() != 1 {
            return Err(PlateError::RecognitionEngine(format!(
                "expected a non-empty single channel region, got {} channels",
                region.channels()
            )));
        }

        let cols = region.cols();
        let rows = region.rows();
        let contiguous;
        let region = if region.is_continuous() {
            region
        } else {
            contiguous = region.try_clone()?;
            &contiguous
        };
        self.ocr
            .raw
            .set_image(region.data_bytes()?, cols, rows, 1, cols)
            .map_err(|err| engine_error("set image", err))?;

        let tsv: Text = self
            .ocr
            .raw
            .get_tsv_text(0)
            .map_err(|err| engine_error("tsv text", err))?;
        let tsv: &CStr = tsv.as_ref();
        let spans = tsv_lines(&tsv.to_string_lossy());
        Ok(RecognitionResult::new(spans))
    }
}

impl Drop for TesseractRecognizer {
    fn drop(&mut self) {
        log::debug!("releasing tesseract engine");
    }
}

const TSV_LEVEL_LINE: u32 = 4;
const TSV_LEVEL_WORD: u32 = 5;

#[derive(Debug)]
struct TsvRow<'a> {
    level: u32,
    line_key: [u32; 4],
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    conf: f32,
    text: &'a str,
}

fn parse_tsv_row(row: &str) -> Option<TsvRow<'_>> {
    let fields: Vec<&str> = row.splitn(12, '\t').collect();
    if fields.len() < 11 {
        return None;
    }
    let num = |i: usize| fields[i].trim().parse::<u32>().ok();
    let int = |i: usize| fields[i].trim().parse::<i32>().ok();
    Some(TsvRow {
        level: num(0)?,
        line_key: [num(1)?, num(2)?, num(3)?, num(4)?],
        left: int(6)?,
        top: int(7)?,
        width: int(8)?,
        height: int(9)?,
        conf: fields[10].trim().parse::<f32>().ok()?,
        text: fields.get(11).copied().map(str::trim).unwrap_or(""),
    })
}

struct LineBuilder {
    key: [u32; 4],
    geometry: Vec<Point>,
    words: Vec<String>,
    conf_sum: f32,
}

/// Groups Tesseract TSV rows into one span per text line. The line row
/// supplies the box; the words supply the text and the mean confidence.
/// Lines without words are dropped. Header and malformed rows are skipped.
fn tsv_lines(tsv: &str) -> Vec<TextSpan> {
    let mut lines: Vec<LineBuilder> = Vec::new();
    for row in tsv.lines().filter_map(parse_tsv_row) {
        match row.level {
            TSV_LEVEL_LINE => lines.push(LineBuilder {
                key: row.line_key,
                geometry: vec![
                    Point::new(row.left, row.top),
                    Point::new(row.left + row.width, row.top),
                    Point::new(row.left + row.width, row.top + row.height),
                    Point::new(row.left, row.top + row.height),
                ],
                words: Vec::new(),
                conf_sum: 0.0,
            }),
            TSV_LEVEL_WORD if !row.text.is_empty() && row.conf >= 0.0 => {
                if let Some(line) = lines.iter_mut().rev().find(|l| l.key == row.line_key) {
                    line.words.push(row.text.to_string());
                    line.conf_sum += row.conf;
                }
            }
            _ => {}
        }
    }

    lines
        .into_iter()
        .filter(|line| !line.words.is_empty())
        .map(|line| TextSpan {
            confidence: line.conf_sum / line.words.len() as f32 / 100.0,
            text: line.words.join(" "),
            geometry: line.geometry,
        })
        .collect()
}

fn c_string(value: &str) -> Result<CString, PlateError> {
    CString::new(value).map_err(|err| PlateError::Config(err.to_string()))
}

fn engine_error(step: &str, err: impl std::fmt::Debug) -> PlateError {
    PlateError::RecognitionEngine(format!("{}: {:?}", step, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str) -> TextSpan {
        TextSpan {
            geometry: vec![Point::new(0, 0); 4],
            text: text.to_string(),
            confidence: 0.8,
        }
    }

    #[test]
    fn first_text_uses_first_span_only() {
        let result = RecognitionResult::new(vec![span("ABC 123\n"), span("XYZ")]);
        assert_eq!(result.first_text(), Some("ABC 123"));
    }

    #[test]
    fn blank_first_span_has_no_text() {
        let result = RecognitionResult::new(vec![span("  \n"), span("XYZ")]);
        assert_eq!(result.first_text(), None);
        assert_eq!(RecognitionResult::default().first_text(), None);
    }

    const TWO_LINE_TSV: &str = "\
level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t240\t80\t-1\t
2\t1\t1\t0\t0\t0\t10\t8\t220\t64\t-1\t
3\t1\t1\t1\t0\t0\t10\t8\t220\t64\t-1\t
4\t1\t1\t1\t1\t0\t12\t8\t200\t30\t-1\t
5\t1\t1\t1\t1\t1\t12\t8\t90\t30\t90.0\tKA01
5\t1\t1\t1\t1\t2\t110\t8\t102\t30\t80.0\tAB1234
4\t1\t1\t1\t2\t0\t60\t48\t100\t24\t-1\t
5\t1\t1\t1\t2\t1\t60\t48\t100\t24\t50.0\tIND
4\t1\t1\t1\t3\t0\t0\t74\t30\t6\t-1\t
5\t1\t1\t1\t3\t1\t0\t74\t30\t6\t-1\t
";

    #[test]
    fn tsv_lines_get_their_own_box_and_confidence() {
        let spans = tsv_lines(TWO_LINE_TSV);
        assert_eq!(spans.len(), 2);

        assert_eq!(spans[0].text, "KA01 AB1234");
        assert_eq!(
            spans[0].geometry,
            vec![
                Point::new(12, 8),
                Point::new(212, 8),
                Point::new(212, 38),
                Point::new(12, 38),
            ]
        );
        assert!((spans[0].confidence - 0.85).abs() < 1e-6);

        assert_eq!(spans[1].text, "IND");
        assert_eq!(spans[1].geometry[0], Point::new(60, 48));
        assert_eq!(spans[1].geometry[2], Point::new(160, 72));
        assert!((spans[1].confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn malformed_tsv_rows_are_ignored() {
        assert!(tsv_lines("").is_empty());
        assert!(tsv_lines("garbage\nmore\tgarbage\n").is_empty());
    }

    #[test]
    fn closures_act_as_factories() {
        struct Fixed;
        impl TextRecognizer for Fixed {
            fn recognize(&mut self, _region: &Mat) -> Result<RecognitionResult, PlateError> {
                Ok(RecognitionResult::new(vec![span("KA01")]))
            }
        }

        let factory = || Ok::<_, PlateError>(Fixed);
        let mut recognizer = factory.create().unwrap();
        let result = recognizer.recognize(&Mat::default()).unwrap();
        assert_eq!(result.first_text(), Some("KA01"));
    }
}

//! Configuration types for document normalization and conversion.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Thresholds and engine choices live here and
//! are handed to [`crate::convert::Converter`] at construction; nothing reads
//! them from global state.
//!
//! [`NormalizeConfig`] drives the archive normalizer and [`BatchConfig`] the
//! directory walk. Both are plain data with serde support.

use crate::error::Tender2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for converting one document to Markdown.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use tender2md::{ConversionConfig, OcrEngine};
///
/// let config = ConversionConfig::builder()
///     .full_fidelity_timeout_secs(120)
///     .ocr_engine(OcrEngine::Tesseract)
///     .build()
///     .unwrap();
/// assert_eq!(config.full_fidelity_timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Wall-clock budget for the full-fidelity PDF pipeline in seconds. Default: 180.
    ///
    /// When the budget runs out the full attempt is aborted and the fallback
    /// pipeline runs instead. The fallback itself is not time-bounded.
    pub full_fidelity_timeout_secs: u64,

    /// `.xlsx` files strictly larger than this are skipped. Default: 51 200 (50 KB).
    pub spreadsheet_size_limit_bytes: u64,

    /// OCR engine for the full-fidelity pipeline. Default: [`OcrEngine::EasyOcr`].
    pub ocr_engine: OcrEngine,

    /// OCR engine for the fallback pipeline. Default: [`OcrEngine::Tesseract`].
    pub fallback_ocr_engine: OcrEngine,

    /// What runs after the full-fidelity budget expires. Default: [`FallbackBackend::Engine`].
    pub fallback: FallbackBackend,

    /// OCR languages passed to the engine. Default: `["ru", "en"]`.
    pub ocr_languages: Vec<String>,

    /// External structure-extraction program. Default: `docling-tree`.
    pub engine_program: PathBuf,

    /// Arguments placed before the generated engine flags.
    pub engine_args: Vec<String>,

    /// Path to libpdfium. When `None` the system library is used.
    pub pdfium_library: Option<PathBuf>,

    /// Materialize picture pixels at their referenced paths. Default: false.
    ///
    /// Placeholder references are always emitted; writing pixels costs engine
    /// time and disk space, so it is opt-in.
    pub extract_images: bool,

    /// Pair tables from paginated documents with an image reference. Default: true.
    pub table_images: bool,

    /// Directory (relative to the Markdown file) that holds generated assets. Default: `images`.
    pub images_dir: String,

    /// Range used for non-paginated formats. Default: 1–20.
    pub default_page_range: PageRange,

    /// Trailing pages analyzed in exhaustive-detail mode. Default: 3.
    pub exhaustive_tail_pages: usize,

    /// Trailing pages analyzed in general mode. Default: 20.
    pub general_tail_pages: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            full_fidelity_timeout_secs: 180,
            spreadsheet_size_limit_bytes: 50 * 1024,
            ocr_engine: OcrEngine::EasyOcr,
            fallback_ocr_engine: OcrEngine::Tesseract,
            fallback: FallbackBackend::default(),
            ocr_languages: vec!["ru".to_string(), "en".to_string()],
            engine_program: PathBuf::from("docling-tree"),
            engine_args: Vec::new(),
            pdfium_library: None,
            extract_images: false,
            table_images: true,
            images_dir: "images".to_string(),
            default_page_range: PageRange::new(1, 20),
            exhaustive_tail_pages: 3,
            general_tail_pages: 20,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn full_fidelity_timeout_secs(mut self, secs: u64) -> Self {
        self.config.full_fidelity_timeout_secs = secs;
        self
    }

    pub fn spreadsheet_size_limit_bytes(mut self, bytes: u64) -> Self {
        self.config.spreadsheet_size_limit_bytes = bytes;
        self
    }

    pub fn ocr_engine(mut self, engine: OcrEngine) -> Self {
        self.config.ocr_engine = engine;
        self
    }

    pub fn fallback_ocr_engine(mut self, engine: OcrEngine) -> Self {
        self.config.fallback_ocr_engine = engine;
        self
    }

    pub fn fallback(mut self, backend: FallbackBackend) -> Self {
        self.config.fallback = backend;
        self
    }

    pub fn ocr_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr_languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn engine_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.engine_program = program.into();
        self
    }

    pub fn engine_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    pub fn table_images(mut self, v: bool) -> Self {
        self.config.table_images = v;
        self
    }

    pub fn images_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn default_page_range(mut self, range: PageRange) -> Self {
        self.config.default_page_range = range;
        self
    }

    pub fn exhaustive_tail_pages(mut self, n: usize) -> Self {
        self.config.exhaustive_tail_pages = n;
        self
    }

    pub fn general_tail_pages(mut self, n: usize) -> Self {
        self.config.general_tail_pages = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Tender2MdError> {
        let c = &self.config;
        if c.full_fidelity_timeout_secs == 0 {
            return Err(Tender2MdError::InvalidConfig(
                "Full-fidelity timeout must be ≥ 1 second".into(),
            ));
        }
        if c.exhaustive_tail_pages == 0 || c.general_tail_pages == 0 {
            return Err(Tender2MdError::InvalidConfig(
                "Tail page counts must be ≥ 1".into(),
            ));
        }
        if c.default_page_range.start == 0 || c.default_page_range.start > c.default_page_range.end
        {
            return Err(Tender2MdError::InvalidConfig(format!(
                "Default page range must be 1-based and ordered, got {}",
                c.default_page_range
            )));
        }
        if c.images_dir.trim().is_empty() {
            return Err(Tender2MdError::InvalidConfig(
                "Images directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// OCR engine requested from the structure-extraction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    /// Neural OCR; slowest and most accurate. (default for the full pipeline)
    #[default]
    EasyOcr,
    /// Tesseract; the lighter engine used by the fallback.
    Tesseract,
    /// Apple Vision OCR, available on macOS hosts only.
    Mac,
}

impl OcrEngine {
    /// Flag value passed to the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrEngine::EasyOcr => "easyocr",
            OcrEngine::Tesseract => "tesseract",
            OcrEngine::Mac => "mac",
        }
    }
}

impl std::str::FromStr for OcrEngine {
    type Err = Tender2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easyocr" => Ok(OcrEngine::EasyOcr),
            "tesseract" => Ok(OcrEngine::Tesseract),
            "mac" | "ocrmac" => Ok(OcrEngine::Mac),
            other => Err(Tender2MdError::InvalidConfig(format!(
                "Unknown OCR engine '{other}' (expected easyocr, tesseract or mac)"
            ))),
        }
    }
}

/// Which pipeline runs once the full-fidelity budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackBackend {
    /// The external engine with the simple backend and the fallback OCR engine. (default)
    #[default]
    Engine,
    /// In-process text-layer extraction through pdfium. No OCR.
    PdfiumText,
    /// No fallback: a timeout is reported as [`Tender2MdError::Timeout`].
    Disabled,
}

/// Page-selection policy for paginated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    /// Analyze the last few pages, where estimate totals usually sit.
    ExhaustiveDetail,
    /// Analyze a longer tail of the document.
    General,
}

impl AnalysisMode {
    /// Both modes, in processing order.
    pub const ALL: [AnalysisMode; 2] = [AnalysisMode::ExhaustiveDetail, AnalysisMode::General];

    /// Conventional subfolder name inside a tender directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            AnalysisMode::ExhaustiveDetail => "ed",
            AnalysisMode::General => "common",
        }
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = Tender2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ed" | "exhaustive" | "exhaustive-detail" => Ok(AnalysisMode::ExhaustiveDetail),
            "common" | "general" => Ok(AnalysisMode::General),
            other => Err(Tender2MdError::InvalidConfig(format!(
                "Unknown analysis mode '{other}' (expected ed or common)"
            ))),
        }
    }
}

/// Inclusive, 1-based page span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ── Normalizer & batch ───────────────────────────────────────────────────

/// Settings for the external legacy-format converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Converter program. Default: `unoconv`.
    pub program: PathBuf,
    /// Extensions (without dot, lowercase) converted to `target_extension`.
    pub extensions: Vec<String>,
    /// Extension of the produced sibling file. Default: `docx`.
    pub target_extension: String,
    /// Hard wall-clock limit per file in seconds. Default: 90.
    pub timeout_secs: u64,
    /// Process-name fragments of converter daemons killed after a timeout.
    pub daemon_names: Vec<String>,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("unoconv"),
            extensions: vec!["doc".into(), "odt".into(), "rtf".into()],
            target_extension: "docx".into(),
            timeout_secs: 90,
            daemon_names: vec!["soffice".into(), "libreoffice".into()],
        }
    }
}

/// Settings for [`crate::normalize::normalize_tree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Upper bound on archive rescans. Default: 16.
    pub max_archive_passes: usize,
    /// Code page for zip entry names that are not UTF-8. Default: `ibm866`.
    pub zip_name_encoding: Option<String>,
    /// Run the legacy converter. Default: true.
    pub convert_legacy: bool,
    pub legacy: LegacyConfig,
    /// Extension preference when a stem has several renditions.
    pub priority_order: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_archive_passes: 16,
            zip_name_encoding: Some("ibm866".into()),
            convert_legacy: true,
            legacy: LegacyConfig::default(),
            priority_order: vec![".xlsx".into(), ".docx".into(), ".pdf".into()],
        }
    }
}

/// Settings for [`crate::batch::run_batch`].
#[derive(Clone)]
pub struct BatchConfig {
    /// Root of the date/client/template/tender hierarchy. Default: `docs_refined`.
    pub input_root: PathBuf,
    /// Root of the mirrored Markdown tree. Default: `docs_md`.
    pub output_root: PathBuf,
    /// Extensions (without dot, lowercase) eligible for conversion.
    pub extensions: Vec<String>,
    /// Documents converted at once. Default: 1.
    pub concurrency: usize,
    /// Move produced Markdown back into the input tree afterwards. Default: false.
    pub sync_back: bool,
    /// Optional progress events.
    pub progress: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("docs_refined"),
            output_root: PathBuf::from("docs_md"),
            extensions: vec!["docx".into(), "xlsx".into(), "pptx".into(), "pdf".into()],
            concurrency: 1,
            sync_back: false,
            progress: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("input_root", &self.input_root)
            .field("output_root", &self.output_root)
            .field("extensions", &self.extensions)
            .field("concurrency", &self.concurrency)
            .field("sync_back", &self.sync_back)
            .field(
                "progress",
                &self.progress.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

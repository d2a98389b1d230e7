use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use overlay_translator::ocr::{
    DetectFuture, DetectText, DocumentBlock, DocumentPage, DocumentParagraph, DocumentWord, Vertex,
};
use overlay_translator::{
    CaptureRegion, CaptureSession, OverlayError, OverlayPipeline, Translate, TranslateFuture,
};

struct FakeOcr {
    pages: Vec<DocumentPage>,
    calls: AtomicUsize,
}

impl FakeOcr {
    fn new(pages: Vec<DocumentPage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetectText for FakeOcr {
    fn detect_document_text<'a>(&'a self, image_png: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(async move {
            assert!(!image_png.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.clone())
        })
    }
}

/// Tags text with the target language; fails on anything containing "Broken".
struct FakeTranslator {
    calls: AtomicUsize,
    stall: bool,
}

impl FakeTranslator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            stall: false,
        })
    }

    fn stalling() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            stall: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Translate for FakeTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source_lang: &'a str,
        target_lang: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            if text.contains("Broken") {
                return Err(anyhow!("service unavailable"));
            }
            Ok(text
                .split('\n')
                .map(|line| format!("{}:{}", target_lang, line.replace('&', "&amp;")))
                .collect::<Vec<_>>()
                .join("\n"))
        })
    }
}

struct IdentityTranslator;

impl Translate for IdentityTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source_lang: &'a str,
        _target_lang: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move { Ok(text.to_string()) })
    }
}

fn word(text: &str, x: i32, y: i32, w: i32, h: i32) -> DocumentWord {
    DocumentWord {
        symbols: vec![text.to_string()],
        vertices: vec![
            Vertex { x, y },
            Vertex { x: x + w, y },
            Vertex { x: x + w, y: y + h },
            Vertex { x, y: y + h },
        ],
        confidence: Some(0.9),
    }
}

fn block(words: Vec<DocumentWord>) -> DocumentBlock {
    DocumentBlock {
        confidence: 0.9,
        paragraphs: vec![DocumentParagraph { words }],
    }
}

fn sample_pages() -> Vec<DocumentPage> {
    vec![DocumentPage {
        blocks: vec![
            block(vec![
                word("Hello", 10, 10, 50, 16),
                word("world", 66, 11, 50, 16),
                word("Tom&Jerry", 10, 34, 80, 16),
            ]),
            block(vec![word("Settings", 10, 80, 70, 18)]),
        ],
    }]
}

fn capture() -> RgbaImage {
    let mut image = RgbaImage::from_pixel(240, 120, Rgba([240, 240, 240, 255]));
    for x in 12..50 {
        image.put_pixel(x, 18, Rgba([10, 10, 10, 255]));
    }
    image
}

fn pipeline(ocr: &Arc<FakeOcr>, translator: &Arc<FakeTranslator>) -> OverlayPipeline {
    OverlayPipeline::new(ocr.clone(), translator.clone())
}

#[tokio::test]
async fn full_pass_translates_every_block() {
    let ocr = FakeOcr::new(sample_pages());
    let translator = FakeTranslator::new();
    let mut session = CaptureSession::from_image(capture()).unwrap();

    let output = pipeline(&ocr, &translator)
        .run(&mut session, "auto", "ja")
        .await
        .unwrap();

    assert_eq!(output.image.dimensions(), (240, 120));
    assert!(output.failed_blocks.is_empty());
    let texts = output
        .lines
        .iter()
        .map(|line| (line.block_id, line.translated_text.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        texts,
        vec![
            (1, "ja:Hello world"),
            (1, "ja:Tom&Jerry"),
            (2, "ja:Settings"),
        ]
    );
    assert_eq!(ocr.calls(), 1);
    assert_eq!(translator.calls(), 2);
}

#[tokio::test]
async fn invalid_region_never_reaches_collaborators() {
    let screen = capture();
    for region in [CaptureRegion::new(0, 0, 0, 50), CaptureRegion::new(5, 5, 30, -2)] {
        let err = CaptureSession::from_screen(&screen, region).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidRegion { .. }));
    }
}

#[tokio::test]
async fn unsupported_language_is_rejected_before_ocr() {
    let ocr = FakeOcr::new(sample_pages());
    let translator = FakeTranslator::new();
    let mut session = CaptureSession::from_image(capture()).unwrap();
    let pipeline = pipeline(&ocr, &translator);

    let err = pipeline.run(&mut session, "auto", "xx").await.unwrap_err();
    assert!(matches!(err, OverlayError::UnsupportedLanguage { .. }));
    let err = pipeline.run(&mut session, "auto", "auto").await.unwrap_err();
    assert!(matches!(err, OverlayError::UnsupportedLanguage { .. }));

    assert_eq!(ocr.calls(), 0);
    assert_eq!(translator.calls(), 0);
    assert!(session.blocks().is_none());
}

#[tokio::test]
async fn empty_ocr_result_short_circuits() {
    let ocr = FakeOcr::new(vec![DocumentPage {
        blocks: vec![block(vec![word("   ", 1, 1, 5, 5)])],
    }]);
    let translator = FakeTranslator::new();
    let mut session = CaptureSession::from_image(capture()).unwrap();

    let err = pipeline(&ocr, &translator)
        .run(&mut session, "en", "de")
        .await
        .unwrap_err();
    assert!(matches!(err, OverlayError::NoTextDetected));
    assert_eq!(translator.calls(), 0);
}

#[tokio::test]
async fn failing_block_does_not_affect_others() {
    let mut pages = sample_pages();
    pages[0]
        .blocks
        .push(block(vec![word("Broken", 120, 80, 60, 18)]));
    let ocr = FakeOcr::new(pages);
    let translator = FakeTranslator::new();
    let mut session = CaptureSession::from_image(capture()).unwrap();

    let output = pipeline(&ocr, &translator)
        .run(&mut session, "en", "de")
        .await
        .unwrap();

    assert_eq!(output.failed_blocks, vec![3]);
    assert_eq!(output.lines.len(), 3);
    assert!(output.lines.iter().all(|line| line.block_id != 3));
}

#[tokio::test]
async fn language_switch_reuses_cached_blocks() {
    let ocr = FakeOcr::new(sample_pages());
    let translator = FakeTranslator::new();
    let mut session = CaptureSession::from_image(capture()).unwrap();
    let pipeline = pipeline(&ocr, &translator);

    let first = pipeline.run(&mut session, "en", "ja").await.unwrap();
    let cached = session.blocks().unwrap().to_vec();

    let second = pipeline.retranslate(&session, "en", "de").await.unwrap();
    let third = pipeline.run(&mut session, "en", "fr").await.unwrap();

    assert_eq!(ocr.calls(), 1);
    assert_eq!(session.blocks().unwrap(), cached.as_slice());
    assert_eq!(second.lines[0].translated_text, "de:Hello world");
    assert_eq!(third.lines[2].translated_text, "fr:Settings");
    for (a, b) in first.lines.iter().zip(&second.lines) {
        assert_eq!(a.bbox, b.bbox);
        assert_eq!(a.block_id, b.block_id);
    }
}

#[tokio::test]
async fn retranslate_needs_a_detected_session() {
    let ocr = FakeOcr::new(sample_pages());
    let translator = FakeTranslator::new();
    let session = CaptureSession::from_image(capture()).unwrap();

    let err = pipeline(&ocr, &translator)
        .retranslate(&session, "en", "ja")
        .await
        .unwrap_err();
    assert!(matches!(err, OverlayError::NoTextDetected));
    assert_eq!(ocr.calls(), 0);
}

#[tokio::test]
async fn closing_the_session_cancels_pending_translation() {
    let ocr = FakeOcr::new(sample_pages());
    let translator = FakeTranslator::stalling();
    let mut session = CaptureSession::from_image(capture()).unwrap();
    let handle = session.cancel_handle();
    let pipeline = pipeline(&ocr, &translator);

    let (result, _) = tokio::join!(pipeline.run(&mut session, "en", "ja"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    assert!(matches!(result, Err(OverlayError::Cancelled)));
    assert!(session.is_closed());
    assert_eq!(session.blocks().map(<[_]>::len), Some(2));
}

#[tokio::test]
async fn identity_translation_keeps_line_boxes() {
    let ocr = FakeOcr::new(sample_pages());
    let mut session = CaptureSession::from_image(capture()).unwrap();

    let output = OverlayPipeline::new(ocr.clone(), Arc::new(IdentityTranslator))
        .run(&mut session, "en", "en")
        .await
        .unwrap();

    let source_lines = session
        .blocks()
        .unwrap()
        .iter()
        .flat_map(|block| block.lines.iter())
        .collect::<Vec<_>>();
    assert_eq!(output.lines.len(), source_lines.len());
    for (translated, line) in output.lines.iter().zip(source_lines) {
        assert_eq!(translated.bbox, line.bbox);
        assert_eq!(translated.translated_text, line.text);
        assert_eq!(translated.original_text, line.text);
    }
}

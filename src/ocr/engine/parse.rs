use crate::ocr::BBoxPx;

use super::{DocumentBlock, DocumentPage, DocumentParagraph, DocumentWord, Vertex};

/// Reads tesseract hOCR into the page → block → paragraph → word tree.
///
/// `ocr_carea` maps to a block and `ocr_par` to a paragraph. Words that appear
/// before any enclosing element get an implicit parent.
pub fn parse_hocr_pages(hocr: &str) -> Vec<DocumentPage> {
    let bytes = hocr.as_bytes();
    let mut pages: Vec<DocumentPage> = Vec::new();
    let mut i = 0usize;
    while let Some(start) = find_byte(bytes, b'<', i) {
        let tag_end = match find_byte(bytes, b'>', start) {
            Some(end) => end,
            None => break,
        };
        let tag = &hocr[start..tag_end];
        let class = extract_attr(tag, "class").unwrap_or_default();
        let classes = class.split_whitespace().collect::<Vec<_>>();

        if classes.contains(&"ocr_page") {
            pages.push(DocumentPage::default());
        } else if classes.contains(&"ocr_carea") {
            current_page(&mut pages).blocks.push(DocumentBlock {
                confidence: 1.0,
                paragraphs: Vec::new(),
            });
        } else if classes.contains(&"ocr_par") {
            current_block(&mut pages)
                .paragraphs
                .push(DocumentParagraph::default());
        } else if classes.contains(&"ocrx_word") {
            let Some((inner_start, inner_end)) = find_span_inner(bytes, tag_end + 1) else {
                break;
            };
            if let Some(word) = parse_word(tag, &hocr[inner_start..inner_end]) {
                current_paragraph(&mut pages).words.push(word);
            }
            i = inner_end + "</span>".len();
            continue;
        }
        i = tag_end + 1;
    }
    pages
}

fn current_page(pages: &mut Vec<DocumentPage>) -> &mut DocumentPage {
    if pages.is_empty() {
        pages.push(DocumentPage::default());
    }
    let last = pages.len() - 1;
    &mut pages[last]
}

fn current_block(pages: &mut Vec<DocumentPage>) -> &mut DocumentBlock {
    let page = current_page(pages);
    if page.blocks.is_empty() {
        page.blocks.push(DocumentBlock {
            confidence: 1.0,
            paragraphs: Vec::new(),
        });
    }
    let last = page.blocks.len() - 1;
    &mut page.blocks[last]
}

fn current_paragraph(pages: &mut Vec<DocumentPage>) -> &mut DocumentParagraph {
    let block = current_block(pages);
    if block.paragraphs.is_empty() {
        block.paragraphs.push(DocumentParagraph::default());
    }
    let last = block.paragraphs.len() - 1;
    &mut block.paragraphs[last]
}

fn parse_word(tag: &str, inner: &str) -> Option<DocumentWord> {
    let text = decode_entities(&strip_tags(inner)).replace('\u{00a0}', " ");
    let text = text.trim();
    let bbox = parse_hocr_bbox_from_title(tag)?;
    let conf = parse_hocr_conf_from_title(tag).unwrap_or(0.0);
    if !should_keep_hocr_word(text, conf, &bbox) {
        return None;
    }
    let (x1, y1) = (bbox.x as i32, bbox.y as i32);
    let (x2, y2) = (bbox.right() as i32, bbox.bottom() as i32);
    Some(DocumentWord {
        symbols: vec![text.to_string()],
        vertices: vec![
            Vertex { x: x1, y: y1 },
            Vertex { x: x2, y: y1 },
            Vertex { x: x2, y: y2 },
            Vertex { x: x1, y: y2 },
        ],
        confidence: Some((conf / 100.0).clamp(0.0, 1.0)),
    })
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|b| *b == needle)
        .map(|pos| from + pos)
}

fn find_span_inner(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut depth = 1i32;
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if bytes[i..].starts_with(b"<span") {
                depth += 1;
            } else if bytes[i..].starts_with(b"</span") {
                depth -= 1;
                if depth == 0 {
                    return Some((start, i));
                }
            }
        }
        i += 1;
    }
    None
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let idx = tag.find(&needle)?;
    let rest = &tag[idx + needle.len()..];
    let quote = rest.chars().next().filter(|ch| *ch == '"' || *ch == '\'')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn strip_tags(value: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in value.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ => {
                if !in_tag {
                    out.push(ch);
                }
            }
        }
    }
    out
}

fn decode_entities(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}

fn parse_hocr_bbox_from_title(tag: &str) -> Option<BBoxPx> {
    let title = extract_attr(tag, "title")?;
    let bbox_idx = title.find("bbox")?;
    let rest = &title[bbox_idx + 4..];
    let nums = rest
        .split([' ', ';'])
        .filter(|v| !v.is_empty())
        .take(4)
        .filter_map(|v| v.parse::<u32>().ok())
        .collect::<Vec<_>>();
    if nums.len() != 4 {
        return None;
    }
    let (x1, y1, x2, y2) = (nums[0], nums[1], nums[2], nums[3]);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    })
}

fn parse_hocr_conf_from_title(tag: &str) -> Option<f32> {
    let title = extract_attr(tag, "title")?;
    let idx = title.find("x_wconf")?;
    let rest = &title[idx + "x_wconf".len()..];
    let value = rest.split([' ', ';']).find(|v| !v.is_empty())?;
    value.parse::<f32>().ok()
}

fn should_keep_hocr_word(text: &str, conf: f32, bbox: &BBoxPx) -> bool {
    if text.is_empty() || bbox.w == 0 {
        return false;
    }
    if conf < 55.0 && text.chars().count() <= 1 {
        return false;
    }
    if conf < 60.0 && !text.chars().any(char::is_alphanumeric) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<body>
<div class='ocr_page' id='page_1' title='image "in.png"; bbox 0 0 400 200; ppageno 0'>
 <div class='ocr_carea' id='block_1_1' title="bbox 10 10 200 60">
  <p class='ocr_par' id='par_1_1' lang='eng' title="bbox 10 10 200 60">
   <span class='ocr_line' id='line_1_1' title="bbox 10 10 200 30; baseline 0 -4">
    <span class='ocrx_word' id='word_1_1' title='bbox 10 10 60 30; x_wconf 96'>Hello</span>
    <span class='ocrx_word' id='word_1_2' title='bbox 70 11 130 30; x_wconf 91'><strong>Tom&amp;Jerry</strong></span>
    <span class='ocrx_word' id='word_1_3' title='bbox 140 11 150 30; x_wconf 20'>~</span>
   </span>
  </p>
 </div>
 <div class='ocr_carea' id='block_1_2' title="bbox 10 100 200 130">
  <p class='ocr_par' id='par_1_2' title="bbox 10 100 200 130">
   <span class='ocr_line' id='line_1_2' title="bbox 10 100 200 130">
    <span class='ocrx_word' id='word_1_4' title='bbox 10 100 90 130; x_wconf 88'>Second</span>
   </span>
  </p>
 </div>
</div>
</body>"#;

    #[test]
    fn hocr_tree_maps_to_blocks_and_paragraphs() {
        let pages = parse_hocr_pages(SAMPLE);
        assert_eq!(pages.len(), 1);
        let blocks = &pages[0].blocks;
        assert_eq!(blocks.len(), 2);

        let words = &blocks[0].paragraphs[0].words;
        let texts = words.iter().map(DocumentWord::text).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Hello", "Tom&Jerry"]);
        assert_eq!(words[0].vertices[0], Vertex { x: 10, y: 10 });
        assert_eq!(words[0].vertices[2], Vertex { x: 60, y: 30 });
        assert_eq!(words[0].confidence, Some(0.96));

        assert_eq!(blocks[1].paragraphs[0].words[0].text(), "Second");
    }

    #[test]
    fn orphan_words_get_implicit_parents() {
        let hocr = "<span class='ocrx_word' title='bbox 1 2 11 12; x_wconf 90'>lone</span>";
        let pages = parse_hocr_pages(hocr);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].blocks[0].paragraphs[0].words[0].text(), "lone");
    }

    #[test]
    fn empty_document_has_no_pages() {
        assert!(parse_hocr_pages("").is_empty());
        assert!(parse_hocr_pages("<html><body></body></html>").is_empty());
    }
}

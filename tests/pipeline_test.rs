//! End-to-end tests for the structuring pipeline.

use std::io::Write;

use pagemd::{
    convert, convert_file, structure, Block, BoundingBox, CancellationToken, ColumnAlignment,
    ConvertOptions, DocumentNode, Error, Line, Page, Pipeline, RawDocument, Span,
};

const BODY: f32 = 11.0;

fn line(text: &str, size: f32, x0: f32, y: f32) -> Line {
    Line::new(vec![Span::new(
        text,
        "Times-Roman",
        size,
        BoundingBox::new(x0, y, x0 + text.chars().count() as f32 * size * 0.5, y + size),
    )])
}

fn block(lines: &[&str], size: f32, y: f32) -> Block {
    Block::new(
        lines
            .iter()
            .enumerate()
            .map(|(i, t)| line(t, size, 72.0, y + i as f32 * size * 1.2))
            .collect(),
    )
}

fn page(number: u32, blocks: Vec<Block>) -> Page {
    let mut page = Page::letter(number);
    page.blocks = blocks;
    page
}

fn single_page(blocks: Vec<Block>) -> RawDocument {
    RawDocument::from_pages(vec![page(1, blocks)])
}

fn markdown(doc: &RawDocument, options: &ConvertOptions) -> String {
    convert(doc, options).unwrap().markdown
}

const PROSE: &str = "This paragraph is long enough that it is never treated as an orphan line.";

#[test]
fn test_bullet_scenario() {
    let doc = single_page(vec![block(
        &["• First bullet point", "• Second bullet point"],
        BODY,
        100.0,
    )]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "- First bullet point\n- Second bullet point\n"
    );
}

#[test]
fn test_math_scenario() {
    let doc = single_page(vec![block(&["E = mc²"], BODY, 100.0)]);
    let structured = structure(&doc, &ConvertOptions::default()).unwrap();
    assert_eq!(
        structured.nodes,
        vec![DocumentNode::equation("E = mc^{2}", false)]
    );
    assert_eq!(markdown(&doc, &ConvertOptions::default()), "$E = mc^{2}$\n");
}

#[test]
fn test_table_scenario() {
    let doc = single_page(vec![block(
        &["Name   Age   City", "Alice  30    New York", "Bob    25    London"],
        BODY,
        100.0,
    )]);
    let structured = structure(&doc, &ConvertOptions::default()).unwrap();
    let tables: Vec<_> = structured.tables().collect();
    assert_eq!(tables.len(), 1);
    let table = tables[0];
    assert_eq!(table.header().unwrap(), ["Name", "Age", "City"]);
    assert_eq!(table.body().len(), 2);
    assert_eq!(table.column_alignment[1], ColumnAlignment::Right);

    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "| Name | Age | City |\n| :--- | ---: | :--- |\n| Alice | 30 | New York |\n| Bob | 25 | London |\n"
    );
}

#[test]
fn test_hyphen_unwrap_across_lines() {
    let doc = single_page(vec![block(
        &[
            "The pipeline will trans-",
            "form the extracted text into a well-",
            "deserved structure for the reader.",
        ],
        BODY,
        100.0,
    )]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "The pipeline will transform the extracted text into a welldeserved structure for the reader.\n"
    );
}

#[test]
fn test_hyphen_kept_before_acronym_continuation() {
    let doc = single_page(vec![block(
        &["This sentence discusses the pre-", "NATO period of European history in detail."],
        BODY,
        100.0,
    )]);
    let out = markdown(&doc, &ConvertOptions::default().with_aggressive_hyphen(true));
    assert!(out.contains("pre-NATO"), "{}", out);
}

#[test]
fn test_headings_ranked_document_wide() {
    let doc = RawDocument::from_pages(vec![
        page(
            1,
            vec![
                block(&["Report Title"], 22.0, 60.0),
                block(&[PROSE, PROSE], BODY, 120.0),
            ],
        ),
        page(
            2,
            vec![
                block(&["Background"], 15.0, 60.0),
                block(&[PROSE, PROSE], BODY, 120.0),
            ],
        ),
    ]);
    let structured = structure(&doc, &ConvertOptions::default()).unwrap();
    let headings: Vec<(u8, &str)> = structured.headings().collect();
    assert_eq!(headings, vec![(1, "Report Title"), (2, "Background")]);
}

#[test]
fn test_heading_monotonicity() {
    let doc = single_page(vec![
        block(&["larger heading"], 20.0, 40.0),
        block(&["medium heading"], 14.0, 80.0),
        block(&["small heading"], 12.5, 110.0),
        block(&[PROSE, PROSE, PROSE], BODY, 140.0),
        block(&[PROSE, PROSE, PROSE], BODY, 200.0),
    ]);
    let mut previous = usize::MAX;
    for ratio in [1.05, 1.15, 1.3, 1.5, 2.0] {
        let options = ConvertOptions::default().with_heading_size_ratio(ratio);
        let count = structure(&doc, &options).unwrap().headings().count();
        assert!(count <= previous, "ratio {} gave {} headings", ratio, count);
        previous = count;
    }
}

#[test]
fn test_footer_removed_from_every_page() {
    let topics = ["apples", "bridges", "comets", "deserts", "engines"];
    let pages: Vec<Page> = topics
        .iter()
        .enumerate()
        .map(|(i, topic)| {
            let n = i as u32 + 1;
            let body = format!("This page talks at some length about {} and nothing else.", topic);
            page(
                n,
                vec![
                    block(&[body.as_str(), PROSE], BODY, 100.0),
                    block(&[format!("Page {} of 5", n).as_str()], 9.0, 750.0),
                ],
            )
        })
        .collect();
    let doc = RawDocument::from_pages(pages);

    let out = markdown(&doc, &ConvertOptions::default());
    assert!(!out.contains("of 5"), "{}", out);
    for topic in topics {
        assert!(out.contains(topic));
    }

    let kept = markdown(&doc, &ConvertOptions::default().with_remove_headers_footers(false));
    assert!(kept.contains("Page 3 of 5"));
}

#[test]
fn test_page_breaks_rendered_when_enabled() {
    let doc = RawDocument::from_pages(vec![
        page(1, vec![block(&["first page text"], BODY, 100.0)]),
        page(2, vec![block(&["second page text"], BODY, 100.0)]),
    ]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "first page text\n\nsecond page text\n"
    );
    assert_eq!(
        markdown(&doc, &ConvertOptions::default().with_page_breaks(true)),
        "first page text\n\n---\n\nsecond page text\n"
    );
}

#[test]
fn test_bad_page_degrades_to_placeholder() {
    let mut broken = line("garbage", BODY, 72.0, 100.0);
    broken.spans[0].bbox.x1 = f32::INFINITY;
    let doc = RawDocument::from_pages(vec![
        page(1, vec![block(&["before"], BODY, 100.0)]),
        page(2, vec![Block::new(vec![broken])]),
        Page::failed(3, "renderer crashed"),
        page(4, vec![block(&["after"], BODY, 100.0)]),
    ]);
    let result = convert(&doc, &ConvertOptions::default()).unwrap();
    assert_eq!(
        result.markdown,
        "before\n\n<!-- page 2: malformed block geometry -->\n\n<!-- page 3: extraction failed: renderer crashed -->\n\nafter\n"
    );
    assert_eq!(result.stats.placeholder_count, 2);
}

#[test]
fn test_fatal_conditions() {
    let options = ConvertOptions::default();
    assert!(matches!(
        convert(&RawDocument::new(), &options),
        Err(Error::EmptyDocument)
    ));
    assert!(matches!(
        Pipeline::new(options).run_optional(None),
        Err(Error::MissingDocument)
    ));
}

#[test]
fn test_preview_only_first_three_pages() {
    let words = ["one", "two", "three", "four", "five"];
    let pages = words
        .iter()
        .enumerate()
        .map(|(i, w)| page(i as u32 + 1, vec![block(&[*w], BODY, 100.0)]))
        .collect();
    let doc = RawDocument::from_pages(pages);
    let out = markdown(&doc, &ConvertOptions::default().with_preview(true));
    assert_eq!(out, "one\n\ntwo\n\nthree\n");
}

#[test]
fn test_cancelled_before_start_returns_empty() {
    let token = CancellationToken::new();
    token.cancel();
    let conversion = Pipeline::new(ConvertOptions::default())
        .with_cancellation(token)
        .run(&single_page(vec![block(&[PROSE], BODY, 100.0)]))
        .unwrap();
    assert!(conversion.cancelled);
    assert!(conversion.document.is_empty());
}

#[test]
fn test_images_in_manifest() {
    let doc = RawDocument::from_pages(vec![
        page(
            1,
            vec![
                block(&[PROSE], BODY, 100.0),
                Block::image("p1_fig.png", BoundingBox::new(72.0, 200.0, 400.0, 500.0)),
            ],
        ),
        page(
            2,
            vec![Block::image("p2_fig.png", BoundingBox::new(72.0, 100.0, 400.0, 300.0))],
        ),
    ]);
    let result = convert(&doc, &ConvertOptions::default().with_images(true)).unwrap();
    assert_eq!(result.images[&1], vec!["assets/p1_fig.png".to_string()]);
    assert_eq!(result.images[&2], vec!["assets/p2_fig.png".to_string()]);
    assert!(result.markdown.contains("![p1-1](assets/p1_fig.png)"));

    let without = convert(&doc, &ConvertOptions::default()).unwrap();
    assert!(without.images.is_empty());
    assert!(!without.markdown.contains("!["));
}

#[test]
fn test_code_fence_spanning_blocks() {
    let doc = single_page(vec![
        block(&["```python", "def f(x):"], BODY, 100.0),
        block(&["    return x  *  2", "```"], BODY, 140.0),
    ]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "```python\ndef f(x):\n    return x  *  2\n```\n"
    );
}

#[test]
fn test_callout() {
    let doc = single_page(vec![block(
        &["Tip:", "Keep the raw geometry around for debugging."],
        BODY,
        100.0,
    )]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "> [!tip] Tip\n> Keep the raw geometry around for debugging.\n"
    );
}

#[test]
fn test_ligatures_and_quotes_cleaned() {
    let doc = single_page(vec![block(
        &["The e\u{FB03}cient \u{201C}o\u{FB04}ine\u{201D} mode is the default one."],
        BODY,
        100.0,
    )]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "The efficient \"offline\" mode is the default one.\n"
    );
}

#[test]
fn test_double_spaced_prose_stays_paragraph() {
    let doc = single_page(vec![block(
        &[
            "The committee reviewed  the proposal in detail and",
            "then decided  to postpone the final vote until spring.",
        ],
        BODY,
        100.0,
    )]);
    let md = markdown(&doc, &ConvertOptions::default());
    assert!(!md.contains('|'), "{}", md);
    assert_eq!(
        md,
        "The committee reviewed the proposal in detail and then decided to postpone the final vote until spring.\n"
    );
}

#[test]
fn test_bold_span_emphasized() {
    let span = |text: &str, font: &str, x0: f32| {
        Span::new(
            text,
            font,
            BODY,
            BoundingBox::new(x0, 100.0, x0 + text.chars().count() as f32 * 5.5, 100.0 + BODY),
        )
    };
    let line = Line::new(vec![
        span("This paragraph has an", "Times-Roman", 72.0),
        span("important", "Times-Bold", 192.5),
        span("word that the reader should notice.", "Times-Roman", 247.0),
    ]);
    let doc = single_page(vec![Block::new(vec![line])]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "This paragraph has an **important** word that the reader should notice.\n"
    );
}

#[test]
fn test_non_http_url_linked() {
    let doc = single_page(vec![block(
        &["Download the archive from ftp://files.example.org/pub/data.tar today please."],
        BODY,
        100.0,
    )]);
    assert_eq!(
        markdown(&doc, &ConvertOptions::default()),
        "Download the archive from [ftp://files.example.org/pub/data.tar](ftp://files.example.org/pub/data.tar) today please.\n"
    );
}

#[test]
fn test_two_columns_read_left_then_right() {
    let left = |text: &str, y: f32| {
        Block::new(vec![Line::new(vec![Span::new(
            text,
            "Times",
            BODY,
            BoundingBox::new(72.0, y, 280.0, y + BODY),
        )])])
    };
    let right = |text: &str, y: f32| {
        Block::new(vec![Line::new(vec![Span::new(
            text,
            "Times",
            BODY,
            BoundingBox::new(330.0, y, 540.0, y + BODY),
        )])])
    };
    let doc = single_page(vec![
        right("right column top", 100.0),
        left("left column top", 100.0),
        right("right column bottom", 300.0),
        left("left column bottom", 300.0),
    ]);
    let out = markdown(&doc, &ConvertOptions::default());
    let order: Vec<usize> = [
        "left column top",
        "left column bottom",
        "right column top",
        "right column bottom",
    ]
    .iter()
    .map(|s| out.find(s).unwrap())
    .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{}", out);
}

#[test]
fn test_convert_file_from_json() {
    let doc = single_page(vec![block(&["Hello from a file"], BODY, 100.0)]);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&doc).unwrap().as_bytes())
        .unwrap();

    let result = convert_file(file.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(result.markdown, "Hello from a file\n");
}

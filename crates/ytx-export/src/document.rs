//! Paginated PDF renderer.
//!
//! Text is laid out with glyph metrics from an embedded TrueType font and
//! serialized with `pdf-writer`. Each font is subset to the glyphs in use and
//! written as a Type0 font with Identity-H encoding plus a ToUnicode map, so
//! any script the font covers renders and stays searchable. The bundled font
//! is DejaVu Sans; `DocumentOptions::font` swaps in another face.
//!
//! Output depends only on the transcript and options: the creation date
//! comes from the transcript's retrieval time and no random file id is written.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Content, Date, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use sha2::{Digest, Sha256};
use ttf_parser::{name_id, Face, GlyphId};
use ytx_models::timestamp::format_hms;
use ytx_models::{ExportFormat, Transcript};

use crate::error::{RenderError, RenderResult};
use crate::options::DocumentOptions;

static REGULAR_FONT: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");
static BOLD_FONT: &[u8] = include_bytes!("../fonts/DejaVuSans-Bold.ttf");

const TITLE_SIZE_DELTA: f32 = 5.0;

const IDENTITY: SystemInfo<'static> = SystemInfo {
    registry: Str(b"Adobe"),
    ordering: Str(b"Identity"),
    supplement: 0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Regular,
    Bold,
}

impl Style {
    fn resource(self) -> Name<'static> {
        match self {
            Style::Regular => Name(b"F1"),
            Style::Bold => Name(b"F2"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    id: u16,
    /// Advance in points at the line's size
    width: f32,
}

/// One laid-out line.
#[derive(Debug)]
struct Line {
    style: Style,
    size: f32,
    glyphs: Vec<Glyph>,
}

impl Line {
    /// Two-byte glyph ids, as Identity-H expects.
    fn encoded(&self) -> Vec<u8> {
        self.glyphs.iter().flat_map(|g| g.id.to_be_bytes()).collect()
    }
}

type Page = Vec<(Line, f32)>;

/// A parsed font face plus the glyphs the document uses from it.
struct EmbeddedFont<'a> {
    data: &'a [u8],
    face: Face<'a>,
    units_per_em: f32,
    used: BTreeMap<u16, char>,
}

impl<'a> EmbeddedFont<'a> {
    fn parse(data: &'a [u8]) -> RenderResult<Self> {
        let face = Face::parse(data, 0).map_err(|e| {
            RenderError::new(ExportFormat::Document, format!("unusable font data: {}", e))
        })?;
        let units_per_em = face.units_per_em().max(1) as f32;
        Ok(Self {
            data,
            face,
            units_per_em,
            used: BTreeMap::new(),
        })
    }

    /// Map text to glyphs, recording each one for subsetting.
    fn shape(&mut self, text: &str, size: f32) -> RenderResult<Vec<Glyph>> {
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let id = match self.face.glyph_index(ch) {
                Some(id) if id.0 != 0 => id,
                _ => {
                    return Err(RenderError::new(
                        ExportFormat::Document,
                        format!(
                            "character '{}' (U+{:04X}) is not covered by the document font",
                            ch, ch as u32
                        ),
                    ))
                }
            };
            self.used.entry(id.0).or_insert(ch);
            glyphs.push(Glyph {
                id: id.0,
                width: self.advance(id) * size / 1000.0,
            });
        }
        Ok(glyphs)
    }

    /// Advance width in 1/1000 em.
    fn advance(&self, id: GlyphId) -> f32 {
        self.face.glyph_hor_advance(id).unwrap_or(0) as f32 * 1000.0 / self.units_per_em
    }

    fn scaled(&self, units: i16) -> f32 {
        units as f32 * 1000.0 / self.units_per_em
    }

    fn postscript_name(&self) -> String {
        self.face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .unwrap_or_else(|| "Embedded".to_string())
    }

    /// Glyph ids to keep in the subset; `.notdef` is always included.
    fn subset_glyphs(&self) -> Vec<u16> {
        std::iter::once(0).chain(self.used.keys().copied()).collect()
    }
}

struct Fonts<'a> {
    regular: EmbeddedFont<'a>,
    bold: EmbeddedFont<'a>,
}

impl<'a> Fonts<'a> {
    fn load(options: &'a DocumentOptions) -> RenderResult<Self> {
        let (regular, bold) = match &options.font {
            Some(font) => (font.bytes(), font.bytes()),
            None => (REGULAR_FONT, BOLD_FONT),
        };
        Ok(Self {
            regular: EmbeddedFont::parse(regular)?,
            bold: EmbeddedFont::parse(bold)?,
        })
    }

    fn get_mut(&mut self, style: Style) -> &mut EmbeddedFont<'a> {
        match style {
            Style::Regular => &mut self.regular,
            Style::Bold => &mut self.bold,
        }
    }
}

/// Render a transcript as a PDF document.
pub fn render(transcript: &Transcript, options: &DocumentOptions) -> RenderResult<Vec<u8>> {
    check_geometry(options)?;

    let mut fonts = Fonts::load(options)?;
    let title = options
        .title
        .clone()
        .unwrap_or_else(|| format!("Transcript {}", transcript.video_id));
    let pages = layout(transcript, options, &title, &mut fonts)?;
    write_pdf(&pages, &fonts, &title, transcript.retrieved_at, options)
}

fn check_geometry(options: &DocumentOptions) -> RenderResult<()> {
    let usable_width = options.page_width - 2.0 * options.margin;
    let usable_height = options.page_height - 2.0 * options.margin;
    let title_size = options.font_size + TITLE_SIZE_DELTA;

    let valid = options.font_size > 0.0
        && options.leading > 0.0
        && options.margin >= 0.0
        && usable_width >= title_size
        && usable_height >= title_size + options.leading;
    if valid {
        Ok(())
    } else {
        Err(RenderError::new(
            ExportFormat::Document,
            format!(
                "page geometry leaves no room for text (page {}x{}, margin {}, font {})",
                options.page_width, options.page_height, options.margin, options.font_size
            ),
        ))
    }
}

/// Header block and body paragraphs, wrapped and split into pages.
fn layout(
    transcript: &Transcript,
    options: &DocumentOptions,
    title: &str,
    fonts: &mut Fonts<'_>,
) -> RenderResult<Vec<Page>> {
    let text_width = options.page_width - 2.0 * options.margin;
    let title_size = options.font_size + TITLE_SIZE_DELTA;

    let mut lines = Vec::new();
    push_wrapped(&mut lines, fonts, title, Style::Bold, title_size, text_width)?;

    let kind = if transcript.is_auto_generated {
        "auto-generated"
    } else {
        "human"
    };
    let header = [
        format!("Video: {}", transcript.video_id),
        format!("Language: {} ({})", transcript.language_code, kind),
        format!("Words: {}", transcript.word_count()),
        format!("Duration: {}", format_hms(transcript.duration())),
    ];
    for entry in &header {
        push_wrapped(&mut lines, fonts, entry, Style::Regular, options.font_size, text_width)?;
    }
    lines.push(Line {
        style: Style::Regular,
        size: options.font_size,
        glyphs: Vec::new(),
    });

    for segment in &transcript.segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        let paragraph = if options.include_timestamps {
            format!("[{}] {}", format_hms(segment.start()), text)
        } else {
            text.to_string()
        };
        push_wrapped(&mut lines, fonts, &paragraph, Style::Regular, options.font_size, text_width)?;
    }

    Ok(paginate(lines, options))
}

/// Greedy word wrap. Words wider than a full line are split by character.
fn push_wrapped(
    lines: &mut Vec<Line>,
    fonts: &mut Fonts<'_>,
    text: &str,
    style: Style,
    size: f32,
    max_width: f32,
) -> RenderResult<()> {
    let font = fonts.get_mut(style);
    let space = font.shape(" ", size)?;
    let space_width: f32 = space.iter().map(|g| g.width).sum();

    let mut current: Vec<Glyph> = Vec::new();
    let mut current_width = 0.0;
    let mut flush = |current: &mut Vec<Glyph>, current_width: &mut f32| {
        lines.push(Line {
            style,
            size,
            glyphs: std::mem::take(current),
        });
        *current_width = 0.0;
    };

    for word in text.split_whitespace() {
        let glyphs = font.shape(word, size)?;
        let width: f32 = glyphs.iter().map(|g| g.width).sum();

        if !current.is_empty() && current_width + space_width + width <= max_width {
            current.extend_from_slice(&space);
            current.extend(glyphs);
            current_width += space_width + width;
            continue;
        }
        if !current.is_empty() {
            flush(&mut current, &mut current_width);
        }
        if width <= max_width {
            current = glyphs;
            current_width = width;
            continue;
        }

        for glyph in glyphs {
            if !current.is_empty() && current_width + glyph.width > max_width {
                flush(&mut current, &mut current_width);
            }
            current_width += glyph.width;
            current.push(glyph);
        }
    }

    if !current.is_empty() {
        flush(&mut current, &mut current_width);
    }
    Ok(())
}

/// Split lines into pages; each entry is (line, baseline y).
fn paginate(lines: Vec<Line>, options: &DocumentOptions) -> Vec<Page> {
    let top = options.page_height - options.margin;
    let bottom = options.margin;

    let mut pages = Vec::new();
    let mut page = Vec::new();
    let mut y = top;

    for line in lines {
        let step = if page.is_empty() { line.size } else { options.leading.max(line.size) };
        if !page.is_empty() && y - step < bottom {
            pages.push(std::mem::take(&mut page));
            y = top;
        }
        y -= if page.is_empty() { line.size } else { step };
        page.push((line, y));
    }

    if !page.is_empty() || pages.is_empty() {
        pages.push(page);
    }
    pages
}

fn content_stream(page: &[(Line, f32)], margin: f32) -> Vec<u8> {
    let mut content = Content::new();
    for (line, y) in page {
        if line.glyphs.is_empty() {
            continue;
        }
        content.begin_text();
        content.set_font(line.style.resource(), line.size);
        content.next_line(margin, *y);
        content.show(Str(&line.encoded()));
        content.end_text();
    }
    content.finish()
}

fn pdf_date(at: DateTime<Utc>) -> Date {
    Date::new(at.year().clamp(0, 9999) as u16)
        .month(at.month() as u8)
        .day(at.day() as u8)
        .hour(at.hour() as u8)
        .minute(at.minute() as u8)
        .second(at.second() as u8)
        .utc_offset_hour(0)
}

/// Six-letter subset prefix derived from the glyph set.
fn subset_tag(glyphs: &[u16]) -> String {
    let bytes: Vec<u8> = glyphs.iter().flat_map(|g| g.to_be_bytes()).collect();
    Sha256::digest(&bytes)
        .iter()
        .take(6)
        .map(|b| (b'A' + b % 26) as char)
        .collect()
}

/// Write one font as Type0 over a CIDFontType2 descendant.
fn write_font(pdf: &mut Pdf, alloc: &mut Ref, type0_ref: Ref, font: &EmbeddedFont<'_>) -> RenderResult<()> {
    let cid_ref = alloc.bump();
    let descriptor_ref = alloc.bump();
    let cmap_ref = alloc.bump();
    let data_ref = alloc.bump();

    let glyphs = font.subset_glyphs();
    let base_font = format!("{}+{}", subset_tag(&glyphs), font.postscript_name());
    let subset = subsetter::subset(font.data, 0, subsetter::Profile::pdf(&glyphs)).map_err(|e| {
        RenderError::new(ExportFormat::Document, format!("font subsetting failed: {:?}", e))
    })?;

    pdf.type0_font(type0_ref)
        .base_font(Name(base_font.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_ref)
        .to_unicode(cmap_ref);

    let mut cid = pdf.cid_font(cid_ref);
    cid.subtype(CidFontType::Type2);
    cid.base_font(Name(base_font.as_bytes()));
    cid.system_info(IDENTITY);
    cid.font_descriptor(descriptor_ref);
    cid.default_width(0.0);
    cid.cid_to_gid_map_predefined(Name(b"Identity"));
    {
        let mut widths = cid.widths();
        for id in font.used.keys() {
            widths.consecutive(*id, [font.advance(GlyphId(*id))]);
        }
    }
    cid.finish();

    let bbox = font.face.global_bounding_box();
    let ascender = font.face.ascender();
    pdf.font_descriptor(descriptor_ref)
        .name(Name(base_font.as_bytes()))
        .flags(FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(
            font.scaled(bbox.x_min),
            font.scaled(bbox.y_min),
            font.scaled(bbox.x_max),
            font.scaled(bbox.y_max),
        ))
        .italic_angle(0.0)
        .ascent(font.scaled(ascender))
        .descent(font.scaled(font.face.descender()))
        .cap_height(font.scaled(font.face.capital_height().unwrap_or(ascender)))
        .stem_v(80.0)
        .font_file2(data_ref);

    let mut cmap = UnicodeCmap::new(Name(b"Custom"), IDENTITY);
    for (id, ch) in &font.used {
        cmap.pair(*id, *ch);
    }
    pdf.cmap(cmap_ref, &cmap.finish());

    pdf.stream(data_ref, &subset)
        .pair(Name(b"Length1"), subset.len() as i32);
    Ok(())
}

fn write_pdf(
    pages: &[Page],
    fonts: &Fonts<'_>,
    title: &str,
    created: DateTime<Utc>,
    options: &DocumentOptions,
) -> RenderResult<Vec<u8>> {
    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let tree_id = alloc.bump();
    let info_id = alloc.bump();
    let regular_id = alloc.bump();
    let bold_id = alloc.bump();
    let page_ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (alloc.bump(), alloc.bump())).collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(page_ids.iter().map(|(page, _)| *page))
        .count(page_ids.len() as i32);
    pdf.document_info(info_id)
        .title(TextStr(title))
        .producer(TextStr("ytx"))
        .creation_date(pdf_date(created));

    for (page, (page_id, content_id)) in pages.iter().zip(&page_ids) {
        let mut writer = pdf.page(*page_id);
        writer.media_box(Rect::new(0.0, 0.0, options.page_width, options.page_height));
        writer.parent(tree_id);
        writer.contents(*content_id);
        writer
            .resources()
            .fonts()
            .pair(Style::Regular.resource(), regular_id)
            .pair(Style::Bold.resource(), bold_id);
        writer.finish();

        pdf.stream(*content_id, &content_stream(page, options.margin));
    }

    write_font(&mut pdf, &mut alloc, regular_id, &fonts.regular)?;
    write_font(&mut pdf, &mut alloc, bold_id, &fonts.bold)?;

    Ok(pdf.finish())
}

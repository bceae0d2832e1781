
use serde::{Deserialize, Serialize};

pub const UNTITLED: &str = "Untitled";

/// Metadata slot a header marker writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKey {
    Header1,
    Header2,
    Header3,
    Header4,
}

struct HeaderMarker {
    prefix: &'static str,
    level: u8,
    key: HeaderKey,
}

/// Recognized markers, longest first so `#####` is tried before `#`.
///
/// Level 5 writes into the level 4 slot. Campaign notes indexed before this
/// crate existed rely on that mapping, so it is kept as is.
static HEADER_MARKERS: [HeaderMarker; 5] = [
    HeaderMarker {
        prefix: "#####",
        level: 5,
        key: HeaderKey::Header4,
    },
    HeaderMarker {
        prefix: "####",
        level: 4,
        key: HeaderKey::Header4,
    },
    HeaderMarker {
        prefix: "###",
        level: 3,
        key: HeaderKey::Header3,
    },
    HeaderMarker {
        prefix: "##",
        level: 2,
        key: HeaderKey::Header2,
    },
    HeaderMarker {
        prefix: "#",
        level: 1,
        key: HeaderKey::Header1,
    },
];

/// The enclosing headers of a segment, one optional label per level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPath {
    #[serde(rename = "Header 1", default, skip_serializing_if = "Option::is_none")]
    pub header_1: Option<String>,
    #[serde(rename = "Header 2", default, skip_serializing_if = "Option::is_none")]
    pub header_2: Option<String>,
    #[serde(rename = "Header 3", default, skip_serializing_if = "Option::is_none")]
    pub header_3: Option<String>,
    #[serde(rename = "Header 4", default, skip_serializing_if = "Option::is_none")]
    pub header_4: Option<String>,
}

impl HeaderPath {
    #[inline]
    pub fn title(&self) -> &str {
        self.header_1.as_deref().unwrap_or(UNTITLED)
    }

    #[inline]
    pub fn section(&self) -> &str {
        self.header_2.as_deref().unwrap_or(UNTITLED)
    }

    #[inline]
    pub fn subsection(&self) -> &str {
        self.header_3.as_deref().unwrap_or(UNTITLED)
    }

    /// Number of levels that carry a label
    #[inline]
    pub fn depth(&self) -> usize {
        [
            &self.header_1,
            &self.header_2,
            &self.header_3,
            &self.header_4,
        ]
        .iter()
        .filter(|h| h.is_some())
        .count()
    }

    fn slot(&mut self, key: HeaderKey) -> &mut Option<String> {
        match key {
            HeaderKey::Header1 => &mut self.header_1,
            HeaderKey::Header2 => &mut self.header_2,
            HeaderKey::Header3 => &mut self.header_3,
            HeaderKey::Header4 => &mut self.header_4,
        }
    }
}

/// A span of a document between header changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position within the source document, starting at 0
    pub ordinal: usize,
    pub headers: HeaderPath,
    /// Raw text including the header lines that open it
    pub body: String,
}

#[derive(Debug)]
struct LineGroup {
    content: String,
    headers: HeaderPath,
}

/// Split markdown text into header-scoped segments.
///
/// Header lines stay in the segment text. Lines inside fenced code blocks are
/// never treated as headers.
#[inline]
pub fn split_markdown(text: &str) -> Vec<Segment> {
    let groups = collect_line_groups(text);

    aggregate_groups(groups)
        .into_iter()
        .enumerate()
        .map(|(ordinal, group)| Segment {
            ordinal,
            headers: group.headers,
            body: group.content,
        })
        .collect()
}

fn collect_line_groups(text: &str) -> Vec<LineGroup> {
    let mut groups = Vec::new();
    let mut current_content: Vec<String> = Vec::new();
    let mut header_stack: Vec<(u8, HeaderKey)> = Vec::new();
    let mut active = HeaderPath::default();
    let mut fence: Option<&'static str> = None;

    for raw_line in text.split('\n') {
        let printable: String = raw_line.chars().filter(|c| is_printable(*c)).collect();
        let line = printable.trim().to_string();

        match fence {
            None => {
                if line.starts_with("```") && line.matches("```").count() == 1 {
                    fence = Some("```");
                } else if line.starts_with("~~~") {
                    fence = Some("~~~");
                }
            }
            Some(marker) => {
                if line.starts_with(marker) {
                    fence = None;
                }
            }
        }

        if fence.is_some() {
            current_content.push(line);
            continue;
        }

        if let Some(marker) = match_header(&line) {
            flush_group(&mut groups, &mut current_content, &active);

            while let Some(&(level, key)) = header_stack.last() {
                if level < marker.level {
                    break;
                }
                header_stack.pop();
                *active.slot(key) = None;
            }

            let label = line
                .strip_prefix(marker.prefix)
                .unwrap_or_default()
                .trim()
                .to_string();
            header_stack.push((marker.level, marker.key));
            *active.slot(marker.key) = Some(label);

            current_content.push(line);
        } else if !line.is_empty() {
            current_content.push(line);
        } else {
            flush_group(&mut groups, &mut current_content, &active);
        }
    }

    flush_group(&mut groups, &mut current_content, &active);
    groups
}

/// Control and format characters (byte-order marks, zero-width and
/// bidi marks) and every separator except the ASCII space are dropped.
fn is_printable(c: char) -> bool {
    if c.is_ascii() {
        return !c.is_ascii_control();
    }

    !(c.is_control() || c.is_whitespace() || is_format_char(c))
}

fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00ad}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061c}'
            | '\u{06dd}'
            | '\u{070f}'
            | '\u{180e}'
            | '\u{200b}'..='\u{200f}'
            | '\u{202a}'..='\u{202e}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206f}'
            | '\u{feff}'
            | '\u{fff9}'..='\u{fffb}'
    )
}

fn match_header(line: &str) -> Option<&'static HeaderMarker> {
    HEADER_MARKERS.iter().find(|marker| {
        line.starts_with(marker.prefix)
            && matches!(line.as_bytes().get(marker.prefix.len()), None | Some(b' '))
    })
}

fn flush_group(groups: &mut Vec<LineGroup>, content: &mut Vec<String>, headers: &HeaderPath) {
    if content.is_empty() {
        return;
    }

    groups.push(LineGroup {
        content: content.join("\n"),
        headers: headers.clone(),
    });
    content.clear();
}

/// Merge groups that share headers, and fold a group into a preceding
/// header-only group of shallower depth.
fn aggregate_groups(groups: Vec<LineGroup>) -> Vec<LineGroup> {
    let mut aggregated: Vec<LineGroup> = Vec::new();

    for group in groups {
        match aggregated.last_mut() {
            Some(last) if last.headers == group.headers => {
                last.content.push_str("  \n");
                last.content.push_str(&group.content);
            }
            Some(last)
                if last.headers.depth() < group.headers.depth() && ends_with_header(&last.content) =>
            {
                last.content.push_str("  \n");
                last.content.push_str(&group.content);
                last.headers = group.headers;
            }
            _ => aggregated.push(group),
        }
    }

    aggregated
}

fn ends_with_header(content: &str) -> bool {
    content
        .rsplit('\n')
        .next()
        .is_some_and(|line| line.starts_with('#'))
}

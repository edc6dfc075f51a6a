//! Font-aware decoding of string operands.
//!
//! A font's `/ToUnicode` CMap wins when present. Otherwise the named
//! `/Encoding` (or the `/BaseEncoding` of an encoding dictionary) is decoded
//! through lopdf. Strings shown with a font missing from the page resources
//! fall back to single-byte Latin-1.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Single-byte encodings lopdf can map to Unicode.
const SIMPLE_ENCODINGS: [&str; 4] =
    ["StandardEncoding", "MacRomanEncoding", "MacExpertEncoding", "WinAnsiEncoding"];

/// Upper bound on the codes expanded from one `bfrange` entry.
const MAX_RANGE_CODES: u32 = 0x1_0000;

/// Decoders keyed by font resource name (`/F1`).
pub(crate) type PageFonts = HashMap<Vec<u8>, FontDecoder>;

#[derive(Debug, Clone, Default)]
pub(crate) struct FontDecoder {
    encoding: Option<String>,
    to_unicode: Option<ToUnicodeCMap>,
}

impl FontDecoder {
    fn from_font(document: &Document, font: &Dictionary) -> Self {
        Self { encoding: font_encoding(document, font), to_unicode: to_unicode(document, font) }
    }

    #[cfg(test)]
    pub(crate) fn from_cmap(cmap: ToUnicodeCMap) -> Self {
        Self { encoding: None, to_unicode: Some(cmap) }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> String {
        if let Some(utf16) = decode_utf16(bytes) {
            return utf16;
        }

        if let Some(cmap) = &self.to_unicode {
            return cmap.decode(bytes);
        }

        match self.encoding.as_deref() {
            Some(encoding) if SIMPLE_ENCODINGS.contains(&encoding) => {
                Document::decode_text(Some(encoding), bytes)
            }
            _ => decode_latin1(bytes),
        }
    }
}

/// Decode a string operand shown without a resolvable font.
pub(crate) fn decode_plain(bytes: &[u8]) -> String {
    decode_utf16(bytes).unwrap_or_else(|| decode_latin1(bytes))
}

/// Build decoders for every font in the page's resources, inherited ones
/// included.
pub(crate) fn page_fonts(document: &Document, page_id: ObjectId) -> PageFonts {
    document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, FontDecoder::from_font(document, font)))
        .collect()
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let rest = bytes.strip_prefix(&[0xFE, 0xFF])?;
    let units: Vec<u16> =
        rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
    Some(String::from_utf16_lossy(&units))
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| byte as char).collect()
}

/// Type1 and TrueType fonts without `/Encoding` use the standard encoding.
fn font_encoding(document: &Document, font: &Dictionary) -> Option<String> {
    let Ok(encoding) = font.get_deref(b"Encoding", document) else {
        let subtype = font.get(b"Subtype").and_then(Object::as_name);
        let simple = matches!(subtype, Ok(b"Type1" | b"TrueType"));
        return simple.then(|| "StandardEncoding".to_owned());
    };

    match encoding {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Dictionary(dict) => Some(
            dict.get(b"BaseEncoding")
                .and_then(Object::as_name_str)
                .unwrap_or("StandardEncoding")
                .to_owned(),
        ),
        _ => None,
    }
}

fn to_unicode(document: &Document, font: &Dictionary) -> Option<ToUnicodeCMap> {
    let stream = font.get_deref(b"ToUnicode", document).ok()?.as_stream().ok()?;

    let data = if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content().ok()?
    } else {
        stream.content.clone()
    };

    let cmap = ToUnicodeCMap::parse(&data);
    if cmap.map.is_empty() {
        log::debug!("ignoring empty ToUnicode CMap");
        return None;
    }
    Some(cmap)
}

/// The `bfchar`/`bfrange` part of a ToUnicode CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ToUnicodeCMap {
    code_len: usize,
    map: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Keyword(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Codespace,
    Char,
    Range,
}

impl ToUnicodeCMap {
    pub(crate) fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = Self::default();
        let mut section = Section::None;
        let mut index = 0;

        while index < tokens.len() {
            match &tokens[index] {
                Token::Keyword(keyword) => {
                    section = match keyword.as_str() {
                        "begincodespacerange" => Section::Codespace,
                        "beginbfchar" => Section::Char,
                        "beginbfrange" => Section::Range,
                        _ => Section::None,
                    };
                    index += 1;
                }
                Token::Hex(first) => {
                    index += 1;
                    match section {
                        Section::Codespace => {
                            if cmap.code_len == 0 {
                                cmap.code_len = first.len();
                            }
                            index += 1;
                        }
                        Section::Char => {
                            if let Some(Token::Hex(dst)) = tokens.get(index) {
                                cmap.insert(first, utf16_be(dst));
                                index += 1;
                            }
                        }
                        Section::Range => {
                            let Some(Token::Hex(last)) = tokens.get(index) else {
                                continue;
                            };
                            index += 1;
                            index = cmap.insert_range(first, last, &tokens, index);
                        }
                        Section::None => {}
                    }
                }
                _ => index += 1,
            }
        }

        if cmap.code_len == 0 {
            cmap.code_len = 1;
        }
        cmap
    }

    fn insert(&mut self, code: &[u8], text: String) {
        if self.code_len == 0 {
            self.code_len = code.len();
        }
        self.map.insert(code_value(code), text);
    }

    /// Consume the destination of a `bfrange` entry starting at `index`.
    fn insert_range(&mut self, first: &[u8], last: &[u8], tokens: &[Token], index: usize) -> usize {
        let start = code_value(first);
        let end = code_value(last).min(start.saturating_add(MAX_RANGE_CODES - 1));
        if self.code_len == 0 {
            self.code_len = first.len();
        }

        match tokens.get(index) {
            Some(Token::Hex(dst)) => {
                let base: Vec<u16> = dst
                    .chunks(2)
                    .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
                    .collect();

                for (offset, code) in (start..=end).enumerate() {
                    let mut units = base.clone();
                    if let Some(last_unit) = units.last_mut() {
                        *last_unit = last_unit.wrapping_add(offset as u16);
                    }
                    self.map.insert(code, String::from_utf16_lossy(&units));
                }
                index + 1
            }
            Some(Token::ArrayStart) => {
                let mut index = index + 1;
                let mut code = start;
                while let Some(Token::Hex(dst)) = tokens.get(index) {
                    if code <= end {
                        self.map.insert(code, utf16_be(dst));
                    }
                    code = code.saturating_add(1);
                    index += 1;
                }
                if tokens.get(index) == Some(&Token::ArrayEnd) {
                    index += 1;
                }
                index
            }
            _ => index,
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .chunks(self.code_len.max(1))
            .map(|code| match self.map.get(&code_value(code)) {
                Some(text) => text.clone(),
                None if code.len() == 1 => (code[0] as char).to_string(),
                None => char::REPLACEMENT_CHARACTER.to_string(),
            })
            .collect()
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0, |value, &byte| (value << 8) | u32::from(byte))
}

fn utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < data.len() {
        let byte = data[index];
        match byte {
            b'<' if data.get(index + 1) == Some(&b'<') => index += 2,
            b'>' if data.get(index + 1) == Some(&b'>') => index += 2,
            b'<' => {
                let end = data[index..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map_or(data.len(), |offset| index + offset);
                let digits: Vec<u8> =
                    data[index + 1..end].iter().copied().filter(u8::is_ascii_hexdigit).collect();
                tokens.push(Token::Hex(hex_bytes(&digits)));
                index = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                index += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                index += 1;
            }
            b'%' => {
                while index < data.len() && data[index] != b'\n' && data[index] != b'\r' {
                    index += 1;
                }
            }
            b'(' => {
                // Literal strings only appear in the CMap header.
                while index < data.len() && data[index] != b')' {
                    index += 1;
                }
                index += 1;
            }
            _ if byte.is_ascii_alphabetic() => {
                let start = index;
                while index < data.len() && data[index].is_ascii_alphanumeric() {
                    index += 1;
                }
                let keyword = String::from_utf8_lossy(&data[start..index]).into_owned();
                tokens.push(Token::Keyword(keyword));
            }
            _ => index += 1,
        }
    }

    tokens
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let value = |digit: u8| match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    };

    digits
        .chunks(2)
        .map(|pair| (value(pair[0]) << 4) | pair.get(1).map_or(0, |&low| value(low)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <20AC>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<0066006C> <0078>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

    #[test]
    fn cmap_maps_chars_and_ranges() {
        let cmap = ToUnicodeCMap::parse(IDENTITY_CMAP);
        assert_eq!(cmap.code_len, 2);

        let shown = [0x00, 0x24, 0x00, 0x26, 0x00, 0x03, 0x00, 0x11, 0x00, 0x30, 0x00, 0x31];
        assert_eq!(cmap.decode(&shown), "AC €flx");
    }

    #[test]
    fn unknown_two_byte_codes_become_replacement_chars() {
        let cmap = ToUnicodeCMap::parse(IDENTITY_CMAP);
        assert_eq!(cmap.decode(&[0x00, 0x24, 0x7F, 0x7F]), "A\u{FFFD}");
    }

    #[test]
    fn win_ansi_decoder_maps_euro_sign() {
        let decoder =
            FontDecoder { encoding: Some("WinAnsiEncoding".to_owned()), to_unicode: None };
        assert_eq!(decoder.decode(b"Total 250 \x80"), "Total 250 €");
    }

    #[test]
    fn to_unicode_wins_over_encoding() {
        let decoder = FontDecoder {
            encoding: Some("WinAnsiEncoding".to_owned()),
            to_unicode: Some(ToUnicodeCMap::parse(b"1 beginbfchar <41> <0042> endbfchar")),
        };
        assert_eq!(decoder.decode(b"A"), "B");
    }

    #[test]
    fn plain_strings_decode_utf16_and_latin1() {
        assert_eq!(decode_plain(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0xE9]), "Hé");
        assert_eq!(decode_plain(b"caf\xE9"), "café");
    }
}

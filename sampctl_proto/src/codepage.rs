//! Text fields of every message and of the favourites file are
//! encoded in Windows-1251, never UTF-8.

use std::borrow::Cow;

use encoding_rs::WINDOWS_1251;

/// Decodes Windows-1251 bytes into text.
///
/// Every byte maps to some character in this codepage, so decoding never fails.
pub fn decode(bytes: &[u8]) -> String {
    let (text, _) = WINDOWS_1251.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Encodes text into Windows-1251 bytes.
///
/// Characters outside the codepage are replaced by numeric character
/// references, the way `encoding_rs` handles unmappables.
pub fn encode(text: &str) -> Cow<'_, [u8]> {
    let (bytes, _, had_errors) = WINDOWS_1251.encode(text);
    if had_errors {
        log::trace!("Unmappable characters replaced while encoding {:?}", text);
    }
    bytes
}

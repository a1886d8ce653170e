use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Decode a listing or detail page to UTF-8.
///
/// Order: BOM, then the Content-Type charset, then chardetng. Malformed
/// sequences are replaced rather than rejected; a half-decoded listing still
/// yields usable links.
pub(crate) fn decode_page(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| {
            content_type
                .and_then(charset_label)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        engine_logging::engine_debug!("page decoded with replacements as {}", encoding.name());
    }
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::{charset_label, decode_page};

    #[test]
    fn charset_is_read_case_insensitively() {
        assert_eq!(
            charset_label("text/html; Charset=\"windows-1256\"").as_deref(),
            Some("windows-1256")
        );
        assert_eq!(charset_label("text/html"), None);
    }

    #[test]
    fn header_charset_decodes_legacy_arabic() {
        // "فصل" in windows-1256
        let bytes = [0xDD, 0xD5, 0xE1];
        let text = decode_page(&bytes, Some("text/html; charset=windows-1256"));
        assert_eq!(text, "فصل");
    }

    #[test]
    fn utf8_bom_wins_over_header() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("ok".as_bytes());
        assert_eq!(decode_page(&bytes, Some("text/html; charset=latin1")), "ok");
    }
}

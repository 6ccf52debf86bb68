//! Shift-JIS text handling.
//!
//! All record bytes arrive encoded as Shift-JIS with Windows code page 932
//! semantics (the upstream feed uses the vendor extensions). Decoding never
//! fails: malformed sequences become replacement characters so a single bad
//! byte cannot take down a whole record batch.
//!
//! `normalize` folds the two width quirks of the feed: half-width katakana
//! becomes full-width, and full-width ASCII digits/letters become half-width.
//! Everything else passes through untouched.

use encoding::all::WINDOWS_31J;
use encoding::{DecoderTrap, EncoderTrap, Encoding};

/// Decode Shift-JIS (CP932) bytes into a `String`.
///
/// Malformed input yields replacement characters, never an error.
pub fn decode(bytes: &[u8]) -> String {
    match WINDOWS_31J.decode(bytes, DecoderTrap::Replace) {
        Ok(s) => s,
        // Replace-trap decoding is total; this arm keeps the function total
        // even if the codec surface changes underneath us.
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Encode a `String` into Shift-JIS (CP932) bytes.
///
/// Unmappable characters are replaced rather than rejected.
pub fn encode(s: &str) -> Vec<u8> {
    match WINDOWS_31J.encode(s, EncoderTrap::Replace) {
        Ok(bytes) => bytes,
        Err(_) => s.bytes().filter(u8::is_ascii).collect(),
    }
}

/// Width-normalise a decoded string.
///
/// Half-width katakana (U+FF61..U+FF9F, including the combining voiced and
/// semi-voiced sound marks) maps to full-width katakana; full-width ASCII
/// digits and letters map to half-width. The function is a fixpoint:
/// `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        // Full-width ASCII digits/letters -> half-width.
        if matches!(c, '\u{FF10}'..='\u{FF19}' | '\u{FF21}'..='\u{FF3A}' | '\u{FF41}'..='\u{FF5A}')
        {
            out.push(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c));
            continue;
        }
        match fullwidth_kana(c) {
            Some(fw) => match chars.peek() {
                Some('\u{FF9E}') => match voiced(fw) {
                    Some(v) => {
                        chars.next();
                        out.push(v);
                    }
                    None => out.push(fw),
                },
                Some('\u{FF9F}') => match semi_voiced(fw) {
                    Some(v) => {
                        chars.next();
                        out.push(v);
                    }
                    None => out.push(fw),
                },
                _ => out.push(fw),
            },
            None => out.push(c),
        }
    }
    out
}

/// Map a half-width katakana code point to its plain full-width form.
fn fullwidth_kana(c: char) -> Option<char> {
    let fw = match c {
        '｡' => '。',
        '｢' => '「',
        '｣' => '」',
        '､' => '、',
        '･' => '・',
        'ｦ' => 'ヲ',
        'ｧ' => 'ァ',
        'ｨ' => 'ィ',
        'ｩ' => 'ゥ',
        'ｪ' => 'ェ',
        'ｫ' => 'ォ',
        'ｬ' => 'ャ',
        'ｭ' => 'ュ',
        'ｮ' => 'ョ',
        'ｯ' => 'ッ',
        'ｰ' => 'ー',
        'ｱ' => 'ア',
        'ｲ' => 'イ',
        'ｳ' => 'ウ',
        'ｴ' => 'エ',
        'ｵ' => 'オ',
        'ｶ' => 'カ',
        'ｷ' => 'キ',
        'ｸ' => 'ク',
        'ｹ' => 'ケ',
        'ｺ' => 'コ',
        'ｻ' => 'サ',
        'ｼ' => 'シ',
        'ｽ' => 'ス',
        'ｾ' => 'セ',
        'ｿ' => 'ソ',
        'ﾀ' => 'タ',
        'ﾁ' => 'チ',
        'ﾂ' => 'ツ',
        'ﾃ' => 'テ',
        'ﾄ' => 'ト',
        'ﾅ' => 'ナ',
        'ﾆ' => 'ニ',
        'ﾇ' => 'ヌ',
        'ﾈ' => 'ネ',
        'ﾉ' => 'ノ',
        'ﾊ' => 'ハ',
        'ﾋ' => 'ヒ',
        'ﾌ' => 'フ',
        'ﾍ' => 'ヘ',
        'ﾎ' => 'ホ',
        'ﾏ' => 'マ',
        'ﾐ' => 'ミ',
        'ﾑ' => 'ム',
        'ﾒ' => 'メ',
        'ﾓ' => 'モ',
        'ﾔ' => 'ヤ',
        'ﾕ' => 'ユ',
        'ﾖ' => 'ヨ',
        'ﾗ' => 'ラ',
        'ﾘ' => 'リ',
        'ﾙ' => 'ル',
        'ﾚ' => 'レ',
        'ﾛ' => 'ロ',
        'ﾜ' => 'ワ',
        'ﾝ' => 'ン',
        '\u{FF9E}' => '゛',
        '\u{FF9F}' => '゜',
        _ => return None,
    };
    Some(fw)
}

/// Full-width base kana -> voiced form, for a trailing U+FF9E mark.
fn voiced(c: char) -> Option<char> {
    let v = match c {
        'カ' => 'ガ',
        'キ' => 'ギ',
        'ク' => 'グ',
        'ケ' => 'ゲ',
        'コ' => 'ゴ',
        'サ' => 'ザ',
        'シ' => 'ジ',
        'ス' => 'ズ',
        'セ' => 'ゼ',
        'ソ' => 'ゾ',
        'タ' => 'ダ',
        'チ' => 'ヂ',
        'ツ' => 'ヅ',
        'テ' => 'デ',
        'ト' => 'ド',
        'ハ' => 'バ',
        'ヒ' => 'ビ',
        'フ' => 'ブ',
        'ヘ' => 'ベ',
        'ホ' => 'ボ',
        'ウ' => 'ヴ',
        _ => return None,
    };
    Some(v)
}

/// Full-width base kana -> semi-voiced form, for a trailing U+FF9F mark.
fn semi_voiced(c: char) -> Option<char> {
    let v = match c {
        'ハ' => 'パ',
        'ヒ' => 'ピ',
        'フ' => 'プ',
        'ヘ' => 'ペ',
        'ホ' => 'ポ',
        _ => return None,
    };
    Some(v)
}

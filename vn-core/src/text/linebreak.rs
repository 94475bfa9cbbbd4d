//! # LineBreak 模块
//!
//! 断行规则。
//!
//! - 西文：空格之前可以断行
//! - 连接符（`-`、`*`、各类破折号）：该字之后可以断行
//! - CJK：相邻两字之间默认可以断行，除非前一字属于"不可行尾"类、
//!   后一字属于"不可行首"类，或两字都是半角字母数字

use super::ScriptLanguage;

/// 不可出现在行首的字符（收尾标点、小写假名、长音符等）
const NO_LINE_START: &[char] = &[
    '!', '%', ')', ',', '.', ':', ';', '?', ']', '}', '¢', '°', '’', '”', '‰', '′', '″', '℃',
    '、', '。', '々', '〉', '》', '」', '』', '】', '〕', '〗', '〙', '〟', 'ぁ', 'ぃ', 'ぅ', 'ぇ',
    'ぉ', 'っ', 'ゃ', 'ゅ', 'ょ', 'ゎ', 'ゕ', 'ゖ', 'ゝ', 'ゞ', 'ァ', 'ィ', 'ゥ', 'ェ', 'ォ', 'ッ',
    'ャ', 'ュ', 'ョ', 'ヮ', 'ヵ', 'ヶ', 'ー', 'ヽ', 'ヾ', '・', '…', '‥', '！', '％', '）', '，',
    '．', '：', '；', '？', '］', '｝', '～', '｡', '｣', '､', '･', 'ｧ', 'ｨ', 'ｩ', 'ｪ', 'ｫ', 'ｬ',
    'ｭ', 'ｮ', 'ｯ', 'ｰ', '゛', '゜',
];

/// 不可出现在行尾的字符（起始括号、货币前缀等）
const NO_LINE_END: &[char] = &[
    '$', '(', '[', '{', '£', '¥', '‘', '“', '〈', '《', '「', '『', '【', '〔', '〖', '〘', '〝',
    '＄', '（', '［', '｛', '｢', '￡', '￥',
];

/// 之后可以断行的连接符
const GLUE: &[char] = &['-', '*', '‐', '–', '—'];

/// 换行时需要在下一行重复的连接符
const DUPLICATE_ON_WRAP: &[char] = &['-', '*', '‐'];

pub fn is_no_line_start(c: char) -> bool {
    NO_LINE_START.contains(&c)
}

pub fn is_no_line_end(c: char) -> bool {
    NO_LINE_END.contains(&c)
}

/// 连接符：该字之后可以断行
pub fn is_glue(c: char) -> bool {
    GLUE.contains(&c)
}

/// 换行后是否可在下一行重复
pub fn duplicates_on_wrap(c: char) -> bool {
    DUPLICATE_ON_WRAP.contains(&c)
}

/// `next` 之前是否可以断行
///
/// `prev` 为同一片段中紧邻的前一个字形；没有前一个字形时不断行。
pub fn can_break_before(language: ScriptLanguage, prev: Option<char>, next: char) -> bool {
    let Some(prev) = prev else {
        return false;
    };

    if next == ' ' {
        return true;
    }

    match language {
        ScriptLanguage::Western => false,
        ScriptLanguage::Cjk => {
            if prev == ' ' || is_no_line_end(prev) || is_no_line_start(next) {
                return false;
            }
            !(prev.is_ascii_alphanumeric() && next.is_ascii_alphanumeric())
        }
    }
}

//! Static lookup tables: domain phrases, stop words, punctuation and the
//! alias table of well-known works (Taishō numbering).

/// Multi-character doctrinal phrases kept whole for lexical search.
pub const DOMAIN_PHRASES: &[&str] = &[
    // traditional
    "般若波羅蜜多",
    "般若波羅蜜",
    "阿耨多羅三藐三菩提",
    "四聖諦",
    "八正道",
    "十二因緣",
    "三法印",
    "六波羅蜜",
    "五蘊",
    "十八界",
    "菩提心",
    "如來藏",
    "阿賴耶識",
    "末那識",
    "唯識",
    "中觀",
    "空性",
    "緣起",
    "涅槃",
    "輪迴",
    "戒定慧",
    "佛性",
    "淨土",
    "禪定",
    "止觀",
    "菩薩戒",
    "三皈依",
    "無常",
    "無我",
    "因果",
    "業力",
    "解脫",
    "慈悲",
    "布施",
    "持戒",
    "忍辱",
    "精進",
    "智慧",
    "四念處",
    "七覺支",
    // simplified
    "般若波罗蜜多",
    "般若波罗蜜",
    "四圣谛",
    "十二因缘",
    "六波罗蜜",
    "五蕴",
    "如来藏",
    "阿赖耶识",
    "末那识",
    "唯识",
    "中观",
    "缘起",
    "轮回",
    "净土",
    "止观",
    "菩萨戒",
    "三皈依",
    "无常",
    "无我",
    "业力",
    "解脱",
    "精进",
    "四念处",
    "七觉支",
];

/// CJK function words and question scaffolding removed before tokenizing.
pub const CJK_STOP_WORDS: &[&str] = &[
    "為什麼", "为什么", "什麼", "什么", "甚麼", "如何", "怎麼", "怎么", "怎樣", "怎样", "哪些", "哪個", "哪个",
    "是否", "請問", "请问", "請", "请", "解釋", "解释", "說明", "说明", "關於", "关于", "意思", "含義", "含义",
    "意義", "意义", "一下", "我們", "我们", "你們", "你们", "可以", "應該", "应该", "的", "了", "嗎", "吗",
    "呢", "吧", "啊", "是", "和", "與", "与", "及",
];

/// English stop words, matched as whole tokens case-insensitively.
pub const ASCII_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their",
    "there", "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose",
    "can", "could", "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had",
    "having", "explain", "about", "please", "mean", "means",
];

/// Non-ASCII punctuation stripped alongside ASCII punctuation.
const CJK_PUNCTUATION: &str = "，。、；：？！「」『』（）《》〈〉【】〔〕…—–～·．“”‘’﹏";

/// Short and alternate names of works mapped to their text ids.
pub const TEXT_ALIASES: &[(&str, &[&str])] = &[
    ("心經", &["T0251"]),
    ("心经", &["T0251"]),
    ("金剛經", &["T0235"]),
    ("金刚经", &["T0235"]),
    ("法華經", &["T0262"]),
    ("法华经", &["T0262"]),
    ("華嚴經", &["T0279"]),
    ("华严经", &["T0279"]),
    ("楞嚴經", &["T0945"]),
    ("楞严经", &["T0945"]),
    ("壇經", &["T2008"]),
    ("坛经", &["T2008"]),
    ("維摩經", &["T0475"]),
    ("维摩经", &["T0475"]),
    ("阿彌陀經", &["T0366"]),
    ("阿弥陀经", &["T0366"]),
    ("地藏經", &["T0412"]),
    ("地藏经", &["T0412"]),
    ("楞伽經", &["T0670"]),
    ("楞伽经", &["T0670"]),
    ("圓覺經", &["T0842"]),
    ("圆觉经", &["T0842"]),
    ("大般若經", &["T0220"]),
    ("大般若经", &["T0220"]),
    ("中論", &["T1564"]),
    ("中论", &["T1564"]),
    ("成唯識論", &["T1585"]),
    ("成唯识论", &["T1585"]),
    ("大乘起信論", &["T1666"]),
    ("大乘起信论", &["T1666"]),
    ("四分律", &["T1428"]),
];

pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || CJK_PUNCTUATION.contains(c)
        || (('\u{3000}'..='\u{303F}').contains(&c) && c != '々')
        || ('\u{FF01}'..='\u{FF0F}').contains(&c)
        || ('\u{FF1A}'..='\u{FF20}').contains(&c)
        || ('\u{FF3B}'..='\u{FF40}').contains(&c)
        || ('\u{FF5B}'..='\u{FF65}').contains(&c)
}

/// CJK unified ideographs, extensions A–F and compatibility ideographs.
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{2F800}'..='\u{2FA1F}')
}

pub fn is_ascii_stop_word(token: &str) -> bool {
    ASCII_STOP_WORDS.iter().any(|w| w.eq_ignore_ascii_case(token))
}

/// Replaces punctuation with spaces and collapses whitespace.
pub fn strip_punctuation(text: &str) -> String {
    let replaced: String = text.chars().map(|c| if is_punctuation(c) { ' ' } else { c }).collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

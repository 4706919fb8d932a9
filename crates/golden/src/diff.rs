use pretty_assertions::StrComparison;

/// Line diff of the stored (`want`) and computed (`got`) golden bytes.
pub fn render(want: &[u8], got: &[u8]) -> String {
    let want = String::from_utf8_lossy(want);
    let got = String::from_utf8_lossy(got);
    let mut out = String::new();
    if let Some((line, column)) = first_difference(&want, &got) {
        out.push_str(&format!("first difference at line {line}, column {column}\n"));
    }
    out.push_str(&format!("{}", StrComparison::new(&*want, &*got)));
    out
}

/// 1-based line and column of the first differing character.
pub fn first_difference(want: &str, got: &str) -> Option<(usize, usize)> {
    let mut line = 1;
    let mut column = 1;
    let mut want_chars = want.chars();
    let mut got_chars = got.chars();
    loop {
        match (want_chars.next(), got_chars.next()) {
            (None, None) => return None,
            (Some(a), Some(b)) if a == b => {
                if a == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            _ => return Some((line, column)),
        }
    }
}

// ── Bash export ───────────────────────────────────────────────────────────────
//
// Renders the enabled list entries as a standalone bash script that applies
// them with `sed` to a copy of a file:
//
//   ./replace.sh input.txt output.txt
//
// Normal entries have every sed/shell metacharacter masked.  Extended entries
// keep their supported escapes, with numeric ones translated to the
// character and line breaks routed through placeholder tokens so sed can
// match across lines.  Regex entries are passed through for `sed -r`.

use std::{fs, path::Path};

use super::{PatternEntry, PatternList};
use crate::error::{Error, Result};

/// Characters sed or the shell would otherwise interpret.
const SPECIAL: &str = "$.*[]^&\\{}()?+|<>\"'`~;#";

/// Escape letters left alone in extended mode.
const SUPPORTED_ESCAPES: &str = "nrt0xubd";

const PROCESS_LINE: &str = r#"processLine() {
    local findString="$1"
    local replaceString="$2"
    local wholeWord="$3"
    local matchCase="$4"
    local normal="$5"
    local extended="$6"
    local regex="$7"

    if [[ "$wholeWord" -eq 1 ]]; then
        findString='\b'${findString}'\b'
    fi
    if [[ "$matchCase" -eq 1 ]]; then
        template='s|'${findString}'|'${replaceString}'|g'
    else
        template='s|'${findString}'|'${replaceString}'|gi'
    fi
    case 1 in
        $normal)
            sed -i "${template}" "$outputFile"
            ;;
        $extended)
            sed -i -e ':a' -e 'N' -e '$!ba' -e 's/\n/__NEWLINE__/g' -e 's/\r/__CARRIAGERETURN__/g' "$outputFile"
            sed -i "${template}" "$outputFile"
            sed -i 's/__NEWLINE__/\n/g; s/__CARRIAGERETURN__/\r/g' "$outputFile"
            ;;
        $regex)
            sed -i -r "${template}" "$outputFile"
            ;;
    esac
}
"#;

/// Prefix every special character with a backslash.
///
/// With `extended`, a lone backslash that starts a supported escape is kept
/// as is so `translate_escapes` can see it.
pub fn escape_special_chars(input: &str, extended: bool) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() * 2);
    for (i, &c) in chars.iter().enumerate() {
        if SPECIAL.contains(c) {
            let keeps_escape = extended
                && c == '\\'
                && (i == 0 || chars[i - 1] != '\\')
                && chars.get(i + 1).is_some_and(|n| SUPPORTED_ESCAPES.contains(*n));
            if !keeps_escape {
                out.push('\\');
            }
        }
        out.push(c);
    }
    out
}

fn fixed_digits(chars: &[char], from: usize, width: usize, radix: u32) -> Option<u32> {
    let digits = chars.get(from..from + width)?;
    digits.iter().try_fold(0u32, |acc, d| Some(acc * radix + d.to_digit(radix)?))
}

/// Turn numeric escapes into characters and line-break escapes into the
/// placeholders the generated script expects.  `\0` is dropped.
pub fn translate_escapes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 == chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let numeric = match chars[i + 1] {
            'o' => Some((8, 3)),
            'd' => Some((10, 3)),
            'x' => Some((16, 2)),
            'b' => Some((2, 8)),
            'u' => Some((16, 4)),
            _ => None,
        };
        if let Some((radix, width)) = numeric {
            let decoded = fixed_digits(&chars, i + 2, width, radix).and_then(|v| {
                // Byte-sized escapes name Latin-1 code points.
                let v = if radix == 16 && width == 4 { v } else { v & 0xFF };
                char::from_u32(v)
            });
            if let Some(ch) = decoded {
                out.push(ch);
                i += 2 + width;
                continue;
            }
        }
        match chars[i + 1] {
            'n' => out.push_str("__NEWLINE__"),
            'r' => out.push_str("__CARRIAGERETURN__"),
            '0' => {}
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        i += 2;
    }
    out
}

/// The find and replace arguments for one `processLine` call.
fn sed_arguments(entry: &PatternEntry) -> (String, String) {
    if entry.extended {
        (
            translate_escapes(&escape_special_chars(&entry.find_text, true)),
            translate_escapes(&escape_special_chars(&entry.replace_text, true)),
        )
    } else if entry.regex {
        (entry.find_text.clone(), entry.replace_text.clone())
    } else {
        (
            escape_special_chars(&entry.find_text, false),
            escape_special_chars(&entry.replace_text, false),
        )
    }
}

/// Render the script; `date` goes into the header comment verbatim.
pub fn bash_script(list: &PatternList, date: &str) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/bash\n");
    out.push_str("# Auto-generated by MultiReplace\n");
    out.push_str(&format!("# Created on: {date}\n\n"));
    out.push_str("inputFile=\"$1\"\n");
    out.push_str("outputFile=\"$2\"\n\n");
    out.push_str(PROCESS_LINE);
    out.push('\n');
    out.push_str("cp \"$inputFile\" \"$outputFile\"\n\n");
    out.push_str(
        "# processLine arguments: \"findString\" \"replaceString\" wholeWord matchCase normal extended regex\n",
    );

    let bit = |on: bool| if on { '1' } else { '0' };
    for entry in list.enabled() {
        let (find, replace) = sed_arguments(entry);
        let normal = !entry.regex && !entry.extended;
        out.push_str(&format!(
            "processLine \"{find}\" \"{replace}\" {} {} {} {} {}\n",
            bit(entry.whole_word),
            bit(entry.match_case),
            bit(normal),
            bit(entry.extended),
            bit(entry.regex),
        ));
    }
    out
}

/// Write the script to `path`.
pub fn save_bash_script(path: &Path, list: &PatternList, date: &str) -> Result<()> {
    fs::write(path, bash_script(list, date)).map_err(|e| Error::io(path, e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

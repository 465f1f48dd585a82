//! Minimal RFC 4180 reader: quoted fields, doubled quotes, CRLF.

use std::mem::take;

pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if quoted {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' => quoted = true,
            ',' => row.push(take(&mut field)),
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                push_row(&mut rows, take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    // Last line may lack a newline, or end inside an unterminated quote.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        push_row(&mut rows, row);
    }
    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    let blank = row.len() == 1 && row[0].is_empty();
    if !blank {
        rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let rows = parse_rows("a,\"b, c\",\"line\nbreak\"\r\nd,\"say \"\"hi\"\"\",\n");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b, c".into(), "line\nbreak".into()],
                vec!["d".to_string(), "say \"hi\"".into(), "".into()],
            ]
        );
    }

    #[test]
    fn blank_lines_and_missing_final_newline() {
        let rows = parse_rows("a,b\n\nc,d");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c".to_string(), "d".to_string()]);
    }
}

//! ✂️ CSV field splitter: one line in, a `Vec<String>` of fields out.
//!
//! CUR files are RFC 4180 CSV. Product descriptions love commas
//! ("Linux/UNIX, t3.micro, On Demand"), so they arrive wrapped in quotes and we
//! have to respect that. Embedded newlines inside quotes are not supported: the
//! line reader already cut the line at the `\n`, so best effort wins. 🦆

const DELIMITER: char = ',';

/// ✂️ Split a single CSV line into fields, honoring `"quoted, fields"` and `""` escapes.
///
/// A trailing delimiter yields a trailing empty field, same as every spreadsheet ever.
pub(crate) fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    let mut field = String::new();

    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => {
                        if chars.peek() == Some(&'"') {
                            // -- "" inside quotes is a literal quote. CSV's one joke.
                            chars.next();
                            field.push('"');
                        } else {
                            break;
                        }
                    }
                    Some(c) => field.push(c),
                    None => break,
                }
            }
            // -- 🧹 anything between the closing quote and the next comma is noise
            while let Some(c) = chars.next() {
                if c == DELIMITER {
                    break;
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != DELIMITER) {
                field.push(c);
            }
            chars.next();
        }

        fields.push(std::mem::take(&mut field));

        if chars.peek().is_none() {
            if line.ends_with(DELIMITER) {
                fields.push(String::new());
            }
            break;
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_plain_fields_split_on_commas() {
        assert_eq!(split_fields("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn the_one_where_quoted_commas_stay_home() {
        assert_eq!(
            split_fields(r#"id,"Linux/UNIX, t3.micro",0.5"#),
            vec!["id", "Linux/UNIX, t3.micro", "0.5"]
        );
    }

    #[test]
    fn the_one_where_double_quotes_escape_themselves() {
        assert_eq!(split_fields(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn the_one_where_empty_columns_are_still_columns() {
        assert_eq!(split_fields("a,,c"), vec!["a", "", "c"]);
        assert_eq!(split_fields("a,b,"), vec!["a", "b", ""]);
        assert_eq!(split_fields(r#"a,"""#), vec!["a", ""]);
    }

    #[test]
    fn the_one_where_a_single_value_is_a_single_field() {
        assert_eq!(split_fields("lonely"), vec!["lonely"]);
        assert_eq!(split_fields(""), vec![""]);
    }
}

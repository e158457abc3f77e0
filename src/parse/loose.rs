//! Permissive literal reader.
//!
//! Accepts a superset of JSON: single-quoted strings, bare keys and bare
//! word values, `None/True/False`-style literals, `=` or full-width colons as
//! separators, trailing commas, and input cut off mid-object (whatever was
//! complete before the cut is kept).

use serde_json::{Map, Number, Value};

pub fn parse_loose(input: &str) -> Option<Value> {
    let start = input.find(['{', '['])?;
    let mut p = Reader {
        chars: input[start..].chars().collect(),
        pos: 0,
    };
    p.value().ok()
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

#[derive(Debug)]
enum Miss {
    Eof,
    Unexpected,
}

type Step<T> = Result<T, Miss>;

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn value(&mut self) -> Step<Value> {
        self.skip_ws();
        match self.peek() {
            None => Err(Miss::Eof),
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some(_) => self.bare(),
        }
    }

    fn object(&mut self) -> Step<Value> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Ok(Value::Object(map)),
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(',') | Some('，') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            let key = match self.key() {
                Ok(k) => k,
                Err(Miss::Eof) => return Ok(Value::Object(map)),
                Err(e) => return Err(e),
            };
            self.skip_ws();
            match self.peek() {
                Some(':') | Some('：') | Some('=') => self.pos += 1,
                None => return Ok(Value::Object(map)),
                Some(_) => return Err(Miss::Unexpected),
            }
            match self.value() {
                Ok(v) => {
                    map.insert(key, v);
                }
                // Cut off inside this member: keep the complete ones.
                Err(Miss::Eof) => return Ok(Value::Object(map)),
                Err(e) => return Err(e),
            }
            self.skip_ws();
            match self.peek() {
                Some(',') | Some('，') => self.pos += 1,
                Some('}') | None => {}
                // Missing comma between members; tolerate if a key follows.
                Some(_) => {}
            }
        }
    }

    fn array(&mut self) -> Step<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Ok(Value::Array(items)),
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(',') | Some('，') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }
            match self.value() {
                Ok(v) => items.push(v),
                Err(Miss::Eof) => return Ok(Value::Array(items)),
                Err(e) => return Err(e),
            }
        }
    }

    fn key(&mut self) -> Step<String> {
        match self.peek() {
            Some('"') | Some('\'') => self.string(),
            Some(_) => {
                let mut out = String::new();
                while let Some(c) = self.peek() {
                    if matches!(c, ':' | '：' | '=' | ',' | '}') || c.is_whitespace() {
                        break;
                    }
                    out.push(c);
                    self.pos += 1;
                }
                if self.eof() {
                    Err(Miss::Eof)
                } else if out.is_empty() {
                    Err(Miss::Unexpected)
                } else {
                    Ok(out)
                }
            }
            None => Err(Miss::Eof),
        }
    }

    fn string(&mut self) -> Step<String> {
        let quote = self.peek().ok_or(Miss::Eof)?;
        let close = match quote {
            '"' => '"',
            '\'' => '\'',
            _ => return Err(Miss::Unexpected),
        };
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    let esc = self.peek().ok_or(Miss::Eof)?;
                    self.pos += 1;
                    out.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == close => return Ok(out),
                c => out.push(c),
            }
        }
        Err(Miss::Eof)
    }

    /// Numbers, literals, or a bare word running to the next delimiter.
    fn bare(&mut self) -> Step<Value> {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '，' | '}' | ']' | '\n') {
                break;
            }
            word.push(c);
            self.pos += 1;
        }
        let word = word.trim();
        if word.is_empty() {
            return Err(if self.eof() { Miss::Eof } else { Miss::Unexpected });
        }
        Ok(literal(word))
    }
}

fn literal(word: &str) -> Value {
    match word.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Value::Bool(true),
        "false" | "no" => return Value::Bool(false),
        "null" | "none" | "nil" | "undefined" | "nan" => return Value::Null,
        _ => {}
    }
    let numeric = word.trim_start_matches('+');
    if let Ok(i) = numeric.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = numeric.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_style_literals() {
        let v = parse_loose("{'score': 0.7, 'ok': True, 'note': None, 'list': [1, 2,],}").unwrap();
        assert_eq!(v["score"], 0.7);
        assert_eq!(v["ok"], true);
        assert!(v["note"].is_null());
        assert_eq!(v["list"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn bare_keys_and_words() {
        let v = parse_loose("{内容: 通胀数据, 重要性: 高, 评分 = .5}").unwrap();
        assert_eq!(v["内容"], "通胀数据");
        assert_eq!(v["重要性"], "高");
        assert_eq!(v["评分"], 0.5);
    }

    #[test]
    fn truncated_input_keeps_complete_members() {
        let v = parse_loose(r#"{"总体评分": 0.82, "各大类评分": {"内容真实性": 0.8, "信息准"#).unwrap();
        assert_eq!(v["总体评分"], 0.82);
        assert_eq!(v["各大类评分"]["内容真实性"], 0.8);
    }

    #[test]
    fn no_opener_is_none() {
        assert!(parse_loose("just prose").is_none());
    }
}
